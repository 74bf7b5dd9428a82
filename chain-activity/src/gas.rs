//! Gas price polling for the selected chain.

use parking_lot::Mutex;
use primitive_types::U256;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::data_provider::DataProvider;
use crate::store::StateStore;

const WEI_PER_GWEI: u64 = 1_000_000_000;

/// Integer gwei, rounded to nearest.
pub fn wei_to_gwei(wei: U256) -> String {
    let gwei = U256::from(WEI_PER_GWEI);
    (wei.saturating_add(gwei / 2) / gwei).to_string()
}

#[derive(Default)]
struct Watchers {
    count: usize,
    task: Option<JoinHandle<()>>,
}

/// Polls the gas price while at least one [`GasWatch`] is alive.
#[derive(Clone)]
pub struct GasMonitor {
    provider: Arc<dyn DataProvider>,
    store: StateStore,
    interval: Duration,
    watchers: Arc<Mutex<Watchers>>,
}

impl GasMonitor {
    pub fn new(provider: Arc<dyn DataProvider>, store: StateStore, interval: Duration) -> Self {
        Self {
            provider,
            store,
            interval,
            watchers: Arc::new(Mutex::new(Watchers::default())),
        }
    }

    /// Query the gas price once. Failures keep the last known value.
    pub async fn fetch_gas_price(&self) {
        let ctx = self.store.context();
        match self.provider.get_gas_price(ctx.chain).await {
            Ok(wei) => {
                let gwei = wei_to_gwei(wei);
                debug!("Gas price on {}: {} gwei", ctx.chain, gwei);
                self.store
                    .update_if_current(&ctx, |s| s.gas_price = Some(gwei));
            }
            Err(e) => debug!("Gas price fetch on {} failed: {}", ctx.chain, e),
        }
    }

    /// Start polling, or join the poller that is already running.
    pub fn watch(&self) -> GasWatch {
        let mut watchers = self.watchers.lock();
        watchers.count += 1;
        if watchers.task.is_none() {
            match Handle::try_current() {
                Ok(handle) => {
                    debug!("Starting gas monitor every {:?}", self.interval);
                    watchers.task = Some(handle.spawn(self.clone().run()));
                }
                Err(_) => warn!("No async runtime, gas price will not be polled"),
            }
        }
        GasWatch {
            watchers: Arc::clone(&self.watchers),
        }
    }

    pub fn is_polling(&self) -> bool {
        self.watchers.lock().task.is_some()
    }

    async fn run(self) {
        let mut updates = self.store.subscribe();
        let mut chain = updates.borrow_and_update().selected_chain;
        // The first tick completes immediately.
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.fetch_gas_price().await,
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let selected = updates.borrow_and_update().selected_chain;
                    if selected != chain {
                        chain = selected;
                        ticker = tokio::time::interval(self.interval);
                    }
                }
            }
        }
    }
}

/// Keeps the gas monitor running; the last one dropped stops it.
pub struct GasWatch {
    watchers: Arc<Mutex<Watchers>>,
}

impl Drop for GasWatch {
    fn drop(&mut self) {
        let mut watchers = self.watchers.lock();
        watchers.count = watchers.count.saturating_sub(1);
        if watchers.count == 0 {
            if let Some(task) = watchers.task.take() {
                debug!("Stopping gas monitor");
                task.abort();
            }
        }
    }
}
