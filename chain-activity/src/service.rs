//! The activity service.
//!
//! [`ActivityService`] wires the session, fetchers, gas monitor and error
//! channel around one [`StateStore`] and exposes the actions a presentation
//! layer calls. It is cheap to clone; all clones share the same state.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::activity::ActivityFetcher;
use crate::alchemy::AlchemyClient;
use crate::chains::{ChainId, ChainRegistry};
use crate::config::ActivityConfig;
use crate::data_provider::DataProvider;
use crate::error::Result;
use crate::error_channel::ErrorChannel;
use crate::gas::{GasMonitor, GasWatch};
use crate::network_switch::{NetworkSwitcher, SwitchOutcome};
use crate::persistence::{FilePreferenceStore, PreferenceStore};
use crate::portfolio::PortfolioFetcher;
use crate::session::SessionController;
use crate::store::{Snapshot, StateStore};
use crate::types::Address;
use crate::wallet::{EventBinding, EventSource, WalletProvider};

/// Fetches started by a connect or chain switch.
///
/// Each runs as its own task; dropping this does not cancel them.
#[derive(Debug, Default)]
pub struct Refresh {
    tasks: Vec<JoinHandle<()>>,
}

impl Refresh {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every fetch to settle.
    pub async fn wait(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                debug!("Refresh task ended abnormally: {}", e);
            }
        }
    }
}

#[derive(Clone)]
pub struct ActivityService {
    registry: ChainRegistry,
    store: StateStore,
    errors: ErrorChannel,
    session: SessionController,
    switcher: NetworkSwitcher,
    activity: ActivityFetcher,
    portfolio: PortfolioFetcher,
    gas: GasMonitor,
}

impl ActivityService {
    pub fn new(
        config: &ActivityConfig,
        provider: Arc<dyn DataProvider>,
        preferences: Arc<dyn PreferenceStore>,
        wallet: Option<Arc<dyn WalletProvider>>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let registry = config.registry()?;
        let store = StateStore::new(&registry, preferences, config.discard_stale_results);
        let errors = ErrorChannel::new(store.clone(), config.error_display());

        Ok(Self {
            session: SessionController::new(
                wallet,
                store.clone(),
                errors.clone(),
                registry.clone(),
            ),
            switcher: NetworkSwitcher::new(registry.clone(), store.clone(), errors.clone()),
            activity: ActivityFetcher::new(
                provider.clone(),
                store.clone(),
                errors.clone(),
                registry.clone(),
                config.history_page_size,
            ),
            portfolio: PortfolioFetcher::new(
                provider.clone(),
                store.clone(),
                registry.clone(),
                config.token_limit,
                config.nft_page_size,
                config.excluded_nft_standard(),
            ),
            gas: GasMonitor::new(provider, store.clone(), config.gas_poll_interval()),
            registry,
            store,
            errors,
        })
    }

    /// Service backed by Alchemy and the preference file from `config`.
    pub fn from_config(
        config: &ActivityConfig,
        wallet: Option<Arc<dyn WalletProvider>>,
    ) -> anyhow::Result<Self> {
        if config.data_provider.api_key.is_empty() {
            anyhow::bail!(
                "No data provider API key; set data_provider.api_key or {}",
                crate::config::API_KEY_ENV
            );
        }

        let mut client = AlchemyClient::new(
            config.data_provider.api_key.clone(),
            config.registry()?,
            config.request_timeout(),
        );
        if let Some(endpoint) = &config.data_provider.endpoint {
            client = client.with_endpoint(endpoint.clone());
        }

        let preferences = FilePreferenceStore::new(config.preferences_path());
        Self::new(config, Arc::new(client), Arc::new(preferences), wallet)
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.store.subscribe()
    }

    /// Start the history, token and NFT fetches for the current context.
    ///
    /// The history reset is applied before this returns; only the provider
    /// requests run in the spawned tasks.
    fn refresh(&self) -> Refresh {
        let mut tasks = Vec::with_capacity(3);

        if let Some(request) = self.activity.begin(true) {
            let activity = self.activity.clone();
            tasks.push(tokio::spawn(async move {
                let _ = activity.fetch_page(request).await;
            }));
        }

        let tokens = self.portfolio.clone();
        tasks.push(tokio::spawn(async move { tokens.fetch_tokens().await }));
        let nfts = self.portfolio.clone();
        tasks.push(tokio::spawn(async move { nfts.fetch_nfts().await }));

        Refresh { tasks }
    }

    /// Connect the wallet and load history, tokens and NFTs.
    pub async fn connect(&self) -> Result<Refresh> {
        self.session.connect().await?;
        Ok(self.refresh())
    }

    pub fn disconnect(&self) {
        self.session.disconnect();
    }

    /// Select `chain`, switch the wallet if connected, and reload.
    pub async fn select_chain(&self, chain: ChainId) -> Result<Refresh> {
        let outcome = self
            .switcher
            .switch_to(self.session.connected_wallet(), chain)
            .await?;

        Ok(match outcome {
            SwitchOutcome::Switched => self.refresh(),
            SwitchOutcome::Declined | SwitchOutcome::Idle => Refresh::default(),
        })
    }

    /// Load the first page (`reset`) or the next page of history.
    pub async fn fetch_history(&self, reset: bool) -> Result<()> {
        self.activity.fetch_history(reset).await
    }

    pub async fn fetch_tokens(&self) {
        self.portfolio.fetch_tokens().await
    }

    pub async fn fetch_nfts(&self) {
        self.portfolio.fetch_nfts().await
    }

    pub async fn fetch_gas_price(&self) {
        self.gas.fetch_gas_price().await
    }

    pub fn clear_error(&self) {
        self.errors.clear();
    }

    pub fn set_account(&self, account: Option<Address>) {
        self.session.set_account(account);
    }

    pub fn set_chain_id(&self, chain: ChainId) {
        self.session.set_chain_id(chain);
    }

    /// Keep the gas price updated while the returned guard lives.
    pub fn watch_gas(&self) -> GasWatch {
        self.gas.watch()
    }

    pub fn is_gas_polling(&self) -> bool {
        self.gas.is_polling()
    }

    /// Follow account and chain changes reported by `source`.
    pub fn bind_wallet_events(&self, source: Arc<dyn EventSource>) -> EventBinding {
        self.session.bind_events(source)
    }
}
