//! Gas price command

use anyhow::Result;
use std::time::Duration;

use chain_activity::{ActivityConfig, ActivityService};

use super::{print_success, print_warning};

/// Run the gas command
pub async fn run(config: &ActivityConfig, watch_secs: Option<u64>) -> Result<()> {
    let service = ActivityService::from_config(config, None)?;
    let chain = service.registry().resolve(service.snapshot().selected_chain).name;

    let Some(secs) = watch_secs else {
        service.fetch_gas_price().await;
        match service.snapshot().gas_price {
            Some(gwei) => print_success(&format!("{}: {} gwei", chain, gwei)),
            None => print_warning("Gas price unavailable. Run with --verbose for details."),
        }
        return Ok(());
    };

    println!(
        "Watching gas price on {} for {}s (every {}s)...",
        chain, secs, config.gas_poll_interval_secs
    );

    let mut updates = service.subscribe();
    let _watch = service.watch_gas();
    let mut last: Option<String> = None;

    let watching = async {
        while updates.changed().await.is_ok() {
            let current = updates.borrow_and_update().gas_price.clone();
            if current.is_some() && current != last {
                let now = chrono::Local::now().format("%H:%M:%S");
                println!("[{}] {} gwei", now, current.as_deref().unwrap_or_default());
                last = current;
            }
        }
    };

    let _ = tokio::time::timeout(Duration::from_secs(secs), watching).await;
    Ok(())
}
