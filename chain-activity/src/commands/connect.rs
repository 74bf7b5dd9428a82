//! Wallet connect command

use anyhow::Result;
use std::sync::Arc;

use chain_activity::{ActivityConfig, ActivityService, ProxyWallet};

use super::{print_error, print_success, print_warning};

/// Run the connect command
pub async fn run(config: &ActivityConfig, bridge: Option<String>) -> Result<()> {
    let Some(bridge_url) = bridge.or_else(|| config.wallet.bridge_url.clone()) else {
        print_error("No wallet bridge configured. Pass --bridge or set wallet.bridge_url.");
        return Ok(());
    };

    let wallet = Arc::new(ProxyWallet::new(bridge_url, config.request_timeout()));
    let service = ActivityService::from_config(config, Some(wallet.clone()))?;
    let _events = service.bind_wallet_events(wallet.clone());
    let poller = wallet.spawn_event_poller(config.event_poll_interval());

    println!("Connecting through {}...", wallet.bridge_url());

    match service.connect().await {
        Ok(refresh) => {
            refresh.wait().await;
            let snapshot = service.snapshot();
            if let Some(account) = &snapshot.account {
                print_success(&format!("Connected {}", account));
            }
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Err(e) if e.is_silent() => print_warning("Connection request was declined in the wallet"),
        Err(e) => print_error(&e.to_string()),
    }

    poller.abort();
    Ok(())
}
