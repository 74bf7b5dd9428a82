//! EIP-1193 wallet reached over an HTTP JSON-RPC bridge.
//!
//! The bridge forwards `eth_requestAccounts`, `wallet_switchEthereumChain`
//! and friends to a real wallet. Bridges cannot push notifications, so
//! [`ProxyWallet::poll_events`] compares `eth_accounts` / `eth_chainId`
//! against the last observed values and emits the difference.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::chains::ChainId;
use crate::error::WalletError;
use crate::rpc::{http_client, JsonRpcClient, RpcCallError};
use crate::types::Address;
use crate::wallet::{
    AddChainParams, EventHandler, EventHub, EventSource, SubscriptionToken, WalletEvent,
    WalletEventKind, WalletProvider,
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Observed {
    accounts: Vec<Address>,
    chain: ChainId,
}

/// [`WalletProvider`] and [`EventSource`] over an EIP-1193 HTTP bridge.
#[derive(Debug)]
pub struct ProxyWallet {
    rpc: JsonRpcClient,
    hub: EventHub,
    observed: Mutex<Option<Observed>>,
}

impl ProxyWallet {
    pub fn new(bridge_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            rpc: JsonRpcClient::new(http_client(timeout), bridge_url),
            hub: EventHub::new(),
            observed: Mutex::new(None),
        }
    }

    pub fn bridge_url(&self) -> &str {
        self.rpc.url()
    }

    async fn accounts(&self, method: &str) -> Result<Vec<Address>, WalletError> {
        let raw: Vec<String> = self.rpc.call(method, json!([])).await?;
        raw.iter()
            .map(|a| {
                a.parse::<Address>()
                    .map_err(|e| WalletError::Transport(e.to_string()))
            })
            .collect()
    }

    /// Query the bridge once and emit events for anything that changed.
    ///
    /// The first successful poll only records a baseline.
    pub async fn poll_events(&self) -> Result<(), WalletError> {
        let accounts = self.accounts("eth_accounts").await?;
        let chain = self.active_chain().await?;
        let current = Observed { accounts, chain };

        let previous = self.observed.lock().replace(current.clone());
        let Some(previous) = previous else {
            return Ok(());
        };

        if previous.accounts != current.accounts {
            debug!("Bridge reported accountsChanged");
            self.hub
                .emit(&WalletEvent::AccountsChanged(current.accounts.clone()));
        }
        if previous.chain != current.chain {
            debug!("Bridge reported chainChanged to {}", current.chain);
            self.hub.emit(&WalletEvent::ChainChanged(current.chain));
        }
        Ok(())
    }

    /// Poll the bridge on a fixed interval until the handle is aborted.
    pub fn spawn_event_poller(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let wallet = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = wallet.poll_events().await {
                    debug!("Wallet bridge poll failed: {}", e);
                }
            }
        })
    }
}

#[async_trait]
impl WalletProvider for ProxyWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        let accounts = self.accounts("eth_requestAccounts").await?;
        info!("Bridge exposed {} account(s)", accounts.len());
        Ok(accounts)
    }

    async fn active_chain(&self) -> Result<ChainId, WalletError> {
        let raw: String = self.rpc.call("eth_chainId", json!([])).await?;
        raw.parse()
            .map_err(|e: crate::error::ParseError| WalletError::Transport(e.to_string()))
    }

    async fn switch_chain(&self, chain: ChainId) -> Result<(), WalletError> {
        self.rpc
            .call::<Value>(
                "wallet_switchEthereumChain",
                json!([{ "chainId": chain.to_string() }]),
            )
            .await
            .map(|_| ())
            .map_err(|err| match err {
                RpcCallError::Rpc(e) => WalletError::from_code(e.code, e.message, Some(chain)),
                other => other.into(),
            })
    }

    async fn add_chain(&self, params: &AddChainParams) -> Result<(), WalletError> {
        self.rpc
            .call::<Value>("wallet_addEthereumChain", json!([params]))
            .await?;
        Ok(())
    }
}

impl EventSource for ProxyWallet {
    fn subscribe(&self, kind: WalletEventKind, handler: EventHandler) -> SubscriptionToken {
        self.hub.subscribe(kind, handler)
    }

    fn unsubscribe(&self, token: SubscriptionToken) {
        self.hub.unsubscribe(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_starts_without_subscribers() {
        let wallet = ProxyWallet::new("http://127.0.0.1:8545", Duration::from_secs(1));
        assert_eq!(wallet.bridge_url(), "http://127.0.0.1:8545");
        let token = wallet.subscribe(
            WalletEventKind::ChainChanged,
            Arc::new(|_: &WalletEvent| {}),
        );
        assert_eq!(wallet.hub.subscriber_count(), 1);
        wallet.unsubscribe(token);
        assert_eq!(wallet.hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_bridge_is_transport_error() {
        let wallet = ProxyWallet::new("http://127.0.0.1:9", Duration::from_millis(200));
        let err = wallet.request_accounts().await.unwrap_err();
        assert!(matches!(err, WalletError::Transport(_)));
    }
}
