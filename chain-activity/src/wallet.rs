//! Wallet provider capability.
//!
//! The session layer talks to a wallet only through [`WalletProvider`] for
//! requests and [`EventSource`] for the `accountsChanged` / `chainChanged`
//! notifications. [`EventHub`] is the in-process subscription table that
//! adapters embed to implement [`EventSource`].

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use crate::chains::{ChainId, ChainInfo};
use crate::error::WalletError;
use crate::types::Address;

/// Native currency block of an EIP-3085 `wallet_addEthereumChain` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// EIP-3085 chain registration parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddChainParams {
    pub chain_id: ChainId,
    pub chain_name: String,
    pub rpc_urls: Vec<String>,
    pub native_currency: NativeCurrency,
    pub block_explorer_urls: Vec<String>,
}

impl From<&ChainInfo> for AddChainParams {
    fn from(info: &ChainInfo) -> Self {
        Self {
            chain_id: info.id,
            chain_name: info.name.to_string(),
            rpc_urls: vec![info.rpc_url.to_string()],
            native_currency: NativeCurrency {
                name: info.currency_name.to_string(),
                symbol: info.currency.to_string(),
                decimals: 18,
            },
            block_explorer_urls: vec![info.explorer_url.to_string()],
        }
    }
}

/// Requests the session layer makes of a wallet.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Ask the user to expose their accounts (`eth_requestAccounts`).
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError>;

    /// Chain the wallet is currently on (`eth_chainId`).
    async fn active_chain(&self) -> Result<ChainId, WalletError>;

    /// `wallet_switchEthereumChain`
    async fn switch_chain(&self, chain: ChainId) -> Result<(), WalletError>;

    /// `wallet_addEthereumChain`
    async fn add_chain(&self, params: &AddChainParams) -> Result<(), WalletError>;
}

/// Notification kinds a wallet emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WalletEventKind {
    AccountsChanged,
    ChainChanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(ChainId),
}

impl WalletEvent {
    pub fn kind(&self) -> WalletEventKind {
        match self {
            Self::AccountsChanged(_) => WalletEventKind::AccountsChanged,
            Self::ChainChanged(_) => WalletEventKind::ChainChanged,
        }
    }
}

/// Callback invoked for each matching event.
pub type EventHandler = Arc<dyn Fn(&WalletEvent) + Send + Sync>;

/// Identifies one subscription for [`EventSource::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

/// Source of wallet notifications.
pub trait EventSource: Send + Sync {
    fn subscribe(&self, kind: WalletEventKind, handler: EventHandler) -> SubscriptionToken;

    fn unsubscribe(&self, token: SubscriptionToken);
}

struct Subscription {
    token: SubscriptionToken,
    kind: WalletEventKind,
    handler: EventHandler,
}

/// Subscription table that dispatches events synchronously.
#[derive(Default)]
pub struct EventHub {
    next_token: AtomicU64,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every handler subscribed to its kind.
    pub fn emit(&self, event: &WalletEvent) {
        let kind = event.kind();
        // Handlers run outside the lock so they may subscribe or unsubscribe.
        let handlers: Vec<EventHandler> = self
            .subscriptions
            .lock()
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| s.handler.clone())
            .collect();

        for handler in handlers {
            handler(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.lock().len()
    }
}

impl EventSource for EventHub {
    fn subscribe(&self, kind: WalletEventKind, handler: EventHandler) -> SubscriptionToken {
        let token = SubscriptionToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.subscriptions.lock().push(Subscription {
            token,
            kind,
            handler,
        });
        token
    }

    fn unsubscribe(&self, token: SubscriptionToken) {
        self.subscriptions.lock().retain(|s| s.token != token);
    }
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("subscriptions", &self.subscriber_count())
            .finish()
    }
}

/// Keeps wallet event handlers registered; unsubscribes them on drop.
pub struct EventBinding {
    source: Arc<dyn EventSource>,
    tokens: Vec<SubscriptionToken>,
}

impl EventBinding {
    pub(crate) fn new(source: Arc<dyn EventSource>, tokens: Vec<SubscriptionToken>) -> Self {
        Self { source, tokens }
    }
}

impl Drop for EventBinding {
    fn drop(&mut self) {
        for token in self.tokens.drain(..) {
            self.source.unsubscribe(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::ChainRegistry;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_add_chain_params_shape() {
        let registry = ChainRegistry::builtin();
        let params = AddChainParams::from(registry.resolve(ChainId::POLYGON));
        let json = serde_json::to_value(&params).unwrap();

        assert_eq!(json["chainId"], "0x89");
        assert_eq!(json["chainName"], "Polygon");
        assert_eq!(json["rpcUrls"][0], "https://polygon.llamarpc.com");
        assert_eq!(json["nativeCurrency"]["symbol"], "MATIC");
        assert_eq!(json["nativeCurrency"]["decimals"], 18);
        assert_eq!(json["blockExplorerUrls"][0], "https://polygonscan.com");
    }

    #[test]
    fn test_event_hub_dispatches_by_kind() {
        let hub = EventHub::new();
        let chain_calls = Arc::new(AtomicUsize::new(0));
        let counter = chain_calls.clone();
        let token = hub.subscribe(
            WalletEventKind::ChainChanged,
            Arc::new(move |_: &WalletEvent| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        hub.emit(&WalletEvent::AccountsChanged(vec![]));
        hub.emit(&WalletEvent::ChainChanged(ChainId::POLYGON));
        assert_eq!(chain_calls.load(Ordering::SeqCst), 1);

        hub.unsubscribe(token);
        hub.emit(&WalletEvent::ChainChanged(ChainId::ETHEREUM));
        assert_eq!(chain_calls.load(Ordering::SeqCst), 1);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn test_binding_unsubscribes_on_drop() {
        let hub = Arc::new(EventHub::new());
        let token = hub.subscribe(
            WalletEventKind::AccountsChanged,
            Arc::new(|_: &WalletEvent| {}),
        );
        let binding = EventBinding::new(hub.clone(), vec![token]);
        assert_eq!(hub.subscriber_count(), 1);
        drop(binding);
        assert_eq!(hub.subscriber_count(), 0);
    }
}
