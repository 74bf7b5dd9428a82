//! Integration tests for chain-activity
//!
//! These tests drive the service end to end against in-memory wallet and
//! data providers:
//! - Connect / disconnect lifecycle and wallet notifications
//! - Paginated history and stale result handling
//! - Chain switching, including chain registration
//! - Token and NFT loading
//! - Gas polling and error expiry (paused clock)
//! - Persisted chain selection

use async_trait::async_trait;
use parking_lot::Mutex;
use primitive_types::U256;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use chain_activity::{
    config::ActivityConfig,
    data_provider::{
        DataProvider, NftQuery, OwnedNft, RawTokenBalance, TokenMetadata, Transfer, TransferPage,
        TransferQuery,
    },
    persistence::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore},
    types::{NftStandard, PageCursor, SessionPhase},
    wallet::{AddChainParams, EventHub, WalletEvent, WalletProvider},
    ActivityService, Address, ChainId, DataError, SessionError, WalletError,
};
use tempfile::TempDir;

const ACCOUNT: &str = "0xAbC0000000000000000000000000000000001234";
const OTHER: &str = "0xdef0000000000000000000000000000000005678";

fn account() -> Address {
    ACCOUNT.parse().unwrap()
}

fn other() -> Address {
    OTHER.parse().unwrap()
}

fn transfers(count: usize, tag: &str) -> Vec<Transfer> {
    (0..count)
        .map(|i| Transfer {
            hash: format!("0x{}{:04}", tag, i),
            from: ACCOUNT.to_lowercase(),
            to: Some(OTHER.to_string()),
            value: Some(0.1),
            asset: Some("ETH".to_string()),
            block_timestamp: None,
        })
        .collect()
}

fn page(count: usize, tag: &str, cursor: Option<&str>) -> TransferPage {
    TransferPage {
        transfers: transfers(count, tag),
        next_cursor: cursor.and_then(PageCursor::new),
    }
}

fn rpc_error() -> DataError {
    DataError::Rpc {
        code: -32000,
        message: "upstream unavailable".into(),
    }
}

// ============================================================================
// Fake wallet
// ============================================================================

struct MockWallet {
    accounts: Mutex<Result<Vec<Address>, WalletError>>,
    chain: Mutex<ChainId>,
    known_chains: Mutex<HashSet<ChainId>>,
    switch_error: Mutex<Option<WalletError>>,
    switch_gate: Mutex<Option<Arc<Notify>>>,
    calls: Mutex<Vec<String>>,
}

impl MockWallet {
    fn new(chain: ChainId) -> Arc<Self> {
        Arc::new(Self {
            accounts: Mutex::new(Ok(vec![account()])),
            chain: Mutex::new(chain),
            known_chains: Mutex::new(
                [ChainId::ETHEREUM, ChainId::POLYGON, ChainId::ARBITRUM, ChainId::OPTIMISM]
                    .into_iter()
                    .collect(),
            ),
            switch_error: Mutex::new(None),
            switch_gate: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn fail_accounts(&self, err: WalletError) {
        *self.accounts.lock() = Err(err);
    }

    fn set_accounts(&self, accounts: Vec<Address>) {
        *self.accounts.lock() = Ok(accounts);
    }

    fn forget_chain(&self, chain: ChainId) {
        self.known_chains.lock().remove(&chain);
    }

    fn fail_switch(&self, err: WalletError) {
        *self.switch_error.lock() = Some(err);
    }

    fn gate_switch(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.switch_gate.lock() = Some(gate.clone());
        gate
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn chain(&self) -> ChainId {
        *self.chain.lock()
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        self.calls.lock().push("request_accounts".into());
        self.accounts.lock().clone()
    }

    async fn active_chain(&self) -> Result<ChainId, WalletError> {
        Ok(*self.chain.lock())
    }

    async fn switch_chain(&self, chain: ChainId) -> Result<(), WalletError> {
        self.calls.lock().push(format!("switch:{}", chain));
        let gate = self.switch_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(err) = self.switch_error.lock().clone() {
            return Err(err);
        }
        if !self.known_chains.lock().contains(&chain) {
            return Err(WalletError::UnrecognizedChain(chain));
        }
        *self.chain.lock() = chain;
        Ok(())
    }

    async fn add_chain(&self, params: &AddChainParams) -> Result<(), WalletError> {
        self.calls.lock().push(format!("add:{}", params.chain_id));
        self.known_chains.lock().insert(params.chain_id);
        Ok(())
    }
}

// ============================================================================
// Fake data provider
// ============================================================================

#[derive(Default)]
struct MockDataProvider {
    pages: Mutex<VecDeque<Result<TransferPage, DataError>>>,
    transfer_calls: Mutex<Vec<(ChainId, Option<PageCursor>)>>,
    transfer_gate: Mutex<Option<Arc<Notify>>>,
    balances: Mutex<Vec<RawTokenBalance>>,
    metadata: Mutex<HashMap<String, TokenMetadata>>,
    fail_balances: Mutex<bool>,
    metadata_calls: Mutex<usize>,
    token_chains: Mutex<Vec<ChainId>>,
    nfts: Mutex<Vec<OwnedNft>>,
    nft_queries: Mutex<Vec<(ChainId, NftQuery)>>,
    gas: Mutex<VecDeque<Result<U256, DataError>>>,
    gas_chains: Mutex<Vec<ChainId>>,
}

impl MockDataProvider {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push_page(&self, page: Result<TransferPage, DataError>) {
        self.pages.lock().push_back(page);
    }

    fn gate_transfers(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.transfer_gate.lock() = Some(gate.clone());
        gate
    }

    fn transfer_calls(&self) -> Vec<(ChainId, Option<PageCursor>)> {
        self.transfer_calls.lock().clone()
    }

    fn add_token(&self, contract: &str, raw: u64, metadata: Option<TokenMetadata>) {
        self.balances.lock().push(RawTokenBalance {
            contract_address: contract.to_string(),
            raw_balance: U256::from(raw),
        });
        if let Some(metadata) = metadata {
            self.metadata.lock().insert(contract.to_string(), metadata);
        }
    }

    fn push_gas(&self, gas: Result<U256, DataError>) {
        self.gas.lock().push_back(gas);
    }

    fn gas_chains(&self) -> Vec<ChainId> {
        self.gas_chains.lock().clone()
    }
}

fn metadata(symbol: &str, decimals: u8) -> TokenMetadata {
    TokenMetadata {
        symbol: Some(symbol.to_string()),
        name: Some(format!("{} Token", symbol)),
        decimals: Some(decimals),
        logo: None,
    }
}

#[async_trait]
impl DataProvider for MockDataProvider {
    async fn get_transfers(
        &self,
        chain: ChainId,
        query: &TransferQuery,
    ) -> Result<TransferPage, DataError> {
        self.transfer_calls
            .lock()
            .push((chain, query.cursor.clone()));
        let gate = self.transfer_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.pages
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(TransferPage::default()))
    }

    async fn get_token_balances(
        &self,
        chain: ChainId,
        _owner: &Address,
    ) -> Result<Vec<RawTokenBalance>, DataError> {
        self.token_chains.lock().push(chain);
        if *self.fail_balances.lock() {
            return Err(rpc_error());
        }
        Ok(self.balances.lock().clone())
    }

    async fn get_token_metadata(
        &self,
        _chain: ChainId,
        contract: &str,
    ) -> Result<TokenMetadata, DataError> {
        *self.metadata_calls.lock() += 1;
        self.metadata
            .lock()
            .get(contract)
            .cloned()
            .ok_or_else(rpc_error)
    }

    async fn get_native_balance(
        &self,
        _chain: ChainId,
        _owner: &Address,
    ) -> Result<U256, DataError> {
        Ok(U256::from(2_000_000_000_000_000_000u64))
    }

    async fn get_nfts_for_owner(
        &self,
        chain: ChainId,
        query: &NftQuery,
    ) -> Result<Vec<OwnedNft>, DataError> {
        self.nft_queries.lock().push((chain, query.clone()));
        Ok(self
            .nfts
            .lock()
            .iter()
            .filter(|n| query.exclude_standard.as_ref() != Some(&n.standard))
            .take(query.page_size as usize)
            .cloned()
            .collect())
    }

    async fn get_gas_price(&self, chain: ChainId) -> Result<U256, DataError> {
        self.gas_chains.lock().push(chain);
        self.gas
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(U256::from(30_000_000_000u64)))
    }
}

fn service_with(
    config: &ActivityConfig,
    wallet: Option<Arc<MockWallet>>,
    provider: Arc<MockDataProvider>,
) -> ActivityService {
    ActivityService::new(
        config,
        provider,
        Arc::new(MemoryPreferenceStore::new()),
        wallet.map(|w| w as Arc<dyn WalletProvider>),
    )
    .unwrap()
}

fn service(wallet: Option<Arc<MockWallet>>, provider: Arc<MockDataProvider>) -> ActivityService {
    service_with(&ActivityConfig::default(), wallet, provider)
}

async fn connected(wallet: Arc<MockWallet>, provider: Arc<MockDataProvider>) -> ActivityService {
    let service = service(Some(wallet), provider);
    service.connect().await.unwrap().wait().await;
    service
}

// ============================================================================
// Connect Flow Tests
// ============================================================================

mod connect_flow {
    use super::*;

    #[tokio::test]
    async fn test_connect_loads_first_page_then_more() {
        let wallet = MockWallet::new(ChainId::ETHEREUM);
        let provider = MockDataProvider::new();
        provider.push_page(Ok(page(10, "a", Some("K1"))));
        provider.push_page(Ok(page(5, "b", None)));

        let service = connected(wallet, provider.clone()).await;

        let snapshot = service.snapshot();
        assert_eq!(snapshot.account, Some(account()));
        assert_eq!(snapshot.chain_id, Some(ChainId::ETHEREUM));
        assert_eq!(snapshot.phase, SessionPhase::Connected);
        assert!(!snapshot.connecting);
        assert_eq!(snapshot.transactions.len(), 10);
        assert!(snapshot.has_more);
        assert!(!snapshot.is_loading_activity);

        service.fetch_history(false).await.unwrap();
        let snapshot = service.snapshot();
        assert_eq!(snapshot.transactions.len(), 15);
        assert!(!snapshot.has_more);
        assert_eq!(snapshot.transactions[10].hash, "0xb0000");

        // Nothing left to load
        service.fetch_history(false).await.unwrap();
        assert_eq!(service.snapshot().transactions.len(), 15);

        let calls = provider.transfer_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], (ChainId::ETHEREUM, None));
        assert_eq!(calls[1], (ChainId::ETHEREUM, PageCursor::new("K1")));
    }

    #[tokio::test]
    async fn test_connect_loads_tokens_and_nfts() {
        let wallet = MockWallet::new(ChainId::ETHEREUM);
        let provider = MockDataProvider::new();
        provider.add_token("0x01", 1_500_000, Some(metadata("USDC", 6)));

        let service = connected(wallet, provider.clone()).await;
        let snapshot = service.snapshot();

        assert_eq!(snapshot.tokens.len(), 2);
        assert!(snapshot.tokens[0].is_native);
        assert_eq!(snapshot.tokens[0].symbol, "ETH");
        assert_eq!(snapshot.tokens[0].balance, "2.0000");
        assert_eq!(snapshot.tokens[1].balance, "1.5000");
        assert_eq!(provider.nft_queries.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_connect_without_wallet() {
        let service = service(None, MockDataProvider::new());
        let err = service.connect().await.unwrap_err();

        assert!(matches!(err, SessionError::ProviderUnavailable));
        let snapshot = service.snapshot();
        assert_eq!(snapshot.phase, SessionPhase::Disconnected);
        assert!(snapshot
            .error
            .unwrap()
            .message
            .contains("No wallet provider found"));
    }

    #[tokio::test]
    async fn test_user_rejection_is_silent() {
        for err in [WalletError::UserRejected, WalletError::RequestPending] {
            let wallet = MockWallet::new(ChainId::ETHEREUM);
            wallet.fail_accounts(err);
            let service = service(Some(wallet), MockDataProvider::new());

            let result = service.connect().await;
            assert!(matches!(result, Err(SessionError::UserRejected)));

            let snapshot = service.snapshot();
            assert!(snapshot.error.is_none());
            assert!(snapshot.account.is_none());
            assert!(!snapshot.connecting);
            assert_eq!(snapshot.phase, SessionPhase::Disconnected);
        }
    }

    #[tokio::test]
    async fn test_other_failure_is_reported() {
        let wallet = MockWallet::new(ChainId::ETHEREUM);
        wallet.fail_accounts(WalletError::Transport("connection refused".into()));
        let service = service(Some(wallet), MockDataProvider::new());

        assert!(service.connect().await.is_err());
        let snapshot = service.snapshot();
        assert_eq!(
            snapshot.error.unwrap().message,
            "Failed to connect wallet: wallet transport error: connection refused"
        );
        assert_eq!(snapshot.phase, SessionPhase::Disconnected);
    }

    #[tokio::test]
    async fn test_empty_account_list_fails() {
        let wallet = MockWallet::new(ChainId::ETHEREUM);
        wallet.set_accounts(vec![]);
        let service = service(Some(wallet), MockDataProvider::new());

        let err = service.connect().await.unwrap_err();
        assert!(matches!(err, SessionError::GenericConnectFailure(_)));
        assert!(service.snapshot().error.is_some());
    }

    #[tokio::test]
    async fn test_unsupported_wallet_chain_falls_back() {
        let wallet = MockWallet::new(ChainId::new(56));
        let service = connected(wallet, MockDataProvider::new()).await;
        assert_eq!(service.snapshot().chain_id, Some(ChainId::ETHEREUM));
    }

    #[tokio::test]
    async fn test_connect_clears_previous_error() {
        let wallet = MockWallet::new(ChainId::ETHEREUM);
        wallet.fail_accounts(WalletError::Transport("down".into()));
        let service = service(Some(wallet.clone()), MockDataProvider::new());
        let _ = service.connect().await;
        assert!(service.snapshot().error.is_some());

        wallet.set_accounts(vec![account()]);
        service.connect().await.unwrap().wait().await;
        assert!(service.snapshot().error.is_none());
    }

    #[tokio::test]
    async fn test_failed_connect_keeps_read_only_account() {
        let wallet = MockWallet::new(ChainId::ETHEREUM);
        wallet.fail_accounts(WalletError::Transport("down".into()));
        let service = service(Some(wallet), MockDataProvider::new());
        service.set_account(Some(other()));

        assert!(service.connect().await.is_err());

        let snapshot = service.snapshot();
        assert_eq!(snapshot.phase, SessionPhase::ReadOnly);
        assert_eq!(snapshot.account, Some(other()));
        assert!(!snapshot.connecting);
    }

    #[tokio::test]
    async fn test_load_more_right_after_connect_waits_for_first_page() {
        let wallet = MockWallet::new(ChainId::ETHEREUM);
        let provider = MockDataProvider::new();
        provider.push_page(Ok(page(10, "a", Some("K1"))));
        provider.push_page(Ok(page(10, "b", None)));
        let gate = provider.gate_transfers();
        let service = service(Some(wallet), provider.clone());

        let refresh = service.connect().await.unwrap();
        let pending = service.snapshot();
        assert!(pending.is_loading_activity);
        assert!(pending.transactions.is_empty());

        let more = tokio::spawn({
            let service = service.clone();
            async move { service.fetch_history(false).await }
        });
        tokio::time::timeout(Duration::from_secs(5), more)
            .await
            .expect("load-more must not reach the provider before the first page")
            .unwrap()
            .unwrap();

        gate.notify_one();
        refresh.wait().await;

        let snapshot = service.snapshot();
        assert_eq!(snapshot.transactions.len(), 10);
        assert_eq!(snapshot.transactions[0].hash, "0xa0000");
        assert!(snapshot.has_more);
        assert_eq!(provider.transfer_calls(), vec![(ChainId::ETHEREUM, None)]);
    }
}

// ============================================================================
// Disconnect and Wallet Event Tests
// ============================================================================

mod session_events {
    use super::*;

    #[tokio::test]
    async fn test_disconnect_resets_everything() {
        let wallet = MockWallet::new(ChainId::ETHEREUM);
        let provider = MockDataProvider::new();
        provider.push_page(Ok(page(10, "a", Some("K1"))));
        provider.add_token("0x01", 1, Some(metadata("DAI", 18)));

        let prefs = Arc::new(MemoryPreferenceStore::new());
        let service = ActivityService::new(
            &ActivityConfig::default(),
            provider,
            prefs.clone(),
            Some(wallet as Arc<dyn WalletProvider>),
        )
        .unwrap();
        service.connect().await.unwrap().wait().await;
        service.select_chain(ChainId::POLYGON).await.unwrap().wait().await;
        assert_eq!(prefs.current().unwrap().selected_chain, ChainId::POLYGON);

        service.disconnect();

        let snapshot = service.snapshot();
        assert!(snapshot.account.is_none());
        assert!(snapshot.chain_id.is_none());
        assert!(snapshot.transactions.is_empty());
        assert!(snapshot.tokens.is_empty());
        assert!(snapshot.nfts.is_empty());
        assert!(!snapshot.has_more);
        assert!(!snapshot.is_loading_activity);
        assert_eq!(snapshot.selected_chain, ChainId::ETHEREUM);
        assert_eq!(snapshot.phase, SessionPhase::Disconnected);
        assert_eq!(prefs.current().unwrap().selected_chain, ChainId::ETHEREUM);
    }

    #[tokio::test]
    async fn test_empty_accounts_event_disconnects() {
        let provider = MockDataProvider::new();
        provider.push_page(Ok(page(3, "a", None)));
        let service = connected(MockWallet::new(ChainId::ETHEREUM), provider).await;

        let hub = Arc::new(EventHub::new());
        let _binding = service.bind_wallet_events(hub.clone());
        hub.emit(&WalletEvent::AccountsChanged(vec![]));

        let snapshot = service.snapshot();
        assert!(snapshot.account.is_none());
        assert!(snapshot.transactions.is_empty());
        assert_eq!(snapshot.phase, SessionPhase::Disconnected);
    }

    #[tokio::test]
    async fn test_account_change_clears_without_refetch() {
        let provider = MockDataProvider::new();
        provider.push_page(Ok(page(3, "a", Some("K1"))));
        let service = connected(MockWallet::new(ChainId::ETHEREUM), provider.clone()).await;

        let hub = Arc::new(EventHub::new());
        let _binding = service.bind_wallet_events(hub.clone());

        // Same account: nothing changes
        hub.emit(&WalletEvent::AccountsChanged(vec![account()]));
        assert_eq!(service.snapshot().transactions.len(), 3);

        hub.emit(&WalletEvent::AccountsChanged(vec![other(), account()]));
        tokio::task::yield_now().await;

        let snapshot = service.snapshot();
        assert_eq!(snapshot.account, Some(other()));
        assert!(snapshot.transactions.is_empty());
        assert!(!snapshot.has_more);
        assert_eq!(snapshot.phase, SessionPhase::Connected);
        assert_eq!(provider.transfer_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_account_event_ignored_without_wallet_session() {
        let service = service(None, MockDataProvider::new());
        let hub = Arc::new(EventHub::new());
        let _binding = service.bind_wallet_events(hub.clone());

        hub.emit(&WalletEvent::AccountsChanged(vec![account()]));
        let snapshot = service.snapshot();
        assert!(snapshot.account.is_none());
        assert_eq!(snapshot.phase, SessionPhase::Disconnected);

        service.set_account(Some(other()));
        hub.emit(&WalletEvent::AccountsChanged(vec![account()]));
        let snapshot = service.snapshot();
        assert_eq!(snapshot.account, Some(other()));
        assert_eq!(snapshot.phase, SessionPhase::ReadOnly);
    }

    #[tokio::test]
    async fn test_chain_change_updates_chain_id_only() {
        let provider = MockDataProvider::new();
        provider.push_page(Ok(page(3, "a", None)));
        let service = connected(MockWallet::new(ChainId::ETHEREUM), provider).await;

        let hub = Arc::new(EventHub::new());
        let _binding = service.bind_wallet_events(hub.clone());
        hub.emit(&WalletEvent::ChainChanged(ChainId::ARBITRUM));

        let snapshot = service.snapshot();
        assert_eq!(snapshot.chain_id, Some(ChainId::ARBITRUM));
        assert_eq!(snapshot.selected_chain, ChainId::ETHEREUM);
        assert_eq!(snapshot.transactions.len(), 3);
        assert!(snapshot.account.is_some());
    }

    #[tokio::test]
    async fn test_dropping_binding_stops_events() {
        let service = connected(MockWallet::new(ChainId::ETHEREUM), MockDataProvider::new()).await;
        let hub = Arc::new(EventHub::new());

        let binding = service.bind_wallet_events(hub.clone());
        assert_eq!(hub.subscriber_count(), 2);
        drop(binding);
        assert_eq!(hub.subscriber_count(), 0);

        hub.emit(&WalletEvent::AccountsChanged(vec![]));
        assert!(service.snapshot().account.is_some());
    }

    #[tokio::test]
    async fn test_manual_account_is_read_only() {
        let service = service(None, MockDataProvider::new());
        service.set_account(Some(account()));
        assert_eq!(service.snapshot().phase, SessionPhase::ReadOnly);

        service.set_chain_id(ChainId::OPTIMISM);
        assert_eq!(service.snapshot().chain_id, Some(ChainId::OPTIMISM));

        service.select_chain(ChainId::POLYGON).await.unwrap().wait().await;
        service.set_account(None);

        let snapshot = service.snapshot();
        assert!(snapshot.account.is_none());
        assert!(snapshot.chain_id.is_none());
        assert_eq!(snapshot.phase, SessionPhase::Disconnected);
        assert_eq!(snapshot.selected_chain, ChainId::POLYGON);
    }
}

// ============================================================================
// History Tests
// ============================================================================

mod history {
    use super::*;

    fn read_only(provider: Arc<MockDataProvider>) -> ActivityService {
        let service = service(None, provider);
        service.set_account(Some(account()));
        service
    }

    #[tokio::test]
    async fn test_reset_replaces_list() {
        let provider = MockDataProvider::new();
        provider.push_page(Ok(page(10, "a", Some("K1"))));
        provider.push_page(Ok(page(3, "b", None)));
        let service = read_only(provider.clone());

        service.fetch_history(true).await.unwrap();
        service.fetch_history(true).await.unwrap();

        let snapshot = service.snapshot();
        assert_eq!(snapshot.transactions.len(), 3);
        assert_eq!(snapshot.transactions[0].hash, "0xb0000");
        assert!(!snapshot.has_more);
        assert_eq!(provider.transfer_calls()[1].1, None);
    }

    #[tokio::test]
    async fn test_pages_never_shrink() {
        let provider = MockDataProvider::new();
        provider.push_page(Ok(page(10, "a", Some("K1"))));
        provider.push_page(Ok(page(10, "b", Some("K2"))));
        provider.push_page(Ok(page(0, "c", Some("K3"))));
        provider.push_page(Ok(page(4, "d", None)));
        let service = read_only(provider);

        service.fetch_history(true).await.unwrap();
        let mut previous = service.snapshot().transactions.len();
        for _ in 0..3 {
            service.fetch_history(false).await.unwrap();
            let snapshot = service.snapshot();
            assert!(snapshot.transactions.len() >= previous);
            previous = snapshot.transactions.len();
        }

        let snapshot = service.snapshot();
        assert_eq!(snapshot.transactions.len(), 24);
        assert!(!snapshot.has_more);
    }

    #[tokio::test]
    async fn test_failure_reports_and_clears_loading() {
        let provider = MockDataProvider::new();
        provider.push_page(Err(rpc_error()));
        let service = read_only(provider);

        let err = service.fetch_history(true).await.unwrap_err();
        assert!(matches!(err, SessionError::HistoryFetchFailed(_)));

        let snapshot = service.snapshot();
        assert!(!snapshot.is_loading_activity);
        assert_eq!(snapshot.error.unwrap().message, "Failed to fetch history");
    }

    #[tokio::test]
    async fn test_without_account_is_noop() {
        let provider = MockDataProvider::new();
        let service = service(None, provider.clone());
        service.fetch_history(true).await.unwrap();
        assert!(provider.transfer_calls().is_empty());
        assert!(!service.snapshot().is_loading_activity);
    }

    #[tokio::test]
    async fn test_transactions_carry_chain() {
        let provider = MockDataProvider::new();
        provider.push_page(Ok(page(2, "a", None)));
        let service = read_only(provider);
        service.select_chain(ChainId::OPTIMISM).await.unwrap().wait().await;

        let snapshot = service.snapshot();
        assert_eq!(snapshot.transactions.len(), 2);
        assert!(snapshot
            .transactions
            .iter()
            .all(|tx| tx.chain_id == ChainId::OPTIMISM));
    }

    #[tokio::test]
    async fn test_page_after_account_change_is_discarded() {
        let provider = MockDataProvider::new();
        provider.push_page(Ok(page(10, "a", Some("K1"))));
        let gate = provider.gate_transfers();
        let service = read_only(provider.clone());

        let task = tokio::spawn({
            let service = service.clone();
            async move { service.fetch_history(true).await }
        });
        while provider.transfer_calls().is_empty() {
            tokio::task::yield_now().await;
        }
        assert!(service.snapshot().is_loading_activity);

        service.set_account(Some(other()));
        gate.notify_one();
        task.await.unwrap().unwrap();

        let snapshot = service.snapshot();
        assert_eq!(snapshot.account, Some(other()));
        assert!(snapshot.transactions.is_empty());
        assert!(!snapshot.has_more);
        assert!(!snapshot.is_loading_activity);
    }

    #[tokio::test]
    async fn test_late_page_applies_when_not_discarding() {
        let provider = MockDataProvider::new();
        provider.push_page(Ok(page(10, "a", Some("K1"))));
        let gate = provider.gate_transfers();

        let config = ActivityConfig {
            discard_stale_results: false,
            ..Default::default()
        };
        let service = service_with(&config, None, provider.clone());
        service.set_account(Some(account()));

        let task = tokio::spawn({
            let service = service.clone();
            async move { service.fetch_history(true).await }
        });
        while provider.transfer_calls().is_empty() {
            tokio::task::yield_now().await;
        }

        service.set_account(Some(other()));
        gate.notify_one();
        task.await.unwrap().unwrap();

        let snapshot = service.snapshot();
        assert_eq!(snapshot.account, Some(other()));
        assert_eq!(snapshot.transactions.len(), 10);
    }
}

// ============================================================================
// Chain Switch Tests
// ============================================================================

mod chain_switch {
    use super::*;

    #[tokio::test]
    async fn test_selection_precedes_wallet_confirmation() {
        let wallet = MockWallet::new(ChainId::ETHEREUM);
        let provider = MockDataProvider::new();
        provider.push_page(Ok(page(10, "a", Some("K1"))));
        provider.push_page(Ok(page(4, "p", None)));
        let service = connected(wallet.clone(), provider.clone()).await;

        let gate = wallet.gate_switch();
        let task = tokio::spawn({
            let service = service.clone();
            async move { service.select_chain(ChainId::POLYGON).await }
        });
        while !wallet.calls().contains(&"switch:0x89".to_string()) {
            tokio::task::yield_now().await;
        }

        let pending = service.snapshot();
        assert_eq!(pending.selected_chain, ChainId::POLYGON);
        assert!(pending.transactions.is_empty());

        gate.notify_one();
        task.await.unwrap().unwrap().wait().await;

        let snapshot = service.snapshot();
        assert_eq!(wallet.chain(), ChainId::POLYGON);
        assert_eq!(snapshot.transactions.len(), 4);
        assert_eq!(snapshot.transactions[0].chain_id, ChainId::POLYGON);
        assert_eq!(
            provider.transfer_calls().last(),
            Some(&(ChainId::POLYGON, None))
        );
        assert_eq!(provider.token_chains.lock().last(), Some(&ChainId::POLYGON));
        assert_eq!(provider.nft_queries.lock().last().unwrap().0, ChainId::POLYGON);
    }

    #[tokio::test]
    async fn test_unknown_chain_is_added_then_switched() {
        let wallet = MockWallet::new(ChainId::ETHEREUM);
        wallet.forget_chain(ChainId::ARBITRUM);
        let service = connected(wallet.clone(), MockDataProvider::new()).await;

        service.select_chain(ChainId::ARBITRUM).await.unwrap().wait().await;

        let calls = wallet.calls();
        assert_eq!(
            &calls[calls.len() - 3..],
            &["switch:0xa4b1", "add:0xa4b1", "switch:0xa4b1"]
        );
        assert_eq!(wallet.chain(), ChainId::ARBITRUM);
        assert!(service.snapshot().error.is_none());
    }

    #[tokio::test]
    async fn test_switch_failure_keeps_selection() {
        let wallet = MockWallet::new(ChainId::ETHEREUM);
        let service = connected(wallet.clone(), MockDataProvider::new()).await;
        wallet.fail_switch(WalletError::Rpc {
            code: -32603,
            message: "internal error".into(),
        });

        let err = service.select_chain(ChainId::POLYGON).await.unwrap_err();
        assert!(matches!(err, SessionError::NetworkSwitchFailed(_)));

        let snapshot = service.snapshot();
        assert_eq!(snapshot.selected_chain, ChainId::POLYGON);
        assert!(snapshot
            .error
            .unwrap()
            .message
            .starts_with("Failed to switch network"));
    }

    #[tokio::test]
    async fn test_switch_rejection_is_silent() {
        let wallet = MockWallet::new(ChainId::ETHEREUM);
        let provider = MockDataProvider::new();
        let service = connected(wallet.clone(), provider.clone()).await;
        wallet.fail_switch(WalletError::UserRejected);

        let refresh = service.select_chain(ChainId::POLYGON).await.unwrap();
        assert!(refresh.is_empty());

        let snapshot = service.snapshot();
        assert_eq!(snapshot.selected_chain, ChainId::POLYGON);
        assert!(snapshot.error.is_none());
        assert_eq!(provider.transfer_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_chain_rejected() {
        let wallet = MockWallet::new(ChainId::ETHEREUM);
        let service = connected(wallet.clone(), MockDataProvider::new()).await;
        let before = wallet.calls().len();

        let err = service.select_chain(ChainId::new(56)).await.unwrap_err();
        assert!(matches!(err, SessionError::UnsupportedChain(_)));
        assert_eq!(service.snapshot().selected_chain, ChainId::ETHEREUM);
        assert_eq!(wallet.calls().len(), before);
    }

    #[tokio::test]
    async fn test_read_only_switch_refetches_without_wallet() {
        let provider = MockDataProvider::new();
        let service = service(None, provider.clone());
        service.set_account(Some(account()));

        let refresh = service.select_chain(ChainId::OPTIMISM).await.unwrap();
        assert!(!refresh.is_empty());
        refresh.wait().await;

        assert_eq!(
            provider.transfer_calls(),
            vec![(ChainId::OPTIMISM, None)]
        );
    }

    #[tokio::test]
    async fn test_switch_without_session_only_selects() {
        let provider = MockDataProvider::new();
        let service = service(None, provider.clone());

        let refresh = service.select_chain(ChainId::POLYGON).await.unwrap();
        assert!(refresh.is_empty());
        assert_eq!(service.snapshot().selected_chain, ChainId::POLYGON);
        assert!(provider.transfer_calls().is_empty());
    }
}

// ============================================================================
// Portfolio Tests
// ============================================================================

mod portfolio {
    use super::*;

    #[tokio::test]
    async fn test_metadata_failure_excludes_token() {
        let provider = MockDataProvider::new();
        provider.add_token("0x01", 1_000_000, Some(metadata("USDC", 6)));
        provider.add_token("0x02", 5_000_000_000_000_000_000, Some(metadata("DAI", 18)));
        provider.add_token("0x03", 0, Some(metadata("ZERO", 18)));
        provider.add_token("0x04", 123_456, None);
        provider.add_token("0x05", 42, Some(metadata("LINK", 0)));
        provider.add_token(
            "0x06",
            1,
            Some(TokenMetadata {
                symbol: None,
                name: None,
                decimals: None,
                logo: None,
            }),
        );

        let service = service(None, provider.clone());
        service.set_account(Some(account()));
        service.fetch_tokens().await;

        let snapshot = service.snapshot();
        assert_eq!(snapshot.tokens.len(), 5);
        assert!(snapshot.tokens[0].is_native);
        assert_eq!(
            snapshot.tokens[0].contract_address,
            "0x0000000000000000000000000000000000000000"
        );
        let symbols: Vec<&str> = snapshot.tokens.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["ETH", "USDC", "DAI", "LINK", "UNKNOWN"]);
        assert_eq!(snapshot.tokens[4].name, "Unknown Token");
        assert_eq!(snapshot.tokens[4].balance, "0.0000");
        assert!(snapshot.error.is_none());
        assert_eq!(*provider.metadata_calls.lock(), 5);
    }

    #[tokio::test]
    async fn test_token_limit() {
        let provider = MockDataProvider::new();
        for i in 0..25 {
            let contract = format!("0x{:02x}", i);
            provider.add_token(&contract, 1_000, Some(metadata("TKN", 3)));
        }

        let service = service(None, provider.clone());
        service.set_account(Some(account()));
        service.fetch_tokens().await;

        assert_eq!(service.snapshot().tokens.len(), 21);
        assert_eq!(*provider.metadata_calls.lock(), 20);
    }

    #[tokio::test]
    async fn test_balance_failure_is_logged_only() {
        let provider = MockDataProvider::new();
        *provider.fail_balances.lock() = true;

        let service = service(None, provider);
        service.set_account(Some(account()));
        service.fetch_tokens().await;

        let snapshot = service.snapshot();
        assert!(snapshot.tokens.is_empty());
        assert!(snapshot.error.is_none());
    }

    #[tokio::test]
    async fn test_nfts_exclude_erc1155() {
        let provider = MockDataProvider::new();
        {
            let mut nfts = provider.nfts.lock();
            for i in 0..15 {
                nfts.push(OwnedNft {
                    contract_address: "0xc0".into(),
                    token_id: i.to_string(),
                    name: None,
                    collection_name: Some("Cool Cats".into()),
                    image: None,
                    standard: if i % 5 == 0 {
                        NftStandard::Erc1155
                    } else {
                        NftStandard::Erc721
                    },
                });
            }
        }

        let service = service(None, provider.clone());
        service.set_account(Some(account()));
        service.fetch_nfts().await;

        let snapshot = service.snapshot();
        assert_eq!(snapshot.nfts.len(), 12);
        assert!(snapshot
            .nfts
            .iter()
            .all(|n| n.standard == NftStandard::Erc721));
        assert_eq!(snapshot.nfts[0].name, "#1");

        let queries = provider.nft_queries.lock();
        assert_eq!(queries[0].1.page_size, 12);
        assert_eq!(queries[0].1.exclude_standard, Some(NftStandard::Erc1155));
    }
}

// ============================================================================
// Gas Monitor Tests
// ============================================================================

mod gas_monitor {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_polls_on_mount_and_interval() {
        let provider = MockDataProvider::new();
        provider.push_gas(Ok(U256::from(21_400_000_000u64)));
        provider.push_gas(Ok(U256::from(35_600_000_000u64)));
        let service = service(None, provider.clone());

        let _watch = service.watch_gas();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(provider.gas_chains().len(), 1);
        assert_eq!(service.snapshot().gas_price.as_deref(), Some("21"));

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(provider.gas_chains().len(), 2);
        assert_eq!(service.snapshot().gas_price.as_deref(), Some("36"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_last_value() {
        let provider = MockDataProvider::new();
        provider.push_gas(Ok(U256::from(20_000_000_000u64)));
        provider.push_gas(Err(rpc_error()));
        let service = service(None, provider.clone());

        let _watch = service.watch_gas();
        tokio::time::sleep(Duration::from_secs(16)).await;

        assert_eq!(provider.gas_chains().len(), 2);
        let snapshot = service.snapshot();
        assert_eq!(snapshot.gas_price.as_deref(), Some("20"));
        assert!(snapshot.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_last_watch_dropped() {
        let provider = MockDataProvider::new();
        let service = service(None, provider.clone());

        let first = service.watch_gas();
        let second = service.watch_gas();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(provider.gas_chains().len(), 1);

        drop(first);
        assert!(service.is_gas_polling());
        drop(second);
        assert!(!service.is_gas_polling());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(provider.gas_chains().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chain_change_polls_immediately() {
        let provider = MockDataProvider::new();
        let service = service(None, provider.clone());

        let _watch = service.watch_gas();
        tokio::time::sleep(Duration::from_millis(10)).await;

        service.select_chain(ChainId::POLYGON).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(
            provider.gas_chains(),
            vec![ChainId::ETHEREUM, ChainId::POLYGON]
        );
    }

    #[tokio::test]
    async fn test_one_shot_fetch() {
        let provider = MockDataProvider::new();
        provider.push_gas(Ok(U256::from(1_500_000_000u64)));
        let service = service(None, provider);

        service.fetch_gas_price().await;
        assert_eq!(service.snapshot().gas_price.as_deref(), Some("2"));
    }
}

// ============================================================================
// Error Channel Tests
// ============================================================================

mod error_channel {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_new_error_restarts_timer() {
        let provider = MockDataProvider::new();
        provider.push_page(Err(rpc_error()));
        provider.push_page(Err(rpc_error()));
        let service = service(None, provider);
        service.set_account(Some(account()));

        let _ = service.fetch_history(true).await;
        assert!(service.snapshot().error.is_some());

        tokio::time::sleep(Duration::from_secs(3)).await;
        let _ = service.fetch_history(true).await;

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(service.snapshot().error.is_some());

        tokio::time::sleep(Duration::from_millis(2_100)).await;
        assert!(service.snapshot().error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_error_is_immediate() {
        let service = service(None, MockDataProvider::new());
        let _ = service.connect().await;
        assert!(service.snapshot().error.is_some());

        service.clear_error();
        assert!(service.snapshot().error.is_none());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(service.snapshot().error.is_none());
    }
}

// ============================================================================
// Persistence Tests
// ============================================================================

mod persistence {
    use super::*;

    #[tokio::test]
    async fn test_selection_survives_restart() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("prefs.json");
        let config = ActivityConfig::default();

        let first = ActivityService::new(
            &config,
            MockDataProvider::new(),
            Arc::new(FilePreferenceStore::new(&path)),
            None,
        )
        .unwrap();
        first.select_chain(ChainId::ARBITRUM).await.unwrap();

        let second = ActivityService::new(
            &config,
            MockDataProvider::new(),
            Arc::new(FilePreferenceStore::new(&path)),
            None,
        )
        .unwrap();
        assert_eq!(second.snapshot().selected_chain, ChainId::ARBITRUM);
        assert!(second.snapshot().account.is_none());
    }

    #[tokio::test]
    async fn test_unreadable_preferences_fall_back() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("prefs.json");
        std::fs::write(&path, "{ broken").unwrap();

        let store = FilePreferenceStore::new(&path);
        assert!(store.load().is_err());

        let service = ActivityService::new(
            &ActivityConfig::default(),
            MockDataProvider::new(),
            Arc::new(store),
            None,
        )
        .unwrap();
        assert_eq!(service.snapshot().selected_chain, ChainId::ETHEREUM);
    }
}
