//! Observable session state
//!
//! [`StateStore`] owns the one [`Snapshot`] every component reads and writes.
//! Each mutation runs under a mutex and publishes the new snapshot on a
//! `tokio::sync::watch` channel. The selected chain is written through to a
//! [`PreferenceStore`].
//!
//! Fetches are tagged with the [`FetchContext`] they were issued in. The
//! context epoch advances whenever the account or selected chain changes, so
//! results that resolve afterwards can be recognised and dropped.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::chains::{ChainId, ChainRegistry};
use crate::persistence::{ChainSelection, PreferenceStore};
use crate::types::{Address, ErrorState, Nft, PageCursor, SessionPhase, Token, Transaction};

/// Everything a presentation layer renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub account: Option<Address>,
    /// Chain reported by the wallet, resolved against the registry
    pub chain_id: Option<ChainId>,
    pub connecting: bool,
    pub phase: SessionPhase,
    pub is_loading_activity: bool,
    pub transactions: Vec<Transaction>,
    pub selected_chain: ChainId,
    pub tokens: Vec<Token>,
    pub nfts: Vec<Nft>,
    /// Integer gwei
    pub gas_price: Option<String>,
    pub error: Option<ErrorState>,
    /// Derived from `page_cursor` on every publish
    pub has_more: bool,
    #[serde(skip)]
    pub page_cursor: Option<PageCursor>,
}

impl Snapshot {
    fn new(selected_chain: ChainId) -> Self {
        Self {
            account: None,
            chain_id: None,
            connecting: false,
            phase: SessionPhase::Disconnected,
            is_loading_activity: false,
            transactions: Vec::new(),
            selected_chain,
            tokens: Vec::new(),
            nfts: Vec::new(),
            gas_price: None,
            error: None,
            has_more: false,
            page_cursor: None,
        }
    }

    /// Drop everything scoped to the current (account, chain) pair.
    pub(crate) fn clear_collections(&mut self) {
        self.transactions.clear();
        self.tokens.clear();
        self.nfts.clear();
        self.page_cursor = None;
        self.is_loading_activity = false;
    }
}

/// The (account, chain) pair a fetch was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchContext {
    pub epoch: u64,
    pub account: Option<Address>,
    pub chain: ChainId,
}

struct StoreState {
    snapshot: Snapshot,
    epoch: u64,
}

impl StoreState {
    fn context(&self) -> FetchContext {
        FetchContext {
            epoch: self.epoch,
            account: self.snapshot.account.clone(),
            chain: self.snapshot.selected_chain,
        }
    }
}

struct Inner {
    state: Mutex<StoreState>,
    tx: watch::Sender<Snapshot>,
    preferences: Arc<dyn PreferenceStore>,
    default_chain: ChainId,
    discard_stale: bool,
}

/// Shared, cloneable handle to the session state.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<Inner>,
}

impl StateStore {
    /// Create the store, restoring the persisted chain selection.
    ///
    /// A missing, unreadable or unsupported selection falls back to the
    /// registry default.
    pub fn new(
        registry: &ChainRegistry,
        preferences: Arc<dyn PreferenceStore>,
        discard_stale: bool,
    ) -> Self {
        let default_chain = registry.default_chain();
        let selected_chain = match preferences.load() {
            Ok(Some(selection)) if registry.contains(selection.selected_chain) => {
                debug!("Restored selected chain {}", selection.selected_chain);
                selection.selected_chain
            }
            Ok(Some(selection)) => {
                warn!(
                    "Persisted chain {} is not supported, using {}",
                    selection.selected_chain, default_chain
                );
                default_chain
            }
            Ok(None) => default_chain,
            Err(e) => {
                warn!("Failed to load preferences: {}", e);
                default_chain
            }
        };

        let snapshot = Snapshot::new(selected_chain);
        let (tx, _) = watch::channel(snapshot.clone());

        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(StoreState { snapshot, epoch: 0 }),
                tx,
                preferences,
                default_chain,
                discard_stale,
            }),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.state.lock().snapshot.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.inner.tx.subscribe()
    }

    pub fn default_chain(&self) -> ChainId {
        self.inner.default_chain
    }

    pub fn context(&self) -> FetchContext {
        self.inner.state.lock().context()
    }

    fn publish(&self, state: &mut StoreState) {
        state.snapshot.has_more = state.snapshot.page_cursor.is_some();
        self.inner.tx.send_replace(state.snapshot.clone());
    }

    /// Apply `f` and publish.
    pub fn update<R>(&self, f: impl FnOnce(&mut Snapshot) -> R) -> R {
        let mut state = self.inner.state.lock();
        let result = f(&mut state.snapshot);
        self.publish(&mut state);
        result
    }

    /// Apply `f` and publish, returning the context it ran in.
    pub fn begin<R>(&self, f: impl FnOnce(&mut Snapshot) -> R) -> (FetchContext, R) {
        let mut state = self.inner.state.lock();
        let result = f(&mut state.snapshot);
        let ctx = state.context();
        self.publish(&mut state);
        (ctx, result)
    }

    /// Whether results issued in `ctx` may still be applied.
    pub fn is_current(&self, ctx: &FetchContext) -> bool {
        !self.inner.discard_stale || self.inner.state.lock().epoch == ctx.epoch
    }

    /// Apply `f` only while `ctx` is still current.
    pub fn update_if_current<R>(
        &self,
        ctx: &FetchContext,
        f: impl FnOnce(&mut Snapshot) -> R,
    ) -> Option<R> {
        let mut state = self.inner.state.lock();
        if self.inner.discard_stale && state.epoch != ctx.epoch {
            debug!(
                "Discarding result for stale context {} (now {})",
                ctx.epoch, state.epoch
            );
            return None;
        }
        let result = f(&mut state.snapshot);
        self.publish(&mut state);
        Some(result)
    }

    /// Apply `f`, clear the collections and start a new fetch context.
    pub fn reset_context(&self, f: impl FnOnce(&mut Snapshot)) -> FetchContext {
        let mut state = self.inner.state.lock();
        f(&mut state.snapshot);
        state.snapshot.clear_collections();
        state.epoch += 1;
        let ctx = state.context();
        self.publish(&mut state);
        ctx
    }

    /// Set the selected chain and persist it.
    ///
    /// Returns `true` if the chain changed, in which case a new fetch context
    /// was started.
    pub fn select_chain(&self, chain: ChainId) -> bool {
        let changed = {
            let mut state = self.inner.state.lock();
            let changed = state.snapshot.selected_chain != chain;
            state.snapshot.selected_chain = chain;
            if changed {
                state.snapshot.clear_collections();
                state.epoch += 1;
            }
            self.publish(&mut state);
            changed
        };
        self.persist(chain);
        changed
    }

    /// Write the selection through to the preference store.
    pub fn persist(&self, chain: ChainId) {
        let selection = ChainSelection {
            selected_chain: chain,
        };
        if let Err(e) = self.inner.preferences.save(&selection) {
            warn!("Failed to persist chain selection: {}", e);
        }
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("StateStore")
            .field("epoch", &state.epoch)
            .field("snapshot", &state.snapshot)
            .finish()
    }
}
