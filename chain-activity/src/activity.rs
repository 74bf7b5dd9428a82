//! Paginated transaction history for the session account.
//!
//! Pages are appended in arrival order; the next page is only requested when
//! the caller asks for it.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::chains::{ChainInfo, ChainRegistry};
use crate::data_provider::{DataProvider, Transfer, TransferQuery};
use crate::error::{Result, SessionError};
use crate::error_channel::ErrorChannel;
use crate::store::{FetchContext, StateStore};
use crate::types::{Address, PageCursor, Transaction, TxStatus};

/// Convert a provider transfer into an activity entry.
pub fn map_transfer(transfer: Transfer, chain: &ChainInfo) -> Transaction {
    Transaction {
        hash: transfer.hash,
        from: transfer.from,
        to: transfer.to.unwrap_or_default(),
        value: transfer
            .value
            .map(|v| v.to_string())
            .unwrap_or_else(|| "0".to_string()),
        value_usd: None,
        timestamp: transfer
            .block_timestamp
            .unwrap_or_else(Utc::now)
            .timestamp_millis(),
        status: TxStatus::Confirmed,
        chain_id: chain.id,
        token_symbol: transfer
            .asset
            .unwrap_or_else(|| chain.currency.to_string()),
    }
}

/// A history page request bound to the fetch context it was issued in.
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub ctx: FetchContext,
    pub account: Address,
    pub cursor: Option<PageCursor>,
}

#[derive(Clone)]
pub struct ActivityFetcher {
    provider: Arc<dyn DataProvider>,
    store: StateStore,
    errors: ErrorChannel,
    registry: ChainRegistry,
    page_size: u32,
}

impl ActivityFetcher {
    pub fn new(
        provider: Arc<dyn DataProvider>,
        store: StateStore,
        errors: ErrorChannel,
        registry: ChainRegistry,
        page_size: u32,
    ) -> Self {
        Self {
            provider,
            store,
            errors,
            registry,
            page_size,
        }
    }

    /// Load the first page (`reset`) or the next page of history.
    ///
    /// Does nothing without an account, or when asked for more after the
    /// last page.
    pub async fn fetch_history(&self, reset: bool) -> Result<()> {
        match self.begin(reset) {
            Some(request) => self.fetch_page(request).await,
            None => {
                debug!("No history to fetch (reset: {})", reset);
                Ok(())
            }
        }
    }

    /// Apply the synchronous part of a history fetch and mark it loading.
    ///
    /// A reset clears the list and cursor here, so a load-more issued after
    /// this returns cannot race ahead of the first page. Asking for more
    /// while the first page is still loading yields `None`.
    pub fn begin(&self, reset: bool) -> Option<PageRequest> {
        let (ctx, cursor) = self.store.begin(|s| {
            if s.account.is_none() {
                return None;
            }
            if reset {
                s.transactions.clear();
                s.page_cursor = None;
            } else if s.page_cursor.is_none()
                && (s.is_loading_activity || !s.transactions.is_empty())
            {
                return None;
            }
            s.is_loading_activity = true;
            Some(s.page_cursor.clone())
        });

        let cursor = cursor?;
        let account = ctx.account.clone()?;
        Some(PageRequest {
            ctx,
            account,
            cursor,
        })
    }

    /// Request one page and append it to the list.
    ///
    /// The loading flag is cleared when the request settles.
    pub async fn fetch_page(&self, request: PageRequest) -> Result<()> {
        let ctx = &request.ctx;
        let chain = *self.registry.resolve(ctx.chain);
        let query = TransferQuery::sent_by(request.account, self.page_size, request.cursor);

        match self.provider.get_transfers(chain.id, &query).await {
            Ok(page) => {
                let transactions: Vec<Transaction> = page
                    .transfers
                    .into_iter()
                    .map(|t| map_transfer(t, &chain))
                    .collect();
                let count = transactions.len();
                let applied = self.store.update_if_current(ctx, |s| {
                    s.transactions.extend(transactions);
                    s.page_cursor = page.next_cursor;
                    s.is_loading_activity = false;
                    s.transactions.len()
                });
                if let Some(total) = applied {
                    info!(
                        "Loaded {} transactions on {} ({} total)",
                        count, chain.name, total
                    );
                }
                Ok(())
            }
            Err(e) => {
                warn!("History fetch on {} failed: {}", chain.name, e);
                let err = SessionError::HistoryFetchFailed(e);
                let current = self
                    .store
                    .update_if_current(ctx, |s| s.is_loading_activity = false)
                    .is_some();
                if current {
                    self.errors.report(&err);
                }
                Err(err)
            }
        }
    }
}
