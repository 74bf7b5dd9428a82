//! Blockchain data provider capability.
//!
//! Everything the fetchers read from the chain goes through [`DataProvider`].
//! Requests name the chain explicitly; implementations map it to their own
//! network identifiers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use primitive_types::U256;

use crate::chains::ChainId;
use crate::error::DataError;
use crate::types::{Address, NftStandard, PageCursor};

/// Transfer categories understood by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferCategory {
    External,
    Erc20,
}

impl TransferCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::External => "external",
            Self::Erc20 => "erc20",
        }
    }
}

/// Filters for one page of outgoing transfers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferQuery {
    pub from_address: Address,
    pub from_block: u64,
    pub categories: Vec<TransferCategory>,
    pub max_count: u32,
    pub newest_first: bool,
    pub cursor: Option<PageCursor>,
}

impl TransferQuery {
    /// External and ERC-20 transfers sent by `account`, newest first.
    pub fn sent_by(account: Address, page_size: u32, cursor: Option<PageCursor>) -> Self {
        Self {
            from_address: account,
            from_block: 0,
            categories: vec![TransferCategory::External, TransferCategory::Erc20],
            max_count: page_size,
            newest_first: true,
            cursor,
        }
    }
}

/// A transfer as reported by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    pub hash: String,
    pub from: String,
    pub to: Option<String>,
    /// Amount in display units
    pub value: Option<f64>,
    pub asset: Option<String>,
    pub block_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransferPage {
    pub transfers: Vec<Transfer>,
    pub next_cursor: Option<PageCursor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTokenBalance {
    pub contract_address: String,
    pub raw_balance: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TokenMetadata {
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub decimals: Option<u8>,
    pub logo: Option<String>,
}

/// Filters for an NFT ownership query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NftQuery {
    pub owner: Address,
    pub page_size: u32,
    pub exclude_standard: Option<NftStandard>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedNft {
    pub contract_address: String,
    pub token_id: String,
    pub name: Option<String>,
    pub collection_name: Option<String>,
    pub image: Option<String>,
    pub standard: NftStandard,
}

/// Read access to indexed chain data.
#[async_trait]
pub trait DataProvider: Send + Sync {
    async fn get_transfers(
        &self,
        chain: ChainId,
        query: &TransferQuery,
    ) -> Result<TransferPage, DataError>;

    async fn get_token_balances(
        &self,
        chain: ChainId,
        owner: &Address,
    ) -> Result<Vec<RawTokenBalance>, DataError>;

    async fn get_token_metadata(
        &self,
        chain: ChainId,
        contract: &str,
    ) -> Result<TokenMetadata, DataError>;

    /// Native balance in wei.
    async fn get_native_balance(&self, chain: ChainId, owner: &Address)
        -> Result<U256, DataError>;

    async fn get_nfts_for_owner(
        &self,
        chain: ChainId,
        query: &NftQuery,
    ) -> Result<Vec<OwnedNft>, DataError>;

    /// Current gas price in wei.
    async fn get_gas_price(&self, chain: ChainId) -> Result<U256, DataError>;
}
