//! Alchemy-backed [`DataProvider`].
//!
//! Transfers, balances, metadata and gas go through the per-network JSON-RPC
//! endpoint (`https://{network}.g.alchemy.com/v2/{key}`); NFT ownership uses
//! the NFT REST API on the same host.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use primitive_types::U256;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::chains::{ChainId, ChainRegistry};
use crate::data_provider::{
    DataProvider, NftQuery, OwnedNft, RawTokenBalance, TokenMetadata, Transfer, TransferPage,
    TransferQuery,
};
use crate::error::DataError;
use crate::rpc::{http_client, parse_quantity, JsonRpcClient};
use crate::types::{Address, NftStandard, PageCursor};

/// Host template; `{network}` is replaced by the chain's network slug.
pub const DEFAULT_ENDPOINT: &str = "https://{network}.g.alchemy.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetTransfersResult {
    #[serde(default)]
    transfers: Vec<RawTransfer>,
    page_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTransfer {
    hash: String,
    from: String,
    to: Option<String>,
    value: Option<f64>,
    asset: Option<String>,
    metadata: Option<RawTransferMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTransferMetadata {
    block_timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenBalancesResult {
    #[serde(default)]
    token_balances: Vec<RawBalanceEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBalanceEntry {
    contract_address: String,
    token_balance: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTokenMetadata {
    symbol: Option<String>,
    name: Option<String>,
    decimals: Option<u8>,
    logo: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NftsForOwnerResponse {
    #[serde(default)]
    owned_nfts: Vec<RawNft>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNft {
    contract: RawNftContract,
    token_id: String,
    name: Option<String>,
    token_type: Option<String>,
    image: Option<RawNftImage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNftContract {
    address: String,
    name: Option<String>,
    token_type: Option<String>,
    open_sea_metadata: Option<RawOpenSeaMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOpenSeaMetadata {
    collection_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNftImage {
    cached_url: Option<String>,
    original_url: Option<String>,
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Decode an `alchemy_getAssetTransfers` result.
pub(crate) fn parse_transfers(result: Value) -> Result<TransferPage, DataError> {
    let raw: AssetTransfersResult = serde_json::from_value(result)?;
    let transfers = raw
        .transfers
        .into_iter()
        .map(|t| Transfer {
            hash: t.hash,
            from: t.from,
            to: t.to,
            value: t.value,
            asset: t.asset,
            block_timestamp: t
                .metadata
                .and_then(|m| m.block_timestamp)
                .and_then(|ts| parse_timestamp(&ts)),
        })
        .collect();

    Ok(TransferPage {
        transfers,
        next_cursor: raw.page_key.and_then(PageCursor::new),
    })
}

/// Decode an `alchemy_getTokenBalances` result.
///
/// Entries with a missing or unparseable balance are reported as zero.
pub(crate) fn parse_token_balances(result: Value) -> Result<Vec<RawTokenBalance>, DataError> {
    let raw: TokenBalancesResult = serde_json::from_value(result)?;
    Ok(raw
        .token_balances
        .into_iter()
        .map(|entry| RawTokenBalance {
            raw_balance: entry
                .token_balance
                .as_deref()
                .and_then(parse_quantity)
                .unwrap_or_default(),
            contract_address: entry.contract_address,
        })
        .collect())
}

pub(crate) fn parse_token_metadata(result: Value) -> Result<TokenMetadata, DataError> {
    let raw: RawTokenMetadata = serde_json::from_value(result)?;
    Ok(TokenMetadata {
        symbol: raw.symbol.filter(|s| !s.is_empty()),
        name: raw.name.filter(|s| !s.is_empty()),
        decimals: raw.decimals,
        logo: raw.logo.filter(|s| !s.is_empty()),
    })
}

/// Decode a `getNFTsForOwner` response, dropping `exclude` if set.
pub(crate) fn parse_nfts(
    body: Value,
    exclude: Option<&NftStandard>,
) -> Result<Vec<OwnedNft>, DataError> {
    let raw: NftsForOwnerResponse = serde_json::from_value(body)?;
    Ok(raw
        .owned_nfts
        .into_iter()
        .map(|nft| {
            let standard = nft
                .token_type
                .or(nft.contract.token_type)
                .map(|t| NftStandard::from(t.as_str()))
                .unwrap_or_else(|| NftStandard::Other("UNKNOWN".into()));
            let collection_name = nft
                .contract
                .open_sea_metadata
                .and_then(|m| m.collection_name)
                .or(nft.contract.name);
            OwnedNft {
                contract_address: nft.contract.address,
                token_id: nft.token_id,
                name: nft.name,
                collection_name,
                image: nft.image.and_then(|i| i.cached_url.or(i.original_url)),
                standard,
            }
        })
        .filter(|nft| exclude != Some(&nft.standard))
        .collect())
}

/// Alchemy API client covering every chain in the registry.
#[derive(Debug, Clone)]
pub struct AlchemyClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    registry: ChainRegistry,
}

impl AlchemyClient {
    pub fn new(api_key: impl Into<String>, registry: ChainRegistry, timeout: Duration) -> Self {
        Self {
            http: http_client(timeout),
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            registry,
        }
    }

    /// Use a different host template (must contain `{network}` to vary per chain).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn host(&self, chain: ChainId) -> Result<String, DataError> {
        let network = self
            .registry
            .get(chain)
            .map(|info| info.data_network)
            .ok_or(DataError::UnsupportedChain(chain))?;
        Ok(self
            .endpoint
            .trim_end_matches('/')
            .replace("{network}", network))
    }

    /// JSON-RPC endpoint for `chain`.
    pub fn rpc_url(&self, chain: ChainId) -> Result<String, DataError> {
        Ok(format!("{}/v2/{}", self.host(chain)?, self.api_key))
    }

    fn nft_url(&self, chain: ChainId) -> Result<String, DataError> {
        Ok(format!(
            "{}/nft/v3/{}/getNFTsForOwner",
            self.host(chain)?,
            self.api_key
        ))
    }

    async fn call(&self, chain: ChainId, method: &str, params: Value) -> Result<Value, DataError> {
        let rpc = JsonRpcClient::new(self.http.clone(), self.rpc_url(chain)?);
        Ok(rpc.call::<Value>(method, params).await?)
    }
}

#[async_trait]
impl DataProvider for AlchemyClient {
    async fn get_transfers(
        &self,
        chain: ChainId,
        query: &TransferQuery,
    ) -> Result<TransferPage, DataError> {
        let mut filter = json!({
            "fromBlock": format!("0x{:x}", query.from_block),
            "fromAddress": query.from_address.as_str(),
            "category": query.categories.iter().map(|c| c.as_str()).collect::<Vec<_>>(),
            "maxCount": format!("0x{:x}", query.max_count),
            "order": if query.newest_first { "desc" } else { "asc" },
            "withMetadata": true,
        });
        if let Some(cursor) = &query.cursor {
            filter["pageKey"] = json!(cursor.as_str());
        }

        let result = self
            .call(chain, "alchemy_getAssetTransfers", json!([filter]))
            .await?;
        let page = parse_transfers(result)?;
        debug!(
            "Fetched {} transfers on {} (more: {})",
            page.transfers.len(),
            chain,
            page.next_cursor.is_some()
        );
        Ok(page)
    }

    async fn get_token_balances(
        &self,
        chain: ChainId,
        owner: &Address,
    ) -> Result<Vec<RawTokenBalance>, DataError> {
        let result = self
            .call(
                chain,
                "alchemy_getTokenBalances",
                json!([owner.as_str(), "erc20"]),
            )
            .await?;
        parse_token_balances(result)
    }

    async fn get_token_metadata(
        &self,
        chain: ChainId,
        contract: &str,
    ) -> Result<TokenMetadata, DataError> {
        let result = self
            .call(chain, "alchemy_getTokenMetadata", json!([contract]))
            .await?;
        parse_token_metadata(result)
    }

    async fn get_native_balance(
        &self,
        chain: ChainId,
        owner: &Address,
    ) -> Result<U256, DataError> {
        let result = self
            .call(chain, "eth_getBalance", json!([owner.as_str(), "latest"]))
            .await?;
        quantity_from(result)
    }

    async fn get_nfts_for_owner(
        &self,
        chain: ChainId,
        query: &NftQuery,
    ) -> Result<Vec<OwnedNft>, DataError> {
        let page_size = query.page_size.to_string();
        let response = self
            .http
            .get(self.nft_url(chain)?)
            .query(&[
                ("owner", query.owner.as_str()),
                ("pageSize", page_size.as_str()),
                ("withMetadata", "true"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DataError::Status(response.status()));
        }

        let body: Value = response.json().await?;
        parse_nfts(body, query.exclude_standard.as_ref())
    }

    async fn get_gas_price(&self, chain: ChainId) -> Result<U256, DataError> {
        let result = self.call(chain, "eth_gasPrice", json!([])).await?;
        quantity_from(result)
    }
}

fn quantity_from(result: Value) -> Result<U256, DataError> {
    let raw = result.as_str().ok_or(DataError::MissingResult)?;
    parse_quantity(raw).ok_or_else(|| DataError::Decode(format!("invalid quantity: {}", raw)))
}
