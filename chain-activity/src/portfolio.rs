//! Token balances and NFT holdings for the session account.
//!
//! Both lists are best effort: failures are logged and leave the current
//! list untouched, and never reach the error channel.

use futures::future::join_all;
use primitive_types::U256;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::chains::{ChainId, ChainRegistry};
use crate::data_provider::{DataProvider, NftQuery, OwnedNft, RawTokenBalance, TokenMetadata};
use crate::error::{DataError, SessionError};
use crate::store::StateStore;
use crate::types::{Address, Nft, NftStandard, Token};

/// Contract address used for the native currency entry
pub const NATIVE_TOKEN_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Decimals assumed when the provider has none
pub const DEFAULT_DECIMALS: u8 = 18;

const DISPLAY_DECIMALS: u8 = 4;

fn pow10(exp: u8) -> Option<U256> {
    U256::from(10u8).checked_pow(U256::from(exp))
}

/// Render `raw / 10^decimals` with four decimal places, rounding half up.
pub fn format_balance(raw: U256, decimals: u8) -> String {
    let scaled = if decimals >= DISPLAY_DECIMALS {
        match pow10(decimals - DISPLAY_DECIMALS) {
            Some(divisor) => raw.saturating_add(divisor / 2) / divisor,
            None => U256::zero(),
        }
    } else {
        pow10(DISPLAY_DECIMALS - decimals)
            .map(|m| raw.saturating_mul(m))
            .unwrap_or_default()
    };

    let unit = U256::from(10_000u32);
    format!("{}.{:04}", scaled / unit, (scaled % unit).low_u64())
}

fn token_from(balance: &RawTokenBalance, metadata: TokenMetadata) -> Token {
    let decimals = metadata.decimals.unwrap_or(DEFAULT_DECIMALS);
    Token {
        symbol: metadata.symbol.unwrap_or_else(|| "UNKNOWN".to_string()),
        name: metadata.name.unwrap_or_else(|| "Unknown Token".to_string()),
        balance: format_balance(balance.raw_balance, decimals),
        contract_address: balance.contract_address.clone(),
        decimals,
        logo: metadata.logo,
        is_native: false,
    }
}

fn nft_from(nft: OwnedNft) -> Nft {
    Nft {
        name: nft
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("#{}", nft.token_id)),
        collection_name: nft
            .collection_name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Unknown Collection".to_string()),
        contract_address: nft.contract_address,
        token_id: nft.token_id,
        image: nft.image,
        standard: nft.standard,
    }
}

#[derive(Clone)]
pub struct PortfolioFetcher {
    provider: Arc<dyn DataProvider>,
    store: StateStore,
    registry: ChainRegistry,
    token_limit: usize,
    nft_page_size: u32,
    nft_excluded: Option<NftStandard>,
}

impl PortfolioFetcher {
    pub fn new(
        provider: Arc<dyn DataProvider>,
        store: StateStore,
        registry: ChainRegistry,
        token_limit: usize,
        nft_page_size: u32,
        nft_excluded: Option<NftStandard>,
    ) -> Self {
        Self {
            provider,
            store,
            registry,
            token_limit,
            nft_page_size,
            nft_excluded,
        }
    }

    /// Native entry followed by the enriched nonzero ERC-20 balances.
    ///
    /// Tokens whose metadata lookup fails are left out.
    pub async fn load_tokens(
        &self,
        chain: ChainId,
        account: &Address,
    ) -> Result<Vec<Token>, DataError> {
        let info = *self.registry.resolve(chain);
        let balances = self.provider.get_token_balances(info.id, account).await?;

        let nonzero: Vec<RawTokenBalance> = balances
            .into_iter()
            .filter(|b| !b.raw_balance.is_zero())
            .take(self.token_limit)
            .collect();
        debug!("{} nonzero token balances on {}", nonzero.len(), info.name);

        let lookups = nonzero.iter().map(|balance| async move {
            self.provider
                .get_token_metadata(info.id, &balance.contract_address)
                .await
                .map(|metadata| token_from(balance, metadata))
                .map_err(|source| SessionError::TokenMetadataFetchFailed {
                    contract: balance.contract_address.clone(),
                    source,
                })
        });

        let mut tokens = Vec::with_capacity(nonzero.len() + 1);
        for result in join_all(lookups).await {
            match result {
                Ok(token) => tokens.push(token),
                Err(SessionError::TokenMetadataFetchFailed { contract, source }) => {
                    warn!("Skipping token {}: {}", contract, source)
                }
                Err(e) => warn!("Skipping token: {}", e),
            }
        }

        let native = self.provider.get_native_balance(info.id, account).await?;
        tokens.insert(
            0,
            Token {
                symbol: info.currency.to_string(),
                name: info.currency_name.to_string(),
                balance: format_balance(native, DEFAULT_DECIMALS),
                contract_address: NATIVE_TOKEN_ADDRESS.to_string(),
                decimals: DEFAULT_DECIMALS,
                logo: None,
                is_native: true,
            },
        );

        Ok(tokens)
    }

    /// Owned NFTs, minus the excluded standard.
    pub async fn load_nfts(&self, chain: ChainId, account: &Address) -> Result<Vec<Nft>, DataError> {
        let query = NftQuery {
            owner: account.clone(),
            page_size: self.nft_page_size,
            exclude_standard: self.nft_excluded.clone(),
        };
        let nfts = self.provider.get_nfts_for_owner(chain, &query).await?;
        Ok(nfts.into_iter().map(nft_from).collect())
    }

    /// Refresh the token list of the current context.
    pub async fn fetch_tokens(&self) {
        let ctx = self.store.context();
        let Some(account) = ctx.account.clone() else {
            debug!("No account, skipping token fetch");
            return;
        };

        match self.load_tokens(ctx.chain, &account).await {
            Ok(tokens) => {
                let count = tokens.len();
                if self
                    .store
                    .update_if_current(&ctx, |s| s.tokens = tokens)
                    .is_some()
                {
                    info!("Loaded {} tokens on {}", count, ctx.chain);
                }
            }
            Err(e) => warn!("Token fetch on {} failed: {}", ctx.chain, e),
        }
    }

    /// Refresh the NFT list of the current context.
    pub async fn fetch_nfts(&self) {
        let ctx = self.store.context();
        let Some(account) = ctx.account.clone() else {
            debug!("No account, skipping NFT fetch");
            return;
        };

        match self.load_nfts(ctx.chain, &account).await {
            Ok(nfts) => {
                let count = nfts.len();
                if self
                    .store
                    .update_if_current(&ctx, |s| s.nfts = nfts)
                    .is_some()
                {
                    info!("Loaded {} NFTs on {}", count, ctx.chain);
                }
            }
            Err(e) => warn!("NFT fetch on {} failed: {}", ctx.chain, e),
        }
    }
}
