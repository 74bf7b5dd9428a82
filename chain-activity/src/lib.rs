//! Chain Activity
//!
//! Wallet session and multi-chain activity orchestration for EVM dashboards.
//! One [`ActivityService`] owns the wallet session, the selected chain and
//! everything fetched for the (account, chain) pair, and publishes it as a
//! single observable [`Snapshot`].
//!
//! ## Model
//!
//! - Collections are scoped to one (account, selected chain) pair and cleared
//!   whenever either changes
//! - Only the selected chain is persisted
//! - History is paginated on demand; tokens and NFTs are best effort
//! - User-facing failures land in a single self-clearing error slot

pub mod activity;
pub mod alchemy;
pub mod chains;
pub mod config;
pub mod data_provider;
pub mod error;
pub mod error_channel;
pub mod gas;
pub mod network_switch;
pub mod persistence;
pub mod portfolio;
pub mod rpc;
pub mod service;
pub mod session;
pub mod store;
pub mod types;
pub mod wallet;
pub mod wallet_proxy;

pub use alchemy::AlchemyClient;
pub use chains::{ChainId, ChainInfo, ChainRegistry};
pub use config::ActivityConfig;
pub use data_provider::DataProvider;
pub use error::{DataError, SessionError, WalletError};
pub use service::{ActivityService, Refresh};
pub use store::{Snapshot, StateStore};
pub use types::{Address, Nft, Token, Transaction};
pub use wallet::{EventSource, WalletProvider};
pub use wallet_proxy::ProxyWallet;
