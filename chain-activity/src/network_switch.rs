//! Chain switching.
//!
//! The selection is applied and persisted before the wallet answers. A
//! wallet that does not know the chain gets it registered (EIP-3085) and is
//! asked to switch once more.

use tracing::{debug, info};

use crate::chains::{ChainId, ChainRegistry};
use crate::error::{Result, SessionError, WalletError};
use crate::error_channel::ErrorChannel;
use crate::store::StateStore;
use crate::wallet::{AddChainParams, WalletProvider};

/// What the caller should do after a switch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// The wallet (or read-only session) is on the new chain; refetch.
    Switched,
    /// The user declined in the wallet; selection kept, nothing to refetch.
    Declined,
    /// No session to refresh.
    Idle,
}

#[derive(Clone)]
pub struct NetworkSwitcher {
    registry: ChainRegistry,
    store: StateStore,
    errors: ErrorChannel,
}

impl NetworkSwitcher {
    pub fn new(registry: ChainRegistry, store: StateStore, errors: ErrorChannel) -> Self {
        Self {
            registry,
            store,
            errors,
        }
    }

    /// Ask `wallet` to move to `chain`, registering it first if needed.
    pub async fn request_switch(
        &self,
        wallet: &dyn WalletProvider,
        chain: ChainId,
    ) -> std::result::Result<(), WalletError> {
        let info = self
            .registry
            .get(chain)
            .ok_or(WalletError::UnrecognizedChain(chain))?;

        match wallet.switch_chain(chain).await {
            Err(WalletError::UnrecognizedChain(_)) => {
                info!("Wallet does not know {}, adding it", info.name);
                wallet.add_chain(&AddChainParams::from(info)).await?;
                wallet.switch_chain(chain).await
            }
            other => other,
        }
    }

    /// Select `chain` and, with a connected wallet, switch the wallet too.
    ///
    /// `wallet` is `None` when no wallet session is connected. The selection
    /// is not rolled back when the wallet refuses.
    pub async fn switch_to(
        &self,
        wallet: Option<&dyn WalletProvider>,
        chain: ChainId,
    ) -> Result<SwitchOutcome> {
        if !self.registry.contains(chain) {
            return Err(SessionError::UnsupportedChain(chain));
        }

        if self.store.select_chain(chain) {
            info!("Selected chain {}", self.registry.resolve(chain).name);
        }

        let Some(wallet) = wallet else {
            let has_account = self.store.snapshot().account.is_some();
            return Ok(if has_account {
                SwitchOutcome::Switched
            } else {
                SwitchOutcome::Idle
            });
        };

        match self.request_switch(wallet, chain).await {
            Ok(()) => Ok(SwitchOutcome::Switched),
            Err(e) if e.is_user_rejection() => {
                debug!("Chain switch declined: {}", e);
                Ok(SwitchOutcome::Declined)
            }
            Err(e) => {
                let err = SessionError::NetworkSwitchFailed(e.to_string());
                self.errors.report(&err);
                Err(err)
            }
        }
    }
}
