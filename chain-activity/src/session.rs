//! Wallet session lifecycle.
//!
//! `Disconnected -> Connecting -> Connected -> Disconnected`, plus a
//! read-only phase entered by setting an address by hand.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::chains::{ChainId, ChainRegistry};
use crate::error::{Result, SessionError, WalletError};
use crate::error_channel::ErrorChannel;
use crate::store::StateStore;
use crate::types::{Address, SessionPhase};
use crate::wallet::{EventBinding, EventSource, WalletEvent, WalletEventKind, WalletProvider};

#[derive(Clone)]
pub struct SessionController {
    wallet: Option<Arc<dyn WalletProvider>>,
    store: StateStore,
    errors: ErrorChannel,
    registry: ChainRegistry,
}

impl SessionController {
    pub fn new(
        wallet: Option<Arc<dyn WalletProvider>>,
        store: StateStore,
        errors: ErrorChannel,
        registry: ChainRegistry,
    ) -> Self {
        Self {
            wallet,
            store,
            errors,
            registry,
        }
    }

    /// The wallet, if a wallet session is connected.
    pub fn connected_wallet(&self) -> Option<&dyn WalletProvider> {
        if self.store.snapshot().phase == SessionPhase::Connected {
            self.wallet.as_deref()
        } else {
            None
        }
    }

    fn resolve_chain(&self, chain: ChainId) -> ChainId {
        if !self.registry.contains(chain) {
            warn!(
                "Wallet is on unsupported chain {}, using {}",
                chain,
                self.registry.default_chain()
            );
        }
        self.registry.resolve(chain).id
    }

    /// Connect the wallet and start a fresh fetch context.
    ///
    /// The caller triggers the initial fetches once this returns `Ok`.
    pub async fn connect(&self) -> Result<()> {
        let Some(wallet) = &self.wallet else {
            let err = SessionError::ProviderUnavailable;
            self.errors.report(&err);
            return Err(err);
        };

        self.errors.clear();
        let previous = self.store.update(|s| {
            s.connecting = true;
            std::mem::replace(&mut s.phase, SessionPhase::Connecting)
        });

        let result: std::result::Result<_, WalletError> = async {
            let accounts = wallet.request_accounts().await?;
            let chain = wallet.active_chain().await?;
            Ok((accounts, chain))
        }
        .await;

        let err = match result {
            Ok((accounts, chain)) => match accounts.into_iter().next() {
                Some(account) => {
                    let chain = self.resolve_chain(chain);
                    info!("Connected {} on {}", account.short(), chain);
                    self.store.reset_context(|s| {
                        s.account = Some(account);
                        s.chain_id = Some(chain);
                        s.connecting = false;
                        s.phase = SessionPhase::Connected;
                    });
                    return Ok(());
                }
                None => SessionError::GenericConnectFailure("no accounts returned".into()),
            },
            Err(e) => SessionError::from(e),
        };

        if err.is_silent() {
            debug!("Connect request declined");
        } else {
            warn!("Connect failed: {}", err);
        }
        self.store.update(|s| {
            s.connecting = false;
            s.phase = previous;
        });
        self.errors.report(&err);
        Err(err)
    }

    /// Tear down the session and reset the selection to the default chain.
    pub fn disconnect(&self) {
        let default_chain = self.store.default_chain();
        self.store.reset_context(|s| {
            s.account = None;
            s.chain_id = None;
            s.connecting = false;
            s.phase = SessionPhase::Disconnected;
            s.selected_chain = default_chain;
        });
        self.store.persist(default_chain);
        info!("Disconnected");
    }

    /// Manual address set; `None` ends the session but keeps the selection.
    pub fn set_account(&self, account: Option<Address>) {
        let Some(account) = account else {
            self.store.reset_context(|s| {
                s.account = None;
                s.chain_id = None;
                s.connecting = false;
                s.phase = SessionPhase::Disconnected;
            });
            return;
        };

        let read_only = |s: &mut crate::store::Snapshot| {
            if s.phase != SessionPhase::Connected {
                s.phase = SessionPhase::ReadOnly;
            }
        };

        if self.store.snapshot().account.as_ref() == Some(&account) {
            self.store.update(read_only);
        } else {
            debug!("Account set to {}", account);
            self.store.reset_context(|s| {
                s.account = Some(account);
                read_only(s);
            });
        }
    }

    pub fn set_chain_id(&self, chain: ChainId) {
        self.store.update(|s| s.chain_id = Some(chain));
    }

    /// React to a wallet notification.
    pub fn handle_event(&self, event: &WalletEvent) {
        match event {
            WalletEvent::AccountsChanged(accounts) => match accounts.first() {
                Some(account) => {
                    let snapshot = self.store.snapshot();
                    if !matches!(
                        snapshot.phase,
                        SessionPhase::Connected | SessionPhase::Connecting
                    ) {
                        debug!("Ignoring account change outside a wallet session");
                    } else if snapshot.account.as_ref() != Some(account) {
                        info!("Wallet account changed to {}", account.short());
                        let account = account.clone();
                        self.store.reset_context(|s| s.account = Some(account));
                    }
                }
                None => {
                    info!("Wallet reported no accounts");
                    self.disconnect();
                }
            },
            WalletEvent::ChainChanged(chain) => {
                let chain = self.resolve_chain(*chain);
                debug!("Wallet chain changed to {}", chain);
                self.set_chain_id(chain);
            }
        }
    }

    /// Subscribe to `accountsChanged` and `chainChanged` on `source`.
    pub fn bind_events(&self, source: Arc<dyn EventSource>) -> EventBinding {
        let tokens = [WalletEventKind::AccountsChanged, WalletEventKind::ChainChanged]
            .into_iter()
            .map(|kind| {
                let session = self.clone();
                source.subscribe(
                    kind,
                    Arc::new(move |event: &WalletEvent| session.handle_event(event)),
                )
            })
            .collect();
        EventBinding::new(source, tokens)
    }
}
