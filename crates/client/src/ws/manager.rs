//! Event channel manager: keeps exactly one push session bound to the current
//! credential and publishes its status and the latest inventory event.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use inventory_shared::InventoryUpdateEvent;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::connection::{ChannelConnection, ChannelStatus, ConnectionState, Inbound};
use super::feed::InventoryFeed;
use crate::auth_session::Credential;
use crate::config::{redacted, ClientConfig};

/// State published by the driver task. Every mutation from the driver goes
/// through `if_live`, so nothing lands after disposal.
#[derive(Debug)]
pub(crate) struct ChannelShared {
    pub(crate) state: watch::Sender<ConnectionState>,
    pub(crate) latest: watch::Sender<Option<InventoryUpdateEvent>>,
    live: Mutex<bool>,
}

impl ChannelShared {
    fn new() -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (latest, _) = watch::channel(None);
        Self {
            state,
            latest,
            live: Mutex::new(true),
        }
    }

    fn if_live(&self, f: impl FnOnce(&Self)) {
        let live = self.live.lock().unwrap_or_else(PoisonError::into_inner);
        if *live {
            f(self);
        }
    }

    fn set_state(&self, next: ConnectionState) {
        self.if_live(|shared| {
            shared.state.send_if_modified(|current| {
                if *current == next {
                    return false;
                }
                *current = next;
                true
            });
        });
    }

    fn publish(&self, event: InventoryUpdateEvent) {
        self.if_live(|shared| {
            shared.latest.send_replace(Some(event));
        });
    }

    /// Session ended because the credential went away.
    fn end_session(&self) {
        self.if_live(|shared| {
            shared.state.send_replace(ConnectionState::Disconnected);
            shared.clear_event();
        });
    }

    pub(crate) fn clear_event(&self) {
        self.latest.send_if_modified(|event| event.take().is_some());
    }

    fn dispose(&self) {
        let mut live = self.live.lock().unwrap_or_else(PoisonError::into_inner);
        *live = false;
        self.state.send_replace(ConnectionState::Disconnected);
    }
}

/// Owns the live inventory channel.
///
/// The credential is injected as a watch receiver. Every distinct value
/// retires the current session before a new one is opened; an absent value
/// tears the session down and clears the retained event. Transport failures
/// are retried with exponential backoff until the credential changes or the
/// retry budget runs out. Sessions that open and close again without
/// delivering an event count against the budget.
///
/// Dropping the manager (or calling [`shutdown`](Self::shutdown)) aborts the
/// driver task and closes the socket without waiting on the network.
#[derive(Debug)]
pub struct EventChannelManager {
    shared: Arc<ChannelShared>,
    driver: JoinHandle<()>,
}

impl EventChannelManager {
    /// Start the manager. Must be called inside a tokio runtime.
    pub fn spawn(config: ClientConfig, credentials: watch::Receiver<Option<Credential>>) -> Self {
        let shared = Arc::new(ChannelShared::new());
        let driver = Driver {
            shared: shared.clone(),
            credentials,
            config,
        };
        let driver = tokio::spawn(driver.run());
        Self { shared, driver }
    }

    pub fn status(&self) -> ChannelStatus {
        self.shared.state.borrow().status()
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state.borrow().clone()
    }

    pub fn latest_event(&self) -> Option<InventoryUpdateEvent> {
        self.shared.latest.borrow().clone()
    }

    /// Forget the retained event. Status is unaffected.
    pub fn clear_last_event(&self) {
        self.shared.clear_event();
    }

    pub fn subscribe(&self) -> InventoryFeed {
        InventoryFeed::new(&self.shared)
    }

    /// Dispose of the manager. Same as dropping it.
    pub fn shutdown(self) {}
}

impl Drop for EventChannelManager {
    fn drop(&mut self) {
        self.shared.dispose();
        self.driver.abort();
    }
}

struct Driver {
    shared: Arc<ChannelShared>,
    credentials: watch::Receiver<Option<Credential>>,
    config: ClientConfig,
}

/// Why a session stopped.
enum SessionEnd {
    Retired,
    /// Transport closed; `delivered` is whether any event arrived first.
    Closed { reason: Option<String>, delivered: bool },
}

impl Driver {
    async fn run(mut self) {
        loop {
            let current = self.credentials.borrow_and_update().clone();
            match current {
                None => {
                    self.shared.end_session();
                    next_credential(&mut self.credentials, None).await;
                }
                Some(credential) => self.serve(credential).await,
            }
        }
    }

    /// Keep a session open for `credential` until a different credential
    /// shows up. Returns only after the old session is gone.
    async fn serve(&mut self, credential: Credential) {
        let Driver {
            shared,
            credentials,
            config,
        } = self;

        let endpoint = match config.channel_url() {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(error = %e, "invalid inventory channel address");
                shared.set_state(ConnectionState::Disconnected);
                next_credential(credentials, Some(&credential)).await;
                return;
            }
        };

        let mut attempt = 0u32;
        loop {
            shared.set_state(if attempt == 0 {
                ConnectionState::Connecting
            } else {
                ConnectionState::Reconnecting { attempt }
            });

            let connect_timeout = config.connect_timeout;
            let opened = tokio::select! {
                biased;
                _ = next_credential(credentials, Some(&credential)) => return,
                result = ChannelConnection::open(&endpoint, credential.clone(), connect_timeout) => result,
            };

            match opened {
                Ok(mut connection) => {
                    let opened_at = Instant::now();
                    shared.set_state(ConnectionState::Connected);
                    tracing::info!(
                        connection_id = %connection.id(),
                        url = %redacted(&endpoint),
                        "inventory channel open"
                    );

                    match pump(shared, credentials, &mut connection).await {
                        SessionEnd::Retired => {
                            if credentials.borrow().is_none() {
                                shared.end_session();
                            } else {
                                shared.set_state(ConnectionState::Connecting);
                            }
                            tracing::info!(connection_id = %connection.id(), "credential changed, retiring session");
                            connection.close(config.close_grace).await;
                            return;
                        }
                        SessionEnd::Closed { reason, delivered } => {
                            let uptime = opened_at.elapsed();
                            tracing::warn!(
                                connection_id = %connection.id(),
                                reason = reason.as_deref().unwrap_or("none"),
                                uptime_ms = uptime.as_millis() as u64,
                                "inventory channel closed"
                            );
                            if config.reconnect.is_stable(uptime, delivered) {
                                attempt = 0;
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempt, "inventory channel connect failed");
                }
            }

            if config.reconnect.exhausted(attempt) {
                tracing::error!(attempt, "giving up on inventory channel until the credential changes");
                shared.set_state(ConnectionState::Failed {
                    reason: format!("max reconnect attempts ({}) exceeded", config.reconnect.max_attempts),
                });
                next_credential(credentials, Some(&credential)).await;
                return;
            }

            let delay = config.reconnect.delay_for_attempt(attempt);
            attempt += 1;
            shared.set_state(ConnectionState::Reconnecting { attempt });
            tracing::info!(delay_ms = delay.as_millis() as u64, attempt, "reconnecting inventory channel");

            tokio::select! {
                biased;
                _ = next_credential(credentials, Some(&credential)) => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// Forward frames from the session until it closes or the credential changes.
/// Credential changes win over frames that are ready at the same time.
async fn pump(
    shared: &ChannelShared,
    credentials: &mut watch::Receiver<Option<Credential>>,
    connection: &mut ChannelConnection,
) -> SessionEnd {
    let bound = connection.credential().clone();
    let mut delivered = false;
    loop {
        tokio::select! {
            biased;
            _ = next_credential(credentials, Some(&bound)) => return SessionEnd::Retired,
            inbound = connection.next_inbound() => match inbound {
                Inbound::Event(event) => {
                    delivered = true;
                    shared.publish(event);
                }
                Inbound::Skipped => {}
                Inbound::Closed(reason) => return SessionEnd::Closed { reason, delivered },
            },
        }
    }
}

/// Resolve once the credential differs from `bound`. Never resolves after the
/// credential source is gone. Cancel safe.
async fn next_credential(
    credentials: &mut watch::Receiver<Option<Credential>>,
    bound: Option<&Credential>,
) {
    loop {
        if credentials.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
        if credentials.borrow_and_update().as_ref() != bound {
            return;
        }
    }
}
