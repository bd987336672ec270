//! Read-side handle on the event channel.
//!
//! A feed is the single-value subscription consumers hold: the current status,
//! the latest event, and a signal that either changed. Intermediate values
//! between two reads are not queued.

use std::sync::{Arc, Weak};

use inventory_shared::InventoryUpdateEvent;
use tokio::sync::watch;

use super::connection::{ChannelStatus, ConnectionState};
use super::manager::ChannelShared;

/// Subscription to an [`EventChannelManager`](super::EventChannelManager).
///
/// Only obtainable from a live manager. Once the manager is gone the feed
/// keeps reporting the last values and [`changed`](Self::changed) returns
/// `false`.
#[derive(Debug, Clone)]
pub struct InventoryFeed {
    state: watch::Receiver<ConnectionState>,
    latest: watch::Receiver<Option<InventoryUpdateEvent>>,
    shared: Weak<ChannelShared>,
}

impl InventoryFeed {
    pub(crate) fn new(shared: &Arc<ChannelShared>) -> Self {
        Self {
            state: shared.state.subscribe(),
            latest: shared.latest.subscribe(),
            shared: Arc::downgrade(shared),
        }
    }

    pub fn status(&self) -> ChannelStatus {
        self.state.borrow().status()
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn latest_event(&self) -> Option<InventoryUpdateEvent> {
        self.latest.borrow().clone()
    }

    pub fn clear_last_event(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.clear_event();
        }
    }

    /// Wait until the status or the retained event changes.
    /// Returns `false` once the manager has been dropped.
    pub async fn changed(&mut self) -> bool {
        let alive = tokio::select! {
            result = self.state.changed() => result.is_ok(),
            result = self.latest.changed() => result.is_ok(),
        };
        self.state.mark_unchanged();
        self.latest.mark_unchanged();
        alive
    }

    /// Wait until the status equals `status`. Returns `false` if the manager
    /// is dropped first.
    pub async fn wait_for_status(&mut self, status: ChannelStatus) -> bool {
        self.state.wait_for(|state| state.status() == status).await.is_ok()
    }

    /// Wait for a retained event matching `predicate`.
    pub async fn wait_for_event(
        &mut self,
        mut predicate: impl FnMut(&InventoryUpdateEvent) -> bool,
    ) -> Option<InventoryUpdateEvent> {
        let found = self
            .latest
            .wait_for(|event| event.as_ref().is_some_and(&mut predicate))
            .await
            .ok()?;
        found.clone()
    }
}
