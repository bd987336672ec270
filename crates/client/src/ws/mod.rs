//! Live inventory update channel.
//!
//! This module provides:
//! - A manager that binds one WebSocket session to the current credential
//! - Bounded exponential-backoff reconnects after transport failures
//! - A single-value feed (status + latest event + change signal)
//!
//! # Architecture
//!
//! ```text
//!   ┌──────────────────┐  watch<Option<Credential>>
//!   │   AuthContext    │───────────────┐
//!   └──────────────────┘               ▼
//!                         ┌─────────────────────────┐
//!                         │   EventChannelManager   │
//!                         │  (driver task, owns at  │
//!                         │   most one connection)  │
//!                         └─────────────────────────┘
//!                                      │ watch<ConnectionState>
//!                                      │ watch<Option<InventoryUpdateEvent>>
//!                          ┌───────────┼───────────┐
//!                          ▼           ▼           ▼
//!                   ┌────────────┐ ┌────────────┐ ┌────────────┐
//!                   │  feed (UI) │ │ feed (log) │ │  status()  │
//!                   └────────────┘ └────────────┘ └────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let auth = AuthContext::new();
//! let manager = EventChannelManager::spawn(ClientConfig::from_env(), auth.watch());
//! auth.login(token);
//!
//! let mut feed = manager.subscribe();
//! while feed.changed().await {
//!     if let Some(event) = feed.latest_event() {
//!         println!("{} {:?}", event.sku, event.delta);
//!     }
//! }
//! ```

mod connection;
mod feed;
mod manager;

pub use connection::{ChannelStatus, ConnectError, ConnectionState, ReconnectConfig};
pub use feed::InventoryFeed;
pub use manager::EventChannelManager;
