//! Inventory console client.
//!
//! This crate holds the live inventory channel, the staff association cache,
//! and the thin API/workflow layer the console composes them with.

pub mod admin;
pub mod api_client;
pub mod auth_session;
pub mod catalog;
pub mod config;
pub mod stores;
pub mod ws;

pub use admin::{AdminError, StaffEntry, StoreStaffAdmin};
pub use api_client::ApiClient;
pub use auth_session::{AuthContext, Credential};
pub use catalog::{CatalogWorkflow, InitialStock, NewItem};
pub use config::{ClientConfig, ConfigError};
pub use stores::AssociationCache;
pub use ws::{ChannelStatus, ConnectionState, EventChannelManager, InventoryFeed, ReconnectConfig};
