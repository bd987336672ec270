//! Shared data models for the inventory API and the live update channel.
//!
//! The inventory backend speaks snake_case JSON, so unlike most serde models
//! these keep Rust field names on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// --- Live channel ---

/// One decoded frame from the inventory push channel.
///
/// Only `sku` is required. Fields the client does not know about are kept in
/// `extra` and survive re-serialization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryUpdateEvent {
    #[serde(alias = "sku_id")]
    pub sku: String,
    /// Signed quantity change. Snapshot events carry only `quantity`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
    /// On-hand quantity after the change, when the server reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
    #[serde(default, alias = "type", skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default, alias = "ts", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InventoryUpdateEvent {
    /// Decode a frame payload.
    pub fn from_frame(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

// --- Identity ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Manager,
    Staff,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: Role,
}

impl User {
    pub fn is_manager(&self) -> bool {
        self.role == Role::Manager
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserList {
    pub users: Vec<User>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Generic `{ "message": ... }` acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageResponse {
    pub message: String,
}

// --- Stores ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Store {
    pub id: String,
    pub name: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStoreRequest {
    pub name: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemList<T> {
    pub items: Vec<T>,
}

// --- Staff associations ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddStaffRequest {
    pub store_id: String,
    pub user_id: String,
}

/// Response of "add staff to store". This is the only place the
/// association id is ever visible to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StaffAssociation {
    pub id: String,
    pub user_id: String,
    pub store_id: String,
    pub user: User,
}

/// Response of "list staff for store". Carries no association ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreStaff {
    pub staff: Vec<User>,
}

// --- Catalog ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sku {
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
}

/// Create/update body for a SKU.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkuInput {
    pub name: String,
    pub category: String,
    pub description: String,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkuCategories {
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInventoryRequest {
    pub sku_id: String,
    pub store_id: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryRecord {
    pub id: String,
    pub sku_id: String,
    pub store_id: String,
    pub quantity: i64,
}
