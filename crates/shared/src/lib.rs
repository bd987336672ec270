//! Shared types for the inventory console: wire models, channel protocol
//! constants and API error types.

pub mod error;
pub mod models;
pub mod protocol;

pub use error::*;
pub use models::*;
pub use protocol::*;
