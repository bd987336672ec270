//! Client-side state derived from server responses.

pub mod associations;

pub use associations::AssociationCache;
