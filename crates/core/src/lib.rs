//! `wareflow-core` — shared primitives for the sync client.
//!
//! Identifier newtypes and the validation error model. Nothing in here talks
//! to the network or the filesystem.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{ItemId, MovementId, TransactionId, WarehouseId};
