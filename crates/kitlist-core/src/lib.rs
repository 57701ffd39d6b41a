//! kitlist-core - Core library for Kitlist
//!
//! This crate contains the shared models, persistent store, and sync engine
//! (change tracking, conflict detection/resolution, connectivity monitoring,
//! and the sync orchestrator) used by all Kitlist interfaces.

pub mod conflict;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod models;
pub mod mutations;
pub mod state;
pub mod sync;
pub mod tracker;
pub mod util;

pub use error::{Error, Result};
pub use models::{Change, EntityKind, Operation, SyncConflict};
pub use state::SyncState;
