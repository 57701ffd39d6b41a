//! Database layer for Kitlist

mod change_repository;
mod conflict_repository;
mod connection;
mod entity_store;
mod meta_repository;
mod migrations;

pub use change_repository::ChangeRepository;
pub use conflict_repository::ConflictRepository;
pub use connection::{Database, PersistenceMode};
pub use entity_store::{EntityStore, StoredEntity};
pub use meta_repository::MetaRepository;
