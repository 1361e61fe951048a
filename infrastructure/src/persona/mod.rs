//! Persona adapters: the embedded catalog and relationship persistence

pub mod catalog;
pub mod relationship_store;

pub use catalog::builtin_pool;
pub use relationship_store::FileRelationshipStore;
