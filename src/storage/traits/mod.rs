//! Storage trait definitions.

mod persistence;

pub use persistence::PersistenceGateway;
