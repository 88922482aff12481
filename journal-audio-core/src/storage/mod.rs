//! Persistence helpers around the encryption engine.

pub mod container;
pub(crate) mod locks;
pub mod metadata;
pub mod secure_storage;
pub mod transient;

pub use secure_storage::{MigrationReport, SecureStorage};
