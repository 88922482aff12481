//! In-process implementations of the platform collaborators.
//!
//! Host applications supply their own keychain, value store and audio
//! primitives; these cover tests, demos and headless use.

pub mod directory;
pub mod memory;
pub mod simulated;

pub use directory::DirectoryValueStore;
pub use memory::{MemoryKeyStore, MemoryValueStore};
pub use simulated::{ClockPlayback, EventInjector, ToneCapture};
