//! Storage service implementations
//!
//! This module provides concrete implementations of the `StorageService`
//! trait. The in-memory backend doubles as the backend for the command-line
//! shell and as the test double for the adapter.

pub mod memory;

// Re-export main types for convenience
pub use memory::{MemoryStorage, OpenDelivery, StorageCall};
