//! In-memory definition stores.

pub mod memory;

pub use memory::{
    MemoryActionRepository, MemoryApplicationStore, MemoryDatasourceStore, MemoryStore,
};
