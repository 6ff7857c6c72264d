pub mod keys;
pub mod store;

pub use store::{FileStore, KeyValueStore, MemoryStore, Storage, StoreError};
