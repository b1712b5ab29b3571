//! External collaborators, specified at the boundary only.

mod logger;
mod provider;
mod storage;

pub use logger::Logger;
pub use provider::Provider;
#[cfg(feature = "native")]
pub use storage::FileStorage;
pub use storage::{JsonStorageExt, MemoryStorage, PersistentStorage};
