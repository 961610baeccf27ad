//! Translation key registry with deferred persistence.

/// Shared key handles
mod handle;
/// Registry requests
mod request;
/// Registry state and deduplication
mod state;
/// Persistence collaborator
mod store;

pub use handle::{
    StaticString,
    TranslationHandle,
};
pub use request::KeyRequest;
pub use state::{
    DEFAULT_FLUSH_DELAY,
    Registry,
};
pub use store::{
    MemoryStore,
    PendingKey,
    StoreError,
    TranslationStore,
};
