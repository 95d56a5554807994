//! External collaborator seams: chat-state store and UI context source.
//!
//! The session forwards memory/metadata events to the store and pulls screen
//! snapshots from the context source. It never reads chat state itself.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::wire::MemoryUpdate;

/// Application-level chat-state store.
///
/// `&mut self` expresses that stores mutate on every call; mutation is
/// serialised through `StoreHandle`'s `parking_lot::Mutex`.
pub trait ChatStateStore: Send + 'static {
    /// Apply a memory/metadata mutation pushed by the remote service.
    fn apply_memory_update(&mut self, update: MemoryUpdate);

    /// Mark a chat message as final.
    fn finalize_message(&mut self, message_id: &str);
}

/// Thread-safe reference-counted handle to any `ChatStateStore` implementor.
#[derive(Clone)]
pub struct StoreHandle(pub Arc<Mutex<dyn ChatStateStore>>);

impl StoreHandle {
    pub fn new<S: ChatStateStore>(store: S) -> Self {
        Self(Arc::new(Mutex::new(store)))
    }
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle").finish_non_exhaustive()
    }
}

/// Produces the compact textual snapshot of the current screen state that the
/// remote service requests via `assistant-input-received`.
pub trait UiContextSource: Send + Sync + 'static {
    fn snapshot(&self) -> String;
}

/// Source for hosts with no snapshot support — always empty.
#[derive(Debug, Default)]
pub struct NullContextSource;

impl UiContextSource for NullContextSource {
    fn snapshot(&self) -> String {
        String::new()
    }
}
