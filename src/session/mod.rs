//! Client session toolkit
//!
//! The client half of the session contract: a typed auth store per tab, a
//! cross-tab bus for logout propagation, and the protected-route gate.

pub mod channel;
pub mod gate;
pub mod profile;
pub mod storage;
pub mod store;

pub use channel::{SyncEvent, SyncMessage, TabBus, TabPublisher, TabReceiver};
pub use gate::{decide, GateDecision};
pub use profile::{HttpProfileSource, ProfileError, ProfileSource};
pub use storage::{MemoryStorage, SessionStorage, AUTH_STORAGE_KEY};
pub use store::{run_tab_sync, AuthState, AuthStore, AuthUser, TabAction};
