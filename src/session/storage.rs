//! Persisted key/value storage shared by every tab

use dashmap::DashMap;

/// Key under which the auth store persists itself
pub const AUTH_STORAGE_KEY: &str = "auth-storage";

/// Minimal persistent storage contract (browser local storage, a file, memory)
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str);
}

/// In-process storage; share one instance between stores to model tabs
#[derive(Default)]
pub struct MemoryStorage {
    items: DashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.items.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: String) {
        self.items.insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.items.remove(key);
    }
}
