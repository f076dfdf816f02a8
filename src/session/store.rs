//! Typed auth store for one tab
//!
//! State changes are published on a `watch` channel; persistence goes to a
//! shared `SessionStorage` under `auth-storage`. The access token is never
//! kept client side: it lives in an HttpOnly cookie, so the stored value is
//! always empty.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

use super::channel::{SyncEvent, SyncMessage, TabPublisher, TabReceiver};
use super::profile::ProfileSource;
use super::storage::{SessionStorage, AUTH_STORAGE_KEY};

/// Signed-in account as seen by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: i64,
    pub tenant_id: i64,
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub role: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    pub user: Option<AuthUser>,
    pub access_token: String,
    pub loading: bool,
    pub initialized: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedState {
    user: Option<AuthUser>,
    #[serde(default)]
    access_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Persisted {
    state: PersistedState,
    #[serde(default)]
    version: u32,
}

/// What the host page must do after a peer message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabAction {
    /// Full reload into the logged-out state
    Reload,
}

/// Hook that drops the HTTP client's session cookies
pub type CookieReset = Arc<dyn Fn() + Send + Sync>;

pub struct AuthStore {
    state: watch::Sender<AuthState>,
    storage: Arc<dyn SessionStorage>,
    publisher: TabPublisher,
    cookie_reset: Option<CookieReset>,
}

impl AuthStore {
    /// Create a store, rehydrating the user from storage
    pub fn new(storage: Arc<dyn SessionStorage>, publisher: TabPublisher) -> Self {
        let user = storage
            .get(AUTH_STORAGE_KEY)
            .and_then(|raw| serde_json::from_str::<Persisted>(&raw).ok())
            .and_then(|p| p.state.user);

        let (state, _) = watch::channel(AuthState {
            user,
            ..AuthState::default()
        });

        Self {
            state,
            storage,
            publisher,
            cookie_reset: None,
        }
    }

    /// Run `reset` whenever the local session is dropped, e.g.
    /// `move || source.clear_cookies()` for an `HttpProfileSource`
    pub fn with_cookie_reset(mut self, reset: impl Fn() + Send + Sync + 'static) -> Self {
        self.cookie_reset = Some(Arc::new(reset));
        self
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Listen for state changes
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn set_user(&self, user: Option<AuthUser>) {
        self.state.send_modify(|s| s.user = user);
        self.persist();
    }

    pub fn set_loading(&self, loading: bool) {
        self.state.send_modify(|s| s.loading = loading);
    }

    /// Resolve the current account; any failure counts as logged out
    pub async fn initialize(&self, source: &dyn ProfileSource) {
        self.set_loading(true);

        match source.fetch_profile().await {
            Ok(user) => self.set_user(Some(user)),
            Err(e) => {
                tracing::debug!("Profile fetch failed, treating as logged out: {}", e);
                self.clear_local();
            }
        }

        self.state.send_modify(|s| {
            s.initialized = true;
            s.loading = false;
        });
    }

    /// Log out this tab and tell the others
    pub fn logout(&self) {
        self.clear_local();
        self.publisher.publish(SyncMessage::logout());
    }

    /// Drop the session locally without notifying peers
    pub fn clear_local(&self) {
        self.storage.remove(AUTH_STORAGE_KEY);
        if let Some(reset) = &self.cookie_reset {
            reset();
        }
        self.state.send_modify(|s| {
            s.user = None;
            s.access_token.clear();
            s.loading = false;
        });
    }

    /// React to a message published by another tab
    pub fn apply_peer_message(&self, message: &SyncMessage) -> Option<TabAction> {
        match message.event {
            SyncEvent::Logout => {
                self.clear_local();
                Some(TabAction::Reload)
            }
            SyncEvent::Ping | SyncEvent::Pong => None,
        }
    }

    fn persist(&self) {
        let persisted = {
            let state = self.state.borrow();
            Persisted {
                state: PersistedState {
                    user: state.user.clone(),
                    access_token: String::new(),
                },
                version: 0,
            }
        };
        match serde_json::to_string(&persisted) {
            Ok(raw) => self.storage.set(AUTH_STORAGE_KEY, raw),
            Err(e) => tracing::warn!("Failed to persist auth state: {}", e),
        }
    }
}

/// Drive a tab's store from peer messages until the bus closes
pub async fn run_tab_sync<F>(store: Arc<AuthStore>, mut receiver: TabReceiver, on_reload: F)
where
    F: Fn() + Send,
{
    while let Some(message) = receiver.recv().await {
        if let Some(TabAction::Reload) = store.apply_peer_message(&message) {
            on_reload();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::channel::TabBus;
    use crate::session::profile::{HttpProfileSource, ProfileError};
    use crate::session::storage::MemoryStorage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    struct FixedProfile(Option<AuthUser>);

    #[async_trait]
    impl ProfileSource for FixedProfile {
        async fn fetch_profile(&self) -> Result<AuthUser, ProfileError> {
            self.0
                .clone()
                .ok_or_else(|| ProfileError::Network("connection refused".to_string()))
        }
    }

    fn alice() -> AuthUser {
        AuthUser {
            id: 1,
            tenant_id: 1,
            username: "alice".to_string(),
            full_name: "Alice".to_string(),
            email: Some("alice@example.com".to_string()),
            role: "buyer".to_string(),
        }
    }

    #[test]
    fn test_access_token_never_stored() {
        let storage = Arc::new(MemoryStorage::new());
        let (publisher, _rx) = TabBus::default().connect();
        let store = AuthStore::new(storage.clone(), publisher);

        store.set_user(Some(alice()));
        assert_eq!(store.state().access_token, "");
        assert_eq!(store.state().user, Some(alice()));

        let raw = storage.get(AUTH_STORAGE_KEY).unwrap();
        assert!(raw.contains("\"accessToken\":\"\""));
    }

    #[test]
    fn test_rehydrates_user_from_storage() {
        let storage = Arc::new(MemoryStorage::new());
        let bus = TabBus::default();

        let (p1, _r1) = bus.connect();
        AuthStore::new(storage.clone(), p1).set_user(Some(alice()));

        let (p2, _r2) = bus.connect();
        let second = AuthStore::new(storage, p2);
        assert_eq!(second.state().user, Some(alice()));
        assert!(!second.state().initialized);
    }

    #[tokio::test]
    async fn test_initialize_success() {
        let (publisher, _rx) = TabBus::default().connect();
        let store = AuthStore::new(Arc::new(MemoryStorage::new()), publisher);
        let mut changes = store.subscribe();

        store.initialize(&FixedProfile(Some(alice()))).await;

        let state = store.state();
        assert!(state.initialized);
        assert!(!state.loading);
        assert_eq!(state.user, Some(alice()));
        assert!(changes.has_changed().unwrap());
        assert_eq!(changes.borrow_and_update().user, Some(alice()));
    }

    #[tokio::test]
    async fn test_initialize_failure_is_logout() {
        let storage = Arc::new(MemoryStorage::new());
        let (publisher, _rx) = TabBus::default().connect();
        let store = AuthStore::new(storage.clone(), publisher);
        store.set_user(Some(alice()));

        store.initialize(&FixedProfile(None)).await;

        let state = store.state();
        assert!(state.initialized);
        assert!(!state.loading);
        assert!(state.user.is_none());
        assert!(storage.get(AUTH_STORAGE_KEY).is_none());
    }

    #[tokio::test]
    async fn test_logout_propagates_to_other_tab() {
        let storage = Arc::new(MemoryStorage::new());
        let bus = TabBus::default();

        let (pa, _ra) = bus.connect();
        let (pb, rb) = bus.connect();
        let tab_a = Arc::new(AuthStore::new(storage.clone(), pa));
        let tab_b = Arc::new(AuthStore::new(storage.clone(), pb));
        tab_a.set_user(Some(alice()));
        tab_b.set_user(Some(alice()));

        let reloaded = Arc::new(Notify::new());
        let signal = reloaded.clone();
        let sync = tokio::spawn(run_tab_sync(tab_b.clone(), rb, move || signal.notify_one()));

        tab_a.logout();
        assert!(storage.get(AUTH_STORAGE_KEY).is_none());

        tokio::time::timeout(Duration::from_secs(1), reloaded.notified())
            .await
            .expect("second tab reloads");
        assert!(tab_b.state().user.is_none());
        assert!(tab_a.state().user.is_none());

        sync.abort();
    }

    #[test]
    fn test_ping_needs_no_action() {
        let (publisher, _rx) = TabBus::default().connect();
        let store = AuthStore::new(Arc::new(MemoryStorage::new()), publisher);
        store.set_user(Some(alice()));

        assert_eq!(store.apply_peer_message(&SyncMessage::new(SyncEvent::Ping)), None);
        assert!(store.state().user.is_some());
    }

    #[test]
    fn test_peer_logout_resets_cookies() {
        let resets = Arc::new(AtomicUsize::new(0));
        let counter = resets.clone();
        let (publisher, _rx) = TabBus::default().connect();
        let store = AuthStore::new(Arc::new(MemoryStorage::new()), publisher)
            .with_cookie_reset(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        store.set_user(Some(alice()));

        assert_eq!(
            store.apply_peer_message(&SyncMessage::logout()),
            Some(TabAction::Reload)
        );
        assert_eq!(resets.load(Ordering::SeqCst), 1);

        store.logout();
        assert_eq!(resets.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_logout_clears_profile_source_cookies() {
        use reqwest::cookie::{CookieStore, Jar};

        let url = reqwest::Url::parse("http://localhost:8080/api/auth/profile").unwrap();
        let jar = Arc::new(Jar::default());
        jar.add_cookie_str("access_token=abc; Path=/", &url);

        let source = Arc::new(HttpProfileSource::with_cookie_jar("http://localhost:8080", jar.clone()).unwrap());
        let (publisher, _rx) = TabBus::default().connect();
        let store = AuthStore::new(Arc::new(MemoryStorage::new()), publisher).with_cookie_reset({
            let source = source.clone();
            move || source.clear_cookies()
        });

        assert!(jar.cookies(&url).is_some());
        store.logout();
        assert!(jar.cookies(&url).is_none());
    }
}
