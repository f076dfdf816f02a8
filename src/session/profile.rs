//! Profile lookup used to initialise a tab's session

use async_trait::async_trait;
use reqwest::cookie::Jar;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

use super::store::AuthUser;

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("session rejected with status {0}")]
    Rejected(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Source of the signed-in account
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn fetch_profile(&self) -> Result<AuthUser, ProfileError>;
}

#[derive(Deserialize)]
struct Envelope {
    data: Option<AuthUser>,
}

/// Fetches `GET {base}/api/auth/profile` with the session cookies
pub struct HttpProfileSource {
    client: reqwest::Client,
    base_url: String,
    jar: Option<Arc<Jar>>,
}

impl HttpProfileSource {
    /// The client must keep cookies (`cookie_store(true)`) for the session to flow.
    /// Cookies of a client built elsewhere are not cleared by `clear_cookies`.
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            jar: None,
        }
    }

    /// Client with its own cookie jar, which `clear_cookies` can empty
    pub fn with_cookie_store(base_url: impl Into<String>) -> Result<Self, ProfileError> {
        Self::with_cookie_jar(base_url, Arc::new(Jar::default()))
    }

    pub fn with_cookie_jar(base_url: impl Into<String>, jar: Arc<Jar>) -> Result<Self, ProfileError> {
        let client = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .build()
            .map_err(|e| ProfileError::Network(e.to_string()))?;
        Ok(Self {
            jar: Some(jar),
            ..Self::new(client, base_url)
        })
    }

    pub fn profile_url(&self) -> String {
        format!("{}/api/auth/profile", self.base_url)
    }

    /// Expire the session cookies held for this server
    pub fn clear_cookies(&self) {
        let Some(jar) = &self.jar else {
            return;
        };
        let url = match reqwest::Url::parse(&self.base_url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Cannot clear cookies for '{}': {}", self.base_url, e);
                return;
            }
        };
        // Name and path must match the cookies the server set
        jar.add_cookie_str("access_token=; Max-Age=0; Path=/", &url);
        jar.add_cookie_str("refresh_token=; Max-Age=0; Path=/api/auth", &url);
    }
}

#[async_trait]
impl ProfileSource for HttpProfileSource {
    async fn fetch_profile(&self) -> Result<AuthUser, ProfileError> {
        let response = self
            .client
            .get(self.profile_url())
            .send()
            .await
            .map_err(|e| ProfileError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProfileError::Rejected(status.as_u16()));
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| ProfileError::Decode(e.to_string()))?;
        envelope
            .data
            .ok_or_else(|| ProfileError::Decode("missing data".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::cookie::CookieStore;

    const BASE: &str = "http://localhost:8080";

    fn session_jar() -> Arc<Jar> {
        let jar = Arc::new(Jar::default());
        let url = reqwest::Url::parse(BASE).unwrap();
        jar.add_cookie_str("access_token=abc; Path=/; HttpOnly", &url);
        jar.add_cookie_str("refresh_token=def; Path=/api/auth; HttpOnly", &url);
        jar
    }

    fn cookies_for(jar: &Jar, path: &str) -> Option<String> {
        let url = reqwest::Url::parse(&format!("{}{}", BASE, path)).unwrap();
        jar.cookies(&url).map(|v| v.to_str().unwrap().to_string())
    }

    #[test]
    fn test_clear_cookies_empties_jar() {
        let jar = session_jar();
        let source = HttpProfileSource::with_cookie_jar(BASE, jar.clone()).unwrap();

        let before = cookies_for(&jar, "/api/auth/refresh").unwrap();
        assert!(before.contains("access_token=abc"));
        assert!(before.contains("refresh_token=def"));

        source.clear_cookies();
        assert!(cookies_for(&jar, "/api/auth/refresh").is_none());
        assert!(cookies_for(&jar, "/").is_none());
    }

    #[test]
    fn test_clear_cookies_without_jar_is_noop() {
        let source = HttpProfileSource::new(reqwest::Client::new(), BASE);
        source.clear_cookies();
        assert!(source.jar.is_none());
    }

    #[test]
    fn test_profile_url() {
        let source = HttpProfileSource::new(reqwest::Client::new(), "http://localhost:8080/");
        assert_eq!(source.profile_url(), "http://localhost:8080/api/auth/profile");
    }

    #[test]
    fn test_envelope_decode() {
        let raw = r#"{"status":"success","data":{"id":1,"tenantId":2,"username":"alice","fullName":"Alice","email":null,"role":"buyer"}}"#;
        let envelope: Envelope = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.data.unwrap().username, "alice");
    }
}
