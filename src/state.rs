use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::handlers::audit::service::AuditSink;
use crate::middleware::csrf::CsrfPolicy;
use crate::ws::SessionHub;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: DatabaseConnection,
    /// Application configuration
    pub config: Arc<Config>,
    /// Resolved CSRF settings
    pub csrf: Arc<CsrfPolicy>,
    /// Per-account fan-out of session sync messages
    pub hub: Arc<SessionHub>,
    /// Outbound HTTP client (identity provider discovery)
    pub http: reqwest::Client,
    /// Operation log writer
    pub audit: AuditSink,
}

impl AppState {
    /// Create new application state and start the audit writer
    pub fn new(db: DatabaseConnection, config: Config) -> Self {
        let audit = AuditSink::spawn(db.clone());
        Self::with_audit(db, config, audit)
    }

    pub fn with_audit(db: DatabaseConnection, config: Config, audit: AuditSink) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.sso.timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        Self {
            db,
            csrf: Arc::new(CsrfPolicy::from_config(&config.csrf)),
            config: Arc::new(config),
            hub: Arc::new(SessionHub::new()),
            http,
            audit,
        }
    }

    /// State without a database, for exercising routing and middleware
    #[cfg(test)]
    pub fn detached(config: Config) -> Self {
        Self::with_audit(DatabaseConnection::Disconnected, config, AuditSink::disabled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csrf_policy_follows_config() {
        let mut config = Config::default();
        config.csrf.cookie_name = "xsrf".to_string();
        config.csrf.header_name = "X-XSRF-Token".to_string();

        let state = AppState::detached(config);
        assert_eq!(state.csrf.cookie_name, "xsrf");
        assert_eq!(state.csrf.header_name, "x-xsrf-token");
    }
}
