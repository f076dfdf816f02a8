use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Server address (e.g., "0.0.0.0:8080")
    #[serde(default = "default_addr")]
    pub addr: String,
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Session cookie / JWT configuration
    #[serde(default)]
    pub auth: AuthConfig,
    /// Double-submit CSRF configuration
    #[serde(default)]
    pub csrf: CsrfConfig,
    /// Allowed browser origins
    #[serde(default)]
    pub cors: CorsConfig,
    /// Identity provider settings
    #[serde(default)]
    pub sso: SsoConfig,
    /// First-start seeding
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_host")]
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    #[serde(default = "default_db_name", rename = "database")]
    pub name: String,
    #[serde(default = "default_db_user", rename = "username")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// HMAC secret for access tokens
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Access token lifetime in seconds
    #[serde(default = "default_access_ttl")]
    pub access_ttl_secs: i64,
    /// Refresh token lifetime in seconds
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_secs: i64,
    /// Mark session cookies `Secure` (requires HTTPS)
    #[serde(default)]
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CsrfConfig {
    #[serde(default = "default_csrf_cookie")]
    pub cookie_name: String,
    #[serde(default = "default_csrf_header")]
    pub header_name: String,
    /// Cookie max-age in seconds
    #[serde(default = "default_csrf_max_age")]
    pub max_age_secs: i64,
    #[serde(default)]
    pub cookie_secure: bool,
    /// Paths (without the `api/` prefix) that skip verification
    #[serde(default = "default_csrf_exempt")]
    pub exempt_paths: Vec<String>,
    /// Issue a new token after every verified mutating request
    #[serde(default = "default_true")]
    pub rotate_on_success: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CorsConfig {
    /// Exact origins allowed to send credentialed requests.
    /// Empty means same-origin only.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SsoConfig {
    /// Azure AD authority host
    #[serde(default = "default_authority_host")]
    pub authority_host: String,
    /// Userinfo endpoint used when discovery does not report one
    #[serde(default = "default_userinfo_endpoint")]
    pub userinfo_endpoint: String,
    /// Discovery request timeout in seconds
    #[serde(default = "default_sso_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BootstrapConfig {
    #[serde(default = "default_tenant_code")]
    pub tenant_code: String,
    #[serde(default = "default_tenant_name")]
    pub tenant_name: String,
    #[serde(default = "default_admin_username")]
    pub admin_username: String,
    /// Seeding is skipped while this is empty
    #[serde(default)]
    pub admin_password: String,
}

// Default value functions
fn default_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_db_host() -> String {
    "localhost".to_string()
}

fn default_db_port() -> u16 {
    5432
}

fn default_db_name() -> String {
    "purchasing".to_string()
}

fn default_db_user() -> String {
    "postgres".to_string()
}

fn default_max_connections() -> u32 {
    50
}

fn default_jwt_secret() -> String {
    "change-me".to_string()
}

fn default_access_ttl() -> i64 {
    15 * 60
}

fn default_refresh_ttl() -> i64 {
    7 * 24 * 60 * 60
}

fn default_csrf_cookie() -> String {
    "csrf_token".to_string()
}

fn default_csrf_header() -> String {
    "x-csrf-token".to_string()
}

fn default_csrf_max_age() -> i64 {
    24 * 60 * 60
}

fn default_csrf_exempt() -> Vec<String> {
    ["auth/login", "auth/refresh", "csrf/token", "health-check", "api-docs"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_true() -> bool {
    true
}

fn default_authority_host() -> String {
    "https://login.microsoftonline.com".to_string()
}

fn default_userinfo_endpoint() -> String {
    "https://graph.microsoft.com/oidc/userinfo".to_string()
}

fn default_sso_timeout() -> u64 {
    10
}

fn default_tenant_code() -> String {
    "default".to_string()
}

fn default_tenant_name() -> String {
    "Default Tenant".to_string()
}

fn default_admin_username() -> String {
    "admin".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            log: LogConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            csrf: CsrfConfig::default(),
            cors: CorsConfig::default(),
            sso: SsoConfig::default(),
            bootstrap: BootstrapConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_db_host(),
            port: default_db_port(),
            name: default_db_name(),
            user: default_db_user(),
            password: String::new(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            access_ttl_secs: default_access_ttl(),
            refresh_ttl_secs: default_refresh_ttl(),
            cookie_secure: false,
        }
    }
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_csrf_cookie(),
            header_name: default_csrf_header(),
            max_age_secs: default_csrf_max_age(),
            cookie_secure: false,
            exempt_paths: default_csrf_exempt(),
            rotate_on_success: true,
        }
    }
}

impl Default for SsoConfig {
    fn default() -> Self {
        Self {
            authority_host: default_authority_host(),
            userinfo_endpoint: default_userinfo_endpoint(),
            timeout_secs: default_sso_timeout(),
        }
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            tenant_code: default_tenant_code(),
            tenant_name: default_tenant_name(),
            admin_username: default_admin_username(),
            admin_password: String::new(),
        }
    }
}

impl DatabaseConfig {
    /// Generate database connection URL
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.name
        )
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// True while `auth.jwt_secret` is still the built-in placeholder
    pub fn uses_default_secret(&self) -> bool {
        self.auth.jwt_secret == default_jwt_secret()
    }
}
