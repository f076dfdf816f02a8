//! Purchasing - procurement ERP backend
//!
//! Session security for the purchasing web application: cookie-based JWT
//! sessions, CSRF double-submit protection, cross-tab logout sync, the
//! organization directory, and Azure AD SSO administration.

pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod routes;
pub mod session;
pub mod state;
pub mod token;
pub mod validation;
pub mod ws;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, AppResult};
pub use state::AppState;
