//! Request middleware: CSRF guard and authentication

pub mod auth;
pub mod csrf;

pub use auth::{auth_layer, RequestContext};
pub use csrf::{csrf_layer, CsrfPolicy};
