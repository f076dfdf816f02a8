//! Request handlers module

pub mod audit;
pub mod auth;
pub mod csrf;
pub mod department;
pub mod organization;
pub mod sso;
