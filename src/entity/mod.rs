//! Entity module - SeaORM entity definitions
//!
//! Every business table is scoped by `tenant_id`.

pub mod department;
pub mod emp_account;
pub mod op_log;
pub mod organization;
pub mod refresh_token;
pub mod sso_config;
pub mod tenant;
