//! Refresh token entity
//!
//! Table: erp_refresh_token. Only the SHA-256 of the token is stored.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "erp_refresh_token")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub account_id: i64,

    /// hex(sha256(token))
    #[sea_orm(column_type = "String(Some(64))", unique)]
    pub token_hash: String,

    /// Unix timestamp
    pub expires_at: i64,

    pub revoked: bool,

    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Usable for a refresh at `now`
    pub fn is_usable(&self, now: i64) -> bool {
        !self.revoked && self.expires_at > now
    }
}
