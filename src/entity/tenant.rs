//! Tenant entity
//!
//! Table: erp_tenant

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "erp_tenant")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Short login/URL code (unique)
    #[sea_orm(column_type = "String(Some(32))", unique)]
    pub code: String,

    #[sea_orm(column_type = "String(Some(128))")]
    pub name: String,

    /// 1 = active, 2 = suspended
    pub status: i32,

    /// Unix timestamp
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
