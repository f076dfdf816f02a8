//! Employee account entity
//!
//! Table: erp_emp_account

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Account status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountStatus {
    Inactive = 0,
    Active = 1,
    Disabled = 2,
}

impl From<i32> for AccountStatus {
    fn from(value: i32) -> Self {
        match value {
            1 => AccountStatus::Active,
            2 => AccountStatus::Disabled,
            _ => AccountStatus::Inactive,
        }
    }
}

impl From<AccountStatus> for i32 {
    fn from(status: AccountStatus) -> Self {
        status as i32
    }
}

/// Role names
pub mod role {
    pub const ADMIN: &str = "admin";
    pub const BUYER: &str = "buyer";
    pub const APPROVER: &str = "approver";
    pub const VIEWER: &str = "viewer";

    pub const ALL: [&str; 4] = [ADMIN, BUYER, APPROVER, VIEWER];
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "erp_emp_account")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub tenant_id: i64,

    pub organization_id: i64,

    pub department_id: i64,

    /// Login name (unique)
    #[sea_orm(column_type = "String(Some(64))", unique)]
    pub username: String,

    #[sea_orm(column_type = "String(Some(128))", nullable)]
    pub email: Option<String>,

    #[sea_orm(column_type = "String(Some(128))")]
    pub full_name: String,

    /// bcrypt hash
    #[sea_orm(column_type = "String(Some(128))")]
    #[serde(skip_serializing)]
    pub password: String,

    #[sea_orm(column_type = "String(Some(16))")]
    pub role: String,

    /// 0 = inactive, 1 = active, 2 = disabled
    pub status: i32,

    /// Unix timestamp of the last successful login
    pub last_login: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn account_status(&self) -> AccountStatus {
        AccountStatus::from(self.status)
    }
}
