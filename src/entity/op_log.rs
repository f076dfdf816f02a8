//! Operation log entity
//!
//! Table: erp_op_log

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Operation types
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpType {
    Login,
    Logout,
    RefreshSession,
    CreateOrganization,
    CreateDept,
    UpdateDept,
    DeleteDept,
    UpdateSso,
    TestSso,
}

impl OpType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpType::Login => "login",
            OpType::Logout => "logout",
            OpType::RefreshSession => "refresh_session",
            OpType::CreateOrganization => "create_organization",
            OpType::CreateDept => "create_department",
            OpType::UpdateDept => "update_department",
            OpType::DeleteDept => "delete_department",
            OpType::UpdateSso => "update_sso",
            OpType::TestSso => "test_sso",
        }
    }
}

/// Operation result
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpResult {
    Success,
    Failed,
}

impl OpResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpResult::Success => "success",
            OpResult::Failed => "failed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "erp_op_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 0 when the tenant is unknown (e.g. failed login)
    pub tenant_id: i64,

    /// Unix timestamp
    pub op_time: i64,

    #[sea_orm(column_type = "String(Some(64))")]
    pub username: String,

    #[sea_orm(column_type = "String(Some(32))")]
    pub op_type: String,

    #[sea_orm(column_type = "Text")]
    pub op_desc: String,

    #[sea_orm(column_type = "String(Some(16))")]
    pub result: String,

    #[sea_orm(column_type = "String(Some(64))", nullable)]
    pub ip: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
