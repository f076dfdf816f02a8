//! SSO configuration entity
//!
//! Table: erp_sso_config, one row per tenant

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub const PROVIDER_AZURE_AD: &str = "azure_ad";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "erp_sso_config")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(unique)]
    pub tenant_id: i64,

    #[sea_orm(column_type = "String(Some(32))")]
    pub provider: String,

    /// Directory (tenant) ID on the Azure side
    #[sea_orm(column_type = "String(Some(64))")]
    pub azure_tenant_id: String,

    #[sea_orm(column_type = "String(Some(64))")]
    pub client_id: String,

    #[sea_orm(column_type = "String(Some(255))")]
    #[serde(skip_serializing)]
    pub client_secret: String,

    #[sea_orm(column_type = "String(Some(255))")]
    pub redirect_uri: String,

    pub enabled: bool,

    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
