//! Audit log handlers
//!
//! Implements operation log query and the background writer

use axum::{
    extract::{Query, State},
    response::Json,
    Extension,
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};

use crate::entity::op_log;
use crate::error::AppResult;
use crate::middleware::auth::RequestContext;
use crate::routes::ApiResponse;
use crate::state::AppState;

/// Query parameters for log pagination
#[derive(Debug, Deserialize)]
pub struct LogQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(rename = "pageSize", default = "default_page_size")]
    pub page_size: u64,
}

fn default_page() -> u64 {
    1
}

fn default_page_size() -> u64 {
    20
}

/// Log response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogResponse {
    pub id: i64,
    pub op_time: i64,
    pub username: String,
    pub op_type: String,
    pub op_desc: String,
    pub result: String,
    pub ip: String,
}

impl From<op_log::Model> for LogResponse {
    fn from(m: op_log::Model) -> Self {
        Self {
            id: m.id,
            op_time: m.op_time,
            username: m.username,
            op_type: m.op_type,
            op_desc: m.op_desc,
            result: m.result,
            ip: m.ip.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogPage {
    pub logs: Vec<LogResponse>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

/// GET /api/audit/logs
pub async fn query_logs(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<LogQuery>,
) -> AppResult<Json<ApiResponse<LogPage>>> {
    ctx.require_admin()?;

    let page = query.page.max(1);
    let page_size = query.page_size.clamp(1, 100);

    let logs = op_log::Entity::find()
        .filter(op_log::Column::TenantId.eq(ctx.tenant_id))
        .order_by_desc(op_log::Column::Id)
        .offset((page - 1) * page_size)
        .limit(page_size)
        .all(&state.db)
        .await?;

    let total = op_log::Entity::find()
        .filter(op_log::Column::TenantId.eq(ctx.tenant_id))
        .count(&state.db)
        .await?;

    Ok(Json(ApiResponse::success(LogPage {
        logs: logs.into_iter().map(LogResponse::from).collect(),
        total,
        page,
        page_size,
    })))
}

/// Service for adding operation logs
pub mod service {
    use axum::http::HeaderMap;
    use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
    use tokio::sync::mpsc;

    use crate::entity::op_log::{self, OpResult, OpType};

    /// Log entry to be added
    #[derive(Debug, Clone)]
    pub struct LogEntry {
        pub tenant_id: i64,
        pub username: String,
        pub op_type: OpType,
        pub op_desc: String,
        pub result: OpResult,
        pub ip: Option<String>,
    }

    impl LogEntry {
        pub fn new(tenant_id: i64, username: impl Into<String>, op_type: OpType) -> Self {
            Self {
                tenant_id,
                username: username.into(),
                op_type,
                op_desc: String::new(),
                result: OpResult::Success,
                ip: None,
            }
        }

        pub fn desc(mut self, desc: impl Into<String>) -> Self {
            self.op_desc = desc.into();
            self
        }

        pub fn failed(mut self) -> Self {
            self.result = OpResult::Failed;
            self
        }

        pub fn ip(mut self, ip: Option<String>) -> Self {
            self.ip = ip;
            self
        }
    }

    /// Handle to the background log writer
    #[derive(Clone)]
    pub struct AuditSink {
        tx: Option<mpsc::Sender<LogEntry>>,
    }

    impl AuditSink {
        /// Start the writer task; must run inside a Tokio runtime
        pub fn spawn(db: DatabaseConnection) -> Self {
            let (tx, mut rx) = mpsc::channel::<LogEntry>(200);

            tokio::spawn(async move {
                while let Some(entry) = rx.recv().await {
                    let log = op_log::ActiveModel {
                        tenant_id: Set(entry.tenant_id),
                        op_time: Set(chrono::Utc::now().timestamp()),
                        username: Set(entry.username),
                        op_type: Set(entry.op_type.as_str().to_string()),
                        op_desc: Set(entry.op_desc),
                        result: Set(entry.result.as_str().to_string()),
                        ip: Set(entry.ip),
                        ..Default::default()
                    };

                    if let Err(e) = log.insert(&db).await {
                        tracing::error!("Failed to log operation: {}", e);
                    }
                }
            });

            Self { tx: Some(tx) }
        }

        /// A sink that drops everything
        pub fn disabled() -> Self {
            Self { tx: None }
        }

        /// Queue an entry without waiting
        pub fn record(&self, entry: LogEntry) {
            let Some(tx) = &self.tx else {
                tracing::debug!("Audit disabled, dropped: {:?}", entry.op_type);
                return;
            };
            if tx.try_send(entry).is_err() {
                tracing::warn!("Log channel is full, operation log dropped");
            }
        }
    }

    /// Best-effort client address from proxy headers
    pub fn client_ip(headers: &HeaderMap) -> Option<String> {
        headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

}
