use sea_orm::sea_query::TableCreateStatement;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection,
    DbBackend, DbErr, EntityTrait, QueryFilter, Schema, Set, Statement,
};
use std::time::Duration;
use tracing::info;

use crate::config::{BootstrapConfig, DatabaseConfig};
use crate::entity::emp_account::{self, role, AccountStatus};
use crate::entity::{department, op_log, organization, refresh_token, sso_config, tenant};

/// Initialize database connection and auto-migrate tables
pub async fn init_database(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let database_url = config.connection_url();

    info!("Connecting to database: {}:{}/{}", config.host, config.port, config.name);

    let mut opt = ConnectOptions::new(&database_url);
    opt.max_connections(config.max_connections)
        .min_connections(2)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(600))
        .sqlx_logging(true)
        .sqlx_logging_level(tracing::log::LevelFilter::Debug)
        .set_schema_search_path("public");

    let db = Database::connect(opt).await?;
    info!("Database connection established");

    auto_migrate(&db).await?;

    Ok(db)
}

/// Table definitions in dependency order
fn table_statements(backend: DbBackend) -> Vec<TableCreateStatement> {
    let schema = Schema::new(backend);
    vec![
        schema.create_table_from_entity(tenant::Entity),
        schema.create_table_from_entity(organization::Entity),
        schema.create_table_from_entity(department::Entity),
        schema.create_table_from_entity(emp_account::Entity),
        schema.create_table_from_entity(refresh_token::Entity),
        schema.create_table_from_entity(sso_config::Entity),
        schema.create_table_from_entity(op_log::Entity),
    ]
}

/// Create any missing tables
async fn auto_migrate(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();

    info!("Running auto-migration for all entities...");

    for stmt in table_statements(backend) {
        create_table_if_not_exists(db, backend, stmt).await?;
    }

    info!("Auto-migration completed successfully");
    Ok(())
}

/// Create a table if it doesn't exist
async fn create_table_if_not_exists(
    db: &DatabaseConnection,
    backend: DbBackend,
    mut stmt: TableCreateStatement,
) -> Result<(), DbErr> {
    stmt.if_not_exists();

    let sql = backend.build(&stmt);

    db.execute(Statement::from_string(backend, sql.to_string())).await?;

    Ok(())
}

/// Seed the default tenant and its admin account.
///
/// Runs on every start; existing rows are left untouched. Nothing is seeded
/// while `admin_password` is empty.
pub async fn bootstrap(db: &DatabaseConnection, config: &BootstrapConfig) -> Result<(), DbErr> {
    if config.admin_password.is_empty() {
        info!("Bootstrap skipped: no admin password configured");
        return Ok(());
    }

    let now = chrono::Utc::now().timestamp();

    let tenant = match tenant::Entity::find()
        .filter(tenant::Column::Code.eq(&config.tenant_code))
        .one(db)
        .await?
    {
        Some(t) => t,
        None => {
            info!("Creating tenant '{}'", config.tenant_code);
            tenant::ActiveModel {
                code: Set(config.tenant_code.clone()),
                name: Set(config.tenant_name.clone()),
                status: Set(1),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?
        }
    };

    let existing = emp_account::Entity::find()
        .filter(emp_account::Column::Username.eq(&config.admin_username))
        .one(db)
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    let password = bcrypt::hash(&config.admin_password, bcrypt::DEFAULT_COST)
        .map_err(|e| DbErr::Custom(format!("Failed to hash admin password: {}", e)))?;

    emp_account::ActiveModel {
        tenant_id: Set(tenant.id),
        organization_id: Set(0),
        department_id: Set(0),
        username: Set(config.admin_username.clone()),
        email: Set(None),
        full_name: Set("Administrator".to_string()),
        password: Set(password),
        role: Set(role::ADMIN.to_string()),
        status: Set(AccountStatus::Inactive.into()),
        last_login: Set(0),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("Created admin account '{}'", config.admin_username);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_statements_cover_all_entities() {
        let statements = table_statements(DbBackend::Postgres);
        assert_eq!(statements.len(), 7);

        let sql: Vec<String> = statements
            .into_iter()
            .map(|mut stmt| {
                stmt.if_not_exists();
                DbBackend::Postgres.build(&stmt).to_string()
            })
            .collect();

        for table in [
            "erp_tenant",
            "erp_organization",
            "erp_department",
            "erp_emp_account",
            "erp_refresh_token",
            "erp_sso_config",
            "erp_op_log",
        ] {
            assert!(
                sql.iter().any(|s| s.contains(&format!("\"{}\"", table))),
                "missing {}",
                table
            );
        }
        assert!(sql.iter().all(|s| s.contains("IF NOT EXISTS")));
    }

    #[test]
    fn test_bootstrap_without_password_is_noop() {
        let config = BootstrapConfig::default();
        assert!(config.admin_password.is_empty());
        tokio_test::block_on(bootstrap(&DatabaseConnection::Disconnected, &config)).unwrap();
    }
}
