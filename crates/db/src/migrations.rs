use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Tables the lead pipeline reads and writes.
pub const LEAD_TABLES: &[&str] = &["app_user", "lead_disposition", "lead_feedback"];

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// Versions of the forward migrations shipped with this build.
pub fn known_versions() -> Vec<i64> {
    MIGRATOR
        .iter()
        .filter(|migration| !migration.migration_type.is_down_migration())
        .map(|migration| migration.version)
        .collect()
}

/// How far the connected database is from the schema this build expects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaStatus {
    pub applied: Vec<i64>,
    pub pending: Vec<i64>,
    pub missing_tables: Vec<&'static str>,
}

impl SchemaStatus {
    pub fn is_ready(&self) -> bool {
        self.pending.is_empty() && self.missing_tables.is_empty()
    }
}

pub async fn schema_status(pool: &DbPool) -> Result<SchemaStatus, sqlx::Error> {
    let has_history: i64 = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations')",
    )
    .fetch_one(pool)
    .await?;

    let applied: Vec<i64> = if has_history == 1 {
        sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success = 1 ORDER BY version")
            .fetch_all(pool)
            .await?
    } else {
        Vec::new()
    };
    let pending =
        known_versions().into_iter().filter(|version| !applied.contains(version)).collect();

    let mut missing_tables = Vec::new();
    for table in LEAD_TABLES {
        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
        )
        .bind(*table)
        .fetch_one(pool)
        .await?;
        if exists == 0 {
            missing_tables.push(*table);
        }
    }

    Ok(SchemaStatus { applied, pending, missing_tables })
}
