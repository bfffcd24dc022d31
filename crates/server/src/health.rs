use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use leadops_db::migrations::{self, SchemaStatus};
use leadops_db::DbPool;
use serde::Serialize;
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    Degraded,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Check {
    pub status: Readiness,
    pub detail: String,
}

/// Whether the pipeline can serve lead reads and feedback writes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Readout {
    pub status: Readiness,
    pub database: Check,
    pub schema: Check,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(db_pool)
}

pub async fn health(State(pool): State<DbPool>) -> (StatusCode, Json<Readout>) {
    let (database, schema) = match migrations::schema_status(&pool).await {
        Ok(status) => (
            Check { status: Readiness::Ready, detail: "lead store reachable".to_string() },
            schema_check(&status),
        ),
        Err(error) => {
            warn!(event_name = "system.health.database_degraded", error = %error, "lead store unreachable");
            (
                Check { status: Readiness::Degraded, detail: "lead store unreachable".to_string() },
                Check {
                    status: Readiness::Degraded,
                    detail: "schema not checked while the lead store is unreachable".to_string(),
                },
            )
        }
    };

    let status = if database.status == Readiness::Ready && schema.status == Readiness::Ready {
        Readiness::Ready
    } else {
        Readiness::Degraded
    };
    let code = match status {
        Readiness::Ready => StatusCode::OK,
        Readiness::Degraded => StatusCode::SERVICE_UNAVAILABLE,
    };

    (code, Json(Readout { status, database, schema, checked_at: Utc::now().to_rfc3339() }))
}

fn schema_check(status: &SchemaStatus) -> Check {
    if status.is_ready() {
        return Check {
            status: Readiness::Ready,
            detail: format!("{} migrations applied", status.applied.len()),
        };
    }

    let mut problems = Vec::new();
    if !status.pending.is_empty() {
        problems.push(format!("{} migrations pending", status.pending.len()));
    }
    if !status.missing_tables.is_empty() {
        problems.push(format!("missing tables: {}", status.missing_tables.join(", ")));
    }
    warn!(
        event_name = "system.health.schema_degraded",
        pending = status.pending.len(),
        missing_tables = ?status.missing_tables,
        "lead schema incomplete"
    );
    Check { status: Readiness::Degraded, detail: problems.join("; ") }
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, extract::State, http::Request, http::StatusCode, Json};
    use leadops_db::{connect_with_settings, migrations, DbPool};
    use tower::ServiceExt;

    use super::{health, router, Readiness};

    async fn pool() -> DbPool {
        connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect")
    }

    #[tokio::test]
    async fn migrated_store_is_ready() {
        let pool = pool().await;
        migrations::run_pending(&pool).await.expect("migrate");

        let (status, Json(readout)) = health(State(pool.clone())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(readout.status, Readiness::Ready);
        assert_eq!(readout.schema.status, Readiness::Ready);
        pool.close().await;
    }

    #[tokio::test]
    async fn unmigrated_store_is_degraded_with_pending_work() {
        let pool = pool().await;

        let (status, Json(readout)) = health(State(pool)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(readout.database.status, Readiness::Ready);
        assert_eq!(readout.schema.status, Readiness::Degraded);
        assert!(readout.schema.detail.contains("pending"), "{}", readout.schema.detail);
        assert!(readout.schema.detail.contains("lead_disposition"), "{}", readout.schema.detail);
    }

    #[tokio::test]
    async fn dropped_feedback_table_degrades_readiness() {
        let pool = pool().await;
        migrations::run_pending(&pool).await.expect("migrate");
        sqlx::query("DROP TABLE lead_feedback").execute(&pool).await.expect("drop");

        let (status, Json(readout)) = health(State(pool)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(readout.schema.detail, "missing tables: lead_feedback");
    }

    #[tokio::test]
    async fn closed_pool_reports_an_unreachable_store() {
        let pool = pool().await;
        pool.close().await;

        let response = router(pool)
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
