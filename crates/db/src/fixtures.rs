use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

struct SeedRowContract {
    table: &'static str,
    id: i64,
    label: &'static str,
    description: &'static str,
}

const SEED_USERS: &[SeedRowContract] = &[
    SeedRowContract { table: "app_user", id: 1, label: "user-alice", description: "manager alice" },
    SeedRowContract { table: "app_user", id: 2, label: "user-bob", description: "manager bob" },
    SeedRowContract {
        table: "app_user",
        id: 3,
        label: "user-ops-admin",
        description: "admin without leads",
    },
];

const SEED_DISPOSITIONS: &[SeedRowContract] = &[
    SeedRowContract {
        table: "lead_disposition",
        id: 101,
        label: "disposition-101",
        description: "alice: current direct lead",
    },
    SeedRowContract {
        table: "lead_disposition",
        id: 102,
        label: "disposition-102",
        description: "alice: eligible but superseded",
    },
    SeedRowContract {
        table: "lead_disposition",
        id: 103,
        label: "disposition-103",
        description: "alice: newest event is not interested",
    },
    SeedRowContract {
        table: "lead_disposition",
        id: 104,
        label: "disposition-104",
        description: "alice: current direct lead with malformed preferred date",
    },
    SeedRowContract {
        table: "lead_disposition",
        id: 105,
        label: "disposition-105",
        description: "alice: already installed",
    },
    SeedRowContract {
        table: "lead_disposition",
        id: 106,
        label: "disposition-106",
        description: "alice: processed, deferred to partner",
    },
    SeedRowContract {
        table: "lead_disposition",
        id: 107,
        label: "disposition-107",
        description: "bob: current direct lead",
    },
    SeedRowContract {
        table: "lead_disposition",
        id: 108,
        label: "disposition-108",
        description: "alice: unparseable payload",
    },
    SeedRowContract {
        table: "lead_disposition",
        id: 109,
        label: "disposition-109",
        description: "bob: processed, follow-up closed",
    },
];

const SEED_FEEDBACK: &[SeedRowContract] = &[
    SeedRowContract {
        table: "lead_feedback",
        id: 201,
        label: "feedback-201",
        description: "alice: pending partner follow-up",
    },
    SeedRowContract {
        table: "lead_feedback",
        id: 202,
        label: "feedback-202",
        description: "bob: follow-up already processed",
    },
];

/// Demo dataset covering every selection rule for two managers.
///
/// After a fresh load:
/// - `alice` sees direct leads 104 then 101, and follow-up 201
/// - `bob` sees direct lead 107 and no follow-ups
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    /// Load the dataset. Rows that already exist are left untouched.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            users_seeded: SEED_USERS.len(),
            dispositions_seeded: SEED_DISPOSITIONS.len(),
            feedback_seeded: SEED_FEEDBACK.len(),
            rows: SEED_USERS
                .iter()
                .chain(SEED_DISPOSITIONS)
                .chain(SEED_FEEDBACK)
                .map(|row| SeedRowInfo { label: row.label, description: row.description })
                .collect(),
        })
    }

    /// Check that every seeded row is present.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for row in SEED_USERS.iter().chain(SEED_DISPOSITIONS).chain(SEED_FEEDBACK) {
            let exists: i64 = sqlx::query_scalar(&format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)",
                row.table
            ))
            .bind(row.id)
            .fetch_one(pool)
            .await?;
            checks.push((row.label, exists == 1));
        }

        let all_present = checks.iter().all(|(_, exists)| *exists);
        Ok(VerificationResult { all_present, checks })
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub users_seeded: usize,
    pub dispositions_seeded: usize,
    pub feedback_seeded: usize,
    pub rows: Vec<SeedRowInfo>,
}

#[derive(Debug)]
pub struct SeedRowInfo {
    pub label: &'static str,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use leadops_core::domain::lead::LeadId;
    use leadops_core::domain::manager::{ManagerName, UserId};
    use leadops_core::pipeline::IdentityResolver;

    use super::*;
    use crate::repositories::{SqlFeedbackStore, SqlIdentityResolver, SqlLeadHistoryStore};
    use crate::{connect_with_settings, migrations};

    async fn seeded_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect to test database");
        migrations::run_pending(&pool).await.expect("run migrations");
        DemoSeedDataset::load(&pool).await.expect("load seed fixtures");
        pool
    }

    #[test]
    fn sql_fixture_is_valid() {
        assert!(!DemoSeedDataset::SQL.is_empty());
    }

    #[tokio::test]
    async fn verify_seed_contract_and_idempotency() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect to test database");
        migrations::run_pending(&pool).await.expect("run migrations");

        let first = DemoSeedDataset::load(&pool).await.expect("load seed fixtures");
        let first_verification = DemoSeedDataset::verify(&pool).await.expect("verify seed fixtures");
        assert!(first_verification.all_present);
        assert_eq!(first.dispositions_seeded, 9);

        let second = DemoSeedDataset::load(&pool).await.expect("reload seed fixtures");
        let second_verification =
            DemoSeedDataset::verify(&pool).await.expect("re-verify seed fixtures");
        assert!(second_verification.all_present);
        assert_eq!(second.rows.len(), first.rows.len());
        assert_eq!(first_verification.checks, second_verification.checks);
    }

    #[tokio::test]
    async fn seeded_views_match_the_documented_contract() {
        let pool = seeded_pool().await;
        let history = SqlLeadHistoryStore::new(pool.clone());
        let feedback = SqlFeedbackStore::new(pool.clone());

        let alice = ManagerName::new("alice");
        let direct = history.select_current_direct_leads(&alice).await.expect("alice direct");
        assert_eq!(direct.iter().map(|lead| lead.id).collect::<Vec<_>>(), vec![LeadId(104), LeadId(101)]);
        assert!(direct[0].appointment_date.is_none());

        let follow_ups = feedback.select_current_follow_up_leads(&alice).await.expect("follow-ups");
        assert_eq!(follow_ups.len(), 1);
        assert_eq!(follow_ups[0].id.0, 201);

        let bob = ManagerName::new("bob");
        let direct = history.select_current_direct_leads(&bob).await.expect("bob direct");
        assert_eq!(direct.iter().map(|lead| lead.id).collect::<Vec<_>>(), vec![LeadId(107)]);
        assert!(feedback.select_current_follow_up_leads(&bob).await.expect("bob follow-ups").is_empty());
    }

    #[tokio::test]
    async fn seeded_users_resolve_to_managers() {
        let resolver = SqlIdentityResolver::new(seeded_pool().await);
        assert_eq!(
            resolver.manager_name(UserId(1)).await.expect("resolve"),
            Some(ManagerName::new("alice"))
        );
    }
}
