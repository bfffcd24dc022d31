use std::sync::Arc;
use std::time::Duration;

use leadops_core::{
    FeedbackSubmission, LeadId, LeadPipeline, LeadStatus, ManagerName, PipelineError,
    PipelineSettings, ReadRetryPolicy, UserId, FOLLOW_UP_WITH_PARTNER,
};
use leadops_db::{
    connect_with_settings, migrations, DbPool, DemoSeedDataset, InMemoryLeadStore,
    NewDisposition, SqlFeedbackStore, SqlIdentityResolver, SqlLeadHistoryStore,
};

fn fast_settings() -> PipelineSettings {
    PipelineSettings {
        storage_timeout: Duration::from_secs(5),
        read_retry: ReadRetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        },
    }
}

async fn seeded_pool() -> DbPool {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    DemoSeedDataset::load(&pool).await.expect("seed");
    pool
}

fn sql_pipeline(pool: &DbPool) -> LeadPipeline {
    LeadPipeline::new(
        Arc::new(SqlLeadHistoryStore::new(pool.clone())),
        Arc::new(SqlFeedbackStore::new(pool.clone())),
        Arc::new(SqlIdentityResolver::new(pool.clone())),
        fast_settings(),
    )
}

fn memory_pipeline(store: Arc<InMemoryLeadStore>, settings: PipelineSettings) -> LeadPipeline {
    LeadPipeline::new(store.clone(), store.clone(), store, settings)
}

fn submission(lead_id: Option<i64>, mobile: &str, choice: &str) -> FeedbackSubmission {
    FeedbackSubmission {
        lead_id,
        manager_id: 1,
        customer_mobile: mobile.to_string(),
        disposition_choice: choice.to_string(),
        remark: "visited site".to_string(),
        manager_display_name: "Alice".to_string(),
        ..FeedbackSubmission::default()
    }
}

async fn feedback_rows(pool: &DbPool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM lead_feedback").fetch_one(pool).await.expect("count")
}

#[tokio::test]
async fn manager_resolution_feeds_lead_selection() {
    let pool = seeded_pool().await;
    let pipeline = sql_pipeline(&pool);

    let manager = pipeline.resolve_manager(UserId(1)).await.expect("resolve alice");
    let leads = pipeline.select_current_direct_leads(&manager).await.expect("select");

    assert_eq!(leads.iter().map(|lead| lead.id).collect::<Vec<_>>(), vec![LeadId(104), LeadId(101)]);

    let error = pipeline.resolve_manager(UserId(99)).await.expect_err("unknown user");
    assert!(matches!(error, PipelineError::NotFound { entity: "manager", .. }));
}

#[tokio::test]
async fn direct_submission_moves_lead_out_of_the_view() {
    let pool = seeded_pool().await;
    let pipeline = sql_pipeline(&pool);
    let alice = ManagerName::new("alice");

    let receipt = pipeline
        .submit_direct_feedback(submission(Some(101), "9990001111", "Installed"))
        .await
        .expect("submit");
    assert_eq!(receipt.lead_id, 101);

    let leads = pipeline.select_current_direct_leads(&alice).await.expect("select");
    assert_eq!(leads.iter().map(|lead| lead.id).collect::<Vec<_>>(), vec![LeadId(104)]);

    let status: String = sqlx::query_scalar("SELECT status FROM lead_disposition WHERE id = 101")
        .fetch_one(&pool)
        .await
        .expect("status");
    assert_eq!(LeadStatus::parse(&status), Some(LeadStatus::Processed));
}

#[tokio::test]
async fn deferring_to_partner_creates_a_follow_up_lead() {
    let pool = seeded_pool().await;
    let pipeline = sql_pipeline(&pool);
    let alice = ManagerName::new("alice");

    let receipt = pipeline
        .submit_direct_feedback(submission(Some(101), "9990001111", FOLLOW_UP_WITH_PARTNER))
        .await
        .expect("defer");

    let follow_ups = pipeline.select_current_follow_up_leads(&alice).await.expect("follow-ups");
    assert_eq!(follow_ups.len(), 2);
    assert_eq!(follow_ups[0].id, receipt.feedback_id);
    assert_eq!(follow_ups[0].customer_mobile, "9990001111");

    pipeline
        .submit_follow_up_feedback(submission(Some(receipt.feedback_id.0), "9990001111", "Installed"))
        .await
        .expect("close follow-up");
    let follow_ups = pipeline.select_current_follow_up_leads(&alice).await.expect("follow-ups");
    assert_eq!(follow_ups.iter().map(|lead| lead.id.0).collect::<Vec<_>>(), vec![201]);
}

#[tokio::test]
async fn invalid_submission_writes_nothing() {
    let pool = seeded_pool().await;
    let pipeline = sql_pipeline(&pool);
    let before = feedback_rows(&pool).await;

    for lead_id in [None, Some(0), Some(-1)] {
        let error = pipeline
            .submit_direct_feedback(submission(lead_id, "9990001111", "Installed"))
            .await
            .expect_err("invalid id");
        assert!(matches!(error, PipelineError::Validation(_)));
    }

    assert_eq!(feedback_rows(&pool).await, before);
}

#[tokio::test]
async fn feedback_under_another_customer_is_rejected() {
    let pool = seeded_pool().await;
    let pipeline = sql_pipeline(&pool);
    let before = feedback_rows(&pool).await;

    let error = pipeline
        .submit_direct_feedback(submission(Some(101), "8880001111", FOLLOW_UP_WITH_PARTNER))
        .await
        .expect_err("lead 101 belongs to 9990001111");
    assert!(matches!(error, PipelineError::Validation(_)));

    let error = pipeline
        .submit_follow_up_feedback(submission(Some(201), "0000000000", "Installed"))
        .await
        .expect_err("feedback 201 belongs to 9990005555");
    assert!(matches!(error, PipelineError::Validation(_)));

    assert_eq!(feedback_rows(&pool).await, before);
    let alice = ManagerName::new("alice");
    let leads = pipeline.select_current_direct_leads(&alice).await.expect("select");
    assert_eq!(leads.iter().map(|lead| lead.id).collect::<Vec<_>>(), vec![LeadId(104), LeadId(101)]);
    let bob_follow_ups =
        pipeline.select_current_follow_up_leads(&ManagerName::new("bob")).await.expect("bob");
    assert!(bob_follow_ups.is_empty());
}

#[tokio::test]
async fn resubmitting_a_processed_lead_is_a_conflict() {
    let pool = seeded_pool().await;
    let pipeline = sql_pipeline(&pool);

    pipeline
        .submit_follow_up_feedback(submission(Some(201), "9990005555", "Installed"))
        .await
        .expect("first");
    let after_first = feedback_rows(&pool).await;

    let error = pipeline
        .submit_follow_up_feedback(submission(Some(201), "9990005555", "Installed"))
        .await
        .expect_err("second");
    assert!(matches!(error, PipelineError::Conflict { entity: "feedback", .. }));

    let error = pipeline
        .submit_follow_up_feedback(submission(Some(202), "8880002222", "Installed"))
        .await
        .expect_err("already processed in seed");
    assert!(matches!(error, PipelineError::Conflict { .. }));
    assert_eq!(feedback_rows(&pool).await, after_first);
}

#[tokio::test]
async fn in_memory_store_matches_sql_selection() {
    let store = Arc::new(InMemoryLeadStore::new());
    store.insert_user(UserId(1), "alice").await;
    let interested = r#"{"customerIntent":"Interested","preferredDate":"2024-05-10","serviceabilityConfidence":"High Confidence (more than 2 points present inside 100 mtrs circle)"}"#;
    let lead = store
        .insert_disposition(NewDisposition {
            customer_mobile: "9990001111".to_string(),
            structured_disposition: Some(interested.to_string()),
            manager_name: "alice".to_string(),
            ..NewDisposition::default()
        })
        .await;
    let pipeline = memory_pipeline(store, fast_settings());

    let manager = pipeline.resolve_manager(UserId(1)).await.expect("resolve");
    let leads = pipeline.select_current_direct_leads(&manager).await.expect("select");
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].id, lead);
    assert_eq!(leads[0].appointment_date.map(|date| date.to_string()).as_deref(), Some("2024-05-10"));
}

#[tokio::test]
async fn transient_read_failures_are_retried() {
    let store = Arc::new(InMemoryLeadStore::new());
    store.fail_next_reads(2);
    let pipeline = memory_pipeline(store, fast_settings());

    let leads = pipeline
        .select_current_direct_leads(&ManagerName::new("alice"))
        .await
        .expect("third attempt succeeds");
    assert!(leads.is_empty());
}

#[tokio::test]
async fn exhausted_retries_surface_storage_unavailable() {
    let store = Arc::new(InMemoryLeadStore::new());
    store.fail_next_reads(5);
    let pipeline = memory_pipeline(store, fast_settings());

    let error = pipeline
        .select_current_follow_up_leads(&ManagerName::new("alice"))
        .await
        .expect_err("all attempts fail");
    assert!(matches!(error, PipelineError::StorageUnavailable { .. }));
}

#[tokio::test]
async fn slow_storage_is_reported_as_timeout() {
    let store = Arc::new(InMemoryLeadStore::new().with_read_delay(Duration::from_millis(200)));
    let settings = PipelineSettings {
        storage_timeout: Duration::from_millis(20),
        read_retry: ReadRetryPolicy::no_retry(),
    };
    let pipeline = memory_pipeline(store, settings);

    let error = pipeline
        .select_current_direct_leads(&ManagerName::new("alice"))
        .await
        .expect_err("timed out");
    assert!(matches!(error, PipelineError::StorageTimeout { .. }));
}
