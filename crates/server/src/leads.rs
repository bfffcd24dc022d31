use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use leadops_core::{
    DirectLead, FeedbackSubmission, FollowUpLead, InterfaceError, LeadPipeline, PipelineError,
    SubmissionReceipt, UserId, Workflow,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct LeadsState {
    pipeline: LeadPipeline,
}

#[derive(Debug, Default, Deserialize)]
pub struct LeadQuery {
    #[serde(default)]
    pub user_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct LeadList<T> {
    pub data: Vec<T>,
}

#[derive(Debug, Serialize)]
pub struct ReceiptResponse {
    pub data: SubmissionReceipt,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub correlation_id: String,
}

type ApiFailure = (StatusCode, Json<ApiError>);

pub fn router(pipeline: LeadPipeline) -> Router {
    Router::new()
        .route("/api/v1/leads/direct", post(list_direct_leads))
        .route("/api/v1/leads/follow-up", post(list_follow_up_leads))
        .route("/api/v1/leads/direct/feedback", post(submit_direct_feedback))
        .route("/api/v1/leads/follow-up/feedback", post(submit_follow_up_feedback))
        .with_state(LeadsState { pipeline })
}

pub async fn list_direct_leads(
    State(state): State<LeadsState>,
    headers: HeaderMap,
    body: Result<Json<LeadQuery>, JsonRejection>,
) -> Result<Json<LeadList<DirectLead>>, ApiFailure> {
    let correlation_id = correlation_id(&headers);
    let user_id = requested_user(body, &correlation_id)?;

    let manager = state
        .pipeline
        .resolve_manager(user_id)
        .await
        .map_err(|error| failure(error, &correlation_id))?;
    let data = state
        .pipeline
        .select_current_direct_leads(&manager)
        .await
        .map_err(|error| failure(error, &correlation_id))?;

    info!(
        event_name = "api.leads.direct",
        correlation_id = %correlation_id,
        user_id = user_id.0,
        count = data.len(),
        "direct leads served"
    );
    Ok(Json(LeadList { data }))
}

pub async fn list_follow_up_leads(
    State(state): State<LeadsState>,
    headers: HeaderMap,
    body: Result<Json<LeadQuery>, JsonRejection>,
) -> Result<Json<LeadList<FollowUpLead>>, ApiFailure> {
    let correlation_id = correlation_id(&headers);
    let user_id = requested_user(body, &correlation_id)?;

    let manager = state
        .pipeline
        .resolve_manager(user_id)
        .await
        .map_err(|error| failure(error, &correlation_id))?;
    let data = state
        .pipeline
        .select_current_follow_up_leads(&manager)
        .await
        .map_err(|error| failure(error, &correlation_id))?;

    info!(
        event_name = "api.leads.follow_up",
        correlation_id = %correlation_id,
        user_id = user_id.0,
        count = data.len(),
        "follow-up leads served"
    );
    Ok(Json(LeadList { data }))
}

pub async fn submit_direct_feedback(
    State(state): State<LeadsState>,
    headers: HeaderMap,
    body: Result<Json<FeedbackSubmission>, JsonRejection>,
) -> Result<Json<ReceiptResponse>, ApiFailure> {
    submit(&state, Workflow::Direct, &headers, body).await
}

pub async fn submit_follow_up_feedback(
    State(state): State<LeadsState>,
    headers: HeaderMap,
    body: Result<Json<FeedbackSubmission>, JsonRejection>,
) -> Result<Json<ReceiptResponse>, ApiFailure> {
    submit(&state, Workflow::FollowUp, &headers, body).await
}

async fn submit(
    state: &LeadsState,
    workflow: Workflow,
    headers: &HeaderMap,
    body: Result<Json<FeedbackSubmission>, JsonRejection>,
) -> Result<Json<ReceiptResponse>, ApiFailure> {
    let correlation_id = correlation_id(headers);
    let Json(submission) = body.map_err(|rejection| bad_body(rejection, &correlation_id))?;

    let receipt = match workflow {
        Workflow::Direct => state.pipeline.submit_direct_feedback(submission).await,
        Workflow::FollowUp => state.pipeline.submit_follow_up_feedback(submission).await,
    }
    .map_err(|error| failure(error, &correlation_id))?;

    info!(
        event_name = "api.feedback.recorded",
        correlation_id = %correlation_id,
        workflow = workflow.as_str(),
        lead_id = receipt.lead_id,
        feedback_id = receipt.feedback_id.0,
        "feedback submission accepted"
    );
    Ok(Json(ReceiptResponse { data: receipt }))
}

fn requested_user(
    body: Result<Json<LeadQuery>, JsonRejection>,
    correlation_id: &str,
) -> Result<UserId, ApiFailure> {
    let Json(query) = body.map_err(|rejection| bad_body(rejection, correlation_id))?;
    query.user_id.map(UserId).ok_or_else(|| {
        failure(PipelineError::Validation("user_id is required".to_string()), correlation_id)
    })
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string())
}

fn bad_body(rejection: JsonRejection, correlation_id: &str) -> ApiFailure {
    failure(PipelineError::Validation(rejection.body_text()), correlation_id)
}

fn failure(error: PipelineError, correlation_id: &str) -> ApiFailure {
    let detail = error.to_string();
    let mapped = error.into_interface(correlation_id);
    let status = match &mapped {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    warn!(
        event_name = "api.request.failed",
        correlation_id = %correlation_id,
        status = status.as_u16(),
        error = %detail,
        "request failed"
    );
    (
        status,
        Json(ApiError {
            error: mapped.user_message(),
            correlation_id: mapped.correlation_id().to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::Body,
        extract::State,
        http::{HeaderMap, HeaderValue, Request, StatusCode},
        Json,
    };
    use leadops_core::{
        FeedbackSubmission, LeadPipeline, PipelineSettings, ReadRetryPolicy, UserId,
    };
    use leadops_db::{InMemoryLeadStore, NewDisposition};
    use tower::ServiceExt;

    use super::*;

    const INTERESTED: &str = r#"{"customerIntent":"Interested","preferredDate":"2024-05-10","serviceabilityConfidence":"High Confidence (more than 2 points present inside 100 mtrs circle)"}"#;

    async fn seeded_store() -> (Arc<InMemoryLeadStore>, i64) {
        let store = Arc::new(InMemoryLeadStore::new());
        store.insert_user(UserId(1), "alice").await;
        let lead = store
            .insert_disposition(NewDisposition {
                customer_mobile: "9990001111".to_string(),
                structured_disposition: Some(INTERESTED.to_string()),
                manager_name: "alice".to_string(),
                ..NewDisposition::default()
            })
            .await;
        (store, lead.0)
    }

    fn state(store: Arc<InMemoryLeadStore>) -> State<LeadsState> {
        let settings = PipelineSettings {
            storage_timeout: Duration::from_secs(2),
            read_retry: ReadRetryPolicy::no_retry(),
        };
        State(LeadsState {
            pipeline: LeadPipeline::new(store.clone(), store.clone(), store, settings),
        })
    }

    fn submission(lead_id: Option<i64>) -> FeedbackSubmission {
        FeedbackSubmission {
            lead_id,
            manager_id: 1,
            customer_mobile: "9990001111".to_string(),
            disposition_choice: "Installed".to_string(),
            ..FeedbackSubmission::default()
        }
    }

    #[tokio::test]
    async fn direct_leads_are_served_for_a_known_user() {
        let (store, lead_id) = seeded_store().await;

        let Json(list) = list_direct_leads(
            state(store),
            HeaderMap::new(),
            Ok(Json(LeadQuery { user_id: Some(1) })),
        )
        .await
        .expect("leads");

        assert_eq!(list.data.len(), 1);
        assert_eq!(list.data[0].id.0, lead_id);
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let (store, _) = seeded_store().await;

        let (status, Json(body)) = list_follow_up_leads(
            state(store),
            HeaderMap::new(),
            Ok(Json(LeadQuery { user_id: Some(42) })),
        )
        .await
        .expect_err("unknown user");

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(!body.correlation_id.is_empty());
    }

    #[tokio::test]
    async fn missing_user_id_is_a_bad_request() {
        let (store, _) = seeded_store().await;

        let (status, _) =
            list_direct_leads(state(store), HeaderMap::new(), Ok(Json(LeadQuery::default())))
                .await
                .expect_err("missing user");

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn second_submission_is_a_conflict() {
        let (store, lead_id) = seeded_store().await;
        let mut headers = HeaderMap::new();
        headers.insert(CORRELATION_HEADER, HeaderValue::from_static("req-123"));

        let Json(receipt) = submit_direct_feedback(
            state(store.clone()),
            headers.clone(),
            Ok(Json(submission(Some(lead_id)))),
        )
        .await
        .expect("first submission");
        assert_eq!(receipt.data.lead_id, lead_id);

        let (status, Json(body)) =
            submit_direct_feedback(state(store), headers, Ok(Json(submission(Some(lead_id)))))
                .await
                .expect_err("second submission");

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.correlation_id, "req-123");
    }

    #[tokio::test]
    async fn submission_for_another_customer_is_a_bad_request() {
        let (store, lead_id) = seeded_store().await;
        let mut foreign = submission(Some(lead_id));
        foreign.customer_mobile = "8880001111".to_string();

        let (status, Json(body)) =
            submit_direct_feedback(state(store.clone()), HeaderMap::new(), Ok(Json(foreign)))
                .await
                .expect_err("wrong customer");

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.contains("8880001111"), "{}", body.error);
        assert!(store.feedback().await.is_empty());
    }

    #[tokio::test]
    async fn storage_failures_hide_their_detail() {
        let (store, _) = seeded_store().await;
        store.fail_next_reads(1);

        let (status, Json(body)) = list_direct_leads(
            state(store),
            HeaderMap::new(),
            Ok(Json(LeadQuery { user_id: Some(1) })),
        )
        .await
        .expect_err("storage down");

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!body.error.contains("injected"));
    }

    #[tokio::test]
    async fn router_rejects_malformed_json_with_error_body() {
        let (store, _) = seeded_store().await;
        let State(leads_state) = state(store);
        let app = router(leads_state.pipeline);

        let response = app
            .oneshot(
                Request::post("/api/v1/leads/direct/feedback")
                    .header("content-type", "application/json")
                    .body(Body::from("{\"lead_id\": "))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024).await.expect("body");
        let body: ApiError = serde_json::from_slice(&bytes).expect("json error body");
        assert!(!body.correlation_id.is_empty());
    }

    #[tokio::test]
    async fn router_serves_follow_up_feedback_route() {
        let (store, _) = seeded_store().await;
        let State(leads_state) = state(store);
        let app = router(leads_state.pipeline);

        let response = app
            .oneshot(
                Request::post("/api/v1/leads/follow-up/feedback")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"lead_id": 77, "manager_id": 1, "customer_mobile": "9990001111", "disposition_choice": "Installed"}"#,
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
