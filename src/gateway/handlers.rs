use super::AppState;
use crate::approval::{DecisionOutcome, Resolution};
use crate::intent::{Intent, RiskTier};
use crate::router::{RouteRequest, RouteResult};
use crate::{ApprovalError, OpsError};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};

/// POST /ops/route request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RouteBody {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub caller_id: Option<String>,
}

/// Wire form of a routing outcome.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RouteReply {
    pub need_confirm: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskTier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_minutes: Option<i64>,
}

impl RouteReply {
    fn answered(message: String, intent: Intent) -> Self {
        Self {
            need_confirm: false,
            message,
            nonce: None,
            intent: Some(intent),
            risk: None,
            blocked: None,
            reason: None,
            retry_after_minutes: None,
        }
    }
}

impl From<RouteResult> for RouteReply {
    fn from(result: RouteResult) -> Self {
        match result {
            RouteResult::Answered { message, intent } => Self::answered(message, intent),
            RouteResult::ConfirmationRequired {
                nonce,
                prompt,
                intent,
                risk,
            } => Self {
                need_confirm: true,
                message: prompt,
                nonce: Some(nonce),
                intent: Some(intent),
                risk: Some(risk),
                blocked: None,
                reason: None,
                retry_after_minutes: None,
            },
            RouteResult::Throttled {
                message,
                retry_after_minutes,
            } => Self {
                need_confirm: false,
                message,
                nonce: None,
                intent: None,
                risk: None,
                blocked: Some(true),
                reason: None,
                retry_after_minutes: Some(retry_after_minutes),
            },
            RouteResult::Blocked { message, reason } => Self {
                need_confirm: false,
                message,
                nonce: None,
                intent: None,
                risk: None,
                blocked: Some(true),
                reason: Some(reason),
                retry_after_minutes: None,
            },
        }
    }
}

/// GET /health — liveness only, no secrets leaked.
pub(super) async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /ops/route — one operator turn through the command router.
pub(super) async fn handle_route(
    State(state): State<AppState>,
    Json(body): Json<RouteBody>,
) -> impl IntoResponse {
    let request = RouteRequest {
        session_id: body.session_id,
        text: body.text,
        target: body.target,
        caller_id: body.caller_id,
    };

    match state.router.route(request).await {
        Ok(result) => (StatusCode::OK, Json(serde_json::json!(RouteReply::from(result)))),
        Err(OpsError::Route(error)) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": error.to_string() })),
        ),
        Err(error) => {
            tracing::error!(%error, "route processing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": "processing_failed",
                    "message": "Command processing failed. Please try again.",
                })),
            )
        }
    }
}

/// POST /ops/confirm request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ConfirmBody {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub nonce: String,
    #[serde(default)]
    pub decision: String,
    #[serde(default)]
    pub caller_id: Option<String>,
}

/// POST /ops/confirm — approve or reject the pending decision, then hand an
/// approved action off to the executor collaborator.
pub(super) async fn handle_confirm(
    State(state): State<AppState>,
    Json(body): Json<ConfirmBody>,
) -> impl IntoResponse {
    let outcome: DecisionOutcome = match body.decision.parse() {
        Ok(outcome) => outcome,
        Err(error) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": error })),
            );
        }
    };

    let resolution = state
        .router
        .resolve(&body.session_id, &body.nonce, outcome)
        .await;

    match resolution {
        Ok(Resolution::Approved {
            intent,
            target,
            message,
        }) => {
            // Handoff happens strictly after a successful approve.
            if let Err(error) = state.executor.execute(intent, target.as_deref()).await {
                tracing::error!(%intent, %error, "executor handoff failed");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({
                        "error": "action_execution_failed",
                        "message": format!("Approved, but starting \"{intent}\" failed."),
                    })),
                );
            }
            tracing::info!(
                %intent,
                caller = body.caller_id.as_deref().unwrap_or(""),
                "approved action handed off"
            );
            (StatusCode::OK, Json(serde_json::json!({ "ok": true, "message": message })))
        }
        Ok(Resolution::Rejected { message }) => {
            (StatusCode::OK, Json(serde_json::json!({ "ok": true, "message": message })))
        }
        Err(error) => confirm_error_reply(&error),
    }
}

fn confirm_error_reply(error: &OpsError) -> (StatusCode, Json<serde_json::Value>) {
    match error {
        OpsError::Route(validation) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": validation.to_string() })),
        ),
        OpsError::Approval(approval) => {
            let status = match approval {
                ApprovalError::SessionNotFound(_) => StatusCode::NOT_FOUND,
                ApprovalError::PendingNotFound => StatusCode::CONFLICT,
                ApprovalError::NonceMismatch => StatusCode::FORBIDDEN,
                ApprovalError::Expired => StatusCode::GONE,
                ApprovalError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                status,
                Json(serde_json::json!({ "error": approval.to_string() })),
            )
        }
        other => {
            tracing::error!(error = %other, "confirm processing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "processing_failed" })),
            )
        }
    }
}
