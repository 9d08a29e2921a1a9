//! Route handlers. Thin: parse, call the service, shape the response.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::domain::{Caller, PrincipalId};
use crate::http::request::parse_poll_id;
use crate::http::response::{error_response, respond, ApiResponse};
use crate::http::server::AppState;
use crate::votes::OptionChoice;

#[derive(Debug, Deserialize)]
pub struct PollInput {
    pub question: String,
    pub options: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct VoteInput {
    /// Kept raw so non-integers can be rejected as invalid options.
    pub option_index: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct RoleInput {
    pub principal_id: String,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct Health {
    pub version: &'static str,
    pub status: &'static str,
}

fn bad_body(rejection: JsonRejection) -> Response {
    tracing::debug!(error = %rejection, "Malformed request body");
    let body: ApiResponse<()> = ApiResponse::failure("malformed request body");
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

pub async fn health() -> Json<Health> {
    Json(Health {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
    })
}

pub async fn list_polls(State(state): State<AppState>) -> Response {
    respond(state.service.list_polls().await, StatusCode::OK)
}

pub async fn get_poll(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = match parse_poll_id(&id) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };
    respond(state.service.get_poll(id).await, StatusCode::OK)
}

pub async fn create_poll(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<PollInput>, JsonRejection>,
) -> Response {
    let Json(input) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_body(rejection),
    };
    let result = state
        .service
        .create_poll(&caller, &input.question, &input.options)
        .await;
    respond(result, StatusCode::CREATED)
}

pub async fn update_poll(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    body: Result<Json<PollInput>, JsonRejection>,
) -> Response {
    let Json(input) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_body(rejection),
    };
    let id = match parse_poll_id(&id) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };
    let result = state
        .service
        .update_poll(&caller, id, &input.question, &input.options)
        .await
        .map(|()| serde_json::json!({ "ok": true }));
    respond(result, StatusCode::OK)
}

pub async fn delete_poll(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_poll_id(&id) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };
    let result = state
        .service
        .delete_poll(&caller, id)
        .await
        .map(|()| serde_json::json!({ "ok": true }));
    respond(result, StatusCode::OK)
}

pub async fn submit_vote(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    body: Result<Json<VoteInput>, JsonRejection>,
) -> Response {
    let Json(input) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_body(rejection),
    };
    let id = match parse_poll_id(&id) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };
    let choice = OptionChoice::from_json(&input.option_index);
    respond(state.service.submit_vote(&caller, id, choice).await, StatusCode::CREATED)
}

pub async fn admin_polls(State(state): State<AppState>, caller: Caller) -> Response {
    respond(state.service.list_all_polls_for_admin(&caller).await, StatusCode::OK)
}

pub async fn admin_audit(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<AuditQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(100);
    respond(state.service.list_audit_records(&caller, limit).await, StatusCode::OK)
}

pub async fn grant_role(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<RoleInput>, JsonRejection>,
) -> Response {
    let Json(input) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_body(rejection),
    };
    let result = state
        .service
        .grant_role(&caller, PrincipalId::new(input.principal_id), &input.role)
        .await;
    respond(result, StatusCode::OK)
}

pub async fn revoke_role(
    State(state): State<AppState>,
    caller: Caller,
    Path((principal_id, role)): Path<(String, String)>,
) -> Response {
    let result = state
        .service
        .revoke_role(&caller, PrincipalId::new(principal_id), &role)
        .await;
    respond(result, StatusCode::OK)
}
