// src/server.rs
//
// HTTP surface. The service sits behind an auth gateway that resolves the
// caller and forwards identity in headers; handlers read that identity, pull
// the raw rows from the collaborator store, run the in-memory derivations and
// write back through the same store. No state other than the store handle.

use axum::extract::{FromRequestParts, Query, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Datelike, Duration, Local, NaiveDate};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::model::{Actor, Role};
use crate::period::{derive_periods, find_period, week_start, Period};
use crate::store::{EntryFilter, StoreError, TimesheetStore};
use crate::summary::summarize;
use crate::workflow::{self, WeekDraft, WorkflowError};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TimesheetStore>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/periods", get(list_periods))
        .route("/periods/rows", get(period_rows))
        .route("/periods/approve", post(approve))
        .route("/periods/reject", post(reject))
        .route("/periods/withdraw", post(withdraw))
        .route("/summary", get(summary))
        .route("/timesheets/save", post(save))
        .route("/timesheets/submit", post(submit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Errors ---

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("caller identity headers missing")]
    MissingIdentity,
    #[error("no timesheet entries for that associate and week")]
    PeriodNotFound,
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::MissingIdentity => StatusCode::UNAUTHORIZED,
            AppError::PeriodNotFound => StatusCode::NOT_FOUND,
            AppError::Workflow(err) => match err {
                WorkflowError::EmptyTimesheet | WorkflowError::MissingReason => {
                    StatusCode::BAD_REQUEST
                }
                WorkflowError::PeriodLocked { .. } | WorkflowError::NotSubmitted { .. } => {
                    StatusCode::CONFLICT
                }
                WorkflowError::NotPermitted(_) => StatusCode::FORBIDDEN,
                WorkflowError::Store(_) => StatusCode::BAD_GATEWAY,
            },
            AppError::Store(_) => StatusCode::BAD_GATEWAY,
        };
        if status.is_server_error() {
            error!("request failed: {self}");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

// --- Actor extraction ---

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let associate_id = header("x-associate-id").ok_or(AppError::MissingIdentity)?;
        let display_name = header("x-associate-name").unwrap_or_default();
        let role = header("x-role")
            .map(|r| Role::parse(&r))
            .unwrap_or(Role::Associate);
        Ok(Actor {
            associate_id,
            display_name,
            role,
        })
    }
}

// --- Read endpoints ---

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct PeriodsQuery {
    associate_id: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

async fn list_periods(
    State(state): State<AppState>,
    Query(query): Query<PeriodsQuery>,
) -> Result<Json<Vec<Period>>, AppError> {
    let filter = EntryFilter {
        associate_id: query.associate_id,
        start_date: query.start_date,
        end_date: query.end_date,
    };
    let entries = state.store.list_time_entries(&filter).await?;
    let associates = state.store.list_associates().await?;
    Ok(Json(derive_periods(&entries, &associates)))
}

#[derive(Debug, Deserialize)]
struct PeriodRowsQuery {
    associate_id: String,
    week_start: NaiveDate,
}

/// The edit-grid payload for one period: merged rows plus status and trail.
async fn period_rows(
    State(state): State<AppState>,
    Query(query): Query<PeriodRowsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let period = load_period(&state, &query.associate_id, query.week_start).await?;
    Ok(Json(json!({
        "associate_id": period.associate_id,
        "week_start": period.week_start,
        "label": period.label,
        "status": period.status,
        "comments": period.comments,
        "rows": period.rows(),
    })))
}

#[derive(Debug, Deserialize)]
struct SummaryQuery {
    associate_id: Option<String>,
}

async fn summary(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<crate::summary::SummaryStats>, AppError> {
    let associate_id = query.associate_id.unwrap_or(actor.associate_id);
    let today = Local::now().date_naive();
    // Full-year window so YTD is accurate regardless of the page filters.
    let filter = EntryFilter {
        associate_id: Some(associate_id.clone()),
        start_date: NaiveDate::from_ymd_opt(today.year(), 1, 1),
        end_date: NaiveDate::from_ymd_opt(today.year(), 12, 31),
    };
    let entries = state.store.list_time_entries(&filter).await?;
    let allocations = state.store.list_allocations(Some(&associate_id)).await?;
    Ok(Json(summarize(&entries, &allocations, &associate_id, today)))
}

// --- Workflow endpoints ---

async fn save(
    State(state): State<AppState>,
    actor: Actor,
    Json(draft): Json<WeekDraft>,
) -> Result<Json<serde_json::Value>, AppError> {
    let now = Local::now().naive_local();
    let rows = workflow::save_week(state.store.as_ref(), &draft, &actor, now).await?;
    Ok(Json(json!({ "success": true, "rows": rows })))
}

async fn submit(
    State(state): State<AppState>,
    actor: Actor,
    Json(draft): Json<WeekDraft>,
) -> Result<Json<serde_json::Value>, AppError> {
    let now = Local::now().naive_local();
    let rows = workflow::submit_week(state.store.as_ref(), &draft, &actor, now).await?;
    Ok(Json(json!({ "success": true, "rows": rows })))
}

#[derive(Debug, Deserialize)]
struct ApproveRequest {
    associate_id: String,
    week_start: NaiveDate,
    comment: Option<String>,
}

async fn approve(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<ApproveRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let period = load_period(&state, &req.associate_id, req.week_start).await?;
    workflow::approve_period(
        state.store.as_ref(),
        &period,
        &actor,
        req.comment.as_deref(),
    )
    .await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
struct RejectRequest {
    associate_id: String,
    week_start: NaiveDate,
    reason: String,
}

async fn reject(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<RejectRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let period = load_period(&state, &req.associate_id, req.week_start).await?;
    workflow::reject_period(state.store.as_ref(), &period, &actor, &req.reason).await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
struct WithdrawRequest {
    associate_id: String,
    week_start: NaiveDate,
}

async fn withdraw(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<WithdrawRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let period = load_period(&state, &req.associate_id, req.week_start).await?;
    workflow::withdraw_period(state.store.as_ref(), &period, &actor).await?;
    Ok(Json(json!({ "success": true })))
}

/// Re-derive the one period a workflow action targets from the current rows.
async fn load_period(
    state: &AppState,
    associate_id: &str,
    start: NaiveDate,
) -> Result<Period, AppError> {
    let start = week_start(start);
    let filter = EntryFilter {
        associate_id: Some(associate_id.to_string()),
        start_date: Some(start),
        end_date: Some(start + Duration::days(6)),
    };
    let entries = state.store.list_time_entries(&filter).await?;
    let associates = state.store.list_associates().await?;
    let periods = derive_periods(&entries, &associates);
    find_period(&periods, associate_id, start).ok_or(AppError::PeriodNotFound)
}
