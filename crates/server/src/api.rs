//! HTTP surface for the deal lifecycle and follow-up tracking engine.
//!
//! Handlers stay thin: parse, call the service, map the error layer. Every
//! response carries a correlation id so a support ticket can be matched to
//! the structured logs.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use funil_core::domain::deal::{Deal, DealId, DealStage};
use funil_core::domain::followup::{FollowupStage, FollowupStageId};
use funil_core::domain::tracking::TrackingRecord;
use funil_core::errors::{ApplicationError, DomainError, InterfaceError};
use funil_core::followup::sequence::{current_stage, records_by_stage};
use funil_core::followup::tracking::FollowupTrackingService;
use funil_core::monitor::SlaSnapshot;
use funil_core::pipeline::StageTransitionService;
use funil_core::sla::{self, SlaAssessment};
use funil_core::store::{DealStore, FollowupStageSource};
use funil_core::sweep::{StagnationSweeper, SweepReport};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::watch;
use uuid::Uuid;

use crate::notify::WebhookNotifier;

#[derive(Clone)]
pub struct ApiState {
    pub deals: Arc<dyn DealStore>,
    pub followup_stages: Arc<dyn FollowupStageSource>,
    pub transitions: Arc<StageTransitionService>,
    pub tracking: Arc<FollowupTrackingService>,
    pub sweeper: Arc<StagnationSweeper>,
    pub notifier: Option<Arc<WebhookNotifier>>,
    pub sla_report: watch::Receiver<SlaSnapshot>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/deals/{id}", get(get_deal))
        .route("/api/deals/{id}/stage", post(change_stage))
        .route("/api/deals/{id}/contact-attempts", post(record_contact_attempt))
        .route("/api/deals/{id}/loss", post(mark_lost))
        .route("/api/deals/{id}/reactivation", post(reactivate))
        .route("/api/deals/{id}/followups", get(list_followups))
        .route("/api/deals/{id}/followups/{stage_id}/sent", post(register_sent))
        .route("/api/deals/{id}/followups/{stage_id}/response", post(register_response))
        .route("/api/deals/{id}/followups/{stage_id}/checklist", post(toggle_checklist))
        .route("/api/deals/{id}/followups/{stage_id}/completion", post(complete_stage))
        .route("/api/deals/{id}/followups/{stage_id}/skip", post(skip_stage))
        .route("/api/deals/{id}/followups/{stage_id}/notifications", post(send_notification))
        .route("/api/sweep/runs", post(run_sweep))
        .route("/api/sla/report", get(sla_report))
        .with_state(state)
}

#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        Self(error.into_interface(Uuid::new_v4().to_string()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.0.user_message(),
            "detail": self.0.to_string(),
            "correlation_id": self.0.correlation_id(),
        }));
        (self.status(), body).into_response()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct DealView {
    pub deal: Deal,
    pub sla: SlaAssessment,
}

impl DealView {
    fn assess(deal: Deal) -> Self {
        let sla = sla::assess(&deal, Utc::now());
        Self { deal, sla }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct FollowupStageView {
    pub stage: FollowupStage,
    pub timing_display: String,
    pub tracking: Option<TrackingRecord>,
}

#[derive(Clone, Debug, Serialize)]
pub struct FollowupBoardView {
    pub current_stage_id: Option<FollowupStageId>,
    pub stages: Vec<FollowupStageView>,
}

#[derive(Debug, Deserialize)]
pub struct StageChangeRequest {
    pub stage: String,
    pub substage: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LossRequest {
    pub reason: String,
    pub details: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReactivationRequest {
    pub stage: String,
}

#[derive(Debug, Deserialize)]
pub struct ResponseRequest {
    pub responded: bool,
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChecklistRequest {
    pub action_index: u32,
    pub checked: bool,
}

#[derive(Debug, Deserialize)]
pub struct SkipRequest {
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationRequest {
    pub name: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct NotificationResponse {
    pub message: String,
}

fn parse_stage(raw: &str) -> Result<DealStage, ApiError> {
    DealStage::parse(raw).ok_or_else(|| {
        ApplicationError::from(DomainError::InvalidStageValue(raw.to_string())).into()
    })
}

async fn load_deal(state: &ApiState, id: &DealId) -> Result<Deal, ApiError> {
    state
        .deals
        .load(id)
        .await
        .map_err(ApplicationError::from)?
        .ok_or_else(|| ApplicationError::NotFound { entity: "deal", id: id.0.clone() }.into())
}

async fn find_followup_stage(
    state: &ApiState,
    deal: &Deal,
    stage_id: &FollowupStageId,
) -> Result<FollowupStage, ApiError> {
    let stages = state
        .followup_stages
        .list_for_campaign(&deal.campaign_id)
        .await
        .map_err(ApplicationError::from)?;
    stages.into_iter().find(|stage| stage.id == *stage_id).ok_or_else(|| {
        ApplicationError::NotFound { entity: "follow-up stage", id: stage_id.0.clone() }.into()
    })
}

pub async fn get_deal(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<DealView>, ApiError> {
    let deal = load_deal(&state, &DealId(id)).await?;
    Ok(Json(DealView::assess(deal)))
}

pub async fn change_stage(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(request): Json<StageChangeRequest>,
) -> Result<Json<DealView>, ApiError> {
    let stage = parse_stage(&request.stage)?;
    let deal = state.transitions.advance_stage(&DealId(id), stage, request.substage).await?;
    Ok(Json(DealView::assess(deal)))
}

pub async fn record_contact_attempt(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<DealView>, ApiError> {
    let deal = state.transitions.record_contact_attempt(&DealId(id)).await?;
    Ok(Json(DealView::assess(deal)))
}

pub async fn mark_lost(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(request): Json<LossRequest>,
) -> Result<Json<DealView>, ApiError> {
    let deal = state
        .transitions
        .mark_lost(&DealId(id), &request.reason, request.details.as_deref())
        .await?;
    Ok(Json(DealView::assess(deal)))
}

pub async fn reactivate(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(request): Json<ReactivationRequest>,
) -> Result<Json<DealView>, ApiError> {
    let stage = parse_stage(&request.stage)?;
    let deal = state.transitions.reactivate(&DealId(id), stage).await?;
    Ok(Json(DealView::assess(deal)))
}

pub async fn list_followups(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<FollowupBoardView>, ApiError> {
    let deal_id = DealId(id);
    let deal = load_deal(&state, &deal_id).await?;

    let stages = state
        .followup_stages
        .list_for_campaign(&deal.campaign_id)
        .await
        .map_err(ApplicationError::from)?;
    let records = records_by_stage(state.tracking.records_for_deal(&deal_id).await?);
    let current_stage_id = current_stage(&stages, &records).map(|stage| stage.id.clone());

    let stages = stages
        .into_iter()
        .map(|stage| {
            let tracking = records.get(&stage.id).cloned();
            let timing_display = stage.timing.describe();
            FollowupStageView { stage, timing_display, tracking }
        })
        .collect();

    Ok(Json(FollowupBoardView { current_stage_id, stages }))
}

pub async fn register_sent(
    State(state): State<ApiState>,
    Path((id, stage_id)): Path<(String, String)>,
) -> Result<Json<TrackingRecord>, ApiError> {
    let record =
        state.tracking.register_sent(&DealId(id), &FollowupStageId(stage_id)).await?;
    Ok(Json(record))
}

pub async fn register_response(
    State(state): State<ApiState>,
    Path((id, stage_id)): Path<(String, String)>,
    Json(request): Json<ResponseRequest>,
) -> Result<Json<TrackingRecord>, ApiError> {
    let record = state
        .tracking
        .register_response(
            &DealId(id),
            &FollowupStageId(stage_id),
            request.responded,
            request.content,
        )
        .await?;
    Ok(Json(record))
}

pub async fn toggle_checklist(
    State(state): State<ApiState>,
    Path((id, stage_id)): Path<(String, String)>,
    Json(request): Json<ChecklistRequest>,
) -> Result<Json<TrackingRecord>, ApiError> {
    let record = state
        .tracking
        .toggle_checklist_item(
            &DealId(id),
            &FollowupStageId(stage_id),
            request.action_index,
            request.checked,
        )
        .await?;
    Ok(Json(record))
}

pub async fn complete_stage(
    State(state): State<ApiState>,
    Path((id, stage_id)): Path<(String, String)>,
) -> Result<Json<TrackingRecord>, ApiError> {
    let deal_id = DealId(id);
    let deal = load_deal(&state, &deal_id).await?;
    let stage = find_followup_stage(&state, &deal, &FollowupStageId(stage_id)).await?;

    let record = state.tracking.complete_stage(&deal_id, &stage).await?;
    Ok(Json(record))
}

pub async fn skip_stage(
    State(state): State<ApiState>,
    Path((id, stage_id)): Path<(String, String)>,
    Json(request): Json<SkipRequest>,
) -> Result<Json<TrackingRecord>, ApiError> {
    let record = state
        .tracking
        .skip_stage(&DealId(id), &FollowupStageId(stage_id), &request.reason)
        .await?;
    Ok(Json(record))
}

pub async fn send_notification(
    State(state): State<ApiState>,
    Path((id, stage_id)): Path<(String, String)>,
    Json(request): Json<NotificationRequest>,
) -> Result<Json<NotificationResponse>, ApiError> {
    let notifier = state.notifier.as_ref().ok_or_else(|| {
        ApplicationError::Integration("notification webhook is not configured".to_string())
    })?;

    let deal_id = DealId(id);
    let deal = load_deal(&state, &deal_id).await?;
    let stage = find_followup_stage(&state, &deal, &FollowupStageId(stage_id)).await?;

    let message = notifier
        .send_followup(&deal, &stage, request.name.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(NotificationResponse { message }))
}

pub async fn run_sweep(State(state): State<ApiState>) -> Result<Json<SweepReport>, ApiError> {
    let report = state.sweeper.run(Utc::now()).await?;
    Ok(Json(report))
}

pub async fn sla_report(State(state): State<ApiState>) -> Json<SlaSnapshot> {
    Json(state.sla_report.borrow().clone())
}
