// libs/booking-wizard-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::Session;
use shared_models::error::AppError;

use crate::error::WizardError;
use crate::models::{
    GoToStepRequest, OpenWizardRequest, SelectBranchRequest, SelectDateRequest,
    SelectPatientRequest, SelectPaymentRequest, SelectSlotRequest, SetNotesRequest,
    DoctorListQuery,
};
use crate::services::{
    DoctorListingService, NotificationSink, TracingNotificationSink, WizardController,
    WizardSessionStore,
};

/// Shared state for the wizard routes: configuration, the live session
/// registry and the notification sink. Controllers themselves are cheap and
/// built per request.
#[derive(Clone)]
pub struct WizardState {
    pub config: Arc<AppConfig>,
    pub sessions: Arc<WizardSessionStore>,
    pub sink: Arc<dyn NotificationSink>,
}

impl WizardState {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self::with_sink(config, Arc::new(TracingNotificationSink))
    }

    /// State with a caller-provided sink; tests use this to observe wizard
    /// notifications.
    pub fn with_sink(config: Arc<AppConfig>, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            config,
            sessions: Arc::new(WizardSessionStore::new()),
            sink,
        }
    }

    fn controller(&self) -> WizardController {
        WizardController::new(&self.config, Arc::clone(&self.sessions), Arc::clone(&self.sink))
    }
}

#[axum::debug_handler]
pub async fn open_wizard(
    State(state): State<WizardState>,
    Extension(session): Extension<Session>,
    Json(request): Json<OpenWizardRequest>,
) -> Result<Json<Value>, AppError> {
    let snapshot = state
        .controller()
        .open(request.doctor_id, &session)
        .await
        .map_err(WizardError::into_app_error)?;

    Ok(Json(json!(snapshot)))
}

#[axum::debug_handler]
pub async fn get_wizard(
    State(state): State<WizardState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let snapshot = state
        .controller()
        .get(id, &session)
        .await
        .map_err(WizardError::into_app_error)?;

    Ok(Json(json!(snapshot)))
}

#[axum::debug_handler]
pub async fn next_step(
    State(state): State<WizardState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let snapshot = state
        .controller()
        .next(id, &session)
        .await
        .map_err(WizardError::into_app_error)?;

    Ok(Json(json!(snapshot)))
}

#[axum::debug_handler]
pub async fn previous_step(
    State(state): State<WizardState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let snapshot = state
        .controller()
        .previous(id, &session)
        .await
        .map_err(WizardError::into_app_error)?;

    Ok(Json(json!(snapshot)))
}

#[axum::debug_handler]
pub async fn go_to_wizard_step(
    State(state): State<WizardState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
    Json(request): Json<GoToStepRequest>,
) -> Result<Json<Value>, AppError> {
    let snapshot = state
        .controller()
        .go_to_step(id, request.target, &session)
        .await
        .map_err(WizardError::into_app_error)?;

    Ok(Json(json!(snapshot)))
}

#[axum::debug_handler]
pub async fn select_branch(
    State(state): State<WizardState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
    Json(request): Json<SelectBranchRequest>,
) -> Result<Json<Value>, AppError> {
    let snapshot = state
        .controller()
        .select_branch(id, request.branch_id, &session)
        .await
        .map_err(WizardError::into_app_error)?;

    Ok(Json(json!(snapshot)))
}

#[axum::debug_handler]
pub async fn select_visit_date(
    State(state): State<WizardState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
    Json(request): Json<SelectDateRequest>,
) -> Result<Json<Value>, AppError> {
    let snapshot = state
        .controller()
        .select_visit_date(id, request.date, &session)
        .await
        .map_err(WizardError::into_app_error)?;

    Ok(Json(json!(snapshot)))
}

#[axum::debug_handler]
pub async fn select_slot(
    State(state): State<WizardState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
    Json(request): Json<SelectSlotRequest>,
) -> Result<Json<Value>, AppError> {
    let snapshot = state
        .controller()
        .select_slot(id, request.slot_id, &session)
        .await
        .map_err(WizardError::into_app_error)?;

    Ok(Json(json!(snapshot)))
}

#[axum::debug_handler]
pub async fn select_patient(
    State(state): State<WizardState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
    Json(request): Json<SelectPatientRequest>,
) -> Result<Json<Value>, AppError> {
    let snapshot = state
        .controller()
        .select_family_member(id, request.family_member_id, &session)
        .await
        .map_err(WizardError::into_app_error)?;

    Ok(Json(json!(snapshot)))
}

#[axum::debug_handler]
pub async fn select_payment_method(
    State(state): State<WizardState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
    Json(request): Json<SelectPaymentRequest>,
) -> Result<Json<Value>, AppError> {
    let snapshot = state
        .controller()
        .select_payment_method(id, request.method, &session)
        .await
        .map_err(WizardError::into_app_error)?;

    Ok(Json(json!(snapshot)))
}

#[axum::debug_handler]
pub async fn set_notes(
    State(state): State<WizardState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
    Json(request): Json<SetNotesRequest>,
) -> Result<Json<Value>, AppError> {
    let snapshot = state
        .controller()
        .set_notes(id, request.notes, &session)
        .await
        .map_err(WizardError::into_app_error)?;

    Ok(Json(json!(snapshot)))
}

#[axum::debug_handler]
pub async fn refresh_family_members(
    State(state): State<WizardState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let snapshot = state
        .controller()
        .refresh_family_members(id, &session)
        .await
        .map_err(WizardError::into_app_error)?;

    Ok(Json(json!(snapshot)))
}

#[axum::debug_handler]
pub async fn submit_wizard(
    State(state): State<WizardState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let snapshot = state
        .controller()
        .submit(id, &session)
        .await
        .map_err(WizardError::into_app_error)?;

    Ok(Json(json!(snapshot)))
}

#[axum::debug_handler]
pub async fn reset_wizard(
    State(state): State<WizardState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let snapshot = state
        .controller()
        .reset(id, &session)
        .await
        .map_err(WizardError::into_app_error)?;

    Ok(Json(json!(snapshot)))
}

#[axum::debug_handler]
pub async fn close_wizard(
    State(state): State<WizardState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let snapshot = state
        .controller()
        .close(id, &session)
        .await
        .map_err(WizardError::into_app_error)?;

    Ok(Json(json!(snapshot)))
}

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<WizardState>,
    Extension(session): Extension<Session>,
    Query(query): Query<DoctorListQuery>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorListingService::new(&state.config);

    let page = service
        .page(&query, &session)
        .await
        .map_err(|e| AppError::ExternalService(e.to_string()))?;

    Ok(Json(json!(page)))
}
