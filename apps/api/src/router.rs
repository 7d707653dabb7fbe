use axum::{
    Router,
    extract::State,
    routing::get,
    Json,
};
use serde_json::{json, Value};

use booking_wizard_cell::{
    create_booking_wizard_router, create_doctor_directory_router, WizardState,
};

pub fn create_router(state: WizardState) -> Router {
    Router::new()
        .route("/", get(banner))
        .with_state(state.clone())
        .nest("/bookings/wizard", create_booking_wizard_router(state.clone()))
        .nest("/doctors", create_doctor_directory_router(state))
}

/// Liveness banner with the number of wizards currently in flight.
async fn banner(State(state): State<WizardState>) -> Json<Value> {
    Json(json!({
        "service": "booking-wizard-api",
        "status": "running",
        "live_sessions": state.sessions.live_count().await,
    }))
}
