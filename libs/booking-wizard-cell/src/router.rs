// libs/booking-wizard-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

/// Wizard session routes, all behind the bearer-auth middleware. Mounted
/// by the API under `/bookings/wizard`.
pub fn create_booking_wizard_router(state: WizardState) -> Router {
    let config = Arc::clone(&state.config);

    Router::new()
        .route("/", post(open_wizard))
        .route("/{id}", get(get_wizard))
        .route("/{id}", delete(close_wizard))
        .route("/{id}/next", post(next_step))
        .route("/{id}/previous", post(previous_step))
        .route("/{id}/step", post(go_to_wizard_step))
        .route("/{id}/branch", put(select_branch))
        .route("/{id}/date", put(select_visit_date))
        .route("/{id}/slot", put(select_slot))
        .route("/{id}/patient", put(select_patient))
        .route("/{id}/payment", put(select_payment_method))
        .route("/{id}/notes", put(set_notes))
        .route("/{id}/family/refresh", post(refresh_family_members))
        .route("/{id}/submit", post(submit_wizard))
        .route("/{id}/reset", post(reset_wizard))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}

/// Doctor directory routes backing the wizard's entry point. Mounted by
/// the API under `/doctors`.
pub fn create_doctor_directory_router(state: WizardState) -> Router {
    let config = Arc::clone(&state.config);

    Router::new()
        .route("/", get(list_doctors))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}
