// libs/booking-wizard-cell/src/services/notify.rs
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::CommitError;
use crate::models::{BookingConfirmation, FetchCategory, StepRequirement, WizardStep};

/// Out-of-band events a wizard session emits while handling an operation.
///
/// These are side observations, never return values: an operation that
/// triggers one still produces its own response, and sinks must not
/// influence the session outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum WizardNotification {
    /// A dependent-data fetch failed; the affected list was left empty.
    FetchFailed {
        session_id: Uuid,
        category: FetchCategory,
        detail: String,
    },
    /// Forward navigation was refused because a step's gate is unsatisfied.
    StepBlocked {
        session_id: Uuid,
        step: WizardStep,
        requirement: StepRequirement,
    },
    /// A booking submission failed; the session stays open for recovery.
    CommitFailed {
        session_id: Uuid,
        error: CommitError,
    },
    /// The clinic accepted the booking and the session is committed.
    BookingConfirmed {
        session_id: Uuid,
        confirmation: BookingConfirmation,
    },
}

/// Receiver for wizard session events. The API wires in the tracing-backed
/// sink; tests substitute their own to assert on emitted events.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: WizardNotification);
}

/// Default sink: folds wizard events into the service's structured logs.
pub struct TracingNotificationSink;

impl NotificationSink for TracingNotificationSink {
    fn notify(&self, event: WizardNotification) {
        match event {
            WizardNotification::FetchFailed {
                session_id,
                category,
                detail,
            } => {
                warn!(
                    "Fetch of {} failed for wizard session {}: {}",
                    category, session_id, detail
                );
            }
            WizardNotification::StepBlocked {
                session_id,
                step,
                requirement,
            } => {
                info!(
                    "Navigation to {} blocked for wizard session {}: {}",
                    step, session_id, requirement
                );
            }
            WizardNotification::CommitFailed { session_id, error } => {
                if error.is_retryable() {
                    warn!(
                        "Commit failed for wizard session {} (retryable): {}",
                        session_id, error
                    );
                } else {
                    error!("Commit failed for wizard session {}: {}", session_id, error);
                }
            }
            WizardNotification::BookingConfirmed {
                session_id,
                confirmation,
            } => {
                info!(
                    "Booking confirmed for wizard session {}: appointment {} is {}",
                    session_id, confirmation.appointment_id, confirmation.status
                );
            }
        }
    }
}
