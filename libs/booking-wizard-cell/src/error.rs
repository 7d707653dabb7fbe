// libs/booking-wizard-cell/src/error.rs
use shared_models::error::AppError;
use thiserror::Error;

use crate::models::{FetchCategory, StepRequirement, WizardPhase, WizardStep};

/// Outcome of a booking submission that did not produce a confirmation.
///
/// The commit client folds every upstream response into one of these three
/// cases so callers can decide recovery without inspecting HTTP details:
/// `SlotUnavailable` means another patient took the slot and a different
/// one must be picked, `ValidationRejected` carries the clinic's reason
/// verbatim, and `Transport` leaves the unchanged draft worth resubmitting.
/// None of them moves the wizard; the draft survives every failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommitError {
    #[error("slot is no longer available")]
    SlotUnavailable,

    #[error("booking rejected by the clinic: {0}")]
    ValidationRejected(String),

    #[error("transport failure during booking commit: {0}")]
    Transport(String),
}

impl CommitError {
    /// Transport failures are the only commit errors where resubmitting the
    /// unchanged draft can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CommitError::Transport(_))
    }
}

/// Errors surfaced by wizard session operations.
#[derive(Error, Debug)]
pub enum WizardError {
    #[error("wizard session not found")]
    SessionNotFound,

    #[error("wizard session is {0} and no longer accepts changes")]
    SessionClosed(WizardPhase),

    #[error("cannot reach {step}: {requirement}")]
    StepBlocked {
        step: WizardStep,
        requirement: StepRequirement,
    },

    #[error("branch is not offered by this doctor")]
    BranchNotFound,

    #[error("slot is not present in the current availability list")]
    SlotNotFound,

    #[error("slot has no remaining capacity")]
    SlotNotSelectable,

    #[error("family member not found on this patient profile")]
    MemberNotFound,

    #[error("a clinic branch must be selected before choosing a slot")]
    BranchRequired,

    #[error("draft is missing required field: {0}")]
    IncompleteDraft(&'static str),

    #[error("failed to load {category}: {detail}")]
    Fetch {
        category: FetchCategory,
        detail: String,
    },

    #[error(transparent)]
    Commit(#[from] CommitError),
}

impl WizardError {
    /// Wraps an upstream failure with the fetch category it interrupted.
    pub fn fetch(category: FetchCategory, detail: impl ToString) -> Self {
        WizardError::Fetch {
            category,
            detail: detail.to_string(),
        }
    }

    /// Maps a wizard failure onto the shared HTTP error surface. Selection
    /// of an id that is not in the fetched lists is a client mistake (400),
    /// gate and draft violations are 422s, capacity conflicts are 409s, and
    /// upstream fetch or transport trouble is a 502.
    pub fn into_app_error(self) -> AppError {
        match self {
            WizardError::SessionNotFound => AppError::NotFound(self.to_string()),
            WizardError::SessionClosed(_) => AppError::Conflict(self.to_string()),
            WizardError::StepBlocked { .. } => AppError::Validation(self.to_string()),
            WizardError::BranchNotFound
            | WizardError::SlotNotFound
            | WizardError::MemberNotFound => AppError::BadRequest(self.to_string()),
            WizardError::SlotNotSelectable => AppError::Conflict(self.to_string()),
            WizardError::BranchRequired | WizardError::IncompleteDraft(_) => {
                AppError::Validation(self.to_string())
            }
            WizardError::Fetch { .. } => AppError::ExternalService(self.to_string()),
            WizardError::Commit(CommitError::SlotUnavailable) => {
                AppError::Conflict(CommitError::SlotUnavailable.to_string())
            }
            WizardError::Commit(CommitError::ValidationRejected(reason)) => {
                AppError::Validation(reason)
            }
            WizardError::Commit(err @ CommitError::Transport(_)) => {
                AppError::ExternalService(err.to_string())
            }
        }
    }
}
