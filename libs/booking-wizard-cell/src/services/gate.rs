// libs/booking-wizard-cell/src/services/gate.rs
use tracing::debug;

use crate::models::{AppointmentDraft, StepRequirement, WizardStep};

/// A gate that refused passage: which step failed and what it is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateViolation {
    pub step: WizardStep,
    pub requirement: StepRequirement,
}

/// Per-step completeness checks for forward navigation.
///
/// Each step owns one gate that inspects only the draft. Gates never touch
/// the network, so navigation decisions are instant and deterministic even
/// while dependent data is still loading.
pub struct ValidationGate;

impl ValidationGate {
    pub fn new() -> Self {
        ValidationGate
    }

    /// Checks a single step's gate against the draft.
    pub fn check(&self, step: WizardStep, draft: &AppointmentDraft) -> Result<(), GateViolation> {
        let requirement = match step {
            WizardStep::ClinicSelection => {
                if draft.branch.is_none() {
                    Some(StepRequirement::BranchRequired)
                } else {
                    None
                }
            }
            WizardStep::DateTimeSelection => match &draft.slot {
                None => Some(StepRequirement::SlotRequired),
                Some(slot) if !slot.is_selectable() => Some(StepRequirement::SlotUnavailable),
                Some(_) => None,
            },
            // Patient selection defaults to booking for oneself, and the
            // review step only displays the draft, so both always pass.
            WizardStep::PatientSelection | WizardStep::Review => None,
            WizardStep::Payment => {
                if draft.payment_method.is_none() {
                    Some(StepRequirement::PaymentMethodRequired)
                } else {
                    None
                }
            }
        };

        match requirement {
            Some(requirement) => {
                debug!("Gate for {} refused: {}", step, requirement);
                Err(GateViolation { step, requirement })
            }
            None => Ok(()),
        }
    }

    /// Checks every gate a jump from `from` to `to` must clear, in order,
    /// and reports the first that refuses. Backward and same-step moves
    /// clear no gates and always succeed.
    pub fn first_violation(
        &self,
        from: WizardStep,
        to: WizardStep,
        draft: &AppointmentDraft,
    ) -> Option<GateViolation> {
        from.gates_to(to)
            .into_iter()
            .find_map(|step| self.check(step, draft).err())
    }

    /// Checks the gate of every step in order, as submission must: the
    /// draft may have degraded since the user last navigated (a date change
    /// can drop the slot out from under the payment step).
    pub fn first_violation_all(&self, draft: &AppointmentDraft) -> Option<GateViolation> {
        WizardStep::ALL
            .iter()
            .find_map(|step| self.check(*step, draft).err())
    }
}

impl Default for ValidationGate {
    fn default() -> Self {
        Self::new()
    }
}
