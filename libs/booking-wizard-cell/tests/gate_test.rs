// libs/booking-wizard-cell/tests/gate_test.rs
use chrono::{Duration, Utc};
use uuid::Uuid;

use booking_wizard_cell::*;

fn doctor() -> DoctorProfile {
    DoctorProfile {
        id: Uuid::new_v4(),
        first_name: "Aoife".to_string(),
        last_name: "Byrne".to_string(),
        specialty: "General Practice".to_string(),
        avatar_url: None,
    }
}

fn branch() -> Branch {
    Branch {
        id: Uuid::new_v4(),
        name: "Dublin Clinic".to_string(),
        address: Some("1 Main Street".to_string()),
        is_virtual: false,
    }
}

fn slot(available_slots: u32, status: SlotStatus) -> Slot {
    let start = Utc::now() + Duration::hours(24);
    Slot {
        id: Uuid::new_v4(),
        doctor_id: None,
        branch_id: None,
        date: start.date_naive(),
        start_time: start,
        end_time: start + Duration::minutes(30),
        duration_minutes: 30,
        slot_type: SlotType::Consultation,
        status,
        available_slots,
    }
}

fn empty_draft() -> AppointmentDraft {
    AppointmentDraft::new(doctor(), Utc::now().date_naive())
}

fn full_draft() -> AppointmentDraft {
    let mut draft = empty_draft();
    draft.branch = Some(branch());
    draft.slot = Some(slot(3, SlotStatus::Open));
    draft.payment_method = Some(PaymentMethod::Card);
    draft
}

#[test]
fn test_step_order_and_saturation() {
    assert_eq!(WizardStep::FIRST, WizardStep::ClinicSelection);
    assert_eq!(WizardStep::LAST, WizardStep::Payment);

    assert_eq!(WizardStep::ClinicSelection.index(), 1);
    assert_eq!(WizardStep::Payment.index(), 5);
    assert_eq!(WizardStep::from_index(3), Some(WizardStep::PatientSelection));
    assert_eq!(WizardStep::from_index(6), None);

    assert_eq!(WizardStep::Review.next(), WizardStep::Payment);
    assert_eq!(WizardStep::Payment.next(), WizardStep::Payment); // saturates
    assert_eq!(WizardStep::DateTimeSelection.previous(), WizardStep::ClinicSelection);
    assert_eq!(WizardStep::ClinicSelection.previous(), WizardStep::ClinicSelection);
}

#[test]
fn test_gates_to_is_half_open() {
    // A jump validates every step from the current one up to, but not
    // including, the target.
    assert_eq!(
        WizardStep::ClinicSelection.gates_to(WizardStep::Review),
        vec![
            WizardStep::ClinicSelection,
            WizardStep::DateTimeSelection,
            WizardStep::PatientSelection,
        ]
    );

    assert!(WizardStep::Review.gates_to(WizardStep::ClinicSelection).is_empty());
    assert!(WizardStep::PatientSelection.gates_to(WizardStep::PatientSelection).is_empty());
}

#[test]
fn test_clinic_selection_gate_requires_branch() {
    let gate = ValidationGate::new();

    let violation = gate
        .check(WizardStep::ClinicSelection, &empty_draft())
        .unwrap_err();
    assert_eq!(violation.step, WizardStep::ClinicSelection);
    assert_eq!(violation.requirement, StepRequirement::BranchRequired);

    let mut draft = empty_draft();
    draft.branch = Some(branch());
    assert!(gate.check(WizardStep::ClinicSelection, &draft).is_ok());
}

#[test]
fn test_date_time_gate_requires_selectable_slot() {
    let gate = ValidationGate::new();
    let mut draft = empty_draft();
    draft.branch = Some(branch());

    let violation = gate
        .check(WizardStep::DateTimeSelection, &draft)
        .unwrap_err();
    assert_eq!(violation.requirement, StepRequirement::SlotRequired);

    draft.slot = Some(slot(0, SlotStatus::Open));
    let violation = gate
        .check(WizardStep::DateTimeSelection, &draft)
        .unwrap_err();
    assert_eq!(violation.requirement, StepRequirement::SlotUnavailable);

    draft.slot = Some(slot(2, SlotStatus::Cancelled));
    let violation = gate
        .check(WizardStep::DateTimeSelection, &draft)
        .unwrap_err();
    assert_eq!(violation.requirement, StepRequirement::SlotUnavailable);

    draft.slot = Some(slot(2, SlotStatus::Open));
    assert!(gate.check(WizardStep::DateTimeSelection, &draft).is_ok());
}

#[test]
fn test_patient_and_review_gates_always_pass() {
    let gate = ValidationGate::new();
    let draft = empty_draft();

    assert!(gate.check(WizardStep::PatientSelection, &draft).is_ok());
    assert!(gate.check(WizardStep::Review, &draft).is_ok());
}

#[test]
fn test_payment_gate_requires_method() {
    let gate = ValidationGate::new();
    let mut draft = empty_draft();

    let violation = gate.check(WizardStep::Payment, &draft).unwrap_err();
    assert_eq!(violation.requirement, StepRequirement::PaymentMethodRequired);

    draft.payment_method = Some(PaymentMethod::Insurance);
    assert!(gate.check(WizardStep::Payment, &draft).is_ok());
}

#[test]
fn test_first_violation_reports_earliest_unmet_gate() {
    let gate = ValidationGate::new();

    // An empty draft jumping to review fails at the very first gate, not
    // at the ones behind it.
    let violation = gate
        .first_violation(WizardStep::ClinicSelection, WizardStep::Review, &empty_draft())
        .unwrap();
    assert_eq!(violation.step, WizardStep::ClinicSelection);
    assert_eq!(violation.requirement, StepRequirement::BranchRequired);

    let mut draft = empty_draft();
    draft.branch = Some(branch());
    let violation = gate
        .first_violation(WizardStep::ClinicSelection, WizardStep::Review, &draft)
        .unwrap();
    assert_eq!(violation.step, WizardStep::DateTimeSelection);
    assert_eq!(violation.requirement, StepRequirement::SlotRequired);
}

#[test]
fn test_payment_gate_is_not_a_prerequisite_for_reaching_payment() {
    let gate = ValidationGate::new();
    let mut draft = full_draft();
    draft.payment_method = None;

    // The payment step is where the method gets picked, so the jump onto
    // it must not demand one.
    assert!(gate
        .first_violation(WizardStep::ClinicSelection, WizardStep::Payment, &draft)
        .is_none());
}

#[test]
fn test_backward_moves_are_never_blocked() {
    let gate = ValidationGate::new();

    assert!(gate
        .first_violation(WizardStep::Payment, WizardStep::ClinicSelection, &empty_draft())
        .is_none());
    assert!(gate
        .first_violation(WizardStep::Review, WizardStep::Review, &empty_draft())
        .is_none());
}

#[test]
fn test_first_violation_all_catches_degraded_draft() {
    let gate = ValidationGate::new();

    assert!(gate.first_violation_all(&full_draft()).is_none());

    // A slot that lost its capacity after selection must resurface at
    // submission even though navigation already passed it.
    let mut draft = full_draft();
    draft.slot = Some(slot(0, SlotStatus::Open));
    let violation = gate.first_violation_all(&draft).unwrap();
    assert_eq!(violation.step, WizardStep::DateTimeSelection);
    assert_eq!(violation.requirement, StepRequirement::SlotUnavailable);

    let mut draft = full_draft();
    draft.payment_method = None;
    let violation = gate.first_violation_all(&draft).unwrap();
    assert_eq!(violation.step, WizardStep::Payment);
    assert_eq!(violation.requirement, StepRequirement::PaymentMethodRequired);
}
