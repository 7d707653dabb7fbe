// libs/booking-wizard-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::WizardError;

// ==============================================================================
// WIZARD STEP MACHINE
// ==============================================================================

/// Ordered steps of the booking flow. Variant order is the step order;
/// comparisons rely on it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    ClinicSelection,
    DateTimeSelection,
    PatientSelection,
    Review,
    Payment,
}

impl WizardStep {
    pub const FIRST: WizardStep = WizardStep::ClinicSelection;
    pub const LAST: WizardStep = WizardStep::Payment;

    pub const ALL: [WizardStep; 5] = [
        WizardStep::ClinicSelection,
        WizardStep::DateTimeSelection,
        WizardStep::PatientSelection,
        WizardStep::Review,
        WizardStep::Payment,
    ];

    /// One-based step number as shown in the step indicator.
    pub fn index(&self) -> u8 {
        match self {
            WizardStep::ClinicSelection => 1,
            WizardStep::DateTimeSelection => 2,
            WizardStep::PatientSelection => 3,
            WizardStep::Review => 4,
            WizardStep::Payment => 5,
        }
    }

    pub fn from_index(index: u8) -> Option<WizardStep> {
        match index {
            1 => Some(WizardStep::ClinicSelection),
            2 => Some(WizardStep::DateTimeSelection),
            3 => Some(WizardStep::PatientSelection),
            4 => Some(WizardStep::Review),
            5 => Some(WizardStep::Payment),
            _ => None,
        }
    }

    /// Following step; saturates at Payment.
    pub fn next(&self) -> WizardStep {
        WizardStep::from_index(self.index() + 1).unwrap_or(WizardStep::LAST)
    }

    /// Preceding step; saturates at ClinicSelection.
    pub fn previous(&self) -> WizardStep {
        WizardStep::from_index(self.index().saturating_sub(1)).unwrap_or(WizardStep::FIRST)
    }

    /// Steps whose gates guard a forward jump from `self` to `target`:
    /// the half-open range [self, target). Next-button advances and
    /// step-indicator jumps both validate through here.
    pub fn gates_to(&self, target: WizardStep) -> Vec<WizardStep> {
        (self.index()..target.index())
            .filter_map(WizardStep::from_index)
            .collect()
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WizardStep::ClinicSelection => write!(f, "clinic_selection"),
            WizardStep::DateTimeSelection => write!(f, "date_time_selection"),
            WizardStep::PatientSelection => write!(f, "patient_selection"),
            WizardStep::Review => write!(f, "review"),
            WizardStep::Payment => write!(f, "payment"),
        }
    }
}

/// Overall lifecycle of one wizard instance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WizardPhase {
    InProgress,
    Committed,
    Abandoned,
}

impl WizardPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WizardPhase::Committed | WizardPhase::Abandoned)
    }
}

impl fmt::Display for WizardPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WizardPhase::InProgress => write!(f, "in_progress"),
            WizardPhase::Committed => write!(f, "committed"),
            WizardPhase::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// The specific thing a step is missing. Gate failures carry one of these so
/// the caller can render an actionable message instead of a blanket
/// "invalid" state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepRequirement {
    BranchRequired,
    SlotRequired,
    SlotUnavailable,
    PaymentMethodRequired,
}

impl fmt::Display for StepRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepRequirement::BranchRequired => write!(f, "a clinic must be selected"),
            StepRequirement::SlotRequired => write!(f, "a time slot must be selected"),
            StepRequirement::SlotUnavailable => {
                write!(f, "the selected slot has no remaining capacity")
            }
            StepRequirement::PaymentMethodRequired => {
                write!(f, "a payment method must be selected")
            }
        }
    }
}

/// Dependent-data fetches the resolver tracks, one request-version counter
/// per category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FetchCategory {
    BranchDirectory,
    ClinicLink,
    SlotList,
    FamilyMembers,
    PatientProfile,
}

impl fmt::Display for FetchCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchCategory::BranchDirectory => write!(f, "branch_directory"),
            FetchCategory::ClinicLink => write!(f, "clinic_link"),
            FetchCategory::SlotList => write!(f, "slot_list"),
            FetchCategory::FamilyMembers => write!(f, "family_members"),
            FetchCategory::PatientProfile => write!(f, "patient_profile"),
        }
    }
}

// ==============================================================================
// REFERENCE DATA
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoctorProfile {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub specialty: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl DoctorProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Wire shape of `GET /api/v1/doctors/{id}`: the profile with its branch
/// directory embedded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorWithBranches {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub specialty: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub branches: Vec<Branch>,
}

impl DoctorWithBranches {
    pub fn into_parts(self) -> (DoctorProfile, Vec<Branch>) {
        let profile = DoctorProfile {
            id: self.id,
            first_name: self.first_name,
            last_name: self.last_name,
            specialty: self.specialty,
            avatar_url: self.avatar_url,
        };
        (profile, self.branches)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Branch {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub is_virtual: bool,
}

/// Link record between a doctor and one of their branches; carries the
/// pricing shown on the review and payment steps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoctorClinic {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub branch_id: Uuid,
    pub consultation_fee: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Slot {
    pub id: Uuid,
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
    #[serde(default)]
    pub branch_id: Option<Uuid>,
    pub date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub slot_type: SlotType,
    pub status: SlotStatus,
    pub available_slots: u32,
}

impl Slot {
    /// A slot can be chosen only while it has remaining capacity and is not
    /// in a terminal status.
    pub fn is_selectable(&self) -> bool {
        self.available_slots > 0 && !self.status.is_terminal()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Open,
    Held,
    Closed,
    Cancelled,
}

impl SlotStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SlotStatus::Closed | SlotStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SlotType {
    Consultation,
    FollowUp,
    Procedure,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientProfile {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl PatientProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FamilyMember {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub relationship: Relationship,
}

impl FamilyMember {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    Spouse,
    Child,
    Parent,
    Sibling,
    Other,
}

// ==============================================================================
// APPOINTMENT DRAFT
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Cash,
    Insurance,
}

/// The single mutable accumulator for one wizard instance. The doctor is
/// fixed at entry; every other field is filled step by step and enforced
/// through the validation gate, never through ad hoc truthiness checks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentDraft {
    pub doctor: DoctorProfile,
    pub branch: Option<Branch>,
    pub doctor_clinic: Option<DoctorClinic>,
    pub visit_date: NaiveDate,
    pub slot: Option<Slot>,
    /// None means the booking is for the signed-in patient themselves.
    pub family_member: Option<FamilyMember>,
    pub payment_method: Option<PaymentMethod>,
    pub notes: Option<String>,
}

impl AppointmentDraft {
    pub fn new(doctor: DoctorProfile, visit_date: NaiveDate) -> Self {
        Self {
            doctor,
            branch: None,
            doctor_clinic: None,
            visit_date,
            slot: None,
            family_member: None,
            payment_method: None,
            notes: None,
        }
    }

    /// Empty draft for the same doctor, as produced by a reset.
    pub fn fresh(&self, visit_date: NaiveDate) -> Self {
        Self::new(self.doctor.clone(), visit_date)
    }
}

// ==============================================================================
// RESOLVED DATA AND SNAPSHOT
// ==============================================================================

/// Remote collections resolved for the wizard's lifetime. The branch
/// directory, profile and family list are reference data; the slot list is
/// scoped to the current (branch, date) pair.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolvedData {
    pub branches: Vec<Branch>,
    pub slots: Vec<Slot>,
    pub family_members: Vec<FamilyMember>,
    pub profile: Option<PatientProfile>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct LoadingFlags {
    pub branch_directory: bool,
    pub clinic_link: bool,
    pub slot_list: bool,
    pub family_members: bool,
    pub patient_profile: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingConfirmation {
    pub appointment_id: Uuid,
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
        }
    }
}

/// Ready-to-render summary for the review and payment steps; present once
/// branch and slot are chosen.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReviewSummary {
    pub doctor_name: String,
    pub specialty: String,
    pub branch_name: String,
    pub visit_date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub patient_name: Option<String>,
    pub consultation_fee: Option<f64>,
    pub currency: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub notes: Option<String>,
}

impl ReviewSummary {
    /// View-model adapter over the draft; None until branch and slot exist.
    pub fn from_draft(draft: &AppointmentDraft, profile: Option<&PatientProfile>) -> Option<Self> {
        let branch = draft.branch.as_ref()?;
        let slot = draft.slot.as_ref()?;

        let patient_name = match &draft.family_member {
            Some(member) => Some(member.full_name()),
            None => profile.map(|p| p.full_name()),
        };

        Some(Self {
            doctor_name: draft.doctor.full_name(),
            specialty: draft.doctor.specialty.clone(),
            branch_name: branch.name.clone(),
            visit_date: draft.visit_date,
            start_time: slot.start_time,
            end_time: slot.end_time,
            patient_name,
            consultation_fee: draft.doctor_clinic.as_ref().map(|c| c.consultation_fee),
            currency: draft.doctor_clinic.as_ref().map(|c| c.currency.clone()),
            payment_method: draft.payment_method,
            notes: draft.notes.clone(),
        })
    }
}

/// Serializable view of the whole wizard returned by every operation.
#[derive(Debug, Clone, Serialize)]
pub struct WizardSnapshot {
    pub session_id: Uuid,
    pub step: WizardStep,
    pub phase: WizardPhase,
    pub draft: AppointmentDraft,
    pub branches: Vec<Branch>,
    pub slots: Vec<Slot>,
    pub family_members: Vec<FamilyMember>,
    pub profile: Option<PatientProfile>,
    pub review: Option<ReviewSummary>,
    pub loading: LoadingFlags,
    pub confirmation: Option<BookingConfirmation>,
}

// ==============================================================================
// REQUEST VERSIONING
// ==============================================================================

/// Monotonic request counter for one fetch category.
///
/// `issue` stamps a new outbound request; `try_apply` accepts a response
/// only when it carries the newest stamp. Counters only ever move forward,
/// so a response issued before an invalidation can never land after it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionCounter {
    issued: u64,
    applied: u64,
}

impl VersionCounter {
    /// Stamps the next outbound request; the category reads as loading
    /// until that request settles.
    pub fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// Settles a response. Returns true and records it only when it is the
    /// newest issued; stale responses leave both counters untouched.
    pub fn try_apply(&mut self, version: u64) -> bool {
        if version == self.issued {
            self.applied = version;
            true
        } else {
            false
        }
    }

    /// Invalidates any in-flight request without dispatching a new one.
    pub fn invalidate(&mut self) {
        self.issued += 1;
        self.applied = self.issued;
    }

    pub fn is_loading(&self) -> bool {
        self.issued > self.applied
    }

    pub fn issued(&self) -> u64 {
        self.issued
    }

    pub fn applied(&self) -> u64 {
        self.applied
    }
}

/// Claim check for one dispatched fetch: the category it belongs to and the
/// version stamped when it was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub category: FetchCategory,
    pub version: u64,
}

/// One version counter per fetch category of a wizard session.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchVersions {
    pub branch_directory: VersionCounter,
    pub clinic_link: VersionCounter,
    pub slot_list: VersionCounter,
    pub family_members: VersionCounter,
    pub patient_profile: VersionCounter,
}

impl FetchVersions {
    fn counter_mut(&mut self, category: FetchCategory) -> &mut VersionCounter {
        match category {
            FetchCategory::BranchDirectory => &mut self.branch_directory,
            FetchCategory::ClinicLink => &mut self.clinic_link,
            FetchCategory::SlotList => &mut self.slot_list,
            FetchCategory::FamilyMembers => &mut self.family_members,
            FetchCategory::PatientProfile => &mut self.patient_profile,
        }
    }

    pub fn counter(&self, category: FetchCategory) -> VersionCounter {
        match category {
            FetchCategory::BranchDirectory => self.branch_directory,
            FetchCategory::ClinicLink => self.clinic_link,
            FetchCategory::SlotList => self.slot_list,
            FetchCategory::FamilyMembers => self.family_members,
            FetchCategory::PatientProfile => self.patient_profile,
        }
    }

    /// Stamps a new outbound fetch for the category.
    pub fn issue(&mut self, category: FetchCategory) -> FetchTicket {
        FetchTicket {
            category,
            version: self.counter_mut(category).issue(),
        }
    }

    /// Settles a fetch; true only when its ticket is still the newest for
    /// its category.
    pub fn try_apply(&mut self, ticket: &FetchTicket) -> bool {
        self.counter_mut(ticket.category).try_apply(ticket.version)
    }

    /// Invalidates every category at once, so responses issued before this
    /// point can never land after it.
    pub fn invalidate_all(&mut self) {
        self.branch_directory.invalidate();
        self.clinic_link.invalidate();
        self.slot_list.invalidate();
        self.family_members.invalidate();
        self.patient_profile.invalidate();
    }

    pub fn loading_flags(&self) -> LoadingFlags {
        LoadingFlags {
            branch_directory: self.branch_directory.is_loading(),
            clinic_link: self.clinic_link.is_loading(),
            slot_list: self.slot_list.is_loading(),
            family_members: self.family_members.is_loading(),
            patient_profile: self.patient_profile.is_loading(),
        }
    }
}

// ==============================================================================
// WIZARD SESSION
// ==============================================================================

/// One patient's wizard in progress: current step and phase, the draft,
/// resolved remote data and the per-category fetch counters. The session
/// store guards each instance behind a single async lock.
#[derive(Debug)]
pub struct WizardSession {
    pub id: Uuid,
    /// User id of the patient who opened the wizard; nobody else can see
    /// or touch the session.
    pub owner: String,
    pub step: WizardStep,
    pub phase: WizardPhase,
    pub draft: AppointmentDraft,
    pub data: ResolvedData,
    pub versions: FetchVersions,
    pub confirmation: Option<BookingConfirmation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WizardSession {
    pub fn new(
        id: Uuid,
        owner: impl Into<String>,
        draft: AppointmentDraft,
        data: ResolvedData,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            owner: owner.into(),
            step: WizardStep::FIRST,
            phase: WizardPhase::InProgress,
            draft,
            data,
            versions: FetchVersions::default(),
            confirmation: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Guard for mutating operations; committed and abandoned sessions are
    /// read-only.
    pub fn ensure_open(&self) -> Result<(), WizardError> {
        if self.phase.is_terminal() {
            return Err(WizardError::SessionClosed(self.phase));
        }
        Ok(())
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Serializable view of the whole session as returned by every wizard
    /// operation.
    pub fn snapshot(&self) -> WizardSnapshot {
        WizardSnapshot {
            session_id: self.id,
            step: self.step,
            phase: self.phase,
            draft: self.draft.clone(),
            branches: self.data.branches.clone(),
            slots: self.data.slots.clone(),
            family_members: self.data.family_members.clone(),
            profile: self.data.profile.clone(),
            review: ReviewSummary::from_draft(&self.draft, self.data.profile.as_ref()),
            loading: self.versions.loading_flags(),
            confirmation: self.confirmation.clone(),
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenWizardRequest {
    pub doctor_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoToStepRequest {
    pub target: WizardStep,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectBranchRequest {
    pub branch_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectDateRequest {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectSlotRequest {
    pub slot_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectPatientRequest {
    /// Absent or null books for the signed-in patient themselves.
    #[serde(default)]
    pub family_member_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectPaymentRequest {
    pub method: PaymentMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetNotesRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

// ==============================================================================
// DOCTOR DIRECTORY LISTING
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoctorSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub specialty: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl DoctorSummary {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorPage {
    pub items: Vec<DoctorSummary>,
    pub page: u32,
    pub has_more: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoctorListQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
}
