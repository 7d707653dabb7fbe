// libs/booking-wizard-cell/src/services/controller.rs
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use shared_clinic_api::ClinicApiClient;
use shared_config::AppConfig;
use shared_models::auth::Session;

use crate::error::WizardError;
use crate::models::{
    AppointmentDraft, PaymentMethod, WizardPhase, WizardSession, WizardSnapshot, WizardStep,
};
use crate::services::commit::BookingCommitClient;
use crate::services::gate::ValidationGate;
use crate::services::notify::{NotificationSink, WizardNotification};
use crate::services::resolver::DependentDataResolver;
use crate::services::sessions::WizardSessionStore;

/// Orchestrates one wizard operation end to end: session lookup and
/// ownership, phase and gate checks, draft mutation, dependent-data
/// resolution and the final commit.
///
/// All draft mutation happens under the session lock, and the lock is never
/// held across a network await; ordering discipline plus the resolver's
/// ticket counters are what keep racing responses out of newer state.
pub struct WizardController {
    gate: ValidationGate,
    resolver: DependentDataResolver,
    commit: BookingCommitClient,
    sessions: Arc<WizardSessionStore>,
    sink: Arc<dyn NotificationSink>,
}

impl WizardController {
    pub fn new(
        config: &AppConfig,
        sessions: Arc<WizardSessionStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let api = Arc::new(ClinicApiClient::new(config));
        Self {
            gate: ValidationGate::new(),
            resolver: DependentDataResolver::with_client(Arc::clone(&api), Arc::clone(&sink)),
            commit: BookingCommitClient::with_client(api),
            sessions,
            sink,
        }
    }

    /// Opens a wizard for one doctor: resolves the entry data, registers a
    /// session at the clinic-selection step and returns its first snapshot.
    /// A failed doctor fetch fails the open; no session is created.
    pub async fn open(&self, doctor_id: Uuid, auth: &Session) -> Result<WizardSnapshot, WizardError> {
        let session_id = Uuid::new_v4();
        let (doctor, data) = self
            .resolver
            .resolve_entry(session_id, doctor_id, auth)
            .await?;

        let draft = AppointmentDraft::new(doctor, Utc::now().date_naive());
        let session = WizardSession::new(session_id, auth.user_id(), draft, data);

        info!(
            "Opened wizard session {} for doctor {} (patient {})",
            session_id,
            doctor_id,
            auth.user_id()
        );

        let handle = self.sessions.insert(session).await;
        let session = handle.lock().await;
        Ok(session.snapshot())
    }

    /// Current snapshot without mutating anything.
    pub async fn get(&self, session_id: Uuid, auth: &Session) -> Result<WizardSnapshot, WizardError> {
        let handle = self.sessions.get(session_id, auth.user_id()).await?;
        let session = handle.lock().await;
        Ok(session.snapshot())
    }

    /// Moves the wizard to an arbitrary step. Backward jumps are always
    /// allowed; a forward jump must clear the gate of every step from the
    /// current one up to (not including) the target.
    pub async fn go_to_step(
        &self,
        session_id: Uuid,
        target: WizardStep,
        auth: &Session,
    ) -> Result<WizardSnapshot, WizardError> {
        let handle = self.sessions.get(session_id, auth.user_id()).await?;
        let mut session = handle.lock().await;
        session.ensure_open()?;
        self.move_to(&mut session, target)?;
        Ok(session.snapshot())
    }

    /// Advances one step; saturating no-op on the payment step.
    pub async fn next(&self, session_id: Uuid, auth: &Session) -> Result<WizardSnapshot, WizardError> {
        let handle = self.sessions.get(session_id, auth.user_id()).await?;
        let mut session = handle.lock().await;
        session.ensure_open()?;
        let target = session.step.next();
        self.move_to(&mut session, target)?;
        Ok(session.snapshot())
    }

    /// Steps back once; saturating no-op on the first step. Backward moves
    /// never consult gates.
    pub async fn previous(
        &self,
        session_id: Uuid,
        auth: &Session,
    ) -> Result<WizardSnapshot, WizardError> {
        let handle = self.sessions.get(session_id, auth.user_id()).await?;
        let mut session = handle.lock().await;
        session.ensure_open()?;
        let target = session.step.previous();
        self.move_to(&mut session, target)?;
        Ok(session.snapshot())
    }

    /// Selects a clinic branch and resolves the dependent data (fee link
    /// and slot list) for it.
    pub async fn select_branch(
        &self,
        session_id: Uuid,
        branch_id: Uuid,
        auth: &Session,
    ) -> Result<WizardSnapshot, WizardError> {
        let handle = self.sessions.get(session_id, auth.user_id()).await?;
        self.resolver
            .on_branch_selected(&handle, branch_id, auth)
            .await?;
        let session = handle.lock().await;
        Ok(session.snapshot())
    }

    /// Changes the visit date and refreshes the slot list for it.
    pub async fn select_visit_date(
        &self,
        session_id: Uuid,
        date: NaiveDate,
        auth: &Session,
    ) -> Result<WizardSnapshot, WizardError> {
        let handle = self.sessions.get(session_id, auth.user_id()).await?;
        self.resolver.on_date_changed(&handle, date, auth).await?;
        let session = handle.lock().await;
        Ok(session.snapshot())
    }

    /// Picks a slot out of the currently fetched list.
    pub async fn select_slot(
        &self,
        session_id: Uuid,
        slot_id: Uuid,
        auth: &Session,
    ) -> Result<WizardSnapshot, WizardError> {
        let handle = self.sessions.get(session_id, auth.user_id()).await?;
        let mut session = handle.lock().await;
        session.ensure_open()?;

        if session.draft.branch.is_none() {
            return Err(WizardError::BranchRequired);
        }

        let slot = session
            .data
            .slots
            .iter()
            .find(|s| s.id == slot_id)
            .cloned()
            .ok_or(WizardError::SlotNotFound)?;

        if !slot.is_selectable() {
            return Err(WizardError::SlotNotSelectable);
        }

        debug!("Wizard session {} selected slot {}", session.id, slot_id);
        session.draft.slot = Some(slot);
        session.touch();
        Ok(session.snapshot())
    }

    /// Chooses who the appointment is for. `None` selects the signed-in
    /// patient themselves; an id must name a fetched family member.
    pub async fn select_family_member(
        &self,
        session_id: Uuid,
        member_id: Option<Uuid>,
        auth: &Session,
    ) -> Result<WizardSnapshot, WizardError> {
        let handle = self.sessions.get(session_id, auth.user_id()).await?;
        let mut session = handle.lock().await;
        session.ensure_open()?;

        let member = match member_id {
            Some(id) => Some(
                session
                    .data
                    .family_members
                    .iter()
                    .find(|m| m.id == id)
                    .cloned()
                    .ok_or(WizardError::MemberNotFound)?,
            ),
            None => None,
        };

        session.draft.family_member = member;
        session.touch();
        Ok(session.snapshot())
    }

    pub async fn select_payment_method(
        &self,
        session_id: Uuid,
        method: PaymentMethod,
        auth: &Session,
    ) -> Result<WizardSnapshot, WizardError> {
        let handle = self.sessions.get(session_id, auth.user_id()).await?;
        let mut session = handle.lock().await;
        session.ensure_open()?;

        session.draft.payment_method = Some(method);
        session.touch();
        Ok(session.snapshot())
    }

    /// Stores free-form notes for the doctor; whitespace-only input clears
    /// them.
    pub async fn set_notes(
        &self,
        session_id: Uuid,
        notes: Option<String>,
        auth: &Session,
    ) -> Result<WizardSnapshot, WizardError> {
        let handle = self.sessions.get(session_id, auth.user_id()).await?;
        let mut session = handle.lock().await;
        session.ensure_open()?;

        session.draft.notes = notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        session.touch();
        Ok(session.snapshot())
    }

    /// Refetches the family roster (recovering the profile first if entry
    /// never loaded it).
    pub async fn refresh_family_members(
        &self,
        session_id: Uuid,
        auth: &Session,
    ) -> Result<WizardSnapshot, WizardError> {
        let handle = self.sessions.get(session_id, auth.user_id()).await?;
        self.resolver.refresh_family_members(&handle, auth).await?;
        let session = handle.lock().await;
        Ok(session.snapshot())
    }

    /// Submits the draft as one atomic booking.
    ///
    /// Every gate is re-checked first, since the draft may have degraded
    /// since the user last navigated; when all pass, the session lands on
    /// the payment step and the commit client is called with the lock
    /// released. Success commits the session, clears the draft and
    /// invalidates any fetch still in flight, so a stale cascade can never
    /// land in a committed session. Any failure leaves the session open on
    /// the payment step with the draft intact, so the same submission can
    /// be retried without re-navigation.
    pub async fn submit(&self, session_id: Uuid, auth: &Session) -> Result<WizardSnapshot, WizardError> {
        let handle = self.sessions.get(session_id, auth.user_id()).await?;

        let (draft, patient_id) = {
            let mut session = handle.lock().await;
            session.ensure_open()?;

            if let Some(violation) = self.gate.first_violation_all(&session.draft) {
                self.sink.notify(WizardNotification::StepBlocked {
                    session_id: session.id,
                    step: violation.step,
                    requirement: violation.requirement,
                });
                return Err(WizardError::StepBlocked {
                    step: violation.step,
                    requirement: violation.requirement,
                });
            }

            let patient_id = match &session.data.profile {
                Some(profile) => profile.id,
                None => return Err(WizardError::IncompleteDraft("patient_profile")),
            };

            session.step = WizardStep::LAST;
            (session.draft.clone(), patient_id)
        };

        match self.commit.submit(&draft, patient_id, auth).await {
            Ok(confirmation) => {
                let mut session = handle.lock().await;
                session.phase = WizardPhase::Committed;
                session.confirmation = Some(confirmation.clone());
                session.draft = session.draft.fresh(Utc::now().date_naive());
                // Cascades dispatched before the commit landed must not
                // write into the committed session.
                session.versions.invalidate_all();
                session.touch();

                info!(
                    "Wizard session {} committed as appointment {}",
                    session.id, confirmation.appointment_id
                );
                self.sink.notify(WizardNotification::BookingConfirmed {
                    session_id: session.id,
                    confirmation,
                });
                Ok(session.snapshot())
            }
            Err(err) => {
                let session = handle.lock().await;
                self.sink.notify(WizardNotification::CommitFailed {
                    session_id: session.id,
                    error: err.clone(),
                });
                Err(WizardError::Commit(err))
            }
        }
    }

    /// Starts the wizard over for the same doctor, from any phase or step.
    /// Cached reference data (branch directory, profile, family roster)
    /// survives; the slot list does not. In-flight fetches issued before
    /// the reset are invalidated and can never land afterwards.
    pub async fn reset(&self, session_id: Uuid, auth: &Session) -> Result<WizardSnapshot, WizardError> {
        let handle = self.sessions.get(session_id, auth.user_id()).await?;
        let mut session = handle.lock().await;

        session.draft = session.draft.fresh(Utc::now().date_naive());
        session.step = WizardStep::FIRST;
        session.phase = WizardPhase::InProgress;
        session.confirmation = None;
        session.data.slots = Vec::new();
        session.versions.invalidate_all();
        session.touch();

        info!("Wizard session {} reset", session.id);
        Ok(session.snapshot())
    }

    /// Tears the session down and returns its final snapshot. A session
    /// that never committed is recorded as abandoned.
    pub async fn close(&self, session_id: Uuid, auth: &Session) -> Result<WizardSnapshot, WizardError> {
        let handle = self.sessions.remove(session_id, auth.user_id()).await?;
        let mut session = handle.lock().await;

        if session.phase != WizardPhase::Committed {
            session.phase = WizardPhase::Abandoned;
        }
        session.versions.invalidate_all();
        session.touch();

        info!(
            "Closed wizard session {} ({})",
            session.id, session.phase
        );
        Ok(session.snapshot())
    }

    /// Shared forward/backward move with gate enforcement and the
    /// `StepBlocked` notification on refusal.
    fn move_to(&self, session: &mut WizardSession, target: WizardStep) -> Result<(), WizardError> {
        if let Some(violation) = self.gate.first_violation(session.step, target, &session.draft) {
            self.sink.notify(WizardNotification::StepBlocked {
                session_id: session.id,
                step: violation.step,
                requirement: violation.requirement,
            });
            return Err(WizardError::StepBlocked {
                step: violation.step,
                requirement: violation.requirement,
            });
        }

        if session.step != target {
            debug!(
                "Wizard session {} moving from {} to {}",
                session.id, session.step, target
            );
            session.step = target;
            session.touch();
        }
        Ok(())
    }
}
