// libs/booking-wizard-cell/src/services/resolver.rs
use std::sync::Arc;

use chrono::NaiveDate;
use futures::join;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use shared_clinic_api::ClinicApiClient;
use shared_config::AppConfig;
use shared_models::auth::Session;

use crate::error::WizardError;
use crate::models::{DoctorProfile, FetchCategory, FetchTicket, ResolvedData, WizardSession};
use crate::services::directory::ClinicDirectoryClient;
use crate::services::notify::{NotificationSink, WizardNotification};
use crate::services::relations::PatientRelationsClient;
use crate::services::slots::SlotAvailabilityClient;

/// Keeps remote data consistent with the draft as selections change.
///
/// Every fetch follows the same discipline: stamp a ticket and mutate the
/// draft under one lock acquisition, release the lock across the network
/// await, then re-lock and settle the ticket. A response whose ticket is no
/// longer the newest for its category is discarded wholesale, which makes
/// rapid reselection safe without cancelling requests in flight.
pub struct DependentDataResolver {
    directory: ClinicDirectoryClient,
    slots: SlotAvailabilityClient,
    relations: PatientRelationsClient,
    sink: Arc<dyn NotificationSink>,
}

impl DependentDataResolver {
    pub fn new(config: &AppConfig, sink: Arc<dyn NotificationSink>) -> Self {
        Self::with_client(Arc::new(ClinicApiClient::new(config)), sink)
    }

    pub fn with_client(api: Arc<ClinicApiClient>, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            directory: ClinicDirectoryClient::with_client(Arc::clone(&api)),
            slots: SlotAvailabilityClient::with_client(Arc::clone(&api)),
            relations: PatientRelationsClient::with_client(api),
            sink,
        }
    }

    /// Entry fetches for a wizard that is about to open: the doctor with
    /// their branch directory, the patient's own profile, and the family
    /// roster once the profile is known.
    ///
    /// Only the doctor fetch is fatal, since a wizard cannot exist without
    /// its doctor. Profile or family failures leave those parts empty and
    /// emit a `FetchFailed` notification; `refresh_family_members` can
    /// repair them later.
    pub async fn resolve_entry(
        &self,
        session_id: Uuid,
        doctor_id: Uuid,
        auth: &Session,
    ) -> Result<(DoctorProfile, ResolvedData), WizardError> {
        let (doctor_res, profile_res) = join!(
            self.directory.get_doctor(doctor_id, auth),
            self.relations.get_my_profile(auth),
        );

        let (doctor, branches) = doctor_res?.into_parts();

        let profile = match profile_res {
            Ok(profile) => Some(profile),
            Err(err) => {
                self.notify_fetch_failed(session_id, FetchCategory::PatientProfile, &err);
                None
            }
        };

        let family_members = match &profile {
            Some(profile) => match self.relations.list_family_members(profile.id, auth).await {
                Ok(members) => members,
                Err(err) => {
                    self.notify_fetch_failed(session_id, FetchCategory::FamilyMembers, &err);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        info!(
            "Resolved entry data for wizard session {}: {} branches, {} family members",
            session_id,
            branches.len(),
            family_members.len()
        );

        Ok((
            doctor,
            ResolvedData {
                branches,
                slots: Vec::new(),
                family_members,
                profile,
            },
        ))
    }

    /// Applies a branch selection and its cascade: the slot selection and
    /// fee link are cleared immediately, then the doctor/branch link and
    /// the slot list for the current date are fetched concurrently.
    pub async fn on_branch_selected(
        &self,
        handle: &Arc<Mutex<WizardSession>>,
        branch_id: Uuid,
        auth: &Session,
    ) -> Result<(), WizardError> {
        let (doctor_id, date, link_ticket, slot_ticket) = {
            let mut session = handle.lock().await;
            session.ensure_open()?;

            let branch = session
                .data
                .branches
                .iter()
                .find(|b| b.id == branch_id)
                .cloned()
                .ok_or(WizardError::BranchNotFound)?;

            debug!("Wizard session {} selected branch {}", session.id, branch_id);

            session.draft.branch = Some(branch);
            session.draft.doctor_clinic = None;
            session.draft.slot = None;
            session.touch();

            (
                session.draft.doctor.id,
                session.draft.visit_date,
                session.versions.issue(FetchCategory::ClinicLink),
                session.versions.issue(FetchCategory::SlotList),
            )
        };

        let (link_res, slots_res) = join!(
            self.directory.get_clinic_link(doctor_id, branch_id, auth),
            self.slots.list_slots(doctor_id, branch_id, date, auth),
        );

        let mut session = handle.lock().await;

        match link_res {
            Ok(link) => {
                if settle(&mut session, &link_ticket) {
                    session.draft.doctor_clinic = Some(link);
                }
            }
            Err(err) => {
                if settle(&mut session, &link_ticket) {
                    session.draft.doctor_clinic = None;
                    self.notify_fetch_failed(session.id, FetchCategory::ClinicLink, &err);
                }
            }
        }

        match slots_res {
            Ok(list) => {
                if settle(&mut session, &slot_ticket) {
                    session.data.slots = list;
                }
            }
            Err(err) => {
                if settle(&mut session, &slot_ticket) {
                    session.data.slots = Vec::new();
                    self.notify_fetch_failed(session.id, FetchCategory::SlotList, &err);
                }
            }
        }

        session.touch();
        Ok(())
    }

    /// Applies a visit-date change. With a branch selected the slot list is
    /// refetched for the new date; the selected slot survives only when the
    /// new list still contains a slot with the same id, and then as the
    /// refreshed instance.
    pub async fn on_date_changed(
        &self,
        handle: &Arc<Mutex<WizardSession>>,
        date: NaiveDate,
        auth: &Session,
    ) -> Result<(), WizardError> {
        let fetch = {
            let mut session = handle.lock().await;
            session.ensure_open()?;

            session.draft.visit_date = date;
            session.touch();

            match &session.draft.branch {
                Some(branch) => Some((
                    session.draft.doctor.id,
                    branch.id,
                    session.versions.issue(FetchCategory::SlotList),
                )),
                // Without a branch there is no slot list to maintain.
                None => None,
            }
        };

        let (doctor_id, branch_id, ticket) = match fetch {
            Some(parts) => parts,
            None => return Ok(()),
        };

        let result = self.slots.list_slots(doctor_id, branch_id, date, auth).await;

        let mut session = handle.lock().await;
        match result {
            Ok(list) => {
                if settle(&mut session, &ticket) {
                    let retained = session.draft.slot.as_ref().and_then(|selected| {
                        list.iter().find(|slot| slot.id == selected.id).cloned()
                    });
                    session.data.slots = list;
                    session.draft.slot = retained;
                }
            }
            Err(err) => {
                if settle(&mut session, &ticket) {
                    session.data.slots = Vec::new();
                    session.draft.slot = None;
                    self.notify_fetch_failed(session.id, FetchCategory::SlotList, &err);
                }
            }
        }

        session.touch();
        Ok(())
    }

    /// Refetches the family roster, first recovering the patient profile
    /// when the entry fetch for it failed. The selected family member
    /// survives only while the refreshed roster still contains a member
    /// with the same id.
    pub async fn refresh_family_members(
        &self,
        handle: &Arc<Mutex<WizardSession>>,
        auth: &Session,
    ) -> Result<(), WizardError> {
        let session_id;
        let mut patient_id;
        let profile_ticket;
        {
            let mut session = handle.lock().await;
            session.ensure_open()?;
            session_id = session.id;
            patient_id = session.data.profile.as_ref().map(|p| p.id);
            profile_ticket = match patient_id {
                Some(_) => None,
                None => Some(session.versions.issue(FetchCategory::PatientProfile)),
            };
        }

        if let Some(ticket) = profile_ticket {
            match self.relations.get_my_profile(auth).await {
                Ok(profile) => {
                    let mut session = handle.lock().await;
                    if settle(&mut session, &ticket) {
                        patient_id = Some(profile.id);
                        session.data.profile = Some(profile);
                        session.touch();
                    }
                }
                Err(err) => {
                    let mut session = handle.lock().await;
                    if settle(&mut session, &ticket) {
                        self.notify_fetch_failed(session_id, FetchCategory::PatientProfile, &err);
                    }
                    return Ok(());
                }
            }
        }

        let patient_id = match patient_id {
            Some(id) => id,
            // A newer refresh settled the profile race and owns the rest.
            None => return Ok(()),
        };

        let ticket = {
            let mut session = handle.lock().await;
            session.ensure_open()?;
            session.versions.issue(FetchCategory::FamilyMembers)
        };

        match self.relations.list_family_members(patient_id, auth).await {
            Ok(members) => {
                let mut session = handle.lock().await;
                if settle(&mut session, &ticket) {
                    let retained = session.draft.family_member.as_ref().and_then(|selected| {
                        members.iter().find(|m| m.id == selected.id).cloned()
                    });
                    session.data.family_members = members;
                    session.draft.family_member = retained;
                    session.touch();
                }
            }
            Err(err) => {
                let mut session = handle.lock().await;
                if settle(&mut session, &ticket) {
                    session.data.family_members = Vec::new();
                    session.draft.family_member = None;
                    session.touch();
                    self.notify_fetch_failed(session_id, FetchCategory::FamilyMembers, &err);
                }
            }
        }

        Ok(())
    }

    fn notify_fetch_failed(&self, session_id: Uuid, category: FetchCategory, err: &WizardError) {
        self.sink.notify(WizardNotification::FetchFailed {
            session_id,
            category,
            detail: err.to_string(),
        });
    }
}

/// Settles a ticket against the session's counters, logging when the
/// response lost the race and must be discarded.
fn settle(session: &mut WizardSession, ticket: &FetchTicket) -> bool {
    if session.versions.try_apply(ticket) {
        true
    } else {
        debug!(
            "Discarding stale {} response (version {}) for wizard session {}",
            ticket.category, ticket.version, session.id
        );
        false
    }
}
