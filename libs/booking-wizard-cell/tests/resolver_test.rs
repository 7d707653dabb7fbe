// libs/booking-wizard-cell/tests/resolver_test.rs
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::sync::Mutex;
use tokio::time::sleep;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use assert_matches::assert_matches;
use booking_wizard_cell::*;
use shared_models::auth::Session;
use shared_utils::test_utils::{MockClinicResponses, TestUser};

mod support;
use support::*;

#[test]
fn test_version_counter_discards_stale_responses() {
    let mut counter = VersionCounter::default();

    let first = counter.issue();
    let second = counter.issue();
    assert!(counter.is_loading());

    // The older request lost the race and must not settle anything.
    assert!(!counter.try_apply(first));
    assert!(counter.is_loading());

    assert!(counter.try_apply(second));
    assert!(!counter.is_loading());
}

#[test]
fn test_version_counter_invalidation_blocks_in_flight_responses() {
    let mut counter = VersionCounter::default();

    let in_flight = counter.issue();
    counter.invalidate();

    assert!(!counter.try_apply(in_flight));
    assert!(!counter.is_loading());
    // Counters only move forward; invalidation consumes a version rather
    // than rewinding one.
    assert_eq!(counter.issued(), 2);
    assert_eq!(counter.applied(), 2);
}

#[test]
fn test_fetch_versions_track_categories_independently() {
    let mut versions = FetchVersions::default();

    let ticket = versions.issue(FetchCategory::SlotList);
    let flags = versions.loading_flags();
    assert!(flags.slot_list);
    assert!(!flags.clinic_link);
    assert!(!flags.family_members);

    versions.invalidate_all();
    assert!(!versions.try_apply(&ticket));
    assert_eq!(versions.loading_flags(), LoadingFlags::default());
}

async fn open_session(
    resolver: &DependentDataResolver,
    doctor_id: Uuid,
    auth: &Session,
) -> Arc<Mutex<WizardSession>> {
    let session_id = Uuid::new_v4();
    let (doctor, data) = resolver
        .resolve_entry(session_id, doctor_id, auth)
        .await
        .unwrap();
    let draft = AppointmentDraft::new(doctor, Utc::now().date_naive());
    Arc::new(Mutex::new(WizardSession::new(
        session_id,
        auth.user_id(),
        draft,
        data,
    )))
}

#[tokio::test]
async fn test_resolve_entry_populates_reference_data() {
    let mock_server = MockServer::start().await;
    let user = TestUser::patient("patient@example.com");
    let doctor_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    mount_doctor(
        &mock_server,
        &doctor_id,
        json!([
            MockClinicResponses::branch_response(&Uuid::new_v4().to_string(), "Dublin Clinic", false),
            MockClinicResponses::branch_response(&Uuid::new_v4().to_string(), "Online", true),
        ]),
    )
    .await;
    mount_profile(&mock_server, &patient_id).await;
    mount_family(
        &mock_server,
        &patient_id,
        json!([
            MockClinicResponses::family_member_response(&Uuid::new_v4().to_string(), "Nora", "Byrne", "child"),
            MockClinicResponses::family_member_response(&Uuid::new_v4().to_string(), "Liam", "Byrne", "spouse"),
        ]),
    )
    .await;

    let config = test_config(&mock_server);
    let sink = Arc::new(RecordingSink::new());
    let resolver = DependentDataResolver::new(&config, sink.clone());

    let session = open_session(&resolver, doctor_id, &patient_session(&user)).await;
    let session = session.lock().await;

    assert_eq!(session.data.branches.len(), 2);
    assert_eq!(session.data.family_members.len(), 2);
    assert_eq!(session.data.profile.as_ref().unwrap().id, patient_id);
    assert!(session.data.slots.is_empty());
    assert!(sink.events().is_empty());
}

#[tokio::test]
async fn test_resolve_entry_fails_without_doctor() {
    let mock_server = MockServer::start().await;
    let user = TestUser::patient("patient@example.com");
    let patient_id = Uuid::new_v4();

    // Only the profile is mocked; the doctor lookup 404s.
    mount_profile(&mock_server, &patient_id).await;

    let config = test_config(&mock_server);
    let sink = Arc::new(RecordingSink::new());
    let resolver = DependentDataResolver::new(&config, sink);

    let result = resolver
        .resolve_entry(Uuid::new_v4(), Uuid::new_v4(), &patient_session(&user))
        .await;

    assert_matches!(
        result.unwrap_err(),
        WizardError::Fetch {
            category: FetchCategory::BranchDirectory,
            ..
        }
    );
}

#[tokio::test]
async fn test_resolve_entry_survives_profile_failure() {
    let mock_server = MockServer::start().await;
    let user = TestUser::patient("patient@example.com");
    let doctor_id = Uuid::new_v4();
    let branch_id = Uuid::new_v4();

    mount_doctor(
        &mock_server,
        &doctor_id,
        json!([MockClinicResponses::branch_response(&branch_id.to_string(), "Dublin Clinic", false)]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/patients/me"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server);
    let sink = Arc::new(RecordingSink::new());
    let resolver = DependentDataResolver::new(&config, sink.clone());

    let session = open_session(&resolver, doctor_id, &patient_session(&user)).await;
    let session = session.lock().await;

    assert_eq!(session.data.branches.len(), 1);
    assert!(session.data.profile.is_none());
    assert!(session.data.family_members.is_empty());

    let events = sink.events();
    assert!(events.iter().any(|e| matches!(
        e,
        WizardNotification::FetchFailed {
            category: FetchCategory::PatientProfile,
            ..
        }
    )));
}

#[tokio::test]
async fn test_branch_selection_resolves_link_and_slots() {
    let mock_server = MockServer::start().await;
    let user = TestUser::patient("patient@example.com");
    let doctor_id = Uuid::new_v4();
    let branch_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    setup_entry_mocks(&mock_server, &doctor_id, &branch_id, &patient_id).await;
    mount_clinic_link(&mock_server, &doctor_id, &branch_id).await;
    mount_slots(
        &mock_server,
        &doctor_id,
        &branch_id,
        &today(),
        json!([
            MockClinicResponses::slot_response(&Uuid::new_v4().to_string(), &today(), 10, 3),
            MockClinicResponses::slot_response(&Uuid::new_v4().to_string(), &today(), 11, 1),
        ]),
    )
    .await;

    let config = test_config(&mock_server);
    let sink = Arc::new(RecordingSink::new());
    let resolver = DependentDataResolver::new(&config, sink.clone());
    let auth = patient_session(&user);

    let handle = open_session(&resolver, doctor_id, &auth).await;
    resolver
        .on_branch_selected(&handle, branch_id, &auth)
        .await
        .unwrap();

    let session = handle.lock().await;
    assert_eq!(session.draft.branch.as_ref().unwrap().id, branch_id);
    assert_eq!(session.draft.doctor_clinic.as_ref().unwrap().branch_id, branch_id);
    assert_eq!(session.data.slots.len(), 2);
    assert_eq!(session.versions.loading_flags(), LoadingFlags::default());
    assert!(sink.events().is_empty());
}

#[tokio::test]
async fn test_selecting_unknown_branch_is_rejected() {
    let mock_server = MockServer::start().await;
    let user = TestUser::patient("patient@example.com");
    let doctor_id = Uuid::new_v4();
    let branch_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    setup_entry_mocks(&mock_server, &doctor_id, &branch_id, &patient_id).await;

    let config = test_config(&mock_server);
    let sink = Arc::new(RecordingSink::new());
    let resolver = DependentDataResolver::new(&config, sink);
    let auth = patient_session(&user);

    let handle = open_session(&resolver, doctor_id, &auth).await;
    let result = resolver
        .on_branch_selected(&handle, Uuid::new_v4(), &auth)
        .await;

    assert_matches!(result.unwrap_err(), WizardError::BranchNotFound);
    let session = handle.lock().await;
    assert!(session.draft.branch.is_none());
    assert_eq!(session.versions.loading_flags(), LoadingFlags::default());
}

#[tokio::test]
async fn test_rapid_branch_reselection_applies_only_newest_response() {
    let mock_server = MockServer::start().await;
    let user = TestUser::patient("patient@example.com");
    let doctor_id = Uuid::new_v4();
    let branch_a = Uuid::new_v4();
    let branch_b = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let slot_a = Uuid::new_v4();
    let slot_b = Uuid::new_v4();

    mount_doctor(
        &mock_server,
        &doctor_id,
        json!([
            MockClinicResponses::branch_response(&branch_a.to_string(), "Dublin Clinic", false),
            MockClinicResponses::branch_response(&branch_b.to_string(), "Cork Clinic", false),
        ]),
    )
    .await;
    mount_profile(&mock_server, &patient_id).await;
    mount_family(&mock_server, &patient_id, json!([])).await;
    mount_clinic_link(&mock_server, &doctor_id, &branch_b).await;

    // Branch A's responses crawl in long after branch B's.
    Mock::given(method("GET"))
        .and(path(format!("/api/v1/doctors/{}/clinics/{}", doctor_id, branch_a)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(MockClinicResponses::clinic_link_response(
                    &Uuid::new_v4().to_string(),
                    &doctor_id.to_string(),
                    &branch_a.to_string(),
                    45.0,
                ))
                .set_delay(Duration::from_millis(400)),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!(
            "/api/v1/doctors/{}/branches/{}/slots",
            doctor_id, branch_a
        )))
        .and(query_param("date", today()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([MockClinicResponses::slot_response(
                    &slot_a.to_string(),
                    &today(),
                    9,
                    2
                )]))
                .set_delay(Duration::from_millis(400)),
        )
        .mount(&mock_server)
        .await;
    mount_slots(
        &mock_server,
        &doctor_id,
        &branch_b,
        &today(),
        json!([
            MockClinicResponses::slot_response(&slot_b.to_string(), &today(), 14, 5),
            MockClinicResponses::slot_response(&Uuid::new_v4().to_string(), &today(), 15, 1),
        ]),
    )
    .await;

    let config = test_config(&mock_server);
    let sink = Arc::new(RecordingSink::new());
    let resolver = DependentDataResolver::new(&config, sink);
    let auth = patient_session(&user);

    let handle = open_session(&resolver, doctor_id, &auth).await;

    // Both selections run concurrently; A dispatches first, B supersedes it
    // while A's responses are still in flight.
    let (first, second) = tokio::join!(
        resolver.on_branch_selected(&handle, branch_a, &auth),
        resolver.on_branch_selected(&handle, branch_b, &auth),
    );
    first.unwrap();
    second.unwrap();

    let session = handle.lock().await;
    assert_eq!(session.draft.branch.as_ref().unwrap().id, branch_b);
    assert_eq!(session.draft.doctor_clinic.as_ref().unwrap().branch_id, branch_b);
    assert_eq!(session.data.slots.len(), 2);
    assert!(session.data.slots.iter().any(|s| s.id == slot_b));
    assert!(session.data.slots.iter().all(|s| s.id != slot_a));
    assert_eq!(session.versions.loading_flags(), LoadingFlags::default());
}

#[tokio::test]
async fn test_date_change_retains_selected_slot_by_id() {
    let mock_server = MockServer::start().await;
    let user = TestUser::patient("patient@example.com");
    let doctor_id = Uuid::new_v4();
    let branch_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let slot_id = Uuid::new_v4();

    let tomorrow = Utc::now().date_naive() + chrono::Duration::days(1);
    let tomorrow_str = tomorrow.format("%Y-%m-%d").to_string();
    let later = Utc::now().date_naive() + chrono::Duration::days(2);
    let later_str = later.format("%Y-%m-%d").to_string();

    setup_entry_mocks(&mock_server, &doctor_id, &branch_id, &patient_id).await;
    mount_clinic_link(&mock_server, &doctor_id, &branch_id).await;
    mount_slots(
        &mock_server,
        &doctor_id,
        &branch_id,
        &today(),
        json!([MockClinicResponses::slot_response(&slot_id.to_string(), &today(), 10, 3)]),
    )
    .await;
    // Tomorrow still offers the same slot id at a different hour.
    mount_slots(
        &mock_server,
        &doctor_id,
        &branch_id,
        &tomorrow_str,
        json!([
            MockClinicResponses::slot_response(&slot_id.to_string(), &tomorrow_str, 14, 2),
            MockClinicResponses::slot_response(&Uuid::new_v4().to_string(), &tomorrow_str, 15, 1),
        ]),
    )
    .await;
    mount_slots(&mock_server, &doctor_id, &branch_id, &later_str, json!([])).await;

    let config = test_config(&mock_server);
    let sink = Arc::new(RecordingSink::new());
    let resolver = DependentDataResolver::new(&config, sink);
    let auth = patient_session(&user);

    let handle = open_session(&resolver, doctor_id, &auth).await;
    resolver
        .on_branch_selected(&handle, branch_id, &auth)
        .await
        .unwrap();
    {
        let mut session = handle.lock().await;
        let slot = session.data.slots[0].clone();
        session.draft.slot = Some(slot);
    }

    resolver
        .on_date_changed(&handle, tomorrow, &auth)
        .await
        .unwrap();
    {
        let session = handle.lock().await;
        let retained = session.draft.slot.as_ref().unwrap();
        assert_eq!(retained.id, slot_id);
        assert_eq!(retained.date, tomorrow); // refreshed instance, not the stale copy
        assert_eq!(session.data.slots.len(), 2);
    }

    // A day with no matching slot id drops the selection.
    resolver
        .on_date_changed(&handle, later, &auth)
        .await
        .unwrap();
    let session = handle.lock().await;
    assert!(session.draft.slot.is_none());
    assert!(session.data.slots.is_empty());
}

#[tokio::test]
async fn test_slot_fetch_failure_clears_list_and_notifies() {
    let mock_server = MockServer::start().await;
    let user = TestUser::patient("patient@example.com");
    let doctor_id = Uuid::new_v4();
    let branch_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    let tomorrow = Utc::now().date_naive() + chrono::Duration::days(1);
    let tomorrow_str = tomorrow.format("%Y-%m-%d").to_string();

    setup_entry_mocks(&mock_server, &doctor_id, &branch_id, &patient_id).await;
    mount_clinic_link(&mock_server, &doctor_id, &branch_id).await;
    mount_slots(
        &mock_server,
        &doctor_id,
        &branch_id,
        &today(),
        json!([MockClinicResponses::slot_response(&Uuid::new_v4().to_string(), &today(), 10, 3)]),
    )
    .await;
    // The availability service falls over for tomorrow, then recovers.
    Mock::given(method("GET"))
        .and(path(format!(
            "/api/v1/doctors/{}/branches/{}/slots",
            doctor_id, branch_id
        )))
        .and(query_param("date", tomorrow_str.as_str()))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    mount_slots(
        &mock_server,
        &doctor_id,
        &branch_id,
        &tomorrow_str,
        json!([MockClinicResponses::slot_response(&Uuid::new_v4().to_string(), &tomorrow_str, 9, 1)]),
    )
    .await;

    let config = test_config(&mock_server);
    let sink = Arc::new(RecordingSink::new());
    let resolver = DependentDataResolver::new(&config, sink.clone());
    let auth = patient_session(&user);

    let handle = open_session(&resolver, doctor_id, &auth).await;
    resolver
        .on_branch_selected(&handle, branch_id, &auth)
        .await
        .unwrap();
    {
        let mut session = handle.lock().await;
        let slot = session.data.slots[0].clone();
        session.draft.slot = Some(slot);
    }

    resolver
        .on_date_changed(&handle, tomorrow, &auth)
        .await
        .unwrap();
    {
        let session = handle.lock().await;
        assert!(session.data.slots.is_empty());
        assert!(session.draft.slot.is_none());
        assert_eq!(session.versions.loading_flags(), LoadingFlags::default());
    }
    assert!(sink.events().iter().any(|e| matches!(
        e,
        WizardNotification::FetchFailed {
            category: FetchCategory::SlotList,
            ..
        }
    )));

    // Re-triggering the change retries the fetch and repopulates the list.
    resolver
        .on_date_changed(&handle, tomorrow, &auth)
        .await
        .unwrap();
    let session = handle.lock().await;
    assert_eq!(session.data.slots.len(), 1);
}

#[tokio::test]
async fn test_refresh_family_members_recovers_missing_profile() {
    let mock_server = MockServer::start().await;
    let user = TestUser::patient("patient@example.com");
    let doctor_id = Uuid::new_v4();
    let branch_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    mount_doctor(
        &mock_server,
        &doctor_id,
        json!([MockClinicResponses::branch_response(&branch_id.to_string(), "Dublin Clinic", false)]),
    )
    .await;
    // Profile fetch fails at entry, succeeds on refresh.
    Mock::given(method("GET"))
        .and(path("/api/v1/patients/me"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    mount_profile(&mock_server, &patient_id).await;
    mount_family(
        &mock_server,
        &patient_id,
        json!([MockClinicResponses::family_member_response(
            &Uuid::new_v4().to_string(),
            "Nora",
            "Byrne",
            "child"
        )]),
    )
    .await;

    let config = test_config(&mock_server);
    let sink = Arc::new(RecordingSink::new());
    let resolver = DependentDataResolver::new(&config, sink);
    let auth = patient_session(&user);

    let handle = open_session(&resolver, doctor_id, &auth).await;
    {
        let session = handle.lock().await;
        assert!(session.data.profile.is_none());
    }

    resolver
        .refresh_family_members(&handle, &auth)
        .await
        .unwrap();

    let session = handle.lock().await;
    assert_eq!(session.data.profile.as_ref().unwrap().id, patient_id);
    assert_eq!(session.data.family_members.len(), 1);
    assert_eq!(session.versions.loading_flags(), LoadingFlags::default());
}

#[tokio::test]
async fn test_refresh_keeps_selected_member_only_while_still_on_roster() {
    let mock_server = MockServer::start().await;
    let user = TestUser::patient("patient@example.com");
    let doctor_id = Uuid::new_v4();
    let branch_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let member_id = Uuid::new_v4();

    mount_doctor(
        &mock_server,
        &doctor_id,
        json!([MockClinicResponses::branch_response(&branch_id.to_string(), "Dublin Clinic", false)]),
    )
    .await;
    mount_profile(&mock_server, &patient_id).await;

    let family_path = format!("/api/v1/patients/{}/family-members", patient_id);
    Mock::given(method("GET"))
        .and(path(family_path.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockClinicResponses::family_member_response(&member_id.to_string(), "Nora", "Byrne", "child")
        ])))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;
    // Third roster no longer contains the selected member.
    Mock::given(method("GET"))
        .and(path(family_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockClinicResponses::family_member_response(&Uuid::new_v4().to_string(), "Liam", "Byrne", "spouse")
        ])))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server);
    let sink = Arc::new(RecordingSink::new());
    let resolver = DependentDataResolver::new(&config, sink);
    let auth = patient_session(&user);

    let handle = open_session(&resolver, doctor_id, &auth).await;
    {
        let mut session = handle.lock().await;
        let member = session.data.family_members[0].clone();
        session.draft.family_member = Some(member);
    }

    resolver
        .refresh_family_members(&handle, &auth)
        .await
        .unwrap();
    {
        let session = handle.lock().await;
        assert_eq!(session.draft.family_member.as_ref().unwrap().id, member_id);
    }

    resolver
        .refresh_family_members(&handle, &auth)
        .await
        .unwrap();
    let session = handle.lock().await;
    assert!(session.draft.family_member.is_none());
    assert_eq!(session.data.family_members.len(), 1);
}

#[tokio::test]
async fn test_invalidation_discards_response_already_in_flight() {
    let mock_server = MockServer::start().await;
    let user = TestUser::patient("patient@example.com");
    let doctor_id = Uuid::new_v4();
    let branch_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    let tomorrow = Utc::now().date_naive() + chrono::Duration::days(1);
    let tomorrow_str = tomorrow.format("%Y-%m-%d").to_string();

    setup_entry_mocks(&mock_server, &doctor_id, &branch_id, &patient_id).await;
    mount_clinic_link(&mock_server, &doctor_id, &branch_id).await;
    mount_slots(
        &mock_server,
        &doctor_id,
        &branch_id,
        &today(),
        json!([MockClinicResponses::slot_response(&Uuid::new_v4().to_string(), &today(), 10, 3)]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path(format!(
            "/api/v1/doctors/{}/branches/{}/slots",
            doctor_id, branch_id
        )))
        .and(query_param("date", tomorrow_str.as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([MockClinicResponses::slot_response(
                    &Uuid::new_v4().to_string(),
                    &tomorrow_str,
                    9,
                    4
                )]))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server);
    let sink = Arc::new(RecordingSink::new());
    let resolver = DependentDataResolver::new(&config, sink);
    let auth = patient_session(&user);

    let handle = open_session(&resolver, doctor_id, &auth).await;
    resolver
        .on_branch_selected(&handle, branch_id, &auth)
        .await
        .unwrap();

    // While the slow slot fetch is in flight, a reset-style invalidation
    // wipes the list; the late response must not resurrect it.
    let (changed, _) = tokio::join!(resolver.on_date_changed(&handle, tomorrow, &auth), async {
        sleep(Duration::from_millis(50)).await;
        let mut session = handle.lock().await;
        session.data.slots = Vec::new();
        session.draft.slot = None;
        session.versions.invalidate_all();
    });
    changed.unwrap();

    let session = handle.lock().await;
    assert!(session.data.slots.is_empty());
    assert_eq!(session.versions.loading_flags(), LoadingFlags::default());
}
