use std::collections::HashMap;
use std::sync::Arc;

use assert_matches::assert_matches;
use futures::future::join_all;
use uuid::Uuid;

use doctor_queue_cell::{DoctorQueue, QueueError};
use security_cell::{AuditLog, RepositoryAuditSink};
use shared_database::ClinicRepository;
use shared_models::{Actor, AssignmentType};
use shared_utils::test_utils::{ClinicFixture, FaultyStore};

struct Harness {
    fixture: ClinicFixture,
    queue: Arc<DoctorQueue>,
    audit: AuditLog,
    admin: Actor,
}

async fn harness() -> Harness {
    let fixture = ClinicFixture::new();
    let audit = AuditLog::spawn(Arc::new(RepositoryAuditSink::new(fixture.repository())), 3);
    let queue = Arc::new(DoctorQueue::new(fixture.repository(), audit.clone(), 16));
    let admin = fixture.admin().await;
    Harness {
        fixture,
        queue,
        audit,
        admin,
    }
}

impl Harness {
    async fn rotation(&self, names: &[&str]) -> Vec<Actor> {
        let mut doctors = Vec::new();
        for name in names {
            let doctor = self.fixture.doctor(name).await;
            self.queue.enqueue_doctor(doctor.id, &self.admin).await.unwrap();
            doctors.push(doctor);
        }
        doctors
    }

    async fn assign_new_patient(&self, name: &str) -> Result<Uuid, QueueError> {
        let patient = self.fixture.add_patient(name, None).await;
        self.queue
            .assign_next(patient.id, &self.admin)
            .await
            .map(|a| a.doctor_id)
    }

    async fn action_types(&self) -> Vec<String> {
        self.audit.flush().await;
        self.fixture
            .store
            .activity_log()
            .await
            .into_iter()
            .map(|e| e.action_type)
            .collect()
    }
}

#[tokio::test]
async fn patients_rotate_through_doctors_in_order() {
    let h = harness().await;
    let doctors = h.rotation(&["Dr. Bir", "Dr. Iki", "Dr. Uc"]).await;

    let mut assigned = Vec::new();
    for i in 0..3 {
        assigned.push(h.assign_new_patient(&format!("Hasta {}", i)).await.unwrap());
    }
    assert_eq!(assigned, vec![doctors[0].id, doctors[1].id, doctors[2].id]);

    // Taking the second doctor out hands the next patient to the first.
    assert!(h.queue.dequeue_doctor(doctors[1].id, &h.admin).await.unwrap());
    assert_eq!(h.assign_new_patient("Hasta 3").await.unwrap(), doctors[0].id);
    assert_eq!(h.assign_new_patient("Hasta 4").await.unwrap(), doctors[2].id);
}

#[tokio::test]
async fn assignment_is_written_to_the_patient() {
    let h = harness().await;
    let doctors = h.rotation(&["Dr. Bir"]).await;
    let patient = h.fixture.add_patient("Ayse Yilmaz", None).await;

    let assignment = h.queue.assign_next(patient.id, &h.admin).await.unwrap();

    let stored = h.fixture.store.get_patient(patient.id).await.unwrap().unwrap();
    assert_eq!(stored.assigned_doctor_id, Some(doctors[0].id));
    assert_eq!(stored.assignment_type, Some(AssignmentType::Queue));
    assert_eq!(stored.assignment_date, Some(assignment.assigned_at));

    let entries = h.queue.entries().await.unwrap().entries;
    assert_eq!(entries[0].last_assigned_at, Some(assignment.assigned_at));
}

#[tokio::test]
async fn single_doctor_receives_every_patient() {
    let h = harness().await;
    let doctors = h.rotation(&["Dr. Tek"]).await;

    for i in 0..4 {
        let doctor_id = h.assign_new_patient(&format!("Hasta {}", i)).await.unwrap();
        assert_eq!(doctor_id, doctors[0].id);
    }
}

#[tokio::test]
async fn rotation_is_fair_over_many_assignments() {
    let h = harness().await;
    let doctors = h.rotation(&["Dr. Bir", "Dr. Iki", "Dr. Uc"]).await;

    let mut counts: HashMap<Uuid, usize> = HashMap::new();
    for i in 0..11 {
        let doctor_id = h.assign_new_patient(&format!("Hasta {}", i)).await.unwrap();
        *counts.entry(doctor_id).or_default() += 1;
    }

    for doctor in &doctors {
        let count = counts.get(&doctor.id).copied().unwrap_or(0);
        assert!((3..=4).contains(&count), "{} got {}", doctor.display_name, count);
    }
}

#[tokio::test]
async fn empty_rotation_reports_no_active_doctors() {
    let h = harness().await;
    let patient = h.fixture.add_patient("Ayse Yilmaz", None).await;

    let result = h.queue.assign_next(patient.id, &h.admin).await;
    assert_matches!(result, Err(QueueError::NoActiveDoctors));

    let stored = h.fixture.store.get_patient(patient.id).await.unwrap().unwrap();
    assert_eq!(stored.assigned_doctor_id, None);
    assert!(h.action_types().await.is_empty());
}

#[tokio::test]
async fn already_assigned_patient_is_rejected() {
    let h = harness().await;
    let doctors = h.rotation(&["Dr. Bir", "Dr. Iki"]).await;
    let patient = h.fixture.add_patient("Ayse Yilmaz", Some(&doctors[1])).await;

    let result = h.queue.assign_next(patient.id, &h.admin).await;
    assert_matches!(result, Err(QueueError::Validation { field, .. }) if field == "patient_id");

    // The rotation did not move.
    let snapshot = h.queue.entries().await.unwrap();
    assert_eq!(snapshot.next_doctor_id, Some(doctors[0].id));
}

#[tokio::test]
async fn unknown_patient_is_not_found() {
    let h = harness().await;
    h.rotation(&["Dr. Bir"]).await;

    let result = h.queue.assign_next(Uuid::new_v4(), &h.admin).await;
    assert_matches!(result, Err(QueueError::NotFound(_)));
}

#[tokio::test]
async fn failed_assignment_leaves_the_rotation_untouched() {
    let fixture = ClinicFixture::new();
    let faulty = Arc::new(FaultyStore::new(fixture.store.clone()));
    let audit = AuditLog::spawn(Arc::new(RepositoryAuditSink::new(fixture.repository())), 3);
    let queue = DoctorQueue::new(faulty.clone(), audit.clone(), 4);
    let admin = fixture.admin().await;
    let first = fixture.doctor("Dr. Bir").await;
    let second = fixture.doctor("Dr. Iki").await;
    queue.enqueue_doctor(first.id, &admin).await.unwrap();
    queue.enqueue_doctor(second.id, &admin).await.unwrap();
    let patient = fixture.add_patient("Ayse Yilmaz", None).await;

    faulty.fail_next_queue_assignment();
    let result = queue.assign_next(patient.id, &admin).await;
    assert_matches!(result, Err(QueueError::Persistence(_)));

    // Neither turn was spent and the patient is still waiting.
    let entries = queue.entries().await.unwrap().entries;
    assert!(entries.iter().all(|e| e.last_assigned_at.is_none()));
    let stored = fixture.store.get_patient(patient.id).await.unwrap().unwrap();
    assert_eq!(stored.assigned_doctor_id, None);

    // The retry goes to the doctor who was up before the failure.
    let assignment = queue.assign_next(patient.id, &admin).await.unwrap();
    assert_eq!(assignment.doctor_id, first.id);

    audit.flush().await;
    let actions: Vec<String> = fixture
        .store
        .activity_log()
        .await
        .into_iter()
        .map(|e| e.action_type)
        .collect();
    assert_eq!(
        actions,
        vec!["ENQUEUE_DOCTOR", "ENQUEUE_DOCTOR", "ASSIGN_PATIENT_FROM_QUEUE"]
    );
}

#[tokio::test]
async fn concurrent_assignments_never_share_a_turn() {
    let h = harness().await;
    let doctors = h.rotation(&["Dr. Bir", "Dr. Iki", "Dr. Uc", "Dr. Dort"]).await;

    let mut patients = Vec::new();
    for i in 0..doctors.len() {
        patients.push(h.fixture.add_patient(&format!("Hasta {}", i), None).await);
    }

    let tasks = patients.iter().map(|patient| {
        let queue = h.queue.clone();
        let admin = h.admin.clone();
        let patient_id = patient.id;
        tokio::spawn(async move { queue.assign_next(patient_id, &admin).await })
    });

    let mut assigned: Vec<Uuid> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap().doctor_id)
        .collect();
    assigned.sort();
    assigned.dedup();

    assert_eq!(assigned.len(), doctors.len());
}

#[tokio::test]
async fn reactivated_doctor_rejoins_at_the_back() {
    let h = harness().await;
    let doctors = h.rotation(&["Dr. Bir", "Dr. Iki", "Dr. Uc"]).await;

    // The first doctor is up next, then leaves and comes back.
    h.queue.dequeue_doctor(doctors[0].id, &h.admin).await.unwrap();
    h.queue.enqueue_doctor(doctors[0].id, &h.admin).await.unwrap();

    assert_eq!(h.assign_new_patient("Hasta 0").await.unwrap(), doctors[1].id);
    assert_eq!(h.assign_new_patient("Hasta 1").await.unwrap(), doctors[2].id);
    assert_eq!(h.assign_new_patient("Hasta 2").await.unwrap(), doctors[0].id);
}

#[tokio::test]
async fn dequeued_doctor_keeps_assigned_patients() {
    let h = harness().await;
    let doctors = h.rotation(&["Dr. Bir", "Dr. Iki"]).await;
    let patient = h.fixture.add_patient("Ayse Yilmaz", None).await;
    h.queue.assign_next(patient.id, &h.admin).await.unwrap();

    h.queue.dequeue_doctor(doctors[0].id, &h.admin).await.unwrap();

    let stored = h.fixture.store.get_patient(patient.id).await.unwrap().unwrap();
    assert_eq!(stored.assigned_doctor_id, Some(doctors[0].id));
}

#[tokio::test]
async fn only_admins_manage_the_rotation() {
    let h = harness().await;
    let doctor = h.fixture.doctor("Dr. Bir").await;
    let assistant = h.fixture.assistant().await;

    assert_matches!(
        h.queue.enqueue_doctor(doctor.id, &doctor).await,
        Err(QueueError::PermissionDenied(_))
    );
    assert_matches!(
        h.queue.dequeue_doctor(doctor.id, &assistant).await,
        Err(QueueError::PermissionDenied(_))
    );
    assert!(h.queue.entries().await.unwrap().entries.is_empty());
}

#[tokio::test]
async fn assistants_and_inactive_doctors_stay_out_of_the_rotation() {
    let h = harness().await;
    let assistant = h.fixture.assistant().await;
    let doctor = h.fixture.doctor("Dr. Izinli").await;
    h.fixture.store.set_doctor_active(doctor.id, false).await.unwrap();

    assert_matches!(
        h.queue.enqueue_doctor(assistant.id, &h.admin).await,
        Err(QueueError::Validation { field, .. }) if field == "doctor_id"
    );
    assert_matches!(
        h.queue.enqueue_doctor(doctor.id, &h.admin).await,
        Err(QueueError::Validation { field, .. }) if field == "doctor_id"
    );
}

#[tokio::test]
async fn queue_changes_are_audited_once() {
    let h = harness().await;
    let doctors = h.rotation(&["Dr. Bir"]).await;

    // Repeated enqueue and a dequeue of an absent doctor write nothing.
    h.queue.enqueue_doctor(doctors[0].id, &h.admin).await.unwrap();
    h.assign_new_patient("Hasta 0").await.unwrap();
    h.queue.dequeue_doctor(doctors[0].id, &h.admin).await.unwrap();
    assert!(!h.queue.dequeue_doctor(doctors[0].id, &h.admin).await.unwrap());

    assert_eq!(
        h.action_types().await,
        vec!["ENQUEUE_DOCTOR", "ASSIGN_PATIENT_FROM_QUEUE", "DEQUEUE_DOCTOR"]
    );
}
