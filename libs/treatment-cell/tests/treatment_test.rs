use std::str::FromStr;
use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use security_cell::{AuditLog, RepositoryAuditSink};
use shared_database::ClinicRepository;
use shared_models::{Actor, Patient, TimeRange};
use shared_utils::test_utils::ClinicFixture;
use treatment_cell::{CreateTreatmentRequest, TreatmentError, TreatmentService, UpdateTreatmentRequest};

struct Harness {
    fixture: ClinicFixture,
    treatments: TreatmentService,
    audit: AuditLog,
    admin: Actor,
    doctor: Actor,
    patient: Patient,
}

async fn harness() -> Harness {
    let fixture = ClinicFixture::new();
    let audit = AuditLog::spawn(Arc::new(RepositoryAuditSink::new(fixture.repository())), 3);
    let treatments = TreatmentService::new(fixture.repository(), audit.clone());
    let admin = fixture.admin().await;
    let doctor = fixture.doctor("Dr. Arslan").await;
    let patient = fixture.add_patient("Ayse Yilmaz", Some(&doctor)).await;
    Harness {
        fixture,
        treatments,
        audit,
        admin,
        doctor,
        patient,
    }
}

fn tl(amount: &str) -> Decimal {
    Decimal::from_str(amount).unwrap()
}

fn around_now() -> TimeRange {
    let now = Utc::now();
    TimeRange::new(now - Duration::hours(1), now + Duration::hours(1))
}

impl Harness {
    fn request(&self, procedure: &str, cost: &str) -> CreateTreatmentRequest {
        CreateTreatmentRequest::new(self.patient.id, self.doctor.id, procedure, tl(cost))
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
async fn doctor_records_treatment_on_a_tooth() {
    let h = harness().await;

    let treatment = h
        .treatments
        .create(h.request("Kompozit dolgu", "1250.50").on_tooth(36), &h.doctor)
        .await
        .unwrap();

    assert_eq!(treatment.tooth_no, Some(36));
    assert_eq!(treatment.cost, tl("1250.50"));
    assert!(!treatment.locked);
    assert_eq!(h.action_types().await, vec!["CREATE_TREATMENT"]);
}

#[tokio::test]
async fn invalid_tooth_and_negative_cost_are_rejected() {
    let h = harness().await;

    for tooth in [19, 56, 90, 0] {
        let result = h
            .treatments
            .create(h.request("Dolgu", "100").on_tooth(tooth), &h.doctor)
            .await;
        assert_matches!(result, Err(TreatmentError::Validation { field, .. }) if field == "tooth_no");
    }

    let negative = h.treatments.create(h.request("Dolgu", "-1"), &h.doctor).await;
    assert_matches!(negative, Err(TreatmentError::Validation { field, .. }) if field == "cost");

    let blank = h.treatments.create(h.request("  ", "100"), &h.doctor).await;
    assert_matches!(blank, Err(TreatmentError::Validation { field, .. }) if field == "procedure");

    assert!(h.action_types().await.is_empty());
}

#[tokio::test]
async fn primary_teeth_and_free_treatments_are_accepted() {
    let h = harness().await;

    let treatment = h
        .treatments
        .create(h.request("Kontrol", "0").on_tooth(85), &h.doctor)
        .await
        .unwrap();
    assert_eq!(treatment.cost, Decimal::ZERO);
}

#[tokio::test]
async fn doctors_edit_only_their_own_treatments() {
    let h = harness().await;
    let colleague = h.fixture.doctor("Dr. Baska").await;
    let assistant = h.fixture.assistant().await;

    let for_colleague = CreateTreatmentRequest::new(h.patient.id, colleague.id, "Dolgu", tl("100"));
    assert_matches!(
        h.treatments.create(for_colleague, &h.doctor).await,
        Err(TreatmentError::PermissionDenied(_))
    );
    assert_matches!(
        h.treatments.create(h.request("Dolgu", "100"), &assistant).await,
        Err(TreatmentError::PermissionDenied(_))
    );

    let treatment = h.treatments.create(h.request("Dolgu", "100"), &h.doctor).await.unwrap();
    assert_matches!(
        h.treatments.delete(treatment.id, &colleague).await,
        Err(TreatmentError::PermissionDenied(_))
    );
}

#[tokio::test]
async fn edits_are_allowed_until_locked() {
    let h = harness().await;
    let treatment = h.treatments.create(h.request("Dolgu", "100"), &h.doctor).await.unwrap();

    let updated = h
        .treatments
        .update(
            treatment.id,
            UpdateTreatmentRequest {
                cost: Some(tl("150")),
                notes: Some("Iki yuzey".to_string()),
            },
            &h.doctor,
        )
        .await
        .unwrap();
    assert_eq!(updated.cost, tl("150"));
    assert!(updated.updated_at > treatment.updated_at);

    let summary = h
        .treatments
        .lock_before(Utc::now() + Duration::seconds(1), &h.admin)
        .await
        .unwrap();
    assert_eq!(summary.locked, 1);

    let after_lock = h
        .treatments
        .update(
            treatment.id,
            UpdateTreatmentRequest {
                cost: Some(tl("1")),
                ..Default::default()
            },
            &h.admin,
        )
        .await;
    assert_matches!(after_lock, Err(TreatmentError::Locked(id)) if id == treatment.id);
    assert_matches!(
        h.treatments.delete(treatment.id, &h.admin).await,
        Err(TreatmentError::Locked(_))
    );

    assert_eq!(
        h.action_types().await,
        vec!["CREATE_TREATMENT", "UPDATE_TREATMENT", "LOCK_TREATMENTS"]
    );
}

#[tokio::test]
async fn lock_only_touches_earlier_rows() {
    let h = harness().await;
    h.treatments.create(h.request("Dolgu", "100"), &h.doctor).await.unwrap();

    let summary = h
        .treatments
        .lock_before(Utc::now() - Duration::hours(1), &h.admin)
        .await
        .unwrap();
    assert_eq!(summary.locked, 0);

    // Nothing locked, nothing audited.
    assert_eq!(h.action_types().await, vec!["CREATE_TREATMENT"]);
}

#[tokio::test]
async fn lock_and_income_need_financial_access() {
    let h = harness().await;

    assert_matches!(
        h.treatments.lock_before(Utc::now(), &h.doctor).await,
        Err(TreatmentError::PermissionDenied(_))
    );
    assert_matches!(
        h.treatments.income(around_now(), &h.doctor).await,
        Err(TreatmentError::PermissionDenied(_))
    );
}

#[tokio::test]
async fn income_totals_live_rows_in_time_order() {
    let h = harness().await;
    let first = h.treatments.create(h.request("Dolgu", "0.10"), &h.doctor).await.unwrap();
    let second = h.treatments.create(h.request("Kanal", "0.20"), &h.doctor).await.unwrap();
    let dropped = h.treatments.create(h.request("Cekim", "999"), &h.doctor).await.unwrap();
    h.treatments.delete(dropped.id, &h.doctor).await.unwrap();

    let report = h.treatments.income(around_now(), &h.admin).await.unwrap();

    assert_eq!(report.count, 2);
    assert!(report.rows.iter().any(|t| t.id == first.id));
    assert!(report.rows.iter().any(|t| t.id == second.id));
    assert!(report.rows.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    assert_eq!(report.total, tl("0.30"));
    assert_eq!(report.total, report.rows.iter().map(|t| t.cost).sum::<Decimal>());
}

#[tokio::test]
async fn deleted_treatment_is_gone() {
    let h = harness().await;
    let treatment = h.treatments.create(h.request("Dolgu", "100"), &h.doctor).await.unwrap();

    h.treatments.delete(treatment.id, &h.doctor).await.unwrap();

    assert!(h.fixture.store.get_treatment(treatment.id).await.unwrap().is_none());
    assert_matches!(
        h.treatments.delete(treatment.id, &h.doctor).await,
        Err(TreatmentError::NotFound(_))
    );
}

#[tokio::test]
async fn unknown_patient_or_doctor_is_not_found() {
    let h = harness().await;

    let no_patient = CreateTreatmentRequest::new(Uuid::new_v4(), h.doctor.id, "Dolgu", tl("100"));
    assert_matches!(
        h.treatments.create(no_patient, &h.admin).await,
        Err(TreatmentError::NotFound(_))
    );

    let no_doctor = CreateTreatmentRequest::new(h.patient.id, Uuid::new_v4(), "Dolgu", tl("100"));
    assert_matches!(
        h.treatments.create(no_doctor, &h.admin).await,
        Err(TreatmentError::NotFound(_))
    );
}
