use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{
    ClinicRepository, DoctorDeactivation, InMemoryClinicStore, QueueClaim, StoreError,
    VisibilityScope,
};
use shared_models::{
    ActivityLogEntry, Actor, Appointment, AssignmentType, Doctor, DoctorQueueEntry, Patient, Role,
    TimeRange, Treatment,
};

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_service_role_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_service_role_key: "test-service-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_service_role_key: self.supabase_service_role_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
}

impl TestUser {
    pub fn new(name: &str, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            role,
        }
    }

    pub fn doctor(name: &str) -> Self {
        Self::new(name, Role::Doctor)
    }

    pub fn assistant(name: &str) -> Self {
        Self::new(name, Role::Assistant)
    }

    pub fn admin(name: &str) -> Self {
        Self::new(name, Role::Admin)
    }

    pub fn to_actor(&self) -> Actor {
        Actor::new(self.id, self.name.clone(), self.role)
    }

    pub fn to_doctor(&self, created_at: DateTime<Utc>) -> Doctor {
        Doctor {
            id: self.id,
            name: self.name.clone(),
            role: self.role,
            active: true,
            created_at,
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id.to_string(),
            "email": format!("{}@clinic.test", user.role),
            "role": "authenticated",
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// In-memory clinic seeded with staff and patients for service tests.
pub struct ClinicFixture {
    pub store: Arc<InMemoryClinicStore>,
}

impl Default for ClinicFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl ClinicFixture {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryClinicStore::new()),
        }
    }

    pub fn repository(&self) -> Arc<dyn ClinicRepository> {
        self.store.clone()
    }

    pub async fn add_staff(&self, user: &TestUser) -> Actor {
        self.store
            .insert_doctor(&user.to_doctor(Utc::now()))
            .await
            .expect("seed staff member");
        user.to_actor()
    }

    pub async fn admin(&self) -> Actor {
        self.add_staff(&TestUser::admin("Admin Aydin")).await
    }

    pub async fn doctor(&self, name: &str) -> Actor {
        self.add_staff(&TestUser::doctor(name)).await
    }

    pub async fn assistant(&self) -> Actor {
        self.add_staff(&TestUser::assistant("Asst. Kaya")).await
    }

    /// Patient manually assigned to `doctor`, or unassigned when `None`.
    pub async fn add_patient(&self, name: &str, doctor: Option<&Actor>) -> Patient {
        let now = Utc::now();
        let patient = Patient {
            id: Uuid::new_v4(),
            name: name.to_string(),
            phone: "5321234567".to_string(),
            anamnez: None,
            assigned_doctor_id: doctor.map(|d| d.id),
            assignment_type: doctor.map(|_| AssignmentType::Manual),
            assignment_date: doctor.map(|_| now),
            created_at: now,
            deleted_at: None,
        };
        self.store.insert_patient(&patient).await.expect("seed patient")
    }
}

/// Store that fails selected units of work with a persistence error, the way a
/// timed-out round-trip would, and delegates everything else.
pub struct FaultyStore {
    inner: Arc<InMemoryClinicStore>,
    fail_queue_assignment: AtomicBool,
    fail_deactivation: AtomicBool,
}

impl FaultyStore {
    pub fn new(inner: Arc<InMemoryClinicStore>) -> Self {
        Self {
            inner,
            fail_queue_assignment: AtomicBool::new(false),
            fail_deactivation: AtomicBool::new(false),
        }
    }

    /// The next `assign_from_queue` fails without touching the tables.
    pub fn fail_next_queue_assignment(&self) {
        self.fail_queue_assignment.store(true, Ordering::SeqCst);
    }

    /// The next `deactivate_doctor` fails without touching the tables.
    pub fn fail_next_deactivation(&self) {
        self.fail_deactivation.store(true, Ordering::SeqCst);
    }

    fn timeout(flag: &AtomicBool) -> Result<(), StoreError> {
        if flag.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Persistence("timeout".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ClinicRepository for FaultyStore {
    async fn insert_doctor(&self, doctor: &Doctor) -> Result<Doctor, StoreError> {
        self.inner.insert_doctor(doctor).await
    }

    async fn get_doctor(&self, id: Uuid) -> Result<Option<Doctor>, StoreError> {
        self.inner.get_doctor(id).await
    }

    async fn list_doctors(&self) -> Result<Vec<Doctor>, StoreError> {
        self.inner.list_doctors().await
    }

    async fn set_doctor_active(&self, id: Uuid, active: bool) -> Result<Doctor, StoreError> {
        self.inner.set_doctor_active(id, active).await
    }

    async fn deactivate_doctor(&self, id: Uuid) -> Result<DoctorDeactivation, StoreError> {
        Self::timeout(&self.fail_deactivation)?;
        self.inner.deactivate_doctor(id).await
    }

    async fn insert_patient(&self, patient: &Patient) -> Result<Patient, StoreError> {
        self.inner.insert_patient(patient).await
    }

    async fn get_patient(&self, id: Uuid) -> Result<Option<Patient>, StoreError> {
        self.inner.get_patient(id).await
    }

    async fn update_patient(&self, patient: &Patient) -> Result<Patient, StoreError> {
        self.inner.update_patient(patient).await
    }

    async fn insert_appointment(&self, appointment: &Appointment) -> Result<Appointment, StoreError> {
        self.inner.insert_appointment(appointment).await
    }

    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        self.inner.get_appointment(id).await
    }

    async fn update_appointment(
        &self,
        appointment: &Appointment,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<Appointment, StoreError> {
        self.inner.update_appointment(appointment, expected_updated_at).await
    }

    async fn delete_appointment(&self, id: Uuid) -> Result<(), StoreError> {
        self.inner.delete_appointment(id).await
    }

    async fn list_appointments(
        &self,
        range: TimeRange,
        scope: VisibilityScope,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.inner.list_appointments(range, scope).await
    }

    async fn find_overlapping(
        &self,
        doctor_id: Uuid,
        range: TimeRange,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.inner.find_overlapping(doctor_id, range, exclude).await
    }

    async fn queue_entries(&self) -> Result<Vec<DoctorQueueEntry>, StoreError> {
        self.inner.queue_entries().await
    }

    async fn assign_from_queue(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        expected_last_assigned_at: Option<DateTime<Utc>>,
        stamp: DateTime<Utc>,
    ) -> Result<QueueClaim, StoreError> {
        Self::timeout(&self.fail_queue_assignment)?;
        self.inner
            .assign_from_queue(patient_id, doctor_id, expected_last_assigned_at, stamp)
            .await
    }

    async fn enqueue_doctor(
        &self,
        doctor_id: Uuid,
        activated_at: DateTime<Utc>,
    ) -> Result<DoctorQueueEntry, StoreError> {
        self.inner.enqueue_doctor(doctor_id, activated_at).await
    }

    async fn dequeue_doctor(&self, doctor_id: Uuid) -> Result<bool, StoreError> {
        self.inner.dequeue_doctor(doctor_id).await
    }

    async fn insert_treatment(&self, treatment: &Treatment) -> Result<Treatment, StoreError> {
        self.inner.insert_treatment(treatment).await
    }

    async fn get_treatment(&self, id: Uuid) -> Result<Option<Treatment>, StoreError> {
        self.inner.get_treatment(id).await
    }

    async fn update_treatment(
        &self,
        treatment: &Treatment,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<Treatment, StoreError> {
        self.inner.update_treatment(treatment, expected_updated_at).await
    }

    async fn lock_treatments_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        self.inner.lock_treatments_before(cutoff).await
    }

    async fn list_treatments(&self, range: TimeRange) -> Result<Vec<Treatment>, StoreError> {
        self.inner.list_treatments(range).await
    }

    async fn append_activity(&self, entry: &ActivityLogEntry) -> Result<(), StoreError> {
        self.inner.append_activity(entry).await
    }
}
