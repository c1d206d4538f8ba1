use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware, Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use doctor_queue_cell::DoctorQueue;
use patient_cell::{create_patient_router, PatientService};
use security_cell::{services::actor_middleware, ActorResolver, AuditLog, RepositoryAuditSink};
use shared_utils::extractor::auth_middleware;
use shared_utils::test_utils::{ClinicFixture, JwtTestUtils, TestConfig, TestUser};

struct TestApp {
    fixture: ClinicFixture,
    config: TestConfig,
    router: Router,
}

fn create_test_app() -> TestApp {
    let fixture = ClinicFixture::new();
    let config = TestConfig::default();
    let audit = AuditLog::spawn(Arc::new(RepositoryAuditSink::new(fixture.repository())), 3);
    let queue = Arc::new(DoctorQueue::new(fixture.repository(), audit.clone(), 8));
    let service = Arc::new(PatientService::new(fixture.repository(), queue, audit));
    let resolver = Arc::new(ActorResolver::new(fixture.repository()));

    let router = Router::new()
        .nest("/patients", create_patient_router(service))
        .layer(middleware::from_fn_with_state(resolver, actor_middleware))
        .layer(middleware::from_fn_with_state(config.to_arc(), auth_middleware));

    TestApp {
        fixture,
        config,
        router,
    }
}

impl TestApp {
    async fn send(&self, user: &TestUser, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let token = JwtTestUtils::create_test_token(user, &self.config.jwt_secret, None);
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("Authorization", format!("Bearer {}", token))
            .header("Content-Type", "application/json")
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }
}

#[tokio::test]
async fn test_manual_intake_then_update() {
    let app = create_test_app();
    let user = TestUser::doctor("Dr. Arslan");
    let doctor = app.fixture.add_staff(&user).await;

    let (status, created) = app
        .send(
            &user,
            "POST",
            "/patients",
            Some(json!({
                "name": "Ayse Yilmaz",
                "phone": "0532 123 45 67",
                "intake": { "mode": "manual", "doctor_id": doctor.id }
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["phone"], "5321234567");
    assert_eq!(created["assignment_type"], "manual");
    let id = created["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(&user, "PATCH", &format!("/patients/{}", id), Some(json!({ "anamnez": "Dolgu dustu" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["anamnez"], "Dolgu dustu");

    let (status, body) = app.send(&user, "GET", &format!("/patients/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Ayse Yilmaz");
}

#[tokio::test]
async fn test_queue_intake_without_doctors_is_a_conflict() {
    let app = create_test_app();
    let user = TestUser::assistant("Asst. Kaya");
    app.fixture.add_staff(&user).await;

    let (status, body) = app
        .send(
            &user,
            "POST",
            "/patients",
            Some(json!({
                "name": "Ayse Yilmaz",
                "phone": "5321234567",
                "intake": { "mode": "queue" }
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["kind"], "no_active_doctors");
}

#[tokio::test]
async fn test_bad_phone_is_a_field_error() {
    let app = create_test_app();
    let user = TestUser::admin("Admin Aydin");
    app.fixture.add_staff(&user).await;
    let doctor = app.fixture.doctor("Dr. Arslan").await;

    let (status, body) = app
        .send(
            &user,
            "POST",
            "/patients",
            Some(json!({
                "name": "Ayse Yilmaz",
                "phone": "12345",
                "intake": { "mode": "manual", "doctor_id": doctor.id }
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["field"], "phone");
}
