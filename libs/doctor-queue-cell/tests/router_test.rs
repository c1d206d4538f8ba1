use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware, Router,
};
use serde_json::Value;
use tower::ServiceExt;

use doctor_queue_cell::{create_doctor_queue_router, DoctorQueue};
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
    let queue = Arc::new(DoctorQueue::new(fixture.repository(), audit, 8));
    let resolver = Arc::new(ActorResolver::new(fixture.repository()));

    let router = Router::new()
        .nest("/queue", create_doctor_queue_router(queue))
        .layer(middleware::from_fn_with_state(resolver, actor_middleware))
        .layer(middleware::from_fn_with_state(config.to_arc(), auth_middleware));

    TestApp {
        fixture,
        config,
        router,
    }
}

impl TestApp {
    async fn send(&self, user: &TestUser, method: &str, uri: &str) -> (StatusCode, Value) {
        let token = JwtTestUtils::create_test_token(user, &self.config.jwt_secret, None);
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("Authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }
}

#[tokio::test]
async fn test_intake_without_doctors_is_a_conflict() {
    let app = create_test_app();
    let user = TestUser::assistant("Asst. Kaya");
    app.fixture.add_staff(&user).await;
    let patient = app.fixture.add_patient("Ayse Yilmaz", None).await;

    let (status, body) = app
        .send(&user, "POST", &format!("/queue/assign/{}", patient.id))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["kind"], "no_active_doctors");
}

#[tokio::test]
async fn test_admin_builds_rotation_and_assigns() {
    let app = create_test_app();
    let admin = TestUser::admin("Admin Aydin");
    app.fixture.add_staff(&admin).await;
    let doctor = app.fixture.doctor("Dr. Arslan").await;
    let patient = app.fixture.add_patient("Ayse Yilmaz", None).await;

    let (status, body) = app
        .send(&admin, "POST", &format!("/queue/doctors/{}", doctor.id))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["position"], 1);

    let (status, body) = app.send(&admin, "GET", "/queue").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["next_doctor_id"], doctor.id.to_string());

    let (status, body) = app
        .send(&admin, "POST", &format!("/queue/assign/{}", patient.id))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["doctor_id"], doctor.id.to_string());

    let (status, _) = app
        .send(&admin, "DELETE", &format!("/queue/doctors/{}", doctor.id))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send(&admin, "DELETE", &format!("/queue/doctors/{}", doctor.id))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_doctor_cannot_edit_rotation() {
    let app = create_test_app();
    let user = TestUser::doctor("Dr. Arslan");
    let doctor = app.fixture.add_staff(&user).await;

    let (status, body) = app
        .send(&user, "POST", &format!("/queue/doctors/{}", doctor.id))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["kind"], "permission_denied");
}
