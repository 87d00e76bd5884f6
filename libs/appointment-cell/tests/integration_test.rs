use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::router::appointment_routes;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, MockClinicResponses, TestConfig, TestUser};

fn create_test_app(config: AppConfig) -> Router {
    appointment_routes(Arc::new(config))
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn requests_without_token_are_rejected() {
    let config = TestConfig::default().to_app_config();
    let app = create_test_app(config);

    let request = Request::builder()
        .method("GET")
        .uri("/today")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let config = TestConfig::default().to_app_config();
    let app = create_test_app(config.clone());

    let user = TestUser::staff("tech@clinic.example");
    let token = JwtTestUtils::create_expired_token(&user, &config.supabase_jwt_secret);

    let request = Request::builder()
        .method("GET")
        .uri("/today")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn book_appointment_returns_created_appointment() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    let app = create_test_app(config.clone());

    let user = TestUser::staff("scheduler@clinic.example");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    let patient_row_id = Uuid::new_v4();
    let appointment_date = Utc::now() + Duration::days(2);

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("patient_id", "eq.PT1001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockClinicResponses::patient_row(&patient_row_id.to_string(), "PT1001", "Okafor")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockClinicResponses::appointment_row(
                &Uuid::new_v4().to_string(),
                &patient_row_id.to_string(),
                "PT1001",
                appointment_date,
                "SCHEDULED",
            )
        ])))
        .mount(&mock_server)
        .await;

    let request_body = json!({
        "patient_id": "PT1001",
        "appointment_date": appointment_date.to_rfc3339(),
        "exam_type": "MRI_BRAIN",
        "referring_physician": "Dr. Miller",
        "clinical_indication": "r/o herniated disc",
        "duration_minutes": 45
    });

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(request_body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["appointment"]["status"], "SCHEDULED");
}

#[tokio::test]
async fn double_booking_returns_conflict() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    let app = create_test_app(config.clone());

    let user = TestUser::staff("scheduler@clinic.example");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    let patient_row_id = Uuid::new_v4();
    let appointment_date = Utc::now() + Duration::days(2);

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("patient_id", "eq.PT1001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockClinicResponses::patient_row(&patient_row_id.to_string(), "PT1001", "Okafor")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockClinicResponses::appointment_row(
                &Uuid::new_v4().to_string(),
                &patient_row_id.to_string(),
                "PT1001",
                appointment_date,
                "CONFIRMED",
            )
        ])))
        .mount(&mock_server)
        .await;

    let request_body = json!({
        "patient_id": "PT1001",
        "appointment_date": appointment_date.to_rfc3339(),
        "exam_type": "CT_HEAD",
        "referring_physician": "Dr. Brown"
    });

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(request_body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn invalid_transition_returns_bad_request() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    let app = create_test_app(config.clone());

    let user = TestUser::staff("frontdesk@clinic.example");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    let appointment_id = Uuid::new_v4();

    // Still SCHEDULED, so check-in is premature
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockClinicResponses::appointment_row(
                &appointment_id.to_string(),
                &Uuid::new_v4().to_string(),
                "PT1001",
                Utc::now() + Duration::hours(2),
                "SCHEDULED",
            )
        ])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("POST")
        .uri(format!("/{}/check-in", appointment_id))
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_appointment_returns_not_found() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    let app = create_test_app(config.clone());

    let user = TestUser::staff("frontdesk@clinic.example");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("GET")
        .uri(format!("/{}", Uuid::new_v4()))
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn statistics_endpoint_reports_totals() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    let app = create_test_app(config.clone());

    let user = TestUser::staff("lead@clinic.example");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockClinicResponses::appointment_row(
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                "PT1001",
                Utc::now() + Duration::days(1),
                "SCHEDULED",
            ),
            MockClinicResponses::appointment_row(
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                "PT1002",
                Utc::now() - Duration::days(3),
                "COMPLETED",
            ),
        ])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("GET")
        .uri("/statistics")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["total_appointments"], 2);
    assert_eq!(body["upcoming"], 1);
}

#[tokio::test]
async fn sample_data_requires_admin_role() {
    let config = TestConfig::default().to_app_config();
    let app = create_test_app(config.clone());

    let user = TestUser::staff("tech@clinic.example");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    let request = Request::builder()
        .method("POST")
        .uri("/sample-data")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(json!({"patients": 5, "appointments": 10}).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn sample_data_generates_for_admin() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    let app = create_test_app(config.clone());

    let user = TestUser::admin("admin@clinic.example");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    let patient_rows: Vec<Value> = (0..3)
        .map(|i| {
            MockClinicResponses::patient_row(
                &Uuid::new_v4().to_string(),
                &format!("PT{}", 1000 + i),
                "Seeded",
            )
        })
        .collect();

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!(patient_rows)))
        .mount(&mock_server)
        .await;

    let appointment_rows: Vec<Value> = (0..5)
        .map(|_| {
            MockClinicResponses::appointment_row(
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                "PT1000",
                Utc::now() + Duration::days(1),
                "SCHEDULED",
            )
        })
        .collect();

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!(appointment_rows)))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("POST")
        .uri("/sample-data")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"patients": 3, "appointments": 5, "seed": 42}).to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["report"]["patients_created"], 3);
    assert_eq!(body["report"]["appointments_created"], 5);
    assert_eq!(body["report"]["seed"], 42);
}
