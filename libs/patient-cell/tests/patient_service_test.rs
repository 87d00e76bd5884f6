use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use patient_cell::models::{CreatePatientRequest, PatientError, PatientSearchQuery};
use patient_cell::router::patient_routes;
use patient_cell::services::PatientService;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, MockClinicResponses, TestConfig, TestUser};

const TOKEN: &str = "service-test-token";

fn create_request(patient_ref: &str) -> CreatePatientRequest {
    CreatePatientRequest {
        patient_id: patient_ref.to_string(),
        first_name: "Amara".to_string(),
        last_name: "Reyes".to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(1985, 3, 20).unwrap(),
        phone: "555-123-4567".to_string(),
        email: Some("amara.reyes@example.com".to_string()),
    }
}

#[tokio::test]
async fn create_patient_succeeds() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    let service = PatientService::new(&config);

    // Duplicate check finds nothing
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("patient_id", "eq.PT2001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockClinicResponses::patient_row(&Uuid::new_v4().to_string(), "PT2001", "Reyes")
        ])))
        .mount(&mock_server)
        .await;

    let patient = service
        .create_patient(create_request("PT2001"), TOKEN)
        .await
        .unwrap();

    assert_eq!(patient.patient_id, "PT2001");
    assert_eq!(patient.last_name, "Reyes");
}

#[tokio::test]
async fn create_patient_rejects_duplicate_identifier() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    let service = PatientService::new(&config);

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockClinicResponses::patient_row(&Uuid::new_v4().to_string(), "PT2001", "Reyes")
        ])))
        .mount(&mock_server)
        .await;

    let result = service.create_patient(create_request("PT2001"), TOKEN).await;

    assert_matches!(result, Err(PatientError::DuplicateIdentifier { .. }));
}

#[tokio::test]
async fn create_patient_rejects_malformed_identifier() {
    let config = TestConfig::default().to_app_config();
    let service = PatientService::new(&config);

    let mut request = create_request("PT2001");
    request.patient_id = "XX-17".to_string();

    let result = service.create_patient(request, TOKEN).await;

    assert_matches!(result, Err(PatientError::ValidationError(_)));
}

#[tokio::test]
async fn create_patient_rejects_bad_phone_format() {
    let config = TestConfig::default().to_app_config();
    let service = PatientService::new(&config);

    let mut request = create_request("PT2001");
    request.phone = "5551234567".to_string();

    let result = service.create_patient(request, TOKEN).await;

    assert_matches!(result, Err(PatientError::ValidationError(_)));
}

#[tokio::test]
async fn get_patient_maps_empty_result_to_not_found() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    let service = PatientService::new(&config);

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = service.get_patient("PT9999", TOKEN).await;

    assert_matches!(result, Err(PatientError::NotFound));
}

#[tokio::test]
async fn delete_patient_removes_appointments_first() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    let service = PatientService::new(&config);

    let patient_row_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockClinicResponses::patient_row(&patient_row_id.to_string(), "PT2001", "Reyes")
        ])))
        .mount(&mock_server)
        .await;

    let appointment_delete = Mock::given(method("DELETE"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("patient_id", format!("eq.{}", patient_row_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount_as_scoped(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockClinicResponses::patient_row(&patient_row_id.to_string(), "PT2001", "Reyes")
        ])))
        .mount(&mock_server)
        .await;

    let deleted = service.delete_patient("PT2001", TOKEN).await.unwrap();

    assert_eq!(deleted.patient_id, "PT2001");
    drop(appointment_delete);
}

#[tokio::test]
async fn search_patients_passes_filters_through() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    let service = PatientService::new(&config);

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("patient_id", "ilike.%PT20%"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockClinicResponses::patient_row(&Uuid::new_v4().to_string(), "PT2001", "Reyes"),
            MockClinicResponses::patient_row(&Uuid::new_v4().to_string(), "PT2002", "Okafor"),
        ])))
        .mount(&mock_server)
        .await;

    let patients = service
        .search_patients(
            PatientSearchQuery {
                name: None,
                patient_id: Some("PT20".to_string()),
                phone: None,
                limit: None,
                offset: None,
            },
            TOKEN,
        )
        .await
        .unwrap();

    assert_eq!(patients.len(), 2);
}

#[tokio::test]
async fn search_keeps_reserved_characters_inside_the_filter() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    let service = PatientService::new(&config);

    // An ampersand in the name must stay inside the ilike pattern instead of
    // starting a new query parameter
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param(
            "or",
            "(first_name.ilike.%A&B%,last_name.ilike.%A&B%)",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockClinicResponses::patient_row(&Uuid::new_v4().to_string(), "PT2001", "A&B")
        ])))
        .mount(&mock_server)
        .await;

    let patients = service
        .search_patients(
            PatientSearchQuery {
                name: Some("A&B".to_string()),
                patient_id: None,
                phone: None,
                limit: None,
                offset: None,
            },
            TOKEN,
        )
        .await
        .unwrap();

    assert_eq!(patients.len(), 1);
}

// ==============================================================================
// ROUTER-LEVEL TESTS
// ==============================================================================

fn create_test_app(config: AppConfig) -> Router {
    patient_routes(Arc::new(config))
}

#[tokio::test]
async fn patient_routes_require_authentication() {
    let config = TestConfig::default().to_app_config();
    let app = create_test_app(config);

    let request = Request::builder()
        .method("GET")
        .uri("/PT2001")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_registration_returns_conflict() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    let app = create_test_app(config.clone());

    let user = TestUser::staff("frontdesk@clinic.example");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockClinicResponses::patient_row(&Uuid::new_v4().to_string(), "PT2001", "Reyes")
        ])))
        .mount(&mock_server)
        .await;

    let body = json!({
        "patient_id": "PT2001",
        "first_name": "Amara",
        "last_name": "Reyes",
        "date_of_birth": "1985-03-20",
        "phone": "555-123-4567"
    });

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn invalid_phone_returns_bad_request() {
    let config = TestConfig::default().to_app_config();
    let app = create_test_app(config.clone());

    let user = TestUser::staff("frontdesk@clinic.example");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    let body = json!({
        "patient_id": "PT2001",
        "first_name": "Amara",
        "last_name": "Reyes",
        "date_of_birth": "1985-03-20",
        "phone": "not-a-phone"
    });

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
