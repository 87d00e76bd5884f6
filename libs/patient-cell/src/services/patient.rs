use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::supabase::{return_representation, SupabaseClient};

use crate::models::{
    validate_date_of_birth, validate_email, validate_patient_identifier, validate_phone,
    CreatePatientRequest, Patient, PatientError, PatientSearchQuery, UpdatePatientRequest,
};

pub struct PatientService {
    supabase: SupabaseClient,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_patient(
        &self,
        request: CreatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Registering patient {}", request.patient_id);

        validate_patient_identifier(&request.patient_id)?;
        validate_phone(&request.phone)?;
        validate_date_of_birth(request.date_of_birth, Utc::now().date_naive())?;
        if let Some(email) = &request.email {
            validate_email(email)?;
        }

        let existing_path = format!("/rest/v1/patients?patient_id=eq.{}", request.patient_id);
        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &existing_path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        if !existing.is_empty() {
            return Err(PatientError::DuplicateIdentifier {
                patient_id: request.patient_id,
            });
        }

        let patient_data = json!({
            "patient_id": request.patient_id,
            "first_name": request.first_name,
            "last_name": request.last_name,
            "date_of_birth": request.date_of_birth.format("%Y-%m-%d").to_string(),
            "phone": request.phone,
            "email": request.email,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/patients",
                Some(auth_token),
                Some(patient_data),
                Some(return_representation()),
            )
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| PatientError::DatabaseError("Insert returned no row".to_string()))?;

        let patient: Patient = serde_json::from_value(row)
            .map_err(|e| PatientError::DatabaseError(format!("Failed to parse patient: {}", e)))?;

        info!("Patient {} registered", patient.patient_id);
        Ok(patient)
    }

    /// Look up a patient by clinic identifier (e.g. PT0001).
    pub async fn get_patient(
        &self,
        patient_ref: &str,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Fetching patient {}", patient_ref);

        let path = format!("/rest/v1/patients?patient_id=eq.{}", patient_ref);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(PatientError::NotFound)?;

        serde_json::from_value(row)
            .map_err(|e| PatientError::DatabaseError(format!("Failed to parse patient: {}", e)))
    }

    pub async fn update_patient(
        &self,
        patient_ref: &str,
        request: UpdatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Updating patient {}", patient_ref);

        if let Some(phone) = &request.phone {
            validate_phone(phone)?;
        }
        if let Some(email) = &request.email {
            validate_email(email)?;
        }
        if let Some(date_of_birth) = request.date_of_birth {
            validate_date_of_birth(date_of_birth, Utc::now().date_naive())?;
        }

        let mut update_data = serde_json::Map::new();

        if let Some(first_name) = request.first_name {
            update_data.insert("first_name".to_string(), json!(first_name));
        }
        if let Some(last_name) = request.last_name {
            update_data.insert("last_name".to_string(), json!(last_name));
        }
        if let Some(date_of_birth) = request.date_of_birth {
            update_data.insert(
                "date_of_birth".to_string(),
                json!(date_of_birth.format("%Y-%m-%d").to_string()),
            );
        }
        if let Some(phone) = request.phone {
            update_data.insert("phone".to_string(), json!(phone));
        }
        if let Some(email) = request.email {
            update_data.insert("email".to_string(), json!(email));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/patients?patient_id=eq.{}", patient_ref);
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(update_data)),
                Some(return_representation()),
            )
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(PatientError::NotFound)?;

        serde_json::from_value(row)
            .map_err(|e| PatientError::DatabaseError(format!("Failed to parse patient: {}", e)))
    }

    /// Delete a patient and every appointment that references them. Appointment
    /// rows go first so no orphaned reference survives a partial failure.
    pub async fn delete_patient(
        &self,
        patient_ref: &str,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        let patient = self.get_patient(patient_ref, auth_token).await?;

        info!(
            "Deleting patient {} and cascading to their appointments",
            patient.patient_id
        );

        let appointments_path = format!("/rest/v1/appointments?patient_id=eq.{}", patient.id);
        let _removed: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::DELETE,
                &appointments_path,
                Some(auth_token),
                None,
                Some(return_representation()),
            )
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let patient_path = format!("/rest/v1/patients?id=eq.{}", patient.id);
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::DELETE,
                &patient_path,
                Some(auth_token),
                None,
                Some(return_representation()),
            )
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(PatientError::NotFound)?;

        serde_json::from_value(row)
            .map_err(|e| PatientError::DatabaseError(format!("Failed to parse patient: {}", e)))
    }

    pub async fn search_patients(
        &self,
        query: PatientSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Patient>, PatientError> {
        debug!("Searching patients with query: {:?}", query);

        let mut query_parts = vec![];

        // Percent-encode the whole pattern so user input cannot break out of
        // its filter value
        if let Some(name) = query.name {
            let pattern = urlencoding::encode(&format!("%{}%", name)).into_owned();
            query_parts.push(format!(
                "or=(first_name.ilike.{},last_name.ilike.{})",
                pattern, pattern
            ));
        }
        if let Some(patient_id) = query.patient_id {
            query_parts.push(format!(
                "patient_id=ilike.{}",
                urlencoding::encode(&format!("%{}%", patient_id))
            ));
        }
        if let Some(phone) = query.phone {
            query_parts.push(format!(
                "phone=ilike.{}",
                urlencoding::encode(&format!("%{}%", phone))
            ));
        }

        let limit = query.limit.unwrap_or(50);
        let offset = query.offset.unwrap_or(0);
        query_parts.push(format!("limit={}", limit));
        query_parts.push(format!("offset={}", offset));

        let path = format!(
            "/rest/v1/patients?{}&order=last_name.asc",
            query_parts.join("&")
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Patient>, _>>()
            .map_err(|e| PatientError::DatabaseError(format!("Failed to parse patients: {}", e)))
    }
}
