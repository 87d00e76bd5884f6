use chrono::{DateTime, Datelike, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;

/// Patient record with a clinic-assigned anonymized identifier (e.g. PT0001).
/// The identifier is unique and immutable after registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub patient_id: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub phone: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Whole years between date of birth and `today`, decremented when the
    /// birthday has not yet occurred this year.
    pub fn age_on(&self, today: NaiveDate) -> i32 {
        let dob = self.date_of_birth;
        let mut years = today.year() - dob.year();
        if (today.month(), today.day()) < (dob.month(), dob.day()) {
            years -= 1;
        }
        years
    }

    pub fn age(&self) -> i32 {
        self.age_on(Utc::now().date_naive())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePatientRequest {
    pub patient_id: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub phone: String,
    pub email: Option<String>,
}

/// Staff-editable fields. The clinic identifier is deliberately absent: it is
/// immutable after registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePatientRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientSearchQuery {
    pub name: Option<String>,
    pub patient_id: Option<String>,
    pub phone: Option<String>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum PatientError {
    #[error("Patient not found")]
    NotFound,

    #[error("Patient with identifier {patient_id} already exists")]
    DuplicateIdentifier { patient_id: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<PatientError> for AppError {
    fn from(e: PatientError) -> Self {
        match e {
            PatientError::NotFound => AppError::NotFound("Patient not found".to_string()),
            PatientError::DuplicateIdentifier { .. } => AppError::Conflict(e.to_string()),
            PatientError::ValidationError(msg) => AppError::Validation(msg),
            PatientError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

// ==============================================================================
// FIELD VALIDATION
// ==============================================================================

/// Clinic identifiers are "PT" followed by digits (e.g. PT0001).
pub fn validate_patient_identifier(patient_id: &str) -> Result<(), PatientError> {
    let pattern = Regex::new(r"^PT\d+$").unwrap();
    if !pattern.is_match(patient_id) {
        return Err(PatientError::ValidationError(format!(
            "Patient ID must be 'PT' followed by digits (e.g. PT0001), got '{}'",
            patient_id
        )));
    }
    Ok(())
}

/// Contact phone must be in the fixed 555-555-5555 format.
pub fn validate_phone(phone: &str) -> Result<(), PatientError> {
    let pattern = Regex::new(r"^\d{3}-\d{3}-\d{4}$").unwrap();
    if !pattern.is_match(phone) {
        return Err(PatientError::ValidationError(
            "Phone number must be in format: 555-555-5555".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), PatientError> {
    let pattern = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    if !pattern.is_match(email) {
        return Err(PatientError::ValidationError(format!(
            "Invalid email address: {}",
            email
        )));
    }
    Ok(())
}

pub fn validate_date_of_birth(date_of_birth: NaiveDate, today: NaiveDate) -> Result<(), PatientError> {
    if date_of_birth > today {
        return Err(PatientError::ValidationError(
            "Date of birth cannot be in the future".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient_born(dob: &str) -> Patient {
        Patient {
            id: Uuid::new_v4(),
            patient_id: "PT0001".to_string(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            date_of_birth: dob.parse().unwrap(),
            phone: "555-555-5555".to_string(),
            email: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn age_before_and_after_birthday() {
        let patient = patient_born("2000-06-15");

        let day_before = NaiveDate::from_ymd_opt(2024, 6, 14).unwrap();
        assert_eq!(patient.age_on(day_before), 23);

        let birthday = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        assert_eq!(patient.age_on(birthday), 24);
    }

    #[test]
    fn age_handles_earlier_month() {
        let patient = patient_born("1990-01-01");
        let today = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        assert_eq!(patient.age_on(today), 34);
    }

    #[test]
    fn identifier_format_enforced() {
        assert!(validate_patient_identifier("PT0001").is_ok());
        assert!(validate_patient_identifier("PT1000").is_ok());
        assert!(validate_patient_identifier("pt0001").is_err());
        assert!(validate_patient_identifier("PT").is_err());
        assert!(validate_patient_identifier("XY123").is_err());
    }

    #[test]
    fn phone_format_enforced() {
        assert!(validate_phone("555-123-4567").is_ok());
        assert!(validate_phone("5551234567").is_err());
        assert!(validate_phone("555-12-34567").is_err());
        assert!(validate_phone("abc-def-ghij").is_err());
    }

    #[test]
    fn email_shape_enforced() {
        assert!(validate_email("someone@example.com").is_ok());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("a@b").is_err());
    }

    #[test]
    fn future_date_of_birth_rejected() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let tomorrow = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
        assert!(validate_date_of_birth(tomorrow, today).is_err());
        assert!(validate_date_of_birth(today, today).is_ok());
    }
}
