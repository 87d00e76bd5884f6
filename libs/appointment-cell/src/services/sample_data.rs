use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::info;

use shared_config::AppConfig;
use shared_database::supabase::{return_representation, SupabaseClient};

use crate::models::{
    AppointmentError, AppointmentStatus, ExamType, SampleDataReport, SampleDataRequest,
};

const FIRST_NAMES: &[&str] = &[
    "James", "Mary", "John", "Patricia", "Robert", "Jennifer", "Michael", "Linda", "William",
    "Elizabeth", "David", "Barbara", "Richard", "Susan", "Joseph", "Jessica", "Thomas", "Sarah",
    "Charles", "Karen",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Hernandez", "Lopez", "Gonzalez", "Wilson", "Anderson", "Thomas", "Taylor",
    "Moore", "Jackson", "Martin",
];

const PHYSICIANS: &[&str] = &[
    "Dr. Smith",
    "Dr. Johnson",
    "Dr. Williams",
    "Dr. Brown",
    "Dr. Davis",
    "Dr. Miller",
];

const INDICATIONS: &[&str] = &[
    "r/o fracture",
    "chronic pain",
    "follow-up",
    "post-operative evaluation",
    "r/o herniated disc",
    "r/o rotator cuff tear",
    "screening",
    "trauma evaluation",
];

/// Seeds the database with demo patients and appointments. Rows are written
/// directly, skipping the booking rules, so the dataset can include past
/// appointments and realistic no-shows.
pub struct SampleDataService {
    supabase: Arc<SupabaseClient>,
}

impl SampleDataService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub async fn generate(
        &self,
        request: SampleDataRequest,
        auth_token: &str,
    ) -> Result<SampleDataReport, AppointmentError> {
        let patient_count = request.patients.unwrap_or(50);
        let appointment_count = request.appointments.unwrap_or(100);
        let seed = request.seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);

        info!(
            "Generating {} patients and {} appointments (seed {})",
            patient_count, appointment_count, seed
        );

        let patient_rows = Self::build_patients(&mut rng, patient_count);

        let created_patients: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/patients",
                Some(auth_token),
                Some(Value::Array(patient_rows)),
                Some(return_representation()),
            )
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let appointment_rows =
            Self::build_appointments(&mut rng, appointment_count, &created_patients)?;

        let created_appointments: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(Value::Array(appointment_rows)),
                Some(return_representation()),
            )
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let report = SampleDataReport {
            patients_created: created_patients.len(),
            appointments_created: created_appointments.len(),
            seed,
        };

        info!(
            "Sample data ready: {} patients, {} appointments",
            report.patients_created, report.appointments_created
        );
        Ok(report)
    }

    fn build_patients(rng: &mut StdRng, count: usize) -> Vec<Value> {
        let now = Utc::now();

        (0..count)
            .map(|i| {
                let first_name = *FIRST_NAMES.choose(rng).unwrap();
                let last_name = *LAST_NAMES.choose(rng).unwrap();
                let age_years = rng.gen_range(18..=90);
                let date_of_birth = (now - Duration::days(age_years * 365)).date_naive();
                let phone = format!(
                    "{}-{}-{}",
                    rng.gen_range(200..1000),
                    rng.gen_range(200..1000),
                    rng.gen_range(1000..10000)
                );
                let email = if rng.gen_bool(0.7) {
                    Some(format!(
                        "{}.{}@example.com",
                        first_name.to_lowercase(),
                        last_name.to_lowercase()
                    ))
                } else {
                    None
                };

                json!({
                    "patient_id": format!("PT{}", 1000 + i),
                    "first_name": first_name,
                    "last_name": last_name,
                    "date_of_birth": date_of_birth,
                    "phone": phone,
                    "email": email,
                    "created_at": now.to_rfc3339(),
                    "updated_at": now.to_rfc3339()
                })
            })
            .collect()
    }

    fn build_appointments(
        rng: &mut StdRng,
        count: usize,
        patients: &[Value],
    ) -> Result<Vec<Value>, AppointmentError> {
        if patients.is_empty() {
            return Err(AppointmentError::ValidationError(
                "Cannot generate appointments without patients".to_string(),
            ));
        }

        let now = Utc::now();
        let start_date = now - Duration::days(30);

        (0..count)
            .map(|_| {
                let patient = patients.choose(rng).unwrap();
                let patient_id = patient.get("id").and_then(Value::as_str).ok_or_else(|| {
                    AppointmentError::DatabaseError("Patient row missing id".to_string())
                })?;
                let patient_ref = patient
                    .get("patient_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        AppointmentError::DatabaseError(
                            "Patient row missing identifier".to_string(),
                        )
                    })?;

                let days_offset = rng.gen_range(0..=90);
                let hour: u32 = rng.gen_range(7..=18);
                let minute = *[0u32, 15, 30, 45].choose(rng).unwrap();
                let day = (start_date + Duration::days(days_offset)).date_naive();
                let appointment_date = day.and_hms_opt(hour, minute, 0).unwrap().and_utc();

                let status = Self::pick_status(rng, appointment_date < now);
                let exam_type = *ExamType::ALL.choose(rng).unwrap();
                let duration_minutes = Self::pick_duration(rng, exam_type);

                let room_number = if rng.gen_bool(0.5) {
                    Some(format!("RM-{}", rng.gen_range(1..=5)))
                } else {
                    None
                };

                Ok(json!({
                    "patient_id": patient_id,
                    "patient_ref": patient_ref,
                    "appointment_date": appointment_date.to_rfc3339(),
                    "exam_type": exam_type,
                    "status": status,
                    "referring_physician": *PHYSICIANS.choose(rng).unwrap(),
                    "clinical_indication": *INDICATIONS.choose(rng).unwrap(),
                    "special_instructions": Value::Null,
                    "duration_minutes": duration_minutes,
                    "room_number": room_number,
                    "created_at": now.to_rfc3339(),
                    "updated_at": now.to_rfc3339()
                }))
            })
            .collect()
    }

    fn pick_status(rng: &mut StdRng, in_past: bool) -> AppointmentStatus {
        let roll: f64 = rng.gen();
        if in_past {
            if roll < 0.85 {
                AppointmentStatus::Completed
            } else if roll < 0.95 {
                AppointmentStatus::NoShow
            } else {
                AppointmentStatus::Cancelled
            }
        } else if roll < 0.60 {
            AppointmentStatus::Scheduled
        } else if roll < 0.95 {
            AppointmentStatus::Confirmed
        } else {
            AppointmentStatus::Cancelled
        }
    }

    fn pick_duration(rng: &mut StdRng, exam_type: ExamType) -> i32 {
        let options: &[i32] = match exam_type {
            ExamType::MriBrain | ExamType::MriSpine | ExamType::MriKnee => &[30, 45, 60],
            ExamType::CtHead | ExamType::CtChest | ExamType::CtAbdomen => &[15, 20, 30],
            _ => &[10, 15, 20],
        };

        *options.choose(rng).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_produces_same_patients() {
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);

        let first = SampleDataService::build_patients(&mut a, 10);
        let second = SampleDataService::build_patients(&mut b, 10);

        let ids_a: Vec<_> = first
            .iter()
            .map(|p| p["first_name"].as_str().unwrap().to_string())
            .collect();
        let ids_b: Vec<_> = second
            .iter()
            .map(|p| p["first_name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn patient_identifiers_are_sequential() {
        let mut rng = StdRng::seed_from_u64(7);
        let rows = SampleDataService::build_patients(&mut rng, 3);

        assert_eq!(rows[0]["patient_id"], "PT1000");
        assert_eq!(rows[1]["patient_id"], "PT1001");
        assert_eq!(rows[2]["patient_id"], "PT1002");
    }

    #[test]
    fn phone_numbers_match_clinic_format() {
        let mut rng = StdRng::seed_from_u64(3);
        let rows = SampleDataService::build_patients(&mut rng, 25);

        let pattern = regex::Regex::new(r"^\d{3}-\d{3}-\d{4}$").unwrap();
        for row in &rows {
            assert!(pattern.is_match(row["phone"].as_str().unwrap()));
        }
    }

    #[test]
    fn appointments_reference_generated_patients() {
        let mut rng = StdRng::seed_from_u64(11);
        let patients = vec![json!({
            "id": "6b7f5f2e-0000-0000-0000-000000000001",
            "patient_id": "PT1000"
        })];

        let rows = SampleDataService::build_appointments(&mut rng, 20, &patients).unwrap();

        assert_eq!(rows.len(), 20);
        for row in &rows {
            assert_eq!(row["patient_ref"], "PT1000");
            assert!(row["duration_minutes"].as_i64().unwrap() > 0);
        }
    }

    #[test]
    fn appointments_require_patients() {
        let mut rng = StdRng::seed_from_u64(11);
        let result = SampleDataService::build_appointments(&mut rng, 5, &[]);
        assert!(result.is_err());
    }
}
