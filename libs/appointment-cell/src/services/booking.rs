use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{return_representation, SupabaseClient};

use crate::models::{
    Appointment, AppointmentError, AppointmentSearchQuery, AppointmentStats, AppointmentStatus,
    BookAppointmentRequest, ExamType, UpdateAppointmentRequest,
};
use crate::services::scheduling::SchedulingRuleService;

// Serializes every conflict-check-and-write pair in this process, so two
// concurrent bookings for the same patient/day cannot both pass the check and
// both commit.
static BOOKING_GUARD: Mutex<()> = Mutex::const_new(());

#[derive(Debug, Deserialize)]
struct PatientRecord {
    id: Uuid,
    patient_id: String,
}

pub struct AppointmentBookingService {
    supabase: Arc<SupabaseClient>,
    rules: SchedulingRuleService,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        let rules = SchedulingRuleService::new(Arc::clone(&supabase));

        Self { supabase, rules }
    }

    /// Book a new exam. Patient lookup, temporal check and conflict check run
    /// before the insert; the new appointment starts as SCHEDULED.
    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        info!(
            "Booking {} for patient {} at {}",
            request.exam_type, request.patient_id, request.appointment_date
        );

        let duration_minutes = request.duration_minutes.unwrap_or(30);
        if duration_minutes <= 0 {
            return Err(AppointmentError::ValidationError(
                "Appointment duration must be positive".to_string(),
            ));
        }
        if request.referring_physician.trim().is_empty() {
            return Err(AppointmentError::ValidationError(
                "Referring physician is required".to_string(),
            ));
        }

        let patient = self.resolve_patient(&request.patient_id, auth_token).await?;

        SchedulingRuleService::validate_not_past(request.appointment_date, Utc::now())?;

        let _guard = BOOKING_GUARD.lock().await;

        self.rules
            .check_daily_conflict(
                patient.id,
                &patient.patient_id,
                request.appointment_date,
                None,
                auth_token,
            )
            .await?;

        let appointment_data = json!({
            "patient_id": patient.id,
            "patient_ref": patient.patient_id,
            "appointment_date": request.appointment_date.to_rfc3339(),
            "exam_type": request.exam_type,
            "status": AppointmentStatus::Scheduled,
            "referring_physician": request.referring_physician,
            "clinical_indication": request.clinical_indication.unwrap_or_default(),
            "special_instructions": request.special_instructions,
            "duration_minutes": duration_minutes,
            "room_number": request.room_number,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(appointment_data),
                Some(return_representation()),
            )
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let appointment = Self::parse_single(result)?;

        info!("Appointment {} booked for {}", appointment.id, appointment.patient_ref);
        Ok(appointment)
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment {}", appointment_id);

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AppointmentError::NotFound);
        }

        Self::parse_single(result)
    }

    /// Update appointment fields. A status change is validated against the
    /// transition table; a reschedule re-runs the temporal and conflict checks
    /// with this appointment excluded.
    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Updating appointment {}", appointment_id);

        let current = self.get_appointment(appointment_id, auth_token).await?;

        if let Some(new_status) = request.status {
            SchedulingRuleService::validate_status_transition(current.status, new_status)?;
        }

        // Held across the conflict re-check and the write below
        let _guard = if request.appointment_date.is_some() {
            Some(BOOKING_GUARD.lock().await)
        } else {
            None
        };

        if let Some(new_date) = request.appointment_date {
            SchedulingRuleService::validate_not_past(new_date, Utc::now())?;
            self.rules
                .check_daily_conflict(
                    current.patient_id,
                    &current.patient_ref,
                    new_date,
                    Some(appointment_id),
                    auth_token,
                )
                .await?;
        }

        let mut update_data = serde_json::Map::new();

        if let Some(appointment_date) = request.appointment_date {
            update_data.insert(
                "appointment_date".to_string(),
                json!(appointment_date.to_rfc3339()),
            );
        }
        if let Some(exam_type) = request.exam_type {
            update_data.insert("exam_type".to_string(), json!(exam_type));
        }
        if let Some(status) = request.status {
            update_data.insert("status".to_string(), json!(status));
        }
        if let Some(referring_physician) = request.referring_physician {
            update_data.insert("referring_physician".to_string(), json!(referring_physician));
        }
        if let Some(clinical_indication) = request.clinical_indication {
            update_data.insert("clinical_indication".to_string(), json!(clinical_indication));
        }
        if let Some(special_instructions) = request.special_instructions {
            update_data.insert(
                "special_instructions".to_string(),
                json!(special_instructions),
            );
        }
        if let Some(duration_minutes) = request.duration_minutes {
            if duration_minutes <= 0 {
                return Err(AppointmentError::ValidationError(
                    "Appointment duration must be positive".to_string(),
                ));
            }
            update_data.insert("duration_minutes".to_string(), json!(duration_minutes));
        }
        if let Some(room_number) = request.room_number {
            update_data.insert("room_number".to_string(), json!(room_number));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        self.patch_appointment(appointment_id, Value::Object(update_data), auth_token)
            .await
    }

    /// Check a patient in for their exam. Only valid from CONFIRMED.
    pub async fn check_in_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(appointment_id, auth_token).await?;

        SchedulingRuleService::validate_check_in(current.status)?;

        let updated = self
            .set_status(appointment_id, AppointmentStatus::CheckedIn, auth_token)
            .await?;

        info!("Appointment {} checked in", appointment_id);
        Ok(updated)
    }

    /// Mark an exam as completed. Only valid from CHECKED_IN or IN_PROGRESS.
    pub async fn complete_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(appointment_id, auth_token).await?;

        SchedulingRuleService::validate_completion(current.status)?;

        let updated = self
            .set_status(appointment_id, AppointmentStatus::Completed, auth_token)
            .await?;

        info!("Appointment {} completed", appointment_id);
        Ok(updated)
    }

    /// Cancel an appointment. Cancellation is a status change, not a delete,
    /// and is valid from every state except COMPLETED.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(appointment_id, auth_token).await?;

        SchedulingRuleService::validate_cancellation(current.status)?;

        let updated = self
            .set_status(appointment_id, AppointmentStatus::Cancelled, auth_token)
            .await?;

        info!("Appointment {} cancelled", appointment_id);
        Ok(updated)
    }

    pub async fn search_appointments(
        &self,
        query: AppointmentSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Searching appointments with filters: {:?}", query);

        let mut query_parts = Vec::new();

        if let Some(patient_id) = query.patient_id {
            query_parts.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(patient_ref) = query.patient_ref {
            query_parts.push(format!("patient_ref=eq.{}", patient_ref));
        }
        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(exam_type) = query.exam_type {
            query_parts.push(format!("exam_type=eq.{}", exam_type));
        }
        if let Some(from_date) = query.from_date {
            query_parts.push(format!(
                "appointment_date=gte.{}",
                urlencoding::encode(&from_date.to_rfc3339())
            ));
        }
        if let Some(to_date) = query.to_date {
            query_parts.push(format!(
                "appointment_date=lte.{}",
                urlencoding::encode(&to_date.to_rfc3339())
            ));
        }

        query_parts.push("order=appointment_date.asc".to_string());

        if let Some(limit) = query.limit {
            query_parts.push(format!("limit={}", limit));
        }
        if let Some(offset) = query.offset {
            query_parts.push(format!("offset={}", offset));
        }

        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Self::parse_many(result)
    }

    /// Appointments falling on today's calendar date, any status.
    pub async fn today_appointments(
        &self,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let today = Utc::now().date_naive();
        let start_of_day = today.and_hms_opt(0, 0, 0).unwrap().and_utc();
        // Exclusive upper bound, same window as the conflict check
        let next_midnight = today.succ_opt().unwrap().and_hms_opt(0, 0, 0).unwrap().and_utc();

        let path = format!(
            "/rest/v1/appointments?appointment_date=gte.{}&appointment_date=lt.{}&order=appointment_date.asc",
            urlencoding::encode(&start_of_day.to_rfc3339()),
            urlencoding::encode(&next_midnight.to_rfc3339()),
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Self::parse_many(result)
    }

    /// Future SCHEDULED or CONFIRMED appointments within the next `days` days.
    pub async fn upcoming_appointments(
        &self,
        days: i64,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let now = Utc::now();
        let end = now + Duration::days(days);

        let path = format!(
            "/rest/v1/appointments?appointment_date=gte.{}&appointment_date=lte.{}&status=in.(SCHEDULED,CONFIRMED)&order=appointment_date.asc",
            urlencoding::encode(&now.to_rfc3339()),
            urlencoding::encode(&end.to_rfc3339()),
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Self::parse_many(result)
    }

    /// The patient's appointments, optionally narrowed to one status.
    pub async fn appointments_for_patient(
        &self,
        patient_ref: &str,
        status: Option<AppointmentStatus>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        // Resolve first so an unknown identifier reports NotFound rather than
        // an empty listing
        let patient = self.resolve_patient(patient_ref, auth_token).await?;

        self.search_appointments(
            AppointmentSearchQuery {
                patient_id: Some(patient.id),
                patient_ref: None,
                status,
                exam_type: None,
                from_date: None,
                to_date: None,
                limit: None,
                offset: None,
            },
            auth_token,
        )
        .await
    }

    /// Read-side aggregates for dashboards: totals, today's load, the upcoming
    /// pipeline and breakdowns by status and exam type.
    pub async fn get_appointment_stats(
        &self,
        auth_token: &str,
    ) -> Result<AppointmentStats, AppointmentError> {
        debug!("Calculating appointment statistics");

        let appointments = self
            .search_appointments(
                AppointmentSearchQuery {
                    patient_id: None,
                    patient_ref: None,
                    status: None,
                    exam_type: None,
                    from_date: None,
                    to_date: None,
                    limit: None,
                    offset: None,
                },
                auth_token,
            )
            .await?;

        let now = Utc::now();

        let total_appointments = appointments.len() as i32;
        let today = appointments.iter().filter(|apt| apt.is_today_at(now)).count() as i32;
        let upcoming = appointments
            .iter()
            .filter(|apt| {
                apt.appointment_date >= now
                    && matches!(
                        apt.status,
                        AppointmentStatus::Scheduled | AppointmentStatus::Confirmed
                    )
            })
            .count() as i32;

        let mut status_counts: HashMap<AppointmentStatus, i32> = HashMap::new();
        let mut exam_counts: HashMap<ExamType, i32> = HashMap::new();
        for appointment in &appointments {
            *status_counts.entry(appointment.status).or_insert(0) += 1;
            *exam_counts.entry(appointment.exam_type).or_insert(0) += 1;
        }

        let by_status = AppointmentStatus::ALL
            .iter()
            .map(|s| (*s, status_counts.get(s).copied().unwrap_or(0)))
            .collect();
        let by_exam_type = ExamType::ALL
            .iter()
            .map(|e| (*e, exam_counts.get(e).copied().unwrap_or(0)))
            .collect();

        Ok(AppointmentStats {
            total_appointments,
            today,
            upcoming,
            by_status,
            by_exam_type,
        })
    }

    // ==============================================================================
    // PRIVATE HELPERS
    // ==============================================================================

    async fn resolve_patient(
        &self,
        patient_ref: &str,
        auth_token: &str,
    ) -> Result<PatientRecord, AppointmentError> {
        let path = format!("/rest/v1/patients?patient_id=eq.{}", patient_ref);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or(AppointmentError::PatientNotFound)?;

        serde_json::from_value(row)
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse patient: {}", e)))
    }

    async fn set_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let update_data = json!({
            "status": status,
            "updated_at": Utc::now().to_rfc3339()
        });

        self.patch_appointment(appointment_id, update_data, auth_token)
            .await
    }

    async fn patch_appointment(
        &self,
        appointment_id: Uuid,
        update_data: Value,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(update_data),
                Some(return_representation()),
            )
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AppointmentError::NotFound);
        }

        Self::parse_single(result)
    }

    fn parse_single(result: Vec<Value>) -> Result<Appointment, AppointmentError> {
        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::DatabaseError("Write returned no row".to_string()))?;

        serde_json::from_value(row).map_err(|e| {
            AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e))
        })
    }

    fn parse_many(result: Vec<Value>) -> Result<Vec<Appointment>, AppointmentError> {
        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| {
                AppointmentError::DatabaseError(format!("Failed to parse appointments: {}", e))
            })
    }
}
