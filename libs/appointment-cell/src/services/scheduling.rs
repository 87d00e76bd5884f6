use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, AppointmentError, AppointmentStatus};

/// Scheduling policy for the clinic: one active appointment per patient per
/// calendar date, no bookings in the past, and a constrained status state
/// machine. Every check is a pure function of the state fetched at validation
/// time; a failed check is reported to the caller, never corrected silently.
pub struct SchedulingRuleService {
    supabase: Arc<SupabaseClient>,
}

/// True when any *other* appointment in `existing` holds an active status on
/// the candidate's calendar date. Date granularity, not time-slot overlap.
pub fn has_daily_conflict(
    candidate_date: DateTime<Utc>,
    existing: &[Appointment],
    exclude_appointment_id: Option<Uuid>,
) -> bool {
    let candidate_day = candidate_date.date_naive();

    existing.iter().any(|apt| {
        apt.status.is_active()
            && apt.calendar_date() == candidate_day
            && Some(apt.id) != exclude_appointment_id
    })
}

impl SchedulingRuleService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Appointments must not be scheduled strictly before `now`.
    pub fn validate_not_past(
        appointment_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        if appointment_date < now {
            return Err(AppointmentError::InvalidTime(
                "Cannot schedule appointments in the past".to_string(),
            ));
        }
        Ok(())
    }

    /// Reject the candidate slot when the patient already holds an active
    /// appointment on the same calendar date. `exclude_appointment_id` lets
    /// updates skip the row being rescheduled.
    pub async fn check_daily_conflict(
        &self,
        patient_id: Uuid,
        patient_ref: &str,
        appointment_date: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        debug!(
            "Checking daily conflict for patient {} on {}",
            patient_ref,
            appointment_date.date_naive()
        );

        let existing = self
            .active_appointments_on_date(patient_id, appointment_date, auth_token)
            .await?;

        if has_daily_conflict(appointment_date, &existing, exclude_appointment_id) {
            warn!(
                "Double-booking rejected: patient {} already active on {}",
                patient_ref,
                appointment_date.date_naive()
            );
            return Err(AppointmentError::DoubleBooked {
                patient_ref: patient_ref.to_string(),
                date: appointment_date.date_naive(),
            });
        }

        Ok(())
    }

    /// Valid next statuses for a generic status update. Terminal states admit
    /// no transitions.
    pub fn valid_transitions(current: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current {
            AppointmentStatus::Scheduled => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::CheckedIn,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ],
            AppointmentStatus::CheckedIn => vec![
                AppointmentStatus::InProgress,
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::InProgress => {
                vec![AppointmentStatus::Completed, AppointmentStatus::Cancelled]
            }
            AppointmentStatus::Completed
            | AppointmentStatus::NoShow
            | AppointmentStatus::Cancelled => vec![],
        }
    }

    pub fn validate_status_transition(
        current: AppointmentStatus,
        new: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        // An update that echoes the current status back is a no-op, not a
        // transition; read-modify-write clients rely on this.
        if new == current {
            return Ok(());
        }
        if !Self::valid_transitions(current).contains(&new) {
            warn!("Invalid status transition attempted: {} -> {}", current, new);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current,
                to: new,
            });
        }
        Ok(())
    }

    /// Check-in is only valid for confirmed appointments.
    pub fn validate_check_in(current: AppointmentStatus) -> Result<(), AppointmentError> {
        if current != AppointmentStatus::Confirmed {
            return Err(AppointmentError::InvalidStatusTransition {
                from: current,
                to: AppointmentStatus::CheckedIn,
            });
        }
        Ok(())
    }

    /// Completion is only valid once the patient is checked in or the exam is
    /// in progress.
    pub fn validate_completion(current: AppointmentStatus) -> Result<(), AppointmentError> {
        if !matches!(
            current,
            AppointmentStatus::CheckedIn | AppointmentStatus::InProgress
        ) {
            return Err(AppointmentError::InvalidStatusTransition {
                from: current,
                to: AppointmentStatus::Completed,
            });
        }
        Ok(())
    }

    /// Cancellation is allowed from every state except COMPLETED.
    pub fn validate_cancellation(current: AppointmentStatus) -> Result<(), AppointmentError> {
        if current == AppointmentStatus::Completed {
            return Err(AppointmentError::InvalidStatusTransition {
                from: current,
                to: AppointmentStatus::Cancelled,
            });
        }
        Ok(())
    }

    async fn active_appointments_on_date(
        &self,
        patient_id: Uuid,
        appointment_date: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let day = appointment_date.date_naive();
        let start_of_day = day.and_hms_opt(0, 0, 0).unwrap().and_utc();
        // Exclusive upper bound so sub-second timestamps near midnight are
        // not missed
        let next_midnight = day.succ_opt().unwrap().and_hms_opt(0, 0, 0).unwrap().and_utc();

        let active_set = AppointmentStatus::ACTIVE
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&appointment_date=gte.{}&appointment_date=lt.{}&status=in.({})",
            patient_id,
            urlencoding::encode(&start_of_day.to_rfc3339()),
            urlencoding::encode(&next_midnight.to_rfc3339()),
            active_set,
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| {
                AppointmentError::DatabaseError(format!("Failed to parse appointments: {}", e))
            })
    }
}
