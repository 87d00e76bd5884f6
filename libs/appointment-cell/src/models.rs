use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

/// Imaging appointment. `patient_id` is the patient row reference;
/// `patient_ref` carries the clinic identifier (PT0001) for display and
/// cross-system interop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_ref: String,
    pub appointment_date: DateTime<Utc>,
    pub exam_type: ExamType,
    pub status: AppointmentStatus,
    pub referring_physician: String,
    #[serde(default)]
    pub clinical_indication: String,
    pub special_instructions: Option<String>,
    pub duration_minutes: i32,
    pub room_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn is_past_at(&self, now: DateTime<Utc>) -> bool {
        self.appointment_date < now
    }

    pub fn is_past(&self) -> bool {
        self.is_past_at(Utc::now())
    }

    pub fn is_today_at(&self, now: DateTime<Utc>) -> bool {
        self.appointment_date.date_naive() == now.date_naive()
    }

    pub fn is_today(&self) -> bool {
        self.is_today_at(Utc::now())
    }

    pub fn calendar_date(&self) -> NaiveDate {
        self.appointment_date.date_naive()
    }
}

/// Imaging exam types. The serialized tags are a fixed wire contract shared
/// with the RIS integrations; human-readable labels come from
/// `display_label`, never from the tag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExamType {
    MriBrain,
    MriSpine,
    MriKnee,
    MriShoulder,
    MriAbdomen,
    CtHead,
    CtChest,
    CtAbdomen,
    XrayChest,
    XraySpine,
    Ultrasound,
}

impl ExamType {
    pub const ALL: [ExamType; 11] = [
        ExamType::MriBrain,
        ExamType::MriSpine,
        ExamType::MriKnee,
        ExamType::MriShoulder,
        ExamType::MriAbdomen,
        ExamType::CtHead,
        ExamType::CtChest,
        ExamType::CtAbdomen,
        ExamType::XrayChest,
        ExamType::XraySpine,
        ExamType::Ultrasound,
    ];

    pub fn display_label(&self) -> &'static str {
        match self {
            ExamType::MriBrain => "MRI Brain",
            ExamType::MriSpine => "MRI Spine",
            ExamType::MriKnee => "MRI Knee",
            ExamType::MriShoulder => "MRI Shoulder",
            ExamType::MriAbdomen => "MRI Abdomen",
            ExamType::CtHead => "CT Head",
            ExamType::CtChest => "CT Chest",
            ExamType::CtAbdomen => "CT Abdomen",
            ExamType::XrayChest => "X-Ray Chest",
            ExamType::XraySpine => "X-Ray Spine",
            ExamType::Ultrasound => "Ultrasound",
        }
    }
}

impl fmt::Display for ExamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Wire tag, used verbatim in PostgREST filters
        match self {
            ExamType::MriBrain => write!(f, "MRI_BRAIN"),
            ExamType::MriSpine => write!(f, "MRI_SPINE"),
            ExamType::MriKnee => write!(f, "MRI_KNEE"),
            ExamType::MriShoulder => write!(f, "MRI_SHOULDER"),
            ExamType::MriAbdomen => write!(f, "MRI_ABDOMEN"),
            ExamType::CtHead => write!(f, "CT_HEAD"),
            ExamType::CtChest => write!(f, "CT_CHEST"),
            ExamType::CtAbdomen => write!(f, "CT_ABDOMEN"),
            ExamType::XrayChest => write!(f, "XRAY_CHEST"),
            ExamType::XraySpine => write!(f, "XRAY_SPINE"),
            ExamType::Ultrasound => write!(f, "ULTRASOUND"),
        }
    }
}

/// Appointment lifecycle status. Tags are a fixed wire contract.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    CheckedIn,
    InProgress,
    Completed,
    NoShow,
    Cancelled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 7] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::CheckedIn,
        AppointmentStatus::InProgress,
        AppointmentStatus::Completed,
        AppointmentStatus::NoShow,
        AppointmentStatus::Cancelled,
    ];

    /// Statuses that hold a booking slot: at most one of these may exist per
    /// patient per calendar date.
    pub const ACTIVE: [AppointmentStatus; 3] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::CheckedIn,
    ];

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::NoShow | AppointmentStatus::Cancelled
        )
    }

    pub fn display_label(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "Scheduled",
            AppointmentStatus::Confirmed => "Confirmed",
            AppointmentStatus::CheckedIn => "Checked In",
            AppointmentStatus::InProgress => "In Progress",
            AppointmentStatus::Completed => "Completed",
            AppointmentStatus::NoShow => "No Show",
            AppointmentStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "SCHEDULED"),
            AppointmentStatus::Confirmed => write!(f, "CONFIRMED"),
            AppointmentStatus::CheckedIn => write!(f, "CHECKED_IN"),
            AppointmentStatus::InProgress => write!(f, "IN_PROGRESS"),
            AppointmentStatus::Completed => write!(f, "COMPLETED"),
            AppointmentStatus::NoShow => write!(f, "NO_SHOW"),
            AppointmentStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    /// Clinic identifier of the patient (e.g. PT0001).
    pub patient_id: String,
    pub appointment_date: DateTime<Utc>,
    pub exam_type: ExamType,
    pub referring_physician: String,
    pub clinical_indication: Option<String>,
    pub special_instructions: Option<String>,
    pub duration_minutes: Option<i32>,
    pub room_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub appointment_date: Option<DateTime<Utc>>,
    pub exam_type: Option<ExamType>,
    pub status: Option<AppointmentStatus>,
    pub referring_physician: Option<String>,
    pub clinical_indication: Option<String>,
    pub special_instructions: Option<String>,
    pub duration_minutes: Option<i32>,
    pub room_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentSearchQuery {
    pub patient_id: Option<Uuid>,
    pub patient_ref: Option<String>,
    pub status: Option<AppointmentStatus>,
    pub exam_type: Option<ExamType>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

// ==============================================================================
// STATISTICS MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentStats {
    pub total_appointments: i32,
    pub today: i32,
    pub upcoming: i32,
    pub by_status: Vec<(AppointmentStatus, i32)>,
    pub by_exam_type: Vec<(ExamType, i32)>,
}

// ==============================================================================
// SAMPLE DATA MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SampleDataRequest {
    pub patients: Option<usize>,
    pub appointments: Option<usize>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleDataReport {
    pub patients_created: usize,
    pub appointments_created: usize,
    pub seed: u64,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Invalid appointment time: {0}")]
    InvalidTime(String),

    #[error("Patient {patient_ref} already has an appointment on {date}")]
    DoubleBooked {
        patient_ref: String,
        date: NaiveDate,
    },

    #[error("Cannot transition appointment from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<AppointmentError> for AppError {
    fn from(e: AppointmentError) -> Self {
        match e {
            AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
            AppointmentError::PatientNotFound => {
                AppError::NotFound("Patient not found".to_string())
            }
            AppointmentError::InvalidTime(msg) => AppError::Validation(msg),
            AppointmentError::DoubleBooked { .. } => AppError::Conflict(e.to_string()),
            AppointmentError::InvalidStatusTransition { .. } => AppError::BadRequest(e.to_string()),
            AppointmentError::ValidationError(msg) => AppError::Validation(msg),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
