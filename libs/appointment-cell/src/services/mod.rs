pub mod booking;
pub mod sample_data;
pub mod scheduling;

pub use booking::AppointmentBookingService;
pub use sample_data::SampleDataService;
pub use scheduling::SchedulingRuleService;
