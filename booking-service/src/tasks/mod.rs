// Booking wizard screens, one task per step
pub mod login;
pub mod test_selection;
pub mod doctor_selection;
pub mod schedule;
pub mod payment;
pub mod receipt;

// Shared modules
pub mod types;
pub mod utils;

// Re-export task implementations
pub use doctor_selection::DoctorSelectionTask;
pub use login::LoginTask;
pub use payment::PaymentTask;
pub use receipt::ReceiptTask;
pub use schedule::ScheduleTask;
pub use test_selection::TestSelectionTask;

// Re-export session keys
pub use types::session_keys;
