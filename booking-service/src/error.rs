use chrono::NaiveDate;
use thiserror::Error;
use wizard_flow::GraphError;

use crate::{auth::AuthError, models::Notification, state::Step, validation::FormErrors};

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("{step} must be completed first")]
    MissingPrerequisite { step: Step },

    #[error("appointment {0} is already confirmed; start a new booking to change it")]
    AlreadyConfirmed(String),

    #[error("unknown test: {0}")]
    UnknownTest(String),

    #[error("unknown doctor: {0}")]
    UnknownDoctor(String),

    #[error("doctor {doctor_id} does not perform test {test_id}")]
    DoctorNotOffered { doctor_id: String, test_id: String },

    #[error("{0}")]
    InvalidForm(FormErrors),

    #[error("'{0}' is not one of the offered time slots")]
    InvalidTimeSlot(String),

    #[error("{0} is in the past")]
    DateInPast(NaiveDate),

    #[error("could not load reference data: {0}")]
    Catalog(String),

    #[error("could not save the appointment: {0}")]
    Store(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("time suggestion failed: {0}")]
    SuggestionFailed(String),

    #[error("could not read the suggested time: {0}")]
    SuggestionUnparseable(String),

    #[error("'{action}' is not available on the {step} screen")]
    ActionNotAllowed { action: String, step: Step },
}

impl BookingError {
    /// The message a screen shows when an operation is abandoned.
    pub fn notification(&self) -> Notification {
        let title = match self {
            BookingError::MissingPrerequisite { .. } => "Step Incomplete",
            BookingError::AlreadyConfirmed(_) => "Booking Locked",
            BookingError::UnknownTest(_)
            | BookingError::UnknownDoctor(_)
            | BookingError::DoctorNotOffered { .. } => "Invalid Selection",
            BookingError::InvalidForm(_) => "Invalid Details",
            BookingError::InvalidTimeSlot(_) | BookingError::DateInPast(_) => "Invalid Time",
            BookingError::Catalog(_) => "Error",
            BookingError::Store(_) => "Booking Failed",
            BookingError::Auth(AuthError::Registration(_)) => "Registration Failed",
            BookingError::Auth(_) => "Login Failed",
            BookingError::SuggestionFailed(_) => "Suggestion Failed",
            BookingError::SuggestionUnparseable(_) => "Error Parsing Time",
            BookingError::ActionNotAllowed { .. } => "Unsupported Action",
        };

        let description = match self {
            BookingError::Store(_) => {
                "Could not save your appointment. Please try again.".to_string()
            }
            BookingError::SuggestionFailed(_) => {
                "Could not get an AI-powered time suggestion. Please select a time manually."
                    .to_string()
            }
            other => other.to_string(),
        };

        Notification::error(title, description)
    }
}

impl From<BookingError> for GraphError {
    fn from(e: BookingError) -> Self {
        GraphError::TaskExecutionFailed(e.to_string())
    }
}
