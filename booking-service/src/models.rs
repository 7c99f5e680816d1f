use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::tasks::types::ScreenAction;

/// A diagnostic test offered by the lab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalTest {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: String,
    pub name: String,
    pub image: String,
    /// Free text, e.g. "Monday-Friday, 9:00 AM - 5:00 PM"
    pub availability: String,
    /// Ids of the tests this doctor performs
    pub specialties: Vec<String>,
}

impl Doctor {
    pub fn performs(&self, test_id: &str) -> bool {
        self.specialties.iter().any(|id| id == test_id)
    }
}

/// The authenticated identity carried by a booking session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub uid: String,
    pub display_name: String,
    pub email: Option<String>,
}

/// Card details as entered on the payment screen. Nothing is charged.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub card_name: String,
    pub card_number: String,
    pub expiry_date: String,
    pub cvc: String,
}

impl PaymentDetails {
    /// Last four digits, e.g. "•••• 1111".
    pub fn masked_card_number(&self) -> String {
        let digits: Vec<char> = self.card_number.chars().filter(char::is_ascii_digit).collect();
        let last_four: String = digits[digits.len().saturating_sub(4)..].iter().collect();
        format!("•••• {last_four}")
    }
}

impl fmt::Debug for PaymentDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentDetails")
            .field("card_name", &self.card_name)
            .field("card_number", &self.masked_card_number())
            .field("expiry_date", &self.expiry_date)
            .field("cvc", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimePreference {
    Morning,
    Afternoon,
    #[default]
    Any,
}

impl fmt::Display for TimePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TimePreference::Morning => "morning",
            TimePreference::Afternoon => "afternoon",
            TimePreference::Any => "any",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Confirmed,
}

/// The document written once, when payment is confirmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentRecord {
    pub id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub test_id: String,
    pub test_name: String,
    pub doctor_id: String,
    pub doctor_name: String,
    pub appointment_date: NaiveDateTime,
    pub price: f64,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}

/// What the receipt screen shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Receipt {
    pub appointment_id: String,
    pub patient_name: String,
    pub test_name: String,
    pub doctor_name: String,
    pub appointment_date: NaiveDateTime,
    pub price: f64,
    pub card: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Error,
}

/// A toast-style message produced by a screen for the client to display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Structured answer from the time-suggestion service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSuggestion {
    /// 24-hour clock time, e.g. "14:30"
    pub suggested_time: String,
    pub reasoning: String,
}

// HTTP payloads

#[derive(Debug, Default, Deserialize)]
pub struct VisitRequest {
    #[serde(default)]
    pub action: Option<ScreenAction>,
}

#[derive(Debug, Serialize)]
pub struct StepResponse {
    pub session_id: String,
    pub current_step: String,
    pub status: String,
    pub response: Option<String>,
    pub redirected_from: Option<String>,
    pub notification: Option<Notification>,
    pub booking: BookingView,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub current_step: String,
    pub status_message: Option<String>,
    pub booking: BookingView,
    pub suggestion: Option<TimeSuggestion>,
}

/// Client-facing snapshot of a booking. Card details never leave the server.
#[derive(Debug, Default, Serialize)]
pub struct BookingView {
    pub patient: Option<Patient>,
    pub selected_test: Option<MedicalTest>,
    pub selected_doctor: Option<Doctor>,
    pub appointment_date: Option<NaiveDateTime>,
    pub appointment_day: Option<NaiveDate>,
    pub card: Option<String>,
    pub appointment_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(number: &str) -> PaymentDetails {
        PaymentDetails {
            card_name: "Ada Lovelace".to_string(),
            card_number: number.to_string(),
            expiry_date: "09/26".to_string(),
            cvc: "123".to_string(),
        }
    }

    #[test]
    fn debug_output_hides_card_data() {
        let output = format!("{:?}", card("4111 1111 1111 1111"));
        assert!(output.contains("•••• 1111"));
        assert!(!output.contains("4111"));
        assert!(!output.contains("123"));
    }

    #[test]
    fn masking_short_numbers_does_not_panic() {
        assert_eq!(card("12").masked_card_number(), "•••• 12");
    }

    #[test]
    fn appointment_record_uses_document_field_names() {
        let record = AppointmentRecord {
            id: "ABC123XYZ".to_string(),
            patient_id: "u1".to_string(),
            patient_name: "Ada".to_string(),
            test_id: "t1".to_string(),
            test_name: "Comprehensive Blood Panel".to_string(),
            doctor_id: "d1".to_string(),
            doctor_name: "Dr. Evelyn Reed".to_string(),
            appointment_date: NaiveDate::from_ymd_opt(2030, 1, 7)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            price: 150.0,
            status: AppointmentStatus::Confirmed,
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["patientId"], "u1");
        assert_eq!(json["doctorName"], "Dr. Evelyn Reed");
        assert_eq!(json["status"], "confirmed");
        assert!(json.get("createdAt").is_some());
    }
}
