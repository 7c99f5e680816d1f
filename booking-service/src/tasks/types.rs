use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{PaymentDetails, TimePreference};

/// Something the user did on a screen. Sent as JSON tagged by `action`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScreenAction {
    Login {
        name: String,
        email: String,
        password: String,
    },
    SelectTest {
        test_id: String,
    },
    SelectDoctor {
        doctor_id: String,
    },
    /// Date plus one of the offered slots, e.g. "09:00 AM"
    Schedule {
        date: NaiveDate,
        time: String,
    },
    ClearDate,
    SuggestTime {
        #[serde(default)]
        preference: TimePreference,
    },
    /// Applies the last suggestion to `date`, or to today when absent
    AcceptSuggestion {
        #[serde(default)]
        date: Option<NaiveDate>,
    },
    Pay(PaymentDetails),
    Back,
    NewBooking,
}

impl ScreenAction {
    pub fn name(&self) -> &'static str {
        match self {
            ScreenAction::Login { .. } => "login",
            ScreenAction::SelectTest { .. } => "select_test",
            ScreenAction::SelectDoctor { .. } => "select_doctor",
            ScreenAction::Schedule { .. } => "schedule",
            ScreenAction::ClearDate => "clear_date",
            ScreenAction::SuggestTime { .. } => "suggest_time",
            ScreenAction::AcceptSuggestion { .. } => "accept_suggestion",
            ScreenAction::Pay(_) => "pay",
            ScreenAction::Back => "back",
            ScreenAction::NewBooking => "new_booking",
        }
    }
}

pub mod session_keys {
    pub const SESSION_ID: &str = "session_id";
    /// The session's `BookingState`
    pub const BOOKING: &str = "booking";
    /// One-shot `ScreenAction` consumed by the visited screen
    pub const SCREEN_ACTION: &str = "screen_action";
    /// Last `Notification` produced by a screen
    pub const NOTIFICATION: &str = "notification";
    /// Last `TimeSuggestion` shown on the schedule screen
    pub const TIME_SUGGESTION: &str = "time_suggestion";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn actions_are_tagged_by_name() {
        let action: ScreenAction = serde_json::from_value(json!({
            "action": "schedule",
            "date": "2030-01-07",
            "time": "09:00 AM"
        }))
        .unwrap();
        assert_eq!(action.name(), "schedule");

        let pay: ScreenAction = serde_json::from_value(json!({
            "action": "pay",
            "card_name": "Ada Lovelace",
            "card_number": "4111111111111111",
            "expiry_date": "09/26",
            "cvc": "123"
        }))
        .unwrap();
        assert!(matches!(pay, ScreenAction::Pay(details) if details.cvc == "123"));

        let suggest: ScreenAction =
            serde_json::from_value(json!({ "action": "suggest_time" })).unwrap();
        assert!(matches!(
            suggest,
            ScreenAction::SuggestTime {
                preference: TimePreference::Any
            }
        ));
    }
}
