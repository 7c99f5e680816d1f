use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use serde::Serialize;
use std::{fmt, sync::LazyLock};

use crate::{error::BookingError, models::PaymentDetails};

/// Appointment times offered on the schedule screen.
pub const TIME_SLOTS: [&str; 8] = [
    "09:00 AM", "10:00 AM", "11:00 AM", "12:00 PM", "01:00 PM", "02:00 PM", "03:00 PM", "04:00 PM",
];

const SLOT_FORMAT: &str = "%I:%M %p";

static CARD_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{16}$").expect("Invalid regex"));
static EXPIRY_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(0[1-9]|1[0-2])/\d{2}$").expect("Invalid regex"));
static CVC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{3,4}$").expect("Invalid regex"));
static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Invalid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

/// Every problem found in one form submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormErrors(pub Vec<FieldError>);

impl FormErrors {
    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.0.iter().map(|e| e.message).collect();
        f.write_str(&messages.join(" "))
    }
}

#[derive(Default)]
struct FormCheck(Vec<FieldError>);

impl FormCheck {
    fn check(&mut self, ok: bool, field: &'static str, message: &'static str) {
        if !ok {
            self.0.push(FieldError { field, message });
        }
    }

    fn finish(self) -> Result<(), BookingError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(BookingError::InvalidForm(FormErrors(self.0)))
        }
    }
}

/// Checks the payment form and returns the details with the card number's
/// whitespace removed.
pub fn validate_payment(form: PaymentDetails) -> Result<PaymentDetails, BookingError> {
    let card_number: String = form
        .card_number
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let mut check = FormCheck::default();
    check.check(
        form.card_name.trim().chars().count() >= 2,
        "card_name",
        "Name is too short.",
    );
    check.check(
        CARD_NUMBER.is_match(&card_number),
        "card_number",
        "Card number must be 16 digits.",
    );
    check.check(
        EXPIRY_DATE.is_match(&form.expiry_date),
        "expiry_date",
        "Invalid format (MM/YY).",
    );
    check.check(CVC.is_match(&form.cvc), "cvc", "Invalid CVC.");
    check.finish()?;

    Ok(PaymentDetails {
        card_name: form.card_name.trim().to_string(),
        card_number,
        ..form
    })
}

pub fn validate_login(name: &str, email: &str, password: &str) -> Result<(), BookingError> {
    let mut check = FormCheck::default();
    check.check(
        name.trim().chars().count() >= 2,
        "name",
        "Please enter your full name.",
    );
    check.check(EMAIL.is_match(email), "email", "Invalid email address.");
    check.check(
        password.chars().count() >= 6,
        "password",
        "Password must be at least 6 characters.",
    );
    check.finish()
}

/// Parses one of [`TIME_SLOTS`]. Times outside the offered slots are rejected.
pub fn parse_time_slot(slot: &str) -> Result<NaiveTime, BookingError> {
    let time = NaiveTime::parse_from_str(slot.trim(), SLOT_FORMAT)
        .map_err(|_| BookingError::InvalidTimeSlot(slot.to_string()))?;
    ensure_offered_slot(time)
}

/// Accepts `time` only if it is one of [`TIME_SLOTS`].
pub fn ensure_offered_slot(time: NaiveTime) -> Result<NaiveTime, BookingError> {
    let slot = format_time_slot(time);
    if TIME_SLOTS.contains(&slot.as_str()) {
        Ok(time)
    } else {
        Err(BookingError::InvalidTimeSlot(slot))
    }
}

pub fn format_time_slot(time: NaiveTime) -> String {
    time.format(SLOT_FORMAT).to_string()
}

pub fn ensure_not_past(date: NaiveDate, today: NaiveDate) -> Result<(), BookingError> {
    if date < today {
        Err(BookingError::DateInPast(date))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(card_number: &str, expiry_date: &str, cvc: &str) -> PaymentDetails {
        PaymentDetails {
            card_name: "Ada Lovelace".to_string(),
            card_number: card_number.to_string(),
            expiry_date: expiry_date.to_string(),
            cvc: cvc.to_string(),
        }
    }

    fn field_errors(result: Result<PaymentDetails, BookingError>) -> FormErrors {
        match result {
            Err(BookingError::InvalidForm(errors)) => errors,
            other => panic!("expected form errors, got {other:?}"),
        }
    }

    #[test]
    fn accepts_a_valid_card() {
        let details = validate_payment(form("4111 1111 1111 1111", "09/26", "123")).unwrap();
        assert_eq!(details.card_number, "4111111111111111");
    }

    #[test]
    fn rejects_short_card_numbers() {
        let errors = field_errors(validate_payment(form("123", "09/26", "123")));
        assert!(errors.has("card_number"));
        assert_eq!(errors.0.len(), 1);
    }

    #[test]
    fn rejects_month_thirteen() {
        let errors = field_errors(validate_payment(form("4111111111111111", "13/26", "123")));
        assert!(errors.has("expiry_date"));
    }

    #[test]
    fn cvc_is_three_or_four_digits() {
        assert!(validate_payment(form("4111111111111111", "09/26", "1234")).is_ok());
        let errors = field_errors(validate_payment(form("4111111111111111", "09/26", "12")));
        assert!(errors.has("cvc"));
        let errors = field_errors(validate_payment(form("4111111111111111", "09/26", "12a")));
        assert!(errors.has("cvc"));
    }

    #[test]
    fn reports_every_bad_field() {
        let mut bad = form("1", "1/26", "x");
        bad.card_name = "A".to_string();
        let errors = field_errors(validate_payment(bad));
        assert_eq!(errors.0.len(), 4);
    }

    #[test]
    fn login_form_rules() {
        assert!(validate_login("Ada Lovelace", "ada@example.com", "secret1").is_ok());
        match validate_login("A", "not-an-email", "123") {
            Err(BookingError::InvalidForm(errors)) => {
                assert!(errors.has("name"));
                assert!(errors.has("email"));
                assert!(errors.has("password"));
            }
            other => panic!("expected form errors, got {other:?}"),
        }
    }

    #[test]
    fn time_slots_parse_to_clock_times() {
        assert_eq!(
            parse_time_slot("09:00 AM").unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap()
        );
        assert_eq!(
            parse_time_slot("12:00 PM").unwrap(),
            NaiveTime::from_hms_opt(12, 0, 0).unwrap()
        );
        assert_eq!(
            parse_time_slot("01:00 PM").unwrap(),
            NaiveTime::from_hms_opt(13, 0, 0).unwrap()
        );
        assert!(matches!(
            parse_time_slot("05:00 PM"),
            Err(BookingError::InvalidTimeSlot(_))
        ));
        assert!(parse_time_slot("noon").is_err());
    }

    #[test]
    fn every_offered_slot_is_accepted() {
        for slot in TIME_SLOTS {
            let time = parse_time_slot(slot).unwrap();
            assert_eq!(format_time_slot(time), slot);
        }
    }

    #[test]
    fn only_offered_clock_times_pass() {
        let three_pm = NaiveTime::from_hms_opt(15, 0, 0).unwrap();
        assert_eq!(ensure_offered_slot(three_pm).unwrap(), three_pm);

        let half_past = NaiveTime::from_hms_opt(15, 30, 0).unwrap();
        match ensure_offered_slot(half_past) {
            Err(BookingError::InvalidTimeSlot(slot)) => assert_eq!(slot, "03:30 PM"),
            other => panic!("expected an invalid slot, got {other:?}"),
        }
        assert!(ensure_offered_slot(NaiveTime::from_hms_opt(3, 0, 0).unwrap()).is_err());
    }

    #[test]
    fn past_dates_are_rejected() {
        let today = NaiveDate::from_ymd_opt(2030, 5, 10).unwrap();
        assert!(ensure_not_past(today, today).is_ok());
        assert!(ensure_not_past(today.pred_opt().unwrap(), today).is_err());
    }
}
