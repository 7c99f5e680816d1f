//! Booking session state and the step guards built on top of it.
//!
//! `BookingState` is owned by one session and is the only thing the screens
//! write to. Each setter checks the step ordering itself, so a screen cannot
//! leave the session in a state the guards would not accept.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::{
    error::BookingError,
    models::{BookingView, Doctor, MedicalTest, Patient, PaymentDetails, Receipt},
};

/// The screens of the wizard, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    Login,
    TestSelection,
    DoctorSelection,
    Schedule,
    Payment,
    Receipt,
}

impl Step {
    pub const ALL: [Step; 6] = [
        Step::Login,
        Step::TestSelection,
        Step::DoctorSelection,
        Step::Schedule,
        Step::Payment,
        Step::Receipt,
    ];

    /// Task id and URL segment of the screen.
    pub fn id(self) -> &'static str {
        match self {
            Step::Login => "login",
            Step::TestSelection => "test-selection",
            Step::DoctorSelection => "doctor-selection",
            Step::Schedule => "schedule",
            Step::Payment => "payment",
            Step::Receipt => "receipt",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Step::Login => "Log In",
            Step::TestSelection => "Select Test",
            Step::DoctorSelection => "Select Doctor",
            Step::Schedule => "Schedule",
            Step::Payment => "Payment",
            Step::Receipt => "Confirmation",
        }
    }

    pub fn previous(self) -> Option<Step> {
        let index = Step::ALL.iter().position(|step| *step == self)?;
        index.checked_sub(1).map(|i| Step::ALL[i])
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Step::ALL
            .into_iter()
            .find(|step| step.id() == s)
            .ok_or_else(|| format!("unknown step: {s}"))
    }
}

/// Progress of one booking attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookingState {
    patient: Option<Patient>,
    selected_test: Option<MedicalTest>,
    selected_doctor: Option<Doctor>,
    appointment_date: Option<NaiveDateTime>,
    payment_details: Option<PaymentDetails>,
    appointment_id: Option<String>,
}

impl BookingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn patient(&self) -> Option<&Patient> {
        self.patient.as_ref()
    }

    pub fn selected_test(&self) -> Option<&MedicalTest> {
        self.selected_test.as_ref()
    }

    pub fn selected_doctor(&self) -> Option<&Doctor> {
        self.selected_doctor.as_ref()
    }

    pub fn appointment_date(&self) -> Option<NaiveDateTime> {
        self.appointment_date
    }

    pub fn payment_details(&self) -> Option<&PaymentDetails> {
        self.payment_details.as_ref()
    }

    pub fn appointment_id(&self) -> Option<&str> {
        self.appointment_id.as_deref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.patient.is_some()
    }

    /// Starts a fresh session for `patient`, dropping any earlier booking data.
    pub fn login(&mut self, patient: Patient) {
        *self = Self {
            patient: Some(patient),
            ..Self::default()
        };
    }

    pub fn logout(&mut self) {
        *self = Self::default();
    }

    /// Choosing a different test clears everything chosen after it.
    pub fn set_test(&mut self, test: MedicalTest) -> Result<(), BookingError> {
        self.ensure_unlocked()?;
        self.require(Step::Login, self.is_logged_in())?;

        if self.selected_test.as_ref().map(|t| t.id.as_str()) != Some(test.id.as_str()) {
            self.selected_doctor = None;
            self.appointment_date = None;
            self.payment_details = None;
        }
        self.selected_test = Some(test);
        Ok(())
    }

    /// Stores the doctor as given. Callers only offer doctors who perform the
    /// selected test; that is not re-checked here.
    pub fn set_doctor(&mut self, doctor: Doctor) -> Result<(), BookingError> {
        self.ensure_unlocked()?;
        self.require(Step::TestSelection, self.selected_test.is_some())?;

        if self.selected_doctor.as_ref().map(|d| d.id.as_str()) != Some(doctor.id.as_str()) {
            self.appointment_date = None;
            self.payment_details = None;
        }
        self.selected_doctor = Some(doctor);
        Ok(())
    }

    /// `None` clears the date.
    pub fn set_appointment_date(&mut self, date: Option<NaiveDateTime>) -> Result<(), BookingError> {
        self.ensure_unlocked()?;
        self.require(Step::DoctorSelection, self.selected_doctor.is_some())?;

        if self.appointment_date != date {
            self.payment_details = None;
        }
        self.appointment_date = date;
        Ok(())
    }

    pub fn set_payment_details(&mut self, details: PaymentDetails) -> Result<(), BookingError> {
        self.ensure_unlocked()?;
        self.require(Step::Schedule, self.appointment_date.is_some())?;

        self.payment_details = Some(details);
        Ok(())
    }

    /// The confirmation code can be set once per booking.
    pub fn set_appointment_id(&mut self, id: impl Into<String>) -> Result<(), BookingError> {
        self.ensure_unlocked()?;
        self.require(Step::Payment, self.payment_details.is_some())?;

        self.appointment_id = Some(id.into());
        Ok(())
    }

    /// Clears the booking but keeps the patient logged in.
    pub fn reset_booking(&mut self) {
        self.selected_test = None;
        self.selected_doctor = None;
        self.appointment_date = None;
        self.payment_details = None;
        self.appointment_id = None;
    }

    /// The first screen whose output is still missing.
    pub fn resume_step(&self) -> Step {
        if !self.is_logged_in() {
            Step::Login
        } else if self.selected_test.is_none() {
            Step::TestSelection
        } else if self.selected_doctor.is_none() {
            Step::DoctorSelection
        } else if self.appointment_date.is_none() {
            Step::Schedule
        } else if self.appointment_id.is_none() {
            Step::Payment
        } else {
            Step::Receipt
        }
    }

    /// Where a visit to `step` must be sent instead, if anywhere.
    pub fn guard(&self, step: Step) -> Option<Step> {
        let resume = self.resume_step();
        (resume < step).then_some(resume)
    }

    pub fn receipt(&self) -> Option<Receipt> {
        let patient = self.patient.as_ref()?;
        let test = self.selected_test.as_ref()?;
        let doctor = self.selected_doctor.as_ref()?;

        Some(Receipt {
            appointment_id: self.appointment_id.clone()?,
            patient_name: patient.display_name.clone(),
            test_name: test.name.clone(),
            doctor_name: doctor.name.clone(),
            appointment_date: self.appointment_date?,
            price: test.price,
            card: self
                .payment_details
                .as_ref()
                .map(PaymentDetails::masked_card_number)
                .unwrap_or_default(),
        })
    }

    pub fn view(&self) -> BookingView {
        BookingView {
            patient: self.patient.clone(),
            selected_test: self.selected_test.clone(),
            selected_doctor: self.selected_doctor.clone(),
            appointment_date: self.appointment_date,
            appointment_day: self.appointment_date.map(|date| date.date()),
            card: self
                .payment_details
                .as_ref()
                .map(PaymentDetails::masked_card_number),
            appointment_id: self.appointment_id.clone(),
        }
    }

    fn ensure_unlocked(&self) -> Result<(), BookingError> {
        match &self.appointment_id {
            Some(id) => Err(BookingError::AlreadyConfirmed(id.clone())),
            None => Ok(()),
        }
    }

    fn require(&self, step: Step, satisfied: bool) -> Result<(), BookingError> {
        if satisfied {
            Ok(())
        } else {
            Err(BookingError::MissingPrerequisite { step })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn patient() -> Patient {
        Patient {
            uid: "u1".to_string(),
            display_name: "Ada Lovelace".to_string(),
            email: Some("ada@example.com".to_string()),
        }
    }

    fn test(id: &str) -> MedicalTest {
        MedicalTest {
            id: id.to_string(),
            name: format!("Test {id}"),
            description: String::new(),
            price: 150.0,
            icon: "blood".to_string(),
        }
    }

    fn doctor(id: &str) -> Doctor {
        Doctor {
            id: id.to_string(),
            name: format!("Dr. {id}"),
            image: String::new(),
            availability: "Monday-Friday, 9:00 AM - 5:00 PM".to_string(),
            specialties: vec!["t1".to_string()],
        }
    }

    fn date() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2030, 3, 4)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn payment() -> PaymentDetails {
        PaymentDetails {
            card_name: "Ada Lovelace".to_string(),
            card_number: "4111111111111111".to_string(),
            expiry_date: "09/26".to_string(),
            cvc: "123".to_string(),
        }
    }

    fn scheduled() -> BookingState {
        let mut state = BookingState::new();
        state.login(patient());
        state.set_test(test("t1")).unwrap();
        state.set_doctor(doctor("d1")).unwrap();
        state.set_appointment_date(Some(date())).unwrap();
        state
    }

    fn confirmed() -> BookingState {
        let mut state = scheduled();
        state.set_payment_details(payment()).unwrap();
        state.set_appointment_id("ABC123XYZ").unwrap();
        state
    }

    #[test]
    fn reset_keeps_identity() {
        let mut state = BookingState::new();
        state.login(patient());
        state.set_test(test("t1")).unwrap();
        state.set_doctor(doctor("d1")).unwrap();

        state.reset_booking();

        assert_eq!(state.patient(), Some(&patient()));
        assert!(state.selected_test().is_none());
        assert!(state.selected_doctor().is_none());
        assert!(state.appointment_date().is_none());
        assert!(state.payment_details().is_none());
        assert!(state.appointment_id().is_none());
    }

    #[test]
    fn guards_send_visits_to_the_first_incomplete_step() {
        let mut state = BookingState::new();
        assert_eq!(state.guard(Step::TestSelection), Some(Step::Login));
        assert_eq!(state.guard(Step::Receipt), Some(Step::Login));
        assert_eq!(state.guard(Step::Login), None);

        state.login(patient());
        assert_eq!(state.guard(Step::TestSelection), None);
        assert_eq!(state.guard(Step::Schedule), Some(Step::TestSelection));

        state.set_test(test("t1")).unwrap();
        state.set_doctor(doctor("d1")).unwrap();
        assert_eq!(state.guard(Step::Payment), Some(Step::Schedule));
        assert_eq!(state.guard(Step::Schedule), None);

        state.set_appointment_date(Some(date())).unwrap();
        assert_eq!(state.guard(Step::Payment), None);
        assert_eq!(state.guard(Step::Receipt), Some(Step::Payment));
    }

    #[test]
    fn schedule_without_doctor_goes_to_doctor_selection() {
        let mut state = BookingState::new();
        state.login(patient());
        state.set_test(test("t1")).unwrap();

        assert_eq!(state.guard(Step::Schedule), Some(Step::DoctorSelection));
    }

    #[test]
    fn every_visit_order_lands_on_a_reachable_step() {
        let states = [
            BookingState::new(),
            {
                let mut s = BookingState::new();
                s.login(patient());
                s
            },
            scheduled(),
            confirmed(),
        ];

        for state in &states {
            for step in Step::ALL {
                let landed = state.guard(step).unwrap_or(step);
                assert!(landed <= step);
                assert_eq!(state.guard(landed), None);
            }
        }
    }

    #[test]
    fn changing_the_test_clears_later_choices() {
        let mut state = scheduled();

        state.set_test(test("t1")).unwrap();
        assert!(state.appointment_date().is_some());

        state.set_test(test("t2")).unwrap();
        assert!(state.selected_doctor().is_none());
        assert!(state.appointment_date().is_none());
        assert_eq!(state.resume_step(), Step::DoctorSelection);
    }

    #[test]
    fn changing_the_doctor_clears_the_date() {
        let mut state = scheduled();
        state.set_doctor(doctor("d2")).unwrap();
        assert!(state.appointment_date().is_none());
    }

    #[test]
    fn payment_needs_a_date() {
        let mut state = scheduled();
        state.set_appointment_date(None).unwrap();

        let err = state.set_payment_details(payment()).unwrap_err();
        assert!(matches!(
            err,
            BookingError::MissingPrerequisite {
                step: Step::Schedule
            }
        ));
    }

    #[test]
    fn doctor_needs_a_test() {
        let mut state = BookingState::new();
        state.login(patient());
        assert!(state.set_doctor(doctor("d1")).is_err());
    }

    #[test]
    fn confirmation_code_is_never_overwritten() {
        let mut state = confirmed();

        assert!(matches!(
            state.set_appointment_id("OTHER0000"),
            Err(BookingError::AlreadyConfirmed(id)) if id == "ABC123XYZ"
        ));
        assert!(state.set_test(test("t2")).is_err());
        assert!(state.set_appointment_date(None).is_err());
        assert_eq!(state.appointment_id(), Some("ABC123XYZ"));

        state.reset_booking();
        assert!(state.appointment_id().is_none());
    }

    #[test]
    fn login_and_logout_clear_booking_data() {
        let mut state = confirmed();
        state.login(patient());
        assert!(state.appointment_id().is_none());
        assert!(state.is_logged_in());

        state.logout();
        assert_eq!(state, BookingState::default());
    }

    #[test]
    fn receipt_mirrors_the_booking() {
        let receipt = confirmed().receipt().unwrap();
        assert_eq!(receipt.test_name, "Test t1");
        assert_eq!(receipt.doctor_name, "Dr. d1");
        assert_eq!(receipt.appointment_date, date());
        assert_eq!(receipt.price, 150.0);
        assert_eq!(receipt.card, "•••• 1111");

        assert!(scheduled().receipt().is_none());
    }

    #[test]
    fn step_ids_parse_back() {
        for step in Step::ALL {
            assert_eq!(step.id().parse::<Step>(), Ok(step));
        }
        assert!("checkout".parse::<Step>().is_err());
        assert_eq!(Step::Schedule.previous(), Some(Step::DoctorSelection));
        assert_eq!(Step::Login.previous(), None);
    }
}
