use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};
use wizard_flow::{Context, NextAction, Result, Task, TaskResult};

use crate::{
    appointments::{AppointmentStore, generate_appointment_id},
    error::BookingError,
    models::{AppointmentRecord, AppointmentStatus, Notification, PaymentDetails},
    state::{BookingState, Step},
    validation::validate_payment,
};

use super::{
    schedule::describe_date,
    types::ScreenAction,
    utils::{
        format_price, go_back, guard_redirect, load_state, notify, reject, reject_action,
        save_state, take_action,
    },
};

const STEP: Step = Step::Payment;

/// Takes the card form, writes the appointment record and only then commits
/// the payment and confirmation code to the session.
pub struct PaymentTask {
    appointments: Arc<dyn AppointmentStore>,
}

impl PaymentTask {
    pub fn new(appointments: Arc<dyn AppointmentStore>) -> Self {
        Self { appointments }
    }

    fn render(&self, state: &BookingState) -> TaskResult {
        let response = match (
            state.selected_test(),
            state.selected_doctor(),
            state.appointment_date(),
        ) {
            (Some(test), Some(doctor), Some(when)) => format!(
                "Complete your payment: {} with {} on {}. Total: {}",
                test.name,
                doctor.name,
                describe_date(when),
                format_price(test.price)
            ),
            _ => "Complete your payment.".to_string(),
        };

        TaskResult::new_with_status(
            Some(response),
            NextAction::WaitForInput,
            Some("Waiting for payment details".to_string()),
        )
    }

    async fn pay(
        &self,
        context: &Context,
        state: &BookingState,
        form: PaymentDetails,
    ) -> Result<TaskResult> {
        let (confirmed, record) = match confirm(state, form) {
            Ok(prepared) => prepared,
            Err(e) => return reject(context, STEP, e).await,
        };

        if let Err(e) = self.appointments.insert(record.clone()).await {
            error!(appointment_id = %record.id, error = %e, "Failed to save appointment");
            return reject(context, STEP, e).await;
        }

        save_state(context, &confirmed).await?;
        notify(
            context,
            Notification::info("Payment Successful", "Your appointment is confirmed."),
        )
        .await?;

        info!(
            appointment_id = %record.id,
            patient_id = %record.patient_id,
            test_id = %record.test_id,
            doctor_id = %record.doctor_id,
            "Appointment confirmed"
        );
        Ok(TaskResult::new_with_status(
            None,
            NextAction::ContinueAndExecute,
            Some(format!("Appointment {} confirmed", record.id)),
        ))
    }
}

/// Builds the confirmed booking and its record without touching `state`.
fn confirm(
    state: &BookingState,
    form: PaymentDetails,
) -> std::result::Result<(BookingState, AppointmentRecord), BookingError> {
    let details = validate_payment(form)?;
    let appointment_id = generate_appointment_id();

    let mut confirmed = state.clone();
    confirmed.set_payment_details(details)?;
    confirmed.set_appointment_id(appointment_id.clone())?;

    let missing = |step| BookingError::MissingPrerequisite { step };
    let patient = confirmed.patient().ok_or(missing(Step::Login))?;
    let test = confirmed.selected_test().ok_or(missing(Step::TestSelection))?;
    let doctor = confirmed
        .selected_doctor()
        .ok_or(missing(Step::DoctorSelection))?;
    let appointment_date = confirmed.appointment_date().ok_or(missing(Step::Schedule))?;

    let record = AppointmentRecord {
        id: appointment_id,
        patient_id: patient.uid.clone(),
        patient_name: patient.display_name.clone(),
        test_id: test.id.clone(),
        test_name: test.name.clone(),
        doctor_id: doctor.id.clone(),
        doctor_name: doctor.name.clone(),
        appointment_date,
        price: test.price,
        status: AppointmentStatus::Confirmed,
        created_at: Utc::now(),
    };

    Ok((confirmed, record))
}

#[async_trait]
impl Task for PaymentTask {
    fn id(&self) -> &str {
        STEP.id()
    }

    async fn guard(&self, context: &Context) -> Result<Option<String>> {
        Ok(guard_redirect(context, STEP))
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        let state = load_state(&context).await;

        match take_action(&context).await {
            None => Ok(self.render(&state)),
            Some(ScreenAction::Pay(form)) => self.pay(&context, &state, form).await,
            Some(ScreenAction::Back) => Ok(go_back(STEP)),
            Some(other) => reject_action(&context, STEP, &other).await,
        }
    }
}
