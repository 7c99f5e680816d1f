use async_trait::async_trait;
use tracing::info;
use wizard_flow::{Context, NextAction, Result, Task, TaskResult};

use crate::{error::BookingError, state::Step};

use super::{
    session_keys,
    schedule::describe_date,
    types::ScreenAction,
    utils::{format_price, guard_redirect, load_state, reject, reject_action, save_state, take_action},
};

const STEP: Step = Step::Receipt;

/// Terminal screen. Shows the confirmed booking and offers a fresh one.
pub struct ReceiptTask;

#[async_trait]
impl Task for ReceiptTask {
    fn id(&self) -> &str {
        STEP.id()
    }

    async fn guard(&self, context: &Context) -> Result<Option<String>> {
        Ok(guard_redirect(context, STEP))
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        let mut state = load_state(&context).await;

        match take_action(&context).await {
            None => {
                let Some(receipt) = state.receipt() else {
                    let error = BookingError::MissingPrerequisite { step: Step::Payment };
                    return reject(&context, STEP, error).await;
                };

                let response = format!(
                    "Appointment Confirmed!\nConfirmation: {}\nPatient: {}\nTest: {}\nDoctor: {}\nDate: {}\nPaid: {} ({})",
                    receipt.appointment_id,
                    receipt.patient_name,
                    receipt.test_name,
                    receipt.doctor_name,
                    describe_date(receipt.appointment_date),
                    format_price(receipt.price),
                    receipt.card
                );
                Ok(TaskResult::new_with_status(
                    Some(response),
                    NextAction::End,
                    Some(format!("Booking {} complete", receipt.appointment_id)),
                ))
            }
            Some(ScreenAction::NewBooking) => {
                state.reset_booking();
                save_state(&context, &state).await?;
                context.remove(session_keys::TIME_SUGGESTION).await;

                info!("Starting a new booking");
                Ok(TaskResult::new_with_status(
                    Some("Starting a new booking.".to_string()),
                    NextAction::GoTo(Step::TestSelection.id().to_string()),
                    Some("New booking started".to_string()),
                ))
            }
            Some(other) => reject_action(&context, STEP, &other).await,
        }
    }
}
