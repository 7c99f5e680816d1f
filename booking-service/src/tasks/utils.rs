use tracing::warn;
use wizard_flow::{Context, NextAction, Result, TaskResult};

use crate::{error::BookingError, models::Notification, state::BookingState, state::Step};

use super::{session_keys, types::ScreenAction};

pub async fn load_state(context: &Context) -> BookingState {
    context.get(session_keys::BOOKING).await.unwrap_or_default()
}

pub async fn save_state(context: &Context, state: &BookingState) -> Result<()> {
    context.set(session_keys::BOOKING, state).await
}

pub async fn take_action(context: &Context) -> Option<ScreenAction> {
    context.take(session_keys::SCREEN_ACTION).await
}

pub async fn notify(context: &Context, notification: Notification) -> Result<()> {
    context.set(session_keys::NOTIFICATION, notification).await
}

/// Task id a visit to `step` has to be sent to, if the booking is not ready for it.
pub fn guard_redirect(context: &Context, step: Step) -> Option<String> {
    let state: BookingState = context.get_sync(session_keys::BOOKING).unwrap_or_default();
    state.guard(step).map(|target| target.id().to_string())
}

/// Abandons the operation: the booking is left as it was, the error is shown
/// as a notification and the screen stays where it is.
pub async fn reject(context: &Context, step: Step, error: BookingError) -> Result<TaskResult> {
    warn!(step = %step.id(), error = %error, "Screen action rejected");
    notify(context, error.notification()).await?;

    Ok(TaskResult::new_with_status(
        Some(error.to_string()),
        NextAction::WaitForInput,
        Some(format!("{step} - action rejected")),
    ))
}

pub async fn reject_action(context: &Context, step: Step, action: &ScreenAction) -> Result<TaskResult> {
    let error = BookingError::ActionNotAllowed {
        action: action.name().to_string(),
        step,
    };
    reject(context, step, error).await
}

/// Navigates to the screen before `step`.
pub fn go_back(step: Step) -> TaskResult {
    let target = step.previous().unwrap_or(step);
    TaskResult::new_with_status(
        None,
        NextAction::GoTo(target.id().to_string()),
        Some(format!("Back to {target}")),
    )
}

pub fn format_price(price: f64) -> String {
    format!("${price:.2}")
}
