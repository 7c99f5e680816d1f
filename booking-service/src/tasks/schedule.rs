use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveDateTime};
use std::sync::Arc;
use tracing::info;
use wizard_flow::{Context, NextAction, Result, Task, TaskResult};

use crate::{
    error::BookingError,
    models::{Notification, TimePreference, TimeSuggestion},
    state::{BookingState, Step},
    suggestion::{SuggestionRequest, TimeSuggester, suggested_clock_time},
    validation::{
        TIME_SLOTS, ensure_not_past, ensure_offered_slot, format_time_slot, parse_time_slot,
    },
};

use super::{
    session_keys,
    types::ScreenAction,
    utils::{
        go_back, guard_redirect, load_state, notify, reject, reject_action, save_state,
        take_action,
    },
};

const STEP: Step = Step::Schedule;

/// Date and time picking, with an optional AI suggestion for the time of day.
pub struct ScheduleTask {
    suggester: Option<Arc<dyn TimeSuggester>>,
}

impl ScheduleTask {
    pub fn new(suggester: Option<Arc<dyn TimeSuggester>>) -> Self {
        Self { suggester }
    }

    fn render(&self, state: &BookingState, suggestion: Option<TimeSuggestion>) -> TaskResult {
        let doctor = state
            .selected_doctor()
            .map(|d| d.name.as_str())
            .unwrap_or("your doctor");

        let mut lines = vec![
            format!("Select a date and time to meet with {doctor}."),
            format!("Available times: {}", TIME_SLOTS.join(", ")),
        ];
        if let Some(date) = state.appointment_date() {
            lines.push(format!("Currently scheduled for {}", describe_date(date)));
        }
        if let Some(suggestion) = suggestion {
            lines.push(format!(
                "Suggested time: {} - {}",
                suggestion.suggested_time, suggestion.reasoning
            ));
        }

        TaskResult::new_with_status(
            Some(lines.join("\n")),
            NextAction::WaitForInput,
            Some("Waiting for appointment date and time".to_string()),
        )
    }

    async fn schedule(
        &self,
        context: &Context,
        mut state: BookingState,
        date: NaiveDate,
        slot: &str,
    ) -> Result<TaskResult> {
        let scheduled = ensure_not_past(date, today())
            .and_then(|_| parse_time_slot(slot))
            .and_then(|time| {
                let when = date.and_time(time);
                state.set_appointment_date(Some(when)).map(|_| when)
            });

        match scheduled {
            Ok(when) => self.proceed(context, &state, when).await,
            Err(e) => reject(context, STEP, e).await,
        }
    }

    async fn clear(&self, context: &Context, mut state: BookingState) -> Result<TaskResult> {
        if let Err(e) = state.set_appointment_date(None) {
            return reject(context, STEP, e).await;
        }
        save_state(context, &state).await?;
        Ok(self.render(&state, None))
    }

    async fn suggest(
        &self,
        context: &Context,
        state: &BookingState,
        preference: TimePreference,
    ) -> Result<TaskResult> {
        let Some(suggester) = &self.suggester else {
            let error = BookingError::SuggestionFailed("time suggestions are not configured".into());
            return reject(context, STEP, error).await;
        };
        let (Some(test), Some(doctor)) = (state.selected_test(), state.selected_doctor()) else {
            let error = BookingError::MissingPrerequisite {
                step: Step::DoctorSelection,
            };
            return reject(context, STEP, error).await;
        };

        let request = SuggestionRequest::new(test, doctor, preference);
        let suggestion = suggester.suggest(&request).await.and_then(|suggestion| {
            suggested_clock_time(&suggestion)
                .and_then(ensure_offered_slot)
                .map(|_| suggestion)
        });
        match suggestion {
            Ok(suggestion) => {
                info!(suggested_time = %suggestion.suggested_time, "Time suggestion received");
                context
                    .set(session_keys::TIME_SUGGESTION, &suggestion)
                    .await?;
                Ok(self.render(state, Some(suggestion)))
            }
            Err(e) => reject(context, STEP, e).await,
        }
    }

    async fn accept_suggestion(
        &self,
        context: &Context,
        mut state: BookingState,
        date: Option<NaiveDate>,
    ) -> Result<TaskResult> {
        let Some(suggestion) = context
            .get::<TimeSuggestion>(session_keys::TIME_SUGGESTION)
            .await
        else {
            let error = BookingError::SuggestionFailed("no suggestion has been requested yet".into());
            return reject(context, STEP, error).await;
        };

        let date = date.unwrap_or_else(today);
        let accepted = suggested_clock_time(&suggestion)
            .and_then(ensure_offered_slot)
            .and_then(|time| ensure_not_past(date, today()).map(|_| date.and_time(time)))
            .and_then(|when| state.set_appointment_date(Some(when)).map(|_| when));

        match accepted {
            Ok(when) => {
                notify(
                    context,
                    Notification::info(
                        "Time selected!",
                        format!("Scheduled for {}.", format_time_slot(when.time())),
                    ),
                )
                .await?;
                self.proceed(context, &state, when).await
            }
            Err(e) => reject(context, STEP, e).await,
        }
    }

    async fn proceed(
        &self,
        context: &Context,
        state: &BookingState,
        when: NaiveDateTime,
    ) -> Result<TaskResult> {
        save_state(context, state).await?;
        context.remove(session_keys::TIME_SUGGESTION).await;

        info!(appointment_date = %when, "Appointment scheduled");
        Ok(TaskResult::new_with_status(
            None,
            NextAction::ContinueAndExecute,
            Some(format!(
                "Appointment scheduled for {} - proceeding to payment",
                describe_date(when)
            )),
        ))
    }
}

#[async_trait]
impl Task for ScheduleTask {
    fn id(&self) -> &str {
        STEP.id()
    }

    async fn guard(&self, context: &Context) -> Result<Option<String>> {
        Ok(guard_redirect(context, STEP))
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        let state = load_state(&context).await;

        match take_action(&context).await {
            None => {
                let suggestion = context.get(session_keys::TIME_SUGGESTION).await;
                Ok(self.render(&state, suggestion))
            }
            Some(ScreenAction::Schedule { date, time }) => {
                self.schedule(&context, state, date, &time).await
            }
            Some(ScreenAction::ClearDate) => self.clear(&context, state).await,
            Some(ScreenAction::SuggestTime { preference }) => {
                self.suggest(&context, &state, preference).await
            }
            Some(ScreenAction::AcceptSuggestion { date }) => {
                self.accept_suggestion(&context, state, date).await
            }
            Some(ScreenAction::Back) => Ok(go_back(STEP)),
            Some(other) => reject_action(&context, STEP, &other).await,
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub(crate) fn describe_date(when: NaiveDateTime) -> String {
    format!(
        "{} at {}",
        when.format("%A, %B %-d, %Y"),
        format_time_slot(when.time())
    )
}
