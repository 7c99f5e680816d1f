use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use wizard_flow::{Context, NextAction, Result, Task, TaskResult};

use crate::{
    catalog::CatalogStore,
    error::BookingError,
    models::{Doctor, Notification},
    state::{BookingState, Step},
};

use super::{
    types::ScreenAction,
    utils::{
        go_back, guard_redirect, load_state, notify, reject, reject_action, save_state,
        take_action,
    },
};

const STEP: Step = Step::DoctorSelection;

/// Offers only the doctors who perform the selected test.
pub struct DoctorSelectionTask {
    catalog: Arc<dyn CatalogStore>,
}

impl DoctorSelectionTask {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self { catalog }
    }

    async fn render(&self, context: &Context, state: &BookingState) -> Result<TaskResult> {
        let Some(test) = state.selected_test() else {
            return reject(context, STEP, BookingError::MissingPrerequisite {
                step: Step::TestSelection,
            })
            .await;
        };

        let doctors = match self.catalog.doctors_for_test(&test.id).await {
            Ok(doctors) => doctors,
            Err(e) => {
                notify(context, Notification::error("Error", "Could not fetch doctors.")).await?;
                return Ok(TaskResult::new_with_status(
                    Some(e.to_string()),
                    NextAction::WaitForInput,
                    Some("Doctor list unavailable".to_string()),
                ));
            }
        };

        let response = if doctors.is_empty() {
            format!(
                "We're sorry, but there are no doctors available for {}. Please choose another test.",
                test.name
            )
        } else {
            let selected = state.selected_doctor().map(|d| d.id.as_str());
            describe_doctors(&test.name, &doctors, selected)
        };

        Ok(TaskResult::new_with_status(
            Some(response),
            NextAction::WaitForInput,
            Some("Waiting for doctor selection".to_string()),
        ))
    }

    async fn select(
        &self,
        context: &Context,
        mut state: BookingState,
        doctor_id: &str,
    ) -> Result<TaskResult> {
        let Some(test_id) = state.selected_test().map(|t| t.id.clone()) else {
            return reject(context, STEP, BookingError::MissingPrerequisite {
                step: Step::TestSelection,
            })
            .await;
        };

        let offered = match self.catalog.doctors_for_test(&test_id).await {
            Ok(doctors) => doctors,
            Err(e) => return reject(context, STEP, e).await,
        };

        let Some(doctor) = offered.into_iter().find(|d| d.id == doctor_id) else {
            let error = match self.catalog.get_doctor(doctor_id).await {
                Ok(Some(_)) => BookingError::DoctorNotOffered {
                    doctor_id: doctor_id.to_string(),
                    test_id,
                },
                Ok(None) => BookingError::UnknownDoctor(doctor_id.to_string()),
                Err(e) => e,
            };
            return reject(context, STEP, error).await;
        };

        let doctor_name = doctor.name.clone();
        if let Err(e) = state.set_doctor(doctor) {
            return reject(context, STEP, e).await;
        }
        save_state(context, &state).await?;

        info!(doctor_id = %doctor_id, test_id = %test_id, "Doctor selected");
        Ok(TaskResult::new_with_status(
            None,
            NextAction::ContinueAndExecute,
            Some(format!("Selected {doctor_name} - pick a date and time")),
        ))
    }
}

#[async_trait]
impl Task for DoctorSelectionTask {
    fn id(&self) -> &str {
        STEP.id()
    }

    async fn guard(&self, context: &Context) -> Result<Option<String>> {
        Ok(guard_redirect(context, STEP))
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        let state = load_state(&context).await;

        match take_action(&context).await {
            None => self.render(&context, &state).await,
            Some(ScreenAction::SelectDoctor { doctor_id }) => {
                self.select(&context, state, &doctor_id).await
            }
            Some(ScreenAction::Back) => Ok(go_back(STEP)),
            Some(other) => reject_action(&context, STEP, &other).await,
        }
    }
}

fn describe_doctors(test_name: &str, doctors: &[Doctor], selected: Option<&str>) -> String {
    let mut lines = vec![format!("Select a Doctor for {test_name}:")];
    for doctor in doctors {
        let marker = if Some(doctor.id.as_str()) == selected { "*" } else { "-" };
        lines.push(format!(
            "{marker} [{}] {} - available {}",
            doctor.id, doctor.name, doctor.availability
        ));
    }
    lines.join("\n")
}
