use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use wizard_flow::{Context, NextAction, Result, Task, TaskResult};

use crate::{
    auth::{AuthProvider, authenticate},
    models::Notification,
    state::Step,
    validation::validate_login,
};

use super::{
    types::ScreenAction,
    utils::{load_state, notify, reject, reject_action, save_state, take_action},
};

/// Entry screen: signs the patient in, registering new emails on the fly.
pub struct LoginTask {
    auth: Arc<dyn AuthProvider>,
}

impl LoginTask {
    pub fn new(auth: Arc<dyn AuthProvider>) -> Self {
        Self { auth }
    }
}

#[async_trait]
impl Task for LoginTask {
    fn id(&self) -> &str {
        Step::Login.id()
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        let mut state = load_state(&context).await;

        let (name, email, password) = match take_action(&context).await {
            None => {
                let response = match state.patient() {
                    Some(patient) => format!(
                        "Logged in as {}. Log in again to switch accounts.",
                        patient.display_name
                    ),
                    None => "Log in or register with your name, email and password.".to_string(),
                };
                return Ok(TaskResult::new_with_status(
                    Some(response),
                    NextAction::WaitForInput,
                    Some("Waiting for credentials".to_string()),
                ));
            }
            Some(ScreenAction::Login {
                name,
                email,
                password,
            }) => (name, email, password),
            Some(other) => return reject_action(&context, Step::Login, &other).await,
        };

        if let Err(e) = validate_login(&name, &email, &password) {
            return reject(&context, Step::Login, e).await;
        }

        let patient = match authenticate(self.auth.as_ref(), &name, &email, &password).await {
            Ok(patient) => patient,
            Err(e) => return reject(&context, Step::Login, e.into()).await,
        };

        info!(patient_id = %patient.uid, "Patient logged in");
        let welcome = format!("Welcome, {}!", patient.display_name);
        state.login(patient);
        save_state(&context, &state).await?;
        notify(&context, Notification::info("Login Successful", welcome)).await?;

        Ok(TaskResult::new_with_status(
            None,
            NextAction::ContinueAndExecute,
            Some("Logged in - proceeding to test selection".to_string()),
        ))
    }
}
