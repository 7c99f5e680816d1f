use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use wizard_flow::{Context, NextAction, Result, Task, TaskResult};

use crate::{
    catalog::CatalogStore,
    error::BookingError,
    models::{MedicalTest, Notification},
    state::{BookingState, Step},
};

use super::{
    types::ScreenAction,
    utils::{
        format_price, guard_redirect, load_state, notify, reject, reject_action, save_state,
        take_action,
    },
};

const STEP: Step = Step::TestSelection;

pub struct TestSelectionTask {
    catalog: Arc<dyn CatalogStore>,
}

impl TestSelectionTask {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self { catalog }
    }

    async fn render(&self, context: &Context, state: &BookingState) -> Result<TaskResult> {
        let tests = match self.catalog.list_tests().await {
            Ok(tests) => tests,
            Err(e) => {
                notify(
                    context,
                    Notification::error("Error", "Could not fetch medical tests."),
                )
                .await?;
                return Ok(TaskResult::new_with_status(
                    Some(e.to_string()),
                    NextAction::WaitForInput,
                    Some("Test catalog unavailable".to_string()),
                ));
            }
        };

        let selected = state.selected_test().map(|t| t.id.as_str());
        Ok(TaskResult::new_with_status(
            Some(describe_tests(&tests, selected)),
            NextAction::WaitForInput,
            Some("Waiting for test selection".to_string()),
        ))
    }

    async fn select(
        &self,
        context: &Context,
        mut state: BookingState,
        test_id: &str,
    ) -> Result<TaskResult> {
        let test = match self.catalog.get_test(test_id).await {
            Ok(Some(test)) => test,
            Ok(None) => return reject(context, STEP, BookingError::UnknownTest(test_id.to_string())).await,
            Err(e) => return reject(context, STEP, e).await,
        };

        if let Err(e) = state.set_test(test.clone()) {
            return reject(context, STEP, e).await;
        }
        save_state(context, &state).await?;

        info!(test_id = %test.id, "Test selected");
        Ok(TaskResult::new_with_status(
            None,
            NextAction::ContinueAndExecute,
            Some(format!("Selected {} - choose a doctor", test.name)),
        ))
    }
}

#[async_trait]
impl Task for TestSelectionTask {
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
            Some(ScreenAction::SelectTest { test_id }) => {
                self.select(&context, state, &test_id).await
            }
            Some(other) => reject_action(&context, STEP, &other).await,
        }
    }
}

fn describe_tests(tests: &[MedicalTest], selected: Option<&str>) -> String {
    let mut lines = vec!["Select a Medical Test:".to_string()];
    for test in tests {
        let marker = if Some(test.id.as_str()) == selected { "*" } else { "-" };
        lines.push(format!(
            "{marker} [{}] {} ({}): {}",
            test.id,
            test.name,
            format_price(test.price),
            test.description
        ));
    }
    lines.join("\n")
}
