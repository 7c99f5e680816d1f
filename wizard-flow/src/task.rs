use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{context::Context, error::Result};

/// Result of a task execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Response to send to the user
    pub response: Option<String>,
    /// Next action to take
    pub next_action: NextAction,
    /// Id of the task that produced this result, filled in by the graph
    pub task_id: String,
    /// Short description of where the session stands
    pub status_message: Option<String>,
}

impl TaskResult {
    pub fn new(response: Option<String>, next_action: NextAction) -> Self {
        Self::new_with_status(response, next_action, None)
    }

    pub fn new_with_status(
        response: Option<String>,
        next_action: NextAction,
        status_message: Option<String>,
    ) -> Self {
        Self {
            response,
            next_action,
            task_id: String::new(),
            status_message,
        }
    }
}

/// Defines what should happen after a task completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NextAction {
    /// Move to the next task and wait for the next call
    Continue,
    /// Move to the next task and run it immediately
    ContinueAndExecute,
    /// Go to a specific task by ID and wait
    GoTo(String),
    /// End the graph execution
    End,
    /// Wait for user input before continuing
    WaitForInput,
}

/// Core trait that all tasks must implement
#[async_trait]
pub trait Task: Send + Sync {
    /// Unique identifier for this task
    fn id(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Checked before the task runs. Returning `Some(task_id)` redirects the
    /// session to that task instead; the guarded task is not run.
    async fn guard(&self, _context: &Context) -> Result<Option<String>> {
        Ok(None)
    }

    /// Execute the task with the given context
    async fn run(&self, context: Context) -> Result<TaskResult>;
}
