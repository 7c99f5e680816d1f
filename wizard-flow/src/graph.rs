use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::{
    context::Context,
    error::{GraphError, Result},
    storage::Session,
    task::{NextAction, Task, TaskResult},
};

/// Type alias for edge condition functions
pub type EdgeCondition = Arc<dyn Fn(&Context) -> bool + Send + Sync>;

/// Edge between tasks in the graph
#[derive(Clone)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub condition: Option<EdgeCondition>,
}

/// An immutable graph of tasks. Build one with [`GraphBuilder`].
pub struct Graph {
    pub id: String,
    tasks: HashMap<String, Arc<dyn Task>>,
    edges: Vec<Edge>,
    start_task_id: Option<String>,
}

impl Graph {
    /// Execute the task the session currently points at, after resolving guard
    /// redirects, and move the session according to the task's `NextAction`.
    pub async fn execute_session(&self, session: &mut Session) -> Result<ExecutionResult> {
        let redirected_from = self.resolve_guards(session).await?;

        let result = self
            .execute_single_task(&session.current_task_id, session.context.clone())
            .await?;
        session.status_message = result.status_message.clone();

        let mut execution = match &result.next_action {
            NextAction::Continue => {
                if let Some(next_task_id) = self.find_next_task(&result.task_id, &session.context) {
                    session.current_task_id = next_task_id;
                }
                ExecutionResult::waiting(result.response)
            }
            NextAction::ContinueAndExecute => {
                match self.find_next_task(&result.task_id, &session.context) {
                    Some(next_task_id) => {
                        session.current_task_id = next_task_id;
                        // The next task renders on top of whatever this one said.
                        let mut next = Box::pin(self.execute_session(session)).await?;
                        if next.response.is_none() {
                            next.response = result.response;
                        }
                        next
                    }
                    None => ExecutionResult::waiting(result.response),
                }
            }
            NextAction::WaitForInput => ExecutionResult::waiting(result.response),
            NextAction::End => ExecutionResult {
                response: result.response,
                status: ExecutionStatus::Completed,
                redirected_from: None,
            },
            NextAction::GoTo(target_id) => {
                if !self.tasks.contains_key(target_id) {
                    return Err(GraphError::TaskNotFound(target_id.clone()));
                }
                session.current_task_id = target_id.clone();
                ExecutionResult::waiting(result.response)
            }
        };

        if redirected_from.is_some() {
            execution.redirected_from = redirected_from;
        }
        Ok(execution)
    }

    /// Follow guard redirects until the current task accepts the session.
    /// Returns the task originally requested when at least one redirect happened.
    async fn resolve_guards(&self, session: &mut Session) -> Result<Option<String>> {
        let requested = session.current_task_id.clone();
        let mut hops = 0;

        loop {
            let task = self
                .get_task(&session.current_task_id)
                .ok_or_else(|| GraphError::TaskNotFound(session.current_task_id.clone()))?;

            let target = match task.guard(&session.context).await? {
                Some(target) if target != session.current_task_id => target,
                _ => break,
            };

            if !self.tasks.contains_key(&target) {
                return Err(GraphError::TaskNotFound(target));
            }
            hops += 1;
            if hops > self.tasks.len() {
                return Err(GraphError::RedirectLoop(requested));
            }

            info!(
                session_id = %session.id,
                from = %session.current_task_id,
                to = %target,
                "Guard redirect"
            );
            session.current_task_id = target;
        }

        Ok((hops > 0).then_some(requested))
    }

    /// Execute a single task without following Continue actions
    async fn execute_single_task(&self, task_id: &str, context: Context) -> Result<TaskResult> {
        let task = self
            .get_task(task_id)
            .ok_or_else(|| GraphError::TaskNotFound(task_id.to_string()))?;

        debug!(task_id = %task_id, "Running task");
        let mut result = task.run(context).await?;
        result.task_id = task_id.to_string();

        Ok(result)
    }

    /// Find the next task based on edges and conditions. Edges are checked in
    /// insertion order; the first unconditional edge or satisfied condition wins.
    pub fn find_next_task(&self, current_task_id: &str, context: &Context) -> Option<String> {
        self.edges
            .iter()
            .filter(|edge| edge.from == current_task_id)
            .find(|edge| edge.condition.as_ref().is_none_or(|condition| condition(context)))
            .map(|edge| edge.to.clone())
    }

    pub fn start_task_id(&self) -> Option<String> {
        self.start_task_id.clone()
    }

    pub fn get_task(&self, task_id: &str) -> Option<Arc<dyn Task>> {
        self.tasks.get(task_id).cloned()
    }
}

/// Builder for creating graphs
pub struct GraphBuilder {
    graph: Graph,
}

impl GraphBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            graph: Graph {
                id: id.into(),
                tasks: HashMap::new(),
                edges: Vec::new(),
                start_task_id: None,
            },
        }
    }

    /// Add a task. The first task added becomes the start task.
    pub fn add_task(mut self, task: Arc<dyn Task>) -> Self {
        let task_id = task.id().to_string();
        if self.graph.start_task_id.is_none() {
            self.graph.start_task_id = Some(task_id.clone());
        }
        self.graph.tasks.insert(task_id, task);
        self
    }

    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.graph.edges.push(Edge {
            from: from.into(),
            to: to.into(),
            condition: None,
        });
        self
    }

    pub fn add_conditional_edge<F>(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        condition: F,
    ) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.graph.edges.push(Edge {
            from: from.into(),
            to: to.into(),
            condition: Some(Arc::new(condition)),
        });
        self
    }

    pub fn set_start_task(mut self, task_id: impl Into<String>) -> Self {
        let task_id = task_id.into();
        if self.graph.tasks.contains_key(&task_id) {
            self.graph.start_task_id = Some(task_id);
        }
        self
    }

    pub fn build(self) -> Graph {
        self.graph
    }
}

/// Outcome of one `execute_session` call
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub response: Option<String>,
    pub status: ExecutionStatus,
    /// The task the caller asked for, when a guard sent the session elsewhere
    pub redirected_from: Option<String>,
}

impl ExecutionResult {
    fn waiting(response: Option<String>) -> Self {
        Self {
            response,
            status: ExecutionStatus::WaitingForInput,
            redirected_from: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ExecutionStatus {
    /// Waiting for user input to continue
    WaitingForInput,
    /// Workflow completed successfully
    Completed,
}
