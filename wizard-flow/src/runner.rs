//! FlowRunner wraps the _load → execute → save_ round trip so a web handler can
//! run exactly one step per request.
//!
//! Use [`FlowRunner::run`] when the stored session is ready to go as-is, and
//! [`FlowRunner::run_session`] when the caller first needs to change the session
//! (point it at another task, drop user input into the context, ...). In the
//! second case the caller holds [`FlowRunner::lock_session`] from loading the
//! session until `run_session` has saved it.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::{
    error::{GraphError, Result},
    graph::{ExecutionResult, Graph},
    storage::{Session, SessionStorage},
};

#[derive(Clone)]
pub struct FlowRunner {
    graph: Arc<Graph>,
    storage: Arc<dyn SessionStorage>,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl FlowRunner {
    pub fn new(graph: Arc<Graph>, storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            graph,
            storage,
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Exclusive access to one session. Requests for the same session queue
    /// here; different sessions never wait on each other.
    pub async fn lock_session(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(session_id.to_string()).or_default().clone();
        lock.lock_owned().await
    }

    /// Removes the session from storage along with its lock.
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        let _guard = self.lock_session(session_id).await;
        self.storage.delete(session_id).await?;
        self.locks.remove(session_id);
        Ok(())
    }

    /// Load the session, execute one step, persist it.
    pub async fn run(&self, session_id: &str) -> Result<ExecutionResult> {
        let _guard = self.lock_session(session_id).await;
        let session = self
            .storage
            .get(session_id)
            .await?
            .ok_or_else(|| GraphError::SessionNotFound(session_id.to_string()))?;

        let (_, result) = self.run_session(session).await?;
        Ok(result)
    }

    /// Execute one step on a session the caller already loaded and prepared,
    /// then persist it. The updated session is handed back for inspection.
    pub async fn run_session(&self, mut session: Session) -> Result<(Session, ExecutionResult)> {
        let result = self.graph.execute_session(&mut session).await?;
        debug!(
            session_id = %session.id,
            current_task = %session.current_task_id,
            status = ?result.status,
            "Step executed"
        );

        self.storage.save(session.clone()).await?;
        Ok((session, result))
    }
}
