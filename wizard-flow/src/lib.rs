pub mod context;
pub mod error;
pub mod graph;
pub mod runner;
pub mod storage;
pub mod storage_postgres;
pub mod task;

// Re-export commonly used types
pub use context::Context;
pub use error::{GraphError, Result};
pub use graph::{ExecutionResult, ExecutionStatus, Graph, GraphBuilder};
pub use runner::FlowRunner;
pub use storage::{InMemorySessionStorage, Session, SessionStorage};
pub use storage_postgres::PostgresSessionStorage;
pub use task::{NextAction, Task, TaskResult};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct EchoTask;

    #[async_trait]
    impl Task for EchoTask {
        async fn run(&self, context: Context) -> Result<TaskResult> {
            let input: String = context.take("input").await.unwrap_or_default();
            context.set("output", format!("Processed: {}", input)).await?;

            Ok(TaskResult::new_with_status(
                Some("Task completed".to_string()),
                NextAction::End,
                Some("echoed".to_string()),
            ))
        }
    }

    #[tokio::test]
    async fn test_runner_persists_session() {
        let task = Arc::new(EchoTask);
        let task_id = task.id().to_string();
        let graph = Arc::new(GraphBuilder::new("echo").add_task(task).build());
        let storage = Arc::new(InMemorySessionStorage::new());
        let runner = FlowRunner::new(graph, storage.clone());

        let session = Session::new_from_task("session1".to_string(), &task_id);
        session.context.set("input", "Hello, World!").await.unwrap();
        storage.save(session).await.unwrap();

        let result = runner.run("session1").await.unwrap();
        assert_eq!(result.status, ExecutionStatus::Completed);

        let stored = storage.get("session1").await.unwrap().unwrap();
        assert_eq!(stored.status_message.as_deref(), Some("echoed"));
        let output: String = stored.context.get("output").await.unwrap();
        assert_eq!(output, "Processed: Hello, World!");
        assert!(!stored.context.contains_key("input"));
    }

    #[tokio::test]
    async fn test_unsaved_changes_stay_private() {
        let storage = InMemorySessionStorage::new();
        storage
            .save(Session::new_from_task("session1".to_string(), "task1"))
            .await
            .unwrap();

        let loaded = storage.get("session1").await.unwrap().unwrap();
        loaded.context.set("draft", true).await.unwrap();

        let reloaded = storage.get("session1").await.unwrap().unwrap();
        assert!(!reloaded.context.contains_key("draft"));
    }

    #[tokio::test]
    async fn test_runner_reports_missing_session() {
        let graph = Arc::new(GraphBuilder::new("empty").add_task(Arc::new(EchoTask)).build());
        let runner = FlowRunner::new(graph, Arc::new(InMemorySessionStorage::new()));

        let err = runner.run("nope").await.unwrap_err();
        assert!(matches!(err, GraphError::SessionNotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn test_session_lock_is_exclusive_per_session() {
        let graph = Arc::new(GraphBuilder::new("echo").add_task(Arc::new(EchoTask)).build());
        let runner = FlowRunner::new(graph, Arc::new(InMemorySessionStorage::new()));

        let guard = runner.lock_session("session1").await;
        let waiting = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            runner.lock_session("session1"),
        )
        .await;
        assert!(waiting.is_err());

        // Other sessions are not affected.
        let _other = runner.lock_session("session2").await;

        drop(guard);
        let _again = runner.lock_session("session1").await;
    }

    #[tokio::test]
    async fn test_delete_session_removes_it() {
        let task = Arc::new(EchoTask);
        let task_id = task.id().to_string();
        let graph = Arc::new(GraphBuilder::new("echo").add_task(task).build());
        let storage = Arc::new(InMemorySessionStorage::new());
        let runner = FlowRunner::new(graph, storage.clone());

        storage
            .save(Session::new_from_task("session1".to_string(), &task_id))
            .await
            .unwrap();
        runner.delete_session("session1").await.unwrap();

        assert!(storage.get("session1").await.unwrap().is_none());
        let err = runner.run("session1").await.unwrap_err();
        assert!(matches!(err, GraphError::SessionNotFound(_)));
    }

    #[test]
    fn test_session_round_trips_through_json() {
        let mut session = Session::new_from_task("s".to_string(), "a");
        session.context.set_sync("k", 7).unwrap();
        session.current_task_id = "b".to_string();

        let json = serde_json::to_string(&session).unwrap();
        let restored: Session = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.current_task_id, "b");
        assert_eq!(restored.context.get_sync::<i32>("k"), Some(7));
    }
}
