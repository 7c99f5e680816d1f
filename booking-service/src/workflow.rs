use std::sync::Arc;
use uuid::Uuid;
use wizard_flow::{FlowRunner, Graph, GraphBuilder, Result, Session, SessionStorage, Task};

use crate::{
    appointments::AppointmentStore,
    auth::AuthProvider,
    catalog::CatalogStore,
    state::{BookingState, Step},
    suggestion::TimeSuggester,
    tasks::*,
};

/// External collaborators the screens talk to.
#[derive(Clone)]
pub struct Backends {
    pub catalog: Arc<dyn CatalogStore>,
    pub appointments: Arc<dyn AppointmentStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub suggester: Option<Arc<dyn TimeSuggester>>,
}

pub fn build_booking_workflow(backends: &Backends) -> Graph {
    let login_task = Arc::new(LoginTask::new(backends.auth.clone()));
    let login_id = login_task.id().to_string();

    let test_selection_task = Arc::new(TestSelectionTask::new(backends.catalog.clone()));
    let test_selection_id = test_selection_task.id().to_string();

    let doctor_selection_task = Arc::new(DoctorSelectionTask::new(backends.catalog.clone()));
    let doctor_selection_id = doctor_selection_task.id().to_string();

    let schedule_task = Arc::new(ScheduleTask::new(backends.suggester.clone()));
    let schedule_id = schedule_task.id().to_string();

    let payment_task = Arc::new(PaymentTask::new(backends.appointments.clone()));
    let payment_id = payment_task.id().to_string();

    let receipt_task = Arc::new(ReceiptTask);
    let receipt_id = receipt_task.id().to_string();

    GraphBuilder::new("booking_workflow")
        .add_task(login_task)
        .add_task(test_selection_task)
        .add_task(doctor_selection_task)
        .add_task(schedule_task)
        .add_task(payment_task)
        .add_task(receipt_task)
        .add_edge(&login_id, &test_selection_id)
        .add_edge(&test_selection_id, &doctor_selection_id)
        .add_edge(&doctor_selection_id, &schedule_id)
        .add_edge(&schedule_id, &payment_id)
        .add_edge(&payment_id, &receipt_id)
        .build()
}

/// A new, logged-out session parked on the login screen.
pub async fn create_booking_session() -> Result<Session> {
    let session_id = Uuid::new_v4().to_string();

    let session = Session::new_from_task(session_id.clone(), Step::Login.id());
    session
        .context
        .set(session_keys::SESSION_ID, session_id)
        .await?;
    session
        .context
        .set(session_keys::BOOKING, BookingState::new())
        .await?;

    Ok(session)
}

pub fn create_flow_runner(backends: &Backends, session_storage: Arc<dyn SessionStorage>) -> FlowRunner {
    let graph = Arc::new(build_booking_workflow(backends));
    FlowRunner::new(graph, session_storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        appointments::InMemoryAppointmentStore, auth::InMemoryAuthProvider,
        catalog::InMemoryCatalog,
    };
    use wizard_flow::{Context, ExecutionStatus, InMemorySessionStorage};

    fn backends() -> Backends {
        Backends {
            catalog: Arc::new(InMemoryCatalog::seeded()),
            appointments: Arc::new(InMemoryAppointmentStore::new()),
            auth: Arc::new(InMemoryAuthProvider::new()),
            suggester: None,
        }
    }

    #[test]
    fn screens_are_chained_in_step_order() {
        let graph = build_booking_workflow(&backends());
        let context = Context::new();

        assert_eq!(graph.start_task_id().as_deref(), Some("login"));
        for pair in Step::ALL.windows(2) {
            assert_eq!(
                graph.find_next_task(pair[0].id(), &context).as_deref(),
                Some(pair[1].id())
            );
        }
        assert_eq!(graph.find_next_task(Step::Receipt.id(), &context), None);
    }

    #[tokio::test]
    async fn new_sessions_render_the_login_screen() {
        let runner = create_flow_runner(&backends(), Arc::new(InMemorySessionStorage::new()));
        let session = create_booking_session().await.unwrap();
        let session_id = session.id.clone();

        let (session, result) = runner.run_session(session).await.unwrap();
        assert_eq!(result.status, ExecutionStatus::WaitingForInput);
        assert!(result.redirected_from.is_none());
        assert_eq!(session.current_task_id, "login");
        assert_eq!(
            session.context.get::<String>(session_keys::SESSION_ID).await,
            Some(session_id)
        );
        assert_eq!(
            session.context.get::<BookingState>(session_keys::BOOKING).await,
            Some(BookingState::new())
        );
    }
}
