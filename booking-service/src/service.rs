use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::Json,
    routing::{get, post},
};
use serde_json::{Value, json};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;
use wizard_flow::{
    ExecutionResult, ExecutionStatus, FlowRunner, InMemorySessionStorage, PostgresSessionStorage,
    Session, SessionStorage,
};

use crate::{
    appointments::{AppointmentStore, InMemoryAppointmentStore, PostgresAppointmentStore},
    auth::InMemoryAuthProvider,
    catalog::{CatalogStore, InMemoryCatalog, PostgresCatalog},
    config::AppConfig,
    models::{
        AppointmentRecord, Doctor, MedicalTest, Notification, SessionResponse, StepResponse,
        VisitRequest,
    },
    state::{BookingState, Step},
    suggestion::{RigTimeSuggester, TimeSuggester},
    tasks::session_keys,
    workflow::{Backends, create_booking_session, create_flow_runner},
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "id": id
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

#[derive(Clone)]
pub struct AppState {
    pub session_storage: Arc<dyn SessionStorage>,
    pub flow_runner: FlowRunner,
    pub catalog: Arc<dyn CatalogStore>,
    pub appointments: Arc<dyn AppointmentStore>,
}

impl AppState {
    pub fn new(backends: Backends, session_storage: Arc<dyn SessionStorage>) -> Self {
        let flow_runner = create_flow_runner(&backends, session_storage.clone());
        Self {
            session_storage,
            flow_runner,
            catalog: backends.catalog,
            appointments: backends.appointments,
        }
    }

    /// Everything in process memory, with the standard catalog.
    pub fn in_memory(suggester: Option<Arc<dyn TimeSuggester>>) -> Self {
        let backends = Backends {
            catalog: Arc::new(InMemoryCatalog::seeded()),
            appointments: Arc::new(InMemoryAppointmentStore::new()),
            auth: Arc::new(InMemoryAuthProvider::new()),
            suggester,
        };
        Self::new(backends, Arc::new(InMemorySessionStorage::new()))
    }
}

pub async fn create_app(config: &AppConfig) -> Router {
    let app_state = create_app_state(config).await;
    build_router(app_state)
}

async fn create_app_state(config: &AppConfig) -> AppState {
    let suggester: Option<Arc<dyn TimeSuggester>> = match &config.openrouter_api_key {
        Some(api_key) => {
            info!(model = %config.suggestion_model, "AI time suggestions enabled");
            Some(Arc::new(RigTimeSuggester::new(
                api_key.clone(),
                config.suggestion_model.clone(),
            )))
        }
        None => {
            warn!("OPENROUTER_API_KEY not set, AI time suggestions are disabled");
            None
        }
    };

    let Some(database_url) = &config.database_url else {
        info!("Using in-memory storage (set DATABASE_URL to use PostgreSQL)");
        return AppState::in_memory(suggester);
    };

    info!("Using PostgreSQL storage");
    match connect_postgres(database_url, suggester.clone()).await {
        Ok(state) => state,
        Err(e) => {
            error!(
                "Failed to set up PostgreSQL: {}. Falling back to in-memory storage.",
                e
            );
            AppState::in_memory(suggester)
        }
    }
}

async fn connect_postgres(
    database_url: &str,
    suggester: Option<Arc<dyn TimeSuggester>>,
) -> anyhow::Result<AppState> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    PostgresSessionStorage::migrate(&pool).await?;
    let catalog = PostgresCatalog::new(pool.clone());
    catalog.migrate().await?;
    let appointments = PostgresAppointmentStore::new(pool.clone());
    appointments.migrate().await?;

    let backends = Backends {
        catalog: Arc::new(catalog),
        appointments: Arc::new(appointments),
        auth: Arc::new(InMemoryAuthProvider::new()),
        suggester,
    };
    Ok(AppState::new(
        backends,
        Arc::new(PostgresSessionStorage::from_pool(pool)),
    ))
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/sessions", post(start_session))
        .route("/sessions/{session_id}", get(get_session).delete(end_session))
        .route("/sessions/{session_id}/screens/{step}", post(visit_screen))
        .route("/sessions/{session_id}/logout", post(logout))
        .route("/catalog/tests", get(list_tests))
        .route("/catalog/tests/{test_id}/doctors", get(list_doctors))
        .route("/appointments/{appointment_id}", get(get_appointment))
        .layer(from_fn(correlation_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Tags every request with a fresh correlation id and runs it inside a span carrying it.
async fn correlation_id_middleware(
    mut request: Request<axum::body::Body>,
    next: Next,
) -> axum::response::Response {
    let correlation_id = Uuid::new_v4().to_string();
    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert("x-correlation-id", value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Diagnostic Appointment Booking Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Step-by-step booking of diagnostic tests: test, doctor, time, payment, receipt",
        "steps": Step::ALL.iter().map(|step| step.id()).collect::<Vec<_>>(),
        "endpoints": {
            "POST /sessions": "Start a booking session",
            "GET /sessions/{session_id}": "Get the session's booking state",
            "POST /sessions/{session_id}/screens/{step}": "Visit a screen, optionally submitting its action",
            "POST /sessions/{session_id}/logout": "Log out and clear the booking",
            "DELETE /sessions/{session_id}": "End the session",
            "GET /catalog/tests": "List medical tests",
            "GET /catalog/tests/{test_id}/doctors": "List doctors performing a test",
            "GET /appointments/{appointment_id}": "Get a confirmed appointment",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn start_session(State(state): State<AppState>) -> ApiResult<StepResponse> {
    let session = create_booking_session().await.map_err(|e| {
        error!(error = %e, "Failed to create session");
        internal_error("Failed to create booking session", &e.to_string())
    })?;
    info!(session_id = %session.id, "Booking session created");

    run_step(&state, session).await
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionResponse> {
    let session = load_session(&state, &session_id).await?;
    let booking = booking_state(&session);

    Ok(Json(SessionResponse {
        session_id: session.id.clone(),
        current_step: session.current_task_id.clone(),
        status_message: session.status_message.clone(),
        booking: booking.view(),
        suggestion: session.context.get(session_keys::TIME_SUGGESTION).await,
    }))
}

async fn visit_screen(
    State(state): State<AppState>,
    Path((session_id, step)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<StepResponse> {
    let step: Step = step
        .parse()
        .map_err(|e: String| not_found_error(&e, &step))?;
    let request = parse_visit(&body)?;

    let _guard = state.flow_runner.lock_session(&session_id).await;
    let mut session = load_session(&state, &session_id).await?;

    info!(
        session_id = %session_id,
        step = %step.id(),
        action = ?request.action.as_ref().map(|a| a.name()),
        "Visiting screen"
    );

    session.context.remove(session_keys::NOTIFICATION).await;
    // A visit the guard will redirect never reaches its screen, so neither does its action.
    let redirected = booking_state(&session).guard(step).is_some();
    if let Some(action) = request.action.filter(|_| !redirected) {
        session
            .context
            .set(session_keys::SCREEN_ACTION, action)
            .await
            .map_err(|e| internal_error("Failed to record screen action", &e.to_string()))?;
    }

    session.current_task_id = step.id().to_string();
    run_step(&state, session).await
}

async fn logout(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<StepResponse> {
    let _guard = state.flow_runner.lock_session(&session_id).await;
    let mut session = load_session(&state, &session_id).await?;

    let mut booking = booking_state(&session);
    booking.logout();
    session
        .context
        .set(session_keys::BOOKING, &booking)
        .await
        .map_err(|e| internal_error("Failed to clear session", &e.to_string()))?;
    session.context.remove(session_keys::TIME_SUGGESTION).await;
    session.context.remove(session_keys::SCREEN_ACTION).await;
    session
        .context
        .set(
            session_keys::NOTIFICATION,
            Notification::info("Logged Out", "You have been successfully logged out."),
        )
        .await
        .map_err(|e| internal_error("Failed to clear session", &e.to_string()))?;

    info!(session_id = %session_id, "Patient logged out");
    session.current_task_id = Step::Login.id().to_string();
    run_step(&state, session).await
}

async fn end_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    load_session(&state, &session_id).await?;

    state
        .flow_runner
        .delete_session(&session_id)
        .await
        .map_err(|e| {
            error!(session_id = %session_id, error = %e, "Failed to delete session");
            internal_error("Failed to delete session", &e.to_string())
        })?;

    info!(session_id = %session_id, "Booking session ended");
    Ok(StatusCode::NO_CONTENT)
}

async fn list_tests(State(state): State<AppState>) -> ApiResult<Vec<MedicalTest>> {
    state.catalog.list_tests().await.map(Json).map_err(|e| {
        error!(error = %e, "Failed to list tests");
        internal_error("Could not fetch medical tests", &e.to_string())
    })
}

async fn list_doctors(
    State(state): State<AppState>,
    Path(test_id): Path<String>,
) -> ApiResult<Vec<Doctor>> {
    let catalog_error = |e: crate::error::BookingError| {
        error!(test_id = %test_id, error = %e, "Failed to list doctors");
        internal_error("Could not fetch doctors", &e.to_string())
    };

    if state.catalog.get_test(&test_id).await.map_err(catalog_error)?.is_none() {
        return Err(not_found_error("Test not found", &test_id));
    }
    state
        .catalog
        .doctors_for_test(&test_id)
        .await
        .map(Json)
        .map_err(catalog_error)
}

async fn get_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<String>,
) -> ApiResult<AppointmentRecord> {
    match state.appointments.get(&appointment_id).await {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err(not_found_error("Appointment not found", &appointment_id)),
        Err(e) => {
            error!(appointment_id = %appointment_id, error = %e, "Failed to load appointment");
            Err(internal_error("Failed to load appointment", &e.to_string()))
        }
    }
}

fn parse_visit(body: &[u8]) -> Result<VisitRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(VisitRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| bad_request_error("Invalid screen request", &e.to_string()))
}

async fn load_session(state: &AppState, session_id: &str) -> Result<Session, ApiError> {
    match state.session_storage.get(session_id).await {
        Ok(Some(session)) => Ok(session),
        Ok(None) => Err(not_found_error("Session not found", session_id)),
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Failed to load session");
            Err(internal_error("Failed to load session", &e.to_string()))
        }
    }
}

fn booking_state(session: &Session) -> BookingState {
    session
        .context
        .get_sync(session_keys::BOOKING)
        .unwrap_or_default()
}

/// Executes the screen the session points at, persists it and renders the outcome.
async fn run_step(state: &AppState, session: Session) -> ApiResult<StepResponse> {
    let session_id = session.id.clone();

    match state.flow_runner.run_session(session).await {
        Ok((session, result)) => {
            info!(
                session_id = %session_id,
                current_step = %session.current_task_id,
                status = ?result.status,
                redirected_from = ?result.redirected_from,
                "Screen executed"
            );
            Ok(Json(step_response(&session, result)))
        }
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Failed to execute screen");
            Err(internal_error("Failed to execute screen", &e.to_string()))
        }
    }
}

fn step_response(session: &Session, result: ExecutionResult) -> StepResponse {
    let status = match result.status {
        ExecutionStatus::WaitingForInput => "waiting_for_input",
        ExecutionStatus::Completed => "completed",
    };

    StepResponse {
        session_id: session.id.clone(),
        current_step: session.current_task_id.clone(),
        status: status.to_string(),
        response: result.response,
        redirected_from: result.redirected_from,
        notification: session.context.get_sync(session_keys::NOTIFICATION),
        booking: booking_state(session).view(),
    }
}
