pub mod appointments;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod error;
pub mod models;
pub mod service;
pub mod state;
pub mod suggestion;
pub mod tasks;
pub mod validation;
pub mod workflow;

pub use config::{AppConfig, LogFormat};
pub use error::BookingError;
pub use service::{AppState, build_router, create_app};
pub use state::{BookingState, Step};
pub use workflow::{Backends, build_booking_workflow, create_booking_session, create_flow_runner};
