use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::models::Patient;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no account exists for {0}")]
    UserNotFound(String),

    #[error("Incorrect password or other error. Please try again.")]
    InvalidCredentials,

    #[error("{0}")]
    Registration(String),

    #[error("authentication provider unavailable: {0}")]
    Provider(String),
}

/// Email/password identity provider.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Patient, AuthError>;
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Patient, AuthError>;
}

/// Signs in, creating the account with `display_name` when the email is not
/// registered yet. Any other sign-in failure is reported as bad credentials.
pub async fn authenticate(
    provider: &dyn AuthProvider,
    display_name: &str,
    email: &str,
    password: &str,
) -> Result<Patient, AuthError> {
    match provider.sign_in(email, password).await {
        Ok(patient) => Ok(patient),
        Err(AuthError::UserNotFound(_)) => {
            info!(email = %email, "No account found, registering");
            provider
                .create_account(email, password, display_name)
                .await
                .map_err(|e| match e {
                    AuthError::Registration(message) => AuthError::Registration(message),
                    other => AuthError::Registration(other.to_string()),
                })
        }
        Err(_) => Err(AuthError::InvalidCredentials),
    }
}

struct Account {
    password: String,
    patient: Patient,
}

/// Accounts kept in process memory, for development and tests.
#[derive(Default)]
pub struct InMemoryAuthProvider {
    accounts: DashMap<String, Account>,
}

impl InMemoryAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthProvider for InMemoryAuthProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Patient, AuthError> {
        let account = self
            .accounts
            .get(&email.to_lowercase())
            .ok_or_else(|| AuthError::UserNotFound(email.to_string()))?;

        if account.password == password {
            Ok(account.patient.clone())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    async fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Patient, AuthError> {
        match self.accounts.entry(email.to_lowercase()) {
            Entry::Occupied(_) => Err(AuthError::Registration(format!(
                "an account already exists for {email}"
            ))),
            Entry::Vacant(entry) => {
                let patient = Patient {
                    uid: Uuid::new_v4().to_string(),
                    display_name: display_name.trim().to_string(),
                    email: Some(email.to_string()),
                };
                entry.insert(Account {
                    password: password.to_string(),
                    patient: patient.clone(),
                });
                Ok(patient)
            }
        }
    }
}
