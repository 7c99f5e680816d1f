use async_trait::async_trait;
use chrono::NaiveTime;
use rig::{
    agent::Agent,
    client::CompletionClient,
    completion::Prompt,
    providers::openrouter,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    error::BookingError,
    models::{Doctor, MedicalTest, TimePreference, TimeSuggestion},
};

const SUGGEST_TIME_PROMPT: &str = r#"
You are an assistant specialized in scheduling medical appointments.

You receive the test name, the doctor's name, the doctor's availability and the
patient's time preference. Suggest the best appointment time of day, taking into
account the availability, the preference and the kind of test (for example,
fasting blood work is best early in the morning).

Respond with ONLY this JSON (no explanation, no markdown, no additional text):
{
  "suggested_time": "HH:MM",
  "reasoning": "one or two sentences explaining the choice"
}

"suggested_time" MUST be a 24-hour clock time inside the doctor's availability
and MUST be one of the bookable slots: 09:00, 10:00, 11:00, 12:00, 13:00, 14:00,
15:00, 16:00.
"#;

#[derive(Debug, Clone, Serialize)]
pub struct SuggestionRequest {
    pub test_name: String,
    pub doctor_name: String,
    pub doctor_availability: String,
    pub patient_preferences: TimePreference,
}

impl SuggestionRequest {
    pub fn new(test: &MedicalTest, doctor: &Doctor, preference: TimePreference) -> Self {
        Self {
            test_name: test.name.clone(),
            doctor_name: doctor.name.clone(),
            doctor_availability: doctor.availability.clone(),
            patient_preferences: preference,
        }
    }

    fn to_prompt(&self) -> String {
        format!(
            "Test Name: {}\nDoctor Name: {}\nDoctor Availability: {}\nPatient Preferences: {}",
            self.test_name, self.doctor_name, self.doctor_availability, self.patient_preferences
        )
    }
}

/// Produces a suggested appointment time for a test/doctor pair.
#[async_trait]
pub trait TimeSuggester: Send + Sync {
    async fn suggest(&self, request: &SuggestionRequest) -> Result<TimeSuggestion, BookingError>;
}

/// Asks an LLM through OpenRouter and insists on a JSON answer.
pub struct RigTimeSuggester {
    api_key: String,
    model: String,
}

impl RigTimeSuggester {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn agent(&self) -> Agent<openrouter::CompletionModel> {
        let client = openrouter::Client::new(&self.api_key);
        client.agent(&self.model).preamble(SUGGEST_TIME_PROMPT).build()
    }
}

#[async_trait]
impl TimeSuggester for RigTimeSuggester {
    async fn suggest(&self, request: &SuggestionRequest) -> Result<TimeSuggestion, BookingError> {
        info!(
            test = %request.test_name,
            doctor = %request.doctor_name,
            preference = %request.patient_preferences,
            "Requesting time suggestion"
        );

        let response = self
            .agent()
            .prompt(request.to_prompt())
            .await
            .map_err(|e| BookingError::SuggestionFailed(e.to_string()))?;

        parse_suggestion(&response).inspect_err(|e| {
            warn!(error = %e, response = %response, "Unusable time suggestion");
        })
    }
}

/// Reads the JSON answer, tolerating a surrounding markdown code fence.
pub fn parse_suggestion(response: &str) -> Result<TimeSuggestion, BookingError> {
    let trimmed = response.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let suggestion: TimeSuggestion = serde_json::from_str(body)
        .map_err(|e| BookingError::SuggestionUnparseable(e.to_string()))?;
    suggested_clock_time(&suggestion)?;

    Ok(suggestion)
}

pub fn suggested_clock_time(suggestion: &TimeSuggestion) -> Result<NaiveTime, BookingError> {
    NaiveTime::parse_from_str(suggestion.suggested_time.trim(), "%H:%M").map_err(|_| {
        BookingError::SuggestionUnparseable(format!(
            "'{}' is not a HH:MM time",
            suggestion.suggested_time
        ))
    })
}
