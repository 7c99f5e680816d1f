use anyhow::{Context, Result};

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_SUGGESTION_MODEL: &str = "openai/gpt-4o-mini";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Runtime settings, read from the environment once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Postgres for sessions, catalog and appointments. In-memory when unset.
    pub database_url: Option<String>,
    /// Time suggestions are disabled without a key.
    pub openrouter_api_key: Option<String>,
    pub suggestion_model: String,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            openrouter_api_key: None,
            suggestion_model: DEFAULT_SUGGESTION_MODEL.to_string(),
            log_format: LogFormat::Json,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = match non_empty("PORT") {
            Some(port) => port
                .trim()
                .parse::<u16>()
                .with_context(|| format!("PORT must be a port number, got '{port}'"))?,
            None => DEFAULT_PORT,
        };

        let log_format = match non_empty("LOG_FORMAT").as_deref() {
            Some("pretty") => LogFormat::Pretty,
            _ => LogFormat::Json,
        };

        Ok(Self {
            port,
            database_url: non_empty("DATABASE_URL"),
            openrouter_api_key: non_empty("OPENROUTER_API_KEY"),
            suggestion_model: non_empty("SUGGESTION_MODEL")
                .unwrap_or_else(|| DEFAULT_SUGGESTION_MODEL.to_string()),
            log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config(&[]).unwrap();
        assert_eq!(config.port, 3000);
        assert!(config.database_url.is_none());
        assert!(config.openrouter_api_key.is_none());
        assert_eq!(config.suggestion_model, "openai/gpt-4o-mini");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn reads_every_setting() {
        let config = config(&[
            ("PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/booking"),
            ("OPENROUTER_API_KEY", "sk-test"),
            ("SUGGESTION_MODEL", "anthropic/claude-3-haiku"),
            ("LOG_FORMAT", "pretty"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/booking"));
        assert_eq!(config.openrouter_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.suggestion_model, "anthropic/claude-3-haiku");
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = config(&[("OPENROUTER_API_KEY", "  "), ("DATABASE_URL", "")]).unwrap();
        assert!(config.openrouter_api_key.is_none());
        assert!(config.database_url.is_none());
    }

    #[test]
    fn bad_port_is_an_error() {
        assert!(config(&[("PORT", "http")]).is_err());
    }
}
