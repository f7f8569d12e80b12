use std::env;
use std::time::Duration;

use villa_connectors::nlu::{DEFAULT_BASE_URL, DEFAULT_LANGUAGE};
use villa_connectors::{DialogflowConfig, SheetsConfig};

/// Runtime settings, read once at start-up.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind: String,
    pub session_ttl: Duration,
    pub rate_limit_window: Duration,
    pub rate_limit_max: usize,
    pub allowed_origins: Vec<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub sheets: SheetsConfig,
    pub nlu: Option<DialogflowConfig>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            session_ttl: Duration::from_secs(60 * 60 * 24),
            rate_limit_window: Duration::from_secs(60),
            rate_limit_max: 120,
            allowed_origins: default_origins(),
            phone: None,
            email: None,
            sheets: SheetsConfig::default(),
            nlu: None,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let session_ttl = Duration::from_secs(
            env::var("VILLA_SESSION_TTL_SECONDS")
                .ok()
                .and_then(|value| value.parse::<u64>().ok())
                .unwrap_or(defaults.session_ttl.as_secs()),
        );
        let rate_limit_window = Duration::from_secs(
            env::var("VILLA_RATE_LIMIT_WINDOW_SECONDS")
                .ok()
                .and_then(|value| value.parse::<u64>().ok())
                .unwrap_or(defaults.rate_limit_window.as_secs()),
        );
        let rate_limit_max = env::var("VILLA_RATE_LIMIT_MAX")
            .ok()
            .and_then(|value| value.parse::<usize>().ok())
            .unwrap_or(defaults.rate_limit_max);

        let allowed_origins = env::var("VILLA_ALLOWED_ORIGINS")
            .ok()
            .map(|value| {
                value
                    .split(',')
                    .map(|origin| origin.trim().trim_end_matches('/').to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|origins| !origins.is_empty())
            .unwrap_or(defaults.allowed_origins);

        let nlu = match (
            non_empty_env("VILLA_NLU_PROJECT_ID"),
            non_empty_env("VILLA_NLU_ACCESS_TOKEN"),
        ) {
            (Some(project_id), Some(access_token)) => Some(DialogflowConfig {
                base_url: non_empty_env("VILLA_NLU_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                project_id,
                access_token,
                language_code: non_empty_env("VILLA_NLU_LANGUAGE")
                    .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            }),
            _ => None,
        };

        Self {
            bind: non_empty_env("VILLA_BIND").unwrap_or(defaults.bind),
            session_ttl,
            rate_limit_window,
            rate_limit_max,
            allowed_origins,
            phone: non_empty_env("VILLA_PHONE"),
            email: non_empty_env("VILLA_EMAIL"),
            sheets: SheetsConfig {
                availability_url: non_empty_env("VILLA_AVAILABILITY_URL"),
                bookings_url: non_empty_env("VILLA_BOOKINGS_URL"),
                contact_url: non_empty_env("VILLA_CONTACT_URL"),
            },
            nlu,
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn default_origins() -> Vec<String> {
    [
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "https://villashaa.com",
        "https://www.villashaa.com",
    ]
    .iter()
    .map(|value| value.to_string())
    .collect()
}
