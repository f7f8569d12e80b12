use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("{service} is not configured")]
    NotConfigured { service: &'static str },

    #[error("{service} url is invalid: {source}")]
    InvalidUrl {
        service: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("request to {service} failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} answered HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("invalid response format from {service}: {detail}")]
    Malformed {
        service: &'static str,
        detail: String,
    },

    #[error("unexpected response format from {service}")]
    Unexpected { service: &'static str },

    /// The remote script answered, but reported its own failure.
    #[error("{0}")]
    Service(String),
}

impl ConnectorError {
    /// The remote side answered with something that is not the agreed
    /// contract, usually a script deployed without the expected handler.
    pub fn is_misconfiguration(&self) -> bool {
        matches!(
            self,
            Self::Malformed { .. } | Self::Unexpected { .. } | Self::InvalidUrl { .. }
        )
    }

    /// Text suitable for a user-facing notice.
    pub fn hint(&self) -> String {
        match self {
            Self::NotConfigured { .. } => {
                "This service is not available right now. Please contact us directly.".to_string()
            }
            Self::Malformed { .. } | Self::Unexpected { .. } => {
                "Please add the doGet function to your Google Apps Script first. Check the README.md for instructions."
                    .to_string()
            }
            Self::InvalidUrl { .. } => {
                "Invalid response from server. Please verify your Google Apps Script setup."
                    .to_string()
            }
            Self::Transport { .. } => {
                "Connection error. Make sure your Google Apps Script is deployed as a web app accessible to 'Anyone'."
                    .to_string()
            }
            Self::Status {
                service, status, ..
            } if *service != "availability" => format!(
                "The {service} service answered with HTTP {status}. Please try again or contact us directly."
            ),
            Self::Status { status, body, .. } if body.trim().is_empty() => {
                format!("Unable to check availability. HTTP error! status: {status}")
            }
            Self::Status { status, body, .. } => format!(
                "Unable to check availability. HTTP error! status: {status} - {}",
                body.trim()
            ),
            Self::Service(message) => message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_failures_are_misconfiguration() {
        assert!(ConnectorError::Malformed {
            service: "availability",
            detail: "expected value".to_string()
        }
        .is_misconfiguration());
        assert!(ConnectorError::Unexpected {
            service: "availability"
        }
        .is_misconfiguration());
        assert!(!ConnectorError::Service("Sheet locked".to_string()).is_misconfiguration());
        assert!(!ConnectorError::Status {
            service: "availability",
            status: 500,
            body: String::new()
        }
        .is_misconfiguration());
    }

    #[test]
    fn script_hints_follow_the_setup_guide() {
        let missing_handler = "Please add the doGet function to your Google Apps Script first. Check the README.md for instructions.";
        assert_eq!(
            ConnectorError::Malformed {
                service: "availability",
                detail: "expected value".to_string()
            }
            .hint(),
            missing_handler
        );
        assert_eq!(
            ConnectorError::Unexpected {
                service: "availability"
            }
            .hint(),
            missing_handler
        );
        assert_eq!(
            ConnectorError::Status {
                service: "availability",
                status: 503,
                body: "Service Unavailable\n".to_string()
            }
            .hint(),
            "Unable to check availability. HTTP error! status: 503 - Service Unavailable"
        );
        assert_eq!(
            ConnectorError::Status {
                service: "availability",
                status: 404,
                body: String::new()
            }
            .hint(),
            "Unable to check availability. HTTP error! status: 404"
        );
    }
}
