use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;
use villa_core::{AvailabilityReport, StayDates};

use crate::error::ConnectorError;

const AVAILABILITY: &str = "availability";
const BOOKINGS: &str = "bookings";
const CONTACT: &str = "contact";

/// Web-app script endpoints. Each one is optional; an unset endpoint makes
/// the matching call fail with [`ConnectorError::NotConfigured`].
#[derive(Debug, Clone, Default)]
pub struct SheetsConfig {
    pub availability_url: Option<String>,
    pub bookings_url: Option<String>,
    pub contact_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SheetsClient {
    http: Client,
    config: SheetsConfig,
}

impl SheetsClient {
    pub fn new(http: Client, config: SheetsConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &SheetsConfig {
        &self.config
    }

    pub async fn check_availability(
        &self,
        dates: StayDates,
    ) -> Result<AvailabilityReport, ConnectorError> {
        let base = endpoint(AVAILABILITY, self.config.availability_url.as_deref())?;
        let url = Url::parse_with_params(
            base,
            &[
                ("checkIn", dates.check_in.format("%Y-%m-%d").to_string()),
                ("checkOut", dates.check_out.format("%Y-%m-%d").to_string()),
            ],
        )
        .map_err(|source| ConnectorError::InvalidUrl {
            service: AVAILABILITY,
            source,
        })?;

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| ConnectorError::Transport {
                service: AVAILABILITY,
                source,
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|source| ConnectorError::Transport {
                service: AVAILABILITY,
                source,
            })?;
        if !status.is_success() {
            return Err(ConnectorError::Status {
                service: AVAILABILITY,
                status: status.as_u16(),
                body: text,
            });
        }

        let payload: Value =
            serde_json::from_str(&text).map_err(|err| ConnectorError::Malformed {
                service: AVAILABILITY,
                detail: err.to_string(),
            })?;
        debug!(payload = %payload, "availability answered");

        parse_availability(&payload)
    }

    pub async fn append_booking(&self, row: &Map<String, Value>) -> Result<(), ConnectorError> {
        let url = endpoint(BOOKINGS, self.config.bookings_url.as_deref())?;
        self.post_row(BOOKINGS, url, row).await
    }

    pub async fn append_contact(&self, row: &Map<String, Value>) -> Result<(), ConnectorError> {
        let url = endpoint(CONTACT, self.config.contact_url.as_deref())?;
        self.post_row(CONTACT, url, row).await
    }

    /// The scripts read the raw body, so the JSON goes out as plain text to
    /// avoid a CORS preflight on their side.
    async fn post_row(
        &self,
        service: &'static str,
        url: &str,
        row: &Map<String, Value>,
    ) -> Result<(), ConnectorError> {
        let body = Value::Object(row.clone()).to_string();
        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "text/plain;charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(|source| ConnectorError::Transport { service, source })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(service, status = status.as_u16(), "row rejected");
            return Err(ConnectorError::Status {
                service,
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

fn endpoint<'a>(service: &'static str, url: Option<&'a str>) -> Result<&'a str, ConnectorError> {
    url.map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(ConnectorError::NotConfigured { service })
}

/// Interprets the availability script's answer:
/// `{success, available, message?, conflictingBookings?, error?}`.
pub fn parse_availability(payload: &Value) -> Result<AvailabilityReport, ConnectorError> {
    let message = |key: &str| {
        payload
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    if payload.get("success").and_then(Value::as_bool) == Some(false) {
        let reason = message("error")
            .or_else(|| message("message"))
            .unwrap_or_else(|| "Failed to check availability".to_string());
        return Err(ConnectorError::Service(reason));
    }

    let succeeded = payload
        .get("success")
        .map(is_truthy)
        .unwrap_or(false);
    match payload.get("available") {
        Some(available) if succeeded => Ok(AvailabilityReport {
            available: is_truthy(available),
            message: message("message"),
            conflicting_bookings: payload
                .get("conflictingBookings")
                .and_then(Value::as_u64)
                .map(|count| count.min(u64::from(u32::MAX)) as u32),
        }),
        _ => Err(ConnectorError::Unexpected {
            service: AVAILABILITY,
        }),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
