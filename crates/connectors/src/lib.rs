pub mod error;
pub mod nlu;
pub mod sheets;

use std::time::Duration;

use reqwest::Client;

pub use error::ConnectorError;
pub use nlu::{Detector, DialogflowClient, DialogflowConfig, IntentDetector};
pub use sheets::{SheetsClient, SheetsConfig};

/// Shared client for every outbound call. No retries are attempted.
pub fn build_http_client() -> reqwest::Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(6))
        .timeout(Duration::from_secs(20))
        .build()
}
