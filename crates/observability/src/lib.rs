use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

#[derive(Debug, Default)]
pub struct AppMetrics {
    requests_total: AtomicU64,
    local_replies_total: AtomicU64,
    nlu_requests_total: AtomicU64,
    nlu_fallback_total: AtomicU64,
    availability_checks_total: AtomicU64,
    bookings_saved_total: AtomicU64,
    contact_messages_total: AtomicU64,
    total_latency_millis: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub local_replies_total: u64,
    pub nlu_requests_total: u64,
    pub nlu_fallback_total: u64,
    pub availability_checks_total: u64,
    pub bookings_saved_total: u64,
    pub contact_messages_total: u64,
    pub avg_latency_millis: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_local_reply(&self) {
        self.local_replies_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_nlu_request(&self) {
        self.nlu_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_nlu_fallback(&self) {
        self.nlu_fallback_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_availability_check(&self) {
        self.availability_checks_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_booking_saved(&self) {
        self.bookings_saved_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_contact_message(&self) {
        self.contact_messages_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = self.requests_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);

        MetricsSnapshot {
            requests_total: requests,
            local_replies_total: self.local_replies_total.load(Ordering::Relaxed),
            nlu_requests_total: self.nlu_requests_total.load(Ordering::Relaxed),
            nlu_fallback_total: self.nlu_fallback_total.load(Ordering::Relaxed),
            availability_checks_total: self.availability_checks_total.load(Ordering::Relaxed),
            bookings_saved_total: self.bookings_saved_total.load(Ordering::Relaxed),
            contact_messages_total: self.contact_messages_total.load(Ordering::Relaxed),
            avg_latency_millis: if requests == 0 {
                0.0
            } else {
                latency as f64 / requests as f64
            },
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,villa_api=info,villa_agents=info,villa_connectors=info",
                service_name
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_averages_latency_per_request() {
        let metrics = AppMetrics::default();
        metrics.inc_request();
        metrics.inc_request();
        metrics.observe_latency(Duration::from_millis(30));
        metrics.inc_nlu_fallback();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_total, 2);
        assert_eq!(snapshot.nlu_fallback_total, 1);
        assert!((snapshot.avg_latency_millis - 15.0).abs() < f64::EPSILON);
    }
}
