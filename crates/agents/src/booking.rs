use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::{Duration, Local, NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use villa_connectors::{ConnectorError, SheetsClient};
use villa_core::stay::minimum_stay_message;
use villa_core::{
    build_confirmation, issue_reference, render_pdf, AvailabilityReport, BookingRecord,
    BookingSession, ContactMessage, GuestDetails, Notice, Package, StayDates, VillaPolicies,
};
use villa_observability::AppMetrics;
use villa_storage::{BookingSessionRepository, ConfirmationRepository, StoredConfirmation};

/// What the booking page renders for one session.
#[derive(Debug, Clone, Serialize)]
pub struct BookingSnapshot {
    pub session_id: String,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub nights: i64,
    pub package: Package,
    pub package_name: &'static str,
    pub rate: u32,
    pub total_cost: u64,
    pub validation_error: Option<String>,
    pub availability: Option<bool>,
    pub reference: Option<String>,
}

impl From<&BookingSession> for BookingSnapshot {
    fn from(session: &BookingSession) -> Self {
        let stay = &session.stay;
        Self {
            session_id: session.session_id.clone(),
            check_in: stay.check_in,
            check_out: stay.check_out,
            nights: stay.nights,
            package: stay.package,
            package_name: stay.package.display_name(),
            rate: stay.package.rate(),
            total_cost: stay.total_cost(),
            validation_error: stay.error.clone(),
            availability: session.availability,
            reference: session.reference.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingOutcome {
    pub session: BookingSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
}

#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    Saved {
        handoff_id: String,
        record: BookingRecord,
        notice: Notice,
    },
    Failed {
        notice: Notice,
    },
}

#[derive(Debug, Clone)]
pub enum ContactOutcome {
    Sent(Notice),
    Failed(Notice),
}

pub struct BookingAgent<S>
where
    S: BookingSessionRepository + ConfirmationRepository,
{
    store: Arc<S>,
    sheets: SheetsClient,
    policies: Arc<VillaPolicies>,
    metrics: Arc<AppMetrics>,
    session_ttl: Duration,
}

impl<S> BookingAgent<S>
where
    S: BookingSessionRepository + ConfirmationRepository,
{
    pub fn new(
        store: Arc<S>,
        sheets: SheetsClient,
        policies: Arc<VillaPolicies>,
        metrics: Arc<AppMetrics>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            store,
            sheets,
            policies,
            metrics,
            session_ttl,
        }
    }

    pub fn policies(&self) -> &VillaPolicies {
        &self.policies
    }

    pub async fn open_session(&self) -> Result<BookingSnapshot> {
        self.metrics.inc_request();
        let session = BookingSession::new(Uuid::new_v4().to_string(), self.expiry());
        self.store.upsert_booking_session(&session).await?;
        info!(session_id = %session.session_id, "booking session opened");
        Ok(BookingSnapshot::from(&session))
    }

    pub async fn snapshot(&self, session_id: &str) -> Result<Option<BookingSnapshot>> {
        Ok(self
            .store
            .load_booking_session(session_id)
            .await?
            .as_ref()
            .map(BookingSnapshot::from))
    }

    pub async fn set_check_in(
        &self,
        session_id: &str,
        check_in: NaiveDate,
    ) -> Result<Option<BookingOutcome>> {
        self.edit(session_id, |session| {
            session.stay.on_check_in_changed(check_in);
            None
        })
        .await
    }

    pub async fn set_check_out(
        &self,
        session_id: &str,
        check_out: NaiveDate,
    ) -> Result<Option<BookingOutcome>> {
        self.edit(session_id, |session| {
            session.stay.on_check_out_changed(check_out);
            None
        })
        .await
    }

    pub async fn select_package(
        &self,
        session_id: &str,
        package: Package,
    ) -> Result<Option<BookingOutcome>> {
        self.edit(session_id, |session| {
            if session.stay.on_package_selected(package) {
                None
            } else {
                Some(Notice::error(
                    format!("{} unavailable", package.display_name()),
                    minimum_stay_message(package),
                ))
            }
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn check_availability(&self, session_id: &str) -> Result<Option<BookingOutcome>> {
        let started = Instant::now();
        self.metrics.inc_request();

        let Some(mut session) = self.store.load_booking_session(session_id).await? else {
            return Ok(None);
        };

        let notice = match session.stay.dates() {
            None => Notice::error(
                "Missing dates",
                "Please select check-in and check-out dates first.",
            ),
            Some(dates) => {
                self.metrics.inc_availability_check();
                match self.sheets.check_availability(dates).await {
                    Ok(report) => {
                        session.availability = Some(report.available);
                        availability_notice(&report, dates)
                    }
                    Err(err) => {
                        warn!(
                            error = %err,
                            misconfigured = err.is_misconfiguration(),
                            "availability check failed"
                        );
                        connector_notice(&err)
                    }
                }
            }
        };

        session.expires_at = self.expiry();
        self.store.upsert_booking_session(&session).await?;
        self.metrics.observe_latency(started.elapsed());
        info!(
            session_id = %session_id,
            availability = ?session.availability,
            "availability checked"
        );

        Ok(Some(BookingOutcome {
            session: BookingSnapshot::from(&session),
            notice: Some(notice),
        }))
    }

    /// Issues the booking reference. Fails with a `BookingError` when the
    /// stay has no price yet.
    pub async fn confirm(&self, session_id: &str) -> Result<Option<BookingOutcome>> {
        self.metrics.inc_request();
        let Some(mut session) = self.store.load_booking_session(session_id).await? else {
            return Ok(None);
        };

        let reference = issue_reference(&session.stay, Local::now().naive_local())?;
        info!(session_id = %session_id, reference = %reference, "reference issued");
        session.reference = Some(reference);
        session.expires_at = self.expiry();
        self.store.upsert_booking_session(&session).await?;

        Ok(Some(BookingOutcome {
            session: BookingSnapshot::from(&session),
            notice: None,
        }))
    }

    #[instrument(skip(self, guest))]
    pub async fn submit(
        &self,
        session_id: &str,
        guest: GuestDetails,
    ) -> Result<Option<SubmitOutcome>> {
        let started = Instant::now();
        self.metrics.inc_request();

        let Some(session) = self.store.load_booking_session(session_id).await? else {
            return Ok(None);
        };
        let record = BookingRecord::from_session(&session, guest)?;
        let row = record.to_sheet_row(Local::now().naive_local());

        let outcome = match self.sheets.append_booking(&row).await {
            Ok(()) => {
                let handoff_id = new_handoff_id();
                let now = Utc::now();
                self.store
                    .save_confirmation(StoredConfirmation {
                        handoff_id: handoff_id.clone(),
                        record: record.clone(),
                        stored_at: now,
                        expires_at: now + self.session_ttl,
                    })
                    .await?;
                self.metrics.inc_booking_saved();
                info!(
                    session_id = %session_id,
                    reference = %record.booking_ref,
                    handoff_id = %handoff_id,
                    "booking saved"
                );
                SubmitOutcome::Saved {
                    handoff_id,
                    record,
                    notice: Notice::success("Success!", "Your booking details have been saved."),
                }
            }
            Err(err) => {
                warn!(error = %err, reference = %record.booking_ref, "booking not saved");
                SubmitOutcome::Failed {
                    notice: Notice::error(
                        "Error saving booking details!",
                        "Please try again or contact support.",
                    ),
                }
            }
        };

        self.metrics.observe_latency(started.elapsed());
        Ok(Some(outcome))
    }

    pub async fn confirmation(&self, handoff_id: &str) -> Result<Option<BookingRecord>> {
        Ok(self
            .store
            .load_confirmation(handoff_id)
            .await?
            .map(|stored| stored.record))
    }

    /// Renders the confirmation PDF, returning the booking reference with it.
    pub async fn confirmation_pdf(&self, handoff_id: &str) -> Result<Option<(String, Vec<u8>)>> {
        let Some(record) = self.confirmation(handoff_id).await? else {
            return Ok(None);
        };
        let document = build_confirmation(&record, &self.policies, Local::now().date_naive());
        Ok(Some((record.booking_ref, render_pdf(&document))))
    }

    #[instrument(skip(self, message))]
    pub async fn send_contact(&self, message: ContactMessage) -> Result<ContactOutcome> {
        self.metrics.inc_request();
        message.validate()?;

        let row = message.to_sheet_row(Local::now().naive_local());
        match self.sheets.append_contact(&row).await {
            Ok(()) => {
                self.metrics.inc_contact_message();
                info!(subject = %message.subject, "contact message sent");
                Ok(ContactOutcome::Sent(Notice::success(
                    "Success!",
                    "Your message sent successfully.",
                )))
            }
            Err(err) => {
                warn!(error = %err, "contact message not sent");
                Ok(ContactOutcome::Failed(Notice::error(
                    "Error sending message",
                    "Please try again or contact support.",
                )))
            }
        }
    }

    /// Any change to the stay invalidates the last availability answer and
    /// the issued reference.
    async fn edit<F>(&self, session_id: &str, apply: F) -> Result<Option<BookingOutcome>>
    where
        F: FnOnce(&mut BookingSession) -> Option<Notice>,
    {
        self.metrics.inc_request();
        let Some(mut session) = self.store.load_booking_session(session_id).await? else {
            return Ok(None);
        };

        let before = session.stay.clone();
        let notice = apply(&mut session);
        if session.stay != before {
            session.availability = None;
            session.reference = None;
        }
        session.expires_at = self.expiry();
        self.store.upsert_booking_session(&session).await?;

        Ok(Some(BookingOutcome {
            session: BookingSnapshot::from(&session),
            notice,
        }))
    }

    fn expiry(&self) -> chrono::DateTime<Utc> {
        Utc::now() + self.session_ttl
    }
}

fn new_handoff_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("booking_{}", &id[..8])
}

fn availability_notice(report: &AvailabilityReport, dates: StayDates) -> Notice {
    if report.available {
        let description = report.message.clone().unwrap_or_else(|| {
            format!(
                "Villa Shaa is available from {} to {}",
                dates.check_in.format("%-m/%-d/%Y"),
                dates.check_out.format("%-m/%-d/%Y")
            )
        });
        Notice::success("Dates Available!", description)
    } else {
        let description = report.message.clone().unwrap_or_else(|| {
            let count = report.conflicting_bookings.unwrap_or(0);
            format!(
                "There {} {} booking{} conflicting with your selected dates.",
                if count == 1 { "is" } else { "are" },
                count,
                if count > 1 { "s" } else { "" }
            )
        });
        Notice::error("Dates Not Available", description)
    }
}

fn connector_notice(err: &ConnectorError) -> Notice {
    Notice::error("Error", err.hint())
}
