use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::models::{BookingSession, ContactMessage, GuestDetails};
use crate::stay::StaySelection;

pub const CURRENCY: &str = "USD";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BookingError {
    #[error("Please select valid dates to book.")]
    NoBookableDates,
    #[error("Generate a booking reference before submitting.")]
    MissingReference,
    #[error("Please fill in {0}.")]
    MissingField(&'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRecord {
    pub booking_ref: String,
    pub status: String,
    pub guest: GuestDetails,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: i64,
    pub currency: String,
    pub package_name: String,
    pub package_price: u32,
    pub total_amount: u64,
}

/// `VS-YYYYMMDDHHMMSS`, issued only for a stay that costs something.
pub fn issue_reference(stay: &StaySelection, now: NaiveDateTime) -> Result<String, BookingError> {
    if stay.total_cost() == 0 {
        return Err(BookingError::NoBookableDates);
    }
    Ok(format!("VS-{}", now.format("%Y%m%d%H%M%S")))
}

pub fn validate_guest(guest: &GuestDetails) -> Result<(), BookingError> {
    if guest.adults == 0 {
        return Err(BookingError::MissingField("the number of adults"));
    }
    for (value, field) in [
        (&guest.name, "your name"),
        (&guest.email, "your email"),
        (&guest.phone, "your phone number"),
    ] {
        if value.trim().is_empty() {
            return Err(BookingError::MissingField(field));
        }
    }
    Ok(())
}

impl BookingRecord {
    pub fn from_session(session: &BookingSession, guest: GuestDetails) -> Result<Self, BookingError> {
        let reference = session
            .reference
            .clone()
            .ok_or(BookingError::MissingReference)?;
        let dates = session.stay.dates().ok_or(BookingError::NoBookableDates)?;
        validate_guest(&guest)?;

        let package = session.stay.package;
        Ok(Self {
            booking_ref: reference,
            status: "REQUESTED".to_string(),
            guest: GuestDetails {
                name: guest.name.trim().to_string(),
                email: guest.email.trim().to_string(),
                phone: guest.phone.trim().to_string(),
                ..guest
            },
            check_in: dates.check_in,
            check_out: dates.check_out,
            nights: session.stay.nights,
            currency: CURRENCY.to_string(),
            package_name: package.display_name().to_string(),
            package_price: package.rate(),
            total_amount: session.stay.total_cost(),
        })
    }

    /// Flat row appended to the bookings sheet.
    pub fn to_sheet_row(&self, submitted_at: NaiveDateTime) -> Map<String, Value> {
        let row = json!({
            "BOOKING_REFERENCE": self.booking_ref,
            "STATUS": self.status,
            "NAME": self.guest.name,
            "EMAIL": self.guest.email,
            "PHONE": self.guest.phone,
            "ADULTS": self.guest.adults,
            "CHILDREN": self.guest.children,
            "CHECK_IN": self.check_in.format("%Y-%m-%d").to_string(),
            "CHECK_OUT": self.check_out.format("%Y-%m-%d").to_string(),
            "PACKAGE": self.package_name,
            "RATE": self.package_price,
            "NIGHTS": self.nights,
            "DEPOSIT": 0,
            "CURRENCY": self.currency,
            "TOTAL": self.total_amount,
            "TIME": sheet_timestamp(submitted_at),
        });
        into_map(row)
    }
}

impl ContactMessage {
    pub fn validate(&self) -> Result<(), BookingError> {
        for (value, field) in [
            (&self.name, "your name"),
            (&self.email, "your email"),
            (&self.message, "a message"),
        ] {
            if value.trim().is_empty() {
                return Err(BookingError::MissingField(field));
            }
        }
        Ok(())
    }

    pub fn to_sheet_row(&self, sent_at: NaiveDateTime) -> Map<String, Value> {
        into_map(json!({
            "NAME": self.name.trim(),
            "EMAIL": self.email.trim(),
            "PHONE": self.phone.trim(),
            "SUBJECT": self.subject.trim(),
            "MESSAGE": self.message.trim(),
            "TIME": sheet_timestamp(sent_at),
        }))
    }
}

/// `Jun 1, 2025, 3:04:05 PM`
pub fn sheet_timestamp(at: NaiveDateTime) -> String {
    at.format("%b %-d, %Y, %-I:%M:%S %p").to_string()
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
