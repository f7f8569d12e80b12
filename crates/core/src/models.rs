use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::stay::StaySelection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Package {
    Standard,
    Premium,
}

impl Package {
    pub const ALL: [Package; 2] = [Package::Standard, Package::Premium];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "standard" | "standard stay" => Some(Self::Standard),
            "premium" | "premium experience" => Some(Self::Premium),
            _ => None,
        }
    }

    pub fn min_nights(self) -> i64 {
        match self {
            Self::Standard => 7,
            Self::Premium => 60,
        }
    }

    /// Nightly rate in USD.
    pub fn rate(self) -> u32 {
        match self {
            Self::Standard => 30,
            Self::Premium => 27,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Standard => "Standard Stay",
            Self::Premium => "Premium Experience",
        }
    }

    pub fn features(self) -> &'static [&'static str] {
        match self {
            Self::Standard => &[
                "Minimum 7 nights stay",
                "Full villa access",
                "Free WiFi (Limited)",
                "Garden access",
                "Basic amenities",
            ],
            Self::Premium => &[
                "Minimum 60 nights stay",
                "Discount for long stays",
                "Everything in Standard",
                "Weekly housekeeping",
                "Airport transfer",
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PackageInfo {
    pub id: Package,
    pub name: &'static str,
    pub price: u32,
    pub duration: &'static str,
    pub min_nights: i64,
    pub features: Vec<&'static str>,
    pub popular: bool,
}

impl From<Package> for PackageInfo {
    fn from(package: Package) -> Self {
        Self {
            id: package,
            name: package.display_name(),
            price: package.rate(),
            duration: "per night",
            min_nights: package.min_nights(),
            features: package.features().to_vec(),
            popular: package == Package::Premium,
        }
    }
}

/// Symbolic values carried by chat buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonTag {
    NewBookingYes,
    NewBookingNo,
    BookNow,
    BookLater,
    ConfirmCheckInDate,
    ChangeCheckInDate,
    ConfirmCheckOutDate,
    ChangeCheckOutDate,
    ProceedCheckAvailability,
}

impl ButtonTag {
    pub fn as_code(self) -> &'static str {
        match self {
            Self::NewBookingYes => "NEW_BOOKING_YES",
            Self::NewBookingNo => "NEW_BOOKING_NO",
            Self::BookNow => "BOOK_NOW",
            Self::BookLater => "BOOK_LATER",
            Self::ConfirmCheckInDate => "CONFIRM_CHECKIN_DATE",
            Self::ChangeCheckInDate => "CHANGE_CHECKIN_DATE",
            Self::ConfirmCheckOutDate => "CONFIRM_CHECKOUT_DATE",
            Self::ChangeCheckOutDate => "CHANGE_CHECKOUT_DATE",
            Self::ProceedCheckAvailability => "PROCEED_CHECK_AVAILABILITY",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "NEW_BOOKING_YES" => Some(Self::NewBookingYes),
            "NEW_BOOKING_NO" => Some(Self::NewBookingNo),
            "BOOK_NOW" => Some(Self::BookNow),
            "BOOK_LATER" => Some(Self::BookLater),
            "CONFIRM_CHECKIN_DATE" => Some(Self::ConfirmCheckInDate),
            "CHANGE_CHECKIN_DATE" => Some(Self::ChangeCheckInDate),
            "CONFIRM_CHECKOUT_DATE" => Some(Self::ConfirmCheckOutDate),
            "CHANGE_CHECKOUT_DATE" => Some(Self::ChangeCheckOutDate),
            "PROCEED_CHECK_AVAILABILITY" => Some(Self::ProceedCheckAvailability),
            _ => None,
        }
    }
}

/// A button value as it arrives on the wire: either one of the known tags or
/// an opaque value that is forwarded to the NLU service untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ButtonValue {
    Tag(ButtonTag),
    Other(String),
}

impl ButtonValue {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Tag(tag) => tag.as_code(),
            Self::Other(value) => value.as_str(),
        }
    }
}

impl From<String> for ButtonValue {
    fn from(value: String) -> Self {
        match ButtonTag::from_code(&value) {
            Some(tag) => Self::Tag(tag),
            None => Self::Other(value),
        }
    }
}

impl From<ButtonValue> for String {
    fn from(value: ButtonValue) -> Self {
        value.as_str().to_string()
    }
}

impl From<ButtonTag> for ButtonValue {
    fn from(tag: ButtonTag) -> Self {
        Self::Tag(tag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatButton {
    pub text: String,
    pub value: ButtonValue,
}

impl ChatButton {
    pub fn new(text: &str, tag: ButtonTag) -> Self {
        Self {
            text: text.to_string(),
            value: ButtonValue::Tag(tag),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub text: String,
    pub is_bot: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buttons: Option<Vec<ChatButton>>,
}

/// Which date the conversation is currently collecting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueState {
    #[default]
    Idle,
    AwaitingCheckIn,
    AwaitingCheckOut,
}

impl DialogueState {
    pub fn awaiting_check_in(self) -> bool {
        self == Self::AwaitingCheckIn
    }

    pub fn awaiting_check_out(self) -> bool {
        self == Self::AwaitingCheckOut
    }

    pub fn flags(self) -> DialogueFlags {
        DialogueFlags {
            awaiting_check_in: self.awaiting_check_in(),
            awaiting_check_out: self.awaiting_check_out(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueFlags {
    pub awaiting_check_in: bool,
    pub awaiting_check_out: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub session_id: String,
    pub state: DialogueState,
    pub transcript: Vec<ChatMessage>,
    pub next_message_id: u64,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingSession {
    pub session_id: String,
    pub stay: StaySelection,
    pub availability: Option<bool>,
    pub reference: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl BookingSession {
    pub fn new(session_id: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            session_id,
            stay: StaySelection::default(),
            availability: None,
            reference: None,
            expires_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default = "default_adults")]
    pub adults: u8,
    #[serde(default)]
    pub children: u8,
}

fn default_adults() -> u8 {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Transient, user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
}

impl Notice {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Answer of the spreadsheet availability script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityReport {
    pub available: bool,
    pub message: Option<String>,
    pub conflicting_bookings: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StayDates {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

/// Result of one detect-intent round trip to the NLU provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectedIntent {
    pub action: String,
    pub intent_name: String,
    pub parameters: Value,
    pub fulfillment_text: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NluRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default, alias = "isSettingCheckInDate")]
    pub awaiting_check_in: bool,
    #[serde(default, alias = "isSettingCheckOutDate")]
    pub awaiting_check_out: bool,
}

impl NluRequest {
    pub fn flags(&self) -> DialogueFlags {
        DialogueFlags {
            awaiting_check_in: self.awaiting_check_in,
            awaiting_check_out: self.awaiting_check_out,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NluResponse {
    pub fulfillment_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buttons: Option<Vec<ChatButton>>,
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub confidence: f32,
}
