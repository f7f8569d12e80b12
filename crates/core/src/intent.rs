use chrono::{DateTime, NaiveDate};
use serde_json::Value;

use crate::models::{ButtonTag, ChatButton, DetectedIntent, DialogueFlags, NluResponse};

pub const NOT_UNDERSTOOD: &str = "Sorry, I didn't understand that.";

const DEFAULT_AMENITIES_ANSWER: &str =
    "Villa Shaa offers a variety of amenities including free Wi-Fi and complimentary breakfast.";

const AMENITY_ANSWERS: &[(&str, &str)] = &[
    (
        "pool",
        "No, Villa Shaa does not have a private pool, but guests can enjoy nearby public pools and beaches.",
    ),
    (
        "wifi",
        "Villa Shaa offers complimentary high-speed Wi-Fi throughout the property.",
    ),
    (
        "kitchen",
        "Yes, Villa Shaa features a fully equipped kitchen for guest use.",
    ),
    (
        "air conditioning",
        "Yes, Villa Shaa is equipped with air conditioning in all rooms for your comfort.",
    ),
    (
        "parking",
        "Villa Shaa provides free private parking on-site for all guests.",
    ),
    (
        "garden",
        "Yes, Villa Shaa boasts a beautiful garden area for guests to relax and enjoy.",
    ),
    (
        "bathroom",
        "Villa Shaa offers modern bathrooms with complimentary toiletries and fresh towels.",
    ),
    (
        "security",
        "Villa Shaa has 24/7 security surveillance and secure access to ensure guest safety.",
    ),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentReply {
    pub text: String,
    pub buttons: Option<Vec<ChatButton>>,
}

impl IntentReply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            buttons: None,
        }
    }
}

/// Maps a detected action to the villa's own reply. `None` means the
/// provider's fulfillment text should be used as-is.
pub fn interpret_intent(
    action: &str,
    parameters: &Value,
    fulfillment_text: &str,
    flags: DialogueFlags,
) -> Option<IntentReply> {
    match action {
        "amenities.inquiry" => {
            let amenity = parameters
                .get("amenities")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Some(IntentReply::text(amenity_answer(amenity)))
        }
        "booking.create" => Some(IntentReply {
            text: "Do you want to make a reservation at Villa Shaa?".to_string(),
            buttons: Some(vec![
                ChatButton::new("Yes", ButtonTag::NewBookingYes),
                ChatButton::new("No", ButtonTag::NewBookingNo),
            ]),
        }),
        "booking.create.new" => Some(booking_date_reply(parameters, fulfillment_text, flags)),
        _ => None,
    }
}

/// Builds the payload returned to the chat widget.
pub fn build_nlu_response(detected: &DetectedIntent, flags: DialogueFlags) -> NluResponse {
    let reply = interpret_intent(
        &detected.action,
        &detected.parameters,
        &detected.fulfillment_text,
        flags,
    );

    let (fulfillment_text, buttons) = match reply {
        Some(reply) if !reply.text.is_empty() => (reply.text, reply.buttons),
        _ if !detected.fulfillment_text.trim().is_empty() => {
            (detected.fulfillment_text.clone(), None)
        }
        _ => (NOT_UNDERSTOOD.to_string(), None),
    };

    NluResponse {
        fulfillment_text,
        buttons,
        intent: if detected.intent_name.is_empty() {
            "Default Fallback Intent".to_string()
        } else {
            detected.intent_name.clone()
        },
        confidence: detected.confidence,
    }
}

pub fn amenity_answer(amenity: &str) -> &'static str {
    let key = amenity.trim().to_lowercase();
    AMENITY_ANSWERS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, answer)| *answer)
        .unwrap_or(DEFAULT_AMENITIES_ANSWER)
}

fn booking_date_reply(
    parameters: &Value,
    fulfillment_text: &str,
    flags: DialogueFlags,
) -> IntentReply {
    let Some(date) = extract_date(parameters) else {
        return IntentReply::text(
            "Please confirm if you would like to make a reservation at Villa Shaa.",
        );
    };
    let formatted = format_long_date(date);

    let is_date_prompt = fulfillment_text.split(" | ").next() == Some("Date");
    if !is_date_prompt {
        return IntentReply::text(format!(
            "You have selected {formatted} as your booking date. {fulfillment_text}"
        ));
    }

    if flags.awaiting_check_in {
        IntentReply {
            text: format!(
                "You have selected {formatted} as your check-in date. Please confirm the check-in date."
            ),
            buttons: Some(vec![
                ChatButton::new("Confirm", ButtonTag::ConfirmCheckInDate),
                ChatButton::new("Change Date", ButtonTag::ChangeCheckInDate),
            ]),
        }
    } else if flags.awaiting_check_out {
        IntentReply {
            text: format!(
                "You have selected {formatted} as your check-out date. Please confirm the check-out date."
            ),
            buttons: Some(vec![
                ChatButton::new("Confirm", ButtonTag::ConfirmCheckOutDate),
                ChatButton::new("Change Date", ButtonTag::ChangeCheckOutDate),
            ]),
        }
    } else {
        IntentReply::text(format!("You have selected {formatted} as your booking date."))
    }
}

/// Reads the `date-time` parameter, which arrives as a string, a list of
/// strings, or a period object depending on how the user phrased it.
pub fn extract_date(parameters: &Value) -> Option<NaiveDate> {
    let raw = match parameters.get("date-time")? {
        Value::String(value) => Some(value.as_str()),
        Value::Array(values) => values.first().and_then(date_text),
        other => date_text(other),
    }?;
    parse_date(raw)
}

fn date_text(value: &Value) -> Option<&str> {
    match value {
        Value::String(value) => Some(value.as_str()),
        Value::Object(map) => ["date_time", "startDateTime", "startDate"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str)),
        _ => None,
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.date_naive());
    }
    raw.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

/// `Sunday, June 1, 2025`
pub fn format_long_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ButtonValue;
    use serde_json::json;

    fn flags(check_in: bool, check_out: bool) -> DialogueFlags {
        DialogueFlags {
            awaiting_check_in: check_in,
            awaiting_check_out: check_out,
        }
    }

    #[test]
    fn answers_known_amenity() {
        let reply = interpret_intent(
            "amenities.inquiry",
            &json!({ "amenities": "parking" }),
            "",
            DialogueFlags::default(),
        )
        .unwrap();
        assert!(reply.text.contains("free private parking"));
    }

    #[test]
    fn unknown_amenity_gets_default_answer() {
        let reply = interpret_intent(
            "amenities.inquiry",
            &json!({ "amenities": "sauna" }),
            "",
            DialogueFlags::default(),
        )
        .unwrap();
        assert_eq!(reply.text, DEFAULT_AMENITIES_ANSWER);
    }

    #[test]
    fn booking_create_offers_yes_no() {
        let reply =
            interpret_intent("booking.create", &json!({}), "", DialogueFlags::default()).unwrap();
        let values = reply
            .buttons
            .unwrap()
            .into_iter()
            .map(|b| b.value)
            .collect::<Vec<_>>();
        assert_eq!(
            values,
            vec![
                ButtonValue::Tag(ButtonTag::NewBookingYes),
                ButtonValue::Tag(ButtonTag::NewBookingNo)
            ]
        );
    }

    #[test]
    fn date_reply_while_awaiting_check_in() {
        let reply = interpret_intent(
            "booking.create.new",
            &json!({ "date-time": ["2025-06-01T12:00:00+05:30"] }),
            "Date | check-in",
            flags(true, false),
        )
        .unwrap();

        assert!(reply.text.contains("Sunday, June 1, 2025 as your check-in date"));
        assert_eq!(
            reply.buttons.unwrap()[0].value,
            ButtonValue::Tag(ButtonTag::ConfirmCheckInDate)
        );
    }

    #[test]
    fn date_reply_while_awaiting_check_out() {
        let reply = interpret_intent(
            "booking.create.new",
            &json!({ "date-time": "2025-06-08" }),
            "Date",
            flags(false, true),
        )
        .unwrap();

        assert!(reply.text.contains("as your check-out date"));
        assert_eq!(
            reply.buttons.unwrap()[1].value,
            ButtonValue::Tag(ButtonTag::ChangeCheckOutDate)
        );
    }

    #[test]
    fn date_without_prompt_marker_echoes_fulfillment() {
        let reply = interpret_intent(
            "booking.create.new",
            &json!({ "date-time": "2025-06-08T10:00:00Z" }),
            "How many guests?",
            DialogueFlags::default(),
        )
        .unwrap();
        assert_eq!(
            reply.text,
            "You have selected Sunday, June 8, 2025 as your booking date. How many guests?"
        );
    }

    #[test]
    fn missing_date_asks_for_confirmation() {
        let reply =
            interpret_intent("booking.create.new", &json!({}), "", flags(true, false)).unwrap();
        assert!(reply.text.starts_with("Please confirm"));
        assert!(reply.buttons.is_none());
    }

    #[test]
    fn unhandled_action_uses_provider_text() {
        let detected = DetectedIntent {
            action: "smalltalk.greetings".to_string(),
            intent_name: "Greeting".to_string(),
            fulfillment_text: "Hi there!".to_string(),
            confidence: 0.9,
            ..DetectedIntent::default()
        };
        let response = build_nlu_response(&detected, DialogueFlags::default());
        assert_eq!(response.fulfillment_text, "Hi there!");
        assert_eq!(response.intent, "Greeting");
    }

    #[test]
    fn empty_provider_text_falls_back() {
        let response = build_nlu_response(&DetectedIntent::default(), DialogueFlags::default());
        assert_eq!(response.fulfillment_text, NOT_UNDERSTOOD);
        assert_eq!(response.intent, "Default Fallback Intent");
    }
}
