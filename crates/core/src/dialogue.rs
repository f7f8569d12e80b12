use chrono::{DateTime, Utc};

use crate::models::{
    ButtonTag, ButtonValue, ChatButton, ChatMessage, ChatSession, DialogueState,
};

pub const GREETING: &str =
    "Hello! Welcome to Villa Shaa! I'm your virtual assistant. How can I help you today?";

/// Outcome of routing one button click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Answered from the canned table; the reply has already been appended.
    Local,
    /// Must be forwarded to the NLU service with this message text.
    Delegate(String),
}

/// Canned reply for a locally handled tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalReply {
    pub text: String,
    pub buttons: Option<Vec<ChatButton>>,
}

impl ChatSession {
    pub fn open(session_id: String, now: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        let mut session = Self {
            session_id,
            state: DialogueState::Idle,
            transcript: Vec::new(),
            next_message_id: 1,
            expires_at,
        };
        session.push_bot(GREETING.to_string(), None, now);
        session
    }

    pub fn push_user(&mut self, text: String, now: DateTime<Utc>) -> &ChatMessage {
        self.push(text, false, None, now)
    }

    pub fn push_bot(
        &mut self,
        text: String,
        buttons: Option<Vec<ChatButton>>,
        now: DateTime<Utc>,
    ) -> &ChatMessage {
        let buttons = buttons.filter(|items| !items.is_empty());
        self.push(text, true, buttons, now)
    }

    /// Buttons are single-use across the whole conversation.
    pub fn clear_buttons(&mut self) {
        for message in &mut self.transcript {
            message.buttons = None;
        }
    }

    /// Records a click on a button labelled `label` and either answers it
    /// locally or returns the value to forward to the NLU service.
    pub fn click_button(&mut self, label: &str, value: &ButtonValue, now: DateTime<Utc>) -> Route {
        self.clear_buttons();
        self.push_user(label.to_string(), now);

        match route_button(&mut self.state, value) {
            Some(reply) => {
                self.push_bot(reply.text, reply.buttons, now);
                Route::Local
            }
            None => Route::Delegate(value.as_str().to_string()),
        }
    }

    fn push(
        &mut self,
        text: String,
        is_bot: bool,
        buttons: Option<Vec<ChatButton>>,
        now: DateTime<Utc>,
    ) -> &ChatMessage {
        let id = self.next_message_id;
        self.next_message_id += 1;
        self.transcript.push(ChatMessage {
            id,
            text,
            is_bot,
            timestamp: now,
            buttons,
        });
        &self.transcript[self.transcript.len() - 1]
    }
}

/// Applies the state transition for `value` and returns the canned reply,
/// or `None` when the value belongs to the NLU service. Delegated values
/// never change the state.
pub fn route_button(state: &mut DialogueState, value: &ButtonValue) -> Option<LocalReply> {
    let tag = match value {
        ButtonValue::Tag(tag) => *tag,
        ButtonValue::Other(_) => return None,
    };

    let reply = match tag {
        ButtonTag::NewBookingNo => plain(
            "No problem! If you have any other questions or need assistance, feel free to ask.",
        ),
        ButtonTag::NewBookingYes => LocalReply {
            text: "Great! I'll help you with your reservation.".to_string(),
            buttons: Some(vec![
                ChatButton::new("Book Now", ButtonTag::BookNow),
                ChatButton::new("Book Later", ButtonTag::BookLater),
            ]),
        },
        ButtonTag::BookNow => {
            *state = DialogueState::AwaitingCheckIn;
            plain("Fantastic! Please provide your check-in date to proceed with the booking.")
        }
        ButtonTag::BookLater => plain(
            "No problem! Please visit our booking page by clicking on the 'Booking' section in the menu, or you can call us directly at +94 77 794 3393. We look forward to hosting you at Villa Shaa!",
        ),
        ButtonTag::ConfirmCheckInDate => {
            *state = DialogueState::AwaitingCheckOut;
            plain("Great! Now provide your check-out date to complete the booking.")
        }
        ButtonTag::ChangeCheckInDate => {
            *state = DialogueState::AwaitingCheckIn;
            plain("Please provide the new check-in date.")
        }
        ButtonTag::ConfirmCheckOutDate => {
            if *state == DialogueState::AwaitingCheckOut {
                *state = DialogueState::Idle;
            }
            LocalReply {
                text: "Great! Now I need to check the availability for your selected dates."
                    .to_string(),
                buttons: Some(vec![ChatButton::new(
                    "Proceed",
                    ButtonTag::ProceedCheckAvailability,
                )]),
            }
        }
        ButtonTag::ChangeCheckOutDate => {
            *state = DialogueState::AwaitingCheckOut;
            plain("Please provide the new check-out date.")
        }
        ButtonTag::ProceedCheckAvailability => return None,
    };

    Some(reply)
}

fn plain(text: &str) -> LocalReply {
    LocalReply {
        text: text.to_string(),
        buttons: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> ChatSession {
        let now = Utc::now();
        ChatSession::open("s-1".to_string(), now, now)
    }

    #[test]
    fn opens_with_greeting() {
        let session = session();
        assert_eq!(session.transcript.len(), 1);
        assert!(session.transcript[0].is_bot);
        assert_eq!(session.state, DialogueState::Idle);
    }

    #[test]
    fn yes_offers_book_now_and_later() {
        let mut session = session();
        let route = session.click_button(
            "Yes",
            &ButtonValue::Tag(ButtonTag::NewBookingYes),
            Utc::now(),
        );

        assert_eq!(route, Route::Local);
        let bot_replies = session.transcript.iter().filter(|m| m.is_bot).count();
        assert_eq!(bot_replies, 2);

        let last = session.transcript.last().unwrap();
        let values = last
            .buttons
            .as_ref()
            .unwrap()
            .iter()
            .map(|b| b.value.clone())
            .collect::<Vec<_>>();
        assert_eq!(
            values,
            vec![
                ButtonValue::Tag(ButtonTag::BookNow),
                ButtonValue::Tag(ButtonTag::BookLater)
            ]
        );
    }

    #[test]
    fn book_now_always_awaits_check_in() {
        for start in [
            DialogueState::Idle,
            DialogueState::AwaitingCheckIn,
            DialogueState::AwaitingCheckOut,
        ] {
            let mut state = start;
            route_button(&mut state, &ButtonValue::Tag(ButtonTag::BookNow));
            assert!(state.awaiting_check_in());
            assert!(!state.awaiting_check_out());
        }
    }

    #[test]
    fn date_confirmation_cycle() {
        let mut state = DialogueState::Idle;
        route_button(&mut state, &ButtonTag::BookNow.into());
        route_button(&mut state, &ButtonTag::ConfirmCheckInDate.into());
        assert_eq!(state, DialogueState::AwaitingCheckOut);

        route_button(&mut state, &ButtonTag::ChangeCheckInDate.into());
        assert_eq!(state, DialogueState::AwaitingCheckIn);

        route_button(&mut state, &ButtonTag::ConfirmCheckInDate.into());
        route_button(&mut state, &ButtonTag::ChangeCheckOutDate.into());
        assert_eq!(state, DialogueState::AwaitingCheckOut);

        let reply = route_button(&mut state, &ButtonTag::ConfirmCheckOutDate.into()).unwrap();
        assert_eq!(state, DialogueState::Idle);
        assert_eq!(
            reply.buttons.unwrap()[0].value,
            ButtonValue::Tag(ButtonTag::ProceedCheckAvailability)
        );
    }

    #[test]
    fn unknown_values_are_delegated_without_state_change() {
        let mut session = session();
        session.state = DialogueState::AwaitingCheckOut;

        let route = session.click_button(
            "Something",
            &ButtonValue::from("ROOM_TOUR".to_string()),
            Utc::now(),
        );

        assert_eq!(route, Route::Delegate("ROOM_TOUR".to_string()));
        assert_eq!(session.state, DialogueState::AwaitingCheckOut);
        assert!(!session.transcript.last().unwrap().is_bot);
    }

    #[test]
    fn proceed_is_delegated() {
        let mut state = DialogueState::Idle;
        assert!(route_button(&mut state, &ButtonTag::ProceedCheckAvailability.into()).is_none());
    }

    #[test]
    fn click_clears_every_earlier_button() {
        let mut session = session();
        let now = Utc::now();
        session.push_bot(
            "Do you want to make a reservation at Villa Shaa?".to_string(),
            Some(vec![
                ChatButton::new("Yes", ButtonTag::NewBookingYes),
                ChatButton::new("No", ButtonTag::NewBookingNo),
            ]),
            now,
        );
        session.push_bot(
            "Pick one".to_string(),
            Some(vec![ChatButton::new("Book Now", ButtonTag::BookNow)]),
            now,
        );

        session.click_button("No", &ButtonTag::NewBookingNo.into(), now);

        assert!(session.transcript.iter().all(|m| m.buttons.is_none()));
    }
}
