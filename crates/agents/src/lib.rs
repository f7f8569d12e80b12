pub mod booking;
pub mod chat;
pub mod nlu;

pub use booking::{BookingAgent, BookingOutcome, BookingSnapshot, ContactOutcome, SubmitOutcome};
pub use chat::{ChatAgent, ChatExchange, ChatTranscript};
pub use nlu::NluAgent;
