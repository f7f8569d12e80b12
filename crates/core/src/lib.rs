pub mod booking;
pub mod confirmation;
pub mod dialogue;
pub mod intent;
pub mod models;
pub mod policy;
pub mod stay;

pub use booking::{issue_reference, BookingError, BookingRecord};
pub use confirmation::{build_confirmation, render_pdf, ConfirmationDocument};
pub use dialogue::{route_button, LocalReply, Route};
pub use intent::{build_nlu_response, interpret_intent, IntentReply};
pub use models::*;
pub use policy::VillaPolicies;
pub use stay::StaySelection;
