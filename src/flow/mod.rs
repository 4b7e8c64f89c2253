//! Dialogue flow: user actions, the registration draft, and the
//! controller that drives both.

mod action;
mod controller;
mod session;

pub use action::UserAction;
pub use controller::{FlowController, FlowOutcome};
pub use session::{validate_app_name, PlatformInfo, SessionDraft};
