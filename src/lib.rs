//! Dialogue-driven onboarding engine for a measurement SDK.
//!
//! Walks a user from "which environment?" to a fully registered app with
//! verified SDK traffic, as a conversation: the engine emits typed
//! protocol payloads, the render boundary draws them and reports
//! [`flow::UserAction`]s back. All state lives in the
//! [`flow::FlowController`] and its [`registry::AppRegistry`].

pub mod config;
pub mod error;
pub mod flow;
pub mod protocol;
pub mod providers;
pub mod registry;
pub mod seed;
pub mod steps;

pub use config::WizardConfig;
pub use error::{Error, Result};
