//! Multi-app registry: independent, concurrently-in-progress onboardings.

mod app;
#[allow(clippy::module_inception)]
mod registry;

pub use app::{AppInfo, AppTokens, RegisteredApp};
pub use registry::{AppRegistry, Progress};
