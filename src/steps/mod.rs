//! Step vocabulary and the step graph builder.

mod builder;
mod model;

pub use builder::build_steps;
pub use model::{
    AdChannel, Environment, Framework, Platform, Step, StepCategory, StepId, StepStatus,
};
