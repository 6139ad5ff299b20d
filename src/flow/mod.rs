//! Guided dialogue flows and the per-session step state machine.

mod machine;
mod step;

pub use machine::{StepChange, StepMachine};
pub use step::{Flow, Step, UnknownName};
