//! Review workflow state machine and runner

mod runner;
mod stage;

pub use runner::{Checkpoints, ReviewWorkflow, RunReport};
pub use stage::Stage;
