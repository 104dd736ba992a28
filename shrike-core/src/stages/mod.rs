//! Workflow stages
//!
//! Each stage owns one step of a review run: review turns evidence into
//! issues, planning groups them, the guardrail validates the outputs,
//! the gate collects the human decision, and publish/persist carry it
//! out. Stages are independent of each other; the workflow runner wires
//! them together.

mod gate;
mod guardrail;
mod persist;
mod planner;
mod publish;
mod reviewer;

pub mod prompts;

pub use gate::{DecisionPrompt, DecisionRequest, HumanGate};
pub use guardrail::GuardrailStage;
pub use persist::{FileAuditSink, PersistStage};
pub use planner::{PlanOutcome, PlanStage};
pub use publish::PublishStage;
pub use reviewer::{ReviewOutcome, ReviewStage};
