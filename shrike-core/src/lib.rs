//! Shrike Core - Core library for evidence-grounded code review
//!
//! This crate drives a review run end to end: diff parsing, per-hunk
//! evidence retrieval, review and fix-plan generation, guardrail
//! checks, the human approval gate, publication, and the audit record.

pub mod config;
pub mod diff;
pub mod error;
pub mod git;
pub mod llm;
pub mod model;
pub mod render;
pub mod retrieval;
pub mod secrets;
pub mod services;
pub mod stages;
pub mod workflow;

pub use config::Config;
pub use error::{Error, Result};
pub use model::{
    Category, DecisionAction, Evidence, EvidenceSource, FixTask, GuardrailResult, HumanDecision,
    Hunk, RetrievalBundle, ReviewIssue, Severity, WorkflowState,
};
pub use secrets::Secrets;
pub use services::Services;
pub use stages::{DecisionPrompt, DecisionRequest, HumanGate};
pub use workflow::{ReviewWorkflow, RunReport, Stage};
