//! Renderings of review state for comments, prompts, and notifications

mod notify;
mod summary;

pub use notify::{review_payload, WebhookNotifier};
pub use summary::{condensed_summary, gate_prompt, review_comment, run_summary};
