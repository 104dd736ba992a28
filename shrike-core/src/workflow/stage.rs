//! Review run stages as an explicit state machine

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a review run currently sits.
///
/// The happy path is linear up to the approval gate, then branches on
/// the human decision:
///
/// ```text
/// retrieving -> reviewing -> planning -> guarding -> awaiting_human
/// awaiting_human -> publishing -> persisted -> done   (approve, edit, summary_only)
/// awaiting_human -> rejected   -> persisted -> done   (reject)
/// ```
///
/// `persisted` is additionally reachable from any non-terminal stage so
/// that an aborted run can still write its audit record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Gathering evidence for each hunk
    #[default]
    Retrieving,
    /// Generating review issues
    Reviewing,
    /// Building the fix plan
    Planning,
    /// Running guardrail checks
    Guarding,
    /// Waiting on the approval gate
    AwaitingHuman,
    /// Posting the review comment
    Publishing,
    /// Reviewer declined to publish
    Rejected,
    /// Audit record written
    Persisted,
    /// Run complete
    Done,
}

impl Stage {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition(self, next: Stage) -> bool {
        // Abort edge: any unfinished run may jump straight to persistence.
        if next == Stage::Persisted {
            return !matches!(self, Stage::Persisted | Stage::Done);
        }
        matches!(
            (self, next),
            (Stage::Retrieving, Stage::Reviewing)
                | (Stage::Reviewing, Stage::Planning)
                | (Stage::Planning, Stage::Guarding)
                | (Stage::Guarding, Stage::AwaitingHuman)
                | (Stage::AwaitingHuman, Stage::Publishing)
                | (Stage::AwaitingHuman, Stage::Rejected)
                | (Stage::Persisted, Stage::Done)
        )
    }

    /// The default successor, where there is exactly one.
    ///
    /// `awaiting_human` returns `None` because its successor depends on
    /// the decision; terminal stages return `None` because there is
    /// nowhere left to go.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Retrieving => Some(Stage::Reviewing),
            Stage::Reviewing => Some(Stage::Planning),
            Stage::Planning => Some(Stage::Guarding),
            Stage::Guarding => Some(Stage::AwaitingHuman),
            Stage::AwaitingHuman => None,
            Stage::Publishing | Stage::Rejected => Some(Stage::Persisted),
            Stage::Persisted => Some(Stage::Done),
            Stage::Done => None,
        }
    }

    /// Whether the run has nothing left to do.
    pub fn is_terminal(self) -> bool {
        self == Stage::Done
    }

    /// Stable machine-readable name, matching the serialized form.
    pub fn name(self) -> &'static str {
        match self {
            Stage::Retrieving => "retrieving",
            Stage::Reviewing => "reviewing",
            Stage::Planning => "planning",
            Stage::Guarding => "guarding",
            Stage::AwaitingHuman => "awaiting_human",
            Stage::Publishing => "publishing",
            Stage::Rejected => "rejected",
            Stage::Persisted => "persisted",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_is_legal() {
        let path = [
            Stage::Retrieving,
            Stage::Reviewing,
            Stage::Planning,
            Stage::Guarding,
            Stage::AwaitingHuman,
            Stage::Publishing,
            Stage::Persisted,
            Stage::Done,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition(pair[1]),
                "{} -> {} should be legal",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_rejection_path_is_legal() {
        assert!(Stage::AwaitingHuman.can_transition(Stage::Rejected));
        assert!(Stage::Rejected.can_transition(Stage::Persisted));
        assert!(Stage::Persisted.can_transition(Stage::Done));
    }

    #[test]
    fn test_skipping_stages_is_illegal() {
        assert!(!Stage::Retrieving.can_transition(Stage::Planning));
        assert!(!Stage::Reviewing.can_transition(Stage::AwaitingHuman));
        assert!(!Stage::Guarding.can_transition(Stage::Publishing));
        assert!(!Stage::Publishing.can_transition(Stage::Done));
    }

    #[test]
    fn test_backwards_transitions_are_illegal() {
        assert!(!Stage::Reviewing.can_transition(Stage::Retrieving));
        assert!(!Stage::Done.can_transition(Stage::Persisted));
        assert!(!Stage::Persisted.can_transition(Stage::Persisted));
    }

    #[test]
    fn test_abort_edge_reaches_persisted_from_anywhere_active() {
        for stage in [
            Stage::Retrieving,
            Stage::Reviewing,
            Stage::Planning,
            Stage::Guarding,
            Stage::AwaitingHuman,
            Stage::Publishing,
            Stage::Rejected,
        ] {
            assert!(stage.can_transition(Stage::Persisted), "{stage} -> persisted");
        }
    }

    #[test]
    fn test_default_and_terminal() {
        assert_eq!(Stage::default(), Stage::Retrieving);
        assert!(Stage::Done.is_terminal());
        assert!(!Stage::Persisted.is_terminal());
    }

    #[test]
    fn test_next_follows_the_linear_spine() {
        assert_eq!(Stage::Retrieving.next(), Some(Stage::Reviewing));
        assert_eq!(Stage::Guarding.next(), Some(Stage::AwaitingHuman));
        assert_eq!(Stage::AwaitingHuman.next(), None);
        assert_eq!(Stage::Rejected.next(), Some(Stage::Persisted));
        assert_eq!(Stage::Done.next(), None);
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&Stage::AwaitingHuman).unwrap();
        assert_eq!(json, "\"awaiting_human\"");
        let back: Stage = serde_json::from_str("\"persisted\"").unwrap();
        assert_eq!(back, Stage::Persisted);
    }

    #[test]
    fn test_display_matches_serialized_form() {
        assert_eq!(Stage::AwaitingHuman.to_string(), "awaiting_human");
        assert_eq!(Stage::Retrieving.to_string(), "retrieving");
    }
}
