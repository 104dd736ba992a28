//! Hunk and diff line types
//!
//! A hunk is one contiguous change block from a unified diff. Hunks are
//! immutable once a review run starts; every downstream stage reads them
//! but never rewrites them.

use serde::{Deserialize, Serialize};

/// Kind of line within a hunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    /// Unchanged line present in both versions
    Context,
    /// Line added in the new version
    Added,
    /// Line removed from the old version
    Removed,
}

/// A single line in a diff with computed line numbers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffLine {
    pub kind: LineKind,
    pub content: String,
    /// Line number in the old file (absent for added lines)
    pub old_line: Option<u32>,
    /// Line number in the new file (absent for removed lines)
    pub new_line: Option<u32>,
}

/// How the containing file changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    #[default]
    Modified,
    Added,
    Deleted,
    Renamed,
}

/// One contiguous change block in a diff
///
/// Header `@@ -10,5 +12,7 @@ name` means the old file contributes 5 lines
/// starting at line 10 and the new file 7 lines starting at line 12.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hunk {
    /// Path of the changed file (the new path, or the old path for deletions)
    pub file_path: String,
    /// Pre-rename path, only set when the file moved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,
    /// How the file itself changed
    pub change_kind: ChangeKind,
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
    /// Trailing context from the hunk header (enclosing function/class)
    pub section: String,
    /// All lines in diff order
    pub lines: Vec<DiffLine>,
}

impl Hunk {
    /// Path of the file at the base revision
    pub fn base_path(&self) -> &str {
        self.old_path.as_deref().unwrap_or(&self.file_path)
    }

    /// Added lines only, in diff order
    pub fn added(&self) -> impl Iterator<Item = &DiffLine> {
        self.lines.iter().filter(|l| l.kind == LineKind::Added)
    }

    /// Removed lines only, in diff order
    pub fn removed(&self) -> impl Iterator<Item = &DiffLine> {
        self.lines.iter().filter(|l| l.kind == LineKind::Removed)
    }

    /// Context lines only, in diff order
    pub fn context(&self) -> impl Iterator<Item = &DiffLine> {
        self.lines.iter().filter(|l| l.kind == LineKind::Context)
    }

    /// Inclusive line range in the old file
    pub fn old_range(&self) -> (u32, u32) {
        (self.old_start, self.old_start + self.old_count.saturating_sub(1))
    }

    /// Inclusive line range in the new file
    pub fn new_range(&self) -> (u32, u32) {
        (self.new_start, self.new_start + self.new_count.saturating_sub(1))
    }

    /// Count of added lines
    pub fn additions(&self) -> usize {
        self.added().count()
    }

    /// Count of removed lines
    pub fn deletions(&self) -> usize {
        self.removed().count()
    }

    /// The changed text (added then removed lines), used as retrieval query
    pub fn change_text(&self) -> String {
        let mut parts: Vec<&str> = self.added().map(|l| l.content.as_str()).collect();
        parts.extend(self.removed().map(|l| l.content.as_str()));
        parts.join("\n")
    }

    /// True if the hunk carries no added or removed lines
    pub fn is_trivial(&self) -> bool {
        self.additions() == 0 && self.deletions() == 0
    }
}

/// All changes to a single file within a diff
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileDiff {
    /// Path before the change
    pub old_path: String,
    /// Path after the change
    pub new_path: String,
    pub is_new: bool,
    pub is_deleted: bool,
    pub is_renamed: bool,
    pub is_binary: bool,
    pub hunks: Vec<Hunk>,
}

impl FileDiff {
    /// Total lines added across all hunks
    pub fn total_additions(&self) -> usize {
        self.hunks.iter().map(Hunk::additions).sum()
    }

    /// Total lines removed across all hunks
    pub fn total_deletions(&self) -> usize {
        self.hunks.iter().map(Hunk::deletions).sum()
    }

    /// The change kind implied by the file flags
    pub fn change_kind(&self) -> ChangeKind {
        if self.is_new {
            ChangeKind::Added
        } else if self.is_deleted {
            ChangeKind::Deleted
        } else if self.is_renamed {
            ChangeKind::Renamed
        } else {
            ChangeKind::Modified
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_hunk() -> Hunk {
        Hunk {
            file_path: "src/auth.rs".to_string(),
            old_path: None,
            change_kind: ChangeKind::Modified,
            old_start: 10,
            old_count: 3,
            new_start: 10,
            new_count: 4,
            section: "fn login".to_string(),
            lines: vec![
                DiffLine {
                    kind: LineKind::Context,
                    content: "fn login() {".to_string(),
                    old_line: Some(10),
                    new_line: Some(10),
                },
                DiffLine {
                    kind: LineKind::Removed,
                    content: "    let ok = check(user);".to_string(),
                    old_line: Some(11),
                    new_line: None,
                },
                DiffLine {
                    kind: LineKind::Added,
                    content: "    let ok = check(user)?;".to_string(),
                    old_line: None,
                    new_line: Some(11),
                },
                DiffLine {
                    kind: LineKind::Added,
                    content: "    audit(user);".to_string(),
                    old_line: None,
                    new_line: Some(12),
                },
                DiffLine {
                    kind: LineKind::Context,
                    content: "}".to_string(),
                    old_line: Some(12),
                    new_line: Some(13),
                },
            ],
        }
    }

    #[test]
    fn test_line_filters() {
        let hunk = sample_hunk();
        assert_eq!(hunk.additions(), 2);
        assert_eq!(hunk.deletions(), 1);
        assert_eq!(hunk.context().count(), 2);
    }

    #[test]
    fn test_ranges() {
        let hunk = sample_hunk();
        assert_eq!(hunk.old_range(), (10, 12));
        assert_eq!(hunk.new_range(), (10, 13));
    }

    #[test]
    fn test_change_text_orders_added_before_removed() {
        let hunk = sample_hunk();
        let text = hunk.change_text();
        let added_pos = text.find("check(user)?").unwrap();
        let removed_pos = text.find("let ok = check(user);").unwrap();
        assert!(added_pos < removed_pos);
    }

    #[test]
    fn test_file_diff_totals() {
        let diff = FileDiff {
            old_path: "src/auth.rs".to_string(),
            new_path: "src/auth.rs".to_string(),
            hunks: vec![sample_hunk(), sample_hunk()],
            ..Default::default()
        };
        assert_eq!(diff.total_additions(), 4);
        assert_eq!(diff.total_deletions(), 2);
        assert_eq!(diff.change_kind(), ChangeKind::Modified);
    }
}
