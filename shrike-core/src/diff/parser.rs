//! Unified diff parsing
//!
//! Turns `git diff` / PR patch text into structured [`FileDiff`]s and flat
//! hunk lists ready for review. Line numbers are computed while walking the
//! hunk body: an added line advances the new-file counter, a removed line
//! the old-file counter, a context line both.

use std::sync::OnceLock;

use regex::Regex;

use crate::model::{DiffLine, FileDiff, Hunk, LineKind};

fn hunk_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@(.*)$").expect("valid pattern")
    })
}

fn file_header_re() -> &'static (Regex, Regex) {
    static RE: OnceLock<(Regex, Regex)> = OnceLock::new();
    RE.get_or_init(|| {
        (
            Regex::new(r"^--- (.+?)(?:\t.*)?$").expect("valid pattern"),
            Regex::new(r"^\+\+\+ (.+?)(?:\t.*)?$").expect("valid pattern"),
        )
    })
}

fn binary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Binary files .+ differ$").expect("valid pattern"))
}

/// Parse unified diff text into per-file diffs
pub fn parse_diff(diff_text: &str) -> Vec<FileDiff> {
    if diff_text.trim().is_empty() {
        return Vec::new();
    }

    let (old_header, new_header) = file_header_re();
    let mut files: Vec<FileDiff> = Vec::new();
    let mut current_file: Option<FileDiff> = None;
    let mut current_hunk: Option<Hunk> = None;

    let mut lines = diff_text.split('\n').peekable();
    while let Some(line) = lines.next() {
        if binary_re().is_match(line) {
            flush(&mut files, &mut current_file, &mut current_hunk);
            files.push(FileDiff {
                old_path: "binary".to_string(),
                new_path: "binary".to_string(),
                is_binary: true,
                ..Default::default()
            });
            continue;
        }

        if let Some(old_cap) = old_header.captures(line) {
            flush(&mut files, &mut current_file, &mut current_hunk);

            let old_path = strip_prefix(&old_cap[1], "a/");
            if let Some(next) = lines.peek() {
                if let Some(new_cap) = new_header.captures(next) {
                    let new_path = strip_prefix(&new_cap[1], "b/");
                    lines.next();

                    let is_new = old_path == "/dev/null";
                    let is_deleted = new_path == "/dev/null";
                    let is_renamed = old_path != new_path && !is_new && !is_deleted;
                    current_file = Some(FileDiff {
                        old_path: if is_new { new_path.clone() } else { old_path.clone() },
                        new_path: if is_deleted { old_path } else { new_path },
                        is_new,
                        is_deleted,
                        is_renamed,
                        is_binary: false,
                        hunks: Vec::new(),
                    });
                }
            }
            continue;
        }

        if let Some(cap) = hunk_header_re().captures(line) {
            if let Some(file) = current_file.as_mut() {
                if let Some(hunk) = current_hunk.take() {
                    file.hunks.push(hunk);
                }
                let path = file.new_path.clone();
                let old_path = file
                    .is_renamed
                    .then(|| file.old_path.clone());
                let change_kind = file.change_kind();
                current_hunk = Some(Hunk {
                    file_path: path,
                    old_path,
                    change_kind,
                    old_start: parse_u32(cap.get(1)),
                    old_count: cap.get(2).map_or(1, |m| parse_str_u32(m.as_str())),
                    new_start: parse_u32(cap.get(3)),
                    new_count: cap.get(4).map_or(1, |m| parse_str_u32(m.as_str())),
                    section: cap[5].trim().to_string(),
                    lines: Vec::new(),
                });
            }
            continue;
        }

        if let Some(hunk) = current_hunk.as_mut() {
            if line.is_empty() {
                continue;
            }
            push_body_line(hunk, line);
        }
    }

    flush(&mut files, &mut current_file, &mut current_hunk);
    files
}

/// Parse a single file's patch, tolerating a missing `---`/`+++` header
/// (GitHub's per-file `patch` field starts directly at the hunk header)
pub fn parse_file_patch(patch: &str, filename: &str) -> FileDiff {
    if patch.trim().is_empty() {
        return FileDiff {
            old_path: filename.to_string(),
            new_path: filename.to_string(),
            ..Default::default()
        };
    }

    let owned;
    let text = if patch.starts_with("---") {
        patch
    } else {
        owned = format!("--- a/{}\n+++ b/{}\n{}", filename, filename, patch);
        &owned
    };

    parse_diff(text).into_iter().next().unwrap_or_else(|| FileDiff {
        old_path: filename.to_string(),
        new_path: filename.to_string(),
        ..Default::default()
    })
}

/// Flatten file diffs into review-ready hunks, skipping binaries and hunks
/// with no actual change. Hunks longer than `max_lines` are split so a
/// single giant hunk cannot blow the generation context.
pub fn collect_hunks(files: &[FileDiff], max_lines: usize) -> Vec<Hunk> {
    let mut hunks = Vec::new();
    for file in files {
        if file.is_binary {
            continue;
        }
        for hunk in &file.hunks {
            if hunk.is_trivial() {
                continue;
            }
            if max_lines > 0 && hunk.lines.len() > max_lines {
                hunks.extend(split_hunk(hunk, max_lines));
            } else {
                hunks.push(hunk.clone());
            }
        }
    }
    hunks
}

fn split_hunk(hunk: &Hunk, max_lines: usize) -> Vec<Hunk> {
    let mut parts = Vec::new();
    for chunk in hunk.lines.chunks(max_lines) {
        let old_start = chunk
            .iter()
            .find_map(|l| l.old_line)
            .unwrap_or(hunk.old_start);
        let new_start = chunk
            .iter()
            .find_map(|l| l.new_line)
            .unwrap_or(hunk.new_start);
        let old_count = chunk.iter().filter(|l| l.kind != LineKind::Added).count() as u32;
        let new_count = chunk.iter().filter(|l| l.kind != LineKind::Removed).count() as u32;
        let part = Hunk {
            file_path: hunk.file_path.clone(),
            old_path: hunk.old_path.clone(),
            change_kind: hunk.change_kind,
            old_start,
            old_count,
            new_start,
            new_count,
            section: hunk.section.clone(),
            lines: chunk.to_vec(),
        };
        if !part.is_trivial() {
            parts.push(part);
        }
    }
    parts
}

fn push_body_line(hunk: &mut Hunk, line: &str) {
    let consumed_old = hunk
        .lines
        .iter()
        .filter(|l| matches!(l.kind, LineKind::Removed | LineKind::Context))
        .count() as u32;
    let consumed_new = hunk
        .lines
        .iter()
        .filter(|l| matches!(l.kind, LineKind::Added | LineKind::Context))
        .count() as u32;

    if let Some(content) = line.strip_prefix('+') {
        if line.starts_with("+++") {
            return;
        }
        hunk.lines.push(DiffLine {
            kind: LineKind::Added,
            content: content.to_string(),
            old_line: None,
            new_line: Some(hunk.new_start + consumed_new),
        });
    } else if let Some(content) = line.strip_prefix('-') {
        if line.starts_with("---") {
            return;
        }
        hunk.lines.push(DiffLine {
            kind: LineKind::Removed,
            content: content.to_string(),
            old_line: Some(hunk.old_start + consumed_old),
            new_line: None,
        });
    } else if let Some(content) = line.strip_prefix(' ') {
        hunk.lines.push(DiffLine {
            kind: LineKind::Context,
            content: content.to_string(),
            old_line: Some(hunk.old_start + consumed_old),
            new_line: Some(hunk.new_start + consumed_new),
        });
    }
}

fn flush(
    files: &mut Vec<FileDiff>,
    current_file: &mut Option<FileDiff>,
    current_hunk: &mut Option<Hunk>,
) {
    if let Some(mut file) = current_file.take() {
        if let Some(hunk) = current_hunk.take() {
            file.hunks.push(hunk);
        }
        files.push(file);
    }
}

fn strip_prefix(path: &str, prefix: &str) -> String {
    path.strip_prefix(prefix).unwrap_or(path).to_string()
}

fn parse_u32(m: Option<regex::Match<'_>>) -> u32 {
    m.map_or(0, |m| parse_str_u32(m.as_str()))
}

fn parse_str_u32(s: &str) -> u32 {
    s.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChangeKind;

    const SIMPLE_DIFF: &str = "\
--- a/src/auth.rs
+++ b/src/auth.rs
@@ -10,3 +10,4 @@ fn login
 fn login() {
-    let ok = check(user);
+    let ok = check(user)?;
+    audit(user);
 }
";

    #[test]
    fn test_parse_simple_diff() {
        let files = parse_diff(SIMPLE_DIFF);
        assert_eq!(files.len(), 1);
        let file = &files[0];
        assert_eq!(file.old_path, "src/auth.rs");
        assert_eq!(file.new_path, "src/auth.rs");
        assert!(!file.is_new);

        assert_eq!(file.hunks.len(), 1);
        let hunk = &file.hunks[0];
        assert_eq!(hunk.old_start, 10);
        assert_eq!(hunk.old_count, 3);
        assert_eq!(hunk.new_start, 10);
        assert_eq!(hunk.new_count, 4);
        assert_eq!(hunk.section, "fn login");
        assert_eq!(hunk.additions(), 2);
        assert_eq!(hunk.deletions(), 1);
    }

    #[test]
    fn test_line_numbers_computed() {
        let files = parse_diff(SIMPLE_DIFF);
        let hunk = &files[0].hunks[0];

        let removed: Vec<_> = hunk.removed().collect();
        assert_eq!(removed[0].old_line, Some(11));
        assert_eq!(removed[0].new_line, None);

        let added: Vec<_> = hunk.added().collect();
        assert_eq!(added[0].new_line, Some(11));
        assert_eq!(added[1].new_line, Some(12));

        let context: Vec<_> = hunk.context().collect();
        assert_eq!(context[0].old_line, Some(10));
        assert_eq!(context[0].new_line, Some(10));
        // Closing brace: old file consumed 1 context + 1 removed, new
        // consumed 1 context + 2 added
        assert_eq!(context[1].old_line, Some(12));
        assert_eq!(context[1].new_line, Some(13));
    }

    #[test]
    fn test_new_file_detected() {
        let diff = "\
--- /dev/null
+++ b/src/fresh.rs
@@ -0,0 +1,2 @@
+fn fresh() {}
+
";
        let files = parse_diff(diff);
        assert_eq!(files.len(), 1);
        assert!(files[0].is_new);
        assert_eq!(files[0].new_path, "src/fresh.rs");
        assert_eq!(files[0].old_path, "src/fresh.rs");
        assert_eq!(files[0].hunks[0].change_kind, ChangeKind::Added);
    }

    #[test]
    fn test_deleted_file_detected() {
        let diff = "\
--- a/src/gone.rs
+++ /dev/null
@@ -1,2 +0,0 @@
-fn gone() {}
-
";
        let files = parse_diff(diff);
        assert!(files[0].is_deleted);
        assert_eq!(files[0].new_path, "src/gone.rs");
    }

    #[test]
    fn test_renamed_file_detected() {
        let diff = "\
--- a/src/old_name.rs
+++ b/src/new_name.rs
@@ -1 +1 @@
-fn f() {}
+fn g() {}
";
        let files = parse_diff(diff);
        assert!(files[0].is_renamed);
        assert_eq!(files[0].new_path, "src/new_name.rs");
        let hunk = &files[0].hunks[0];
        assert_eq!(hunk.old_path.as_deref(), Some("src/old_name.rs"));
        assert_eq!(hunk.base_path(), "src/old_name.rs");
    }

    #[test]
    fn test_binary_file_detected() {
        let diff = "Binary files a/logo.png and b/logo.png differ";
        let files = parse_diff(diff);
        assert_eq!(files.len(), 1);
        assert!(files[0].is_binary);
    }

    #[test]
    fn test_multiple_files() {
        let diff = "\
--- a/one.rs
+++ b/one.rs
@@ -1 +1 @@
-a
+b
--- a/two.rs
+++ b/two.rs
@@ -5,2 +5,2 @@
 ctx
-c
+d
";
        let files = parse_diff(diff);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].new_path, "one.rs");
        assert_eq!(files[1].new_path, "two.rs");
        assert_eq!(files[1].hunks[0].old_start, 5);
    }

    #[test]
    fn test_hunk_header_without_counts() {
        let diff = "\
--- a/f.rs
+++ b/f.rs
@@ -3 +3 @@
-x
+y
";
        let files = parse_diff(diff);
        let hunk = &files[0].hunks[0];
        assert_eq!(hunk.old_count, 1);
        assert_eq!(hunk.new_count, 1);
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_diff("").is_empty());
        assert!(parse_diff("   \n  ").is_empty());
    }

    #[test]
    fn test_parse_file_patch_adds_headers() {
        let patch = "@@ -1,2 +1,2 @@\n ctx\n-old\n+new\n";
        let file = parse_file_patch(patch, "src/lib.rs");
        assert_eq!(file.new_path, "src/lib.rs");
        assert_eq!(file.hunks.len(), 1);
        assert_eq!(file.hunks[0].additions(), 1);
    }

    #[test]
    fn test_collect_hunks_skips_binary_and_trivial() {
        let mut files = parse_diff(SIMPLE_DIFF);
        files.push(FileDiff {
            old_path: "binary".into(),
            new_path: "binary".into(),
            is_binary: true,
            ..Default::default()
        });
        let hunks = collect_hunks(&files, 0);
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].file_path, "src/auth.rs");
    }

    #[test]
    fn test_collect_hunks_splits_oversized() {
        let mut lines = String::from("--- a/big.rs\n+++ b/big.rs\n@@ -1,0 +1,10 @@\n");
        for i in 0..10 {
            lines.push_str(&format!("+line {}\n", i));
        }
        let files = parse_diff(&lines);
        let hunks = collect_hunks(&files, 4);
        assert_eq!(hunks.len(), 3);
        assert!(hunks.iter().all(|h| h.lines.len() <= 4));
        // Split parts keep usable line numbering
        assert_eq!(hunks[1].new_start, 5);
    }
}
