//! Diff parsing into review-ready hunks

mod parser;

pub use parser::{collect_hunks, parse_diff, parse_file_patch};
