//! Evidence snippets and their content-addressable identity
//!
//! Every claim a review makes must cite evidence. An evidence item is an
//! immutable snippet with a source type, a location, and a relevance score;
//! its identity is derived from source + location + a content hash so that
//! the same snippet retrieved twice deduplicates to one item.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Where an evidence snippet came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvidenceSource {
    /// Surrounding lines of the changed file itself
    LocalContext,
    /// Similar code elsewhere in the repository
    SimilarCode,
    /// Project convention or style-guide statement
    Convention,
}

impl EvidenceSource {
    /// Tie-break priority when fused scores are equal; lower wins.
    ///
    /// Local context is cheapest to verify and most directly relevant,
    /// conventions are curated, similar code is the noisiest source.
    pub fn priority(&self) -> u8 {
        match self {
            EvidenceSource::LocalContext => 0,
            EvidenceSource::Convention => 1,
            EvidenceSource::SimilarCode => 2,
        }
    }

    /// Short label used in evidence ids and prompt sections
    pub fn label(&self) -> &'static str {
        match self {
            EvidenceSource::LocalContext => "local-context",
            EvidenceSource::SimilarCode => "similar-code",
            EvidenceSource::Convention => "convention",
        }
    }
}

impl std::fmt::Display for EvidenceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A cited snippet supporting a review claim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    /// Content-addressable identity: `source:path:start-end:hash`
    pub id: String,
    pub source: EvidenceSource,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub content: String,
    /// Relevance in [0, 1]; first-pass similarity until reranked
    pub score: f64,
}

impl Evidence {
    /// Create a validated evidence item with a derived id
    pub fn new(
        source: EvidenceSource,
        file_path: impl Into<String>,
        start_line: u32,
        end_line: u32,
        content: impl Into<String>,
        score: f64,
    ) -> Result<Self> {
        let file_path = file_path.into();
        let content = content.into();

        if file_path.is_empty() {
            return Err(Error::Validation("evidence file path is empty".to_string()));
        }
        if content.is_empty() {
            return Err(Error::Validation("evidence content is empty".to_string()));
        }
        if start_line == 0 {
            return Err(Error::Validation(format!(
                "evidence start line must be >= 1, got {}",
                start_line
            )));
        }
        if end_line < start_line {
            return Err(Error::Validation(format!(
                "evidence line range inverted: {}-{}",
                start_line, end_line
            )));
        }
        if !(0.0..=1.0).contains(&score) {
            return Err(Error::Validation(format!(
                "evidence score {} outside [0, 1]",
                score
            )));
        }

        let id = format!(
            "{}:{}:{}-{}:{}",
            source.label(),
            file_path,
            start_line,
            end_line,
            content_hash(&content)
        );

        Ok(Self {
            id,
            source,
            file_path,
            start_line,
            end_line,
            content,
            score,
        })
    }

    /// Return a copy with a different relevance score (used after reranking)
    pub fn with_score(&self, score: f64) -> Self {
        let mut copy = self.clone();
        copy.score = score.clamp(0.0, 1.0);
        copy
    }

    /// Citation string in the form `[path:start-end]` or `[path:line]`
    pub fn citation(&self) -> String {
        if self.start_line == self.end_line {
            format!("[{}:{}]", self.file_path, self.start_line)
        } else {
            format!("[{}:{}-{}]", self.file_path, self.start_line, self.end_line)
        }
    }
}

/// First 8 hex chars of the SHA-256 of the content
pub fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    hex[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evidence_id_is_content_addressable() {
        let a = Evidence::new(
            EvidenceSource::LocalContext,
            "src/lib.rs",
            5,
            15,
            "fn helper() {}",
            1.0,
        )
        .unwrap();
        let b = Evidence::new(
            EvidenceSource::LocalContext,
            "src/lib.rs",
            5,
            15,
            "fn helper() {}",
            0.4,
        )
        .unwrap();
        // Same source + location + content dedups regardless of score
        assert_eq!(a.id, b.id);

        let c = Evidence::new(
            EvidenceSource::LocalContext,
            "src/lib.rs",
            5,
            15,
            "fn other() {}",
            1.0,
        )
        .unwrap();
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn test_validation_rejects_bad_input() {
        assert!(Evidence::new(EvidenceSource::Convention, "", 1, 1, "text", 0.5).is_err());
        assert!(Evidence::new(EvidenceSource::Convention, "f.rs", 1, 1, "", 0.5).is_err());
        assert!(Evidence::new(EvidenceSource::Convention, "f.rs", 0, 1, "text", 0.5).is_err());
        assert!(Evidence::new(EvidenceSource::Convention, "f.rs", 5, 4, "text", 0.5).is_err());
        assert!(Evidence::new(EvidenceSource::Convention, "f.rs", 1, 1, "text", 1.5).is_err());
        assert!(Evidence::new(EvidenceSource::Convention, "f.rs", 1, 1, "text", -0.1).is_err());
    }

    #[test]
    fn test_citation_formats() {
        let single = Evidence::new(EvidenceSource::SimilarCode, "a.rs", 7, 7, "x", 0.9).unwrap();
        assert_eq!(single.citation(), "[a.rs:7]");

        let range = Evidence::new(EvidenceSource::SimilarCode, "a.rs", 7, 12, "x", 0.9).unwrap();
        assert_eq!(range.citation(), "[a.rs:7-12]");
    }

    #[test]
    fn test_source_priority_ordering() {
        assert!(EvidenceSource::LocalContext.priority() < EvidenceSource::Convention.priority());
        assert!(EvidenceSource::Convention.priority() < EvidenceSource::SimilarCode.priority());
    }

    #[test]
    fn test_with_score_clamps() {
        let ev = Evidence::new(EvidenceSource::Convention, "f.rs", 1, 2, "text", 0.5).unwrap();
        assert_eq!(ev.with_score(1.7).score, 1.0);
        assert_eq!(ev.with_score(-0.2).score, 0.0);
        // Identity survives rescoring
        assert_eq!(ev.with_score(0.9).id, ev.id);
    }

    #[test]
    fn test_serde_source_names() {
        let json = serde_json::to_string(&EvidenceSource::LocalContext).unwrap();
        assert_eq!(json, "\"local-context\"");
        let back: EvidenceSource = serde_json::from_str("\"similar-code\"").unwrap();
        assert_eq!(back, EvidenceSource::SimilarCode);
    }
}
