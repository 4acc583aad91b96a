//! Fixed-threshold heuristics over segment rollups.

use crate::segments::{ClusterSegmentSummary, IndexSegmentAggregate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cluster-wide `deleted / (docs + deleted)` above which force merge is advised
pub const DELETE_RATIO_THRESHOLD: f64 = 0.10;
pub const SEGMENT_COUNT_THRESHOLD: u64 = 1000;
pub const NON_COMPOUND_THRESHOLD: u64 = 50;
/// 5 GiB average segment size per index
pub const LARGE_SEGMENT_BYTES: f64 = 5.0 * 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    High,
    Medium,
}

impl fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueFinding {
    pub severity: IssueSeverity,
    pub title: String,
    pub description: String,
    pub recommended_action: String,
}

impl IssueFinding {
    fn new(
        severity: IssueSeverity,
        title: &str,
        description: impl Into<String>,
        recommended_action: &str,
    ) -> Self {
        Self {
            severity,
            title: title.to_string(),
            description: description.into(),
            recommended_action: recommended_action.to_string(),
        }
    }
}

/// Evaluate every rule independently. Cluster rules come first, then one
/// finding per index with oversized segments, in index order.
pub fn evaluate_issues(
    summary: &ClusterSegmentSummary,
    indices: &[IndexSegmentAggregate],
) -> Vec<IssueFinding> {
    let mut findings = Vec::new();

    if summary.delete_ratio() > DELETE_RATIO_THRESHOLD {
        findings.push(IssueFinding::new(
            IssueSeverity::High,
            "High Delete Ratio",
            "Your indices have a high number of deleted documents. Consider running force merge to reclaim space.",
            "Run force merge on affected indices",
        ));
    }

    if summary.total_segments > SEGMENT_COUNT_THRESHOLD {
        findings.push(IssueFinding::new(
            IssueSeverity::Medium,
            "High Segment Count",
            "Your cluster has a high number of segments which can impact search performance.",
            "Consider force merging indices with many small segments",
        ));
    }

    if summary.non_compound_segments > NON_COMPOUND_THRESHOLD {
        findings.push(IssueFinding::new(
            IssueSeverity::Medium,
            "Many Non-Compound Segments",
            "Your cluster has many non-compound segments which can impact file descriptors usage.",
            "Consider optimizing your merge policy",
        ));
    }

    for index in indices {
        if index.avg_segment_size() > LARGE_SEGMENT_BYTES {
            findings.push(IssueFinding::new(
                IssueSeverity::Medium,
                "Very Large Segments",
                format!(
                    "Index {} has very large segments which can impact recovery time.",
                    index.index_name
                ),
                "Consider adjusting your merge policy to limit segment size",
            ));
        }
    }

    if !findings.is_empty() {
        log::debug!("{} segment issues detected", findings.len());
    }
    findings
}
