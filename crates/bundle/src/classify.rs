use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic kind of a diagnostic bundle file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    TransformStats,
    TransformConfig,
    IlmErrors,
    IlmPolicies,
    VersionInfo,
    Shards,
    AllocationExplain,
    Settings,
    NodesStats,
    Pipelines,
    MlDetectors,
    IndexTemplates,
    Aliases,
    Segments,
}

/// Whether a document is needed for the primary result or only for lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentTier {
    /// Parsed in the first pass and published with the ingestion result
    Primary,
    /// Parsed later, best-effort, and only persisted for ad hoc lookups
    Secondary,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 14] = [
        Self::TransformStats,
        Self::TransformConfig,
        Self::IlmErrors,
        Self::IlmPolicies,
        Self::VersionInfo,
        Self::Shards,
        Self::AllocationExplain,
        Self::Settings,
        Self::NodesStats,
        Self::Pipelines,
        Self::MlDetectors,
        Self::IndexTemplates,
        Self::Aliases,
        Self::Segments,
    ];

    /// Human readable label used in "found files" listings
    pub fn label(self) -> &'static str {
        match self {
            Self::TransformStats => "Transform Stats",
            Self::TransformConfig => "Transform Config",
            Self::IlmErrors => "ILM Errors",
            Self::IlmPolicies => "ILM Policies",
            Self::VersionInfo => "Version Info",
            Self::Shards => "Shards Info",
            Self::AllocationExplain => "Allocation Info",
            Self::Settings => "Settings Info",
            Self::NodesStats => "Nodes Stats",
            Self::Pipelines => "Pipelines",
            Self::MlDetectors => "ML Anomaly Detectors",
            Self::IndexTemplates => "Index Templates",
            Self::Aliases => "Aliases",
            Self::Segments => "Segments",
        }
    }

    /// Canonical file name inside a diagnostic bundle
    pub fn file_name(self) -> &'static str {
        match self {
            Self::TransformStats => "transform_stats.json",
            Self::TransformConfig => "transform.json",
            Self::IlmErrors => "ilm_explain_only_errors.json",
            Self::IlmPolicies => "ilm_policies.json",
            Self::VersionInfo => "version.json",
            Self::Shards => "shards.json",
            Self::AllocationExplain => "allocation_explain.json",
            Self::Settings => "settings.json",
            Self::NodesStats => "nodes_stats.json",
            Self::Pipelines => "pipelines.json",
            Self::MlDetectors => "ml_anomaly_detectors.json",
            Self::IndexTemplates => "index_templates.json",
            Self::Aliases => "aliases.json",
            Self::Segments => "segments.json",
        }
    }

    pub fn tier(self) -> DocumentTier {
        match self {
            Self::IndexTemplates | Self::Aliases => DocumentTier::Secondary,
            _ => DocumentTier::Primary,
        }
    }

    pub fn is_primary(self) -> bool {
        self.tier() == DocumentTier::Primary
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

enum Rule {
    Contains(&'static str),
    ContainsAny(&'static [&'static str]),
    /// Path is exactly the file name or ends with `/<file name>`
    FileName(&'static str),
}

impl Rule {
    fn matches(&self, path: &str) -> bool {
        match self {
            Rule::Contains(needle) => path.contains(needle),
            Rule::ContainsAny(needles) => needles.iter().any(|needle| path.contains(needle)),
            Rule::FileName(name) => {
                path == *name
                    || path
                        .strip_suffix(name)
                        .is_some_and(|prefix| prefix.ends_with('/'))
            }
        }
    }
}

// Evaluated top to bottom; the first matching rule wins. The order matters:
// `transform_stats.json` must be tested before `transform.json`.
const RULES: &[(Rule, DocumentKind)] = &[
    (Rule::Contains("transform_stats.json"), DocumentKind::TransformStats),
    (Rule::Contains("transform.json"), DocumentKind::TransformConfig),
    (Rule::Contains("ilm_explain_only_errors.json"), DocumentKind::IlmErrors),
    (Rule::Contains("ilm_policies.json"), DocumentKind::IlmPolicies),
    (Rule::Contains("version.json"), DocumentKind::VersionInfo),
    (Rule::Contains("shards.json"), DocumentKind::Shards),
    (Rule::Contains("allocation_explain.json"), DocumentKind::AllocationExplain),
    (Rule::FileName("settings.json"), DocumentKind::Settings),
    (Rule::Contains("nodes_stats.json"), DocumentKind::NodesStats),
    (Rule::Contains("pipelines.json"), DocumentKind::Pipelines),
    (Rule::Contains("ml_anomaly_detectors.json"), DocumentKind::MlDetectors),
    (Rule::Contains("index_templates.json"), DocumentKind::IndexTemplates),
    (Rule::ContainsAny(&["alias.json", "aliases.json"]), DocumentKind::Aliases),
    (Rule::Contains("segments.json"), DocumentKind::Segments),
];

/// Normalize an archive path for classification
pub fn normalize_path(path: &str) -> String {
    path.to_lowercase()
}

/// Classify an already normalized (lower-cased) path.
///
/// Returns `None` for anything that does not end in `.json` and for paths
/// that match no rule.
pub fn classify(normalized: &str) -> Option<DocumentKind> {
    if !normalized.ends_with(".json") {
        return None;
    }
    RULES
        .iter()
        .find(|(rule, _)| rule.matches(normalized))
        .map(|(_, kind)| *kind)
}

/// Normalize then classify a raw archive path
pub fn classify_path(path: &str) -> Option<DocumentKind> {
    classify(&normalize_path(path))
}
