//! Demo mode: a fixed set of JSON documents served from a static directory.

use crate::classify::DocumentKind;
use crate::error::{BundleError, Result};
use crate::parser::{parse_document, BundleSource, ParsedBundle};
use crate::store::{
    persist_best_effort, KeyValueStore, StoreOutcome, ALIASES_KEY, INDEX_TEMPLATES_KEY,
};
use std::path::Path;

/// Files loaded in demo mode. ML detectors, transform configuration and
/// version info are only available from a real bundle.
pub const DEMO_FILES: [DocumentKind; 10] = [
    DocumentKind::IlmErrors,
    DocumentKind::IlmPolicies,
    DocumentKind::IndexTemplates,
    DocumentKind::Aliases,
    DocumentKind::Shards,
    DocumentKind::AllocationExplain,
    DocumentKind::Settings,
    DocumentKind::NodesStats,
    DocumentKind::Pipelines,
    DocumentKind::TransformStats,
];

/// A loaded demo directory and what happened to the persisted documents
#[derive(Debug, Clone)]
pub struct DemoLoad {
    pub bundle: ParsedBundle,
    pub persisted: Vec<(DocumentKind, StoreOutcome)>,
}

impl DemoLoad {
    pub fn degraded(&self) -> impl Iterator<Item = &(DocumentKind, StoreOutcome)> {
        self.persisted.iter().filter(|(_, outcome)| !outcome.is_stored())
    }
}

/// Load every demo document from `dir`.
///
/// All-or-nothing: a missing or malformed file fails the whole load with
/// [`BundleError::DemoUnavailable`]. Templates and aliases go to the store
/// (best-effort) instead of the returned bundle.
pub fn load_demo(dir: &Path, store: &dyn KeyValueStore) -> Result<DemoLoad> {
    let mut bundle = ParsedBundle::new(BundleSource::Demo {
        dir: dir.display().to_string(),
    });

    let mut loaded = Vec::with_capacity(DEMO_FILES.len());
    for kind in DEMO_FILES {
        let path = dir.join(kind.file_name());
        let text = std::fs::read_to_string(&path).map_err(|err| BundleError::DemoUnavailable {
            file: kind.file_name().to_string(),
            reason: err.to_string(),
        })?;
        let document = parse_document(kind, kind.file_name(), &text).map_err(|failure| {
            BundleError::DemoUnavailable {
                file: kind.file_name().to_string(),
                reason: failure.reason,
            }
        })?;
        loaded.push(document);
    }

    let mut persisted = Vec::new();
    for document in loaded {
        let key = match document.kind {
            DocumentKind::IndexTemplates => INDEX_TEMPLATES_KEY,
            DocumentKind::Aliases => ALIASES_KEY,
            _ => {
                bundle.insert(document);
                continue;
            }
        };
        let outcome = persist_best_effort(store, key, &document.content);
        persisted.push((document.kind, outcome));
    }

    bundle.finish();
    Ok(DemoLoad { bundle, persisted })
}
