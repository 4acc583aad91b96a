use crate::archive::{ArchiveEntry, BundleArchive};
use crate::classify::{classify, normalize_path, DocumentKind};
use crate::config::IngestConfig;
use crate::error::Result;
use crate::parser::{parse_document, BundleSource, ParseFailure, ParsedBundle};
use crate::store::{
    persist_best_effort, KeyValueStore, StoreOutcome, ALIASES_KEY, INDEX_TEMPLATES_KEY,
};
use serde::Serialize;
use std::sync::Arc;

/// Runs the primary pass over an uploaded bundle and hands back the
/// deferred secondary pass.
pub struct BundleIngestor {
    config: IngestConfig,
    store: Arc<dyn KeyValueStore>,
}

/// Output of one ingestion: the primary result, available immediately, and
/// the secondary pass, which the caller may run whenever it likes.
pub struct Ingestion {
    pub bundle: ParsedBundle,
    pub secondary: SecondaryPass,
}

impl BundleIngestor {
    pub fn new(config: IngestConfig, store: Arc<dyn KeyValueStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Ingest raw archive bytes. Only a corrupt archive is an error.
    pub fn ingest_bytes(&self, bytes: Vec<u8>) -> Result<Ingestion> {
        let archive = BundleArchive::from_bytes(bytes)?;
        Ok(self.ingest_archive(archive))
    }

    /// Primary pass over an opened archive.
    ///
    /// Entries are visited in archive order. Directories and non-JSON files
    /// are skipped; unreadable or malformed files are recorded and skipped.
    pub fn ingest_archive(&self, archive: BundleArchive) -> Ingestion {
        let mut archive = archive.with_entry_limit(self.config.max_entry_bytes);
        let mut bundle = ParsedBundle::new(BundleSource::Archive {
            entries: archive.len(),
        });
        let mut secondary_entries = Vec::new();

        let entries: Vec<ArchiveEntry> = archive.files().cloned().collect();
        for entry in entries {
            let normalized = normalize_path(&entry.path);
            log::debug!("Processing file: {normalized}");
            if !normalized.ends_with(".json") {
                log::debug!("Skipping non-JSON file: {normalized}");
                continue;
            }
            let Some(kind) = classify(&normalized) else {
                continue;
            };
            if !kind.is_primary() {
                secondary_entries.push((kind, entry));
                continue;
            }

            let text = match archive.read_text(&entry) {
                Ok(text) => text,
                Err(err) => {
                    bundle.record_failure(ParseFailure::new(&entry.path, Some(kind), err));
                    continue;
                }
            };
            match parse_document(kind, &entry.path, &text) {
                Ok(document) => bundle.insert(document),
                Err(failure) => bundle.record_failure(failure),
            }
        }

        bundle.finish();
        if let Some(advisory) = bundle.advisory() {
            log::info!("{advisory}");
        }

        Ingestion {
            bundle,
            secondary: SecondaryPass {
                archive,
                entries: secondary_entries,
                store: Arc::clone(&self.store),
            },
        }
    }
}

/// Deferred best-effort pass over index templates and aliases.
///
/// Nothing in the primary result depends on it. Every failure is swallowed
/// into the returned report.
pub struct SecondaryPass {
    archive: BundleArchive,
    entries: Vec<(DocumentKind, ArchiveEntry)>,
    store: Arc<dyn KeyValueStore>,
}

/// What the secondary pass managed to do
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SecondaryReport {
    pub persisted: Vec<(DocumentKind, StoreOutcome)>,
    pub skipped: Vec<ParseFailure>,
}

impl SecondaryPass {
    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    pub fn run(self) -> SecondaryReport {
        let SecondaryPass {
            mut archive,
            entries,
            store,
        } = self;
        let mut report = SecondaryReport::default();

        for (kind, entry) in entries {
            let parsed = archive
                .read_text(&entry)
                .map_err(|err| ParseFailure::new(&entry.path, Some(kind), err))
                .and_then(|text| parse_document(kind, &entry.path, &text));
            let document = match parsed {
                Ok(document) => document,
                Err(failure) => {
                    log::warn!("Failed to process optional file {failure}");
                    report.skipped.push(failure);
                    continue;
                }
            };

            let key = match kind {
                DocumentKind::IndexTemplates => INDEX_TEMPLATES_KEY,
                DocumentKind::Aliases => ALIASES_KEY,
                _ => continue,
            };
            let outcome = persist_best_effort(store.as_ref(), key, &document.content);
            report.persisted.push((kind, outcome));
        }

        report
    }
}
