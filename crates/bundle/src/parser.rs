use crate::classify::DocumentKind;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// A classified bundle file whose content parsed as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub kind: DocumentKind,
    pub path: String,
    pub content: Value,
}

/// A bundle file that could not be read or parsed. Kept for diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseFailure {
    pub path: String,
    pub kind: Option<DocumentKind>,
    pub reason: String,
}

impl ParseFailure {
    pub fn new(path: impl Into<String>, kind: Option<DocumentKind>, reason: impl ToString) -> Self {
        Self {
            path: path.into(),
            kind,
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

/// Parse the text of a classified file as JSON
pub fn parse_document(
    kind: DocumentKind,
    path: &str,
    text: &str,
) -> std::result::Result<ParsedDocument, ParseFailure> {
    serde_json::from_str::<Value>(text)
        .map(|content| ParsedDocument {
            kind,
            path: path.to_string(),
            content,
        })
        .map_err(|err| ParseFailure::new(path, Some(kind), err))
}

/// Non-fatal notice that required ILM documents were not found
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestAdvisory {
    pub missing: Vec<DocumentKind>,
}

impl IngestAdvisory {
    /// Documents whose absence is worth telling the user about
    pub const REQUIRED: [DocumentKind; 2] = [DocumentKind::IlmErrors, DocumentKind::IlmPolicies];

    pub fn missing_file_names(&self) -> Vec<&'static str> {
        self.missing.iter().map(|kind| kind.file_name()).collect()
    }
}

impl fmt::Display for IngestAdvisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Note: Some ILM files are missing ({}), but you can still view available data.",
            self.missing_file_names().join(", ")
        )
    }
}

/// Where a parsed bundle came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BundleSource {
    Archive { entries: usize },
    Demo { dir: String },
}

/// Result of the primary pass: every primary document that parsed, plus
/// the per-file failures that were skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedBundle {
    pub source: BundleSource,
    documents: BTreeMap<DocumentKind, ParsedDocument>,
    failures: Vec<ParseFailure>,
    advisory: Option<IngestAdvisory>,
}

impl ParsedBundle {
    pub fn new(source: BundleSource) -> Self {
        Self {
            source,
            documents: BTreeMap::new(),
            failures: Vec::new(),
            advisory: None,
        }
    }

    /// Insert a document. A later document of the same kind replaces the
    /// earlier one.
    pub fn insert(&mut self, document: ParsedDocument) {
        if let Some(previous) = self.documents.get(&document.kind) {
            log::debug!(
                "{} from {} replaces {}",
                document.kind,
                document.path,
                previous.path
            );
        }
        self.documents.insert(document.kind, document);
    }

    pub fn record_failure(&mut self, failure: ParseFailure) {
        log::warn!("Skipping {failure}");
        self.failures.push(failure);
    }

    /// Compute the ILM advisory from the documents present now
    pub fn finish(&mut self) {
        let missing: Vec<_> = IngestAdvisory::REQUIRED
            .into_iter()
            .filter(|kind| !self.has(*kind))
            .collect();
        self.advisory = (!missing.is_empty()).then_some(IngestAdvisory { missing });
        log::info!(
            "Found files: [{}]",
            self.found().iter().map(|k| k.label()).collect::<Vec<_>>().join(", ")
        );
    }

    pub fn document(&self, kind: DocumentKind) -> Option<&Value> {
        self.documents.get(&kind).map(|doc| &doc.content)
    }

    pub fn parsed(&self, kind: DocumentKind) -> Option<&ParsedDocument> {
        self.documents.get(&kind)
    }

    pub fn has(&self, kind: DocumentKind) -> bool {
        self.documents.contains_key(&kind)
    }

    /// Deserialize a document into a typed view. A shape mismatch is logged
    /// and reported as absent.
    pub fn typed<T: DeserializeOwned>(&self, kind: DocumentKind) -> Option<T> {
        let doc = self.documents.get(&kind)?;
        match T::deserialize(&doc.content) {
            Ok(value) => Some(value),
            Err(err) => {
                log::warn!("{} ({}) has an unexpected shape: {err}", kind, doc.path);
                None
            }
        }
    }

    pub fn found(&self) -> Vec<DocumentKind> {
        self.documents.keys().copied().collect()
    }

    pub fn failures(&self) -> &[ParseFailure] {
        &self.failures
    }

    pub fn advisory(&self) -> Option<&IngestAdvisory> {
        self.advisory.as_ref()
    }
}
