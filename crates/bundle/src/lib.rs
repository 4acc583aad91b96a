//! # ES Diagnostics Bundle
//!
//! Ingestion of Elasticsearch diagnostic bundles.
//!
//! ## Pipeline
//!
//! ```text
//! ZIP bytes
//!     │
//!     ├──> Archive Reader (fatal only on a corrupt container)
//!     │      └─> Entries (path, lazy content)
//!     │
//!     ├──> File Classifier (first matching rule wins)
//!     │      └─> DocumentKind per .json entry
//!     │
//!     ├──> Primary pass: JSON parse, per-file failures recorded
//!     │      └─> ParsedBundle + ILM advisory
//!     │
//!     └──> Secondary pass (deferred, best-effort)
//!            └─> index templates / aliases → KeyValueStore
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use esdiag_bundle::{open_store, BundleIngestor, IngestConfig};
//!
//! fn main() -> esdiag_bundle::Result<()> {
//!     let config = IngestConfig::in_memory();
//!     let store = open_store(&config)?;
//!     let ingestor = BundleIngestor::new(config, store);
//!
//!     let ingestion = ingestor.ingest_bytes(std::fs::read("diag.zip")?)?;
//!     if let Some(advisory) = ingestion.bundle.advisory() {
//!         eprintln!("{advisory}");
//!     }
//!     let _report = ingestion.secondary.run();
//!     Ok(())
//! }
//! ```

mod archive;
mod classify;
mod config;
pub mod demo;
mod error;
mod ingest;
mod parser;
mod store;

pub use archive::{ArchiveEntry, BundleArchive};
pub use classify::{classify, classify_path, normalize_path, DocumentKind, DocumentTier};
pub use config::{
    IngestConfig, StoreBackend, ENV_MAX_ENTRY_BYTES, ENV_STORE_BACKEND, ENV_STORE_DIR,
    ENV_STORE_QUOTA_BYTES,
};
pub use demo::{load_demo, DemoLoad, DEMO_FILES};
pub use error::{BundleError, Result};
pub use ingest::{BundleIngestor, Ingestion, SecondaryPass, SecondaryReport};
pub use parser::{
    parse_document, BundleSource, IngestAdvisory, ParseFailure, ParsedBundle, ParsedDocument,
};
pub use store::{
    open_store, persist_best_effort, FileStore, KeyValueStore, MemoryStore, StoreOutcome,
    ALIASES_KEY, INDEX_TEMPLATES_KEY,
};
