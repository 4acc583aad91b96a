//! # ES Diagnostics Analysis
//!
//! Aggregation and heuristics over a parsed diagnostic bundle.
//!
//! ## Flow
//!
//! ```text
//! ParsedBundle
//!     │
//!     ├──> Typed views (model)
//!     │
//!     ├──> Cross-node aggregator ──> PipelineReport { active, inactive }
//!     │
//!     ├──> Segment aggregator ──> SegmentReport { indices, summary }
//!     │           │
//!     │           └──> Issue heuristics ──> Vec<IssueFinding>
//!     │
//!     └──> ILM / shards / allocation / settings / transforms / ML summaries
//! ```
//!
//! Everything is a pure function of its inputs; [`DiagnosticSession`]
//! computes them once per bundle.
//!
//! ## Example
//!
//! ```no_run
//! use esdiag_analysis::DiagnosticSession;
//! # fn demo(bundle: &esdiag_bundle::ParsedBundle) {
//! let session = DiagnosticSession::from_bundle(bundle);
//! if let Ok(issues) = session.issues() {
//!     for issue in issues {
//!         println!("[{}] {}", issue.severity, issue.title);
//!     }
//! }
//! # }
//! ```

pub mod allocation;
mod error;
pub mod format;
pub mod ilm;
mod issues;
pub mod ml;
pub mod model;
mod pipelines;
mod segments;
mod session;
pub mod settings;
pub mod shards;
pub mod transforms;

pub use allocation::{documentation_hint, AllocationStatus, DocumentationHint};
pub use error::{AnalysisError, Result};
pub use format::{format_bytes, format_percentage, format_seconds};
pub use ilm::{
    compare_policies, policy_error_summary, policy_for_index, summarize_ilm_errors,
    IlmErrorSummary, PhaseComparison, PolicyErrorCount,
};
pub use issues::{
    evaluate_issues, IssueFinding, IssueSeverity, DELETE_RATIO_THRESHOLD, LARGE_SEGMENT_BYTES,
    NON_COMPOUND_THRESHOLD, SEGMENT_COUNT_THRESHOLD,
};
pub use pipelines::{
    aggregate_pipelines, IngestPipelineAggregate, PipelineReport, ProcessorAggregate,
};
pub use segments::{
    aggregate_index, delete_ratio, summarize_segments, ClusterSegmentSummary, IndexExtreme,
    IndexSegmentAggregate, SegmentReport,
};
pub use session::DiagnosticSession;
pub use shards::{allocation_explain_request, paginate, unassigned_shards, ApiRequest, Page};
