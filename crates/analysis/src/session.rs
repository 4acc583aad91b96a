//! Immutable view over one ingested bundle.
//!
//! Every typed view and aggregate is computed once when the session is
//! built. A new bundle means a new session; nothing here is mutated after
//! construction.

use crate::allocation::AllocationStatus;
use crate::error::{AnalysisError, Result};
use crate::ilm::{policy_error_summary, summarize_ilm_errors, IlmErrorSummary, PolicyErrorCount};
use crate::issues::{evaluate_issues, IssueFinding};
use crate::model::{
    IlmErrors, IlmPolicies, IndexSettings, MlAnomalyDetectors, NodesStatsResponse,
    PipelineConfigs, SegmentsResponse, ShardRow, TransformConfigResponse, TransformStatsResponse,
    VersionInfo,
};
use crate::pipelines::{aggregate_pipelines, PipelineReport};
use crate::segments::{summarize_segments, SegmentReport};
use esdiag_bundle::{DocumentKind, IngestAdvisory, ParsedBundle};
use serde::de::DeserializeOwned;

type View<T> = std::result::Result<T, AnalysisError>;

fn view<T: DeserializeOwned>(bundle: &ParsedBundle, kind: DocumentKind) -> View<T> {
    let document = bundle
        .document(kind)
        .ok_or(AnalysisError::MissingDocument(kind))?;
    T::deserialize(document).map_err(|err| {
        log::warn!("{kind} has an unexpected shape: {err}");
        AnalysisError::shape(kind, err)
    })
}

fn get<T>(view: &View<T>) -> Result<&T> {
    view.as_ref().map_err(Clone::clone)
}

#[derive(Debug, Clone)]
pub struct DiagnosticSession {
    advisory: Option<IngestAdvisory>,
    found: Vec<DocumentKind>,

    ilm_policies: View<IlmPolicies>,
    ilm_summary: View<IlmErrorSummary>,
    policy_errors: View<Vec<PolicyErrorCount>>,
    shards: View<Vec<ShardRow>>,
    allocation: View<AllocationStatus>,
    settings: View<IndexSettings>,
    nodes_stats: View<NodesStatsResponse>,
    pipelines: View<PipelineReport>,
    pipeline_configs: View<PipelineConfigs>,
    segments: View<SegmentReport>,
    issues: View<Vec<IssueFinding>>,
    transform_stats: View<TransformStatsResponse>,
    transform_config: View<TransformConfigResponse>,
    ml_detectors: View<MlAnomalyDetectors>,
    version: View<VersionInfo>,
}

impl DiagnosticSession {
    pub fn from_bundle(bundle: &ParsedBundle) -> Self {
        let ilm_errors: View<IlmErrors> = view(bundle, DocumentKind::IlmErrors);
        let nodes_stats: View<NodesStatsResponse> = view(bundle, DocumentKind::NodesStats);
        let segment_data: View<SegmentsResponse> = view(bundle, DocumentKind::Segments);

        let segments = segment_data.map(|data| summarize_segments(&data));
        let issues = segments
            .as_ref()
            .map(|report| evaluate_issues(&report.summary, &report.indices))
            .map_err(Clone::clone);

        let allocation = bundle
            .document(DocumentKind::AllocationExplain)
            .map(AllocationStatus::from_value)
            .ok_or(AnalysisError::MissingDocument(DocumentKind::AllocationExplain));

        let session = Self {
            advisory: bundle.advisory().cloned(),
            found: bundle.found(),
            ilm_summary: ilm_errors.as_ref().map(summarize_ilm_errors).map_err(Clone::clone),
            policy_errors: ilm_errors.as_ref().map(policy_error_summary).map_err(Clone::clone),
            ilm_policies: view(bundle, DocumentKind::IlmPolicies),
            shards: view(bundle, DocumentKind::Shards),
            allocation,
            settings: view(bundle, DocumentKind::Settings),
            pipelines: nodes_stats.as_ref().map(aggregate_pipelines).map_err(Clone::clone),
            nodes_stats,
            pipeline_configs: view(bundle, DocumentKind::Pipelines),
            segments,
            issues,
            transform_stats: view(bundle, DocumentKind::TransformStats),
            transform_config: view(bundle, DocumentKind::TransformConfig),
            ml_detectors: view(bundle, DocumentKind::MlDetectors),
            version: view(bundle, DocumentKind::VersionInfo),
        };
        log::debug!("Session built from {} documents", session.found.len());
        session
    }

    pub fn advisory(&self) -> Option<&IngestAdvisory> {
        self.advisory.as_ref()
    }

    /// Kinds that parsed, whether or not they matched their typed view
    pub fn found(&self) -> &[DocumentKind] {
        &self.found
    }

    pub fn ilm_policies(&self) -> Result<&IlmPolicies> {
        get(&self.ilm_policies)
    }

    pub fn ilm_summary(&self) -> Result<&IlmErrorSummary> {
        get(&self.ilm_summary)
    }

    pub fn policy_errors(&self) -> Result<&[PolicyErrorCount]> {
        get(&self.policy_errors).map(Vec::as_slice)
    }

    pub fn shards(&self) -> Result<&[ShardRow]> {
        get(&self.shards).map(Vec::as_slice)
    }

    pub fn allocation(&self) -> Result<&AllocationStatus> {
        get(&self.allocation)
    }

    /// Per-index settings keyed by index name
    pub fn settings(&self) -> Result<&IndexSettings> {
        get(&self.settings)
    }

    pub fn pipelines(&self) -> Result<&PipelineReport> {
        get(&self.pipelines)
    }

    pub fn pipeline_configs(&self) -> Result<&PipelineConfigs> {
        get(&self.pipeline_configs)
    }

    pub fn segments(&self) -> Result<&SegmentReport> {
        get(&self.segments)
    }

    /// Findings over segment data; unavailable when segments are
    pub fn issues(&self) -> Result<&[IssueFinding]> {
        get(&self.issues).map(Vec::as_slice)
    }

    pub fn transform_stats(&self) -> Result<&TransformStatsResponse> {
        get(&self.transform_stats)
    }

    pub fn transform_config(&self) -> Result<&TransformConfigResponse> {
        get(&self.transform_config)
    }

    pub fn ml_detectors(&self) -> Result<&MlAnomalyDetectors> {
        get(&self.ml_detectors)
    }

    pub fn version(&self) -> Result<&VersionInfo> {
        get(&self.version)
    }

    /// Cluster name from version info, falling back to node stats
    pub fn cluster_name(&self) -> Option<&str> {
        self.version
            .as_ref()
            .ok()
            .and_then(|version| version.cluster_name.as_deref())
            .or_else(|| {
                self.nodes_stats
                    .as_ref()
                    .ok()
                    .and_then(|stats| stats.cluster_name.as_deref())
            })
    }
}
