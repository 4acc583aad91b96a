//! Typed views over loosely structured bundle documents.
//!
//! Only the fields the aggregations read are typed; everything a bundle may
//! omit defaults. Free-form sections stay as [`JsonMap`] and are read through
//! [`JsonMapExt`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type JsonMap = serde_json::Map<String, Value>;

/// Optional accessors for open string-keyed maps
pub trait JsonMapExt {
    fn str_at(&self, key: &str) -> Option<&str>;
    fn u64_at(&self, key: &str) -> Option<u64>;
    fn bool_at(&self, key: &str) -> Option<bool>;
    fn object_at(&self, key: &str) -> Option<&JsonMap>;
}

impl JsonMapExt for JsonMap {
    fn str_at(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    fn u64_at(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(Value::as_u64)
    }

    fn bool_at(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    fn object_at(&self, key: &str) -> Option<&JsonMap> {
        self.get(key).and_then(Value::as_object)
    }
}

// ---------------------------------------------------------------------------
// nodes_stats.json (ingest section)

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodesStatsResponse {
    #[serde(default)]
    pub cluster_name: Option<String>,
    #[serde(default)]
    pub nodes: IndexMap<String, NodeStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeStats {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ingest: Option<NodeIngest>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeIngest {
    #[serde(default)]
    pub pipelines: IndexMap<String, PipelineStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineStats {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub current: u64,
    #[serde(default)]
    pub failed: u64,
    /// Each element is a single-key object: `{ "<name>": { type, stats } }`
    #[serde(default)]
    pub processors: Vec<IndexMap<String, ProcessorStats>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessorStats {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub stats: ProcessorCounters,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorCounters {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub current: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub time_in_millis: u64,
}

impl ProcessorCounters {
    pub fn add(&mut self, other: &ProcessorCounters) {
        self.count = self.count.saturating_add(other.count);
        self.current = self.current.saturating_add(other.current);
        self.failed = self.failed.saturating_add(other.failed);
        self.time_in_millis = self.time_in_millis.saturating_add(other.time_in_millis);
    }
}

// ---------------------------------------------------------------------------
// pipelines.json

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "_meta", default)]
    pub meta: Option<JsonMap>,
    #[serde(default)]
    pub processors: Vec<JsonMap>,
    #[serde(default)]
    pub on_failure: Vec<JsonMap>,
    #[serde(default)]
    pub version: Option<u64>,
}

pub type PipelineConfigs = IndexMap<String, PipelineConfig>;

impl PipelineConfig {
    pub fn is_managed(&self) -> bool {
        self.meta
            .as_ref()
            .and_then(|meta| meta.bool_at("managed"))
            .unwrap_or(false)
    }

    pub fn managed_by(&self) -> Option<&str> {
        self.meta.as_ref().and_then(|meta| meta.str_at("managed_by"))
    }

    /// Processor types in declaration order (`{"grok": {...}}` -> `grok`)
    pub fn processor_types(&self) -> Vec<&str> {
        self.processors
            .iter()
            .filter_map(|processor| processor.keys().next().map(String::as_str))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// settings.json (index name -> `{ settings: { index: {...} } }`)

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexSettingsEntry {
    #[serde(default)]
    pub settings: Option<JsonMap>,
}

pub type IndexSettings = IndexMap<String, IndexSettingsEntry>;

/// Settings values arrive as strings, but numbers and booleans are accepted
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

impl IndexSettingsEntry {
    /// The `settings.index` block
    pub fn index(&self) -> Option<&JsonMap> {
        self.settings.as_ref().and_then(|settings| settings.object_at("index"))
    }

    fn index_text(&self, key: &str) -> Option<String> {
        self.index().and_then(|index| index.get(key)).and_then(scalar_text)
    }

    pub fn is_hidden(&self) -> bool {
        self.index_text("hidden").is_some_and(|hidden| hidden == "true")
    }

    pub fn number_of_shards(&self) -> Option<String> {
        self.index_text("number_of_shards")
    }

    pub fn number_of_replicas(&self) -> Option<String> {
        self.index_text("number_of_replicas")
    }

    pub fn auto_expand_replicas(&self) -> Option<String> {
        self.index_text("auto_expand_replicas")
    }

    /// Creation time in epoch milliseconds
    pub fn creation_date_millis(&self) -> Option<u64> {
        self.index_text("creation_date").and_then(|raw| raw.trim().parse().ok())
    }

    pub fn creation_date_string(&self) -> Option<String> {
        self.index_text("creation_date_string")
    }
}

// ---------------------------------------------------------------------------
// segments.json

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentsResponse {
    #[serde(default)]
    pub indices: IndexMap<String, IndexSegments>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexSegments {
    /// Shard group id -> shard copies (primary and replicas)
    #[serde(default)]
    pub shards: IndexMap<String, Vec<ShardSegments>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShardSegments {
    #[serde(default)]
    pub routing: Option<ShardRouting>,
    #[serde(default)]
    pub segments: IndexMap<String, SegmentInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShardRouting {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub node: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentInfo {
    #[serde(default)]
    pub generation: u64,
    #[serde(default)]
    pub num_docs: u64,
    #[serde(default)]
    pub deleted_docs: u64,
    #[serde(default)]
    pub size_in_bytes: u64,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub compound: bool,
}

// ---------------------------------------------------------------------------
// ilm_explain_only_errors.json / ilm_policies.json

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IlmErrors {
    #[serde(default)]
    pub indices: IndexMap<String, IlmIndexError>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IlmIndexError {
    #[serde(default)]
    pub index: Option<String>,
    #[serde(default)]
    pub policy: Option<String>,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub step: Option<String>,
    #[serde(default)]
    pub failed_step: Option<String>,
    #[serde(default)]
    pub action_time: Option<String>,
    #[serde(default)]
    pub action_time_millis: Option<i64>,
    #[serde(default)]
    pub is_auto_retryable_error: Option<bool>,
    #[serde(default)]
    pub failed_step_retry_count: Option<u64>,
    #[serde(default)]
    pub step_info: Option<JsonMap>,
}

impl IlmIndexError {
    /// `step_info.reason`, when the error carries one
    pub fn reason(&self) -> Option<&str> {
        self.step_info.as_ref().and_then(|info| info.str_at("reason"))
    }
}

/// Policy name -> policy body (free-form; phases under `policy.phases` or `phases`)
pub type IlmPolicies = IndexMap<String, Value>;

// ---------------------------------------------------------------------------
// shards.json / allocation_explain.json

/// One row of `_cat/shards?format=json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardRow {
    #[serde(default)]
    pub index: String,
    #[serde(default)]
    pub shard: String,
    #[serde(default)]
    pub prirep: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub docs: Option<String>,
    #[serde(default)]
    pub store: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub node: Option<String>,
}

impl ShardRow {
    pub fn is_primary(&self) -> bool {
        self.prirep == "p"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationExplanation {
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub index: String,
    #[serde(default)]
    pub shard: u32,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub current_state: String,
    #[serde(default)]
    pub current_node: Option<Value>,
    #[serde(default)]
    pub can_allocate: Option<String>,
    #[serde(default)]
    pub allocate_explanation: Option<String>,
    #[serde(default)]
    pub unassigned_info: Option<UnassignedInfo>,
    #[serde(default)]
    pub node_allocation_decisions: Vec<NodeAllocationDecision>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnassignedInfo {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub at: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub last_allocation_status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeAllocationDecision {
    #[serde(default)]
    pub node_id: String,
    #[serde(default)]
    pub node_name: String,
    #[serde(default)]
    pub transport_address: Option<String>,
    #[serde(default)]
    pub node_attributes: JsonMap,
    #[serde(default)]
    pub node_decision: String,
    #[serde(default)]
    pub deciders: Vec<NodeDecider>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDecider {
    #[serde(default)]
    pub decider: String,
    #[serde(default)]
    pub decision: String,
    #[serde(default)]
    pub explanation: String,
}

// ---------------------------------------------------------------------------
// transform_stats.json / transform.json

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformStatsResponse {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub transforms: Vec<TransformStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformStats {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub node: Option<JsonMap>,
    #[serde(default)]
    pub stats: TransformCounters,
    #[serde(default)]
    pub checkpointing: Option<TransformCheckpointing>,
    #[serde(default)]
    pub health: Option<TransformHealth>,
}

impl TransformStats {
    pub fn health_status(&self) -> Option<&str> {
        self.health.as_ref().map(|health| health.status.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformCounters {
    #[serde(default)]
    pub pages_processed: u64,
    #[serde(default)]
    pub documents_processed: u64,
    #[serde(default)]
    pub documents_indexed: u64,
    #[serde(default)]
    pub documents_deleted: u64,
    #[serde(default)]
    pub trigger_count: u64,
    #[serde(default)]
    pub index_time_in_ms: u64,
    #[serde(default)]
    pub index_failures: u64,
    #[serde(default)]
    pub search_time_in_ms: u64,
    #[serde(default)]
    pub search_failures: u64,
    #[serde(default)]
    pub processing_time_in_ms: u64,
    #[serde(default)]
    pub exponential_avg_checkpoint_duration_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformCheckpointing {
    #[serde(default)]
    pub last: Option<TransformCheckpoint>,
    #[serde(default)]
    pub operations_behind: Option<u64>,
    #[serde(default)]
    pub last_search_time: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformCheckpoint {
    #[serde(default)]
    pub checkpoint: u64,
    #[serde(default)]
    pub timestamp_millis: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformHealth {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformConfigResponse {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub transforms: Vec<TransformConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub source: Option<TransformSource>,
    #[serde(default)]
    pub dest: Option<TransformDest>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub sync: Option<Value>,
    #[serde(default)]
    pub settings: Option<JsonMap>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformSource {
    #[serde(default, deserialize_with = "one_or_many")]
    pub index: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformDest {
    #[serde(default)]
    pub index: String,
}

// `source.index` may be a single string or a list
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

// ---------------------------------------------------------------------------
// ml_anomaly_detectors.json

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MlAnomalyDetectors {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub jobs: Vec<MlJob>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MlJob {
    #[serde(default)]
    pub job_id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub job_version: Option<String>,
    #[serde(default)]
    pub create_time: Option<i64>,
    #[serde(default)]
    pub analysis_config: Option<MlAnalysisConfig>,
    #[serde(default)]
    pub analysis_limits: Option<JsonMap>,
    #[serde(default)]
    pub custom_settings: Option<JsonMap>,
    #[serde(default)]
    pub datafeed_config: Option<JsonMap>,
}

impl MlJob {
    pub fn model_memory_limit(&self) -> Option<&str> {
        self.analysis_limits
            .as_ref()
            .and_then(|limits| limits.str_at("model_memory_limit"))
    }

    pub fn created_by(&self) -> Option<&str> {
        self.custom_settings
            .as_ref()
            .and_then(|settings| settings.str_at("created_by"))
    }

    pub fn detectors(&self) -> &[MlDetector] {
        self.analysis_config
            .as_ref()
            .map(|config| config.detectors.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MlAnalysisConfig {
    #[serde(default)]
    pub bucket_span: Option<String>,
    #[serde(default)]
    pub detectors: Vec<MlDetector>,
    #[serde(default)]
    pub influencers: Vec<String>,
    #[serde(default)]
    pub model_prune_window: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MlDetector {
    #[serde(default)]
    pub detector_description: Option<String>,
    #[serde(default)]
    pub function: Option<String>,
    #[serde(default)]
    pub field_name: Option<String>,
    #[serde(default)]
    pub partition_field_name: Option<String>,
}

// ---------------------------------------------------------------------------
// version.json

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub cluster_name: Option<String>,
    #[serde(default)]
    pub cluster_uuid: Option<String>,
    #[serde(default)]
    pub version: Option<VersionDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDetails {
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub build_flavor: Option<String>,
    #[serde(default)]
    pub lucene_version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn processor_entries_keep_name_and_type() {
        let stats: PipelineStats = serde_json::from_value(json!({
            "count": 3,
            "processors": [
                {"parse_message": {"type": "grok", "stats": {"count": 3, "time_in_millis": 7}}},
                {"set": {"type": "set", "stats": {}}}
            ]
        }))
        .unwrap();
        let (name, first) = stats.processors[0].first().unwrap();
        assert_eq!(name, "parse_message");
        assert_eq!(first.kind, "grok");
        assert_eq!(first.stats.time_in_millis, 7);
        assert_eq!(stats.processors[1].first().unwrap().1.stats.count, 0);
    }

    #[test]
    fn node_order_follows_source() {
        let stats: NodesStatsResponse = serde_json::from_value(json!({
            "nodes": {"zeta": {}, "alpha": {}, "mid": {}}
        }))
        .unwrap();
        let ids: Vec<_> = stats.nodes.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn transform_source_accepts_string_or_list() {
        let single: TransformSource = serde_json::from_value(json!({"index": "logs-*"})).unwrap();
        assert_eq!(single.index, vec!["logs-*".to_string()]);
        let many: TransformSource =
            serde_json::from_value(json!({"index": ["a", "b"]})).unwrap();
        assert_eq!(many.index.len(), 2);
    }

    #[test]
    fn open_map_accessors_are_optional() {
        let map: JsonMap = serde_json::from_value(json!({
            "managed": true,
            "managed_by": "fleet",
            "nested": {"x": 1}
        }))
        .unwrap();
        assert_eq!(map.bool_at("managed"), Some(true));
        assert_eq!(map.str_at("managed_by"), Some("fleet"));
        assert_eq!(map.str_at("managed"), None);
        assert_eq!(map.object_at("nested").and_then(|m| m.u64_at("x")), Some(1));
        assert_eq!(map.u64_at("missing"), None);
    }

    #[test]
    fn index_settings_read_nested_index_block() {
        let settings: IndexSettings = serde_json::from_value(json!({
            "logs-000001": {"settings": {"index": {
                "number_of_shards": "3",
                "number_of_replicas": 1,
                "auto_expand_replicas": "0-1",
                "hidden": "true",
                "creation_date": "1700000000000"
            }}},
            "bare": {}
        }))
        .unwrap();

        let logs = &settings["logs-000001"];
        assert_eq!(logs.number_of_shards().as_deref(), Some("3"));
        assert_eq!(logs.number_of_replicas().as_deref(), Some("1"));
        assert_eq!(logs.auto_expand_replicas().as_deref(), Some("0-1"));
        assert!(logs.is_hidden());
        assert_eq!(logs.creation_date_millis(), Some(1_700_000_000_000));

        let bare = &settings["bare"];
        assert!(!bare.is_hidden());
        assert_eq!(bare.number_of_shards(), None);
        assert_eq!(bare.creation_date_millis(), None);
    }

    #[test]
    fn pipeline_config_processor_types() {
        let config: PipelineConfig = serde_json::from_value(json!({
            "_meta": {"managed": true, "managed_by": "fleet"},
            "processors": [{"grok": {"field": "message"}}, {"rename": {}}]
        }))
        .unwrap();
        assert!(config.is_managed());
        assert_eq!(config.managed_by(), Some("fleet"));
        assert_eq!(config.processor_types(), vec!["grok", "rename"]);
    }
}
