//! Cross-node ingest pipeline aggregation.

use crate::model::{NodesStatsResponse, PipelineStats, ProcessorCounters};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorAggregate {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub stats: ProcessorCounters,
}

/// One pipeline summed over every node that reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestPipelineAggregate {
    pub pipeline_id: String,
    pub count: u64,
    pub current: u64,
    pub failed: u64,
    pub has_grok: bool,
    pub processors: Vec<ProcessorAggregate>,
}

impl IngestPipelineAggregate {
    /// Shape (processor names, types and `hasGrok`) comes from the first
    /// node reporting the pipeline. Totals start at zero.
    fn first_seen(pipeline_id: &str, stats: &PipelineStats) -> Self {
        let processors: Vec<ProcessorAggregate> = stats
            .processors
            .iter()
            .filter_map(|entry| entry.first())
            .map(|(name, processor)| ProcessorAggregate {
                name: name.clone(),
                kind: processor.kind.clone(),
                stats: ProcessorCounters::default(),
            })
            .collect();
        let has_grok = processors.iter().any(|p| p.kind == "grok");

        Self {
            pipeline_id: pipeline_id.to_string(),
            count: 0,
            current: 0,
            failed: 0,
            has_grok,
            processors,
        }
    }

    fn absorb(&mut self, stats: &PipelineStats) {
        self.count = self.count.saturating_add(stats.count);
        self.current = self.current.saturating_add(stats.current);
        self.failed = self.failed.saturating_add(stats.failed);

        // Processors past the first occurrence's length are ignored.
        for (slot, entry) in self.processors.iter_mut().zip(&stats.processors) {
            if let Some((_, processor)) = entry.first() {
                slot.stats.add(&processor.stats);
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.count > 0 || self.current > 0
    }

    /// Console request that removes the pipeline
    pub fn delete_request(&self) -> String {
        format!("DELETE _ingest/pipeline/{}", self.pipeline_id)
    }

    /// Share of ingested documents that failed, as a fraction
    pub fn failure_rate(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.failed as f64 / self.count as f64
        }
    }

    pub fn total_time_in_millis(&self) -> u64 {
        self.processors
            .iter()
            .fold(0u64, |total, p| total.saturating_add(p.stats.time_in_millis))
    }
}

/// Pipelines split by activity. `active` is sorted by count descending,
/// `inactive` by id ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub active: Vec<IngestPipelineAggregate>,
    pub inactive: Vec<IngestPipelineAggregate>,
}

impl PipelineReport {
    pub fn len(&self) -> usize {
        self.active.len() + self.inactive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.inactive.is_empty()
    }

    pub fn find(&self, pipeline_id: &str) -> Option<&IngestPipelineAggregate> {
        self.active
            .iter()
            .chain(&self.inactive)
            .find(|p| p.pipeline_id == pipeline_id)
    }

    /// Pipelines whose id contains `term`, ignoring case. Order is kept.
    pub fn search(&self, term: &str) -> PipelineReport {
        let needle = term.to_lowercase();
        let keep = |p: &&IngestPipelineAggregate| p.pipeline_id.to_lowercase().contains(&needle);
        PipelineReport {
            active: self.active.iter().filter(keep).cloned().collect(),
            inactive: self.inactive.iter().filter(keep).cloned().collect(),
        }
    }

    /// Cleanup requests for every inactive pipeline
    pub fn delete_requests(&self) -> Vec<String> {
        self.inactive.iter().map(|p| p.delete_request()).collect()
    }
}

/// Aggregate every pipeline across nodes, in node iteration order.
pub fn aggregate_pipelines(stats: &NodesStatsResponse) -> PipelineReport {
    let mut aggregates: IndexMap<&str, IngestPipelineAggregate> = IndexMap::new();

    for (node_id, node) in &stats.nodes {
        let Some(ingest) = node.ingest.as_ref() else {
            log::debug!("Node {node_id} reports no ingest section");
            continue;
        };
        for (pipeline_id, pipeline) in &ingest.pipelines {
            aggregates
                .entry(pipeline_id.as_str())
                .or_insert_with(|| IngestPipelineAggregate::first_seen(pipeline_id, pipeline))
                .absorb(pipeline);
        }
    }

    let (mut active, mut inactive): (Vec<_>, Vec<_>) = aggregates
        .into_values()
        .partition(IngestPipelineAggregate::is_active);

    // Stable sorts keep node order among equal counts.
    active.sort_by(|a, b| b.count.cmp(&a.count));
    inactive.sort_by(|a, b| compare_ids(&a.pipeline_id, &b.pipeline_id));

    log::debug!(
        "Aggregated {} active and {} inactive pipelines",
        active.len(),
        inactive.len()
    );
    PipelineReport { active, inactive }
}

fn compare_ids(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}
