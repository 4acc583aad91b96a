//! Per-index and cluster-wide rollups over `_segments` output.

use crate::model::{IndexSegments, SegmentsResponse};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Placeholder for version fields of an index without segments
pub const NO_VERSION: &str = "N/A";

/// `deleted / (docs + deleted)`, 0 when both are 0
pub fn delete_ratio(docs: u64, deleted: u64) -> f64 {
    if docs == 0 && deleted == 0 {
        0.0
    } else {
        deleted as f64 / (docs as f64 + deleted as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSegmentAggregate {
    pub index_name: String,
    pub total_docs: u64,
    pub total_deleted_docs: u64,
    pub total_size_bytes: u64,
    pub segment_count: u64,
    pub non_compound_segments: u64,
    /// Lexicographically smallest version string, not semantic ordering
    pub oldest_version: String,
    pub newest_version: String,
    pub max_generation: u64,
    /// Shard copies (primaries and replicas) the index reports
    pub shard_copies: u64,
}

impl IndexSegmentAggregate {
    pub fn avg_segment_size(&self) -> f64 {
        if self.segment_count == 0 {
            0.0
        } else {
            self.total_size_bytes as f64 / self.segment_count as f64
        }
    }

    pub fn delete_ratio(&self) -> f64 {
        delete_ratio(self.total_docs, self.total_deleted_docs)
    }
}

/// Fold every segment of every shard copy of one index.
pub fn aggregate_index(name: &str, index: &IndexSegments) -> IndexSegmentAggregate {
    let mut aggregate = IndexSegmentAggregate {
        index_name: name.to_string(),
        total_docs: 0,
        total_deleted_docs: 0,
        total_size_bytes: 0,
        segment_count: 0,
        non_compound_segments: 0,
        oldest_version: NO_VERSION.to_string(),
        newest_version: NO_VERSION.to_string(),
        max_generation: 0,
        shard_copies: 0,
    };
    let mut versions = BTreeSet::new();

    for copies in index.shards.values() {
        aggregate.shard_copies = aggregate.shard_copies.saturating_add(copies.len() as u64);
        for segment in copies.iter().flat_map(|copy| copy.segments.values()) {
            aggregate.total_docs = aggregate.total_docs.saturating_add(segment.num_docs);
            aggregate.total_deleted_docs =
                aggregate.total_deleted_docs.saturating_add(segment.deleted_docs);
            aggregate.total_size_bytes =
                aggregate.total_size_bytes.saturating_add(segment.size_in_bytes);
            aggregate.segment_count += 1;
            if !segment.compound {
                aggregate.non_compound_segments += 1;
            }
            aggregate.max_generation = aggregate.max_generation.max(segment.generation);
            versions.insert(segment.version.as_str());
        }
    }

    if let (Some(oldest), Some(newest)) = (versions.first(), versions.last()) {
        aggregate.oldest_version = oldest.to_string();
        aggregate.newest_version = newest.to_string();
    }
    aggregate
}

/// Name and value of a per-index extreme
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexExtreme<T> {
    pub name: String,
    pub value: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSegmentSummary {
    pub total_indices: u64,
    pub total_shards: u64,
    pub total_segments: u64,
    pub total_docs: u64,
    pub total_deleted_docs: u64,
    pub total_size_bytes: u64,
    pub non_compound_segments: u64,
    pub largest_index: Option<IndexExtreme<u64>>,
    pub most_segmented_index: Option<IndexExtreme<u64>>,
    pub highest_delete_ratio: Option<IndexExtreme<f64>>,
}

impl ClusterSegmentSummary {
    pub fn delete_ratio(&self) -> f64 {
        delete_ratio(self.total_docs, self.total_deleted_docs)
    }

    pub fn avg_segment_size(&self) -> f64 {
        if self.total_segments == 0 {
            0.0
        } else {
            self.total_size_bytes as f64 / self.total_segments as f64
        }
    }

    /// Sum per-index rollups in order. Extremes need a strictly greater
    /// value to replace the current holder, so ties keep the first index.
    pub fn from_indices(indices: &[IndexSegmentAggregate]) -> Self {
        let mut summary = Self {
            total_indices: indices.len() as u64,
            total_shards: 0,
            total_segments: 0,
            total_docs: 0,
            total_deleted_docs: 0,
            total_size_bytes: 0,
            non_compound_segments: 0,
            largest_index: None,
            most_segmented_index: None,
            highest_delete_ratio: None,
        };
        let mut largest = 0u64;
        let mut most_segments = 0u64;
        let mut highest_ratio = 0f64;

        for index in indices {
            summary.total_shards = summary.total_shards.saturating_add(index.shard_copies);
            summary.total_segments = summary.total_segments.saturating_add(index.segment_count);
            summary.total_docs = summary.total_docs.saturating_add(index.total_docs);
            summary.total_deleted_docs =
                summary.total_deleted_docs.saturating_add(index.total_deleted_docs);
            summary.total_size_bytes =
                summary.total_size_bytes.saturating_add(index.total_size_bytes);
            summary.non_compound_segments =
                summary.non_compound_segments.saturating_add(index.non_compound_segments);

            if index.total_size_bytes > largest {
                largest = index.total_size_bytes;
                summary.largest_index = Some(IndexExtreme {
                    name: index.index_name.clone(),
                    value: largest,
                });
            }
            if index.segment_count > most_segments {
                most_segments = index.segment_count;
                summary.most_segmented_index = Some(IndexExtreme {
                    name: index.index_name.clone(),
                    value: most_segments,
                });
            }
            let ratio = index.delete_ratio();
            if ratio > highest_ratio {
                highest_ratio = ratio;
                summary.highest_delete_ratio = Some(IndexExtreme {
                    name: index.index_name.clone(),
                    value: ratio,
                });
            }
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentReport {
    /// Per-index rollups in source order
    pub indices: Vec<IndexSegmentAggregate>,
    pub summary: ClusterSegmentSummary,
}

impl SegmentReport {
    /// Indices ordered largest first, ties in source order
    pub fn by_size(&self) -> Vec<&IndexSegmentAggregate> {
        let mut sorted: Vec<_> = self.indices.iter().collect();
        sorted.sort_by(|a, b| b.total_size_bytes.cmp(&a.total_size_bytes));
        sorted
    }

    /// Indices whose name contains `term`, ignoring case, largest first
    pub fn search(&self, term: &str) -> Vec<&IndexSegmentAggregate> {
        let needle = term.to_lowercase();
        self.by_size()
            .into_iter()
            .filter(|index| index.index_name.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn index(&self, name: &str) -> Option<&IndexSegmentAggregate> {
        self.indices.iter().find(|index| index.index_name == name)
    }
}

pub fn summarize_segments(response: &SegmentsResponse) -> SegmentReport {
    let indices: Vec<_> = response
        .indices
        .iter()
        .map(|(name, index)| aggregate_index(name, index))
        .collect();
    let summary = ClusterSegmentSummary::from_indices(&indices);
    log::debug!(
        "Summarized {} segments across {} indices",
        summary.total_segments,
        summary.total_indices
    );
    SegmentReport { indices, summary }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn segment(docs: u64, deleted: u64, size: u64, generation: u64, version: &str) -> Value {
        json!({
            "generation": generation,
            "num_docs": docs,
            "deleted_docs": deleted,
            "size_in_bytes": size,
            "version": version,
            "compound": generation % 2 == 0
        })
    }

    fn response(value: Value) -> SegmentsResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn folds_every_shard_copy() {
        let data = response(json!({"indices": {"logs": {"shards": {
            "0": [
                {"routing": {"primary": true}, "segments": {
                    "_0": segment(10, 1, 100, 1, "9.10.0"),
                    "_1": segment(5, 0, 50, 4, "8.11.1")
                }},
                {"routing": {"primary": false}, "segments": {
                    "_0": segment(10, 1, 100, 1, "9.10.0")
                }}
            ],
            "1": [{"segments": {"_2": segment(1, 2, 10, 7, "9.9.2")}}]
        }}}}));

        let index = aggregate_index("logs", &data.indices["logs"]);
        assert_eq!(index.total_docs, 26);
        assert_eq!(index.total_deleted_docs, 4);
        assert_eq!(index.total_size_bytes, 260);
        assert_eq!(index.segment_count, 4);
        assert_eq!(index.non_compound_segments, 3);
        assert_eq!(index.max_generation, 7);
        assert_eq!(index.shard_copies, 3);
        // lexicographic: "8.11.1" < "9.10.0" < "9.9.2"
        assert_eq!(index.oldest_version, "8.11.1");
        assert_eq!(index.newest_version, "9.9.2");
        assert_eq!(index.avg_segment_size(), 65.0);
    }

    #[test]
    fn empty_index_never_divides_by_zero() {
        let index = aggregate_index("empty", &IndexSegments::default());
        assert_eq!(index.avg_segment_size(), 0.0);
        assert_eq!(index.delete_ratio(), 0.0);
        assert_eq!(index.oldest_version, NO_VERSION);
        assert_eq!(index.newest_version, NO_VERSION);
    }

    #[test]
    fn delete_ratio_is_zero_without_documents() {
        assert_eq!(delete_ratio(0, 0), 0.0);
        assert_eq!(delete_ratio(0, 5), 1.0);
        assert!((delete_ratio(100, 80) - 80.0 / 180.0).abs() < f64::EPSILON);
    }

    #[test]
    fn totals_saturate_on_corrupt_counts() {
        let data = response(json!({"indices": {
            "a": {"shards": {"0": [{"segments": {
                "_0": segment(u64::MAX, u64::MAX, u64::MAX, 1, "9"),
                "_1": segment(1, 1, 1, 2, "9")
            }}]}},
            "b": {"shards": {"0": [{"segments": {"_0": segment(5, 0, 5, 1, "9")}}]}}
        }}));
        let report = summarize_segments(&data);
        assert_eq!(report.indices[0].total_docs, u64::MAX);
        assert_eq!(report.summary.total_size_bytes, u64::MAX);
        assert!((delete_ratio(u64::MAX, u64::MAX) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn search_filters_by_index_name() {
        let data = response(json!({"indices": {
            "logs-1": {"shards": {"0": [{"segments": {"_0": segment(1, 0, 10, 1, "9")}}]}},
            "metrics-1": {"shards": {"0": [{"segments": {"_0": segment(1, 0, 50, 1, "9")}}]}},
            "Logs-2": {"shards": {"0": [{"segments": {"_0": segment(1, 0, 30, 1, "9")}}]}}
        }}));
        let report = summarize_segments(&data);
        let names: Vec<_> = report
            .search("logs")
            .iter()
            .map(|index| index.index_name.as_str())
            .collect();
        assert_eq!(names, vec!["Logs-2", "logs-1"]);
        assert_eq!(report.search("").len(), 3);
    }

    #[test]
    fn cluster_extremes_keep_first_index_on_ties() {
        let data = response(json!({"indices": {
            "a": {"shards": {"0": [{"segments": {"_0": segment(10, 0, 500, 1, "9")}}]}},
            "b": {"shards": {"0": [{"segments": {"_0": segment(10, 10, 500, 1, "9")}}]}},
            "c": {"shards": {"0": [{"segments": {
                "_0": segment(1, 1, 10, 1, "9"),
                "_1": segment(1, 0, 10, 1, "9")
            }}]}}
        }}));

        let report = summarize_segments(&data);
        let summary = &report.summary;
        assert_eq!(summary.total_indices, 3);
        assert_eq!(summary.total_shards, 3);
        assert_eq!(summary.total_segments, 4);
        assert_eq!(summary.total_size_bytes, 1020);
        assert_eq!(summary.largest_index.as_ref().unwrap().name, "a");
        assert_eq!(summary.most_segmented_index.as_ref().unwrap().name, "c");
        assert_eq!(summary.highest_delete_ratio.as_ref().unwrap().name, "b");
        assert_eq!(summary.avg_segment_size(), 255.0);

        let by_size: Vec<_> = report.by_size().iter().map(|i| i.index_name.as_str()).collect();
        assert_eq!(by_size, vec!["a", "b", "c"]);
    }

    #[test]
    fn no_deletes_means_no_delete_ratio_holder() {
        let data = response(json!({"indices": {
            "a": {"shards": {"0": [{"segments": {"_0": segment(10, 0, 5, 1, "9")}}]}}
        }}));
        let report = summarize_segments(&data);
        assert_eq!(report.summary.highest_delete_ratio, None);
        assert_eq!(report.summary.delete_ratio(), 0.0);
    }
}
