use esdiag_analysis::{DiagnosticSession, IssueSeverity};
use esdiag_bundle::{BundleIngestor, DocumentKind, IngestConfig, MemoryStore};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::io::{Cursor, Write};
use std::sync::Arc;
use zip::write::FileOptions;

const GIB: u64 = 1024 * 1024 * 1024;

fn zip_bytes(files: &[(&str, String)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in files {
        writer.start_file(*name, FileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn session_for(files: &[(&str, String)]) -> DiagnosticSession {
    let store = Arc::new(MemoryStore::new(1 << 20));
    let ingestor = BundleIngestor::new(IngestConfig::in_memory(), store);
    let ingestion = ingestor.ingest_bytes(zip_bytes(files)).unwrap();
    DiagnosticSession::from_bundle(&ingestion.bundle)
}

fn nodes_stats() -> String {
    let pipeline = |count: u64| {
        json!({
            "count": count, "current": 0, "failed": 0,
            "processors": [
                {"grok": {"type": "grok", "stats": {"count": count, "time_in_millis": 1}}}
            ]
        })
    };
    json!({"cluster_name": "prod", "nodes": {
        "n1": {"ingest": {"pipelines": {"logs": pipeline(7), "unused": {"count": 0}}}},
        "n2": {"ingest": {"pipelines": {"logs": pipeline(7)}}},
        "n3": {"ingest": {"pipelines": {"logs": pipeline(7)}}}
    }})
    .to_string()
}

fn segments() -> String {
    json!({"indices": {
        "small": {"shards": {"0": [{"segments": {
            "_0": {"num_docs": 100, "deleted_docs": 80, "size_in_bytes": GIB, "version": "9.8.0"}
        }}]}},
        "huge": {"shards": {"0": [{"segments": {
            "_0": {"num_docs": 1, "size_in_bytes": 6 * GIB, "version": "9.8.0", "compound": true},
            "_1": {"num_docs": 1, "size_in_bytes": 6 * GIB, "version": "9.10.0", "compound": true}
        }}]}}
    }})
    .to_string()
}

#[test]
fn full_bundle_flows_into_aggregates_and_findings() {
    let session = session_for(&[
        ("diag/nodes_stats.json", nodes_stats()),
        ("diag/segments.json", segments()),
        ("diag/ilm_policies.json", json!({"logs": {"policy": {"phases": {}}}}).to_string()),
        (
            "diag/commercial/ilm_explain_only_errors.json",
            json!({"indices": {"logs-000001": {"policy": "logs", "failed_step": "shrink"}}})
                .to_string(),
        ),
    ]);

    assert!(session.advisory().is_none());
    assert_eq!(session.cluster_name(), Some("prod"));

    let pipelines = session.pipelines().unwrap();
    assert_eq!(pipelines.active.len(), 1);
    assert_eq!(pipelines.active[0].count, 21);
    assert!(pipelines.active[0].has_grok);
    assert_eq!(pipelines.inactive[0].pipeline_id, "unused");

    let report = session.segments().unwrap();
    assert_eq!(report.summary.total_indices, 2);
    assert_eq!(report.summary.largest_index.as_ref().unwrap().name, "huge");
    assert_eq!(report.index("huge").unwrap().oldest_version, "9.10.0");

    let issues = session.issues().unwrap();
    let titles: Vec<_> = issues.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["High Delete Ratio", "Very Large Segments"]);
    assert_eq!(issues[0].severity, IssueSeverity::High);
    assert!(issues[1].description.contains("huge"));

    let policies = session.ilm_policies().unwrap();
    assert!(esdiag_analysis::policy_for_index(policies, "logs-000001").is_some());
}

#[test]
fn partial_bundle_degrades_to_missing_views() {
    let session = session_for(&[
        ("diag/nodes_stats.json", "{ truncated".to_string()),
        (
            "diag/ilm_explain_only_errors.json",
            json!({"indices": {}}).to_string(),
        ),
    ]);

    let advisory = session.advisory().unwrap();
    assert_eq!(advisory.missing, vec![DocumentKind::IlmPolicies]);
    assert_eq!(session.ilm_summary().unwrap().total_errors, 0);
    assert!(session.pipelines().is_err());
    assert!(session.segments().is_err());
    assert!(session.ml_detectors().is_err());
}
