use anyhow::{bail, Result};
use esdiag_analysis::allocation::{blocking_deciders, explain_request};
use esdiag_analysis::ilm::{policy_name_for_index, search_policies};
use esdiag_analysis::ml::search_jobs;
use esdiag_analysis::model::{IlmPolicies, IndexSettingsEntry, PipelineConfig, PipelineConfigs};
use esdiag_analysis::settings::{hidden_indices, search_index_settings};
use esdiag_analysis::shards::{store_kib, SHARDS_PER_PAGE};
use esdiag_analysis::transforms::{search_transforms, transform_config, unhealthy_transforms};
use esdiag_analysis::{
    allocation_explain_request, compare_policies, documentation_hint, format_bytes,
    format_percentage, format_seconds, paginate, policy_for_index, unassigned_shards,
    AllocationStatus, AnalysisError, DiagnosticSession, IngestPipelineAggregate,
};
use esdiag_bundle::ParsedBundle;
use serde::Serialize;
use serde_json::{json, Value};

/// View-local state that used to live in the UI: search term and page
#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
    pub search: Option<String>,
    pub page: usize,
}

impl ReportOptions {
    fn term(&self) -> &str {
        self.search.as_deref().unwrap_or_default()
    }
}

fn unavailable(err: &AnalysisError) -> String {
    format!("_Not available: {err}._\n\n")
}

fn escape_cell(raw: &str) -> String {
    raw.replace('|', "\\|").replace('\n', " ")
}

pub fn render_markdown(
    bundle: &ParsedBundle,
    session: &DiagnosticSession,
    options: &ReportOptions,
) -> String {
    let mut md = String::new();
    md.push_str("# Diagnostic bundle report\n\n");
    md.push_str(&format!(
        "- Cluster: `{}`\n",
        session.cluster_name().unwrap_or("unknown")
    ));
    if let Ok(number) = session
        .version()
        .map(|v| v.version.as_ref().and_then(|d| d.number.as_deref()))
    {
        md.push_str(&format!("- Version: `{}`\n", number.unwrap_or("unknown")));
    }
    let found: Vec<_> = session.found().iter().map(|k| k.label()).collect();
    md.push_str(&format!("- Found files: {}\n", found.join(", ")));
    if let Some(term) = options.search.as_deref() {
        md.push_str(&format!("- Search: `{term}`\n"));
    }
    md.push('\n');

    if let Some(advisory) = session.advisory() {
        md.push_str(&format!("> {advisory}\n\n"));
    }
    if !bundle.failures().is_empty() {
        md.push_str("## Skipped files\n\n");
        for failure in bundle.failures() {
            md.push_str(&format!("- `{}`: {}\n", failure.path, failure.reason));
        }
        md.push('\n');
    }

    ilm_section(&mut md, session, options);
    pipelines_section(&mut md, session, options);
    segments_section(&mut md, session, options);
    shards_section(&mut md, session, options);
    allocation_section(&mut md, session);
    transforms_section(&mut md, session, options);
    ml_section(&mut md, session, options);
    settings_section(&mut md, session, options);
    md
}

fn ilm_section(md: &mut String, session: &DiagnosticSession, options: &ReportOptions) {
    md.push_str("## ILM Errors\n\n");
    match session.ilm_summary() {
        Ok(summary) => {
            md.push_str(&format!("- Total errors: `{}`\n", summary.total_errors));
            md.push_str(&format!("- Policies affected: `{}`\n", summary.unique_policies));
            if let Some(oldest) = &summary.oldest_error {
                md.push_str(&format!(
                    "- Oldest error: `{}` ({})\n",
                    oldest.index,
                    oldest.action_time.as_deref().unwrap_or("unknown time")
                ));
            }
            md.push('\n');
            if !summary.failed_steps.is_empty() {
                md.push_str("| failed step | indices |\n|---|---:|\n");
                for (step, count) in &summary.failed_steps {
                    md.push_str(&format!("| `{}` | {} |\n", escape_cell(step), count));
                }
                md.push('\n');
            }
        }
        Err(err) => md.push_str(&unavailable(&err)),
    }

    if let Ok(policies) = session.policy_errors() {
        if !policies.is_empty() {
            md.push_str("### Errors by policy\n\n");
            for policy in policies {
                md.push_str(&format!("- `{}`: {} errors\n", policy.policy, policy.count));
                for reason in &policy.unique_errors {
                    md.push_str(&format!("  - {}\n", escape_cell(reason)));
                }
            }
            md.push('\n');
        }
    }

    md.push_str("## ILM Policies\n\n");
    match session.ilm_policies() {
        Ok(policies) => {
            let matches = search_policies(policies, options.term());
            md.push_str(&format!("{} of {} policies\n\n", matches.len(), policies.len()));
            for name in matches {
                md.push_str(&format!("- `{name}`\n"));
            }
            md.push('\n');
        }
        Err(err) => md.push_str(&unavailable(&err)),
    }
}

fn managed_cell(config: &PipelineConfig) -> String {
    match (config.is_managed(), config.managed_by()) {
        (true, Some(owner)) => format!("yes ({owner})"),
        (true, None) => "yes".to_string(),
        (false, Some(owner)) => owner.to_string(),
        (false, None) => "no".to_string(),
    }
}

fn pipelines_section(md: &mut String, session: &DiagnosticSession, options: &ReportOptions) {
    md.push_str("## Ingest Pipelines\n\n");
    let report = match session.pipelines() {
        Ok(report) => report.search(options.term()),
        Err(err) => {
            md.push_str(&unavailable(&err));
            return;
        }
    };
    // Stats render without configuration when pipelines.json is absent.
    let configs = session.pipeline_configs().ok();
    let config_for = |id: &str| configs.and_then(|configs| configs.get(id));

    md.push_str(&format!(
        "{} active, {} inactive\n\n",
        report.active.len(),
        report.inactive.len()
    ));
    if !report.active.is_empty() {
        md.push_str("| pipeline | count | current | failed | failure rate | grok | time ");
        md.push_str("| managed | description |\n");
        md.push_str("|---|---:|---:|---:|---:|---|---:|---|---|\n");
        for pipeline in &report.active {
            let config = config_for(&pipeline.pipeline_id);
            md.push_str(&format!(
                "| `{}` | {} | {} | {} | {} | {} | {} | {} | {} |\n",
                escape_cell(&pipeline.pipeline_id),
                pipeline.count,
                pipeline.current,
                pipeline.failed,
                format_percentage(pipeline.failure_rate()),
                if pipeline.has_grok { "yes" } else { "no" },
                format_seconds(pipeline.total_time_in_millis() as f64),
                config.map(managed_cell).unwrap_or_default(),
                escape_cell(config.and_then(|c| c.description.as_deref()).unwrap_or_default()),
            ));
        }
        md.push('\n');
    }
    if !report.inactive.is_empty() {
        md.push_str("### Inactive pipelines\n\n");
        for pipeline in &report.inactive {
            let Some(config) = config_for(&pipeline.pipeline_id) else {
                continue;
            };
            md.push_str(&format!(
                "- `{}` managed: {}{}\n",
                pipeline.pipeline_id,
                managed_cell(config),
                config
                    .description
                    .as_deref()
                    .map(|d| format!(", {}", escape_cell(d)))
                    .unwrap_or_default()
            ));
        }
        md.push_str("\n```\n");
        for request in report.delete_requests() {
            md.push_str(&request);
            md.push('\n');
        }
        md.push_str("```\n\n");
    }
}

fn segments_section(md: &mut String, session: &DiagnosticSession, options: &ReportOptions) {
    md.push_str("## Segments\n\n");
    let report = match session.segments() {
        Ok(report) => report,
        Err(err) => {
            md.push_str(&unavailable(&err));
            return;
        }
    };
    let summary = &report.summary;
    md.push_str(&format!("- Indices: `{}`\n", summary.total_indices));
    md.push_str(&format!("- Shard copies: `{}`\n", summary.total_shards));
    md.push_str(&format!("- Segments: `{}`\n", summary.total_segments));
    md.push_str(&format!(
        "- Total size: `{}`\n",
        format_bytes(summary.total_size_bytes as f64)
    ));
    md.push_str(&format!(
        "- Delete ratio: `{}`\n",
        format_percentage(summary.delete_ratio())
    ));
    md.push_str(&format!(
        "- Average segment size: `{}`\n",
        format_bytes(summary.avg_segment_size())
    ));
    md.push_str(&format!(
        "- Non-compound segments: `{}`\n",
        summary.non_compound_segments
    ));
    if let Some(largest) = &summary.largest_index {
        md.push_str(&format!("- Largest index: `{}`\n", largest.name));
    }
    md.push('\n');

    if let Ok(issues) = session.issues() {
        if !issues.is_empty() {
            md.push_str("### Issues\n\n");
            for issue in issues {
                md.push_str(&format!(
                    "- **[{}] {}**: {} _{}_\n",
                    issue.severity, issue.title, issue.description, issue.recommended_action
                ));
            }
            md.push('\n');
        }
    }

    md.push_str("| index | docs | deleted | size | segments | versions |\n");
    md.push_str("|---|---:|---:|---:|---:|---|\n");
    for index in report.search(options.term()) {
        md.push_str(&format!(
            "| `{}` | {} | {} | {} | {} | {} .. {} |\n",
            escape_cell(&index.index_name),
            index.total_docs,
            index.total_deleted_docs,
            format_bytes(index.total_size_bytes as f64),
            index.segment_count,
            index.oldest_version,
            index.newest_version,
        ));
    }
    md.push('\n');
}

fn shards_section(md: &mut String, session: &DiagnosticSession, options: &ReportOptions) {
    md.push_str("## Unassigned Shards\n\n");
    let rows = match session.shards() {
        Ok(rows) => rows,
        Err(err) => {
            md.push_str(&unavailable(&err));
            return;
        }
    };
    let unassigned = unassigned_shards(rows, options.term());
    let page = paginate(&unassigned, options.page, SHARDS_PER_PAGE);
    md.push_str(&format!(
        "{} unassigned (page {} of {})\n\n",
        page.total_items,
        page.page,
        page.total_pages.max(1)
    ));
    if page.items.is_empty() {
        return;
    }
    md.push_str("| index | shard | prirep | store | explain |\n|---|---:|---|---:|---|\n");
    for row in page.items {
        let request = allocation_explain_request(row);
        md.push_str(&format!(
            "| `{}` | {} | {} | {} | `{} {} {}` |\n",
            escape_cell(&row.index),
            row.shard,
            row.prirep,
            store_kib(row),
            request.method,
            request.endpoint,
            request.body,
        ));
    }
    md.push('\n');
}

fn allocation_section(md: &mut String, session: &DiagnosticSession) {
    md.push_str("## Allocation Explanation\n\n");
    let explanation = match session.allocation() {
        Ok(AllocationStatus::Explained(explanation)) => explanation,
        Ok(status @ AllocationStatus::Error(_)) => {
            md.push_str(&format!(
                "Allocation explain returned an error: {}\n\n",
                status.error_reason().unwrap_or("unknown error")
            ));
            return;
        }
        Err(err) => {
            md.push_str(&unavailable(&err));
            return;
        }
    };

    md.push_str(&format!(
        "- Shard: `{}[{}]` ({})\n",
        explanation.index,
        explanation.shard,
        if explanation.primary { "primary" } else { "replica" }
    ));
    md.push_str(&format!("- State: `{}`\n", explanation.current_state));
    if let Some(decision) = &explanation.can_allocate {
        md.push_str(&format!("- Can allocate: `{decision}`\n"));
    }
    if let Some(text) = &explanation.allocate_explanation {
        md.push_str(&format!("- Explanation: {text}\n"));
    }
    if let Some(hint) = documentation_hint(explanation) {
        md.push_str(&format!("- Reference: [{}]({})\n", hint.text, hint.url));
    }
    for (node, deciders) in blocking_deciders(explanation) {
        md.push_str(&format!("- `{node}` blocked by: {}\n", deciders.join(", ")));
    }
    md.push_str(&format!(
        "\n```\n{}\n```\n\n",
        explain_request(explanation).to_console()
    ));
}

fn transforms_section(md: &mut String, session: &DiagnosticSession, options: &ReportOptions) {
    md.push_str("## Transforms\n\n");
    let stats = match session.transform_stats() {
        Ok(stats) => stats,
        Err(err) => {
            md.push_str(&unavailable(&err));
            return;
        }
    };
    let config = session.transform_config().ok();
    let matches = search_transforms(stats, options.term());
    md.push_str(&format!(
        "{} transforms, {} unhealthy\n\n",
        stats.transforms.len(),
        unhealthy_transforms(stats).len()
    ));
    if matches.is_empty() {
        return;
    }
    md.push_str("| id | state | docs processed | processing | source -> dest |\n");
    md.push_str("|---|---|---:|---:|---|\n");
    for transform in matches {
        let route = transform_config(config, &transform.id)
            .map(|cfg| {
                format!(
                    "{} -> {}",
                    cfg.source.as_ref().map(|s| s.index.join(",")).unwrap_or_default(),
                    cfg.dest.as_ref().map(|d| d.index.as_str()).unwrap_or_default()
                )
            })
            .unwrap_or_else(|| "n/a".to_string());
        md.push_str(&format!(
            "| `{}` | {} | {} | {} | {} |\n",
            escape_cell(&transform.id),
            transform.state,
            transform.stats.documents_processed,
            format_seconds(transform.stats.processing_time_in_ms as f64),
            escape_cell(&route),
        ));
    }
    md.push('\n');
}

fn ml_section(md: &mut String, session: &DiagnosticSession, options: &ReportOptions) {
    md.push_str("## ML Anomaly Detectors\n\n");
    let detectors = match session.ml_detectors() {
        Ok(detectors) => detectors,
        Err(err) => {
            md.push_str(&unavailable(&err));
            return;
        }
    };
    let jobs = search_jobs(detectors, options.term());
    md.push_str(&format!("{} of {} jobs\n\n", jobs.len(), detectors.jobs.len()));
    for job in jobs {
        let functions: Vec<_> = job
            .detectors()
            .iter()
            .filter_map(|d| d.function.as_deref())
            .collect();
        md.push_str(&format!(
            "- `{}` [{}] memory limit {}\n",
            job.job_id,
            functions.join(", "),
            job.model_memory_limit().unwrap_or("default")
        ));
    }
    md.push('\n');
}

fn created_cell(entry: &IndexSettingsEntry) -> String {
    entry
        .creation_date_string()
        .or_else(|| entry.creation_date_millis().map(|millis| millis.to_string()))
        .unwrap_or_else(|| "N/A".to_string())
}

fn settings_section(md: &mut String, session: &DiagnosticSession, options: &ReportOptions) {
    md.push_str("## Index Settings\n\n");
    let settings = match session.settings() {
        Ok(settings) => settings,
        Err(err) => {
            md.push_str(&unavailable(&err));
            return;
        }
    };
    let matches = search_index_settings(settings, options.term());
    md.push_str(&format!(
        "{} of {} indices ({} hidden)\n\n",
        matches.len(),
        settings.len(),
        hidden_indices(settings)
    ));
    if matches.is_empty() {
        return;
    }
    md.push_str("| index | shards | replicas | auto-expand | hidden | created |\n");
    md.push_str("|---|---:|---:|---|---|---|\n");
    for (name, entry) in matches {
        md.push_str(&format!(
            "| `{}` | {} | {} | {} | {} | {} |\n",
            escape_cell(name),
            entry.number_of_shards().unwrap_or_default(),
            entry.number_of_replicas().unwrap_or_default(),
            entry.auto_expand_replicas().unwrap_or_default(),
            if entry.is_hidden() { "yes" } else { "no" },
            escape_cell(&created_cell(entry)),
        ));
    }
    md.push('\n');
}

/// Policy governing `index`, guessed from its name
pub fn render_policy_lookup(policies: &IlmPolicies, index: &str) -> Result<String> {
    let Some((name, policy)) = policy_for_index(policies, index) else {
        bail!(
            "No policy named '{}' for index {index}",
            policy_name_for_index(index)
        );
    };
    Ok(format!(
        "# Policy for `{index}`\n\n- Policy: `{name}`\n\n```json\n{}\n```\n",
        serde_json::to_string_pretty(policy)?
    ))
}

/// Phase-by-phase comparison of two named policies
pub fn render_policy_comparison(
    policies: &IlmPolicies,
    left: &str,
    right: &str,
) -> Result<String> {
    let (Some(left_policy), Some(right_policy)) = (policies.get(left), policies.get(right))
    else {
        bail!("Both policies must exist to compare ({left}, {right})");
    };
    let mut md = format!("# `{left}` vs `{right}`\n\n");
    md.push_str("| phase | same | left | right |\n|---|---|---|---|\n");
    for phase in compare_policies(left_policy, right_policy) {
        let cell = |value: &Option<Value>| {
            value
                .as_ref()
                .map(|v| format!("`{}`", escape_cell(&v.to_string())))
                .unwrap_or_else(|| "-".to_string())
        };
        md.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            phase.phase,
            if phase.differs() { "no" } else { "yes" },
            cell(&phase.left),
            cell(&phase.right),
        ));
    }
    Ok(md)
}

#[derive(Serialize)]
struct PipelineConfigSummary<'a> {
    description: Option<&'a str>,
    managed: bool,
    managed_by: Option<&'a str>,
    processors: Vec<&'a str>,
}

#[derive(Serialize)]
struct PipelineEntry<'a> {
    #[serde(flatten)]
    stats: &'a IngestPipelineAggregate,
    failure_rate: f64,
    config: Option<PipelineConfigSummary<'a>>,
}

fn pipeline_entries<'a>(
    pipelines: &'a [IngestPipelineAggregate],
    configs: Option<&'a PipelineConfigs>,
) -> Vec<PipelineEntry<'a>> {
    pipelines
        .iter()
        .map(|stats| PipelineEntry {
            stats,
            failure_rate: stats.failure_rate(),
            config: configs
                .and_then(|configs| configs.get(&stats.pipeline_id))
                .map(|config| PipelineConfigSummary {
                    description: config.description.as_deref(),
                    managed: config.is_managed(),
                    managed_by: config.managed_by(),
                    processors: config.processor_types(),
                }),
        })
        .collect()
}

/// Either the section's data or why it is missing
fn section<T: Serialize>(result: esdiag_analysis::Result<T>) -> Value {
    match result {
        Ok(data) => json!({"status": "ok", "data": data}),
        Err(err) => json!({"status": "unavailable", "reason": err.to_string()}),
    }
}

pub fn render_json(
    bundle: &ParsedBundle,
    session: &DiagnosticSession,
    options: &ReportOptions,
) -> Result<String> {
    let term = options.term();
    let configs = session.pipeline_configs().ok();
    let pipelines = session.pipelines().map(|report| {
        let found = report.search(term);
        json!({
            "active": pipeline_entries(&found.active, configs),
            "inactive": pipeline_entries(&found.inactive, configs),
            "delete_requests": found.delete_requests(),
        })
    });
    let segments = session.segments().map(|report| {
        json!({"summary": report.summary, "indices": report.search(term)})
    });
    let settings = session.settings().map(|settings| {
        search_index_settings(settings, term)
            .into_iter()
            .map(|(name, entry)| {
                json!({
                    "index": name,
                    "number_of_shards": entry.number_of_shards(),
                    "number_of_replicas": entry.number_of_replicas(),
                    "auto_expand_replicas": entry.auto_expand_replicas(),
                    "hidden": entry.is_hidden(),
                    "creation_date": entry.creation_date_millis(),
                })
            })
            .collect::<Vec<_>>()
    });
    let allocation = session.allocation().map(|status| match status {
        AllocationStatus::Explained(explanation) => json!({
            "explanation": explanation,
            "hint": documentation_hint(explanation),
            "request": explain_request(explanation),
        }),
        AllocationStatus::Error(error) => json!({"error": error}),
    });
    let unassigned = session.shards().map(|rows| {
        let rows = unassigned_shards(rows, term);
        let page = paginate(&rows, options.page, SHARDS_PER_PAGE);
        json!({
            "page": page.page,
            "total_pages": page.total_pages,
            "total_items": page.total_items,
            "items": page.items.iter().map(|row| json!({
                "row": row,
                "request": allocation_explain_request(row),
            })).collect::<Vec<_>>(),
        })
    });

    let report = json!({
        "source": bundle.source,
        "cluster_name": session.cluster_name(),
        "found": session.found(),
        "failures": bundle.failures(),
        "advisory": session.advisory().map(|a| a.to_string()),
        "ilm": {
            "summary": section(session.ilm_summary()),
            "by_policy": section(session.policy_errors()),
            "policies": section(session.ilm_policies().map(|p| search_policies(p, term))),
        },
        "pipelines": section(pipelines),
        "segments": section(segments),
        "issues": section(session.issues()),
        "unassigned_shards": section(unassigned),
        "allocation": section(allocation),
        "transforms": section(session.transform_stats().map(|s| search_transforms(s, term))),
        "ml_jobs": section(session.ml_detectors().map(|d| search_jobs(d, term))),
        "settings": section(settings),
        "version": section(session.version()),
    });
    Ok(serde_json::to_string_pretty(&report)?)
}
