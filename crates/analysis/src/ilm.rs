//! ILM error rollups, policy lookup and policy comparison.

use crate::model::{IlmErrors, IlmIndexError, IlmPolicies, JsonMap, JsonMapExt};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Phases shown side by side when comparing two policies
pub const COMPARED_PHASES: [&str; 4] = ["hot", "warm", "cold", "delete"];

const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OldestError {
    pub index: String,
    pub action_time: Option<String>,
    pub action_time_millis: i64,
}

/// Dashboard counters over `ilm_explain_only_errors.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IlmErrorSummary {
    pub total_errors: usize,
    pub unique_policies: usize,
    /// Failed step -> number of indices stuck on it, in first-seen order
    pub failed_steps: IndexMap<String, usize>,
    pub oldest_error: Option<OldestError>,
}

pub fn summarize_ilm_errors(errors: &IlmErrors) -> IlmErrorSummary {
    let mut policies = IndexSet::new();
    let mut summary = IlmErrorSummary {
        total_errors: errors.indices.len(),
        ..IlmErrorSummary::default()
    };

    for (index, error) in &errors.indices {
        policies.insert(error.policy.as_deref().unwrap_or(UNKNOWN));
        *summary
            .failed_steps
            .entry(failed_step(error).to_string())
            .or_default() += 1;

        let Some(millis) = error.action_time_millis else {
            continue;
        };
        let older = summary
            .oldest_error
            .as_ref()
            .map_or(true, |oldest| millis < oldest.action_time_millis);
        if older {
            summary.oldest_error = Some(OldestError {
                index: index.clone(),
                action_time: error.action_time.clone(),
                action_time_millis: millis,
            });
        }
    }

    summary.unique_policies = policies.len();
    summary
}

/// Errors grouped under one policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyErrorCount {
    pub policy: String,
    pub count: usize,
    pub error_types: IndexMap<String, usize>,
    /// Distinct `step_info.reason` values in first-seen order
    pub unique_errors: Vec<String>,
}

/// Per-policy error breakdown, most affected policy first.
pub fn policy_error_summary(errors: &IlmErrors) -> Vec<PolicyErrorCount> {
    let mut groups: IndexMap<&str, (usize, IndexMap<String, usize>, IndexSet<String>)> =
        IndexMap::new();

    for error in errors.indices.values() {
        let policy = error.policy.as_deref().unwrap_or(UNKNOWN);
        let (count, types, reasons) = groups.entry(policy).or_default();
        *count += 1;
        *types.entry(failed_step(error).to_string()).or_default() += 1;
        if let Some(reason) = error.reason() {
            reasons.insert(reason.to_string());
        }
    }

    let mut summary: Vec<_> = groups
        .into_iter()
        .map(|(policy, (count, error_types, reasons))| PolicyErrorCount {
            policy: policy.to_string(),
            count,
            error_types,
            unique_errors: reasons.into_iter().collect(),
        })
        .collect();
    summary.sort_by(|a, b| b.count.cmp(&a.count));
    summary
}

fn failed_step(error: &IlmIndexError) -> &str {
    error.failed_step.as_deref().unwrap_or(UNKNOWN)
}

/// Policy name guessed from an index name: the part before the first `-`,
/// with the first `.ds` removed (`logs-000001` -> `logs`). Backing indices
/// of data streams (`.ds-logs-...`) therefore resolve to an empty name.
pub fn policy_name_for_index(index_name: &str) -> String {
    index_name
        .split('-')
        .next()
        .unwrap_or_default()
        .replacen(".ds", "", 1)
}

pub fn policy_for_index<'a>(
    policies: &'a IlmPolicies,
    index_name: &str,
) -> Option<(&'a str, &'a Value)> {
    let name = policy_name_for_index(index_name);
    policies
        .get_key_value(name.as_str())
        .map(|(key, policy)| (key.as_str(), policy))
}

/// Phase map of a policy entry. Accepts both the `_ilm/policy` entry shape
/// (`{policy: {phases}}`) and a bare policy body (`{phases}`).
pub fn policy_phases(policy: &Value) -> Option<&JsonMap> {
    let object = policy.as_object()?;
    object
        .object_at("policy")
        .and_then(|body| body.object_at("phases"))
        .or_else(|| object.object_at("phases"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseComparison {
    pub phase: String,
    pub left: Option<Value>,
    pub right: Option<Value>,
}

impl PhaseComparison {
    pub fn differs(&self) -> bool {
        self.left != self.right
    }
}

/// Compare `hot`, `warm`, `cold` and `delete` of two policies.
pub fn compare_policies(left: &Value, right: &Value) -> Vec<PhaseComparison> {
    let left = policy_phases(left);
    let right = policy_phases(right);
    COMPARED_PHASES
        .iter()
        .map(|phase| PhaseComparison {
            phase: phase.to_string(),
            left: left.and_then(|phases| phases.get(*phase)).cloned(),
            right: right.and_then(|phases| phases.get(*phase)).cloned(),
        })
        .collect()
}

/// Case-insensitive policy search over name, `_meta.description`, phase
/// bodies and the templates or data streams using the policy.
pub fn search_policies<'a>(policies: &'a IlmPolicies, term: &str) -> Vec<&'a str> {
    let needle = term.to_lowercase();
    policies
        .iter()
        .filter(|(name, policy)| policy_matches(name, policy, &needle))
        .map(|(name, _)| name.as_str())
        .collect()
}

fn policy_matches(name: &str, policy: &Value, needle: &str) -> bool {
    if name.to_lowercase().contains(needle) {
        return true;
    }
    let description = policy
        .pointer("/policy/_meta/description")
        .and_then(Value::as_str);
    if description.is_some_and(|d| d.to_lowercase().contains(needle)) {
        return true;
    }
    if let Some(phases) = policy_phases(policy) {
        if phases
            .values()
            .any(|phase| phase.to_string().to_lowercase().contains(needle))
        {
            return true;
        }
    }
    ["/in_use_by/composable_templates", "/in_use_by/data_streams"]
        .iter()
        .filter_map(|pointer| policy.pointer(pointer).and_then(Value::as_array))
        .flatten()
        .filter_map(Value::as_str)
        .any(|usage| usage.to_lowercase().contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn errors() -> IlmErrors {
        serde_json::from_value(json!({"indices": {
            "logs-000001": {
                "policy": "logs", "failed_step": "check-rollover-ready",
                "action_time": "2024-03-02T00:00:00Z", "action_time_millis": 1709337600000i64,
                "step_info": {"reason": "alias missing"}
            },
            "logs-000002": {
                "policy": "logs", "failed_step": "check-rollover-ready",
                "action_time_millis": 1709337600000i64,
                "step_info": {"reason": "alias missing"}
            },
            "metrics-000001": {
                "policy": "metrics", "failed_step": "shrink",
                "action_time": "2024-01-01T00:00:00Z", "action_time_millis": 1704067200000i64,
                "step_info": {"reason": "not enough nodes"}
            },
            "logs-000003": {
                "policy": "logs", "failed_step": "forcemerge",
                "step_info": {"reason": "timeout"}
            }
        }}))
        .unwrap()
    }

    #[test]
    fn dashboard_counters() {
        let summary = summarize_ilm_errors(&errors());
        assert_eq!(summary.total_errors, 4);
        assert_eq!(summary.unique_policies, 2);
        assert_eq!(summary.failed_steps["check-rollover-ready"], 2);
        assert_eq!(summary.failed_steps["shrink"], 1);
        let oldest = summary.oldest_error.unwrap();
        assert_eq!(oldest.index, "metrics-000001");
        assert_eq!(oldest.action_time.as_deref(), Some("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn empty_errors_have_no_oldest() {
        let summary = summarize_ilm_errors(&IlmErrors::default());
        assert_eq!(summary.total_errors, 0);
        assert_eq!(summary.oldest_error, None);
    }

    #[test]
    fn per_policy_breakdown_sorted_by_count() {
        let summary = policy_error_summary(&errors());
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].policy, "logs");
        assert_eq!(summary[0].count, 3);
        assert_eq!(summary[0].error_types["check-rollover-ready"], 2);
        assert_eq!(summary[0].error_types["forcemerge"], 1);
        assert_eq!(
            summary[0].unique_errors,
            vec!["alias missing".to_string(), "timeout".to_string()]
        );
        assert_eq!(summary[1].policy, "metrics");
    }

    #[test]
    fn index_name_maps_to_policy() {
        assert_eq!(policy_name_for_index("logs-000001"), "logs");
        assert_eq!(policy_name_for_index(".ds-logs-2024.01.01-000001"), "");
        assert_eq!(policy_name_for_index(".dsmetrics-1"), "metrics");
        assert_eq!(policy_name_for_index("plain"), "plain");

        let policies: IlmPolicies =
            serde_json::from_value(json!({"logs": {"policy": {"phases": {}}}})).unwrap();
        assert_eq!(policy_for_index(&policies, "logs-2").unwrap().0, "logs");
        assert!(policy_for_index(&policies, "metrics-2").is_none());
    }

    #[test]
    fn comparison_flags_differing_phases() {
        let left = json!({"policy": {"phases": {
            "hot": {"actions": {"rollover": {"max_age": "30d"}}},
            "delete": {"min_age": "90d"}
        }}});
        let right = json!({"phases": {
            "hot": {"actions": {"rollover": {"max_age": "7d"}}},
            "delete": {"min_age": "90d"}
        }});

        let comparison = compare_policies(&left, &right);
        let differing: Vec<_> = comparison
            .iter()
            .filter(|c| c.differs())
            .map(|c| c.phase.as_str())
            .collect();
        assert_eq!(differing, vec!["hot"]);
        assert_eq!(comparison[1].left, None);
        assert_eq!(comparison[1].right, None);
    }

    #[test]
    fn search_covers_meta_phases_and_usage() {
        let policies: IlmPolicies = serde_json::from_value(json!({
            "logs": {"policy": {"_meta": {"description": "Default Logs"}, "phases": {}}},
            "metrics": {"policy": {"phases": {"warm": {"actions": {"shrink": {}}}}}},
            "traces": {"policy": {}, "in_use_by": {"data_streams": ["APM-traces"]}}
        }))
        .unwrap();
        assert_eq!(search_policies(&policies, "default"), vec!["logs"]);
        assert_eq!(search_policies(&policies, "SHRINK"), vec!["metrics"]);
        assert_eq!(search_policies(&policies, "apm"), vec!["traces"]);
        assert_eq!(search_policies(&policies, "").len(), 3);
    }
}
