//! Allocation explain responses and reference hints.

use crate::model::AllocationExplanation;
use crate::shards::{ApiRequest, ALLOCATION_EXPLAIN_ENDPOINT};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const EXPLAIN_DOCS: &str =
    "https://www.elastic.co/guide/en/elasticsearch/reference/current/cluster-allocation-explain.html";

/// `allocation_explain.json` is either an explanation or an error response
/// (no unassigned shards at capture time yields an error body).
#[derive(Debug, Clone, PartialEq)]
pub enum AllocationStatus {
    Explained(Box<AllocationExplanation>),
    Error(Value),
}

impl AllocationStatus {
    /// Classify a raw document. Any object carrying an `error` key is an
    /// error response; anything else that fails to match the typed view is
    /// kept as an error so callers can still show it.
    pub fn from_value(value: &Value) -> Self {
        if value.get("error").is_some() {
            return Self::Error(value.get("error").cloned().unwrap_or(Value::Null));
        }
        match AllocationExplanation::deserialize(value) {
            Ok(explanation) => Self::Explained(Box::new(explanation)),
            Err(err) => {
                log::warn!("Allocation explanation has an unexpected shape: {err}");
                Self::Error(Value::String(err.to_string()))
            }
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn explanation(&self) -> Option<&AllocationExplanation> {
        match self {
            Self::Explained(explanation) => Some(explanation),
            Self::Error(_) => None,
        }
    }

    /// `reason` of an error response, or the error itself when it is a string
    pub fn error_reason(&self) -> Option<&str> {
        match self {
            Self::Error(Value::String(reason)) => Some(reason),
            Self::Error(error) => error.get("reason").and_then(Value::as_str),
            Self::Explained(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentationHint {
    pub text: String,
    pub url: String,
}

impl DocumentationHint {
    fn new(text: &str, anchor: &str) -> Self {
        Self {
            text: text.to_string(),
            url: format!("{EXPLAIN_DOCS}#{anchor}"),
        }
    }
}

/// Reference topic for a decision, if one applies.
pub fn documentation_hint(explanation: &AllocationExplanation) -> Option<DocumentationHint> {
    let text = explanation.allocate_explanation.as_deref().unwrap_or_default();
    match explanation.can_allocate.as_deref()? {
        "no_valid_shard_copy" => Some(DocumentationHint::new(
            "No valid shard copy",
            "_no_valid_shard_copy",
        )),
        "no" if text.to_lowercase().contains("no valid shard copy") => Some(
            DocumentationHint::new("No valid shard copy", "_no_valid_shard_copy"),
        ),
        "no" if text.contains("maximum number of retries exceeded") => Some(
            DocumentationHint::new(
                "Maximum number of retries exceeded",
                "maximum-number-of-retries-exceeded",
            ),
        ),
        "no" if text.contains("must remain on current node") => Some(DocumentationHint::new(
            "Must remain on current node",
            "_must_remain_on_current_node",
        )),
        "throttled" => Some(DocumentationHint::new(
            "Allocation throttled",
            "_allocation_throttled",
        )),
        _ => None,
    }
}

/// Request that reproduces the captured explanation
pub fn explain_request(explanation: &AllocationExplanation) -> ApiRequest {
    ApiRequest::get(
        ALLOCATION_EXPLAIN_ENDPOINT,
        json!({
            "index": explanation.index,
            "shard": explanation.shard,
            "primary": explanation.primary,
            "current_node": explanation.current_node,
        }),
    )
}

/// Deciders that said `NO`, grouped by node, for nodes whose overall
/// decision is `no`
pub fn blocking_deciders(explanation: &AllocationExplanation) -> Vec<(&str, Vec<&str>)> {
    explanation
        .node_allocation_decisions
        .iter()
        .filter(|node| node.node_decision == "no")
        .map(|node| {
            let deciders = node
                .deciders
                .iter()
                .filter(|d| d.decision.eq_ignore_ascii_case("no"))
                .map(|d| d.decider.as_str())
                .collect();
            (node.node_name.as_str(), deciders)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn explanation(can_allocate: &str, text: &str) -> AllocationExplanation {
        AllocationExplanation {
            can_allocate: Some(can_allocate.to_string()),
            allocate_explanation: Some(text.to_string()),
            ..AllocationExplanation::default()
        }
    }

    #[test]
    fn error_key_marks_error_response() {
        let status = AllocationStatus::from_value(&json!({
            "error": {"type": "illegal_argument_exception", "reason": "unable to find any unassigned shards to explain"},
            "status": 400
        }));
        assert!(status.is_error());
        assert_eq!(
            status.error_reason(),
            Some("unable to find any unassigned shards to explain")
        );
    }

    #[test]
    fn explanation_is_typed() {
        let status = AllocationStatus::from_value(&json!({
            "index": "logs", "shard": 0, "primary": true,
            "current_state": "unassigned", "can_allocate": "no",
            "node_allocation_decisions": [
                {"node_name": "n1", "node_decision": "no", "deciders": [
                    {"decider": "disk_threshold", "decision": "NO", "explanation": "full"},
                    {"decider": "same_shard", "decision": "YES", "explanation": "ok"}
                ]},
                {"node_name": "n2", "node_decision": "yes"}
            ]
        }));
        let explanation = status.explanation().unwrap();
        assert_eq!(explanation.index, "logs");
        assert_eq!(
            blocking_deciders(explanation),
            vec![("n1", vec!["disk_threshold"])]
        );
        assert_eq!(explain_request(explanation).body["primary"], json!(true));
    }

    #[test]
    fn hints_follow_decision_and_text() {
        let hint = |c: &str, t: &str| documentation_hint(&explanation(c, t)).map(|h| h.text);

        assert_eq!(hint("no_valid_shard_copy", ""), Some("No valid shard copy".into()));
        assert_eq!(
            hint("no", "cannot allocate because a previous copy... No Valid Shard Copy"),
            Some("No valid shard copy".into())
        );
        assert_eq!(
            hint("no", "shard has exceeded the maximum number of retries exceeded"),
            Some("Maximum number of retries exceeded".into())
        );
        assert_eq!(
            hint("no", "the shard must remain on current node"),
            Some("Must remain on current node".into())
        );
        assert_eq!(hint("throttled", ""), Some("Allocation throttled".into()));
        assert_eq!(hint("no", "disk watermark"), None);
        assert_eq!(hint("yes", "no valid shard copy"), None);
        assert_eq!(documentation_hint(&AllocationExplanation::default()), None);
    }

    #[test]
    fn hint_urls_carry_anchor() {
        let hint = documentation_hint(&explanation("throttled", "")).unwrap();
        assert!(hint.url.ends_with("cluster-allocation-explain.html#_allocation_throttled"));
    }
}
