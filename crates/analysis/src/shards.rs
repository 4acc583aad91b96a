//! Unassigned shard listing and the console requests built from it.

use crate::model::ShardRow;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const SHARDS_PER_PAGE: usize = 10;
pub const ALLOCATION_EXPLAIN_ENDPOINT: &str = "_cluster/allocation/explain";

/// A console request shown to the user, never sent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiRequest {
    pub method: String,
    pub endpoint: String,
    pub body: Value,
}

impl ApiRequest {
    pub fn get(endpoint: &str, body: Value) -> Self {
        Self {
            method: "GET".to_string(),
            endpoint: endpoint.to_string(),
            body,
        }
    }

    /// Kibana console form: request line then pretty JSON body
    pub fn to_console(&self) -> String {
        let body = serde_json::to_string_pretty(&self.body).unwrap_or_default();
        format!("{} {}\n{}", self.method, self.endpoint, body)
    }
}

/// Rows in state `UNASSIGNED` whose index contains `search`, ignoring case.
/// An empty search keeps every unassigned row.
pub fn unassigned_shards<'a>(rows: &'a [ShardRow], search: &str) -> Vec<&'a ShardRow> {
    let needle = search.to_lowercase();
    rows.iter()
        .filter(|row| row.state == "UNASSIGNED")
        .filter(|row| needle.is_empty() || row.index.to_lowercase().contains(&needle))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<'a, T> {
    /// 1-based
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub items: &'a [T],
}

/// Slice out 1-based `page`. Pages past the end are empty; page 0 is
/// treated as page 1.
pub fn paginate<T>(items: &[T], page: usize, per_page: usize) -> Page<'_, T> {
    let per_page = per_page.max(1);
    let page = page.max(1);
    let start = (page - 1).saturating_mul(per_page).min(items.len());
    let end = start.saturating_add(per_page).min(items.len());
    Page {
        page,
        total_pages: items.len().div_ceil(per_page),
        total_items: items.len(),
        items: &items[start..end],
    }
}

/// `GET _cluster/allocation/explain` for one shard row. A shard number that
/// does not parse is sent as `null`.
pub fn allocation_explain_request(row: &ShardRow) -> ApiRequest {
    let shard = row.shard.trim().parse::<u32>().ok();
    ApiRequest::get(
        ALLOCATION_EXPLAIN_ENDPOINT,
        json!({
            "index": row.index,
            "shard": shard,
            "primary": row.is_primary(),
        }),
    )
}

/// `store` column rounded to KiB, `N/A` when absent
pub fn store_kib(row: &ShardRow) -> String {
    row.store
        .as_deref()
        .and_then(|store| store.trim().parse::<u64>().ok())
        .map(|bytes| format!("{} KB", (bytes as f64 / 1024.0).round() as u64))
        .unwrap_or_else(|| "N/A".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(index: &str, shard: &str, prirep: &str, state: &str) -> ShardRow {
        ShardRow {
            index: index.to_string(),
            shard: shard.to_string(),
            prirep: prirep.to_string(),
            state: state.to_string(),
            ..ShardRow::default()
        }
    }

    #[test]
    fn filters_unassigned_by_index_substring() {
        let rows = vec![
            row("logs-1", "0", "p", "UNASSIGNED"),
            row("Logs-2", "0", "r", "UNASSIGNED"),
            row("logs-3", "0", "p", "STARTED"),
            row("metrics", "1", "p", "UNASSIGNED"),
        ];
        let all = unassigned_shards(&rows, "");
        assert_eq!(all.len(), 3);
        let logs: Vec<_> = unassigned_shards(&rows, "LOGS")
            .iter()
            .map(|r| r.index.as_str())
            .collect();
        assert_eq!(logs, vec!["logs-1", "Logs-2"]);
    }

    #[test]
    fn pages_hold_ten_rows() {
        let items: Vec<u32> = (0..23).collect();
        let first = paginate(&items, 1, SHARDS_PER_PAGE);
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.items, &items[0..10]);
        let last = paginate(&items, 3, SHARDS_PER_PAGE);
        assert_eq!(last.items, &[20, 21, 22]);
        assert!(paginate(&items, 9, SHARDS_PER_PAGE).items.is_empty());
        assert_eq!(paginate(&items, 0, SHARDS_PER_PAGE).page, 1);
        assert_eq!(paginate::<u32>(&[], 1, SHARDS_PER_PAGE).total_pages, 0);
    }

    #[test]
    fn explain_request_body() {
        let request = allocation_explain_request(&row("logs-1", "3", "p", "UNASSIGNED"));
        assert_eq!(request.method, "GET");
        assert_eq!(request.endpoint, "_cluster/allocation/explain");
        assert_eq!(
            request.body,
            json!({"index": "logs-1", "shard": 3, "primary": true})
        );
        assert!(request.to_console().starts_with("GET _cluster/allocation/explain\n{"));

        let replica = allocation_explain_request(&row("x", "oops", "r", "UNASSIGNED"));
        assert_eq!(replica.body["shard"], Value::Null);
        assert_eq!(replica.body["primary"], json!(false));
    }

    #[test]
    fn store_column_in_kib() {
        let mut shard = row("a", "0", "p", "STARTED");
        assert_eq!(store_kib(&shard), "N/A");
        shard.store = Some("4096".to_string());
        assert_eq!(store_kib(&shard), "4 KB");
    }
}
