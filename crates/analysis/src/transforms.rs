use crate::model::{TransformConfig, TransformConfigResponse, TransformStats, TransformStatsResponse};

/// Transforms whose id contains `term`, ignoring case
pub fn search_transforms<'a>(stats: &'a TransformStatsResponse, term: &str) -> Vec<&'a TransformStats> {
    let needle = term.to_lowercase();
    stats
        .transforms
        .iter()
        .filter(|transform| transform.id.to_lowercase().contains(&needle))
        .collect()
}

/// Configuration for a transform id; transform configuration is absent in
/// demo mode, so callers get `None` rather than an error.
pub fn transform_config<'a>(
    config: Option<&'a TransformConfigResponse>,
    id: &str,
) -> Option<&'a TransformConfig> {
    config?.transforms.iter().find(|transform| transform.id == id)
}

/// Transforms that are not healthy or have failed
pub fn unhealthy_transforms(stats: &TransformStatsResponse) -> Vec<&TransformStats> {
    stats
        .transforms
        .iter()
        .filter(|transform| {
            transform.state == "failed"
                || transform
                    .health_status()
                    .is_some_and(|status| !status.eq_ignore_ascii_case("green"))
        })
        .collect()
}
