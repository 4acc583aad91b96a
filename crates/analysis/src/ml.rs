use crate::model::{MlAnomalyDetectors, MlJob};

fn contains(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|text| text.to_lowercase().contains(needle))
}

/// Case-insensitive match on id, description, groups, creator and every
/// detector's description, function and field
pub fn job_matches(job: &MlJob, term: &str) -> bool {
    let needle = term.to_lowercase();
    if needle.is_empty() {
        return true;
    }
    contains(Some(&job.job_id), &needle)
        || contains(job.description.as_deref(), &needle)
        || job.groups.iter().any(|group| contains(Some(group), &needle))
        || contains(job.created_by(), &needle)
        || job.detectors().iter().any(|detector| {
            contains(detector.detector_description.as_deref(), &needle)
                || contains(detector.function.as_deref(), &needle)
                || contains(detector.field_name.as_deref(), &needle)
        })
}

pub fn search_jobs<'a>(detectors: &'a MlAnomalyDetectors, term: &str) -> Vec<&'a MlJob> {
    detectors
        .jobs
        .iter()
        .filter(|job| job_matches(job, term))
        .collect()
}
