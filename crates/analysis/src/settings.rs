use crate::model::{IndexSettings, IndexSettingsEntry};

/// Indices whose name contains `term`, ignoring case, in source order
pub fn search_index_settings<'a>(
    settings: &'a IndexSettings,
    term: &str,
) -> Vec<(&'a str, &'a IndexSettingsEntry)> {
    let needle = term.to_lowercase();
    settings
        .iter()
        .filter(|(name, _)| name.to_lowercase().contains(&needle))
        .map(|(name, entry)| (name.as_str(), entry))
        .collect()
}

/// Count of hidden indices
pub fn hidden_indices(settings: &IndexSettings) -> usize {
    settings.values().filter(|entry| entry.is_hidden()).count()
}
