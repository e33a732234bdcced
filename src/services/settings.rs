//! Server-wide metadata settings, read once per scan.

use std::collections::{HashMap, HashSet};

use folio_common::{AgeRating, Result};
use folio_parser::normalize::normalize;

use crate::config::MetadataConfig;

/// Snapshot of the settings that shape metadata import. Titles are stored
/// normalized so lookups match the way genres and tags are keyed.
#[derive(Debug, Clone, Default)]
pub struct MetadataSettings {
    pub enable_extended_metadata: bool,
    blacklist: HashSet<String>,
    whitelist: HashSet<String>,
    age_rating_mappings: HashMap<String, AgeRating>,
}

impl MetadataSettings {
    pub fn from_config(config: &MetadataConfig) -> Result<Self> {
        let mut age_rating_mappings = HashMap::new();
        for (title, rating) in &config.age_rating_mappings {
            age_rating_mappings.insert(normalize(title), rating.parse::<AgeRating>()?);
        }
        Ok(Self {
            enable_extended_metadata: config.enable_extended_metadata,
            blacklist: config.blacklist.iter().map(|t| normalize(t)).collect(),
            whitelist: config.whitelist.iter().map(|t| normalize(t)).collect(),
            age_rating_mappings,
        })
    }

    /// Blacklisted genres are dropped.
    pub fn allows_genre(&self, normalized: &str) -> bool {
        !self.blacklist.contains(normalized)
    }

    /// Blacklisted tags are dropped; a non-empty whitelist keeps only its
    /// own entries.
    pub fn allows_tag(&self, normalized: &str) -> bool {
        !self.blacklist.contains(normalized)
            && (self.whitelist.is_empty() || self.whitelist.contains(normalized))
    }

    pub fn mapped_rating(&self, normalized: &str) -> Option<AgeRating> {
        self.age_rating_mappings.get(normalized).copied()
    }
}

/// Source of [`MetadataSettings`].
pub trait SettingsProvider: Send + Sync {
    fn metadata_settings(&self) -> MetadataSettings;
}

/// Settings fixed at startup, typically from the config file.
#[derive(Debug, Clone, Default)]
pub struct StaticSettings(pub MetadataSettings);

impl SettingsProvider for StaticSettings {
    fn metadata_settings(&self) -> MetadataSettings {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> MetadataSettings {
        let config = MetadataConfig {
            enable_extended_metadata: true,
            blacklist: vec!["Spoilers".into()],
            whitelist: vec!["Time Travel".into()],
            age_rating_mappings: [("Ecchi".to_string(), "Mature 17+".to_string())].into(),
        };
        MetadataSettings::from_config(&config).unwrap()
    }

    #[test]
    fn blacklist_applies_to_genres_and_tags() {
        let s = settings();
        assert!(!s.allows_genre(&normalize("spoilers")));
        assert!(!s.allows_tag(&normalize("SPOILERS")));
        assert!(s.allows_genre(&normalize("Action")));
    }

    #[test]
    fn whitelist_restricts_tags_only() {
        let s = settings();
        assert!(s.allows_tag(&normalize("time travel")));
        assert!(!s.allows_tag(&normalize("Action")));
        assert!(s.allows_genre(&normalize("Action")));
    }

    #[test]
    fn mappings_are_keyed_by_normalized_title() {
        let s = settings();
        assert_eq!(s.mapped_rating(&normalize("ecchi")), Some(AgeRating::Mature17Plus));
        assert_eq!(s.mapped_rating(&normalize("Romance")), None);
    }

    #[test]
    fn unknown_rating_is_rejected() {
        let config = MetadataConfig {
            age_rating_mappings: [("Gore".to_string(), "nope".to_string())].into(),
            ..Default::default()
        };
        assert!(MetadataSettings::from_config(&config).is_err());
    }
}
