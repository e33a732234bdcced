mod types;

pub use types::*;

use anyhow::{Context, Result};
use folio_common::AgeRating;
use std::path::{Path, PathBuf};

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;
    expand_paths(&mut config);

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./folio.toml",
        "~/.config/folio/config.toml",
        "/etc/folio/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    let mut config = Config::default();
    expand_paths(&mut config);
    Ok(config)
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}

fn expand_paths(config: &mut Config) {
    config.database.path = expand(&config.database.path);
    config.scanner.covers_dir = expand(&config.scanner.covers_dir);
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.scanner.channel_capacity == 0 {
        anyhow::bail!("scanner.channel_capacity cannot be 0");
    }

    if config.scanner.worker_count == Some(0) {
        anyhow::bail!("scanner.worker_count cannot be 0");
    }

    for (title, rating) in &config.metadata.age_rating_mappings {
        rating
            .parse::<AgeRating>()
            .with_context(|| format!("Invalid age rating mapping for '{}'", title))?;
    }

    for entry in &config.metadata.whitelist {
        if config
            .metadata
            .blacklist
            .iter()
            .any(|b| b.eq_ignore_ascii_case(entry))
        {
            tracing::warn!("'{}' is both whitelisted and blacklisted; blacklist wins", entry);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.scanner.channel_capacity, 64);
        assert!(config.scanner.worker_count.is_none());
        assert!(!config.metadata.enable_extended_metadata);
        validate_config(&config).unwrap();
    }

    #[test]
    fn parses_metadata_section() {
        let config: Config = toml::from_str(
            r#"
            [scanner]
            worker_count = 3

            [metadata]
            enable_extended_metadata = true
            blacklist = ["Spoilers"]
            whitelist = ["Action"]

            [metadata.age_rating_mappings]
            Ecchi = "Mature 17+"
            "#,
        )
        .unwrap();
        assert_eq!(config.scanner.workers(), 3);
        assert_eq!(config.metadata.blacklist, vec!["Spoilers"]);
        assert_eq!(
            config.metadata.age_rating_mappings.get("Ecchi").map(String::as_str),
            Some("Mature 17+")
        );
        validate_config(&config).unwrap();
    }

    #[test]
    fn rejects_zero_capacity() {
        let mut config = Config::default();
        config.scanner.channel_capacity = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_unknown_age_rating() {
        let mut config = Config::default();
        config
            .metadata
            .age_rating_mappings
            .insert("Gore".into(), "Extremely Bad".into());
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("Gore"));
    }

    #[test]
    fn load_config_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("folio.toml");
        std::fs::write(&path, "[database]\npath = \"/var/lib/folio/folio.db\"\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.database.path, PathBuf::from("/var/lib/folio/folio.db"));
    }

    #[test]
    fn load_config_reports_missing_file() {
        let err = load_config(Path::new("/nonexistent/folio.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
