use std::{fs, path::Path, time::Duration};

use anyhow::{anyhow, Context};
use serde::Deserialize;
use tracing::warn;
use url::Url;

pub const DEFAULT_CONFIG_PATH: &str = "catalog.toml";
pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";

#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub image_base_url: String,
    pub language: String,
    pub region: String,
    pub request_timeout_ms: u64,
    pub search_debounce_ms: u64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.into(),
            image_base_url: catalog_api::DEFAULT_IMAGE_BASE_URL.into(),
            language: "en-US".into(),
            region: "US".into(),
            request_timeout_ms: 10_000,
            search_debounce_ms: 500,
        }
    }
}

impl CatalogSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn require_api_key(&self) -> anyhow::Result<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                anyhow!("missing TMDb API key; set TMDB_API_KEY or api_key in {DEFAULT_CONFIG_PATH}")
            })
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_key: Option<String>,
    base_url: Option<String>,
    image_base_url: Option<String>,
    language: Option<String>,
    region: Option<String>,
    request_timeout_ms: Option<u64>,
    search_debounce_ms: Option<u64>,
}

/// Defaults, then `catalog.toml` (or `$CATALOG_CONFIG`), then environment.
pub fn load_settings() -> CatalogSettings {
    let path = std::env::var("CATALOG_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let mut settings = CatalogSettings::default();

    if let Ok(raw) = fs::read_to_string(&path) {
        match parse_file_settings(&raw) {
            Ok(file_cfg) => apply_file_settings(&mut settings, file_cfg),
            Err(err) => warn!(path = %path, error = %err, "config: ignoring unreadable settings file"),
        }
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

pub fn load_settings_from(path: &Path) -> anyhow::Result<CatalogSettings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
    let mut settings = CatalogSettings::default();
    apply_file_settings(&mut settings, parse_file_settings(&raw)?);
    Ok(settings)
}

fn parse_file_settings(raw: &str) -> anyhow::Result<FileSettings> {
    toml::from_str(raw).context("invalid catalog settings toml")
}

fn apply_file_settings(settings: &mut CatalogSettings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.api_key {
        settings.api_key = Some(v);
    }
    if let Some(v) = file_cfg.base_url {
        settings.base_url = normalize_base_url(&v, DEFAULT_BASE_URL);
    }
    if let Some(v) = file_cfg.image_base_url {
        settings.image_base_url = normalize_base_url(&v, catalog_api::DEFAULT_IMAGE_BASE_URL);
    }
    if let Some(v) = file_cfg.language {
        settings.language = v;
    }
    if let Some(v) = file_cfg.region {
        settings.region = v;
    }
    if let Some(v) = file_cfg.request_timeout_ms {
        settings.request_timeout_ms = v;
    }
    if let Some(v) = file_cfg.search_debounce_ms {
        settings.search_debounce_ms = v;
    }
}

pub fn apply_env_overrides(
    settings: &mut CatalogSettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(v) = lookup("TMDB_API_KEY") {
        settings.api_key = Some(v);
    }
    if let Some(v) = lookup("APP__API_KEY") {
        settings.api_key = Some(v);
    }

    if let Some(v) = lookup("APP__BASE_URL") {
        settings.base_url = normalize_base_url(&v, DEFAULT_BASE_URL);
    }
    if let Some(v) = lookup("APP__IMAGE_BASE_URL") {
        settings.image_base_url = normalize_base_url(&v, catalog_api::DEFAULT_IMAGE_BASE_URL);
    }

    if let Some(v) = lookup("APP__LANGUAGE") {
        settings.language = v;
    }
    if let Some(v) = lookup("APP__REGION") {
        settings.region = v;
    }

    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_MS") {
        match v.parse::<u64>() {
            Ok(parsed) => settings.request_timeout_ms = parsed,
            Err(_) => warn!(value = %v, "config: APP__REQUEST_TIMEOUT_MS is not a number"),
        }
    }
    if let Some(v) = lookup("APP__SEARCH_DEBOUNCE_MS") {
        match v.parse::<u64>() {
            Ok(parsed) => settings.search_debounce_ms = parsed,
            Err(_) => warn!(value = %v, "config: APP__SEARCH_DEBOUNCE_MS is not a number"),
        }
    }
}

/// Trims whitespace and trailing slashes. Blank or non-URL input falls back
/// to `default`.
fn normalize_base_url(raw: &str, default: &str) -> String {
    let raw = raw.trim().trim_end_matches('/');
    if raw.is_empty() {
        return default.to_string();
    }

    match Url::parse(raw) {
        Ok(_) => raw.to_string(),
        Err(err) => {
            warn!(url = %raw, error = %err, "config: invalid base url, using default");
            default.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_public_tmdb() {
        let settings = CatalogSettings::default();
        assert_eq!(settings.base_url, "https://api.themoviedb.org/3");
        assert_eq!(settings.request_timeout(), Duration::from_secs(10));
        assert_eq!(settings.search_debounce(), Duration::from_millis(500));
        assert!(settings.require_api_key().is_err());
    }

    #[test]
    fn file_settings_then_env_overrides() {
        let mut settings = CatalogSettings::default();
        let file_cfg = parse_file_settings(
            r#"
            api_key = "from-file"
            base_url = "http://localhost:9000/3/"
            language = "fr-FR"
            "#,
        )
        .expect("parse");
        apply_file_settings(&mut settings, file_cfg);

        assert_eq!(settings.base_url, "http://localhost:9000/3");
        assert_eq!(settings.language, "fr-FR");

        let vars = env(&[
            ("TMDB_API_KEY", "from-env"),
            ("APP__REQUEST_TIMEOUT_MS", "2500"),
            ("APP__SEARCH_DEBOUNCE_MS", "not-a-number"),
        ]);
        apply_env_overrides(&mut settings, |key| vars.get(key).cloned());

        assert_eq!(settings.require_api_key().expect("key"), "from-env");
        assert_eq!(settings.request_timeout_ms, 2500);
        assert_eq!(settings.search_debounce_ms, 500);
    }

    #[test]
    fn app_prefixed_key_wins_over_tmdb_key() {
        let mut settings = CatalogSettings::default();
        let vars = env(&[("TMDB_API_KEY", "a"), ("APP__API_KEY", "b")]);
        apply_env_overrides(&mut settings, |key| vars.get(key).cloned());
        assert_eq!(settings.api_key.as_deref(), Some("b"));
    }

    #[test]
    fn invalid_base_url_falls_back_to_default() {
        assert_eq!(normalize_base_url("   ", DEFAULT_BASE_URL), DEFAULT_BASE_URL);
        assert_eq!(
            normalize_base_url("not a url", DEFAULT_BASE_URL),
            DEFAULT_BASE_URL
        );
    }

    #[test]
    fn blank_api_key_is_rejected() {
        let settings = CatalogSettings {
            api_key: Some("  ".into()),
            ..CatalogSettings::default()
        };
        assert!(settings.require_api_key().is_err());
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(parse_file_settings("api_key = ").is_err());
    }
}
