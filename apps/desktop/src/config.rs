use std::{fs, path::Path};

use anyhow::{bail, Context};
use serde::Deserialize;
use url::Url;

pub const DEFAULT_SETTINGS_FILE: &str = "santorini.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub engine_url: String,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            engine_url: "http://127.0.0.1:8080".into(),
            log_filter: "info".into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    engine_url: Option<String>,
    log_filter: Option<String>,
}

/// Defaults, then the settings file, then environment variables. An explicit
/// `path` must exist; the default file is optional.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let raw = match path {
        Some(path) => Some(
            fs::read_to_string(path)
                .with_context(|| format!("failed to read settings file '{}'", path.display()))?,
        ),
        None => fs::read_to_string(DEFAULT_SETTINGS_FILE).ok(),
    };
    if let Some(raw) = raw {
        merge_file(&mut settings, &raw)?;
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn merge_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw).context("settings file is not valid TOML")?;
    if let Some(v) = file_cfg.engine_url {
        settings.engine_url = v;
    }
    if let Some(v) = file_cfg.log_filter {
        settings.log_filter = v;
    }
    Ok(())
}

fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    for key in ["SANTORINI_ENGINE_URL", "APP__ENGINE_URL"] {
        if let Some(v) = lookup(key) {
            settings.engine_url = v;
        }
    }
    for key in ["SANTORINI_LOG", "APP__LOG_FILTER"] {
        if let Some(v) = lookup(key) {
            settings.log_filter = v;
        }
    }
}

pub fn normalize_engine_url(raw: &str) -> anyhow::Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Settings::default().engine_url);
    }
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };
    let url = Url::parse(&with_scheme)
        .with_context(|| format!("engine url '{raw}' is not a valid URL"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("engine url '{raw}' must use http or https");
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        env,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    #[test]
    fn normalizes_bare_host_and_trailing_slash() {
        assert_eq!(
            normalize_engine_url("localhost:8080/").expect("url"),
            "http://localhost:8080"
        );
        assert_eq!(
            normalize_engine_url("  ").expect("url"),
            Settings::default().engine_url
        );
        assert!(normalize_engine_url("ftp://example.com").is_err());
    }

    #[test]
    fn env_overrides_win_over_file_values() {
        let mut settings = Settings::default();
        merge_file(
            &mut settings,
            "engine_url = \"http://engine.local:9000\"\nlog_filter = \"debug\"\n",
        )
        .expect("merge");
        assert_eq!(settings.engine_url, "http://engine.local:9000");

        let vars = HashMap::from([("APP__LOG_FILTER", "client_core=trace")]);
        apply_env_overrides(&mut settings, |key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(settings.engine_url, "http://engine.local:9000");
        assert_eq!(settings.log_filter, "client_core=trace");
    }

    #[test]
    fn explicit_settings_file_must_exist() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let missing = env::temp_dir().join(format!("santorini_missing_{suffix}.toml"));
        assert!(load_settings(Some(&missing)).is_err());

        let present = env::temp_dir().join(format!("santorini_present_{suffix}.toml"));
        fs::write(&present, "log_filter = \"warn\"\n").expect("write settings");
        let settings = load_settings(Some(&present)).expect("load");
        fs::remove_file(&present).expect("cleanup");
        assert!(!settings.engine_url.is_empty());
    }
}
