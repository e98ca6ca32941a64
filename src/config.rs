use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_ENV_PREFIX: &str = "FITFEED";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub ui: UIConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedConfig {
    #[serde(default = "default_display_name")]
    pub default_display_name: String,
    #[serde(default)]
    pub seed_file: Option<PathBuf>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            default_display_name: default_display_name(),
            seed_file: None,
        }
    }
}

fn default_display_name() -> String {
    "AdminUser".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UIConfig {
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_density")]
    pub density: String,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            density: default_density(),
        }
    }
}

fn default_theme() -> String {
    "default".into()
}

fn default_density() -> String {
    "default".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    #[serde(default = "default_session_path")]
    pub path: Option<PathBuf>,
    #[serde(default = "default_session_ttl", with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: default_session_path(),
            ttl: default_session_ttl(),
        }
    }
}

fn default_session_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("fitfeed").join("session.db"))
}

fn default_session_ttl() -> Duration {
    Duration::from_secs(12 * 60 * 60)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaConfig {
    #[serde(default = "default_stage_dir")]
    pub stage_dir: Option<PathBuf>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            stage_dir: default_stage_dir(),
        }
    }
}

fn default_stage_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("fitfeed").join("staged"))
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    cfg = merge_config(cfg, load_env(prefix)?);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.feed.default_display_name.is_empty() {
        base.feed.default_display_name = other.feed.default_display_name;
    }
    if other.feed.seed_file.is_some() {
        base.feed.seed_file = other.feed.seed_file;
    }

    if !other.ui.theme.is_empty() {
        base.ui.theme = other.ui.theme;
    }
    if !other.ui.density.is_empty() {
        base.ui.density = other.ui.density;
    }

    if other.session.path.is_some() {
        base.session.path = other.session.path;
    }
    base.session.ttl = other.session.ttl;

    if other.media.stage_dir.is_some() {
        base.media.stage_dir = other.media.stage_dir;
    }

    base
}

fn load_env(prefix: &str) -> Result<Config> {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    if map.is_empty() {
        return Ok(Config::default());
    }

    let mut cfg = Config::default();

    for (key, value) in map {
        apply_env_value(&mut cfg, &key, value);
    }

    Ok(cfg)
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "feed.default_display_name" => cfg.feed.default_display_name = value,
        "feed.seed_file" => cfg.feed.seed_file = Some(PathBuf::from(value)),
        "ui.theme" => cfg.ui.theme = value,
        "ui.density" => cfg.ui.density = value,
        "session.path" => cfg.session.path = Some(PathBuf::from(value)),
        "session.ttl" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.session.ttl = duration;
            }
        }
        "media.stage_dir" => cfg.media.stage_dir = Some(PathBuf::from(value)),
        _ => {}
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("fitfeed").join("config.yaml"))
}

pub fn save_display_name(path: Option<PathBuf>, display_name: &str) -> Result<PathBuf> {
    let display_name = display_name.trim();
    anyhow::ensure!(
        !display_name.is_empty(),
        "config: feed.default_display_name is required"
    );

    let path = if let Some(path) = path {
        path
    } else {
        default_config_path().context("config: unable to determine default config path")?
    };

    let mut cfg = if path.exists() {
        read_config_file(&path)?
    } else {
        Config::default()
    };

    cfg.feed.default_display_name = display_name.to_string();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("config: failed to create directory {}", parent.display()))?;
    }

    let contents = serde_yaml::to_string(&cfg).context("config: failed to serialize config")?;
    fs::write(&path, contents)
        .with_context(|| format!("config: failed to write file {}", path.display()))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::tempdir;

    #[test]
    fn load_defaults_without_files() {
        let cfg = load(LoadOptions::default()).unwrap();
        assert_eq!(cfg.ui.theme, "default");
        assert_eq!(cfg.feed.default_display_name, "AdminUser");
    }

    #[test]
    fn save_display_name_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        save_display_name(Some(path.clone()), "TrailRunner").unwrap();
        let saved = read_config_file(&path).unwrap();
        assert_eq!(saved.feed.default_display_name, "TrailRunner");
    }

    #[test]
    fn env_overrides() {
        env::set_var("FITFEED_UI__DENSITY", "compact");
        let cfg = load(LoadOptions::default()).unwrap();
        assert_eq!(cfg.ui.density, "compact");
        env::remove_var("FITFEED_UI__DENSITY");
    }

    #[test]
    fn env_session_ttl_parses_humantime() {
        env::set_var("FITFEED_SESSION__TTL", "30m");
        let cfg = load(LoadOptions::default()).unwrap();
        assert_eq!(cfg.session.ttl, Duration::from_secs(30 * 60));
        env::remove_var("FITFEED_SESSION__TTL");
    }
}
