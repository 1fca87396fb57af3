use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::location::DEFAULT_LINK_BASE;
use crate::reconcile::PollSettings;

/// File name looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "cas-timeline.toml";
/// Application directory name under the platform config/data dirs.
pub const APP_DIR: &str = "cas-timeline";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Static dataset: a file path or an http(s) URL.
    #[serde(default = "default_data_url")]
    pub data_url: String,
    /// Base URL of the editing server; enables server mode when set.
    #[serde(default)]
    pub server_url: Option<String>,
    /// Base of shareable links shown in the status bar.
    #[serde(default = "default_link_base")]
    pub link_base: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            data_url: default_data_url(),
            server_url: None,
            link_base: default_link_base(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl SourceConfig {
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Server mode is on when a non-blank server URL is configured.
    #[must_use]
    pub fn server_url(&self) -> Option<&str> {
        self.server_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl PublishConfig {
    #[must_use]
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Password unlocking edits when no server is configured.
    #[serde(default = "default_local_password")]
    pub local_password: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            local_password: default_local_password(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default)]
    pub reduce_motion: bool,
    #[serde(default = "default_search_debounce_ms")]
    pub search_debounce_ms: u64,
    #[serde(default = "default_transition_ms")]
    pub transition_ms: u64,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    #[serde(default = "default_status_ttl_secs")]
    pub status_ttl_secs: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            reduce_motion: false,
            search_debounce_ms: default_search_debounce_ms(),
            transition_ms: default_transition_ms(),
            tick_ms: default_tick_ms(),
            status_ttl_secs: default_status_ttl_secs(),
        }
    }
}

impl UiConfig {
    #[must_use]
    pub const fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    #[must_use]
    pub const fn transition(&self) -> Duration {
        Duration::from_millis(self.transition_ms)
    }

    #[must_use]
    pub const fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    #[must_use]
    pub const fn status_ttl(&self) -> Duration {
        Duration::from_secs(self.status_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_update_interval_secs")]
    pub update_interval_secs: u64,
    #[serde(default = "default_publish_interval_secs")]
    pub publish_interval_secs: u64,
    #[serde(default = "default_publish_attempts")]
    pub publish_attempts: u32,
    #[serde(default = "default_reload_delay_ms")]
    pub reload_delay_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: default_update_interval_secs(),
            publish_interval_secs: default_publish_interval_secs(),
            publish_attempts: default_publish_attempts(),
            reload_delay_ms: default_reload_delay_ms(),
        }
    }
}

impl PollConfig {
    #[must_use]
    pub const fn settings(&self) -> PollSettings {
        PollSettings {
            update_interval: Duration::from_secs(self.update_interval_secs),
            publish_interval: Duration::from_secs(self.publish_interval_secs),
            publish_attempts: self.publish_attempts,
            reload_delay: Duration::from_millis(self.reload_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for local edits; defaults to the platform data dir.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Configured dir, else `<data dir>/cas-timeline`, else `./.cas-timeline`.
    #[must_use]
    pub fn resolve_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(default_data_dir)
    }
}

/// Platform data directory for the app.
#[must_use]
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir().map_or_else(|| PathBuf::from(".cas-timeline"), |d| d.join(APP_DIR))
}

/// Resolve and load the configuration.
///
/// Lookup: `explicit`, else `<cwd>/cas-timeline.toml`, else
/// `<config dir>/cas-timeline/config.toml`, else defaults. Environment
/// overrides are applied last.
///
/// # Errors
///
/// Returns an error when an explicit path is missing or any found file fails
/// to parse.
pub fn load_config(explicit: Option<&Path>, cwd: &Path) -> Result<Config> {
    let mut config = match find_config_file(explicit, cwd)? {
        Some(path) => read_config(&path)?,
        None => Config::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn find_config_file(explicit: Option<&Path>, cwd: &Path) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        anyhow::ensure!(path.exists(), "config file {} not found", path.display());
        return Ok(Some(path.to_path_buf()));
    }
    let local = cwd.join(LOCAL_CONFIG_FILE);
    if local.exists() {
        return Ok(Some(local));
    }
    Ok(dirs::config_dir()
        .map(|d| d.join(APP_DIR).join("config.toml"))
        .filter(|p| p.exists()))
}

/// Parse one config file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn read_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<Config>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Apply `CAS_*` overrides read through `lookup`.
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup("CAS_DATA_URL") {
        config.source.data_url = url;
    }
    if let Some(url) = lookup("CAS_SERVER_URL") {
        config.source.server_url = Some(url);
    }
    if let Some(endpoint) = lookup("CAS_PUBLISH_ENDPOINT") {
        config.publish.endpoint = Some(endpoint);
    }
    if let Some(dir) = lookup("CAS_STORAGE_DIR") {
        config.storage.dir = Some(PathBuf::from(dir));
    }
    if let Some(flag) = lookup("CAS_REDUCED_MOTION") {
        config.ui.reduce_motion = matches!(
            flag.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        );
    }
}

fn default_data_url() -> String {
    "assets/timeline-data.json".to_string()
}

fn default_link_base() -> String {
    DEFAULT_LINK_BASE.to_string()
}

fn default_local_password() -> String {
    "admin".to_string()
}

const fn default_request_timeout_secs() -> u64 {
    15
}

const fn default_search_debounce_ms() -> u64 {
    140
}

const fn default_transition_ms() -> u64 {
    220
}

const fn default_tick_ms() -> u64 {
    16
}

const fn default_status_ttl_secs() -> u64 {
    6
}

const fn default_update_interval_secs() -> u64 {
    120
}

const fn default_publish_interval_secs() -> u64 {
    10
}

const fn default_publish_attempts() -> u32 {
    12
}

const fn default_reload_delay_ms() -> u64 {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.source.data_url, "assets/timeline-data.json");
        assert_eq!(cfg.source.link_base, DEFAULT_LINK_BASE);
        assert_eq!(cfg.auth.local_password, "admin");
        assert_eq!(cfg.ui.search_debounce(), Duration::from_millis(140));
        assert_eq!(cfg.ui.transition(), Duration::from_millis(220));
        assert_eq!(cfg.poll.settings(), PollSettings::default());
        assert!(cfg.source.server_url().is_none());
        assert!(cfg.publish.endpoint().is_none());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [source]
            server_url = "http://localhost:3000"

            [poll]
            publish_attempts = 3
            "#,
        )
        .unwrap();
        assert_eq!(cfg.source.server_url(), Some("http://localhost:3000"));
        assert_eq!(cfg.source.data_url, "assets/timeline-data.json");
        assert_eq!(cfg.poll.publish_attempts, 3);
        assert_eq!(cfg.poll.update_interval_secs, 120);
    }

    #[test]
    fn blank_urls_count_as_unset() {
        let mut cfg = Config::default();
        cfg.source.server_url = Some("  ".into());
        cfg.publish.endpoint = Some(String::new());
        assert!(cfg.source.server_url().is_none());
        assert!(cfg.publish.endpoint().is_none());
    }

    #[test]
    fn env_overrides_win() {
        let env: HashMap<&str, &str> = [
            ("CAS_DATA_URL", "https://school.test/data.json"),
            ("CAS_PUBLISH_ENDPOINT", "https://worker.test/publish"),
            ("CAS_STORAGE_DIR", "/tmp/cas"),
            ("CAS_REDUCED_MOTION", "TRUE"),
        ]
        .into_iter()
        .collect();
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg, |k| env.get(k).map(|v| (*v).to_string()));
        assert_eq!(cfg.source.data_url, "https://school.test/data.json");
        assert_eq!(cfg.publish.endpoint(), Some("https://worker.test/publish"));
        assert_eq!(cfg.storage.resolve_dir(), PathBuf::from("/tmp/cas"));
        assert!(cfg.ui.reduce_motion);
        assert!(cfg.source.server_url.is_none());
    }

    #[test]
    fn local_file_is_found_in_cwd() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(LOCAL_CONFIG_FILE),
            "[auth]\nlocal_password = \"s3cret\"\n",
        )
        .unwrap();
        let path = find_config_file(None, dir.path()).unwrap();
        assert_eq!(path, Some(dir.path().join(LOCAL_CONFIG_FILE)));
        let cfg = read_config(&dir.path().join(LOCAL_CONFIG_FILE)).unwrap();
        assert_eq!(cfg.auth.local_password, "s3cret");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(load_config(Some(&missing), dir.path()).is_err());
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[source\n").unwrap();
        let err = read_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("bad.toml"));
    }
}
