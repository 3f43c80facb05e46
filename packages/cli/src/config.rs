use manualdesk_editor::{AutosaveOptions, HistoryOptions, DEFAULT_HISTORY_LIMIT, DEFAULT_MAX_AGE_HOURS};
use manualdesk_session::SessionEndpoint;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CONFIG_NAME: &str = "manualdesk.config.json";

/// Manualdesk configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Base URL of the session endpoints
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Signed-in user; takes precedence over `cookie`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Raw `Cookie` header to read the user id from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,

    /// Where undo history snapshots are kept
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: String,

    #[serde(default = "default_autosave_interval_ms")]
    pub autosave_interval_ms: u64,

    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    #[serde(default = "default_history_max_age_hours")]
    pub history_max_age_hours: i64,
}

fn default_server_url() -> String {
    "ws://localhost:8000/api".to_string()
}

fn default_snapshot_dir() -> String {
    ".manualdesk/history".to_string()
}

fn default_autosave_interval_ms() -> u64 {
    120_000
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

fn default_history_max_age_hours() -> i64 {
    DEFAULT_MAX_AGE_HOURS
}

impl Config {
    /// Load config from a directory
    pub fn load(cwd: &str) -> anyhow::Result<Self> {
        let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn get_snapshot_dir(&self, cwd: &str) -> PathBuf {
        PathBuf::from(cwd).join(&self.snapshot_dir)
    }

    pub fn resolved_user_id(&self) -> Option<String> {
        self.user_id
            .clone()
            .filter(|id| !id.is_empty())
            .or_else(|| {
                self.cookie
                    .as_deref()
                    .and_then(SessionEndpoint::user_id_from_cookie)
            })
    }

    pub fn endpoint(&self) -> SessionEndpoint {
        SessionEndpoint::new(&self.server_url).with_user_id(self.resolved_user_id())
    }

    pub fn history_options(&self) -> HistoryOptions {
        HistoryOptions {
            limit: self.history_limit,
            max_age: chrono::Duration::hours(self.history_max_age_hours),
        }
    }

    pub fn autosave_options(&self) -> AutosaveOptions {
        AutosaveOptions {
            interval: Duration::from_millis(self.autosave_interval_ms),
            enabled: self.autosave_interval_ms > 0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            user_id: None,
            cookie: None,
            snapshot_dir: default_snapshot_dir(),
            autosave_interval_ms: default_autosave_interval_ms(),
            history_limit: default_history_limit(),
            history_max_age_hours: default_history_max_age_hours(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "serverUrl": "wss://manuals.example.com/api",
            "userId": "u-17",
            "snapshotDir": "/tmp/history",
            "autosaveIntervalMs": 30000,
            "historyLimit": 50
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.server_url, "wss://manuals.example.com/api");
        assert_eq!(config.resolved_user_id().as_deref(), Some("u-17"));
        assert_eq!(config.autosave_options().interval, Duration::from_secs(30));
        assert_eq!(config.history_options().limit, 50);
        assert_eq!(config.history_max_age_hours, 24);
        assert_eq!(config.get_snapshot_dir("/work"), PathBuf::from("/tmp/history"));
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server_url, "ws://localhost:8000/api");
        assert_eq!(config.autosave_interval_ms, 120_000);
        assert_eq!(config.history_limit, 100);
        assert_eq!(
            config.get_snapshot_dir("/work"),
            PathBuf::from("/work/.manualdesk/history")
        );
        assert_eq!(
            config.endpoint().url_for("/ws/process"),
            "ws://localhost:8000/api/ws/process"
        );
    }

    #[test]
    fn test_user_id_from_cookie() {
        let config: Config =
            serde_json::from_str(r#"{ "cookie": "theme=dark; user_id=abc" }"#).unwrap();
        assert_eq!(config.resolved_user_id().as_deref(), Some("abc"));
        assert_eq!(
            config.endpoint().url_for("/ws/compile"),
            "ws://localhost:8000/api/ws/compile?user_id=abc"
        );
    }

    #[test]
    fn test_zero_interval_disables_autosave() {
        let config: Config = serde_json::from_str(r#"{ "autosaveIntervalMs": 0 }"#).unwrap();
        assert!(!config.autosave_options().enabled);
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = dir.path().display().to_string();
        assert_eq!(Config::load(&cwd).unwrap().history_limit, 100);

        std::fs::write(
            dir.path().join(DEFAULT_CONFIG_NAME),
            r#"{ "historyLimit": 10 }"#,
        )
        .unwrap();
        assert_eq!(Config::load(&cwd).unwrap().history_limit, 10);
    }
}
