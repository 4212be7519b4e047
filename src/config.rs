//! CLI configuration: built-in defaults, `amw.config.json`, then `AMW_*`
//! environment overrides, strongest last.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const CONFIG_FILE_NAME: &str = "amw.config.json";

/// Resolved configuration the commands run with.
#[derive(Clone, Debug)]
pub struct AmwConfig {
    pub headed: bool,
    pub disable_replay: bool,
    pub hold_open_ms: u64,
    pub session: String,
    pub profile: String,
    pub profile_dir: String,
    pub binary: String,
    pub store_dir: String,
    pub config_path: PathBuf,
}

impl Default for AmwConfig {
    fn default() -> Self {
        AmwConfig {
            headed: false,
            disable_replay: false,
            hold_open_ms: 0,
            session: "amw".to_string(),
            profile: "main".to_string(),
            profile_dir: "./profiles".to_string(),
            binary: "agent-browser".to_string(),
            store_dir: "./data".to_string(),
            config_path: PathBuf::from(CONFIG_FILE_NAME),
        }
    }
}

/// The optional fields a config file may set.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    headed: Option<bool>,
    disable_replay: Option<bool>,
    hold_open_ms: Option<u64>,
    session: Option<String>,
    profile: Option<String>,
    profile_dir: Option<String>,
    binary: Option<String>,
    store_dir: Option<String>,
}

/// Loose boolean parsing for env and CLI values.
pub fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl AmwConfig {
    /// Load configuration relative to `cwd`, with the process environment.
    pub fn load(cwd: &Path) -> Result<Self> {
        Self::load_with_env(cwd, &std::env::vars().collect())
    }

    fn load_with_env(cwd: &Path, env: &HashMap<String, String>) -> Result<Self> {
        let config_path = cwd.join(CONFIG_FILE_NAME);
        let file = if config_path.exists() {
            let raw = fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read {}", config_path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("invalid JSON in {}", config_path.display()))?
        } else {
            FileConfig::default()
        };

        let mut config = AmwConfig {
            config_path,
            ..AmwConfig::default()
        };
        if let Some(v) = file.headed {
            config.headed = v;
        }
        if let Some(v) = file.disable_replay {
            config.disable_replay = v;
        }
        if let Some(v) = file.hold_open_ms {
            config.hold_open_ms = v;
        }
        if let Some(v) = file.session {
            config.session = v;
        }
        if let Some(v) = file.profile {
            config.profile = v;
        }
        if let Some(v) = file.profile_dir {
            config.profile_dir = v;
        }
        if let Some(v) = file.binary {
            config.binary = v;
        }
        if let Some(v) = file.store_dir {
            config.store_dir = v;
        }

        let env_str =
            |key: &str| -> Option<&String> { env.get(key).filter(|v| !v.trim().is_empty()) };
        if let Some(v) = env_str("AMW_HEADED") {
            config.headed = parse_bool(v);
        }
        if let Some(v) = env_str("AMW_DISABLE_REPLAY") {
            config.disable_replay = parse_bool(v);
        }
        if let Some(v) = env_str("AMW_HOLD_OPEN_MS") {
            config.hold_open_ms = v.trim().parse().unwrap_or(config.hold_open_ms);
        }
        if let Some(v) = env_str("AMW_SESSION") {
            config.session = v.clone();
        }
        if let Some(v) = env_str("AMW_PROFILE") {
            config.profile = v.clone();
        }
        if let Some(v) = env_str("AMW_PROFILE_DIR") {
            config.profile_dir = v.clone();
        }
        if let Some(v) = env_str("AMW_BINARY") {
            config.binary = v.clone();
        }
        if let Some(v) = env_str("AMW_STORE_DIR") {
            config.store_dir = v.clone();
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file_or_env() {
        let dir = tempfile::tempdir().unwrap();
        let config = AmwConfig::load_with_env(dir.path(), &HashMap::new()).unwrap();
        assert!(!config.headed);
        assert_eq!(config.hold_open_ms, 0);
        assert_eq!(config.session, "amw");
        assert_eq!(config.profile, "main");
        assert_eq!(config.profile_dir, "./profiles");
        assert_eq!(config.binary, "agent-browser");
        assert_eq!(config.store_dir, "./data");
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{ "headed": true, "hold_open_ms": 30000, "store_dir": "./state" }"#,
        )
        .unwrap();
        let config = AmwConfig::load_with_env(dir.path(), &HashMap::new()).unwrap();
        assert!(config.headed);
        assert_eq!(config.hold_open_ms, 30000);
        assert_eq!(config.store_dir, "./state");
        // untouched keys keep defaults
        assert_eq!(config.session, "amw");
    }

    #[test]
    fn env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{ "headed": true, "session": "from-file" }"#,
        )
        .unwrap();
        let env = HashMap::from([
            ("AMW_HEADED".to_string(), "0".to_string()),
            ("AMW_SESSION".to_string(), "from-env".to_string()),
            ("AMW_HOLD_OPEN_MS".to_string(), "1500".to_string()),
        ]);
        let config = AmwConfig::load_with_env(dir.path(), &env).unwrap();
        assert!(!config.headed);
        assert_eq!(config.session, "from-env");
        assert_eq!(config.hold_open_ms, 1500);
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let env = HashMap::from([("AMW_SESSION".to_string(), "  ".to_string())]);
        let config = AmwConfig::load_with_env(dir.path(), &env).unwrap();
        assert_eq!(config.session, "amw");
    }

    #[test]
    fn invalid_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "{not json").unwrap();
        assert!(AmwConfig::load_with_env(dir.path(), &HashMap::new()).is_err());
    }

    #[test]
    fn parse_bool_accepts_common_truthy_forms() {
        for v in ["1", "true", "YES", " on "] {
            assert!(parse_bool(v), "{v}");
        }
        for v in ["0", "false", "off", "", "2"] {
            assert!(!parse_bool(v), "{v}");
        }
    }
}
