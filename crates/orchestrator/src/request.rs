//! Run request and mode types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One task request: what to do, where, and how to hold the session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunRequest {
    pub site: String,
    pub task_type: String,
    pub intent: String,
    #[serde(default = "default_session")]
    pub session: String,
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_profile_dir")]
    pub profile_dir: String,
    #[serde(default)]
    pub headed: bool,
    #[serde(default)]
    pub disable_replay: bool,
    #[serde(default)]
    pub hold_open_ms: u64,
    #[serde(default)]
    pub vars: Map<String, Value>,
}

fn default_session() -> String {
    "amw".to_string()
}

fn default_profile() -> String {
    "main".to_string()
}

fn default_profile_dir() -> String {
    "./profiles".to_string()
}

impl RunRequest {
    pub fn new(site: &str, task_type: &str, intent: &str) -> Self {
        RunRequest {
            site: site.to_string(),
            task_type: task_type.to_string(),
            intent: intent.to_string(),
            session: default_session(),
            profile: default_profile(),
            profile_dir: default_profile_dir(),
            headed: false,
            disable_replay: false,
            hold_open_ms: 0,
            vars: Map::new(),
        }
    }
}

/// How the run was (or was not) satisfied.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// A stored trajectory was replayed.
    Replay,
    /// The caller-supplied fallback steps were executed.
    Explore,
    /// Nothing to replay and nothing to explore.
    None,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Replay => "replay",
            RunMode::Explore => "explore",
            RunMode::None => "none",
        }
    }
}
