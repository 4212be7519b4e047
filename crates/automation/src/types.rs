//! Value types crossing the surface boundary.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Page load milestones a `wait_load` call can target.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    Load,
    DomContentLoaded,
    NetworkIdle,
}

impl LoadState {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "load" => Some(LoadState::Load),
            "domcontentloaded" => Some(LoadState::DomContentLoaded),
            "networkidle" => Some(LoadState::NetworkIdle),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoadState::Load => "load",
            LoadState::DomContentLoaded => "domcontentloaded",
            LoadState::NetworkIdle => "networkidle",
        }
    }
}

/// Page structure capture: a serialized accessibility/DOM tree plus the
/// `@ref -> selector` table interactive snapshots produce.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub tree: String,
    #[serde(default)]
    pub refs: HashMap<String, String>,
}

/// Pixel rectangle for clipped screenshots.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Screenshot parameters. Empty `path` lets the surface pick one.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ScreenshotRequest {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub selector: String,
    #[serde(default)]
    pub clip: Option<Clip>,
    #[serde(default)]
    pub full_page: bool,
    #[serde(default)]
    pub timeout_ms: u64,
}

/// Result of any capture-style operation (screenshot, original-resource
/// download). `url`/`source` are set when the artifact came from a network
/// resource.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Capture {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Options for clicking an element located by visible text.
#[derive(Clone, Debug)]
pub struct ClickTextOptions {
    pub exact: bool,
    pub index: usize,
    pub timeout_ms: u64,
}

impl Default for ClickTextOptions {
    fn default() -> Self {
        ClickTextOptions {
            exact: false,
            index: 0,
            timeout_ms: 30_000,
        }
    }
}
