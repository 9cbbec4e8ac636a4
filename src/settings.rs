//! Host-provided user settings.
//!
//! Deserialized from the JSON blob the embedding shell persists. Unknown
//! keys are tolerated and every field has a default, so a blob written by
//! an older or newer shell still loads.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Master switch. Absent means enabled; only an explicit `false`
    /// turns the engine off.
    pub enabled: bool,
    /// Persisted vertical position of the shell's floating widget.
    pub widget_top: Option<f32>,
    pub widget_visible: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            widget_top: None,
            widget_visible: true,
        }
    }
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }
}
