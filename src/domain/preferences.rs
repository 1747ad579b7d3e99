//! Display and search preferences.

use serde::{Deserialize, Serialize};

use super::Source;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Grid,
    List,
}

/// Display and search preferences; missing fields take their defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub theme: Theme,
    pub default_source: Source,
    pub results_per_page: u32,
    pub view_mode: ViewMode,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            default_source: Source::default(),
            results_per_page: 20,
            view_mode: ViewMode::default(),
        }
    }
}
