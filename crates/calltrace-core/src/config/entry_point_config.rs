//! Entry-point detection configuration.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_CONTROLLER_GLOBS;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EntryPointConfig {
    /// Directory globs for the controller convention. Empty means defaults.
    #[serde(default)]
    pub controller_globs: Vec<String>,
    /// Additional decorator names treated as route annotations.
    #[serde(default)]
    pub extra_route_decorators: Vec<String>,
}

impl EntryPointConfig {
    /// Returns the configured controller globs, or the built-in set.
    pub fn effective_controller_globs(&self) -> Vec<String> {
        if self.controller_globs.is_empty() {
            DEFAULT_CONTROLLER_GLOBS
                .iter()
                .map(|g| g.to_string())
                .collect()
        } else {
            self.controller_globs.clone()
        }
    }
}
