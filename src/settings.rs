//! `route_migrator.toml` settings.
//!
//! ```toml
//! output = "lib/router/app_router.dart"
//! router_name = "appRouter"
//! exclude = ["lib/generated/**"]
//! marker = "MIGRATION-REQUIRED"
//! ```

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, Result};

pub const SETTINGS_FILENAME: &str = "route_migrator.toml";

pub const DEFAULT_OUTPUT: &str = "lib/router/app_router.dart";
pub const DEFAULT_ROUTER_NAME: &str = "appRouter";
pub const DEFAULT_MARKER: &str = "MIGRATION-REQUIRED";

static DART_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("Invalid identifier regex"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Configuration file path, relative to the project root.
    pub output: PathBuf,
    /// Name of the top-level `GoRouter` variable in a fresh file.
    pub router_name: String,
    /// Glob patterns of sources to leave alone.
    pub exclude: Vec<String>,
    /// Tag used in manual-migration comments.
    pub marker: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output: PathBuf::from(DEFAULT_OUTPUT),
            router_name: DEFAULT_ROUTER_NAME.to_string(),
            exclude: Vec::new(),
            marker: DEFAULT_MARKER.to_string(),
        }
    }
}

/// Command-line values that take precedence over the settings file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub output: Option<PathBuf>,
    pub router_name: Option<String>,
    pub exclude: Vec<String>,
}

impl Settings {
    /// Loads `route_migrator.toml` from `root`, falling back to defaults
    /// when the file does not exist.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(SETTINGS_FILENAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Result<Self> {
        if let Some(output) = overrides.output {
            self.output = output;
        }
        if let Some(name) = overrides.router_name {
            self.router_name = name;
        }
        self.exclude.extend(overrides.exclude);
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.output.as_os_str().is_empty() || self.output.is_absolute() {
            return Err(MigrateError::Config(format!(
                "output must be a relative path, got '{}'",
                self.output.display()
            )));
        }
        if !DART_IDENTIFIER.is_match(&self.router_name) {
            return Err(MigrateError::Config(format!(
                "router_name '{}' is not a valid identifier",
                self.router_name
            )));
        }
        if self.marker.trim().is_empty() || self.marker.contains("*/") {
            return Err(MigrateError::Config(
                "marker must be non-empty and must not contain '*/'".to_string(),
            ));
        }
        Ok(())
    }
}
