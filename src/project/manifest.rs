//! `pubspec.yaml` reading.

use std::path::Path;

use serde::Deserialize;

use crate::error::Result;

pub const MANIFEST_FILENAME: &str = "pubspec.yaml";

/// The parts of the package manifest the migrator needs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    pub name: Option<String>,
}

impl Manifest {
    /// Reads the manifest at `root`. A missing file yields an empty manifest.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(MANIFEST_FILENAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn package_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }
}
