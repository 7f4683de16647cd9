use std::path::{Path, PathBuf};

use glob::Pattern;
use ignore::WalkBuilder;

use crate::error::{MigrateError, Result};

/// Directories that never hold hand-written sources.
const SKIPPED_DIRS: &[&str] = &["build", ".dart_tool"];

/// Enumerates `.dart` sources under a project root.
pub struct SourceWalker {
    excludes: Vec<Pattern>,
    skip_file: Option<PathBuf>,
}

impl SourceWalker {
    pub fn new() -> Self {
        Self {
            excludes: Vec::new(),
            skip_file: None,
        }
    }

    /// Glob patterns matched against root-relative paths.
    pub fn with_excludes(mut self, patterns: &[String]) -> Result<Self> {
        for pattern in patterns {
            let compiled = Pattern::new(pattern).map_err(|e| {
                MigrateError::Config(format!("invalid exclude pattern '{}': {}", pattern, e))
            })?;
            self.excludes.push(compiled);
        }
        Ok(self)
    }

    /// Never yields this file (the generated configuration).
    pub fn with_skip_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.skip_file = Some(path.into());
        self
    }

    pub fn walk(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        let walker = WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .ignore(true)
            .filter_entry(|entry| {
                let name = entry.file_name().to_string_lossy();
                !(entry.file_type().is_some_and(|t| t.is_dir())
                    && SKIPPED_DIRS.contains(&name.as_ref()))
            })
            .build();

        for entry in walker.flatten() {
            let path = entry.path();
            if path.is_file() && self.is_supported(root, path) {
                files.push(path.to_path_buf());
            }
        }

        files.sort();
        Ok(files)
    }

    pub fn is_supported(&self, root: &Path, path: &Path) -> bool {
        if path.extension().and_then(|e| e.to_str()) != Some("dart") {
            return false;
        }
        if self.skip_file.as_deref() == Some(path) {
            return false;
        }
        let relative = path.strip_prefix(root).unwrap_or(path);
        !self.excludes.iter().any(|p| p.matches_path(relative))
    }
}

impl Default for SourceWalker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    fn create_file(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut file = File::create(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn test_walk_finds_dart_files() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "lib/main.dart", "void main() {}");
        create_file(temp_dir.path(), "lib/src/home.dart", "");
        create_file(temp_dir.path(), "README.md", "# Readme");
        create_file(temp_dir.path(), "pubspec.yaml", "name: app");

        let files = SourceWalker::new().walk(temp_dir.path()).unwrap();

        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|p| p.extension().unwrap() == "dart"));
    }

    #[test]
    fn test_walk_skips_build_output_and_tool_dirs() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "lib/main.dart", "");
        create_file(temp_dir.path(), "build/gen.dart", "");
        create_file(temp_dir.path(), ".dart_tool/x.dart", "");

        let files = SourceWalker::new().walk(temp_dir.path()).unwrap();

        assert_eq!(files, vec![temp_dir.path().join("lib/main.dart")]);
    }

    #[test]
    fn test_walk_applies_excludes_and_skip_file() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "lib/main.dart", "");
        create_file(temp_dir.path(), "lib/generated/a.g.dart", "");
        create_file(temp_dir.path(), "lib/router/app_router.dart", "");

        let walker = SourceWalker::new()
            .with_excludes(&["lib/generated/**".to_string()])
            .unwrap()
            .with_skip_file(temp_dir.path().join("lib/router/app_router.dart"));
        let files = walker.walk(temp_dir.path()).unwrap();

        assert_eq!(files, vec![temp_dir.path().join("lib/main.dart")]);
    }

    #[test]
    fn test_invalid_exclude_pattern() {
        let result = SourceWalker::new().with_excludes(&["[".to_string()]);
        assert!(matches!(result, Err(MigrateError::Config(_))));
    }
}
