//! The end-to-end migration run.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::discovery::{classify_all, discover_helpers};
use crate::error::Result;
use crate::model::{CallRecord, Destination};
use crate::project::manifest::MANIFEST_FILENAME;
use crate::project::{Manifest, SourceWalker};
use crate::report::{CallEntry, FileReport, MigrationReport, Warning, WarningKind};
use crate::rewrite::{FileRewrite, Rewriter};
use crate::router::{merge, read_config, Emitter, RouteTree};
use crate::settings::Settings;
use crate::syntax::resolver::normalize_path;
use crate::syntax::{ProjectIndex, SourceFile};

pub use crate::report::Mode;

/// Runs migrations for one project root.
pub struct Migrator {
    root: PathBuf,
    settings: Settings,
}

impl Migrator {
    pub fn new(root: impl AsRef<Path>, settings: Settings) -> Result<Self> {
        let root = root.as_ref().canonicalize()?;
        Ok(Self { root, settings })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        normalize_path(&self.root.join(&self.settings.output))
    }

    /// Builds the report and, in apply mode, writes the configuration and
    /// rewritten sources. Per-file failures become warnings.
    pub fn run(&self, mode: Mode) -> Result<MigrationReport> {
        let mut warnings = Vec::new();
        let config_path = self.config_path();

        let package = match Manifest::load(&self.root) {
            Ok(manifest) => manifest.package_name().map(str::to_string),
            Err(e) => {
                warnings.push(self.warning(
                    &self.root.join(MANIFEST_FILENAME),
                    None,
                    WarningKind::UnreadableFile,
                    e.to_string(),
                ));
                None
            }
        };

        let walker = SourceWalker::new()
            .with_excludes(&self.settings.exclude)?
            .with_skip_file(&config_path);
        let paths = walker.walk(&self.root)?;
        info!("Found {} Dart files", paths.len());

        let loaded: Vec<std::result::Result<SourceFile, (PathBuf, String)>> = paths
            .par_iter()
            .map(|path| {
                fs::read_to_string(path)
                    .map_err(Into::into)
                    .and_then(|source| SourceFile::parse(path, source))
                    .map_err(|e| (path.clone(), e.to_string()))
            })
            .collect();
        let mut files = Vec::with_capacity(loaded.len());
        for result in loaded {
            match result {
                Ok(file) => files.push(file),
                Err((path, message)) => {
                    warnings.push(self.warning(&path, None, WarningKind::UnreadableFile, message))
                }
            }
        }

        let index = ProjectIndex::new(&self.root, package.as_deref(), files);
        let helpers = discover_helpers(&index);
        info!("Discovered {} navigation helpers", helpers.len());

        let records = classify_all(&index, &helpers);
        info!("Classified {} navigation calls", records.len());
        for record in &records {
            let Some(location) = &record.location else {
                continue;
            };
            let expression = record.destination_expr.as_deref().unwrap_or("?");
            let message = match &record.destination {
                Destination::Unresolved => {
                    format!("{} destination `{}` could not be resolved", record.kind, expression)
                }
                Destination::Invalid(value) => format!(
                    "{} destination `{}` resolves to '{}', which is not a plain route path",
                    record.kind, expression, value
                ),
                _ => continue,
            };
            warnings.push(self.warning(
                &location.file,
                Some(location.line),
                WarningKind::UnresolvedDestination,
                message,
            ));
        }

        // Existing configuration
        let mut config_unreadable = false;
        let existing = if config_path.is_file() {
            match fs::read_to_string(&config_path)
                .map_err(Into::into)
                .and_then(|text| SourceFile::parse(&config_path, text))
            {
                Ok(file) => Some(file),
                Err(e) => {
                    config_unreadable = true;
                    warnings.push(self.warning(&config_path, None, WarningKind::ConfigRead, e.to_string()));
                    None
                }
            }
        } else {
            None
        };
        let imported = existing.as_ref().map(|file| read_config(file, &index));
        for route in imported.iter().flat_map(|config| &config.opaque) {
            let what = if route.path_expr.is_empty() {
                "has no path".to_string()
            } else {
                format!("path `{}` is not a constant", route.path_expr)
            };
            warnings.push(self.warning(
                &config_path,
                Some(route.line),
                WarningKind::ConfigRead,
                format!("route {}, kept as written without reading its nested routes", what),
            ));
        }

        let imported_records = imported.as_ref().map_or(&[][..], |c| c.records.as_slice());
        let outcome = merge(&records, imported_records);
        info!(
            "Merged {} routes ({} matched, {} retained)",
            outcome.table.len(),
            outcome.matched,
            outcome.retained
        );

        let tree = RouteTree::build(&outcome.table);
        let emitter = Emitter::new(&self.root, &config_path)
            .with_package(package.as_deref())
            .with_router_name(&self.settings.router_name)
            .with_marker(&self.settings.marker);
        let emission = emitter.emit(&tree, existing.as_ref().zip(imported.as_ref()));
        if emission.fell_back {
            warnings.push(self.warning(
                &config_path,
                None,
                WarningKind::MissingRouteList,
                "no GoRouter routes list found, regenerated the whole file".to_string(),
            ));
        }
        let config_changed =
            !config_unreadable && existing.as_ref().map(|f| f.source.as_str()) != Some(emission.text.as_str());

        // Call sites
        let mut by_file: BTreeMap<&Path, Vec<&CallRecord>> = BTreeMap::new();
        for record in &records {
            if let Some(location) = &record.location {
                by_file.entry(location.file.as_path()).or_default().push(record);
            }
        }
        let rewriter = Rewriter::new(&self.settings.marker);
        let rewrites: Vec<(&Path, &Vec<&CallRecord>, Option<FileRewrite>)> = by_file
            .par_iter()
            .map(|(path, records)| {
                let rewrite = index
                    .file(path)
                    .map(|file| rewriter.rewrite(&file.source, records));
                (*path, records, rewrite)
            })
            .collect();

        let mut file_reports = Vec::new();
        let mut pending_writes = Vec::new();
        for (path, records, rewrite) in rewrites {
            let Some(rewrite) = rewrite else {
                continue;
            };
            for line in &rewrite.already_marked {
                warnings.push(self.warning(
                    path,
                    Some(*line),
                    WarningKind::MarkerPresent,
                    "call is still waiting for manual migration".to_string(),
                ));
            }
            file_reports.push(FileReport {
                path: self.relative(path),
                calls: records.iter().map(|r| CallEntry::from_record(r)).collect(),
                diffs: rewrite.diffs,
            });
            let unchanged = index.file(path).is_some_and(|f| f.source == rewrite.text);
            if !unchanged {
                pending_writes.push((path.to_path_buf(), rewrite.text));
            }
        }

        if mode == Mode::Apply {
            if config_changed {
                if let Err(e) = write_file(&config_path, &emission.text) {
                    warnings.push(self.warning(&config_path, None, WarningKind::WriteFailed, e.to_string()));
                } else {
                    info!("Wrote {}", config_path.display());
                }
            }
            for (path, text) in &pending_writes {
                match write_file(path, text) {
                    Ok(()) => debug!("Rewrote {}", path.display()),
                    Err(e) => {
                        warnings.push(self.warning(path, None, WarningKind::WriteFailed, e.to_string()))
                    }
                }
            }
            info!("Rewrote {} source files", pending_writes.len());
        }

        Ok(MigrationReport {
            mode,
            config_path: self.relative(&config_path),
            emission: emission.mode,
            files: file_reports,
            routes: outcome.table.keys().map(|p| p.to_string()).collect(),
            retained_routes: outcome.retained,
            config_changed,
            warnings,
        })
    }

    fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root).unwrap_or(path).to_path_buf()
    }

    fn warning(&self, file: &Path, line: Option<usize>, kind: WarningKind, message: String) -> Warning {
        warn!("{}: {}", file.display(), message);
        let warning = Warning::new(self.relative(file), kind, message);
        match line {
            Some(line) => warning.at_line(line),
            None => warning,
        }
    }
}

fn write_file(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)?;
    Ok(())
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
    fn test_plan_reports_without_writing() {
        let dir = TempDir::new().unwrap();
        create_file(dir.path(), "pubspec.yaml", "name: shop\n");
        create_file(
            dir.path(),
            "lib/main.dart",
            "void f(BuildContext context) {\n  Navigator.pushNamed(context, '/cart');\n}\n",
        );

        let migrator = Migrator::new(dir.path(), Settings::default()).unwrap();
        let report = migrator.run(Mode::Plan).unwrap();
        assert_eq!(report.routes, vec!["/cart"]);
        assert!(report.config_changed);
        assert_eq!(report.files.len(), 1);
        assert_eq!(report.files[0].path, PathBuf::from("lib/main.dart"));
        assert_eq!(report.files[0].diffs.len(), 1);
        assert!(!dir.path().join("lib/router/app_router.dart").exists());
        assert!(fs::read_to_string(dir.path().join("lib/main.dart"))
            .unwrap()
            .contains("Navigator.pushNamed"));
    }

    #[test]
    fn test_unresolved_destination_is_warned() {
        let dir = TempDir::new().unwrap();
        create_file(
            dir.path(),
            "lib/main.dart",
            "void f(BuildContext context, bool a) {\n  final r = a ? '/x' : '/y';\n  Navigator.pushNamed(context, r);\n}\n",
        );
        let report = Migrator::new(dir.path(), Settings::default())
            .unwrap()
            .run(Mode::Plan)
            .unwrap();
        assert!(report.routes.is_empty());
        let warning = &report.warnings[0];
        assert_eq!(warning.kind, WarningKind::UnresolvedDestination);
        assert_eq!(warning.line, Some(3));
        assert_eq!(report.files[0].calls[0].expression, "r");
    }

    #[test]
    fn test_constant_that_is_not_a_path_is_reported_distinctly() {
        let dir = TempDir::new().unwrap();
        create_file(
            dir.path(),
            "lib/main.dart",
            "const search = '/search?q=1';\nvoid f(BuildContext context) {\n  Navigator.pushNamed(context, search);\n}\n",
        );
        let report = Migrator::new(dir.path(), Settings::default())
            .unwrap()
            .run(Mode::Plan)
            .unwrap();
        assert!(report.routes.is_empty());
        let warning = &report.warnings[0];
        assert_eq!(warning.kind, WarningKind::UnresolvedDestination);
        assert_eq!(warning.line, Some(3));
        assert!(warning.message.contains("resolves to '/search?q=1'"));
        assert!(!warning.message.contains("could not be resolved"));
    }

    #[test]
    fn test_missing_root() {
        assert!(Migrator::new("/definitely/not/here", Settings::default()).is_err());
    }
}
