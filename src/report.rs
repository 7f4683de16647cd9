//! Migration report: what was found, what would change, what went wrong.

use std::fmt::Write as _;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::Result;
use crate::model::{CallRecord, OperationKind};
use crate::router::EmitMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarningKind {
    UnresolvedDestination,
    UnreadableFile,
    MissingRouteList,
    ConfigRead,
    MarkerPresent,
    WriteFailed,
}

impl WarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningKind::UnresolvedDestination => "unresolved-destination",
            WarningKind::UnreadableFile => "unreadable-file",
            WarningKind::MissingRouteList => "missing-route-list",
            WarningKind::ConfigRead => "config-read",
            WarningKind::MarkerPresent => "marker-present",
            WarningKind::WriteFailed => "write-failed",
        }
    }
}

/// Non-fatal condition tied to a file and, where known, a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub file: PathBuf,
    pub line: Option<usize>,
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn new(file: impl Into<PathBuf>, kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: None,
            kind,
            message: message.into(),
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallEntry {
    pub line: usize,
    pub kind: OperationKind,
    /// Resolved path, `<unresolved>` or `-` for pops.
    pub destination: String,
    pub expression: String,
}

impl CallEntry {
    pub fn from_record(record: &CallRecord) -> Self {
        Self {
            line: record.location.as_ref().map_or(0, |l| l.line),
            kind: record.kind,
            destination: record.destination.to_string(),
            expression: record
                .destination_expr
                .clone()
                .unwrap_or_else(|| record.original_text().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffEntry {
    pub line: usize,
    pub original: String,
    pub replacement: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub calls: Vec<CallEntry>,
    pub diffs: Vec<DiffEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Plan,
    Apply,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Plan => "plan",
            Mode::Apply => "apply",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub mode: Mode,
    pub config_path: PathBuf,
    pub emission: EmitMode,
    pub files: Vec<FileReport>,
    /// Destinations in the emitted configuration.
    pub routes: Vec<String>,
    /// Destinations kept from the existing configuration that no call site refers to.
    pub retained_routes: usize,
    /// The configuration file differs (or would differ) from what is on disk.
    pub config_changed: bool,
    pub warnings: Vec<Warning>,
}

impl MigrationReport {
    pub fn call_count(&self) -> usize {
        self.files.iter().map(|f| f.calls.len()).sum()
    }

    pub fn diff_count(&self) -> usize {
        self.files.iter().map(|f| f.diffs.len()).sum()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Mode: {}  Config: {} ({}{})",
            self.mode.as_str(),
            self.config_path.display(),
            self.emission.as_str(),
            if self.config_changed { ", changed" } else { "" }
        );

        for file in &self.files {
            if file.calls.is_empty() && file.diffs.is_empty() {
                continue;
            }
            let _ = writeln!(out, "\n{}", file.path.display());
            for call in &file.calls {
                let _ = writeln!(
                    out,
                    "  {:>5}  {:<26} {}",
                    call.line,
                    call.kind.as_str(),
                    call.destination
                );
            }
            for diff in &file.diffs {
                let _ = writeln!(out, "  @@ line {}", diff.line);
                for line in diff.original.lines() {
                    let _ = writeln!(out, "  - {}", line);
                }
                for line in diff.replacement.lines() {
                    let _ = writeln!(out, "  + {}", line);
                }
            }
        }

        let _ = writeln!(
            out,
            "\n{} call sites, {} rewrites, {} routes ({} retained without call sites)",
            self.call_count(),
            self.diff_count(),
            self.routes.len(),
            self.retained_routes
        );

        if !self.warnings.is_empty() {
            let _ = writeln!(out, "\nWarnings:");
            for warning in &self.warnings {
                let location = match warning.line {
                    Some(line) => format!("{}:{}", warning.file.display(), line),
                    None => warning.file.display().to_string(),
                };
                let _ = writeln!(
                    out,
                    "  [{}] {}: {}",
                    warning.kind.as_str(),
                    location,
                    warning.message
                );
            }
        }
        out
    }
}
