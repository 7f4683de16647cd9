//! Navigation facts shared by every stage of a migration.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, Result};

/// Navigation operation carried by a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    NavigateByName,
    NavigateByWidget,
    ReplaceByName,
    ReplaceByWidget,
    Pop,
    ConditionalPop,
    MaybePop,
    PopThenNavigateByName,
    NavigateAndClear,
    Unresolved,
    /// Read back from an existing route configuration.
    Imported,
}

impl OperationKind {
    /// Maps a `Navigator` method name to its operation.
    pub fn from_method(name: &str) -> Option<Self> {
        Some(match name {
            "pushNamed" => OperationKind::NavigateByName,
            "push" => OperationKind::NavigateByWidget,
            "pushReplacementNamed" => OperationKind::ReplaceByName,
            "pushReplacement" => OperationKind::ReplaceByWidget,
            "pop" => OperationKind::Pop,
            "popUntil" => OperationKind::ConditionalPop,
            "maybePop" => OperationKind::MaybePop,
            "popAndPushNamed" => OperationKind::PopThenNavigateByName,
            "pushNamedAndRemoveUntil" => OperationKind::NavigateAndClear,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::NavigateByName => "navigate-by-name",
            OperationKind::NavigateByWidget => "navigate-by-widget",
            OperationKind::ReplaceByName => "replace-by-name",
            OperationKind::ReplaceByWidget => "replace-by-widget",
            OperationKind::Pop => "pop",
            OperationKind::ConditionalPop => "conditional-pop",
            OperationKind::MaybePop => "maybe-pop",
            OperationKind::PopThenNavigateByName => "pop-then-navigate-by-name",
            OperationKind::NavigateAndClear => "navigate-and-clear",
            OperationKind::Unresolved => "unresolved",
            OperationKind::Imported => "imported",
        }
    }

    /// Kinds whose destination is a route name argument.
    pub fn is_by_name(&self) -> bool {
        matches!(
            self,
            OperationKind::NavigateByName
                | OperationKind::ReplaceByName
                | OperationKind::PopThenNavigateByName
                | OperationKind::NavigateAndClear
        )
    }

    pub fn is_by_widget(&self) -> bool {
        matches!(
            self,
            OperationKind::NavigateByWidget | OperationKind::ReplaceByWidget
        )
    }

    pub fn is_pop(&self) -> bool {
        matches!(
            self,
            OperationKind::Pop | OperationKind::ConditionalPop | OperationKind::MaybePop
        )
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Absolute, `/`-separated route path without doubled or trailing separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoutePath(String);

impl RoutePath {
    pub fn root() -> Self {
        RoutePath("/".to_string())
    }

    /// Normalizes a raw route name: a leading `/` is added when missing and
    /// empty segments are dropped.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(MigrateError::InvalidPath("empty route name".to_string()));
        }
        if raw.chars().any(|c| c.is_whitespace() || c == '?' || c == '#') {
            return Err(MigrateError::InvalidPath(raw.to_string()));
        }
        let segments: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
        Ok(RoutePath(format!("/{}", segments.join("/"))))
    }

    /// `/` followed by the kebab-cased type name.
    pub fn from_type_name(name: &str) -> Result<Self> {
        Self::parse(&kebab_case(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Appends a (possibly multi-segment) child path.
    pub fn join(&self, child: &str) -> Result<Self> {
        Self::parse(&format!("{}/{}", self.0, child))
    }
}

impl fmt::Display for RoutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lower kebab case: a `-` before every non-initial upper-case letter,
/// then everything lower-cased. Leading underscores are dropped.
pub fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.trim_start_matches('_').chars().enumerate() {
        if i > 0 && c.is_uppercase() {
            out.push('-');
        }
        out.extend(c.to_lowercase());
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "path", rename_all = "kebab-case")]
pub enum Destination {
    Path(RoutePath),
    Unresolved,
    /// Resolved to a constant that is not a bare route path, such as one
    /// carrying a query or fragment.
    Invalid(String),
    /// Pops carry no destination.
    NotApplicable,
}

impl Destination {
    pub fn path(&self) -> Option<&RoutePath> {
        match self {
            Destination::Path(path) => Some(path),
            _ => None,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Path(path) => write!(f, "{}", path),
            Destination::Unresolved => f.write_str("<unresolved>"),
            Destination::Invalid(value) => write!(f, "<invalid '{}'>", value),
            Destination::NotApplicable => f.write_str("-"),
        }
    }
}

/// Arguments handed to the destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "shape", content = "value", rename_all = "kebab-case")]
pub enum Payload {
    #[default]
    None,
    /// One expression, by source text.
    Single(String),
    /// Named fields, by name and source text.
    Fields(Vec<(String, String)>),
}

impl Payload {
    pub fn is_none(&self) -> bool {
        matches!(self, Payload::None)
    }
}

/// Widget rendered for a destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    pub name: String,
    /// Declaring file, when it is part of the project.
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub file: PathBuf,
    /// 1-based.
    pub line: usize,
    pub offset: usize,
    pub length: usize,
}

/// Original text behind a record.
///
/// A `Declaration` is emitted as-is; it is never regenerated from the
/// structured fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "kebab-case")]
pub enum SourceText {
    Call { text: String },
    Declaration {
        text: String,
        /// Read from a parent route's `routes` list.
        nested: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallRecord {
    pub location: Option<SourceLocation>,
    pub kind: OperationKind,
    pub destination: Destination,
    /// Source text of the destination argument.
    pub destination_expr: Option<String>,
    pub target: Option<Target>,
    pub type_args: Option<String>,
    pub payload: Payload,
    /// Declared type of a single payload, when the target's constructor
    /// names one.
    pub payload_type: Option<String>,
    /// The payload is a map literal.
    pub map_literal: bool,
    pub result: Option<String>,
    /// Source text of the `BuildContext` the call navigates from.
    pub context: Option<String>,
    pub source_text: SourceText,
}

impl CallRecord {
    /// Verbatim declaration text, for records read from a configuration.
    pub fn verbatim(&self) -> Option<&str> {
        match &self.source_text {
            SourceText::Declaration { text, .. } => Some(text),
            SourceText::Call { .. } => None,
        }
    }

    pub fn is_nested_declaration(&self) -> bool {
        matches!(self.source_text, SourceText::Declaration { nested: true, .. })
    }

    pub fn is_imported(&self) -> bool {
        self.kind == OperationKind::Imported
    }

    pub fn original_text(&self) -> &str {
        match &self.source_text {
            SourceText::Call { text } | SourceText::Declaration { text, .. } => text,
        }
    }
}
