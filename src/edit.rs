//! Text edits over a source buffer.

use serde::Serialize;

use crate::error::Result;
use crate::syntax::{dart, SourceFile, Span};

/// Replace `span` of the original text with `replacement`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edit {
    pub span: Span,
    pub replacement: String,
}

impl Edit {
    pub fn new(span: Span, replacement: impl Into<String>) -> Self {
        Self {
            span,
            replacement: replacement.into(),
        }
    }
}

/// Applies non-overlapping edits to `source`.
///
/// Edits are spliced in descending start order: a splice only shifts text
/// after it, so the offsets of the edits still to come stay valid.
pub fn apply_edits(source: &str, edits: &[Edit]) -> String {
    let mut ordered: Vec<&Edit> = edits.iter().collect();
    ordered.sort_by(|a, b| b.span.start.cmp(&a.span.start));
    let mut text = source.to_string();
    for edit in ordered {
        let end = edit.span.end.min(text.len());
        let start = edit.span.start.min(end);
        text.replace_range(start..end, &edit.replacement);
    }
    text
}

/// Single-quoted Dart string literal for `text`.
pub fn single_quoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        if matches!(c, '\\' | '\'' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

/// Inserts `import '<uri>';` lines for every URI the source does not import
/// yet, after the last import directive or at the start of the file.
pub fn insert_imports(source: &str, uris: &[String]) -> Result<String> {
    let file = SourceFile::parse("", source)?;
    let imports = dart::imports(&file);
    let missing: Vec<&String> = uris
        .iter()
        .filter(|uri| !imports.iter().any(|i| &&i.uri == uri))
        .collect();
    if missing.is_empty() {
        return Ok(source.to_string());
    }

    let lines: Vec<String> = missing.iter().map(|uri| format!("import '{}';", uri)).collect();
    let text = match imports.iter().map(|i| i.node.end_byte()).max() {
        Some(end) => {
            let mut text = source.to_string();
            text.insert_str(end, &format!("\n{}", lines.join("\n")));
            text
        }
        None => format!("{}\n\n{}", lines.join("\n"), source),
    };
    Ok(text)
}
