//! Call-site rewriting: replaces imperative navigation calls with their
//! `go_router` equivalents, or tags them for manual migration.

use tracing::debug;

use crate::edit::{apply_edits, insert_imports, single_quoted, Edit};
use crate::model::{CallRecord, Destination, OperationKind, Payload};
use crate::report::DiffEntry;
use crate::router::emitter::GO_ROUTER_IMPORT;
use crate::syntax::Span;

/// Outcome of rewriting one file.
#[derive(Debug, Clone, Default)]
pub struct FileRewrite {
    pub text: String,
    pub diffs: Vec<DiffEntry>,
    /// Calls left alone because they already carry a marker.
    pub already_marked: Vec<usize>,
}

impl FileRewrite {
    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty()
    }
}

/// One planned replacement, before composition.
#[derive(Debug, Clone)]
struct Planned {
    span: Span,
    line: usize,
    original: String,
    replacement: String,
    declarative: bool,
}

pub struct Rewriter<'a> {
    marker: &'a str,
}

impl<'a> Rewriter<'a> {
    pub fn new(marker: &'a str) -> Self {
        Self { marker }
    }

    /// Rewrites `source` given the fresh records found in it.
    pub fn rewrite(&self, source: &str, records: &[&CallRecord]) -> FileRewrite {
        let mut planned = Vec::new();
        let mut already_marked = Vec::new();

        for record in records {
            let Some(location) = &record.location else {
                continue;
            };
            let span = Span::new(location.offset, location.offset + location.length);
            let original = record.original_text().to_string();
            match self.declarative_call(record) {
                Some(replacement) => planned.push(Planned {
                    span,
                    line: location.line,
                    original,
                    replacement,
                    declarative: true,
                }),
                None => {
                    let tag = self.marker_comment(record.kind);
                    if source[..span.start.min(source.len())].trim_end().ends_with(&tag) {
                        already_marked.push(location.line);
                        continue;
                    }
                    planned.push(Planned {
                        span,
                        line: location.line,
                        replacement: format!("{} {}", tag, original),
                        original,
                        declarative: false,
                    });
                }
            }
        }

        let composed = compose(planned);
        let declarative = composed.iter().any(|p| p.declarative);
        let edits: Vec<Edit> = composed
            .iter()
            .map(|p| Edit::new(p.span, p.replacement.clone()))
            .collect();

        let mut text = apply_edits(source, &edits);
        if declarative {
            text = insert_imports(&text, &[GO_ROUTER_IMPORT.to_string()]).unwrap_or(text);
        }
        debug!("Planned {} call-site edits", composed.len());

        let mut diffs: Vec<DiffEntry> = composed
            .into_iter()
            .map(|p| DiffEntry {
                line: p.line,
                original: p.original,
                replacement: p.replacement,
            })
            .collect();
        diffs.sort_by_key(|d| d.line);

        FileRewrite {
            text,
            diffs,
            already_marked,
        }
    }

    fn marker_comment(&self, kind: OperationKind) -> String {
        format!("/* {}({}) */", self.marker, kind)
    }

    /// Declarative replacement for a record, or `None` when it needs a
    /// human.
    fn declarative_call(&self, record: &CallRecord) -> Option<String> {
        let context = record.context.as_deref()?;
        match record.kind {
            OperationKind::Pop => Some(match &record.result {
                Some(result) => format!("{}.pop({})", context, result),
                None => format!("{}.pop()", context),
            }),
            OperationKind::NavigateByName | OperationKind::NavigateByWidget => {
                let type_args = record.type_args.as_deref().unwrap_or("");
                let args = location_args(record)?;
                Some(format!("{}.push{}({})", context, type_args, args))
            }
            OperationKind::ReplaceByName | OperationKind::ReplaceByWidget => {
                let type_args = record.type_args.as_deref().map(result_type_arg).unwrap_or_default();
                let args = location_args(record)?;
                Some(format!("{}.pushReplacement{}({})", context, type_args, args))
            }
            // `go` returns nothing, so the result type is dropped.
            OperationKind::NavigateAndClear => {
                Some(format!("{}.go({})", context, location_args(record)?))
            }
            OperationKind::ConditionalPop
            | OperationKind::MaybePop
            | OperationKind::PopThenNavigateByName
            | OperationKind::Unresolved
            | OperationKind::Imported => None,
        }
    }
}

/// `'<path>'` plus the `extra:` argument, when the destination is resolved.
fn location_args(record: &CallRecord) -> Option<String> {
    let Destination::Path(path) = &record.destination else {
        return None;
    };
    if record.kind.is_by_widget() && record.target.is_none() {
        return None;
    }
    let location = single_quoted(path.as_str());
    let extra = match &record.payload {
        Payload::None => return Some(location),
        Payload::Single(expr) => expr.clone(),
        Payload::Fields(fields) => {
            let entries: Vec<String> = fields
                .iter()
                .map(|(name, value)| format!("{}: {}", single_quoted(name), value))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
    };
    Some(format!("{}, extra: {}", location, extra))
}

/// Keeps the first of `<T, TO>`: `pushReplacement` only takes the result type.
fn result_type_arg(type_args: &str) -> String {
    let inner = type_args
        .trim()
        .strip_prefix('<')
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(type_args);
    let mut depth = 0usize;
    for (at, c) in inner.char_indices() {
        match c {
            '<' | '(' => depth += 1,
            '>' | ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return format!("<{}>", inner[..at].trim()),
            _ => {}
        }
    }
    format!("<{}>", inner.trim())
}

/// Folds edits nested inside other edits into their enclosing replacement,
/// innermost first, so that the remaining edits never overlap.
fn compose(mut planned: Vec<Planned>) -> Vec<Planned> {
    planned.sort_by_key(|p| p.span.len());
    let mut done: Vec<Planned> = Vec::new();
    for mut outer in planned {
        let (inner, rest): (Vec<Planned>, Vec<Planned>) = done
            .into_iter()
            .partition(|p| outer.span.contains(&p.span) && outer.span != p.span);
        let mut inner = inner;
        // Later text first, so identical inner calls map in order.
        inner.sort_by_key(|p| std::cmp::Reverse(p.span.start));
        for p in inner {
            let relative = p.span.start - outer.span.start;
            if outer.original.get(relative..relative + p.span.len()) == Some(p.original.as_str()) {
                if let Some(at) = find_nth_occurrence(&outer, &p, relative) {
                    outer.replacement.replace_range(at..at + p.original.len(), &p.replacement);
                }
            }
            outer.declarative |= p.declarative;
        }
        done = rest;
        done.push(outer);
    }
    done
}

/// Position of the inner call's text in the outer replacement: the same
/// occurrence index it has in the outer original.
fn find_nth_occurrence(outer: &Planned, inner: &Planned, relative: usize) -> Option<usize> {
    let nth = outer.original[..relative].matches(inner.original.as_str()).count();
    outer
        .replacement
        .match_indices(inner.original.as_str())
        .nth(nth)
        .map(|(at, _)| at)
}
