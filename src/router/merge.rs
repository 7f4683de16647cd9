//! Merges freshly discovered call sites with an existing configuration.

use std::collections::BTreeMap;

use crate::model::{CallRecord, RoutePath};

/// Canonical destination table plus merge statistics.
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub table: BTreeMap<RoutePath, CallRecord>,
    /// Imported destinations no current call site refers to.
    pub retained: usize,
    /// Fresh destinations that matched an imported one.
    pub matched: usize,
}

/// One record per destination; later records win. Records without a
/// resolved path are dropped.
fn by_destination<'r>(records: impl IntoIterator<Item = &'r CallRecord>) -> BTreeMap<RoutePath, &'r CallRecord> {
    let mut table = BTreeMap::new();
    for record in records {
        if let Some(path) = record.destination.path() {
            table.insert(path.clone(), record);
        }
    }
    table
}

/// Builds the canonical table.
///
/// A fresh record that matches an imported destination keeps its own fields
/// but takes the imported declaration text, and the imported target when it
/// has none. Imported destinations without a fresh match are kept as-is.
pub fn merge(fresh: &[CallRecord], imported: &[CallRecord]) -> MergeOutcome {
    let fresh = by_destination(fresh);
    let mut imported = by_destination(imported);
    let mut outcome = MergeOutcome::default();

    for (path, record) in fresh {
        let merged = match imported.remove(&path) {
            Some(old) => {
                outcome.matched += 1;
                let mut merged = record.clone();
                if merged.target.is_none() {
                    merged.target = old.target.clone();
                }
                merged.source_text = old.source_text.clone();
                merged
            }
            None => record.clone(),
        };
        outcome.table.insert(path, merged);
    }

    outcome.retained = imported.len();
    for (path, record) in imported {
        outcome.table.insert(path, record.clone());
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Destination, OperationKind, Payload, SourceText, Target};

    fn record(kind: OperationKind, path: Option<&str>, text: SourceText) -> CallRecord {
        CallRecord {
            location: None,
            kind,
            destination: match path {
                Some(p) => Destination::Path(RoutePath::parse(p).unwrap()),
                None => Destination::Unresolved,
            },
            destination_expr: None,
            target: None,
            type_args: None,
            payload: Payload::None,
            payload_type: None,
            map_literal: false,
            result: None,
            context: None,
            source_text: text,
        }
    }

    fn fresh(path: Option<&str>, call: &str) -> CallRecord {
        record(
            OperationKind::NavigateByName,
            path,
            SourceText::Call {
                text: call.to_string(),
            },
        )
    }

    fn imported(path: &str, text: &str, target: &str) -> CallRecord {
        let mut r = record(
            OperationKind::Imported,
            Some(path),
            SourceText::Declaration {
                text: text.to_string(),
                nested: false,
            },
        );
        r.target = Some(Target {
            name: target.to_string(),
            file: None,
        });
        r
    }

    #[test]
    fn test_fresh_duplicates_last_wins() {
        let a = fresh(Some("/a"), "first");
        let mut b = fresh(Some("/a"), "second");
        b.payload = Payload::Single("x".to_string());
        let outcome = merge(&[a, b], &[]);
        assert_eq!(outcome.table.len(), 1);
        assert_eq!(outcome.table.values().next().unwrap().payload, Payload::Single("x".into()));
    }

    #[test]
    fn test_matched_takes_imported_text_and_target() {
        let mut call = fresh(Some("/profile"), "Navigator.pushNamed(c, '/profile')");
        call.payload = Payload::Single("user".to_string());
        let old = imported("/profile", "GoRoute(path: '/profile', builder: custom)", "ProfilePage");

        let outcome = merge(&[call], &[old]);
        let merged = &outcome.table[&RoutePath::parse("/profile").unwrap()];
        assert_eq!(merged.kind, OperationKind::NavigateByName);
        assert_eq!(merged.payload, Payload::Single("user".to_string()));
        assert_eq!(merged.verbatim(), Some("GoRoute(path: '/profile', builder: custom)"));
        assert_eq!(merged.target.as_ref().unwrap().name, "ProfilePage");
        assert_eq!((outcome.matched, outcome.retained), (1, 0));
    }

    #[test]
    fn test_fresh_target_wins_over_imported() {
        let mut call = fresh(Some("/s"), "push");
        call.target = Some(Target {
            name: "NewScreen".to_string(),
            file: None,
        });
        let outcome = merge(&[call], &[imported("/s", "GoRoute(...)", "OldScreen")]);
        assert_eq!(outcome.table.values().next().unwrap().target.as_ref().unwrap().name, "NewScreen");
    }

    #[test]
    fn test_unmatched_imported_retained_and_unresolved_excluded() {
        let outcome = merge(
            &[fresh(None, "Navigator.pushNamed(c, route)"), fresh(Some("/new"), "x")],
            &[imported("/legacy", "GoRoute(path: '/legacy')", "LegacyPage")],
        );
        let keys: Vec<_> = outcome.table.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["/legacy", "/new"]);
        assert_eq!(outcome.retained, 1);
        assert_eq!(
            outcome.table[&RoutePath::parse("/legacy").unwrap()].verbatim(),
            Some("GoRoute(path: '/legacy')")
        );
    }

    #[test]
    fn test_every_destination_appears_once() {
        let fresh_records = vec![fresh(Some("/a"), "1"), fresh(Some("/b"), "2"), fresh(Some("/a"), "3")];
        let imported_records = vec![imported("/b", "B", "B"), imported("/c", "C", "C")];
        let outcome = merge(&fresh_records, &imported_records);
        let keys: Vec<_> = outcome.table.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["/a", "/b", "/c"]);
    }
}
