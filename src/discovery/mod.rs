//! Project-wide discovery: helpers first, then call sites.
//!
//! Both phases run file-parallel. Classification never starts before helper
//! discovery has finished for every file, since a partial helper set
//! silently misclassifies indirect calls.

pub mod classifier;
pub mod helpers;

use rayon::prelude::*;
use tracing::debug;

use crate::model::CallRecord;
use crate::syntax::ProjectIndex;

pub use classifier::Classifier;
pub use helpers::{HelperDefinition, HelperSet, ParamRef};

/// Upper bound on helper-of-helper rounds.
const MAX_HELPER_ROUNDS: usize = 8;

/// Discovers helpers to a fixed point: each round re-inspects every
/// function with the previous round's helpers visible, so wrappers of
/// wrappers are found.
pub fn discover_helpers(index: &ProjectIndex) -> HelperSet {
    let files: Vec<_> = index.files().collect();
    let mut helpers = HelperSet::new();

    for round in 1..=MAX_HELPER_ROUNDS {
        let found: Vec<HelperDefinition> = files
            .par_iter()
            .flat_map_iter(|file| helpers::discover_in_file(index, &helpers, file))
            .collect();
        let next: HelperSet = found
            .into_iter()
            .map(|helper| (helper.handle.clone(), helper))
            .collect();

        debug!("Helper round {}: {} helpers", round, next.len());
        if next == helpers {
            break;
        }
        helpers = next;
    }

    helpers
}

/// Classifies every file against the complete helper set. Records come back
/// ordered by file, then offset.
pub fn classify_all(index: &ProjectIndex, helpers: &HelperSet) -> Vec<CallRecord> {
    let files: Vec<_> = index.files().collect();
    let per_file: Vec<Vec<CallRecord>> = files
        .par_iter()
        .map(|file| Classifier::new(index, helpers, file).classify())
        .collect();
    per_file.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OperationKind;
    use crate::syntax::SourceFile;
    use std::path::Path;

    fn index(files: &[(&str, &str)]) -> ProjectIndex {
        let files = files
            .iter()
            .map(|(path, source)| SourceFile::parse(Path::new("/app").join(path), *source).unwrap())
            .collect();
        ProjectIndex::new(Path::new("/app"), Some("app"), files)
    }

    #[test]
    fn test_helper_in_other_file_is_classified() {
        let index = index(&[
            (
                "lib/nav.dart",
                "void goTo(BuildContext context, String route) {\n  Navigator.pushNamed(context, route);\n}\n",
            ),
            (
                "lib/home.dart",
                "import 'package:app/nav.dart';\nvoid tap(BuildContext context) => goTo(context, '/cart');\n",
            ),
        ]);
        let helpers = discover_helpers(&index);
        assert_eq!(helpers.len(), 1);

        let records = classify_all(&index, &helpers);
        let cart: Vec<_> = records
            .iter()
            .filter(|r| r.destination.path().map(|p| p.as_str()) == Some("/cart"))
            .collect();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart[0].kind, OperationKind::NavigateByName);
        assert_eq!(cart[0].context.as_deref(), Some("context"));
        assert_eq!(
            cart[0].location.as_ref().map(|l| l.file.as_path()),
            Some(Path::new("/app/lib/home.dart"))
        );
    }

    #[test]
    fn test_same_name_in_other_file_is_not_a_helper_call() {
        let index = index(&[
            ("lib/nav.dart", "void goTo(BuildContext c, String r) => Navigator.pushNamed(c, r);\n"),
            (
                "lib/other.dart",
                "void goTo(BuildContext c, String r) => print(r);\nvoid tap(BuildContext c) => goTo(c, '/nope');\n",
            ),
        ]);
        let helpers = discover_helpers(&index);
        let records = classify_all(&index, &helpers);
        assert!(records
            .iter()
            .all(|r| r.destination.path().map(|p| p.as_str()) != Some("/nope")));
    }

    #[test]
    fn test_transitive_helpers_reach_fixed_point() {
        let index = index(&[(
            "lib/nav.dart",
            r#"
void base(BuildContext c, String r) => Navigator.pushNamed(c, r);
void middle(BuildContext c, String r) => base(c, r);
void outer(String r, BuildContext c) => middle(c, r);
void tap(BuildContext c) => outer('/deep', c);
"#,
        )]);
        let helpers = discover_helpers(&index);
        assert_eq!(helpers.len(), 3);
        let records = classify_all(&index, &helpers);
        let deep = records
            .iter()
            .find(|r| r.destination.path().map(|p| p.as_str()) == Some("/deep"))
            .expect("resolved through two wrappers");
        assert_eq!(deep.context.as_deref(), Some("c"));
    }
}
