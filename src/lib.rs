pub mod discovery;
pub mod edit;
pub mod error;
pub mod migration;
pub mod model;
pub mod project;
pub mod report;
pub mod rewrite;
pub mod router;
pub mod settings;
pub mod syntax;

pub use discovery::{classify_all, discover_helpers, Classifier, HelperDefinition, HelperSet};
pub use edit::{apply_edits, insert_imports, Edit};
pub use error::{MigrateError, Result};
pub use migration::{Migrator, Mode};
pub use model::{CallRecord, Destination, OperationKind, Payload, RoutePath, SourceText, Target};
pub use project::{Manifest, SourceWalker};
pub use report::{MigrationReport, Warning, WarningKind};
pub use rewrite::{FileRewrite, Rewriter};
pub use router::{merge, read_config, EmitMode, Emitter, MergeOutcome, RouteTree};
pub use settings::{Overrides, Settings};
pub use syntax::{ProjectIndex, Resolver, SourceFile};
