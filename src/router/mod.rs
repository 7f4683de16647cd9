//! Declarative route configuration: reading, merging, tree building and emission.

pub mod emitter;
pub mod merge;
pub mod reader;
pub mod tree;

pub use emitter::{EmitMode, Emission, Emitter};
pub use merge::{merge, MergeOutcome};
pub use reader::{read_config, ImportedConfig};
pub use tree::{RouteNode, RouteTree};
