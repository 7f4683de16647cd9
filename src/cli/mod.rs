mod commands;

pub use commands::{apply, plan, Cli, Commands};
