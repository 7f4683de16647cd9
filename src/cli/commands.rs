use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use route_migrator::error::Result;
use route_migrator::migration::{Migrator, Mode};
use route_migrator::report::MigrationReport;
use route_migrator::settings::{Overrides, Settings};

#[derive(Parser)]
#[command(name = "route-migrator")]
#[command(about = "Migrate Flutter Navigator calls to a go_router route configuration")]
#[command(version)]
#[command(after_long_help = r#"
EXAMPLES:
    # Show what would change in the current project
    route-migrator plan

    # Same, as JSON
    route-migrator plan ./my_app --format json

    # Write the route configuration and rewrite call sites
    route-migrator apply ./my_app

    # Put the configuration somewhere else and skip generated code
    route-migrator apply --output lib/app/routes.dart --exclude 'lib/gen/**'
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path, relative to the project root
    #[arg(long, global = true)]
    pub output: Option<PathBuf>,

    /// Name of the generated GoRouter variable
    #[arg(long, global = true)]
    pub router_name: Option<String>,

    /// Glob of sources to leave untouched (repeatable)
    #[arg(long, global = true)]
    pub exclude: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Report call sites and planned edits without touching any file
    Plan {
        /// Path to the Flutter project
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output format (text or json)
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Write the route configuration and rewrite call sites
    Apply {
        /// Path to the Flutter project
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            output: self.output.clone(),
            router_name: self.router_name.clone(),
            exclude: self.exclude.clone(),
        }
    }
}

fn migrator(path: &Path, overrides: Overrides) -> Result<Migrator> {
    let settings = Settings::load(path)?.with_overrides(overrides)?;
    Migrator::new(path, settings)
}

/// Prints the migration plan.
pub fn plan(path: &Path, overrides: Overrides, format: &str) -> Result<()> {
    let report = migrator(path, overrides)?.run(Mode::Plan)?;
    if format == "json" {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.to_text());
    }
    Ok(())
}

/// Runs the migration and prints a summary.
pub fn apply(path: &Path, overrides: Overrides) -> Result<()> {
    let report = migrator(path, overrides)?.run(Mode::Apply)?;
    print_summary(&report);
    Ok(())
}

fn print_summary(report: &MigrationReport) {
    let rewritten = report.files.iter().filter(|f| !f.diffs.is_empty()).count();
    if report.config_changed {
        println!(
            "Wrote {} ({} routes, {})",
            report.config_path.display(),
            report.routes.len(),
            report.emission.as_str()
        );
    } else {
        println!("{} is up to date", report.config_path.display());
    }
    println!(
        "Rewrote {} call sites in {} files",
        report.diff_count(),
        rewritten
    );
    if report.retained_routes > 0 {
        println!(
            "Kept {} existing routes without call sites",
            report.retained_routes
        );
    }
    for warning in &report.warnings {
        match warning.line {
            Some(line) => eprintln!(
                "warning[{}]: {}:{}: {}",
                warning.kind.as_str(),
                warning.file.display(),
                line,
                warning.message
            ),
            None => eprintln!(
                "warning[{}]: {}: {}",
                warning.kind.as_str(),
                warning.file.display(),
                warning.message
            ),
        }
    }
}
