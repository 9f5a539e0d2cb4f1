use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use labdoc_core::diff::format_value;
use labdoc_core::{compare_snapshots, to_canonical, to_wire, DiffPolicy};
use labdoc_schema::{validate_section, SectionRegistry};

#[derive(Parser)]
#[command(name = "labdoc")]
#[command(about = "Experiment document tooling")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalise a stored document to the canonical shape
    Normalise {
        /// Path to a document JSON file
        file: PathBuf,
    },
    /// Validate a document's sections against the schema invariants
    Validate {
        /// Path to a document JSON file
        file: PathBuf,
    },
    /// Compare two document snapshots
    Diff {
        /// Path to the older snapshot
        older: PathBuf,
        /// Path to the newer snapshot
        newer: PathBuf,
    },
}

fn read_json(path: &Path) -> anyhow::Result<serde_json::Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("labdoc=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let registry = SectionRegistry::standard();

    match cli.command {
        Some(Commands::Normalise { file }) => {
            let raw = read_json(&file)?;
            let normalized = to_canonical(&raw, &registry);
            tracing::debug!(
                file = %file.display(),
                warnings = normalized.warnings.len(),
                "normalised document"
            );
            for warning in &normalized.warnings {
                eprintln!("warning: {}", warning);
            }
            let wire = to_wire(&normalized.value)?;
            println!("{}", serde_json::to_string_pretty(&wire)?);
        }
        Some(Commands::Validate { file }) => {
            let raw = read_json(&file)?;
            let sections = raw
                .get("content")
                .and_then(|c| c.get("sections"))
                .and_then(serde_json::Value::as_array)
                .cloned()
                .unwrap_or_default();

            let mut problems = 0;
            for (index, section) in sections.iter().enumerate() {
                for problem in validate_section(section, &registry) {
                    println!("section {}: {}", index, problem);
                    problems += 1;
                }
            }
            tracing::debug!(sections = sections.len(), problems, "validated document");
            if problems == 0 {
                println!("OK: {} sections valid", sections.len());
            } else {
                std::process::exit(1);
            }
        }
        Some(Commands::Diff { older, newer }) => {
            let older = read_json(&older)?;
            let newer = read_json(&newer)?;
            let diff = compare_snapshots(&older, &newer, &DiffPolicy::standard(), &registry);

            if !diff.has_changes() {
                println!("No changes.");
                return Ok(());
            }
            for group in &diff.groups {
                println!("{}:", group.label);
                for change in &group.changes {
                    let (lhs, rhs) = match &change.item {
                        Some(item) => (item.lhs.as_ref(), item.rhs.as_ref()),
                        None => (change.lhs.as_ref(), change.rhs.as_ref()),
                    };
                    println!(
                        "  [{}] {}: {} -> {}",
                        change.effective_kind(),
                        change.path_string(),
                        format_value(lhs),
                        format_value(rhs)
                    );
                }
            }
        }
        None => {
            println!("Use 'labdoc --help' for commands");
        }
    }

    Ok(())
}
