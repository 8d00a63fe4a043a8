//! Command-line harness for the EPUB editor core
//!
//! Imports books into a directory-backed workspace, exports projects back to
//! EPUB, and inspects archives.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use epub_editor::project::DirectoryStore;
use epub_editor::{import_archive, EditorConfig, Workspace};

#[derive(Parser)]
#[command(name = "epub-editor", version, about = "Import, inspect and export EPUB projects")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the metadata, manifest and spine of an EPUB
    Inspect {
        epub: PathBuf,
    },
    /// Unpack an EPUB into a new project
    Import {
        epub: PathBuf,
        #[arg(long)]
        workspace: PathBuf,
        #[arg(long)]
        project: String,
    },
    /// Pack a project into an EPUB
    Export {
        #[arg(long)]
        workspace: PathBuf,
        #[arg(long)]
        project: String,
        #[arg(long, short)]
        output: PathBuf,
    },
    /// List projects in a workspace
    List {
        #[arg(long)]
        workspace: PathBuf,
    },
    /// Delete a project
    Delete {
        #[arg(long)]
        workspace: PathBuf,
        #[arg(long)]
        project: String,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "epub_editor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = EditorConfig::from_env();

    let cli = Cli::parse();
    match cli.command {
        Command::Inspect { epub } => {
            let data = std::fs::read(&epub)
                .with_context(|| format!("Failed to read {}", epub.display()))?;
            let package = import_archive(&data)?;
            let summary = serde_json::json!({
                "packagePath": package.package_path,
                "metadata": package.metadata,
                "manifest": package.manifest,
                "spine": package.spine,
                "files": package.files.iter().map(|f| &f.path).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Import {
            epub,
            workspace,
            project,
        } => {
            let data = std::fs::read(&epub)
                .with_context(|| format!("Failed to read {}", epub.display()))?;
            let ws = Workspace::new(DirectoryStore::new(workspace)?, config);
            let sidecar = ws.import_project(&project, &data)?;
            println!("Imported \"{}\" as {}", sidecar.name, project);
        }
        Command::Export {
            workspace,
            project,
            output,
        } => {
            let ws = Workspace::new(DirectoryStore::new(workspace)?, config);
            let data = ws.export_project(&project)?;
            std::fs::write(&output, &data)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Wrote {} ({} bytes)", output.display(), data.len());
        }
        Command::List { workspace } => {
            let ws = Workspace::new(DirectoryStore::new(workspace)?, config);
            for project in ws.list_projects()? {
                println!(
                    "{}\t{}\t{}",
                    project.id,
                    project.sidecar.name,
                    project.sidecar.last_modified.to_rfc3339()
                );
            }
        }
        Command::Delete { workspace, project } => {
            let ws = Workspace::new(DirectoryStore::new(workspace)?, config);
            ws.delete_project(&project)?;
        }
    }

    Ok(())
}
