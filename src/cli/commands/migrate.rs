use clap::Subcommand;
use serde_json::json;
use std::path::PathBuf;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config;
use crate::database::migrate::{self, PatchStatus, DEFAULT_DIR};
use crate::database::Database;

#[derive(Subcommand)]
pub enum MigrateCommands {
    #[command(about = "Apply every pending patch in version order")]
    Run {
        #[arg(long, default_value = DEFAULT_DIR, help = "Directory holding <version>_<description>.sql files")]
        dir: PathBuf,
    },

    #[command(about = "List patches and whether the database has them")]
    Status {
        #[arg(long, default_value = DEFAULT_DIR, help = "Directory holding <version>_<description>.sql files")]
        dir: PathBuf,
    },
}

pub async fn handle(cmd: MigrateCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let db = Database::connect(&config::config().database).await?;

    let result = match cmd {
        MigrateCommands::Run { dir } => {
            let applied = migrate::run(&db, &dir).await?;
            let message = if applied.is_empty() {
                "Schema is up to date".to_string()
            } else {
                format!("Applied {} patch(es)", applied.len())
            };
            report(&output_format, &message, &applied)
        }
        MigrateCommands::Status { dir } => {
            let patches = migrate::status(&db, &dir).await?;
            report(&output_format, &format!("{} patch(es) in {}", patches.len(), dir.display()), &patches)
        }
    };

    db.close().await;
    result
}

fn report(output_format: &OutputFormat, message: &str, patches: &[PatchStatus]) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => output_success(output_format, message, Some(json!(patches))),
        OutputFormat::Text => {
            output_success(output_format, message, None)?;
            for patch in patches {
                let state = serde_json::to_value(&patch.state)?;
                println!(
                    "  {:>14}  {:<9} {}",
                    patch.version,
                    state.as_str().unwrap_or_default(),
                    patch.description
                );
            }
            Ok(())
        }
    }
}
