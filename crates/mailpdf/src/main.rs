//! CLI entry point for `mailpdf`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use mailpdf::db::{attachment_repo, mailbox_repo, Database};
use mailpdf::{load_settings, AttachmentRetriever, MailboxConfig};

#[derive(Parser)]
#[command(name = "mailpdf", version, about = "Fetch PDF attachments from the last 24 hours")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (YAML); defaults apply when it does not exist
    #[arg(short, long, env = "MAILPDF_SETTINGS", default_value = "mailpdf.yaml")]
    settings: PathBuf,

    /// Override the database path from the settings
    #[arg(long, value_name = "PATH")]
    database: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one retrieval pass and print the new records as JSON
    Fetch {
        #[arg(value_name = "MAILBOX_ID")]
        mailbox_id: i64,
    },
    /// List recorded attachments of a mailbox as JSON
    Records {
        #[arg(value_name = "MAILBOX_ID")]
        mailbox_id: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(e) = mailpdf::logging::init(cli.verbose) {
        eprintln!("{}", e);
    }

    let settings = load_settings(&cli.settings)
        .with_context(|| format!("Failed to load settings from {}", cli.settings.display()))?;
    let database_path = match cli.database {
        Some(path) => path,
        None => settings.database_path()?,
    };
    let db = Database::open(&database_path)
        .with_context(|| format!("Failed to open database {}", database_path.display()))?;

    match cli.command {
        Commands::Fetch { mailbox_id } => {
            let config = find_config(&db, mailbox_id)?;
            let retriever = AttachmentRetriever::from_settings(&settings, Arc::new(db))?;
            let records = retriever.retrieve(&config).await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Commands::Records { mailbox_id } => {
            let records = attachment_repo::list_by_mailbox(&db, mailbox_id)?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }

    Ok(())
}

fn find_config(db: &Database, mailbox_id: i64) -> anyhow::Result<MailboxConfig> {
    let Some(row) = mailbox_repo::find(db, mailbox_id)? else {
        bail!("Configuration not found");
    };
    Ok(MailboxConfig::try_from(row)?)
}
