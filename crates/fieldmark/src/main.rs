use anyhow::Context;
use clap::{Parser, Subcommand};
use fieldmark_engine::config::{ConfigLoader, FieldmarkConfig};
use fieldmark_engine::formatter::format_profile;
use fieldmark_engine::protocol::origin_of;
use fieldmark_engine::store::{FieldStore, JsonFileStorage};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fieldmark", version, about = "Manage the captured-field profile")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Config file (default: ./fieldmark.yaml, then ~/.fieldmark/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Profile file, overriding the configured storage path
    #[arg(long, global = true)]
    store: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect or edit the stored profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Print the target origin and both field lists
    Show {
        /// Print the raw stored JSON instead
        #[arg(long)]
        json: bool,
    },
    /// Set the target origin from a page URL
    SetTarget { url: String },
    /// Delete a captured field by its list index
    DeleteCaptured { index: usize },
    /// Delete an ignored field by its list index
    DeleteIgnored { index: usize },
    /// Clear the target origin and both lists
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref()).await?;
    let path = args.store.unwrap_or(config.storage.path);
    debug!("Using profile at {}", path.display());
    let store = FieldStore::new(Arc::new(JsonFileStorage::new(path)));

    match args.command {
        Command::Profile { action } => run_profile(&store, action).await,
    }
}

async fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<FieldmarkConfig> {
    let config = match path {
        Some(path) => ConfigLoader::load_from(path)
            .await
            .with_context(|| format!("loading {}", path.display()))?,
        None => ConfigLoader::load_default().await?,
    };
    Ok(config)
}

async fn run_profile(store: &FieldStore, action: ProfileAction) -> anyhow::Result<()> {
    match action {
        ProfileAction::Show { json } => {
            let profile = store.get_profile().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&profile)?);
            } else {
                println!("{}", format_profile(&profile));
            }
        }
        ProfileAction::SetTarget { url } => {
            // Bare origins and full page URLs both normalize to the origin.
            let origin = origin_of(url.trim()).unwrap_or_else(|| url.trim().to_string());
            store.set_target_origin(&origin).await?;
            info!("Target origin set to {}", origin);
        }
        ProfileAction::DeleteCaptured { index } => {
            check_index(store.get_profile().await?.captured.len(), index)?;
            store.delete_captured(index).await?;
            info!("Deleted captured field {}", index);
        }
        ProfileAction::DeleteIgnored { index } => {
            check_index(store.get_profile().await?.ignored.len(), index)?;
            store.delete_ignored(index).await?;
            info!("Deleted ignored field {}", index);
        }
        ProfileAction::Reset => {
            store.reset().await?;
            info!("Profile reset");
        }
    }
    Ok(())
}

fn check_index(len: usize, index: usize) -> anyhow::Result<()> {
    if index >= len {
        anyhow::bail!("No field at index {} ({} stored)", index, len);
    }
    Ok(())
}
