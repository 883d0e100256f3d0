//! `composer`: inspect fragments and session cookies from the command line.

use bytes::Bytes;
use clap::{Parser, Subcommand};
use composer_composing::{Content, ContentExtractor};
use composer_core::ComposerConfig;
use composer_session::CookieSessionSerializer;
use http::{Response, StatusCode};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "composer", about = "Inspect HTML fragments and composer session cookies")]
struct Cli {
    /// Path to config file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract content and asset links from a fragment file
    Extract {
        /// Fragment markup to read
        file: PathBuf,
        /// Status the fragment is treated as having been served with
        #[arg(long, default_value_t = 200)]
        status: u16,
        /// Value of the stylesheet header sent along with the fragment
        #[arg(long)]
        stylesheet: Option<String>,
    },
    /// Decode a session cookie value into its entries
    SessionDecode {
        /// Cookie value, without the cookie name
        value: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => {
            let config = ComposerConfig::load(path)?;
            info!(path = %path.display(), "Loaded config");
            config
        }
        None => ComposerConfig::default(),
    };

    match cli.command {
        Commands::Extract {
            file,
            status,
            stylesheet,
        } => {
            let content = extract_file(&config, &file, status, stylesheet.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&content)?);
        }
        Commands::SessionDecode { value } => {
            let entries = CookieSessionSerializer::decode(&value)?;
            debug!(entries = entries.len(), "Decoded session cookie");
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }

    Ok(())
}

/// Runs the configured extractor over a fragment read from disk, as if it
/// had been fetched with `status` and an optional stylesheet header.
fn extract_file(
    config: &ComposerConfig,
    file: &Path,
    status: u16,
    stylesheet: Option<&str>,
) -> anyhow::Result<Content> {
    let payload = std::fs::read(file).map_err(|e| {
        anyhow::anyhow!("Failed to read fragment '{}': {e}", file.display())
    })?;
    let status = StatusCode::from_u16(status)?;

    let mut builder = Response::builder().status(status);
    if let Some(href) = stylesheet {
        builder = builder.header(config.composing.stylesheet_header.as_str(), href);
    }
    let response = builder.body(Some(Bytes::from(payload)))?;

    let extractor = ContentExtractor::from_config(&config.composing)?;
    Ok(extractor.extract(&response, &file.display().to_string())?)
}
