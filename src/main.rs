//! # fwbackup CLI
//!
//! Receives configuration backups from pfSense and OPNsense firewalls over
//! HTTP and files them per host.
//!
//! ## Usage
//!
//! ```bash
//! fwbackup [--config ./fwbackup.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fwbackup serve` | Start the upload server |
//! | `fwbackup inspect <file>` | Show which host a config export belongs to, without storing it |
//!
//! ## Examples
//!
//! ```bash
//! # Listen on port 8080 with a 20 MB limit
//! fwbackup serve -p 8080 -m 20
//!
//! # Check an export before pointing a firewall at the server
//! fwbackup inspect ./config.xml
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use fwbackup::config::{load_config, Config};
use fwbackup::pipeline;
use fwbackup::server::run_server;
use fwbackup::size_guard::SizeGuard;
use fwbackup::telemetry;

/// Firewall configuration backup receiver.
#[derive(Parser)]
#[command(
    name = "fwbackup",
    about = "Receives pfSense and OPNsense configuration backups over HTTP",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Optional. Without it, built-in defaults are used: port 80, 10 MB
    /// uploads, backups under `./backup`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the upload server.
    Serve {
        /// Listening port. Overrides the port in `[server].bind`.
        #[arg(short, long)]
        port: Option<u16>,

        /// Maximum upload size in MB. Overrides `[upload].max_mb`.
        #[arg(short = 'm', long)]
        max_mb: Option<u64>,
    },

    /// Decode a configuration export and print its dialect and hostname.
    ///
    /// Runs the same size check, detection and extraction as an upload, but
    /// writes nothing.
    Inspect {
        /// Path to a `config.xml` export.
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Serve { port, max_mb } => {
            if let Some(port) = port {
                config.set_port(port);
            }
            if let Some(max_mb) = max_mb {
                config.upload.max_mb = max_mb;
            }
            config.validate()?;
            run_server(&config).await?;
        }
        Commands::Inspect { file } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let guard = SizeGuard::new(config.max_upload_bytes());
            let parsed = pipeline::inspect(guard, &bytes)
                .with_context(|| format!("{} would be rejected", file.display()))?;
            println!("dialect:  {}", parsed.dialect());
            println!("hostname: {}", parsed.canonical_hostname());
        }
    }

    Ok(())
}
