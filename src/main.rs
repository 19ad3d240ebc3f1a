use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use wamedia::config::Config;
use wamedia::gateway;
use wamedia::media::LocalMediaStore;

/// `wamedia` - WhatsApp Cloud API webhook service.
#[derive(Parser, Debug)]
#[command(name = "wamedia")]
#[command(version)]
#[command(about = "Classifies inbound WhatsApp messages and archives media attachments.", long_about = None)]
struct Cli {
    /// Override the config directory (default: ~/.wamedia)
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the webhook gateway
    #[command(long_about = "\
Start the webhook gateway.

Listens for WhatsApp Cloud API callbacks, classifies each inbound
message, archives media attachments under the storage root, and sends
text replies through the send API. Bind address defaults to the values
in your config file (gateway.host / gateway.port).

Examples:
  wamedia serve                  # use config defaults
  wamedia serve -p 8080          # listen on port 8080
  wamedia serve --host 0.0.0.0   # bind to all interfaces")]
    Serve {
        /// Port to listen on; defaults to config gateway.port
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to; defaults to config gateway.host
        #[arg(long)]
        host: Option<String>,
    },

    /// Show resolved configuration
    Status,

    /// Create and verify the media storage layout
    #[command(long_about = "\
Create and verify the media storage layout.

Creates the storage root and its category subdirectories (image, audio,
video, document) if they do not exist, then reports the resolved path.
Run once after editing storage.root.")]
    CheckStorage,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install default crypto provider for Rustls TLS before any client is
    // built; with both aws-lc-rs and ring available the process-level
    // provider cannot be determined automatically.
    if let Err(e) = rustls::crypto::ring::default_provider().install_default() {
        eprintln!("Warning: Failed to install default crypto provider: {e:?}");
    }

    let cli = Cli::parse();

    if let Some(config_dir) = &cli.config_dir {
        if config_dir.trim().is_empty() {
            anyhow::bail!("--config-dir cannot be empty");
        }
        std::env::set_var("WAMEDIA_CONFIG_DIR", config_dir);
    }

    // Initialize logging - respects RUST_LOG env var, defaults to INFO
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = Config::load_or_init().await?;

    match cli.command {
        Commands::Serve { port, host } => {
            config.validate_credentials()?;
            let port = port.unwrap_or(config.gateway.port);
            let host = host.unwrap_or_else(|| config.gateway.host.clone());
            info!("Starting wamedia gateway on {host}:{port}");
            gateway::run_gateway(&host, port, config).await
        }

        Commands::Status => {
            println!("wamedia status");
            println!();
            println!("Version:        {}", env!("CARGO_PKG_VERSION"));
            println!("Config:         {}", config.config_path.display());
            println!("API version:    {}", config.whatsapp.api_version);
            println!(
                "Access token:   {}",
                if config.whatsapp.access_token.is_empty() {
                    "(not set)"
                } else {
                    "set"
                }
            );
            println!(
                "Phone number:   {}",
                if config.whatsapp.phone_number_id.is_empty() {
                    "(not set)".to_string()
                } else {
                    config.whatsapp.phone_number_id.clone()
                }
            );
            println!("Storage root:   {}", config.storage.root_path().display());
            println!(
                "Gateway:        {}:{}",
                config.gateway.host, config.gateway.port
            );
            println!(
                "Timeouts:       metadata {}s, download {}s",
                config.acquire.metadata_timeout_secs, config.acquire.download_timeout_secs
            );
            println!(
                "Metadata retries: {}",
                config.acquire.metadata_retries
            );
            Ok(())
        }

        Commands::CheckStorage => {
            let root = config.storage.root_path();
            let store = LocalMediaStore::new(&root);
            store.init().await?;
            println!("Storage ready at {}", root.display());
            for category in ["image", "audio", "video", "document"] {
                println!("  {}", root.join(category).display());
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_has_no_flag_conflicts() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_parses_port_and_host() {
        let cli = Cli::try_parse_from(["wamedia", "serve", "-p", "8080", "--host", "0.0.0.0"])
            .expect("serve invocation should parse");
        match cli.command {
            Commands::Serve { port, host } => {
                assert_eq!(port, Some(8080));
                assert_eq!(host.as_deref(), Some("0.0.0.0"));
            }
            other => panic!("expected serve command, got {other:?}"),
        }
    }

    #[test]
    fn check_storage_parses() {
        let cli = Cli::try_parse_from(["wamedia", "check-storage"])
            .expect("check-storage invocation should parse");
        assert!(matches!(cli.command, Commands::CheckStorage));
    }
}
