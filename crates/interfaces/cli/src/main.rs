mod daemon;
mod inspect;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use pagesift_config::{AppConfig, SelectionMode, Strategy, TelemetryConfig};
use pagesift_runtime::{DaemonClient, ExtractError, Extractor, ServerEvent};

#[derive(Debug, Parser)]
#[command(
    name = "pagesift",
    version,
    about = "Answer questions about web pages with an LLM-guided extraction pipeline"
)]
struct Cli {
    /// Configuration file; defaults apply when it does not exist.
    #[arg(long, global = true, default_value = "config/pagesift.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one extraction and print the result as JSON.
    Extract {
        #[arg(long)]
        prompt: String,
        #[arg(long)]
        url: String,
        #[arg(long, value_enum)]
        strategy: Option<CliStrategy>,
        /// Match free-text selector replies loosely.
        #[arg(long)]
        loose: bool,
        /// Plain GET instead of the JS-rendering reader proxy.
        #[arg(long)]
        no_js: bool,
        /// Send the request to a running daemon instead of extracting here.
        #[arg(long)]
        via_daemon: bool,
    },
    /// Serve extractions on the configured unix socket.
    Serve,
    /// Talk to a running daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommands,
    },
    /// Print the normalized snapshot of a page.
    Snapshot {
        url: String,
        #[arg(long)]
        json: bool,
    },
    /// Print the outline (or snapshot digest) the selector would see.
    Outline { url: String },
    /// Show how a page's text is distributed across tags, boilerplate included.
    Analyze {
        url: String,
        #[arg(long)]
        json: bool,
    },
    /// Check configuration and connectivity.
    Doctor,
    /// Write a default configuration file to `--config`.
    Init {
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Subcommand)]
enum DaemonCommands {
    Ping,
    Stop,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliStrategy {
    TwoPass,
    SinglePass,
    Auto,
    Agentic,
}

impl From<CliStrategy> for Strategy {
    fn from(value: CliStrategy) -> Self {
        match value {
            CliStrategy::TwoPass => Strategy::TwoPass,
            CliStrategy::SinglePass => Strategy::SinglePass,
            CliStrategy::Auto => Strategy::Auto,
            CliStrategy::Agentic => Strategy::Agentic,
        }
    }
}

fn init_tracing(telemetry: &TelemetryConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&telemetry.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if telemetry.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let mut config = AppConfig::load_from(&cli.config)?;
    init_tracing(&config.telemetry);

    match cli.command {
        Commands::Extract {
            prompt,
            url,
            strategy,
            loose,
            no_js,
            via_daemon,
        } => {
            if via_daemon {
                let client = DaemonClient::new(&config.daemon.socket_path);
                return print_event(client.extract(prompt, url).await?);
            }

            if let Some(strategy) = strategy {
                config.extraction.strategy = strategy.into();
            }
            if loose {
                config.extraction.selection_mode = SelectionMode::Loose;
            }
            if no_js {
                config.renderer.render_js = false;
            }
            let extractor = Extractor::from_config(&config)?;
            match extractor.extract(&prompt, &url).await {
                Ok(result) => println!("{}", serde_json::to_string_pretty(&result)?),
                Err(err) => report_failure(&err)?,
            }
        }
        Commands::Serve => {
            let extractor = Arc::new(Extractor::from_config(&config)?);
            daemon::serve(extractor, &config.daemon.socket_path).await?;
        }
        Commands::Daemon { command } => {
            let client = DaemonClient::new(&config.daemon.socket_path);
            match command {
                DaemonCommands::Ping => {
                    client.ping().await?;
                    println!("daemon is up at {}", config.daemon.socket_path);
                }
                DaemonCommands::Stop => {
                    client.shutdown().await?;
                    println!("daemon stopping");
                }
            }
        }
        Commands::Snapshot { url, json } => inspect::snapshot(&config, &url, json).await?,
        Commands::Outline { url } => inspect::outline(&config, &url).await?,
        Commands::Analyze { url, json } => inspect::analyze(&config, &url, json).await?,
        Commands::Doctor => daemon::doctor(&config).await,
        Commands::Init { force } => {
            if cli.config.exists() && !force {
                bail!("{} already exists; pass --force to overwrite", cli.config.display());
            }
            AppConfig::default().save_to(&cli.config)?;
            println!("wrote {}", cli.config.display());
        }
    }

    Ok(())
}

fn print_event(event: ServerEvent) -> Result<()> {
    match event {
        ServerEvent::Result(result) => println!("{}", serde_json::to_string_pretty(&result)?),
        ServerEvent::NotFound { message, .. } => {
            println!("{}", serde_json::json!({ "status": "not_found", "message": message }));
        }
        ServerEvent::Error { status, message } => {
            println!("{}", serde_json::json!({ "status": status, "message": message }));
            bail!("extraction failed: {message}");
        }
        other => bail!("unexpected daemon reply: {other:?}"),
    }
    Ok(())
}

/// Print the caller-safe form of `err`; anything but not-found is a
/// non-zero exit.
fn report_failure(err: &ExtractError) -> Result<()> {
    let payload = serde_json::json!({
        "status": err.status(),
        "message": err.public_message(),
    });
    println!("{payload}");
    match err.status() {
        pagesift_runtime::ErrorStatus::NotFound => Ok(()),
        _ => bail!("{err}"),
    }
}
