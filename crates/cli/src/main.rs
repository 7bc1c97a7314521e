//! PromptGate CLI entry point.
//!
//! Commands:
//! - `assemble`: Budget a request and print the prompt plan as JSON
//! - `stream`: Assemble, then stream a reply from the built-in echo backend
//! - `config`: Show, locate, or validate the configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use promptgate_prompt::PromptFormat;

mod commands;

#[derive(Parser)]
#[command(
    name = "promptgate",
    about = "PromptGate: token-budgeted prompt assembly and response streaming",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Read configuration from this file instead of ~/.promptgate/config.toml
    #[arg(long, global = true, env = "PROMPTGATE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Budget a request file and print the assembled prompt as JSON
    Assemble {
        #[command(flatten)]
        input: InputArgs,

        /// Print only the metadata, not the prompt itself
        #[arg(long)]
        metadata_only: bool,
    },

    /// Assemble a request and stream a reply from the echo backend
    Stream {
        #[command(flatten)]
        input: InputArgs,

        /// Override the wall-clock limit, in seconds
        #[arg(long)]
        max_time: Option<f64>,

        /// Delay between echoed words, in milliseconds
        #[arg(long, default_value_t = 50)]
        delay_ms: u64,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
    /// Load and validate the configuration
    Validate,
}

#[derive(clap::Args)]
struct InputArgs {
    /// JSON file holding a GenerationRequest
    #[arg(short, long)]
    request: PathBuf,

    /// HuggingFace tokenizer.json to count with (needs the `hf` feature)
    #[arg(short, long)]
    tokenizer: Option<PathBuf>,

    /// Prompt shape
    #[arg(short, long, value_enum, default_value_t = FormatArg::Plain)]
    format: FormatArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Plain,
    Chat,
}

impl From<FormatArg> for PromptFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Plain => PromptFormat::Plain,
            FormatArg::Chat => PromptFormat::ChatTemplate,
        }
    }
}

impl InputArgs {
    fn into_input(self) -> commands::Input {
        commands::Input {
            request: self.request,
            tokenizer: self.tokenizer,
            format: self.format.into(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing; logs go to stderr so stdout stays machine-readable
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Assemble {
            input,
            metadata_only,
        } => commands::assemble::run(config_path, input.into_input(), metadata_only)?,
        Commands::Stream {
            input,
            max_time,
            delay_ms,
        } => commands::stream::run(config_path, input.into_input(), max_time, delay_ms).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(config_path)?,
            ConfigAction::Path => commands::config_cmd::path(config_path)?,
            ConfigAction::Validate => commands::config_cmd::validate(config_path)?,
        },
    }

    Ok(())
}
