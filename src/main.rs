mod business_profile;
mod cli;
mod gemini_client;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use eyre::{Result, eyre};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use crate::business_profile::BusinessProfile;
use crate::cli::chat::ChatContext;
use crate::gemini_client::{ClientConfig, DEFAULT_API_BASE, DEFAULT_MODEL, GeminiClient};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    chat: ChatArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a chat session
    Chat(ChatArgs),
}

#[derive(Args, Clone)]
struct ChatArgs {
    /// Ask a single question and exit
    #[arg(short, long)]
    input: Option<String>,

    /// Business profile (JSON) to build the assistant's instructions from
    #[arg(short, long)]
    profile: Option<PathBuf>,

    /// Gemini model name
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Base URL of the Gemini API
    #[arg(long, default_value = DEFAULT_API_BASE)]
    api_base: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables from .env file
    dotenv().ok();

    let cli = Cli::parse();
    let args = match cli.command {
        Some(Commands::Chat(args)) => args,
        None => cli.chat,
    };

    let interactive = args.input.is_none();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(args.verbose, interactive))
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| eyre!("Failed to set tracing subscriber: {}", e))?;

    info!("Starting 5K Car Care assistant");

    let profile = BusinessProfile::resolve(args.profile.as_deref())?;

    let client = match build_client(&args, profile) {
        Ok(client) => client,
        Err(e) => {
            error!("{}", e);
            eprintln!("Failed to initialize Gemini client: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    let mut chat_context = ChatContext::new(
        Box::new(io::stdout()),
        args.input,
        interactive,
        Box::new(client),
    );
    chat_context.run().await
}

/// Per-attempt diagnostics stay out of the way of the interactive prompt
/// unless asked for.
fn log_level(verbose: bool, interactive: bool) -> Level {
    match (verbose, interactive) {
        (true, _) => Level::DEBUG,
        (false, true) => Level::WARN,
        (false, false) => Level::INFO,
    }
}

fn build_client(args: &ChatArgs, profile: BusinessProfile) -> Result<GeminiClient> {
    let config = ClientConfig {
        model: args.model.clone(),
        api_base: args.api_base.clone(),
        ..ClientConfig::from_env()?
    };
    GeminiClient::new(config, profile)
}
