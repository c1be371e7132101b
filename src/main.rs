use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use parqueo_admin::console::{self, Command};
use parqueo_admin::{Admin, Config, Notice};

/// Administration console for the parqueo API
#[derive(Parser, Debug)]
#[command(name = "parqueo-admin")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Backend base URL
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Page-size hint for list requests
    #[arg(long, value_name = "N")]
    page_size: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

fn ask(prompt: &str) -> bool {
    print!("{} [s/N] ", prompt);
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "s" | "si" | "sí" | "y" | "yes")
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,reqwest=warn,hyper=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration
    let config = Config::load(args.config.as_ref(), args.url.as_deref(), args.page_size)?;

    info!("Configuration loaded: backend={}", config.base_url);

    let admin = Admin::new(config)?;
    let mut stdout = io::stdout();

    match console::run(&admin, args.command, &mut stdout, &ask).await? {
        Some(Notice::Error(message)) => {
            eprintln!("{}", message);
            Ok(ExitCode::FAILURE)
        }
        Some(Notice::Success(message)) => {
            println!("{}", message);
            Ok(ExitCode::SUCCESS)
        }
        None => Ok(ExitCode::SUCCESS),
    }
}
