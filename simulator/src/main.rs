use anyhow::Context;
use clap::Parser;
use dachsbau_execution::{GameRng, RandomSource, SecureRandom};
use dachsbau_simulator::{load_config, Output, Simulator};
use std::{path::PathBuf, str::FromStr};
use tokio::io::BufReader;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration; built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Seed for a reproducible session.
    #[arg(short, long)]
    seed: Option<u64>,

    /// Print responses as JSON instead of chat text.
    #[arg(short, long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse args
    let args = Args::parse();

    // Create logger (on stderr so responses stay clean)
    let level = tracing::Level::from_str(&args.log_level)
        .with_context(|| format!("invalid log level {}", args.log_level))?;
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    // Load config
    let config = load_config(args.config.as_deref())?;
    let simulator = Simulator::new(config);

    let mut rng: Box<dyn RandomSource> = match args.seed {
        Some(seed) => Box::new(GameRng::from_u64(seed)),
        None => Box::new(SecureRandom),
    };
    let format = if args.json { Output::Json } else { Output::Text };

    info!(seed = ?args.seed, "reading commands from stdin");
    simulator
        .run(
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
            format,
            rng.as_mut(),
        )
        .await?;
    Ok(())
}
