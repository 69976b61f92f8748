mod config;
mod generate_cmd;
mod sample;
mod sink;
mod validate_cmd;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "wayfarer", about = "Validated multi-day itinerary generator")]
struct Cli {
    /// Engine config file (overrides WAYFARER_CONFIG env var)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an itinerary, streaming events as JSON lines to stdout
    Generate {
        /// Destination city or region
        destination: String,
        /// Number of days to plan
        #[arg(long, default_value_t = 3)]
        days: u32,
        /// Total trip budget
        #[arg(long, default_value_t = 1000.0)]
        budget: f64,
        /// Budget currency code
        #[arg(long, default_value = "USD")]
        currency: String,
        /// First day of the trip (YYYY-MM-DD; default: today)
        #[arg(long)]
        start_date: Option<NaiveDate>,
        /// Spending posture: budget, balanced, or luxury
        #[arg(long, default_value = "balanced")]
        style: String,
        /// Number of travelers
        #[arg(long, default_value_t = 1)]
        travelers: u32,
        /// Group includes a toddler
        #[arg(long)]
        toddler: bool,
        /// Group includes an elderly traveler
        #[arg(long)]
        elderly: bool,
        /// Group includes a mobility-impaired traveler
        #[arg(long)]
        mobility_impaired: bool,
        /// Skip budget and logistics validation
        #[arg(long)]
        no_validation: bool,
        /// Write the finished itinerary JSON to this path after each day
        #[arg(long)]
        output: Option<PathBuf>,
        /// Resume from a previously written itinerary JSON file
        #[arg(long)]
        resume_from: Option<PathBuf>,
        /// Identifier of the last event already received, for replay
        #[arg(long)]
        last_event_id: Option<String>,
    },
    /// Validate an itinerary JSON file without generating anything
    Validate {
        /// Itinerary JSON file (as written by `generate --output`)
        file: PathBuf,
        /// Total trip budget the itinerary must fit
        #[arg(long)]
        budget: f64,
        /// Group includes a toddler
        #[arg(long)]
        toddler: bool,
        /// Group includes an elderly traveler
        #[arg(long)]
        elderly: bool,
        /// Group includes a mobility-impaired traveler
        #[arg(long)]
        mobility_impaired: bool,
        /// Number of travelers
        #[arg(long, default_value_t = 1)]
        travelers: u32,
    },
    /// Write a default engine config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Events go to stdout; logs stay on stderr so the JSONL stream is clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let engine_config = config::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Generate {
            destination,
            days,
            budget,
            currency,
            start_date,
            style,
            travelers,
            toddler,
            elderly,
            mobility_impaired,
            no_validation,
            output,
            resume_from,
            last_event_id,
        } => {
            generate_cmd::run(generate_cmd::GenerateArgs {
                destination,
                days,
                budget,
                currency,
                start_date,
                style,
                travelers,
                toddler,
                elderly,
                mobility_impaired,
                no_validation,
                output,
                resume_from,
                last_event_id,
                engine_config,
            })
            .await
        }
        Commands::Validate {
            file,
            budget,
            toddler,
            elderly,
            mobility_impaired,
            travelers,
        } => {
            validate_cmd::run(validate_cmd::ValidateArgs {
                file,
                budget,
                toddler,
                elderly,
                mobility_impaired,
                travelers,
                engine_config,
            })
            .await
        }
        Commands::Init { force } => config::init(force),
    }
}
