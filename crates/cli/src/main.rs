//! Service Health Analytics CLI
//!
//! A command-line tool for recording health samples, viewing anomaly
//! summaries and trend predictions, and checking the analytics agent.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{health, predictions, samples, summary};

/// Default agent endpoint when neither flag, env nor config file set one
const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Service Health Analytics CLI
#[derive(Parser)]
#[command(name = "sha")]
#[command(author, version, about = "CLI for Service Health Analytics", long_about = None)]
pub struct Cli {
    /// Agent endpoint URL (can also be set via SHA_API_URL env var)
    #[arg(long, env = "SHA_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show anomaly, prediction and service health summary
    Summary {
        /// Trailing window in hours (agent default is 24)
        #[arg(long)]
        window_hours: Option<u32>,
    },

    /// Forecast availability and performance of a service
    Predict {
        /// Service name
        service: String,

        /// Forecast horizon in hours
        #[arg(long)]
        horizon_hours: Option<u32>,
    },

    /// Record a health sample and show detected anomalies
    Record {
        /// Service name
        #[arg(long)]
        service: String,

        /// Status reported by the service
        #[arg(long, default_value = "operational")]
        status: String,

        /// Availability score (0-100)
        #[arg(long)]
        availability: f64,

        /// Performance score (0-100)
        #[arg(long)]
        performance: f64,

        /// Response time in seconds
        #[arg(long)]
        response_time: Option<f64>,
    },

    /// Show agent component health
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = config::Config::load()?;
    let api_url = cli
        .api_url
        .or(settings.api_url)
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    if cli.verbose {
        eprintln!("Using agent at {}", api_url);
    }

    // Initialize client
    let client = client::ApiClient::new(&api_url)?;

    // Execute command
    match cli.command {
        Commands::Summary { window_hours } => {
            summary::show_summary(&client, window_hours, cli.format).await?;
        }
        Commands::Predict {
            service,
            horizon_hours,
        } => {
            predictions::show_predictions(&client, &service, horizon_hours, cli.format).await?;
        }
        Commands::Record {
            service,
            status,
            availability,
            performance,
            response_time,
        } => {
            let request = client::SampleRequest {
                service_name: service,
                status,
                availability_score: availability,
                performance_score: performance,
                response_time,
            };
            samples::record_sample(&client, &request, cli.format).await?;
        }
        Commands::Health => {
            health::show_health(&client, cli.format).await?;
        }
    }

    Ok(())
}
