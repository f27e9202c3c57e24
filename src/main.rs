mod config;
mod date;
mod digest;
mod http;
mod logging;
mod sources;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::config::Config;
use crate::digest::Destination;

#[derive(Parser)]
#[command(name = "daily-digest")]
#[command(about = "Summarize a day of pull requests, Jira status changes and calendar events")]
struct Cli {
    /// Day to report on: YYYY-MM-DD, "today" or "yesterday" (default: today)
    #[arg(long)]
    date: Option<String>,

    /// Write the report to this file (`{date}` is replaced with the day)
    #[arg(short, long)]
    output: Option<String>,

    /// Print to stdout even when an output file is configured
    #[arg(long, conflicts_with = "output")]
    stdout: bool,

    /// Config file (default: ~/.config/daily-digest/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    logging::init_logging(cli.verbose, config.log_level.as_deref());

    let date = date::parse_target_date(cli.date.as_deref(), config.timezone, chrono::Utc::now())?;

    let destination = match (cli.stdout, cli.output.or_else(|| config.output_file.clone())) {
        (false, Some(template)) => Destination::file(&template, date),
        _ => Destination::Stdout,
    };

    let http = http::build_client(config.http_timeout).context("Failed to build HTTP client")?;

    digest::run(&http, &config, date, &destination).await?;

    Ok(())
}
