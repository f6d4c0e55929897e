//! smartos-cpi - Serve one provider request from stdin

use clap::Parser;
use colored::Colorize;
use smartos_cpi::{rpc, CloudOptions, Result, SmartOsCloud};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "smartos-cpi")]
#[command(about = "Cloud provider interface for SmartOS zones", long_about = None)]
#[command(version)]
struct Cli {
    /// Provider options (JSON); defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn error(msg: &str) {
    eprintln!("{} {}", "[ERROR]".red(), msg);
}

fn init_logging() {
    // stdout carries the response, so logs go to stderr
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("smartos_cpi=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let options = match &cli.config {
        Some(path) => CloudOptions::load(path)?,
        None => CloudOptions::default(),
    };
    tracing::debug!(?options, "configuration loaded");

    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;
    let request: rpc::Request = serde_json::from_str(&input)?;

    let cloud = SmartOsCloud::from_host(options)?;
    let response = rpc::dispatch(&cloud, &request);

    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, &response)?;
    writeln!(stdout)?;

    Ok(())
}

fn main() -> ExitCode {
    init_logging();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}
