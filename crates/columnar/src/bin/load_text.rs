//! Prints the live text of a document blob.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use columnar::{ColumnarError, Config, Document};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Load the current text of a text object from a document blob")]
struct Args {
    /// Document blob.
    doc: PathBuf,

    /// Counter of the text object's creating op.
    #[arg(long)]
    object_counter: Option<u64>,

    /// Fail instead of falling back to general decoding.
    #[arg(long)]
    no_fallback: bool,

    /// Skip header checksum verification.
    #[arg(long)]
    no_verify: bool,

    /// Load the text this many times, logging each duration.
    #[arg(long, default_value_t = 1)]
    repeat: u32,

    /// JSON config file; flags take precedence.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn run(args: &Args) -> Result<(), ColumnarError> {
    let mut config = match &args.config {
        Some(path) => Config::from_path(path)?,
        None => Config::default(),
    };
    if let Some(counter) = args.object_counter {
        config.text.object_counter = counter;
    }
    if args.no_fallback {
        config.text.fallback = false;
    }
    if args.no_verify {
        config.document.verify_checksum = false;
    }

    let bytes = std::fs::read(&args.doc)?;
    let mut text = String::new();
    for round in 0..args.repeat.max(1) {
        let start = Instant::now();
        let doc = Document::parse_with(&bytes, &config.document)?;
        text = doc.text(&config.text)?;
        info!(round, elapsed = ?start.elapsed(), chars = text.chars().count(), "loaded text");
    }

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
