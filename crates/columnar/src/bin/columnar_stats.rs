//! Prints the per-column encoded size of an edit trace.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use columnar::{encode_trace, ColumnarError, Config, Trace};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Encode an edit trace into columns and report their sizes")]
struct Args {
    /// Edit trace JSON file.
    trace: PathBuf,

    /// Print the sizes as JSON.
    #[arg(long)]
    json: bool,

    /// JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn run(args: &Args) -> Result<(), ColumnarError> {
    let config = match &args.config {
        Some(path) => Config::from_path(path)?,
        None => Config::default(),
    };
    let trace = Trace::from_reader(BufReader::new(File::open(&args.trace)?))?;
    let columns = encode_trace(&trace, &config.encoder)?;
    let sizes = columns.sizes();
    if args.json {
        let report = serde_json::json!({
            "ops": columns.ops,
            "columns": sizes.columns,
            "total": sizes.total(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{sizes}");
    }
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
