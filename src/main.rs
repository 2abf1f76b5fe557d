mod cli;
mod error;
mod logging;
mod metrics;
mod model;
mod orchestrator;
mod storage;
mod text_summary;
mod transport;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let args = cli::Cli::parse();
    let is_json = args.json;

    match cli::run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            if is_json {
                // Keep stdout parseable: errors go to stderr, no JSON is printed.
                eprintln!("{e:#}");
                std::process::exit(1);
            } else {
                Err(e)
            }
        }
    }
}
