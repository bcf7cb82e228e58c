//! `comfyvid` binary entrypoint.
//!
//! Loads `.env`, parses flags, installs logging, then runs one batch.

use std::process::ExitCode;

use clap::Parser;

use comfyvid_cli::app::{self, EXIT_USAGE};
use comfyvid_cli::args::Args;
use comfyvid_cli::logging;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            // --help and --version also arrive here.
            return if e.use_stderr() {
                ExitCode::from(EXIT_USAGE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    logging::init(args.log_format);

    ExitCode::from(app::run(&args).await)
}
