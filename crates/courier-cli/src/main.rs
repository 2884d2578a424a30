use courier_core::logging::{self, LogFormat};

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    // Initialize logging as early as possible; fall back to stderr if the
    // state dir is unwritable. COURIER_LOG_FORMAT=json writes JSON lines.
    if logging::init_logging(LogFormat::from_env()).is_err() {
        logging::init_logging_stderr();
    }

    // Parse CLI and dispatch.
    if let Err(err) = CliCommand::run_from_args().await {
        eprintln!("courier error: {:#}", err);
        std::process::exit(1);
    }
}
