use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use devicedb::client::StoreClient;
use devicedb::settings::{Settings, DEFAULT_CONFIG};

fn main() -> ExitCode {
    let path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let settings = match Settings::load(&path) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    // RUST_LOG wins over the configured filter
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mode = settings.persistence_mode();
    info!(?mode, "opening store");
    let outcome = StoreClient::open(&mode).and_then(|client| {
        let total = client.all_items()?.len();
        let invalid = client.validate()?;
        Ok((total, invalid))
    });
    match outcome {
        Ok((total, invalid)) if invalid.is_empty() => {
            info!(total, "all entries are valid");
            ExitCode::SUCCESS
        }
        Ok((total, invalid)) => {
            error!(total, invalid = invalid.len(), ids = ?invalid, "invalid entries found");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!(error = %e, "validation could not run");
            ExitCode::FAILURE
        }
    }
}
