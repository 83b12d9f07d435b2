// src/main.rs

use color_eyre::eyre::{Result, WrapErr};
use tracing::{error, info};

mod config;
mod core;
mod error;
mod logging;
mod server;

use crate::config::Settings;
use crate::core::scanner::Scanner;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    logging::initialize_logging()?;

    let settings = Settings::from_env().wrap_err("invalid configuration")?;
    info!(
        remote = %settings.remote_url,
        timeout_secs = settings.remote_timeout.as_secs(),
        wordlist = %settings.formatter.wordlist,
        "Starting scan gateway."
    );

    let scanner = Scanner::new(&settings).wrap_err("failed to initialise scanner")?;
    let (_, server) = server::bind(&settings, scanner)
        .wrap_err_with(|| format!("failed to bind {}", settings.bind_addr))?;

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!(error = %e, "Server stopped with an error.");
                return Err(e).wrap_err("server error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received.");
        }
    }

    Ok(())
}
