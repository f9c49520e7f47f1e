//! Orchestrates application startup: parses configuration, then runs the
//! SMTP accept loop until a shutdown signal arrives.

pub mod config;
pub mod mbox;
pub mod smtp;

use anyhow::Result;
use log::info;

/// Runs the SMTP server to completion. Returns `Ok(())` on a clean
/// shutdown (SIGINT/SIGTERM). A listener bind failure due to insufficient
/// permissions is reported directly to stderr and exits the process with
/// status 1, matching the original implementation's behavior; any other
/// startup error is returned for `main.rs` to log and exit on.
pub async fn run() -> Result<()> {
    info!(
        "Starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let config = config::Config::from_args();

    match smtp::run(config).await {
        Ok(()) => Ok(()),
        Err(e) => {
            if is_permission_denied(&e) {
                eprintln!("{e}");
                std::process::exit(1);
            }
            Err(e)
        }
    }
}

fn is_permission_denied(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<std::io::Error>())
        .any(|io_err| io_err.kind() == std::io::ErrorKind::PermissionDenied)
}
