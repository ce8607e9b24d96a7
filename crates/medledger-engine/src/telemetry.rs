//! # Tracing Setup
//!
//! Installs the global `tracing` subscriber for binaries embedding the
//! engine.
//!
//! ## Log Levels
//! - `RUST_LOG=debug` - Show per-line ledger steps
//! - `RUST_LOG=medledger=trace` - Everything from MedLedger crates
//! - Default: `info,medledger=debug,sqlx=warn`

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info,medledger=debug,sqlx=warn";

/// Initializes the tracing subscriber for structured logging.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
