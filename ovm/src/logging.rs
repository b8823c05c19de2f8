//! Log output for a bootstrapped host.

use crate::constants::filenames;
use crate::context::Context;
use ovm_shared::errors::OvmResult;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Keeps the background log writer alive for the life of the process.
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Send `tracing` output to a daily rolling file in `ctx.log_path`.
///
/// Filtering follows `RUST_LOG` and defaults to `info`. Only the first call
/// installs a subscriber; later calls, or calls made after another global
/// subscriber was installed, do nothing.
pub fn init_logging_for(ctx: &Context) -> OvmResult<()> {
    if LOG_GUARD.get().is_some() {
        return Ok(());
    }

    let appender = tracing_appender::rolling::daily(&ctx.log_path, filenames::LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
    {
        Ok(()) => {
            let _ = LOG_GUARD.set(guard);
            tracing::debug!(log_path = %ctx.log_path.display(), "Logging initialized");
        }
        Err(e) => {
            tracing::debug!("Global subscriber already installed: {}", e);
        }
    }

    Ok(())
}
