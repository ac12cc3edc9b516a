//! CLI utility functions

use miette::{IntoDiagnostic, Result};
use promptlint_core::AbortHandle;
use tokio::runtime::Runtime;
use tracing::warn;

pub fn create_tokio_runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .into_diagnostic()
}

/// Stops new backend calls on Ctrl-C. Must be called inside a runtime.
pub fn abort_on_ctrl_c(handle: AbortHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, waiting for in-flight requests to finish");
            handle.abort();
        }
    });
}
