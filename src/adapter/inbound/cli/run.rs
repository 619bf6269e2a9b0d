//! Handler for the `run` command.

use tokio::signal;
use tracing::info;

use crate::application::CallbackRegistry;
use crate::error::Result;
use crate::infrastructure::bootstrap;
use crate::infrastructure::config::Config;

/// Start the workers and block until Ctrl-C.
///
/// Only the built-in `log` callback kind is registered; embedding hosts
/// register their own kinds through the library API.
///
/// # Errors
/// Returns an error if the database cannot be opened.
pub async fn execute(config: Config) -> Result<()> {
    let components = bootstrap::build(config, CallbackRegistry::with_log_callback())?;
    let handle = components.start();
    info!(
        dispatchers = handle.dispatcher_count(),
        topics = ?components.config.dispatcher.topics,
        reconciler = handle.reconciler_running(),
        callbacks = ?components.callbacks.kinds(),
        "waitnotify running"
    );

    signal::ctrl_c().await?;
    info!("Shutdown signal received");
    handle.shutdown().await;
    Ok(())
}
