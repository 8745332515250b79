//! Process shutdown signal

use crate::infrastructure::log_messages::shutdown as messages;
use tracing::{info, warn};

/// Resolves on SIGINT or SIGTERM, whichever arrives first
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(error = %error, "{}", messages::CTRL_C_FAILED);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                warn!(error = %error, "{}", messages::SIGTERM_FAILED);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("{}", messages::SIGNAL_RECEIVED);
}
