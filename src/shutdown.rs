use tokio_util::sync::CancellationToken;

/// Cancel `token` on Ctrl-C, or on SIGTERM where available.
///
/// If no signal listener can be installed the failure is logged and the
/// token is left alone; callers still own it and can cancel it themselves.
pub fn cancel_on_signal(token: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => tracing::info!("Received Ctrl-C, shutting down"),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                    return;
                }
            },
            _ = terminate() => tracing::info!("Received SIGTERM, shutting down"),
            _ = token.cancelled() => return,
        }
        token.cancel();
    });
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
