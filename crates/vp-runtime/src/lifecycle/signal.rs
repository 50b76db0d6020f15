use tokio_util::sync::CancellationToken;

/// Cancel `cancel` on the first Ctrl-C (SIGINT) or SIGTERM.
pub async fn wait_for_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        vp_info!(sys, signal = "SIGINT", "received signal, shutting down");
                    }
                    _ = sigterm.recv() => {
                        vp_info!(sys, signal = "SIGTERM", "received signal, shutting down");
                    }
                }
            }
            Err(e) => {
                vp_warn!(sys, error = %e, "SIGTERM handler unavailable, listening for Ctrl-C only");
                wait_ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    wait_ctrl_c().await;

    cancel.cancel();
}

async fn wait_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => vp_info!(sys, "received shutdown signal, initiating graceful shutdown"),
        // Without a handler the engine runs until its input ends.
        Err(e) => {
            vp_warn!(sys, error = %e, "Ctrl-C handler unavailable");
            std::future::pending::<()>().await;
        }
    }
}
