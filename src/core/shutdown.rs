//! # Termination signals that trigger node disposal.
//!
//! [`Node::run_until_shutdown`](crate::Node::run_until_shutdown) parks on
//! [`wait_for_shutdown_signal`] and runs the coordinated dispose pass once it
//! resolves, so every service gets its `stop`/`dispose` hooks before the
//! process exits.
//!
//! On Unix the helper resolves on `SIGINT`, `SIGTERM` (what systemd and
//! Kubernetes send) or `SIGQUIT`; elsewhere it falls back to
//! [`tokio::signal::ctrl_c`]. Signals a service wants to handle itself (e.g.
//! `SIGHUP` for config reload) are not consumed here — register those in a
//! `run` hook.

/// Resolves when the process receives a termination signal.
///
/// Listeners are registered per call; `Err` means registration itself
/// failed, in which case the caller should dispose immediately rather than
/// run unsupervised.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Resolves when the process receives a termination signal.
///
/// Non-Unix fallback: `Ctrl-C` only.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
