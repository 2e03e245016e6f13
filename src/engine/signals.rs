// src/engine/signals.rs

//! OS signal forwarding.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::engine::ControlSignal;

/// Listen for process signals and forward them as [`ControlSignal`]s.
///
/// SIGTERM / SIGINT map to `Shutdown`, SIGHUP to `Reload` and SIGUSR1 to
/// `ForceCheckAll`. The task ends when the receiver is dropped.
#[cfg(unix)]
pub fn spawn_signal_listener(tx: mpsc::Sender<ControlSignal>) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;
    let mut hup = signal(SignalKind::hangup())?;
    let mut usr1 = signal(SignalKind::user_defined1())?;

    Ok(tokio::spawn(async move {
        loop {
            let sig = tokio::select! {
                Some(()) = term.recv() => ControlSignal::Shutdown,
                Some(()) = int.recv() => ControlSignal::Shutdown,
                Some(()) = hup.recv() => ControlSignal::Reload,
                Some(()) = usr1.recv() => ControlSignal::ForceCheckAll,
                else => break,
            };
            debug!(?sig, "signal received");
            if tx.send(sig).await.is_err() {
                break;
            }
        }
    }))
}

/// Only Ctrl-C is available off unix; it maps to `Shutdown`.
#[cfg(not(unix))]
pub fn spawn_signal_listener(tx: mpsc::Sender<ControlSignal>) -> std::io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            if tx.send(ControlSignal::Shutdown).await.is_err() {
                return;
            }
        }
    }))
}
