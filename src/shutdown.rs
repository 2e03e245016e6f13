// src/shutdown.rs

//! Process-wide stop signal shared by the supervisor, pollers and the
//! control loop.

use std::sync::Arc;

use tokio::sync::watch;

/// Broadcast stop flag. Cloning shares the same flag.
///
/// Once triggered it stays triggered; triggering again is a no-op.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request shutdown. Returns `true` only for the call that flipped the flag.
    pub fn trigger(&self) -> bool {
        !self.tx.send_replace(true)
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Resolve once `rx` observes the stop flag (or its sender is gone).
pub async fn stopped(rx: &mut watch::Receiver<bool>) {
    // wait_for checks the current value first, so a flag raised before
    // this call is not missed.
    let _ = rx.wait_for(|stop| *stop).await;
}
