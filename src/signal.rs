//! Cooperative cancellation for cache and remote operations
//!
//! Every store and service operation takes a [`CancelSignal`]. A signal
//! that is already set aborts the operation before it starts; remote
//! calls additionally race the signal mid-flight.

use tokio::sync::watch;

/// Sending half of a cancellation pair
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Mark the paired signal as cancelled
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Observer half of a cancellation pair
///
/// Cheap to clone; all clones observe the same cancellation state.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    /// A signal that can never be cancelled
    pub fn none() -> Self {
        Self { rx: None }
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolve once cancellation is requested
    ///
    /// Never resolves for [`CancelSignal::none`] or when the handle is
    /// dropped without cancelling; intended for `tokio::select!` races.
    pub async fn cancelled(&self) {
        let Some(rx) = &self.rx else {
            return std::future::pending().await;
        };

        let mut rx = rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                // Handle dropped without cancelling
                return std::future::pending().await;
            }
        }
    }
}

/// Create a connected handle/signal pair
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx: Some(rx) })
}
