//! Run cancellation
//!
//! A `watch` channel carrying a single "cancelled" flag. The CLI holds the
//! `Canceller` (tripped by Ctrl-C); every long-running step holds a cheap
//! `CancelSignal` clone and checks it at safe points.

use tokio::sync::watch;

/// Sending side, held by whoever may abort the run
#[derive(Debug)]
pub struct Canceller {
    tx: watch::Sender<bool>,
}

/// Receiving side, checked between batches and lifecycle steps
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

/// Create a linked canceller and signal
pub fn channel() -> (Canceller, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (Canceller { tx }, CancelSignal { rx })
}

impl Canceller {
    pub fn cancel(&self) {
        // send_replace never fails, even with no receivers left
        self.tx.send_replace(true);
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl CancelSignal {
    /// Signal that never fires
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        // Dropping the sender keeps the last value (false) forever
        drop(tx);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the run is cancelled. Pending forever when the
    /// canceller is dropped without cancelling.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::never()
    }
}
