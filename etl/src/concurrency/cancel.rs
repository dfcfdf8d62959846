//! Cooperative cancellation of sync passes.
//!
//! The host keeps the [`CancelTx`] and hands a [`CancelRx`] to every pass. The engine polls
//! [`CancelRx::is_cancelled`] before each table, each query and each sub-batch.

use tokio::sync::watch;

/// Transmitter side of the cancellation channel.
#[derive(Debug, Clone)]
pub struct CancelTx(watch::Sender<bool>);

impl CancelTx {
    /// Requests cancellation of every pass holding a receiver.
    pub fn cancel(&self) {
        // Infallible so cancelling works even after all receivers are gone.
        self.0.send_replace(true);
    }

    /// Clears a previous cancellation so the next pass can run.
    pub fn reset(&self) {
        self.0.send_replace(false);
    }

    pub fn subscribe(&self) -> CancelRx {
        CancelRx(self.0.subscribe())
    }
}

/// Receiver side of the cancellation channel.
#[derive(Debug, Clone)]
pub struct CancelRx(watch::Receiver<bool>);

impl CancelRx {
    /// Returns a receiver that is never cancelled.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        // Dropping the sender keeps the last value readable.
        drop(tx);
        CancelRx(rx)
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Waits until cancellation is requested. Never completes if the sender is dropped first.
    pub async fn cancelled(&mut self) {
        if self.0.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Creates a new cancellation channel in the not-cancelled state.
pub fn create_cancel_channel() -> (CancelTx, CancelRx) {
    let (tx, rx) = watch::channel(false);
    (CancelTx(tx), CancelRx(rx))
}
