//! Single-slot "something changed" signal.
//!
//! A producer never blocks and never queues more than one marker: while a
//! signal is pending, further signals coalesce into it. Consumers always
//! re-read full state on wakeup, so nothing visible is lost.

use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

/// Sending half. Cheap to clone.
#[derive(Clone, Debug)]
pub struct ChangeNotifier {
    tx: mpsc::Sender<()>,
}

/// Receiving half, owned by whoever drives redraws.
#[derive(Debug)]
pub struct ChangeReceiver {
    rx: mpsc::Receiver<()>,
}

/// Create a connected notifier/receiver pair with capacity one.
pub fn channel() -> (ChangeNotifier, ChangeReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (ChangeNotifier { tx }, ChangeReceiver { rx })
}

impl ChangeNotifier {
    /// Non-blocking. Returns `true` when a new marker was queued, `false` when
    /// it coalesced into a pending one or nobody is listening anymore.
    pub fn signal(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => false,
            Err(TrySendError::Closed(())) => false,
        }
    }
}

impl ChangeReceiver {
    /// Wait for the next signal. Never resolves once every notifier is gone,
    /// so it is safe to keep in a `select!` loop.
    pub async fn changed(&mut self) {
        if self.rx.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }

    /// Consume a pending signal without waiting.
    pub fn try_changed(&mut self) -> bool {
        match self.rx.try_recv() {
            Ok(()) => true,
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => false,
        }
    }
}
