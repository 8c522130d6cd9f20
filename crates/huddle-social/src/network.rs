//! Connectivity signal.
//!
//! Stands in for the browser's `online`/`offline` events. The owner of the
//! connection flips the status; presence managers subscribed to it leave
//! when it drops and rejoin when it returns.

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Online,
    Offline,
}

/// Publishes connectivity transitions to any number of subscribers.
pub struct NetworkMonitor {
    tx: watch::Sender<NetworkStatus>,
}

impl NetworkMonitor {
    /// Starts online.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(NetworkStatus::Online);
        Self { tx }
    }

    /// Publish a status. Repeating the current status is not a transition
    /// and wakes nobody.
    pub fn set(&self, status: NetworkStatus) {
        self.tx.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
    }

    pub fn status(&self) -> NetworkStatus {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<NetworkStatus> {
        self.tx.subscribe()
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}
