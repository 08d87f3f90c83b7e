//! Online/offline signal shared between the host and the sync engine.

use tokio::sync::watch;

/// Create a connected signal/status pair
pub fn network_channel(initially_online: bool) -> (NetworkSignal, NetworkStatus) {
    let (tx, rx) = watch::channel(initially_online);
    (NetworkSignal { tx }, NetworkStatus { rx })
}

/// Host side: reports connectivity changes
#[derive(Debug)]
pub struct NetworkSignal {
    tx: watch::Sender<bool>,
}

impl NetworkSignal {
    /// Publish the current connectivity; returns true if it changed
    pub fn set_online(&self, online: bool) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        })
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Another status handle observing this signal
    pub fn status(&self) -> NetworkStatus {
        NetworkStatus {
            rx: self.tx.subscribe(),
        }
    }
}

/// Engine side: reads connectivity and waits for transitions
#[derive(Debug, Clone)]
pub struct NetworkStatus {
    rx: watch::Receiver<bool>,
}

impl NetworkStatus {
    /// Status that never changes, for hosts without a connectivity source
    pub fn fixed(online: bool) -> Self {
        let (tx, rx) = watch::channel(online);
        drop(tx);
        Self { rx }
    }

    pub fn is_online(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for the next transition and return the new value.
    ///
    /// Returns `None` once the signal side is gone.
    pub async fn changed(&mut self) -> Option<bool> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn status_follows_signal() {
        let (signal, mut status) = network_channel(true);
        assert!(status.is_online());

        assert!(signal.set_online(false));
        assert_eq!(status.changed().await, Some(false));
        assert!(!status.is_online());
    }

    #[tokio::test]
    async fn repeated_value_is_not_a_transition() {
        let (signal, status) = network_channel(true);
        assert!(!signal.set_online(true));
        assert!(!status.rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn changed_returns_none_when_signal_dropped() {
        let (signal, mut status) = network_channel(true);
        drop(signal);
        assert_eq!(status.changed().await, None);
        assert!(status.is_online());
    }

    #[tokio::test]
    async fn fixed_status_reports_value() {
        let mut status = NetworkStatus::fixed(false);
        assert!(!status.is_online());
        assert_eq!(status.changed().await, None);
    }
}
