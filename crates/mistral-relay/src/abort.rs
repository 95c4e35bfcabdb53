use tokio::sync::watch;

/// Handle used to request cancellation of a relay call or streaming session.
#[derive(Clone, Debug)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl Default for AbortHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Requests cancellation.
    ///
    /// Idempotent. Every `AbortSignal` derived from this handle observes it,
    /// including signals created afterwards.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    /// Returns true once `abort` has been called.
    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }

    /// Creates a signal that observes this handle.
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiving side of an `AbortHandle`, threaded into every suspension point.
#[derive(Clone, Debug)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves when cancellation is requested; pending forever if the handle
    /// is dropped without aborting.
    pub async fn aborted(&self) {
        let mut rx = self.rx.clone();
        let fired = rx.wait_for(|aborted| *aborted).await.is_ok();
        if !fired {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn signal_resolves_after_abort() {
        let handle = AbortHandle::new();
        let signal = handle.signal();
        assert!(!signal.is_aborted());

        let waiter = tokio::spawn({
            let signal = signal.clone();
            async move { signal.aborted().await }
        });
        handle.abort();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("signal should fire")
            .expect("join");
        assert!(signal.is_aborted());
        assert!(handle.is_aborted());
    }

    #[tokio::test]
    async fn signal_created_after_abort_is_already_aborted() {
        let handle = AbortHandle::new();
        handle.abort();
        let signal = handle.signal();
        assert!(signal.is_aborted());
        tokio::time::timeout(Duration::from_millis(100), signal.aborted())
            .await
            .expect("already aborted");
    }

    #[tokio::test]
    async fn never_signal_stays_pending() {
        let signal = AbortSignal::never();
        assert!(!signal.is_aborted());
        let waited = tokio::time::timeout(Duration::from_millis(20), signal.aborted()).await;
        assert!(waited.is_err());
    }
}
