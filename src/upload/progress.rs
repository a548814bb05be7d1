use tokio::sync::watch;

/// Cumulative transfer progress, reported after each accepted fragment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferProgress {
    pub bytes_transferred: u64,
    pub total_bytes: u64,
}

impl TransferProgress {
    pub fn new(bytes_transferred: u64, total_bytes: u64) -> Self {
        Self {
            bytes_transferred,
            total_bytes,
        }
    }

    /// `min(100, floor(bytes * 100 / total))`; 100 for an empty transfer.
    pub fn percent_complete(&self) -> u8 {
        if self.total_bytes == 0 {
            return 100;
        }
        let percent = u128::from(self.bytes_transferred) * 100 / u128::from(self.total_bytes);
        percent.min(100) as u8
    }
}

/// Receives progress updates. Called on the task doing the I/O, so it must
/// return quickly.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, progress: TransferProgress);
}

impl<F> ProgressObserver for F
where
    F: Fn(TransferProgress) + Send + Sync,
{
    fn on_progress(&self, progress: TransferProgress) {
        self(progress)
    }
}

/// Observer that publishes into a watch channel. Slow receivers only ever
/// see the latest value.
pub fn watch_progress() -> (
    impl ProgressObserver + 'static,
    watch::Receiver<TransferProgress>,
) {
    let (tx, rx) = watch::channel(TransferProgress::default());
    let observer = move |progress: TransferProgress| {
        tx.send_replace(progress);
    };
    (observer, rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_percent_complete() {
        assert_eq!(TransferProgress::new(0, 10).percent_complete(), 0);
        assert_eq!(TransferProgress::new(4_194_304, 10_485_760).percent_complete(), 40);
        assert_eq!(TransferProgress::new(9, 10).percent_complete(), 90);
        assert_eq!(TransferProgress::new(10, 10).percent_complete(), 100);
        assert_eq!(TransferProgress::new(20, 10).percent_complete(), 100);
        assert_eq!(TransferProgress::new(u64::MAX, u64::MAX).percent_complete(), 100);
        assert_eq!(TransferProgress::new(0, 0).percent_complete(), 100);
    }

    #[test]
    fn test_closure_observer() {
        let seen = Mutex::new(Vec::new());
        let observer = |p: TransferProgress| seen.lock().unwrap().push(p.percent_complete());
        observer.on_progress(TransferProgress::new(1, 2));
        observer.on_progress(TransferProgress::new(2, 2));
        assert_eq!(*seen.lock().unwrap(), vec![50, 100]);
    }

    #[tokio::test]
    async fn test_watch_keeps_latest() {
        let (observer, rx) = watch_progress();
        observer.on_progress(TransferProgress::new(1, 4));
        observer.on_progress(TransferProgress::new(3, 4));
        assert_eq!(rx.borrow().bytes_transferred, 3);
    }
}
