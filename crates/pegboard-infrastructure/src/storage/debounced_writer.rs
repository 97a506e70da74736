//! Coalescing background writer.
//!
//! Bursts of state changes are collapsed into one write after a quiet
//! period. Write failures are logged and never reach the caller; the
//! in-memory state stays authoritative.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pegboard_core::error::Result;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

/// A synchronous sink for values of type `T`.
pub trait BlockingStore<T>: Send + Sync {
    fn store(&self, value: &T) -> Result<()>;
}

enum Command {
    Touched,
    Flush(oneshot::Sender<()>),
}

/// Debounces writes of `T` to a [`BlockingStore`].
pub struct DebouncedWriter<T> {
    name: &'static str,
    pending: Arc<Mutex<Option<T>>>,
    store: Arc<dyn BlockingStore<T>>,
    tx: mpsc::UnboundedSender<Command>,
}

impl<T> DebouncedWriter<T>
where
    T: Send + 'static,
{
    /// Starts the writer task on the current tokio runtime.
    pub fn spawn(name: &'static str, store: Arc<dyn BlockingStore<T>>, debounce: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(Mutex::new(None));
        tokio::spawn(run(name, rx, Arc::clone(&pending), Arc::clone(&store), debounce));
        Self {
            name,
            pending,
            store,
            tx,
        }
    }

    /// Replaces the pending value and restarts the quiet period.
    pub fn schedule(&self, value: T) {
        if let Ok(mut slot) = self.pending.lock() {
            *slot = Some(value);
        }
        if self.tx.send(Command::Touched).is_err() {
            tracing::warn!("[{}] Writer task stopped; change kept in memory only", self.name);
        }
    }

    /// Writes the pending value now and waits for it.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Best-effort synchronous write of the pending value, for shutdown.
    pub fn shutdown_blocking(&self) {
        if let Some(value) = take(&self.pending) {
            match self.store.store(&value) {
                Ok(()) => tracing::info!("[{}] Flushed pending state on shutdown", self.name),
                Err(e) => tracing::error!("[{}] Shutdown flush failed: {}", self.name, e),
            }
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.lock().map(|p| p.is_some()).unwrap_or(false)
    }
}

fn take<T>(pending: &Mutex<Option<T>>) -> Option<T> {
    pending.lock().ok().and_then(|mut slot| slot.take())
}

async fn run<T: Send + 'static>(
    name: &'static str,
    mut rx: mpsc::UnboundedReceiver<Command>,
    pending: Arc<Mutex<Option<T>>>,
    store: Arc<dyn BlockingStore<T>>,
    debounce: Duration,
) {
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(Command::Touched) => deadline = Some(Instant::now() + debounce),
                Some(Command::Flush(ack)) => {
                    deadline = None;
                    write_pending(name, &pending, &store).await;
                    let _ = ack.send(());
                }
                None => {
                    write_pending(name, &pending, &store).await;
                    break;
                }
            },
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)),
                if deadline.is_some() =>
            {
                deadline = None;
                write_pending(name, &pending, &store).await;
            }
        }
    }
    tracing::debug!("[{}] Writer task finished", name);
}

async fn write_pending<T: Send + 'static>(
    name: &'static str,
    pending: &Arc<Mutex<Option<T>>>,
    store: &Arc<dyn BlockingStore<T>>,
) {
    let Some(value) = take(pending) else {
        return;
    };
    let store = Arc::clone(store);
    match tokio::task::spawn_blocking(move || store.store(&value)).await {
        Ok(Ok(())) => tracing::debug!("[{}] Saved", name),
        Ok(Err(e)) => tracing::error!("[{}] Save failed: {}", name, e),
        Err(e) => tracing::error!("[{}] Save task panicked: {}", name, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        writes: Mutex<Vec<u32>>,
    }

    impl BlockingStore<u32> for Recorder {
        fn store(&self, value: &u32) -> Result<()> {
            self.writes.lock().unwrap().push(*value);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_written_once() {
        let recorder = Arc::new(Recorder::default());
        let writer = DebouncedWriter::spawn("Test", recorder.clone(), Duration::from_millis(500));

        for value in 1..=5 {
            writer.schedule(value);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(recorder.writes.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(600)).await;
        writer.flush().await;
        assert_eq!(*recorder.writes.lock().unwrap(), vec![5]);
    }

    #[tokio::test]
    async fn test_flush_writes_immediately() {
        let recorder = Arc::new(Recorder::default());
        let writer = DebouncedWriter::spawn("Test", recorder.clone(), Duration::from_secs(60));
        writer.schedule(7);
        writer.flush().await;
        assert_eq!(*recorder.writes.lock().unwrap(), vec![7]);
        assert!(!writer.has_pending());
    }

    #[tokio::test]
    async fn test_shutdown_blocking_writes_pending() {
        let recorder = Arc::new(Recorder::default());
        let writer = DebouncedWriter::spawn("Test", recorder.clone(), Duration::from_secs(60));
        writer.schedule(9);
        writer.shutdown_blocking();
        assert_eq!(*recorder.writes.lock().unwrap(), vec![9]);

        // Nothing left for the task to write.
        writer.flush().await;
        assert_eq!(recorder.writes.lock().unwrap().len(), 1);
    }
}
