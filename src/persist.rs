//! Debounced settings push.
//!
//! Every edit hands the new stored record to the [`Persister`]. Pushes that
//! arrive within the quiet window of each other are coalesced and only the
//! latest record is written. Outcomes are reported back to the view that
//! owns the persister, unless that view has been closed in the meantime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::settings::store::SettingsStore;
use crate::settings::DisplaySettings;

pub const PERSIST_QUIET_WINDOW: Duration = Duration::from_millis(300);

/// Set while the owning view is open.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn close(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    Saved,
    Failed(String),
}

pub struct Persister {
    tx: watch::Sender<Option<DisplaySettings>>,
    handle: JoinHandle<()>,
}

impl Persister {
    pub fn spawn<S>(
        store: Arc<S>,
        quiet: Duration,
        liveness: Liveness,
        outcomes: mpsc::Sender<PersistOutcome>,
    ) -> Self
    where
        S: SettingsStore + Send + Sync + 'static,
    {
        let (tx, rx) = watch::channel::<Option<DisplaySettings>>(None);
        let handle = tokio::spawn(persist_loop(store, quiet, liveness, rx, outcomes));
        Self { tx, handle }
    }

    /// Replace the pending record. Never blocks; a record not yet written
    /// is superseded.
    pub fn push(&self, settings: DisplaySettings) {
        self.tx.send_replace(Some(settings));
    }

    /// Flush anything pending and wait for the writer to finish.
    pub async fn finish(self) {
        drop(self.tx);
        if let Err(e) = self.handle.await {
            warn!("[DISPLAY] Persister task failed: {e}");
        }
    }
}

async fn persist_loop<S>(
    store: Arc<S>,
    quiet: Duration,
    liveness: Liveness,
    mut rx: watch::Receiver<Option<DisplaySettings>>,
    outcomes: mpsc::Sender<PersistOutcome>,
) where
    S: SettingsStore + Send + Sync + 'static,
{
    // An unseen record is reported before the closed sender, so the last
    // push is always flushed
    while rx.changed().await.is_ok() {
        let mut coalesced = 0usize;
        // Keep absorbing until the input has been quiet for a full window
        loop {
            match tokio::time::timeout(quiet, rx.changed()).await {
                Ok(Ok(())) => coalesced += 1,
                Ok(Err(_)) | Err(_) => break,
            }
        }
        if coalesced > 0 {
            debug!("[DISPLAY] Coalesced {coalesced} settings update(s)");
        }
        let Some(latest) = rx.borrow_and_update().clone() else {
            continue;
        };

        let writer = store.clone();
        let result = tokio::task::spawn_blocking(move || writer.set(&latest)).await;
        let outcome = match result {
            Ok(Ok(())) => PersistOutcome::Saved,
            Ok(Err(e)) => {
                warn!("[DISPLAY] Error updating display settings: {e:#}");
                PersistOutcome::Failed(format!("{e:#}"))
            }
            Err(e) => {
                warn!("[DISPLAY] Settings writer panicked: {e}");
                PersistOutcome::Failed(e.to_string())
            }
        };

        if liveness.is_alive() {
            let _ = outcomes.send(outcome).await;
        } else {
            debug!("[DISPLAY] View closed, discarding persist outcome {outcome:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        writes: Mutex<Vec<DisplaySettings>>,
        fail: bool,
        delay: Duration,
    }

    impl SettingsStore for RecordingStore {
        fn get(&self) -> anyhow::Result<DisplaySettings> {
            Ok(DisplaySettings::default())
        }

        fn set(&self, settings: &DisplaySettings) -> anyhow::Result<()> {
            std::thread::sleep(self.delay);
            if self.fail {
                anyhow::bail!("disk full");
            }
            self.writes.lock().unwrap().push(settings.clone());
            Ok(())
        }
    }

    fn with_duration(minutes: f64) -> DisplaySettings {
        let mut settings = DisplaySettings::default();
        settings.sleep.duration = minutes;
        settings
    }

    #[tokio::test]
    async fn test_burst_is_coalesced_into_one_write() {
        let store = Arc::new(RecordingStore::default());
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let persister = Persister::spawn(
            store.clone(),
            Duration::from_millis(50),
            Liveness::new(),
            out_tx,
        );

        for minutes in 1..=5 {
            persister.push(with_duration(minutes as f64));
        }
        persister.finish().await;

        let writes = store.writes.lock().unwrap().clone();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].sleep.duration, 5.0);
        assert_eq!(out_rx.recv().await, Some(PersistOutcome::Saved));
    }

    #[tokio::test]
    async fn test_separated_pushes_write_separately() {
        let store = Arc::new(RecordingStore::default());
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let persister = Persister::spawn(
            store.clone(),
            Duration::from_millis(20),
            Liveness::new(),
            out_tx,
        );

        persister.push(with_duration(1.0));
        assert_eq!(out_rx.recv().await, Some(PersistOutcome::Saved));
        persister.push(with_duration(2.0));
        persister.finish().await;

        assert_eq!(store.writes.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_is_reported_not_retried() {
        let store = Arc::new(RecordingStore {
            fail: true,
            ..Default::default()
        });
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let persister = Persister::spawn(store, Duration::from_millis(10), Liveness::new(), out_tx);

        persister.push(DisplaySettings::default());
        persister.finish().await;

        match out_rx.recv().await {
            Some(PersistOutcome::Failed(msg)) => assert!(msg.contains("disk full")),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(out_rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_outcome_dropped_after_view_closes() {
        let store = Arc::new(RecordingStore::default());
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let liveness = Liveness::new();
        let persister = Persister::spawn(
            store.clone(),
            Duration::from_millis(10),
            liveness.clone(),
            out_tx,
        );

        persister.push(DisplaySettings::default());
        liveness.close();
        persister.finish().await;

        // The write still happens, only the outcome is discarded
        assert_eq!(store.writes.lock().unwrap().len(), 1);
        assert_eq!(out_rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_edits_during_slow_write_keep_the_newest() {
        let store = Arc::new(RecordingStore {
            delay: Duration::from_millis(200),
            ..Default::default()
        });
        let (out_tx, _out_rx) = mpsc::channel(8);
        let persister = Persister::spawn(
            store.clone(),
            Duration::from_millis(10),
            Liveness::new(),
            out_tx,
        );

        persister.push(with_duration(0.0));
        // Let the first write start, then edit repeatedly while it runs
        tokio::time::sleep(Duration::from_millis(50)).await;
        for minutes in 1..=40 {
            persister.push(with_duration(minutes as f64));
        }
        persister.finish().await;

        let durations: Vec<f64> = store
            .writes
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.sleep.duration)
            .collect();
        assert_eq!(durations, vec![0.0, 40.0]);
    }
}
