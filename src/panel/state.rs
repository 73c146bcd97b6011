//! Shared panel snapshot for the status emitter.

use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

/// What the display section currently shows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub calibrated: bool,
    pub raw_ambient_light: Option<u32>,
    /// Readable percent.
    pub ambient_light: Option<f64>,
    pub brightness: Option<f64>,
    pub contrast: Option<f64>,
    /// Why the values are missing, when they are.
    pub message: Option<&'static str>,
    pub editing: bool,
    pub rows: usize,
    pub flagged_rows: usize,
    pub persist_error: Option<String>,
}

/// Latest snapshot plus a flag set whenever it changes.
pub struct PanelState {
    inner: Mutex<(StateSnapshot, bool)>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl PanelState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new((StateSnapshot::default(), false)),
        }
    }

    pub fn update(&self, snapshot: StateSnapshot) {
        let mut inner = lock(&self.inner);
        // Only mark changed if values actually differ
        if inner.0 != snapshot {
            *inner = (snapshot, true);
        }
    }

    pub fn snapshot(&self) -> StateSnapshot {
        lock(&self.inner).0.clone()
    }

    /// Return snapshot if changed since last pop, else None.
    pub fn pop_if_changed(&self) -> Option<StateSnapshot> {
        let mut inner = lock(&self.inner);
        if inner.1 {
            inner.1 = false;
            Some(inner.0.clone())
        } else {
            None
        }
    }
}

impl Default for PanelState {
    fn default() -> Self {
        Self::new()
    }
}
