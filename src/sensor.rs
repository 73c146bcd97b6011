//! Ambient light sensor feed and poller.
//!
//! The sensor exposes one integer attribute (sysfs style). An empty
//! attribute means no reading yet; a failed read or parse is a sensor error.
//! Consumers only see `Option<u32>`: both cases are "no sample".

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Poll period on the main display view.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Poll period while a calibration session is open.
pub const CALIBRATION_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub trait SensorFeed {
    /// Raw reading, `Ok(None)` when the sensor has nothing yet.
    fn read(&mut self) -> anyhow::Result<Option<u32>>;
}

/// Reads a raw value from a text attribute such as
/// `/sys/bus/iio/devices/iio:device0/in_illuminance_raw`.
pub struct FileSensor {
    path: PathBuf,
}

impl FileSensor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SensorFeed for FileSensor {
    fn read(&mut self) -> anyhow::Result<Option<u32>> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let raw = text
            .parse::<u32>()
            .with_context(|| format!("bad sensor value {text:?}"))?;
        Ok(Some(raw))
    }
}

/// One poll, with errors folded into "no sample".
pub fn sample(feed: &mut dyn SensorFeed) -> Option<u32> {
    match feed.read() {
        Ok(value) => value,
        Err(e) => {
            debug!("[SENSOR] Read failed: {e:#}");
            None
        }
    }
}

/// Poll `feed` every `period`, publishing each result.
///
/// Every tick is published, even when the value repeats, so receivers can
/// use `changed()` as their tick. The task ends once all receivers are gone.
pub fn spawn_poller<F>(mut feed: F, period: Duration) -> (watch::Receiver<Option<u32>>, JoinHandle<()>)
where
    F: SensorFeed + Send + 'static,
{
    let (tx, rx) = watch::channel(None);
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let value = sample(&mut feed);
            if tx.send(value).is_err() {
                debug!("[SENSOR] No listeners left, poller exiting");
                break;
            }
        }
    });
    (rx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use tempfile::TempDir;

    struct ScriptedFeed {
        values: VecDeque<anyhow::Result<Option<u32>>>,
    }

    impl SensorFeed for ScriptedFeed {
        fn read(&mut self) -> anyhow::Result<Option<u32>> {
            self.values.pop_front().unwrap_or(Ok(None))
        }
    }

    #[test]
    fn test_file_sensor_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("in_illuminance_raw");
        let mut sensor = FileSensor::new(&path);

        // Missing attribute is an error, folded to None by sample()
        assert!(sensor.read().is_err());
        assert_eq!(sample(&mut sensor), None);

        fs::write(&path, "").unwrap();
        assert_eq!(sensor.read().unwrap(), None);

        fs::write(&path, "4021\n").unwrap();
        assert_eq!(sensor.read().unwrap(), Some(4021));

        fs::write(&path, "4294967295").unwrap();
        assert_eq!(sensor.read().unwrap(), Some(u32::MAX));

        fs::write(&path, "-3").unwrap();
        assert!(sensor.read().is_err());
    }

    #[tokio::test]
    async fn test_poller_publishes_every_tick() {
        let feed = ScriptedFeed {
            values: VecDeque::from(vec![
                Ok(Some(10)),
                Err(anyhow::anyhow!("i2c timeout")),
                Ok(Some(10)),
            ]),
        };
        let (mut rx, handle) = spawn_poller(feed, Duration::from_millis(5));

        let mut seen = Vec::new();
        for _ in 0..3 {
            rx.changed().await.unwrap();
            seen.push(*rx.borrow_and_update());
        }
        assert_eq!(seen, vec![Some(10), None, Some(10)]);

        drop(rx);
        handle.await.unwrap();
    }
}
