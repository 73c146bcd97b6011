//! Settings persistence.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use tracing::{debug, info};

use super::DisplaySettings;

/// Where display settings live. Writes are fire-and-forget from the
/// engine's point of view: failures are reported, never retried here.
pub trait SettingsStore {
    fn get(&self) -> anyhow::Result<DisplaySettings>;
    fn set(&self, settings: &DisplaySettings) -> anyhow::Result<()>;
}

/// JSON file store. A missing file reads as the default record.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SettingsStore for JsonFileStore {
    fn get(&self) -> anyhow::Result<DisplaySettings> {
        if !self.path.exists() {
            info!(
                "[STORE] {} not found, using default settings",
                self.path.display()
            );
            return Ok(DisplaySettings::default());
        }
        let data = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("parsing {}", self.path.display()))
    }

    fn set(&self, settings: &DisplaySettings) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let data = serde_json::to_string_pretty(settings).context("serializing settings")?;

        // Write then rename
        let tmp = self.temp_path();
        fs::write(&tmp, data).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("renaming {} into place", tmp.display()))?;

        debug!("[STORE] Wrote {}", self.path.display());
        Ok(())
    }
}
