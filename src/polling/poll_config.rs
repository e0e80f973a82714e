use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use once_cell::sync::OnceCell;
use serde::Deserialize;

use crate::polling::types::PollOptions;

#[derive(Debug, Copy, Clone, Deserialize)]
#[serde(default)]
pub struct ResourcePolling {
    pub interval_ms: u64,
    pub enabled: bool,
    pub run_immediately: bool,

    /// Per-invocation deadline; absent means an invocation may run indefinitely.
    pub deadline_ms: Option<u64>,
}

impl Default for ResourcePolling {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            enabled: true,
            run_immediately: true,
            deadline_ms: None,
        }
    }
}

impl ResourcePolling {
    pub fn options(&self) -> PollOptions {
        PollOptions::every(Duration::from_millis(self.interval_ms))
            .enabled(self.enabled)
            .run_immediately(self.run_immediately)
            .deadline(self.deadline_ms.map(Duration::from_millis))
    }

    fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            bail!("interval_ms must be > 0");
        }
        if self.deadline_ms == Some(0) {
            bail!("deadline_ms must be > 0 when set");
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub orders: ResourcePolling,
    pub tables: ResourcePolling,
}

static CONFIG: OnceCell<PollingConfig> = OnceCell::new();

impl PollingConfig {
    const FILE_NAME: &'static str = "polling.yml";

    /// Loads `polling.yml` from the working directory once; a missing file means defaults.
    pub fn load() -> Result<&'static PollingConfig> {
        CONFIG.get_or_try_init(|| Self::from_path(Self::FILE_NAME))
    }

    fn from_path(path: impl AsRef<Path>) -> Result<PollingConfig> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no polling config found; using defaults");
            return Ok(PollingConfig::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read polling config {}", path.display()))?;

        Self::parse(&raw).with_context(|| format!("invalid polling config {}", path.display()))
    }

    fn parse(raw: &str) -> Result<PollingConfig> {
        let config: PollingConfig =
            serde_yaml::from_str(raw).context("failed to parse polling config")?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.orders
            .validate()
            .context("invalid polling settings for orders")?;
        self.tables
            .validate()
            .context("invalid polling settings for tables")?;
        Ok(())
    }
}
