//! Loopback configuration

use std::env;
use std::time::Duration;

use semver::Version;

/// Version advertised when nothing else is configured
pub const DEFAULT_ENVD_VERSION: Version = Version::new(0, 3, 0);

/// Loopback runtime configuration
#[derive(Debug, Clone)]
pub struct LoopbackConfig {
    /// envd version the runtime claims to be
    pub envd_version: Version,

    /// Delay before a started process is spawned and acknowledged
    pub start_delay: Duration,

    /// Events buffered per process for slow observers
    pub event_buffer: usize,

    /// How long to wait for remaining output once a process has exited
    pub drain_timeout: Duration,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            envd_version: DEFAULT_ENVD_VERSION,
            start_delay: Duration::ZERO,
            event_buffer: 1024,
            drain_timeout: Duration::from_secs(2),
        }
    }
}

impl LoopbackConfig {
    /// Defaults overridden by `ENVD_LOOPBACK_VERSION` and `ENVD_LOOPBACK_START_DELAY_MS`
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(version) = env::var("ENVD_LOOPBACK_VERSION") {
            config.envd_version = Version::parse(version.trim())?;
        }
        if let Ok(delay) = env::var("ENVD_LOOPBACK_START_DELAY_MS") {
            config.start_delay = Duration::from_millis(delay.trim().parse()?);
        }

        Ok(config)
    }

    pub fn with_envd_version(mut self, version: Version) -> Self {
        self.envd_version = version;
        self
    }

    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }
}
