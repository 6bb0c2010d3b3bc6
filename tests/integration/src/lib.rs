//! Integration test library - common utilities

use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use envd_loopback::{LoopbackConfig, LoopbackEnvd};
use envd_sdk::{ConnectionConfig, ConnectionOptions, EnvdClient};
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static TRACING: Once = Once::new();

/// Install a test subscriber once; filter with `RUST_LOG`
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_test_writer())
            .with(
                EnvFilter::builder()
                    .with_default_directive(Level::WARN.into())
                    .from_env_lossy(),
            )
            .try_init();
    });
}

/// A loopback envd with a client attached
pub struct TestEnv {
    pub envd: LoopbackEnvd,
    pub client: EnvdClient,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_config(LoopbackConfig::default())
    }

    pub fn with_config(config: LoopbackConfig) -> Self {
        init_tracing();

        let envd = LoopbackEnvd::new(config);
        let connection = ConnectionConfig::resolve(ConnectionOptions::default(), |_| None);
        let client = envd.client(connection);
        Self { envd, client }
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared byte sink for output callbacks
#[derive(Clone, Default)]
pub struct Collected(Arc<Mutex<Vec<u8>>>);

impl Collected {
    pub fn push(&self, bytes: &[u8]) {
        if let Ok(mut buf) = self.0.lock() {
            buf.extend_from_slice(bytes);
        }
    }

    pub fn text(&self) -> String {
        self.0
            .lock()
            .map(|buf| String::from_utf8_lossy(&buf).into_owned())
            .unwrap_or_default()
    }

    /// Poll until the collected text contains `needle`
    pub async fn wait_for(&self, needle: &str, timeout: Duration) -> anyhow::Result<()> {
        let polling = async {
            while !self.text().contains(needle) {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        };
        tokio::time::timeout(timeout, polling)
            .await
            .map_err(|_| anyhow::anyhow!("{:?} not seen, got {:?}", needle, self.text()))
    }
}
