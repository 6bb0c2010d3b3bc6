//! Connection configuration
//!
//! Values resolve once, when the config is built: explicit option first, then
//! the process environment, then the built-in default.

use std::collections::HashMap;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Public domain sandboxes are served from
pub const DEFAULT_DOMAIN: &str = "e2b.app";

/// Port envd listens on inside every sandbox
pub const ENVD_PORT: u16 = 49983;

/// Default bound on waiting for a call or stream to start responding
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Default lifetime bound for a started command
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Caller-supplied connection settings; unset fields fall back to the environment
#[derive(Debug, Clone, Default)]
pub struct ConnectionOptions {
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub domain: Option<String>,
    pub api_url: Option<String>,
    pub debug: Option<bool>,
    /// Zero disables the request timeout
    pub request_timeout: Option<Duration>,
    /// Extra headers sent with every request
    pub headers: HashMap<String, String>,
}

/// Resolved, immutable connection configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    api_key: Option<String>,
    access_token: Option<String>,
    domain: String,
    api_url: String,
    debug: bool,
    request_timeout: Duration,
    headers: HashMap<String, String>,
}

impl ConnectionConfig {
    /// Resolve options against the process environment
    pub fn new(opts: ConnectionOptions) -> Self {
        Self::resolve(opts, |key| std::env::var(key).ok())
    }

    /// Resolve purely from the environment and defaults
    pub fn from_env() -> Self {
        Self::new(ConnectionOptions::default())
    }

    /// Resolve options against an arbitrary variable lookup
    pub fn resolve<F>(opts: ConnectionOptions, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = opts.api_key.or_else(|| env("E2B_API_KEY"));
        let access_token = opts.access_token.or_else(|| env("E2B_ACCESS_TOKEN"));
        let domain = opts
            .domain
            .or_else(|| env("E2B_DOMAIN"))
            .unwrap_or_else(|| DEFAULT_DOMAIN.to_string());
        let debug = opts
            .debug
            .or_else(|| env("E2B_DEBUG").map(|v| v.eq_ignore_ascii_case("true")))
            .unwrap_or(false);
        let api_url = opts
            .api_url
            .or_else(|| env("E2B_API_URL"))
            .unwrap_or_else(|| {
                if debug {
                    "http://localhost:3000".to_string()
                } else {
                    format!("https://api.{}", domain)
                }
            });
        let request_timeout = opts
            .request_timeout
            .or_else(|| {
                env("E2B_REQUEST_TIMEOUT_MS")
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(Duration::from_millis)
            })
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        Self {
            api_key,
            access_token,
            domain,
            api_url,
            debug,
            request_timeout,
            headers: opts.headers,
        }
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Headers sent to envd: the extra headers plus the access token, if any.
    ///
    /// The API key is only meant for the control plane and is never sent to envd.
    pub fn headers(&self) -> HashMap<String, String> {
        let mut headers = self.headers.clone();
        if let Some(token) = &self.access_token {
            headers.insert("X-Access-Token".to_string(), token.clone());
        }
        headers
    }

    /// Base URL of envd inside the given sandbox
    pub fn envd_url(&self, sandbox_id: &str) -> String {
        if self.debug {
            format!("http://localhost:{}", ENVD_PORT)
        } else {
            format!("https://{}-{}.{}", ENVD_PORT, sandbox_id, self.domain)
        }
    }

    /// Effective request timeout; `None` when disabled
    pub fn request_timeout(&self, override_timeout: Option<Duration>) -> Option<Duration> {
        let timeout = override_timeout.unwrap_or(self.request_timeout);
        (!timeout.is_zero()).then_some(timeout)
    }

    /// Arm a cancellation token that fires after the effective request timeout.
    ///
    /// Must be called from within a tokio runtime.
    pub fn deadline(&self, override_timeout: Option<Duration>) -> Deadline {
        Deadline::after(self.request_timeout(override_timeout))
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::resolve(ConnectionOptions::default(), |_| None)
    }
}

/// Cancellation token paired with the timer that cancels it
#[derive(Debug)]
pub struct Deadline {
    token: CancellationToken,
    timeout: Option<Duration>,
    timer: Option<JoinHandle<()>>,
}

impl Deadline {
    /// `None` yields a deadline that never fires
    pub fn after(timeout: Option<Duration>) -> Self {
        let token = CancellationToken::new();
        let timer = timeout.map(|timeout| {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                token.cancel();
            })
        });
        Self {
            token,
            timeout,
            timer,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_expired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the deadline has fired
    pub async fn expired(&self) {
        self.token.cancelled().await
    }

    /// Stop the timer; the token is left as it is
    pub fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        self.disarm();
    }
}
