//! Connectivity monitoring.
//!
//! Tracks two signals: the raw network flag reported by the platform and a
//! deeper "can reach the backend" flag maintained by lightweight reachability
//! probes. Probes are throttled so bursts of transitions cannot flood the
//! network; a raw transition always gets a fresh probe immediately.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;

use crate::util;

/// Default backend health endpoint probed for reachability
pub const DEFAULT_PROBE_URL: &str = "https://api.kitlist.app/health";

/// Composite connectivity state fanned out to subscribers.
///
/// The default is the unknown starting point: the platform is assumed online
/// but the backend has not been probed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityState {
    /// Raw platform network flag
    pub is_online: bool,
    /// Whether the backend answered a reachability probe
    pub is_connected: bool,
    /// Completion time of the most recent probe
    pub last_probe_at: Option<DateTime<Utc>>,
}

impl Default for ConnectivityState {
    fn default() -> Self {
        Self {
            is_online: true,
            is_connected: false,
            last_probe_at: None,
        }
    }
}

/// Probe timing and target. Compile-time/composition-root constants, not
/// end-user options.
#[derive(Debug, Clone)]
pub struct ConnectivityConfig {
    /// Reachability endpoint
    pub probe_url: String,
    /// Per-probe timeout
    pub probe_timeout: Duration,
    /// Minimum gap between throttled probes
    pub min_probe_interval: Duration,
    /// Cadence of the periodic probe task
    pub periodic_interval: Duration,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_url: DEFAULT_PROBE_URL.to_string(),
            probe_timeout: Duration::from_secs(4),
            min_probe_interval: Duration::from_secs(30),
            periodic_interval: Duration::from_secs(120),
        }
    }
}

/// A single reachability check against the backend
pub trait ReachabilityProbe: Send + Sync + 'static {
    /// Returns whether the backend answered in time
    fn probe(&self) -> impl Future<Output = bool> + Send;
}

/// HTTP implementation of [`ReachabilityProbe`]: a short-timeout HEAD request
/// to the configured endpoint. Any HTTP response counts as reachable.
pub struct HttpReachabilityProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpReachabilityProbe {
    /// Build a probe against the given endpoint
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: url.into(),
        }
    }
}

impl ReachabilityProbe for HttpReachabilityProbe {
    async fn probe(&self) -> bool {
        match self.client.head(&self.url).send().await {
            Ok(_) => true,
            Err(error) => {
                tracing::debug!(%error, url = %self.url, "reachability probe failed");
                false
            }
        }
    }
}

struct MonitorInner<P> {
    probe: P,
    config: ConnectivityConfig,
    state_tx: watch::Sender<ConnectivityState>,
    // Throttle guard for probes not triggered by a raw transition
    last_probe_started: Mutex<Option<Instant>>,
}

/// Connectivity monitor handle. Cheap to clone; all clones share state.
pub struct ConnectivityMonitor<P = HttpReachabilityProbe> {
    inner: Arc<MonitorInner<P>>,
}

impl<P> Clone for ConnectivityMonitor<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ConnectivityMonitor<HttpReachabilityProbe> {
    /// Create a monitor probing over HTTP per the given config
    #[must_use]
    pub fn with_default_probe(config: ConnectivityConfig) -> Self {
        if !util::is_http_url(&config.probe_url) {
            tracing::warn!(url = %config.probe_url, "probe url is not http(s); probes will fail");
        }
        let probe = HttpReachabilityProbe::new(config.probe_url.clone(), config.probe_timeout);
        Self::new(probe, config)
    }
}

impl<P: ReachabilityProbe> ConnectivityMonitor<P> {
    /// Create a monitor with an explicit probe implementation
    #[must_use]
    pub fn new(probe: P, config: ConnectivityConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectivityState::default());
        Self {
            inner: Arc::new(MonitorInner {
                probe,
                config,
                state_tx,
                last_probe_started: Mutex::new(None),
            }),
        }
    }

    /// Current state snapshot
    #[must_use]
    pub fn state(&self) -> ConnectivityState {
        *self.inner.state_tx.borrow()
    }

    /// Subscribe to state changes.
    ///
    /// The receiver holds the current state immediately and observes every
    /// subsequent change; dropping it unsubscribes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.inner.state_tx.subscribe()
    }

    /// Feed a raw platform online/offline transition.
    ///
    /// Going offline forces `is_connected` off without probing; going online
    /// triggers an immediate probe that bypasses the throttle.
    pub async fn set_raw_online(&self, online: bool) {
        let changed = self.inner.state_tx.send_if_modified(|state| {
            if state.is_online == online && (online || !state.is_connected) {
                return false;
            }
            state.is_online = online;
            if !online {
                state.is_connected = false;
            }
            true
        });

        if changed {
            tracing::info!(online, "raw connectivity transition");
        }

        if online {
            self.run_probe(true).await;
        }
    }

    /// Manual probe request. Respects the minimum probe interval; returns the
    /// (possibly refreshed) backend reachability flag.
    pub async fn check_now(&self) -> bool {
        self.run_probe(false).await;
        self.state().is_connected
    }

    /// Spawn the periodic probe task. Aborting the returned handle stops it.
    #[must_use]
    pub fn spawn_periodic(&self) -> tokio::task::JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(monitor.inner.config.periodic_interval);
            // The immediate first tick would race the startup probe
            ticker.tick().await;
            loop {
                ticker.tick().await;
                monitor.run_probe(false).await;
            }
        })
    }

    async fn run_probe(&self, bypass_throttle: bool) {
        // Raw offline: probing cannot change the answer
        if !self.state().is_online {
            return;
        }

        {
            let mut last_started = self.inner.last_probe_started.lock().await;
            if !bypass_throttle {
                if let Some(started) = *last_started {
                    if started.elapsed() < self.inner.config.min_probe_interval {
                        tracing::debug!("reachability probe throttled");
                        return;
                    }
                }
            }
            *last_started = Some(Instant::now());
        }

        let reachable = self.inner.probe.probe().await;

        self.inner.state_tx.send_modify(|state| {
            // A failed probe while the platform still reports online is not
            // trusted as evidence of a dead backend; stay aligned with the
            // raw flag and let the next probe settle it.
            state.is_connected = if reachable { true } else { state.is_online };
            state.last_probe_at = Some(util::now());
        });

        if !reachable {
            tracing::debug!("probe failed while online; keeping is_connected aligned with raw flag");
        }
    }
}
