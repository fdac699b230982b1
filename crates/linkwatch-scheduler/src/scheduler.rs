//! ProbeScheduler — the sequential monitoring loop.
//!
//! The scheduler owns one background task per monitoring session. The task:
//! - Picks the endpoint under the cursor (clamped to the current list)
//! - Probes it, or passes it over when skip-offline applies
//! - Writes completed results through the status resolver
//! - Advances the cursor, counting a cycle on every wrap
//! - Waits the configured delay before the next endpoint

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use linkwatch_core::ProbeDelay;
use linkwatch_health::{ProbeOutcome, Prober, StatusResolver};
use linkwatch_state::{EndpointFilter, EndpointRegistry, EndpointStatus, NetworkEndpoint};

use crate::cursor::RoundRobinCursor;
use crate::error::{SchedulerError, SchedulerResult};

/// Pause after passing over an OFFLINE endpoint in skip-offline mode.
pub const SKIP_GRACE: Duration = Duration::from_millis(100);

/// Operator-adjustable loop settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSettings {
    pub delay: ProbeDelay,
    /// Pass over endpoints whose stored status is OFFLINE without probing.
    pub skip_offline: bool,
}

/// Point-in-time view of the scheduler for status surfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub current_index: usize,
    pub cycle_count: u64,
    pub endpoint_count: usize,
    /// Endpoint under the cursor, if any.
    pub current_endpoint: Option<String>,
    pub settings: SchedulerSettings,
}

/// State shared between the control handle and the session task.
struct Shared {
    prober: Arc<Prober>,
    resolver: StatusResolver,
    /// Endpoint list of the current session, replaced wholesale.
    endpoints: RwLock<Arc<Vec<NetworkEndpoint>>>,
    cursor: RoundRobinCursor,
    /// Completed passes over the list.
    cycles: AtomicU64,
    settings: watch::Sender<SchedulerSettings>,
}

/// A running monitoring session.
struct Session {
    token: CancellationToken,
    /// Abandon the current probe or wait. One per session, so a skip
    /// nobody consumed does not carry into the next session.
    skip: Arc<Notify>,
    handle: JoinHandle<()>,
}

/// Round-robin probe scheduler.
///
/// Cursor position and cycle count survive `stop()` / `start()`.
pub struct ProbeScheduler {
    shared: Arc<Shared>,
    session: Mutex<Option<Session>>,
}

impl ProbeScheduler {
    pub fn new(prober: Arc<Prober>, resolver: StatusResolver, settings: SchedulerSettings) -> Self {
        let (settings, _) = watch::channel(settings);
        Self {
            shared: Arc::new(Shared {
                prober,
                resolver,
                endpoints: RwLock::new(Arc::new(Vec::new())),
                cursor: RoundRobinCursor::new(),
                cycles: AtomicU64::new(0),
                settings,
            }),
            session: Mutex::new(None),
        }
    }

    /// Fetch endpoints from the registry and start probing them.
    ///
    /// A registry failure or an empty list leaves the scheduler stopped.
    pub async fn start(
        &self,
        registry: &dyn EndpointRegistry,
        filter: &EndpointFilter,
    ) -> SchedulerResult<usize> {
        let endpoints = registry.list_endpoints(filter).await?;
        self.start_with(endpoints)
    }

    /// Start probing the given endpoints. Restarts a running session.
    pub fn start_with(&self, endpoints: Vec<NetworkEndpoint>) -> SchedulerResult<usize> {
        if endpoints.is_empty() {
            return Err(SchedulerError::NoEndpoints);
        }
        let count = endpoints.len();

        let mut session = self.session.lock();
        if let Some(previous) = session.take() {
            previous.token.cancel();
            self.shared.prober.cancel();
            debug!("previous monitoring session replaced");
        }

        self.shared.resolver.store().register_endpoints(&endpoints);
        *self.shared.endpoints.write() = Arc::new(endpoints);
        self.shared.cursor.clamp(count);

        let token = CancellationToken::new();
        let skip = Arc::new(Notify::new());
        let handle = tokio::spawn(run_loop(self.shared.clone(), token.clone(), skip.clone()));
        *session = Some(Session {
            token,
            skip,
            handle,
        });

        let settings = *self.shared.settings.borrow();
        info!(
            endpoints = count,
            index = self.shared.cursor.current(),
            delay_ms = settings.delay.as_millis(),
            skip_offline = settings.skip_offline,
            "monitoring started"
        );
        Ok(count)
    }

    /// Stop the session. The in-flight probe and any pending wait are
    /// abandoned; nothing they produce is written.
    ///
    /// Returns `false` if no session was running.
    pub fn stop(&self) -> bool {
        let Some(session) = self.session.lock().take() else {
            return false;
        };
        session.token.cancel();
        self.shared.prober.cancel();
        info!(
            index = self.shared.cursor.current(),
            cycles = self.cycle_count(),
            "monitoring stopped"
        );
        true
    }

    /// Stop the session and wait for its task to finish.
    pub async fn shutdown(&self) {
        let session = self.session.lock().take();
        if let Some(session) = session {
            session.token.cancel();
            self.shared.prober.cancel();
            let _ = session.handle.await;
            info!("monitoring session shut down");
        }
    }

    /// Abandon the current probe or wait and move to the next endpoint.
    ///
    /// Returns `false` if no session was running.
    pub fn skip_next(&self) -> bool {
        match self.session.lock().as_ref() {
            Some(session) if !session.handle.is_finished() => {
                session.skip.notify_one();
                true
            }
            _ => false,
        }
    }

    pub fn set_delay(&self, delay: ProbeDelay) {
        self.shared.settings.send_modify(|s| s.delay = delay);
        debug!(delay_ms = delay.as_millis(), "probe delay updated");
    }

    pub fn set_skip_offline(&self, skip_offline: bool) {
        self.shared
            .settings
            .send_modify(|s| s.skip_offline = skip_offline);
        debug!(skip_offline, "skip-offline updated");
    }

    /// Swap the endpoint list (upstream filter changed). The cursor is
    /// clamped to the new length.
    pub fn replace_endpoints(&self, endpoints: Vec<NetworkEndpoint>) {
        let count = endpoints.len();
        self.shared.resolver.store().register_endpoints(&endpoints);
        *self.shared.endpoints.write() = Arc::new(endpoints);
        self.shared.cursor.clamp(count);
        debug!(endpoints = count, "endpoint list replaced");
    }

    pub fn is_running(&self) -> bool {
        self.session
            .lock()
            .as_ref()
            .is_some_and(|s| !s.handle.is_finished())
    }

    pub fn cycle_count(&self) -> u64 {
        self.shared.cycles.load(Ordering::Relaxed)
    }

    pub fn current_index(&self) -> usize {
        self.shared.cursor.current()
    }

    pub fn settings(&self) -> SchedulerSettings {
        *self.shared.settings.borrow()
    }

    /// Endpoint list of the current (or last) session.
    pub fn endpoints(&self) -> Arc<Vec<NetworkEndpoint>> {
        self.shared.endpoints.read().clone()
    }

    pub fn status(&self) -> SchedulerStatus {
        let endpoints = self.endpoints();
        let current_index = self.current_index();
        SchedulerStatus {
            running: self.is_running(),
            current_index,
            cycle_count: self.cycle_count(),
            endpoint_count: endpoints.len(),
            current_endpoint: endpoints.get(current_index).map(|e| e.id.clone()),
            settings: self.settings(),
        }
    }
}

impl Drop for ProbeScheduler {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.token.cancel();
        }
    }
}

/// The session task.
async fn run_loop(shared: Arc<Shared>, token: CancellationToken, skip: Arc<Notify>) {
    debug!("probe loop starting");

    loop {
        let endpoints = shared.endpoints.read().clone();
        let len = endpoints.len();
        let settings = *shared.settings.borrow();

        let pause = if len == 0 {
            settings.delay.duration()
        } else {
            let idx = shared.cursor.clamp(len);
            let endpoint = &endpoints[idx];

            let pause = if settings.skip_offline
                && shared.resolver.store().status(&endpoint.id) == Some(EndpointStatus::Offline)
            {
                debug!(endpoint_id = %endpoint.id, index = idx, "offline endpoint skipped");
                SKIP_GRACE
            } else {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = skip.notified() => {
                        shared.prober.cancel();
                        debug!(endpoint_id = %endpoint.id, index = idx, "probe skipped by operator");
                        Duration::ZERO
                    }
                    outcome = shared.prober.probe(endpoint) => {
                        match outcome {
                            ProbeOutcome::Completed(result) if !token.is_cancelled() => {
                                shared.resolver.apply(endpoint, &result, Utc::now());
                            }
                            _ => debug!(endpoint_id = %endpoint.id, "probe result discarded"),
                        }
                        // Delay changes apply from the next wait on.
                        shared.settings.borrow().delay.duration()
                    }
                }
            };

            // The list may have been replaced while the probe was in flight.
            let len = shared.endpoints.read().len();
            if shared.cursor.advance(len) {
                let cycle = shared.cycles.fetch_add(1, Ordering::Relaxed) + 1;
                info!(cycle, endpoints = len, "monitoring cycle completed");
            }
            pause
        };

        if pause.is_zero() {
            if token.is_cancelled() {
                break;
            }
            continue;
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = skip.notified() => debug!("wait skipped by operator"),
            _ = tokio::time::sleep(pause) => {}
        }
    }

    debug!("probe loop stopped");
}
