//! Active connectivity checking against the account-chain node.
//!
//! # Responsibilities
//! - Periodically ping the current node
//! - Track connected/disconnected with edge-triggered callbacks
//! - Drop results of pings started before an endpoint swap

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Notify;

use crate::blockchain::NodeEndpoint;
use crate::health::state::{ConnectionListener, ConnectivityState, ListenerError, Transition};
use crate::lifecycle::ScheduledTask;
use crate::observability::metrics;

/// What applying a ping result did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PingOutcome {
    /// The ping belonged to a superseded generation and was discarded.
    Stale,
    /// State recorded, no edge.
    Unchanged,
    Connected,
    Disconnected(String),
}

struct MonitorShared {
    state: Mutex<ConnectivityState>,
    listener: Arc<dyn ConnectionListener>,
    reconfigured: Notify,
}

impl MonitorShared {
    fn state(&self) -> MutexGuard<'_, ConnectivityState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run a listener callback; neither an error nor a panic escapes.
    fn notify(&self, callback: &'static str, call: impl FnOnce() -> Result<(), ListenerError>) {
        match panic::catch_unwind(AssertUnwindSafe(call)) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(callback, error = %e, "Connectivity callback failed"),
            Err(payload) => tracing::error!(
                callback,
                panic = panic_message(payload.as_ref()),
                "Connectivity callback panicked"
            ),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

/// Cheap, cloneable read access to the monitor's state.
#[derive(Clone)]
pub struct ConnectivityHandle {
    shared: Arc<MonitorShared>,
}

impl ConnectivityHandle {
    pub fn is_connected(&self) -> bool {
        self.shared.state().connected
    }

    pub fn snapshot(&self) -> ConnectivityState {
        *self.shared.state()
    }
}

/// Pings the node on a fixed delay and reports connectivity edges.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    endpoint: NodeEndpoint,
    shared: Arc<MonitorShared>,
}

impl ConnectivityMonitor {
    pub fn new(endpoint: NodeEndpoint, listener: Arc<dyn ConnectionListener>) -> Self {
        Self {
            endpoint,
            shared: Arc::new(MonitorShared {
                state: Mutex::new(ConnectivityState::default()),
                listener,
                reconfigured: Notify::new(),
            }),
        }
    }

    pub fn handle(&self) -> ConnectivityHandle {
        ConnectivityHandle {
            shared: self.shared.clone(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.shared.state().connected
    }

    pub fn generation(&self) -> u64 {
        self.shared.state().generation
    }

    /// Call after the underlying endpoint has been swapped.
    ///
    /// Invalidates in-flight pings and cuts the running loop's delay short so
    /// the new endpoint is probed immediately.
    pub fn on_generation_change(&self) -> u64 {
        let generation = {
            let mut state = self.shared.state();
            state.generation += 1;
            state.generation
        };
        tracing::info!(generation, "Node endpoint changed, restarting connectivity checks");
        self.shared.reconfigured.notify_one();
        generation
    }

    /// Ping once against the current endpoint and apply the result.
    pub async fn ping_once(&self) -> PingOutcome {
        let generation = self.generation();
        let rpc = self.endpoint.rpc();
        let result = rpc.ping().await.map_err(|e| e.to_string());
        self.apply_ping_result(generation, result)
    }

    /// Apply a ping result that was started under `generation`.
    pub fn apply_ping_result(&self, generation: u64, result: Result<(), String>) -> PingOutcome {
        let transition = {
            let state = self.shared.state();
            if state.generation != generation {
                tracing::debug!(
                    ping_generation = generation,
                    current_generation = state.generation,
                    "Discarding superseded ping result"
                );
                return PingOutcome::Stale;
            }
            state.transition_for(&result)
        };

        // Callbacks run before the state flips and without the lock held.
        let outcome = match transition {
            Transition::None => PingOutcome::Unchanged,
            Transition::Connected => {
                tracing::info!(generation, "Node connected");
                let listener = &self.shared.listener;
                self.shared.notify("on_connected", || listener.on_connected());
                PingOutcome::Connected
            }
            Transition::Disconnected(reason) => {
                tracing::warn!(generation, reason = %reason, "Node disconnected");
                let listener = &self.shared.listener;
                self.shared
                    .notify("on_disconnected", || listener.on_disconnected(&reason));
                PingOutcome::Disconnected(reason)
            }
        };

        let mut state = self.shared.state();
        if state.generation != generation {
            return PingOutcome::Stale;
        }
        state.record(&result);
        metrics::record_connectivity("eth", state.connected);
        outcome
    }

    /// Start pinging every `ping_interval` until the task is stopped.
    pub fn start(&self, ping_interval: Duration) -> ScheduledTask {
        let monitor = self.clone();
        ScheduledTask::spawn("connectivity-monitor", move |mut stop| async move {
            tracing::info!(
                interval_ms = ping_interval.as_millis() as u64,
                "Connectivity monitor starting"
            );
            loop {
                tokio::select! {
                    _ = monitor.ping_once() => {}
                    _ = stop.recv() => break,
                }
                tokio::select! {
                    _ = tokio::time::sleep(ping_interval) => {}
                    _ = monitor.shared.reconfigured.notified() => {}
                    _ = stop.recv() => break,
                }
            }
            tracing::info!("Connectivity monitor stopped");
        })
    }
}
