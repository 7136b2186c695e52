//! Configuration file watcher for hot reload.
//!
//! The watcher remembers the last configuration it handed out and only
//! reports a reload when the file's parsed contents differ, so the bursts of
//! modify/create events editors and `notify` produce collapse into one change.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::ForwarderConfig;

/// What a reloaded file changed relative to the configuration in effect.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigChange {
    pub config: ForwarderConfig,
    /// Endpoints or their timeout moved; the node client must be rebuilt.
    pub reconnect_node: bool,
    /// Changed settings that only take effect after a restart.
    pub restart_required: Vec<&'static str>,
}

impl ConfigChange {
    /// Compare `new` against `current`; `None` when nothing changed.
    pub fn between(current: &ForwarderConfig, new: ForwarderConfig) -> Option<Self> {
        if *current == new {
            return None;
        }

        let (old_node, new_node) = (&current.node, &new.node);
        let reconnect_node = old_node.rpc_url != new_node.rpc_url
            || old_node.failover_urls != new_node.failover_urls
            || old_node.rpc_timeout_secs != new_node.rpc_timeout_secs;

        let mut restart_required = Vec::new();
        if old_node.chain_id != new_node.chain_id {
            restart_required.push("node.chain_id");
        }
        if old_node.ping_interval_ms != new_node.ping_interval_ms {
            restart_required.push("node.ping_interval_ms");
        }
        if current.forwarding != new.forwarding {
            restart_required.push("forwarding");
        }
        if current.status != new.status {
            restart_required.push("status");
        }
        if current.bitcoin != new.bitcoin {
            restart_required.push("bitcoin");
        }
        if current.observability != new.observability {
            restart_required.push("observability");
        }
        if current.admin != new.admin {
            restart_required.push("admin");
        }

        Some(Self {
            config: new,
            reconnect_node,
            restart_required,
        })
    }
}

/// Reload state owned by the notify callback.
struct Reloader {
    path: PathBuf,
    current: ForwarderConfig,
    tx: mpsc::UnboundedSender<ConfigChange>,
}

impl Reloader {
    fn on_event(&mut self, res: notify::Result<Event>) {
        let event = match res {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(error = %e, "Config watch error");
                return;
            }
        };
        if !(event.kind.is_modify() || event.kind.is_create()) {
            return;
        }

        let loaded = match load_config(&self.path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
                return;
            }
        };

        match ConfigChange::between(&self.current, loaded) {
            Some(change) => {
                tracing::info!(
                    reconnect_node = change.reconnect_node,
                    restart_required = ?change.restart_required,
                    "Config file changed"
                );
                self.current = change.config.clone();
                let _ = self.tx.send(change);
            }
            None => tracing::debug!("Config file event without changes, ignoring"),
        }
    }
}

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    reloader: Reloader,
}

impl ConfigWatcher {
    /// Create a watcher for `path`, diffing reloads against `current`.
    ///
    /// Returns the watcher and a receiver for configuration changes.
    pub fn new(
        path: &Path,
        current: ForwarderConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ConfigChange>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let reloader = Reloader {
            path: path.to_path_buf(),
            current,
            tx,
        };
        (Self { reloader }, rx)
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for as long as updates are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.reloader.path.clone();
        let mut reloader = self.reloader;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| reloader.on_event(res),
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use notify::event::{AccessKind, ModifyKind};
    use notify::EventKind;

    fn modified() -> notify::Result<Event> {
        Ok(Event::new(EventKind::Modify(ModifyKind::Any)))
    }

    fn write(file: &tempfile::NamedTempFile, contents: &str) {
        std::fs::write(file.path(), contents).unwrap();
    }

    #[test]
    fn test_identical_config_is_no_change() {
        let config = ForwarderConfig::default();
        assert!(ConfigChange::between(&config, config.clone()).is_none());
    }

    #[test]
    fn test_endpoint_change_reconnects() {
        let current = ForwarderConfig::default();
        let mut new = current.clone();
        new.node.failover_urls.push("http://10.0.0.2:8545".into());

        let change = ConfigChange::between(&current, new).unwrap();
        assert!(change.reconnect_node);
        assert!(change.restart_required.is_empty());

        let mut new = current.clone();
        new.node.rpc_timeout_secs += 5;
        assert!(ConfigChange::between(&current, new).unwrap().reconnect_node);
    }

    #[test]
    fn test_rest_of_node_section_needs_restart() {
        let current = ForwarderConfig::default();
        let mut new = current.clone();
        new.node.chain_id = 5;
        new.node.ping_interval_ms += 1;
        new.observability.log_level = "debug".into();

        let change = ConfigChange::between(&current, new).unwrap();
        assert!(!change.reconnect_node);
        assert_eq!(
            change.restart_required,
            vec!["node.chain_id", "node.ping_interval_ms", "observability"]
        );
    }

    #[test]
    fn test_repeated_events_report_one_change() {
        let file = tempfile::NamedTempFile::new().unwrap();
        write(&file, "[node]\nrpc_url = \"http://10.0.0.1:8545\"\n");
        let current = load_config(file.path()).unwrap();

        let (watcher, mut rx) = ConfigWatcher::new(file.path(), current);
        let mut reloader = watcher.reloader;

        write(&file, "[node]\nrpc_url = \"http://10.0.0.9:8545\"\n");
        reloader.on_event(modified());
        reloader.on_event(modified());
        reloader.on_event(Ok(Event::new(EventKind::Access(AccessKind::Any))));

        let change = rx.try_recv().unwrap();
        assert!(change.reconnect_node);
        assert_eq!(change.config.node.rpc_url, "http://10.0.0.9:8545");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_invalid_file_keeps_current() {
        let file = tempfile::NamedTempFile::new().unwrap();
        write(&file, "");
        let (watcher, mut rx) = ConfigWatcher::new(file.path(), ForwarderConfig::default());
        let mut reloader = watcher.reloader;

        write(&file, "[node]\nrpc_url = \"not a url\"\n");
        reloader.on_event(modified());
        assert!(rx.try_recv().is_err());
        assert_eq!(reloader.current, ForwarderConfig::default());
    }
}
