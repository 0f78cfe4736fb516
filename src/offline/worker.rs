//! Runs the agent on its own thread so the TUI never waits on the network.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, warn};

use super::agent::{OfflineAgent, Phase};
use super::cache::{CacheStorage, SqliteCache};
use super::config::AgentConfig;
use super::network::{HttpNetwork, Network};
use super::registration::{self, RegistrationOutcome};
use crate::db::{Database, LocalStorage};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

enum AgentCommand {
    Message(String),
    Shutdown,
}

/// Progress reported back to the UI thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    Registered(RegistrationOutcome),
    Activated { deleted: Vec<String> },
    Failed(String),
}

impl AgentEvent {
    pub fn describe(&self) -> String {
        match self {
            Self::Registered(RegistrationOutcome::Resumed) => "Offline cache ready".into(),
            Self::Registered(RegistrationOutcome::Activated { deleted })
            | Self::Activated { deleted } => {
                if deleted.is_empty() {
                    "Offline cache activated".into()
                } else {
                    format!("Offline cache activated, removed {}", deleted.join(", "))
                }
            }
            Self::Registered(RegistrationOutcome::Waiting) => {
                "Offline cache installed, waiting to activate (:cache-activate)".into()
            }
            Self::Failed(e) => format!("Offline cache: {e}"),
        }
    }
}

pub struct AgentHandle {
    tx: Sender<AgentCommand>,
    events: Receiver<AgentEvent>,
    handle: Option<JoinHandle<()>>,
}

impl AgentHandle {
    /// Start the agent against the cache tables in `db_path`. `open_clients`
    /// is the number of clients still on the previous version.
    pub fn spawn(config: AgentConfig, db_path: PathBuf, open_clients: usize) -> Result<Self> {
        let (tx, commands) = mpsc::channel();
        let (events_tx, events) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("predger-agent".into())
            .spawn(move || {
                let result = build(config, &db_path).and_then(|(agent, storage)| {
                    run(agent, &storage, open_clients, &commands, &events_tx)
                });
                if let Err(e) = result {
                    error!(error = %format!("{e:#}"), "offline agent stopped");
                    let _ = events_tx.send(AgentEvent::Failed(format!("{e:#}")));
                }
            })
            .context("Failed to start offline agent thread")?;

        Ok(Self {
            tx,
            events,
            handle: Some(handle),
        })
    }

    /// Post a JSON message to the agent.
    pub fn post_message(&self, payload: &str) {
        if self.tx.send(AgentCommand::Message(payload.to_string())).is_err() {
            debug!("offline agent is not running");
        }
    }

    /// Next pending event, if any. Never blocks.
    pub fn try_event(&self) -> Option<AgentEvent> {
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

impl Drop for AgentHandle {
    fn drop(&mut self) {
        let _ = self.tx.send(AgentCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("offline agent thread panicked");
            }
        }
    }
}

fn build(
    config: AgentConfig,
    db_path: &std::path::Path,
) -> Result<(OfflineAgent<SqliteCache, HttpNetwork>, Database)> {
    let cache = SqliteCache::open(db_path)?;
    let storage = Database::open(db_path)?;
    let network = HttpNetwork::new(config.origin_url()?)?;
    let agent = OfflineAgent::new(config, cache, network)?;
    Ok((agent, storage))
}

fn run<C: CacheStorage, N: Network>(
    mut agent: OfflineAgent<C, N>,
    storage: &dyn LocalStorage,
    open_clients: usize,
    commands: &Receiver<AgentCommand>,
    events: &Sender<AgentEvent>,
) -> Result<()> {
    let outcome = registration::register(&mut agent, storage, open_clients)?;
    let _ = events.send(AgentEvent::Registered(outcome));

    for command in commands {
        match command {
            AgentCommand::Message(payload) => {
                if !agent.handle_message(&payload) || !agent.may_activate(open_clients) {
                    continue;
                }
                match agent.activate() {
                    Ok(report) => {
                        if let Err(e) = registration::record_active(&agent, storage) {
                            warn!(error = %format!("{e:#}"), "agent registration not saved");
                        }
                        let _ = events.send(AgentEvent::Activated {
                            deleted: report.deleted,
                        });
                    }
                    Err(e) => {
                        let _ = events.send(AgentEvent::Failed(e.to_string()));
                    }
                }
            }
            AgentCommand::Shutdown => break,
        }
    }

    if agent.phase() != Phase::Active {
        debug!(phase = %agent.phase(), "offline agent shutting down before activation");
    }
    if !agent.keep_alive().wait_idle(SHUTDOWN_GRACE) {
        warn!("offline agent shut down with work in flight");
    }
    Ok(())
}
