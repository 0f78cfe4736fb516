use anyhow::{Context, Result};
use tracing::{info, warn};

use super::agent::OfflineAgent;
use super::cache::CacheStorage;
use super::network::Network;
use crate::db::LocalStorage;

/// Local storage key holding the agent version that last became active.
pub const VERSION_KEY: &str = "predger.agent.version";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// This version was already active in an earlier run; nothing was fetched.
    Resumed,
    /// Installed and activated in this run.
    Activated { deleted: Vec<String> },
    /// Installed, but waiting for clients of the previous version to close.
    Waiting,
}

/// Bring a fresh agent up to the furthest phase it can reach right now.
pub(crate) fn register<C: CacheStorage, N: Network>(
    agent: &mut OfflineAgent<C, N>,
    storage: &dyn LocalStorage,
    open_clients: usize,
) -> Result<RegistrationOutcome> {
    let version = agent.config().version.clone();
    if resume_recorded(agent, storage)? {
        info!(%version, "offline agent already active");
        return Ok(RegistrationOutcome::Resumed);
    }

    agent.install()?;
    if !agent.may_activate(open_clients) {
        info!(%version, open_clients, "offline agent installed, waiting");
        return Ok(RegistrationOutcome::Waiting);
    }
    let report = agent.activate()?;
    record_active(agent, storage)?;
    Ok(RegistrationOutcome::Activated {
        deleted: report.deleted,
    })
}

/// Resume the agent only if its version is the one recorded as active. A
/// bucket that was installed but never activated does not count.
pub(crate) fn resume_recorded<C: CacheStorage, N: Network>(
    agent: &mut OfflineAgent<C, N>,
    storage: &dyn LocalStorage,
) -> Result<bool> {
    let recorded = match storage.get_item(VERSION_KEY) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "could not read agent registration");
            None
        }
    };
    if recorded.as_deref() != Some(agent.config().version.as_str()) {
        return Ok(false);
    }
    Ok(agent.resume()?)
}

/// Remember that the agent's version is the active one.
pub(crate) fn record_active<C: CacheStorage, N: Network>(
    agent: &OfflineAgent<C, N>,
    storage: &dyn LocalStorage,
) -> Result<()> {
    storage
        .set_item(VERSION_KEY, &agent.config().version)
        .context("Failed to record active agent version")
}
