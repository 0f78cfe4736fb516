//! The agent's lifecycle state machine and fetch interception.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use url::Url;

use super::cache::CacheStorage;
use super::config::AgentConfig;
use super::error::AgentError;
use super::lifetime::KeepAlive;
use super::network::{Network, Request, Response};

/// Lifecycle phase. Each external signal moves the agent at most one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninstalled,
    Installing,
    /// Installed and waiting to take over.
    Installed,
    Activating,
    Active,
    /// Install failed; this version will never activate.
    Redundant,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Uninstalled => "uninstalled",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Active => "active",
            Self::Redundant => "redundant",
        };
        write!(f, "{s}")
    }
}

/// Messages the application can post to the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentMessage {
    /// Take over immediately instead of waiting for open clients to close.
    SkipWaiting,
}

impl AgentMessage {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// What the agent did with an intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Not handled; the caller goes to the network itself.
    Passthrough,
    /// Served from the current bucket without touching the network.
    Cached(Response),
    /// Fetched from the network (and stored if eligible).
    Network(Response),
}

impl FetchOutcome {
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Passthrough => None,
            Self::Cached(r) | Self::Network(r) => Some(r),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    pub deleted: Vec<String>,
}

pub struct OfflineAgent<C, N> {
    config: AgentConfig,
    origin: Url,
    cache: C,
    network: N,
    phase: Phase,
    skip_waiting: bool,
    keep_alive: KeepAlive,
}

impl<C: CacheStorage, N: Network> OfflineAgent<C, N> {
    pub fn new(config: AgentConfig, cache: C, network: N) -> Result<Self, AgentError> {
        let origin = config.origin_url()?;
        Ok(Self {
            config,
            origin,
            cache,
            network,
            phase: Phase::Uninstalled,
            skip_waiting: false,
            keep_alive: KeepAlive::default(),
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn keep_alive(&self) -> &KeepAlive {
        &self.keep_alive
    }

    /// Cache the application shell. All-or-nothing: if any manifest entry
    /// cannot be fetched with a 200, nothing is stored and the agent becomes
    /// redundant.
    pub fn install(&mut self) -> Result<(), AgentError> {
        if !matches!(self.phase, Phase::Uninstalled | Phase::Redundant) {
            return Err(AgentError::InvalidTransition {
                phase: self.phase,
                signal: "install",
            });
        }
        let _token = self.keep_alive.token();
        self.phase = Phase::Installing;
        info!(cache = self.config.cache_name(), "installing offline agent");

        match self.precache() {
            Ok(count) => {
                self.phase = Phase::Installed;
                if self.config.skip_waiting_on_install {
                    self.skip_waiting = true;
                }
                info!(entries = count, "application shell cached");
                Ok(())
            }
            Err(e) => {
                self.phase = Phase::Redundant;
                error!(error = %e, "install failed");
                Err(e)
            }
        }
    }

    fn precache(&self) -> Result<usize, AgentError> {
        let bucket = self.config.cache_name();
        let mut entries = Vec::with_capacity(self.config.manifest.len());
        for url in self.config.manifest_urls()? {
            let request = Request::get(url);
            let response = self
                .network
                .fetch(&request)
                .map_err(|e| AgentError::Install {
                    url: request.url.to_string(),
                    reason: e.to_string(),
                })?;
            if !response.is_cacheable() {
                return Err(AgentError::Install {
                    url: request.url.to_string(),
                    reason: format!("status {}", response.status),
                });
            }
            entries.push((request, response));
        }

        let existed = self.cache.has_bucket(bucket)?;
        self.cache.open_bucket(bucket)?;
        if let Err(e) = self.cache.put_all(bucket, &entries) {
            if !existed {
                self.cache.delete_bucket(bucket)?;
            }
            return Err(e.into());
        }
        Ok(entries.len())
    }

    /// Whether the runtime should activate now, given how many clients are
    /// still attached to the previous version.
    pub fn may_activate(&self, open_clients: usize) -> bool {
        self.phase == Phase::Installed && (self.skip_waiting || open_clients == 0)
    }

    /// Drop every bucket from older versions, then take control of clients.
    pub fn activate(&mut self) -> Result<ActivationReport, AgentError> {
        if self.phase != Phase::Installed {
            return Err(AgentError::InvalidTransition {
                phase: self.phase,
                signal: "activate",
            });
        }
        let _token = self.keep_alive.token();
        self.phase = Phase::Activating;
        info!(cache = self.config.cache_name(), "activating offline agent");

        match self.evict_stale_buckets() {
            Ok(deleted) => {
                self.phase = Phase::Active;
                debug!("clients claimed");
                Ok(ActivationReport { deleted })
            }
            Err(e) => {
                self.phase = Phase::Installed;
                error!(error = %e, "activation failed");
                Err(e)
            }
        }
    }

    fn evict_stale_buckets(&self) -> Result<Vec<String>, AgentError> {
        let current = self.config.cache_name();
        let mut deleted = Vec::new();
        for name in self.cache.bucket_names()? {
            if name != current {
                info!(cache = %name, "deleting old cache");
                self.cache.delete_bucket(&name)?;
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    /// Pick up where a previous process left off: if the current bucket
    /// exists, go straight to `Active`. Returns false if a fresh install is
    /// needed.
    pub fn resume(&mut self) -> Result<bool, AgentError> {
        if self.phase != Phase::Uninstalled {
            return Err(AgentError::InvalidTransition {
                phase: self.phase,
                signal: "resume",
            });
        }
        if self.cache.has_bucket(self.config.cache_name())? {
            self.phase = Phase::Active;
            debug!(cache = self.config.cache_name(), "resumed active agent");
            return Ok(true);
        }
        Ok(false)
    }

    /// Handle a posted message. Returns true if it was recognized.
    pub fn handle_message(&mut self, payload: &str) -> bool {
        match serde_json::from_str::<AgentMessage>(payload) {
            Ok(AgentMessage::SkipWaiting) => {
                self.skip_waiting = true;
                info!(phase = %self.phase, "skip waiting requested");
                true
            }
            Err(e) => {
                debug!(error = %e, "ignoring unrecognized message");
                false
            }
        }
    }

    /// Cache-first interception. Only GET requests are handled, and only once
    /// the agent is active; everything else passes through.
    pub fn handle_fetch(&self, request: &Request) -> Result<FetchOutcome, AgentError> {
        if self.phase != Phase::Active || request.method != Method::GET {
            return Ok(FetchOutcome::Passthrough);
        }
        let _token = self.keep_alive.token();
        let bucket = self.config.cache_name();

        match self.cache.match_request(bucket, request) {
            Ok(Some(hit)) => {
                debug!(url = %request.url, "serving from cache");
                return Ok(FetchOutcome::Cached(hit.response));
            }
            Ok(None) => {}
            Err(e) => warn!(url = %request.url, error = %e, "cache lookup failed"),
        }

        let response = self.network.fetch(request).map_err(|e| {
            error!(url = %request.url, error = %e, "fetch failed");
            e
        })?;
        if !response.is_cacheable() {
            return Ok(FetchOutcome::Network(response));
        }

        if self.config.is_cacheable_origin(&self.origin, &request.url) {
            let copy = response.clone();
            match self.cache.put(bucket, request, &copy) {
                Ok(()) => debug!(url = %request.url, "cached new resource"),
                Err(e) => warn!(url = %request.url, error = %e, "could not cache response"),
            }
        }
        Ok(FetchOutcome::Network(response))
    }
}
