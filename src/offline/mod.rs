//! Offline cache agent.
//!
//! Caches the application shell under a versioned bucket, serves later GET
//! requests cache-first, and deletes buckets from older versions when a new
//! version activates. The agent itself is synchronous; `worker` runs it on a
//! background thread for the TUI.

mod agent;
mod cache;
mod config;
mod error;
mod lifetime;
mod network;
mod registration;
mod worker;

pub use agent::{ActivationReport, AgentMessage, FetchOutcome, OfflineAgent, Phase};
pub use cache::{CacheStorage, CachedResponse, SqliteCache};
pub use config::AgentConfig;
pub use error::AgentError;
pub use lifetime::{KeepAlive, WorkToken};
pub use network::{FetchError, HttpNetwork, Network, Request, Response, ResponseKind};
pub(crate) use registration::{
    record_active, register, resume_recorded, RegistrationOutcome, VERSION_KEY,
};
pub use worker::{AgentEvent, AgentHandle};

#[cfg(test)]
mod tests;
