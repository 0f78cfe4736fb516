#![allow(clippy::unwrap_used)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::Method;
use url::Url;

use super::*;
use crate::db::LocalStorage;

const ORIGIN: &str = "http://localhost:8080/";

// ── Fakes ─────────────────────────────────────────────────────

enum Scripted {
    Reply(Response),
    Fail,
}

/// Serves `Response::ok(<path>)` for every URL unless scripted otherwise.
#[derive(Default)]
struct FakeNetwork {
    scripted: Mutex<HashMap<String, Scripted>>,
    calls: AtomicUsize,
}

impl FakeNetwork {
    fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn script(&self, url: &str, reply: Scripted) {
        self.scripted.lock().unwrap().insert(url.to_string(), reply);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn reset_calls(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }
}

impl Network for Arc<FakeNetwork> {
    fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let url = request.url.to_string();
        match self.scripted.lock().unwrap().get(&url) {
            Some(Scripted::Reply(r)) => Ok(r.clone()),
            Some(Scripted::Fail) => Err(FetchError::Network {
                url,
                message: "connection refused".into(),
            }),
            None => Ok(Response::ok(request.url.path().as_bytes())),
        }
    }
}

#[derive(Default)]
struct MemoryStorage(RefCell<HashMap<String, String>>);

impl LocalStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.0.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.0.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

fn url(s: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(s).unwrap()
}

fn get(s: &str) -> Request {
    Request::get(url(s))
}

fn agent_with(
    config: AgentConfig,
    cache: SqliteCache,
    net: &Arc<FakeNetwork>,
) -> OfflineAgent<SqliteCache, Arc<FakeNetwork>> {
    OfflineAgent::new(config, cache, Arc::clone(net)).unwrap()
}

fn new_agent(net: &Arc<FakeNetwork>) -> OfflineAgent<SqliteCache, Arc<FakeNetwork>> {
    agent_with(
        AgentConfig::default(),
        SqliteCache::open_in_memory().unwrap(),
        net,
    )
}

fn active_agent(net: &Arc<FakeNetwork>) -> OfflineAgent<SqliteCache, Arc<FakeNetwork>> {
    let mut agent = new_agent(net);
    agent.install().unwrap();
    agent.activate().unwrap();
    net.reset_calls();
    agent
}

fn is_cached(agent: &OfflineAgent<SqliteCache, Arc<FakeNetwork>>, request: &Request) -> bool {
    agent
        .cache()
        .match_request(agent.config().cache_name(), request)
        .unwrap()
        .is_some()
}

// ── Install ───────────────────────────────────────────────────

#[test]
fn test_install_caches_whole_manifest() {
    let net = FakeNetwork::shared();
    let mut agent = new_agent(&net);
    assert_eq!(agent.phase(), Phase::Uninstalled);

    agent.install().unwrap();

    assert_eq!(agent.phase(), Phase::Installed);
    assert_eq!(net.calls(), 6);
    assert_eq!(agent.cache().entry_count("predger-v1").unwrap(), 6);
    assert!(is_cached(&agent, &get("/index.html")));
    assert!(is_cached(&agent, &get("/src/favicon.ico")));
}

#[test]
fn test_install_is_all_or_nothing_on_bad_status() {
    let net = FakeNetwork::shared();
    net.script(
        url("/styles.css").as_str(),
        Scripted::Reply(Response {
            status: 404,
            ..Response::ok("")
        }),
    );
    let mut agent = new_agent(&net);

    let err = agent.install().unwrap_err();

    assert!(matches!(err, AgentError::Install { ref url, .. } if url.ends_with("/styles.css")));
    assert_eq!(agent.phase(), Phase::Redundant);
    assert!(!agent.cache().has_bucket("predger-v1").unwrap());
}

#[test]
fn test_install_fails_on_network_error() {
    let net = FakeNetwork::shared();
    net.script(url("/app.js").as_str(), Scripted::Fail);
    let mut agent = new_agent(&net);

    assert!(matches!(agent.install(), Err(AgentError::Install { .. })));
    assert_eq!(agent.phase(), Phase::Redundant);
    assert_eq!(agent.cache().entry_count("predger-v1").unwrap(), 0);
}

#[test]
fn test_redundant_agent_can_retry_install() {
    let net = FakeNetwork::shared();
    net.script(url("/app.js").as_str(), Scripted::Fail);
    let mut agent = new_agent(&net);
    assert!(agent.install().is_err());

    net.scripted.lock().unwrap().clear();
    agent.install().unwrap();
    assert_eq!(agent.phase(), Phase::Installed);
}

#[test]
fn test_install_twice_is_rejected() {
    let net = FakeNetwork::shared();
    let mut agent = new_agent(&net);
    agent.install().unwrap();

    let err = agent.install().unwrap_err();
    assert_eq!(err.to_string(), "cannot install while installed");
    assert_eq!(agent.phase(), Phase::Installed);
}

#[test]
fn test_invalid_origin_is_rejected() {
    let config = AgentConfig {
        origin: "not a url".into(),
        ..AgentConfig::default()
    };
    let result = OfflineAgent::new(
        config,
        SqliteCache::open_in_memory().unwrap(),
        FakeNetwork::shared(),
    );
    assert!(matches!(result, Err(AgentError::InvalidUrl(_))));
}

// ── Activate ──────────────────────────────────────────────────

#[test]
fn test_activate_deletes_stale_buckets_only() {
    let net = FakeNetwork::shared();
    let cache = SqliteCache::open_in_memory().unwrap();
    cache.open_bucket("predger-v0").unwrap();
    cache.put("predger-v0", &get("/old.js"), &Response::ok("old")).unwrap();
    cache.open_bucket("other").unwrap();
    let mut agent = agent_with(AgentConfig::default(), cache, &net);

    agent.install().unwrap();
    let report = agent.activate().unwrap();

    assert_eq!(agent.phase(), Phase::Active);
    assert_eq!(report.deleted, vec!["other", "predger-v0"]);
    assert_eq!(agent.cache().bucket_names().unwrap(), vec!["predger-v1"]);
    assert_eq!(agent.cache().entry_count("predger-v1").unwrap(), 6);
    assert_eq!(agent.cache().entry_count("predger-v0").unwrap(), 0);
}

#[test]
fn test_activate_requires_installed() {
    let net = FakeNetwork::shared();
    let mut agent = new_agent(&net);

    let err = agent.activate().unwrap_err();
    assert!(matches!(
        err,
        AgentError::InvalidTransition {
            phase: Phase::Uninstalled,
            signal: "activate"
        }
    ));
    assert_eq!(agent.phase(), Phase::Uninstalled);
}

#[test]
fn test_may_activate_waits_for_clients_without_skip_waiting() {
    let net = FakeNetwork::shared();
    let config = AgentConfig {
        skip_waiting_on_install: false,
        ..AgentConfig::default()
    };
    let mut agent = agent_with(config, SqliteCache::open_in_memory().unwrap(), &net);
    assert!(!agent.may_activate(0));

    agent.install().unwrap();
    assert!(!agent.may_activate(2));
    assert!(agent.may_activate(0));

    assert!(agent.handle_message(r#"{"type":"SKIP_WAITING"}"#));
    assert!(agent.may_activate(2));
}

#[test]
fn test_install_sets_skip_waiting_by_default() {
    let net = FakeNetwork::shared();
    let mut agent = new_agent(&net);
    agent.install().unwrap();
    assert!(agent.may_activate(3));
}

#[test]
fn test_unknown_messages_are_ignored() {
    let net = FakeNetwork::shared();
    let mut agent = new_agent(&net);
    assert!(!agent.handle_message(r#"{"type":"CLAIM"}"#));
    assert!(!agent.handle_message("skip waiting"));
    assert!(!agent.handle_message("{}"));
    assert_eq!(agent.phase(), Phase::Uninstalled);
}

// ── Fetch ─────────────────────────────────────────────────────

#[test]
fn test_cached_request_skips_network() {
    let net = FakeNetwork::shared();
    let agent = active_agent(&net);

    let outcome = agent.handle_fetch(&get("/app.js")).unwrap();

    assert_eq!(outcome, FetchOutcome::Cached(Response::ok("/app.js")));
    assert_eq!(net.calls(), 0);
}

#[test]
fn test_fragment_is_ignored_for_lookup() {
    let net = FakeNetwork::shared();
    let agent = active_agent(&net);

    let outcome = agent.handle_fetch(&get("/index.html#ledger")).unwrap();
    assert!(matches!(outcome, FetchOutcome::Cached(_)));
    assert_eq!(net.calls(), 0);
}

#[test]
fn test_miss_fetches_then_serves_from_cache() {
    let net = FakeNetwork::shared();
    let agent = active_agent(&net);
    let request = get("/src/icons/coin.svg");

    let first = agent.handle_fetch(&request).unwrap();
    let second = agent.handle_fetch(&request).unwrap();

    assert_eq!(first, FetchOutcome::Network(Response::ok("/src/icons/coin.svg")));
    assert_eq!(second, FetchOutcome::Cached(Response::ok("/src/icons/coin.svg")));
    assert_eq!(net.calls(), 1);
}

#[test]
fn test_allow_listed_host_is_cached() {
    let net = FakeNetwork::shared();
    let agent = active_agent(&net);
    let request = Request::get(Url::parse("https://esm.sh/uuid@9").unwrap());

    agent.handle_fetch(&request).unwrap();
    assert!(is_cached(&agent, &request));
}

#[test]
fn test_other_hosts_are_not_cached() {
    let net = FakeNetwork::shared();
    let agent = active_agent(&net);
    let request = Request::get(Url::parse("https://cdn.example.com/lib.js").unwrap());

    let outcome = agent.handle_fetch(&request).unwrap();
    assert!(matches!(outcome, FetchOutcome::Network(_)));
    assert!(!is_cached(&agent, &request));

    agent.handle_fetch(&request).unwrap();
    assert_eq!(net.calls(), 2);
}

#[test]
fn test_non_200_is_returned_but_not_cached() {
    let net = FakeNetwork::shared();
    let agent = active_agent(&net);
    let request = get("/missing.js");
    let not_found = Response {
        status: 404,
        ..Response::ok("not found")
    };
    net.script(request.url.as_str(), Scripted::Reply(not_found.clone()));

    let outcome = agent.handle_fetch(&request).unwrap();

    assert_eq!(outcome, FetchOutcome::Network(not_found));
    assert!(!is_cached(&agent, &request));
}

#[test]
fn test_error_kind_is_not_cached() {
    let net = FakeNetwork::shared();
    let agent = active_agent(&net);
    let request = get("/broken.js");
    net.script(
        request.url.as_str(),
        Scripted::Reply(Response {
            kind: ResponseKind::Error,
            ..Response::ok("")
        }),
    );

    agent.handle_fetch(&request).unwrap();
    assert!(!is_cached(&agent, &request));
}

#[test]
fn test_network_failure_propagates() {
    let net = FakeNetwork::shared();
    let agent = active_agent(&net);
    let request = get("/offline.js");
    net.script(request.url.as_str(), Scripted::Fail);

    let err = agent.handle_fetch(&request).unwrap_err();
    assert!(matches!(err, AgentError::Fetch(FetchError::Network { .. })));
    assert!(!is_cached(&agent, &request));
}

#[test]
fn test_non_get_passes_through() {
    let net = FakeNetwork::shared();
    let agent = active_agent(&net);
    let request = Request {
        method: Method::POST,
        url: url("/app.js"),
    };

    assert_eq!(agent.handle_fetch(&request).unwrap(), FetchOutcome::Passthrough);
    assert_eq!(net.calls(), 0);
}

#[test]
fn test_inactive_agent_passes_through() {
    let net = FakeNetwork::shared();
    let mut agent = new_agent(&net);
    assert_eq!(agent.handle_fetch(&get("/app.js")).unwrap(), FetchOutcome::Passthrough);

    agent.install().unwrap();
    net.reset_calls();
    assert_eq!(agent.handle_fetch(&get("/app.js")).unwrap(), FetchOutcome::Passthrough);
    assert_eq!(net.calls(), 0);
}

#[test]
fn test_concurrent_fetches_are_independent() {
    let net = FakeNetwork::shared();
    let agent = active_agent(&net);

    std::thread::scope(|s| {
        for i in 0..8 {
            let agent = &agent;
            s.spawn(move || {
                let outcome = agent.handle_fetch(&get(&format!("/chunk-{i}.js"))).unwrap();
                assert!(matches!(outcome, FetchOutcome::Network(_)));
            });
        }
    });

    assert_eq!(net.calls(), 8);
    assert_eq!(agent.cache().entry_count("predger-v1").unwrap(), 14);
    assert_eq!(agent.keep_alive().in_flight(), 0);
}

// ── Registration ──────────────────────────────────────────────

#[test]
fn test_register_installs_activates_and_records() {
    let net = FakeNetwork::shared();
    let storage = MemoryStorage::default();
    let mut agent = new_agent(&net);

    let outcome = register(&mut agent, &storage, 1).unwrap();

    assert_eq!(outcome, RegistrationOutcome::Activated { deleted: vec![] });
    assert_eq!(agent.phase(), Phase::Active);
    assert_eq!(
        storage.get_item(VERSION_KEY).unwrap().as_deref(),
        Some("predger-v1")
    );
}

#[test]
fn test_register_resumes_without_network() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("predger.db");
    let storage = MemoryStorage::default();
    let net = FakeNetwork::shared();
    {
        let mut first = agent_with(AgentConfig::default(), SqliteCache::open(&path).unwrap(), &net);
        register(&mut first, &storage, 0).unwrap();
    }
    net.reset_calls();

    let mut second = agent_with(AgentConfig::default(), SqliteCache::open(&path).unwrap(), &net);
    let outcome = register(&mut second, &storage, 0).unwrap();

    assert_eq!(outcome, RegistrationOutcome::Resumed);
    assert_eq!(second.phase(), Phase::Active);
    assert_eq!(net.calls(), 0);
    assert!(matches!(
        second.handle_fetch(&get("/app.js")).unwrap(),
        FetchOutcome::Cached(_)
    ));
}

#[test]
fn test_register_new_version_replaces_old_bucket() {
    let net = FakeNetwork::shared();
    let storage = MemoryStorage::default();
    let cache = SqliteCache::open_in_memory().unwrap();
    cache.open_bucket("predger-v1").unwrap();
    storage.set_item(VERSION_KEY, "predger-v1").unwrap();
    let config = AgentConfig {
        version: "predger-v2".into(),
        ..AgentConfig::default()
    };
    let mut agent = agent_with(config, cache, &net);

    let outcome = register(&mut agent, &storage, 0).unwrap();

    assert_eq!(
        outcome,
        RegistrationOutcome::Activated {
            deleted: vec!["predger-v1".into()]
        }
    );
    assert_eq!(
        storage.get_item(VERSION_KEY).unwrap().as_deref(),
        Some("predger-v2")
    );
}

#[test]
fn test_register_reinstalls_when_bucket_missing() {
    let net = FakeNetwork::shared();
    let storage = MemoryStorage::default();
    storage.set_item(VERSION_KEY, "predger-v1").unwrap();
    let mut agent = new_agent(&net);

    let outcome = register(&mut agent, &storage, 0).unwrap();

    assert!(matches!(outcome, RegistrationOutcome::Activated { .. }));
    assert_eq!(net.calls(), 6);
}

#[test]
fn test_register_waits_for_open_clients() {
    let net = FakeNetwork::shared();
    let storage = MemoryStorage::default();
    let config = AgentConfig {
        skip_waiting_on_install: false,
        ..AgentConfig::default()
    };
    let mut agent = agent_with(config, SqliteCache::open_in_memory().unwrap(), &net);

    let outcome = register(&mut agent, &storage, 1).unwrap();

    assert_eq!(outcome, RegistrationOutcome::Waiting);
    assert_eq!(agent.phase(), Phase::Installed);
    assert!(storage.get_item(VERSION_KEY).unwrap().is_none());

    assert!(agent.handle_message(r#"{"type":"SKIP_WAITING"}"#));
    assert!(agent.may_activate(1));
    agent.activate().unwrap();
    record_active(&agent, &storage).unwrap();
    assert_eq!(
        storage.get_item(VERSION_KEY).unwrap().as_deref(),
        Some("predger-v1")
    );
}

#[test]
fn test_waiting_install_is_not_resumed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("predger.db");
    let storage = MemoryStorage::default();
    let net = FakeNetwork::shared();
    let config = AgentConfig {
        skip_waiting_on_install: false,
        ..AgentConfig::default()
    };
    {
        let mut first = agent_with(config.clone(), SqliteCache::open(&path).unwrap(), &net);
        assert_eq!(
            register(&mut first, &storage, 1).unwrap(),
            RegistrationOutcome::Waiting
        );
    }

    let mut second = agent_with(config, SqliteCache::open(&path).unwrap(), &net);
    assert!(second.cache().has_bucket("predger-v1").unwrap());
    assert!(!resume_recorded(&mut second, &storage).unwrap());
    assert_eq!(second.phase(), Phase::Uninstalled);
    assert!(matches!(
        second.handle_fetch(&get("/app.js")).unwrap(),
        FetchOutcome::Passthrough
    ));
}

#[test]
fn test_recorded_version_resumes() {
    let net = FakeNetwork::shared();
    let storage = MemoryStorage::default();
    let cache = SqliteCache::open_in_memory().unwrap();
    cache.open_bucket("predger-v1").unwrap();
    storage.set_item(VERSION_KEY, "predger-v1").unwrap();
    let mut agent = agent_with(AgentConfig::default(), cache, &net);

    assert!(resume_recorded(&mut agent, &storage).unwrap());
    assert_eq!(agent.phase(), Phase::Active);
}

#[test]
fn test_register_propagates_install_failure() {
    let net = FakeNetwork::shared();
    net.script(url("/").as_str(), Scripted::Fail);
    let storage = MemoryStorage::default();
    let mut agent = new_agent(&net);

    assert!(register(&mut agent, &storage, 0).is_err());
    assert_eq!(agent.phase(), Phase::Redundant);
}

// ── Keep-alive ────────────────────────────────────────────────

#[test]
fn test_keep_alive_counts_tokens() {
    let keep_alive = KeepAlive::default();
    assert!(keep_alive.wait_idle(Duration::ZERO));

    let a = keep_alive.token();
    let b = keep_alive.token();
    assert_eq!(keep_alive.in_flight(), 2);
    assert!(!keep_alive.wait_idle(Duration::from_millis(10)));

    drop(a);
    drop(b);
    assert_eq!(keep_alive.in_flight(), 0);
    assert!(keep_alive.wait_idle(Duration::ZERO));
}

#[test]
fn test_wait_idle_wakes_when_work_finishes() {
    let keep_alive = KeepAlive::default();
    let token = keep_alive.token();

    std::thread::scope(|s| {
        s.spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            drop(token);
        });
        assert!(keep_alive.wait_idle(Duration::from_secs(5)));
    });
}

// ── Config ────────────────────────────────────────────────────

#[test]
fn test_manifest_resolves_against_origin() {
    let config = AgentConfig {
        origin: "https://ledger.example.com/app/".into(),
        manifest: vec!["index.html".into(), "/styles.css".into()],
        ..AgentConfig::default()
    };
    let urls: Vec<String> = config
        .manifest_urls()
        .unwrap()
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(
        urls,
        vec![
            "https://ledger.example.com/app/index.html",
            "https://ledger.example.com/styles.css"
        ]
    );
}

#[test]
fn test_cacheable_origin_checks() {
    let config = AgentConfig::default();
    let origin = config.origin_url().unwrap();
    assert!(config.is_cacheable_origin(&origin, &url("/x.js")));
    assert!(config.is_cacheable_origin(&origin, &Url::parse("https://ESM.sh/a").unwrap()));
    assert!(!config.is_cacheable_origin(&origin, &Url::parse("http://localhost:9090/").unwrap()));
    assert!(!config.is_cacheable_origin(&origin, &Url::parse("https://esm.sh.evil.com/").unwrap()));
}

#[test]
fn test_event_descriptions() {
    assert_eq!(
        AgentEvent::Activated {
            deleted: vec!["predger-v0".into()]
        }
        .describe(),
        "Offline cache activated, removed predger-v0"
    );
    assert_eq!(
        AgentEvent::Registered(RegistrationOutcome::Resumed).describe(),
        "Offline cache ready"
    );
}
