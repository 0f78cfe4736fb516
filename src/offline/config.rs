use serde::Deserialize;
use url::Url;

/// Settings for the offline cache agent. Changing `version` invalidates every
/// bucket written under an older version at the next activation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Register the agent when the TUI starts.
    pub enabled: bool,
    /// Name of the current cache bucket.
    pub version: String,
    /// Origin the application shell is served from.
    pub origin: String,
    /// Application shell paths, relative to `origin` (absolute URLs allowed).
    pub manifest: Vec<String>,
    /// External hosts whose responses may be cached opportunistically.
    pub allowed_hosts: Vec<String>,
    pub skip_waiting_on_install: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            version: "predger-v1".into(),
            origin: "http://localhost:8080/".into(),
            manifest: [
                "/",
                "/index.html",
                "/app.js",
                "/styles.css",
                "/src/manifest.json",
                "/src/favicon.ico",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            allowed_hosts: vec!["esm.sh".into()],
            skip_waiting_on_install: true,
        }
    }
}

impl AgentConfig {
    pub fn cache_name(&self) -> &str {
        &self.version
    }

    pub fn origin_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.origin)
    }

    pub fn manifest_urls(&self) -> Result<Vec<Url>, url::ParseError> {
        let origin = self.origin_url()?;
        self.manifest.iter().map(|p| origin.join(p)).collect()
    }

    /// Same-origin URLs and allow-listed hosts may be stored in the cache.
    pub fn is_cacheable_origin(&self, origin: &Url, url: &Url) -> bool {
        url.origin() == origin.origin()
            || url
                .host_str()
                .is_some_and(|h| self.allowed_hosts.iter().any(|a| a.eq_ignore_ascii_case(h)))
    }
}
