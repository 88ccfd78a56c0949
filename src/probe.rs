//! Reachability probes for download descriptors.
//!
//! Each source kind gets its own [`Prober`]. A probe makes one attempt and
//! never fails outward: timeouts, connection errors and unexpected statuses
//! all come back as [`Probe::Unreachable`] with a short reason.
//!
//! - **http**: `HEAD <url>`, redirects followed, reachable only on `200`.
//! - **oras**: `GET /v2/<name>/manifests/<tag>` on the registry, answering a
//!   `Bearer` challenge with an anonymous pull token when asked. Any `2xx`
//!   manifest response is reachable.
use crate::downloads::DownloadDescriptor;
use crate::package::SourceKind;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::time::Duration;
use ureq::Agent;

const MANIFEST_ACCEPT: &str = "application/vnd.oci.image.manifest.v1+json, \
application/vnd.oci.image.index.v1+json, \
application/vnd.oci.artifact.manifest.v1+json, \
application/vnd.docker.distribution.manifest.v2+json, \
application/vnd.docker.distribution.manifest.list.v2+json";

/// Outcome of a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    Reachable,
    Unreachable(String),
}

impl Probe {
    pub fn is_reachable(&self) -> bool {
        matches!(self, Probe::Reachable)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Probe::Reachable => None,
            Probe::Unreachable(reason) => Some(reason),
        }
    }
}

/// Checks whether one reference can be retrieved.
pub trait Prober {
    fn probe(&self, reference: &str) -> Probe;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

/// Settings shared by the network probers.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub timeout: Duration,
    /// Scheme used to reach OCI registries.
    pub registry_scheme: String,
}

impl ProbeConfig {
    pub fn with_timeout(timeout: Duration) -> Self {
        ProbeConfig {
            timeout,
            registry_scheme: "https".to_string(),
        }
    }

    fn agent(&self) -> Agent {
        let config = Agent::config_builder()
            .timeout_global(Some(self.timeout))
            .http_status_as_error(false)
            .build();
        Agent::new_with_config(config)
    }
}

/// `HEAD` probe for direct downloads.
pub struct HttpProber {
    agent: Agent,
}

impl HttpProber {
    pub fn new(config: &ProbeConfig) -> Self {
        HttpProber {
            agent: config.agent(),
        }
    }
}

impl Prober for HttpProber {
    fn probe(&self, reference: &str) -> Probe {
        match self.agent.head(reference).call() {
            Ok(response) if response.status().as_u16() == 200 => Probe::Reachable,
            Ok(response) => Probe::Unreachable(format!("HTTP {}", response.status().as_u16())),
            Err(err) => Probe::Unreachable(err.to_string()),
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Manifest probe for OCI registry artifacts.
pub struct OrasProber {
    agent: Agent,
    scheme: String,
}

impl OrasProber {
    pub fn new(config: &ProbeConfig) -> Self {
        OrasProber {
            agent: config.agent(),
            scheme: config.registry_scheme.clone(),
        }
    }

    fn fetch_manifest(&self, reference: &str) -> Result<Probe> {
        let oci = OciReference::parse(reference)?;
        let url = oci.manifest_url(&self.scheme);
        let response = self
            .agent
            .get(&url)
            .header("Accept", MANIFEST_ACCEPT)
            .call()
            .with_context(|| format!("GET {url}"))?;
        let status = response.status().as_u16();
        let response = if status == 401 {
            let challenge = response
                .headers()
                .get("www-authenticate")
                .and_then(|value| value.to_str().ok())
                .and_then(BearerChallenge::parse)
                .ok_or_else(|| anyhow!("registry returned 401 without a bearer challenge"))?;
            let token = self.fetch_token(&challenge, &oci)?;
            self.agent
                .get(&url)
                .header("Accept", MANIFEST_ACCEPT)
                .header("Authorization", format!("Bearer {token}"))
                .call()
                .with_context(|| format!("GET {url} with token"))?
        } else {
            response
        };
        let status = response.status();
        if status.is_success() {
            Ok(Probe::Reachable)
        } else {
            Ok(Probe::Unreachable(format!("HTTP {}", status.as_u16())))
        }
    }

    fn fetch_token(&self, challenge: &BearerChallenge, oci: &OciReference) -> Result<String> {
        let scope = challenge
            .scope
            .clone()
            .unwrap_or_else(|| format!("repository:{}:pull", oci.repository));
        let mut request = self.agent.get(&challenge.realm).query("scope", &scope);
        if let Some(service) = &challenge.service {
            request = request.query("service", service);
        }
        let mut response = request
            .call()
            .with_context(|| format!("request token from {}", challenge.realm))?;
        let status = response.status().as_u16();
        if status != 200 {
            return Err(anyhow!("token endpoint returned HTTP {status}"));
        }
        let body: TokenResponse = response
            .body_mut()
            .read_json()
            .context("parse token response")?;
        body.token
            .or(body.access_token)
            .ok_or_else(|| anyhow!("token response carried no token"))
    }
}

impl Prober for OrasProber {
    fn probe(&self, reference: &str) -> Probe {
        self.fetch_manifest(reference)
            .unwrap_or_else(|err| Probe::Unreachable(format!("{err:#}")))
    }

    fn name(&self) -> &str {
        "oras"
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

/// `registry/name:tag` or `registry/name@digest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OciReference {
    pub registry: String,
    pub repository: String,
    pub reference: String,
}

impl OciReference {
    /// A digest reference names exactly one manifest, so a tag appended
    /// after it (`name@sha256:abc:linux`) is rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        let (registry, rest) = raw
            .split_once('/')
            .ok_or_else(|| anyhow!("not a registry reference: {raw}"))?;
        let (repository, reference) = match rest.split_once('@') {
            Some((name, digest)) => {
                let (algorithm, encoded) = digest
                    .split_once(':')
                    .ok_or_else(|| anyhow!("digest must be <algorithm>:<hex>: {raw}"))?;
                if algorithm.is_empty() || encoded.is_empty() || encoded.contains(':') {
                    return Err(anyhow!("digest reference cannot carry a tag: {raw}"));
                }
                (name, digest)
            }
            None => match rest.rsplit_once(':') {
                Some((name, tag)) if !tag.contains('/') => (name, tag),
                _ => (rest, "latest"),
            },
        };
        if registry.is_empty() || repository.is_empty() || reference.is_empty() {
            return Err(anyhow!("not a registry reference: {raw}"));
        }
        Ok(OciReference {
            registry: registry.to_string(),
            repository: repository.to_string(),
            reference: reference.to_string(),
        })
    }

    pub fn manifest_url(&self, scheme: &str) -> String {
        format!(
            "{scheme}://{}/v2/{}/manifests/{}",
            self.registry, self.repository, self.reference
        )
    }
}

/// Parsed `WWW-Authenticate: Bearer ...` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerChallenge {
    pub realm: String,
    pub service: Option<String>,
    pub scope: Option<String>,
}

impl BearerChallenge {
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let (scheme, params) = header.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let mut realm = None;
        let mut service = None;
        let mut scope = None;
        for (key, value) in auth_params(params) {
            match key.to_ascii_lowercase().as_str() {
                "realm" => realm = Some(value),
                "service" => service = Some(value),
                "scope" => scope = Some(value),
                _ => {}
            }
        }
        Some(BearerChallenge {
            realm: realm?,
            service,
            scope,
        })
    }
}

/// Split `k="v",k2=v2` pairs; commas inside quotes stay in the value.
fn auth_params(params: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut key = String::new();
    let mut value = String::new();
    let mut in_value = false;
    let mut in_quotes = false;
    for ch in params.chars() {
        match ch {
            '"' if in_value => in_quotes = !in_quotes,
            '=' if !in_value => in_value = true,
            ',' if !in_quotes => {
                if in_value {
                    pairs.push((key.trim().to_string(), value.clone()));
                }
                key.clear();
                value.clear();
                in_value = false;
            }
            _ if in_value => value.push(ch),
            _ => key.push(ch),
        }
    }
    if in_value {
        pairs.push((key.trim().to_string(), value));
    }
    pairs
}

/// Routes descriptors to the prober for their source kind.
pub struct SourceProbers {
    http: Box<dyn Prober>,
    oras: Box<dyn Prober>,
}

impl SourceProbers {
    pub fn new(config: &ProbeConfig) -> Self {
        Self::with_probers(
            Box::new(HttpProber::new(config)),
            Box::new(OrasProber::new(config)),
        )
    }

    pub fn with_probers(http: Box<dyn Prober>, oras: Box<dyn Prober>) -> Self {
        SourceProbers { http, oras }
    }

    pub fn probe(&self, download: &DownloadDescriptor) -> Probe {
        let prober = match download.kind {
            SourceKind::Http => &self.http,
            SourceKind::Oras => &self.oras,
        };
        let probe = prober.probe(&download.reference);
        tracing::debug!(
            prober = prober.name(),
            reference = %download.reference,
            reachable = probe.is_reachable(),
            reason = probe.reason().unwrap_or(""),
            "probed download"
        );
        probe
    }
}

#[cfg(test)]
#[path = "probe_tests.rs"]
mod tests;
