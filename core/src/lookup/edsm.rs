use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{SystemInfo, SystemLookup};
use crate::{Result, StarlogError};

/// Configuration for EdsmLookup loaded from environment variables
#[derive(Debug, Clone)]
pub struct EdsmConfig {
    pub base_url: String, // e.g., https://www.edsm.net/api-v1
    pub request_timeout_ms: u64,
}

impl Default for EdsmConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("STARLOG_EDSM_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "https://www.edsm.net/api-v1".to_string()),
            request_timeout_ms: std::env::var("STARLOG_LOOKUP_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5_000),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SystemResponse {
    name: Option<String>,
    #[serde(default)]
    information: Information,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Information {
    allegiance: Option<String>,
    government: Option<String>,
    population: Option<u64>,
    security: Option<String>,
    economy: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BodiesResponse {
    #[serde(default)]
    bodies: Vec<Body>,
}

#[derive(Debug, Deserialize)]
struct Body {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(rename = "subType")]
    sub_type: Option<String>,
    #[serde(rename = "isLandable", default)]
    is_landable: bool,
}

/// Star system lookup against the EDSM web API
#[derive(Clone)]
pub struct EdsmLookup {
    http: Client,
    cfg: EdsmConfig,
}

impl EdsmLookup {
    pub fn new(cfg: EdsmConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .user_agent(concat!("starlog/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StarlogError::LookupError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, cfg })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(EdsmConfig::default())
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.cfg.base_url.trim_end_matches('/'), endpoint)
    }

    async fn fetch_system(&self, name: &str) -> Result<Option<SystemResponse>> {
        let url = self.url("system");
        debug!(target = "edsm", "GET {} for {}", url, name);
        let resp = self
            .http
            .get(&url)
            .query(&[("systemName", name), ("showInformation", "1"), ("showPermits", "0")])
            .send()
            .await
            .map_err(|e| StarlogError::LookupError(format!("EDSM system request failed: {e}")))?
            .error_for_status()
            .map_err(|e| StarlogError::LookupError(format!("EDSM system error: {e}")))?;

        // Unknown systems come back as `[]` or `{}`.
        let val: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| StarlogError::LookupError(format!("Failed to parse EDSM JSON: {e}")))?;
        if !val.is_object() {
            return Ok(None);
        }
        let system: SystemResponse = serde_json::from_value(val)?;
        Ok(system.name.is_some().then_some(system))
    }

    async fn fetch_bodies(&self, name: &str) -> Result<BodiesResponse> {
        let url = self.url("system-bodies");
        debug!(target = "edsm", "GET {} for {}", url, name);
        let val: serde_json::Value = self
            .http
            .get(&url)
            .query(&[("systemName", name)])
            .send()
            .await
            .map_err(|e| StarlogError::LookupError(format!("EDSM bodies request failed: {e}")))?
            .error_for_status()
            .map_err(|e| StarlogError::LookupError(format!("EDSM bodies error: {e}")))?
            .json()
            .await
            .map_err(|e| StarlogError::LookupError(format!("Failed to parse EDSM JSON: {e}")))?;
        if !val.is_object() {
            return Ok(BodiesResponse::default());
        }
        Ok(serde_json::from_value(val)?)
    }
}

fn build_info(name: &str, system: SystemResponse, bodies: BodiesResponse) -> SystemInfo {
    let star_type = bodies
        .bodies
        .iter()
        .find(|b| b.kind.as_deref() == Some("Star"))
        .and_then(|b| b.sub_type.clone());
    let is_scoopable = star_type
        .as_deref()
        .map(SystemInfo::is_scoopable_star)
        .unwrap_or(false);
    let info = system.information;

    SystemInfo {
        name: name.to_string(),
        allegiance: info.allegiance,
        government: info.government,
        population: info.population,
        security: info.security,
        economy: info.economy,
        star_type,
        is_scoopable,
        bodies_count: bodies.bodies.len(),
        landable_count: bodies.bodies.iter().filter(|b| b.is_landable).count(),
    }
}

#[async_trait]
impl SystemLookup for EdsmLookup {
    async fn lookup(&self, name: &str) -> Option<SystemInfo> {
        let system = match self.fetch_system(name).await {
            Ok(Some(system)) => system,
            Ok(None) => {
                debug!(target = "edsm", system = name, "System not found");
                return None;
            }
            Err(e) => {
                warn!(target = "edsm", system = name, error = %e, "EDSM lookup failed");
                return None;
            }
        };
        // Body data is optional enrichment on top of the system record.
        let bodies = self.fetch_bodies(name).await.unwrap_or_else(|e| {
            debug!(target = "edsm", system = name, error = %e, "No body data");
            BodiesResponse::default()
        });
        Some(build_info(name, system, bodies))
    }
}
