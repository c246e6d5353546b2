//! Star system lookup and the per-system result cache used for Arrival
//! enrichment.

pub mod edsm;

pub use edsm::{EdsmConfig, EdsmLookup};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Star types a ship can refuel from.
const SCOOPABLE_STARS: &[&str] = &[
    "O (Blue-White)",
    "B (Blue-White)",
    "A (Blue-White)",
    "F (White)",
    "G (Yellow-White)",
    "K (Yellow-Orange)",
    "M (Red)",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub name: String,
    pub allegiance: Option<String>,
    pub government: Option<String>,
    pub population: Option<u64>,
    pub security: Option<String>,
    pub economy: Option<String>,
    pub star_type: Option<String>,
    pub is_scoopable: bool,
    pub bodies_count: usize,
    pub landable_count: usize,
}

impl SystemInfo {
    pub fn is_scoopable_star(star_type: &str) -> bool {
        SCOOPABLE_STARS.contains(&star_type)
    }

    /// One line of comma separated facts, suitable for appending to an
    /// arrival announcement.
    pub fn description(&self) -> String {
        let mut parts = Vec::new();

        if let Some(allegiance) = &self.allegiance {
            parts.push(format!("{allegiance} controlled"));
        }
        if let Some(government) = &self.government {
            parts.push(format!("{} government", government.to_lowercase()));
        }
        if let Some(population) = self.population {
            let band = match population {
                0 => "unpopulated",
                1..=9_999 => "small population",
                10_000..=999_999 => "medium population",
                1_000_000..=9_999_999 => "large population",
                _ => "huge population",
            };
            parts.push(band.to_string());
        }
        if let Some(security) = self
            .security
            .as_deref()
            .filter(|s| !s.eq_ignore_ascii_case("none"))
        {
            parts.push(format!("{} security", security.to_lowercase()));
        }
        if let Some(economy) = &self.economy {
            parts.push(format!("{} economy", economy.to_lowercase()));
        }
        if let Some(star) = &self.star_type {
            let scoop = if self.is_scoopable {
                "excellent for fuel scooping"
            } else {
                "not scoopable"
            };
            parts.push(format!("Main star is {star}-type ({scoop})"));
        }
        if self.bodies_count > 0 {
            parts.push(format!("{} bodies", self.bodies_count));
        }
        if self.landable_count > 0 {
            parts.push(format!("{} landable", self.landable_count));
        }

        if parts.is_empty() {
            "No detailed information available".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Remote star system database.
#[async_trait]
pub trait SystemLookup: Send + Sync {
    /// `None` when the system is unknown or the lookup failed.
    async fn lookup(&self, name: &str) -> Option<SystemInfo>;
}

/// Caches lookups per system name.
///
/// Each name gets its own once-cell: concurrent requests for one name share a
/// single fetch, different names never wait on each other, and no map lock is
/// held while the fetch is in flight. Failed or timed out lookups are cached
/// as absent.
pub struct SystemInfoCache {
    lookup: Arc<dyn SystemLookup>,
    entries: DashMap<String, Arc<OnceCell<Option<SystemInfo>>>>,
    timeout: Duration,
}

impl SystemInfoCache {
    pub fn new(lookup: Arc<dyn SystemLookup>, timeout: Duration) -> Self {
        Self {
            lookup,
            entries: DashMap::new(),
            timeout,
        }
    }

    pub async fn get(&self, name: &str) -> Option<SystemInfo> {
        if name.is_empty() {
            return None;
        }
        let cell = self
            .entries
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        cell.get_or_init(|| async {
            match tokio::time::timeout(self.timeout, self.lookup.lookup(name)).await {
                Ok(info) => {
                    debug!(target = "lookup", system = name, found = info.is_some(), "System lookup finished");
                    info
                }
                Err(_) => {
                    warn!(target = "lookup", system = name, timeout_ms = self.timeout.as_millis() as u64, "System lookup timed out");
                    None
                }
            }
        })
        .await
        .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SlowLookup {
        calls: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl SystemLookup for SlowLookup {
        async fn lookup(&self, name: &str) -> Option<SystemInfo> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Some(SystemInfo {
                name: name.to_string(),
                ..Default::default()
            })
        }
    }

    #[test]
    fn description_matches_known_bands() {
        let info = SystemInfo {
            name: "Sol".into(),
            allegiance: Some("Federation".into()),
            government: Some("Democracy".into()),
            population: Some(22_780_919_531),
            security: Some("High".into()),
            economy: Some("Refinery".into()),
            star_type: Some("G (White-Yellow) Star".into()),
            is_scoopable: false,
            bodies_count: 40,
            landable_count: 0,
        };
        assert_eq!(
            info.description(),
            "Federation controlled, democracy government, huge population, high security, \
             refinery economy, Main star is G (White-Yellow) Star-type (not scoopable), 40 bodies"
        );
    }

    #[test]
    fn empty_info_has_placeholder_description() {
        let info = SystemInfo {
            name: "Nowhere".into(),
            security: Some("None".into()),
            ..Default::default()
        };
        assert_eq!(info.description(), "No detailed information available");
        assert!(SystemInfo::is_scoopable_star("K (Yellow-Orange)"));
        assert!(!SystemInfo::is_scoopable_star("T Tauri Star"));
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_fetch() {
        let lookup = Arc::new(SlowLookup {
            calls: AtomicUsize::new(0),
            delay: Duration::from_millis(50),
        });
        let cache = Arc::new(SystemInfoCache::new(lookup.clone(), Duration::from_secs(1)));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get("Sol").await })
            })
            .collect();
        for h in handles {
            assert_eq!(h.await.unwrap().map(|i| i.name), Some("Sol".to_string()));
        }
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);

        cache.get("Lave").await;
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn timed_out_lookup_is_cached_as_absent() {
        let lookup = Arc::new(SlowLookup {
            calls: AtomicUsize::new(0),
            delay: Duration::from_millis(200),
        });
        let cache = SystemInfoCache::new(lookup.clone(), Duration::from_millis(10));
        assert_eq!(cache.get("Sol").await, None);
        assert_eq!(cache.get("Sol").await, None);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_name_skips_lookup() {
        let lookup = Arc::new(SlowLookup {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        });
        let cache = SystemInfoCache::new(lookup.clone(), Duration::from_secs(1));
        assert_eq!(cache.get("").await, None);
        assert!(cache.is_empty());
    }
}
