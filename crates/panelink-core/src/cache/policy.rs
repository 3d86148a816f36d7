// ── Route TTL table ──
//
// Static mapping from path substrings to freshness windows. First match
// wins, so more specific patterns must come before their prefixes
// (`/clients/online` before `/clients`).

use std::time::Duration;

use super::key::normalize_path;

/// One row of the route table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRoute {
    pub pattern: String,
    pub ttl: Duration,
}

impl CacheRoute {
    pub fn new(pattern: impl Into<String>, ttl: Duration) -> Self {
        Self {
            pattern: pattern.into(),
            ttl,
        }
    }
}

/// Which reads are cached, and for how long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    /// When `false`, reads always go to the network and nothing is stored.
    pub enabled: bool,
    pub routes: Vec<CacheRoute>,
    pub default_ttl: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            routes: vec![
                CacheRoute::new("/servers/status", Duration::from_secs(30)),
                CacheRoute::new("/clients/online", Duration::from_secs(30)),
                CacheRoute::new("/traffic/stats", Duration::from_secs(60)),
                CacheRoute::new("/nodes", Duration::from_secs(5 * 60)),
                CacheRoute::new("/inbounds", Duration::from_secs(2 * 60)),
                CacheRoute::new("/clients", Duration::from_secs(2 * 60)),
                CacheRoute::new("/subscription-groups", Duration::from_secs(5 * 60)),
            ],
            default_ttl: Duration::from_secs(60),
        }
    }
}

impl CachePolicy {
    /// A policy that never caches.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// TTL for a request path.
    pub fn ttl_for(&self, path: &str) -> Duration {
        self.routes
            .iter()
            .find(|route| path.contains(route.pattern.as_str()))
            .map_or(self.default_ttl, |route| route.ttl)
    }
}

/// The cache region a write to `path` affects.
///
/// Leading `api` and version (`v1`, `v2`, ...) segments are skipped; the
/// scope runs up to and including the first remaining segment, which names
/// the resource collection. `/api/v1/nodes/7/restart` → `/api/v1/nodes`.
/// Returns `None` when the path has no resource segment.
pub fn resource_scope(path: &str) -> Option<String> {
    let path = normalize_path(path);
    let mut scope = String::new();

    for segment in path.split('/').filter(|s| !s.is_empty()) {
        scope.push('/');
        scope.push_str(segment);
        if !is_prefix_segment(segment) {
            return Some(scope);
        }
    }

    None
}

fn is_prefix_segment(segment: &str) -> bool {
    if segment == "api" {
        return true;
    }
    segment
        .strip_prefix('v')
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}
