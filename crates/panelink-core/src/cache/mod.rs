// ── Read cache ──
//
// TTL store, deterministic request keys, and the route TTL table.

mod key;
mod policy;
mod store;

pub use key::{CacheKey, normalize_path};
pub use policy::{CachePolicy, CacheRoute, resource_scope};
pub use store::{CacheEntry, CacheStats, SWEEP_EVERY, TtlCache};
