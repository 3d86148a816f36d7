//! Client-side resilience layer between `panelink-api` and consumers.
//!
//! - **[`RealtimeClient`]** — Keeps one logical connection to the server's
//!   event stream alive: backoff with jitter after failures, a cooldown when
//!   the endpoint never answers, a hard stop when credentials are rejected,
//!   and re-subscription of the desired channel set on every reopen.
//!
//! - **[`CachedClient`]** — Puts a [`TtlCache`] in front of `ApiClient`.
//!   Reads are answered from the cache while fresh; successful writes
//!   invalidate the cache region of the resource they touched.
//!
//! The two halves are independent; neither depends on the other.

pub mod cache;
pub mod client;
pub mod error;
pub mod realtime;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cache::{CacheKey, CachePolicy, CacheRoute, CacheStats, TtlCache};
pub use client::CachedClient;
pub use error::CoreError;
pub use realtime::{
    ConnectionState, RealtimeClient, RealtimeConfig, ReconcileMode, ReconnectConfig,
    SubscriptionIntent,
};
