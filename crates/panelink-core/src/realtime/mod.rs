// ── Realtime channel client ──
//
// Self-healing connection to the server's event stream: a pure state
// machine for connect/backoff/cooldown/blocked transitions, a reconciler
// for the desired channel set, and the driver task that runs both.

mod backoff;
mod client;
mod machine;
mod reconciler;
mod state;

pub use backoff::{ReconnectConfig, backoff_delay, base_delay};
pub use client::{RealtimeClient, RealtimeConfig};
pub use machine::{CloseClass, ConnectionMachine, Directive, classify_close};
pub use reconciler::{ChannelReconciler, IntentKind, ReconcileMode, SubscriptionIntent};
pub use state::ConnectionState;
