// ── Channel reconciliation ──
//
// Turns the caller's desired channel set into subscribe (and, in strict
// mode, unsubscribe) intents. Nothing is queued: intents are recomputed
// from state on every open, so a reconnect always re-announces the full set.

use std::collections::BTreeSet;

use panelink_api::ClientMessage;
use tracing::debug;

/// Direction of a subscription intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
    Subscribe,
    Unsubscribe,
}

/// One message the reconciler wants sent. Never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionIntent {
    pub kind: IntentKind,
    pub channel: String,
}

impl SubscriptionIntent {
    pub fn subscribe(channel: impl Into<String>) -> Self {
        Self {
            kind: IntentKind::Subscribe,
            channel: channel.into(),
        }
    }

    pub fn unsubscribe(channel: impl Into<String>) -> Self {
        Self {
            kind: IntentKind::Unsubscribe,
            channel: channel.into(),
        }
    }
}

impl From<SubscriptionIntent> for ClientMessage {
    fn from(intent: SubscriptionIntent) -> Self {
        match intent.kind {
            IntentKind::Subscribe => ClientMessage::Subscribe {
                channel: intent.channel,
            },
            IntentKind::Unsubscribe => ClientMessage::Unsubscribe {
                channel: intent.channel,
            },
        }
    }
}

/// What happens to channels dropped from the desired set while connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcileMode {
    /// Dropped channels stay subscribed until the next reconnect.
    #[default]
    SubscribeOnly,
    /// Dropped channels are unsubscribed right away.
    Strict,
}

/// Tracks the channel set last announced on the current link.
#[derive(Debug, Default)]
pub struct ChannelReconciler {
    mode: ReconcileMode,
    announced: BTreeSet<String>,
}

impl ChannelReconciler {
    pub fn new(mode: ReconcileMode) -> Self {
        Self {
            mode,
            announced: BTreeSet::new(),
        }
    }

    pub fn mode(&self) -> ReconcileMode {
        self.mode
    }

    /// The link (re)opened: subscribe to every desired channel.
    pub fn on_open(&mut self, desired: &BTreeSet<String>) -> Vec<SubscriptionIntent> {
        self.announced.clone_from(desired);
        debug!(channels = desired.len(), "announcing channels on open");
        desired.iter().map(SubscriptionIntent::subscribe).collect()
    }

    /// The desired set changed. Emits nothing unless `connected`.
    pub fn on_desired_changed(
        &mut self,
        desired: &BTreeSet<String>,
        connected: bool,
    ) -> Vec<SubscriptionIntent> {
        if !connected {
            return Vec::new();
        }

        let mut intents: Vec<SubscriptionIntent> = desired
            .difference(&self.announced)
            .map(SubscriptionIntent::subscribe)
            .collect();

        if self.mode == ReconcileMode::Strict {
            intents.extend(
                self.announced
                    .difference(desired)
                    .map(SubscriptionIntent::unsubscribe),
            );
        }

        self.announced.clone_from(desired);
        intents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn open_subscribes_everything() {
        let mut r = ChannelReconciler::default();
        let intents = r.on_open(&set(&["b", "a"]));
        assert_eq!(
            intents,
            vec![
                SubscriptionIntent::subscribe("a"),
                SubscriptionIntent::subscribe("b")
            ]
        );
    }

    #[test]
    fn reopen_replays_full_set() {
        let mut r = ChannelReconciler::default();
        let desired = set(&["a", "b"]);
        r.on_open(&desired);
        let second = r.on_open(&desired);
        assert_eq!(second.len(), 2);
    }

    #[test]
    fn change_while_connected_subscribes_new_only() {
        let mut r = ChannelReconciler::default();
        r.on_open(&set(&["a"]));
        let intents = r.on_desired_changed(&set(&["a", "c"]), true);
        assert_eq!(intents, vec![SubscriptionIntent::subscribe("c")]);
    }

    #[test]
    fn removal_is_silent_by_default() {
        let mut r = ChannelReconciler::default();
        r.on_open(&set(&["a", "b"]));
        assert!(r.on_desired_changed(&set(&["a"]), true).is_empty());
        // Re-adding a dropped channel subscribes it again.
        assert_eq!(
            r.on_desired_changed(&set(&["a", "b"]), true),
            vec![SubscriptionIntent::subscribe("b")]
        );
    }

    #[test]
    fn strict_mode_unsubscribes_removed() {
        let mut r = ChannelReconciler::new(ReconcileMode::Strict);
        r.on_open(&set(&["a", "b"]));
        let intents = r.on_desired_changed(&set(&["b", "c"]), true);
        assert_eq!(
            intents,
            vec![
                SubscriptionIntent::subscribe("c"),
                SubscriptionIntent::unsubscribe("a")
            ]
        );
    }

    #[test]
    fn nothing_while_disconnected() {
        let mut r = ChannelReconciler::default();
        assert!(r.on_desired_changed(&set(&["a"]), false).is_empty());
    }

    #[test]
    fn intent_converts_to_wire_message() {
        let msg: ClientMessage = SubscriptionIntent::unsubscribe("traffic").into();
        assert_eq!(msg, ClientMessage::unsubscribe("traffic"));
    }
}
