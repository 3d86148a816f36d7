// ── Connection state machine ──
//
// Pure transition logic for the realtime connection. No I/O and no timers:
// every input returns a `Directive` that the driver task carries out, and
// time is passed in explicitly.

use std::time::Duration;

use panelink_api::websocket::{GOING_AWAY, NORMAL_CLOSURE};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::backoff::{ReconnectConfig, backoff_delay};
use super::state::ConnectionState;

/// What the driver should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Open a link now.
    Open,
    /// Arm the timer; call [`ConnectionMachine::on_timer`] when it fires.
    Wait(Duration),
    /// Nothing to schedule.
    Idle,
}

/// How a close code is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseClass {
    /// 1000 / 1001: expected, retried quietly.
    Normal,
    /// The configured rejection code: retries stop.
    Rejected,
    /// Anything else, including a stream that ended without a close frame.
    Abnormal,
}

pub fn classify_close(code: Option<u16>, auth_reject_code: u16) -> CloseClass {
    match code {
        Some(c) if c == auth_reject_code => CloseClass::Rejected,
        Some(NORMAL_CLOSURE | GOING_AWAY) => CloseClass::Normal,
        _ => CloseClass::Abnormal,
    }
}

/// Transition logic for one logical connection.
///
/// `attempt` counts failures since the last successful open and drives the
/// backoff exponent. `has_connected` survives failures and is only reset by
/// [`disconnect`](Self::disconnect); while it is `false`, reaching
/// `cooldown_threshold` failures suspends retries for `cooldown`.
#[derive(Debug)]
pub struct ConnectionMachine {
    config: ReconnectConfig,
    state: ConnectionState,
    attempt: u32,
    has_connected: bool,
    cooldown_until: Option<Instant>,
}

impl ConnectionMachine {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Disconnected,
            attempt: 0,
            has_connected: false,
            cooldown_until: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn has_connected(&self) -> bool {
        self.has_connected
    }

    pub fn config(&self) -> &ReconnectConfig {
        &self.config
    }

    /// Time left in the current cooldown window, if any.
    pub fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        self.cooldown_until
            .map(|until| until.saturating_duration_since(now))
            .filter(|left| !left.is_zero())
    }

    // ── Inputs ──────────────────────────────────────────────────────

    /// Explicit connect request from the caller.
    pub fn connect(&mut self, now: Instant) -> Directive {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Connected => Directive::Idle,
            ConnectionState::Cooldown => {
                if let Some(left) = self.cooldown_remaining(now) {
                    debug!(remaining_secs = left.as_secs(), "connect refused during cooldown");
                    return Directive::Idle;
                }
                self.begin_attempt()
            }
            ConnectionState::Blocked => {
                info!("reconnecting after credential rejection");
                self.attempt = 0;
                self.begin_attempt()
            }
            ConnectionState::Disconnected | ConnectionState::Backoff => self.begin_attempt(),
        }
    }

    /// The link opened.
    pub fn on_open(&mut self) {
        if self.attempt > 0 {
            info!(attempts = self.attempt, "realtime connection restored");
        }
        self.state = ConnectionState::Connected;
        self.attempt = 0;
        self.cooldown_until = None;
        self.has_connected = true;
    }

    /// The link closed with `code` (`None`: no close frame).
    pub fn on_close(&mut self, code: Option<u16>, now: Instant) -> Directive {
        match classify_close(code, self.config.auth_reject_code) {
            CloseClass::Rejected => self.on_rejected(),
            CloseClass::Normal => {
                debug!(?code, "realtime connection closed");
                self.on_failure(now)
            }
            CloseClass::Abnormal => {
                info!(?code, "realtime connection closed abnormally");
                self.on_failure(now)
            }
        }
    }

    /// Opening failed, or the live link broke, for a transient reason.
    pub fn on_error(&mut self, now: Instant) -> Directive {
        self.on_failure(now)
    }

    /// The server refused the credentials. No retry is scheduled.
    pub fn on_rejected(&mut self) -> Directive {
        warn!("realtime connection rejected by server; not retrying until reconnect");
        self.state = ConnectionState::Blocked;
        self.cooldown_until = None;
        Directive::Idle
    }

    /// A timer armed by [`Directive::Wait`] fired.
    pub fn on_timer(&mut self, now: Instant) -> Directive {
        match self.state {
            ConnectionState::Backoff => self.begin_attempt(),
            ConnectionState::Cooldown => match self.cooldown_remaining(now) {
                Some(left) => Directive::Wait(left),
                None => {
                    info!("cooldown elapsed, retrying realtime connection");
                    self.begin_attempt()
                }
            },
            _ => Directive::Idle,
        }
    }

    /// Caller teardown. Valid from any state, idempotent.
    pub fn disconnect(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.attempt = 0;
        self.has_connected = false;
        self.cooldown_until = None;
    }

    // ── Private helpers ─────────────────────────────────────────────

    fn begin_attempt(&mut self) -> Directive {
        self.state = ConnectionState::Connecting;
        self.cooldown_until = None;
        Directive::Open
    }

    fn on_failure(&mut self, now: Instant) -> Directive {
        if matches!(
            self.state,
            ConnectionState::Disconnected | ConnectionState::Blocked
        ) {
            return Directive::Idle;
        }

        let exponent = self.attempt;
        self.attempt = self.attempt.saturating_add(1);

        if !self.has_connected && self.attempt >= self.config.cooldown_threshold {
            let window = self.config.cooldown;
            warn!(
                attempts = self.attempt,
                cooldown_secs = window.as_secs(),
                "realtime endpoint unreachable, pausing reconnects"
            );
            self.state = ConnectionState::Cooldown;
            self.cooldown_until = Some(now + window);
            return Directive::Wait(window);
        }

        let delay = backoff_delay(exponent, &self.config);
        debug!(
            attempt = self.attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "waiting before reconnect"
        );
        self.state = ConnectionState::Backoff;
        Directive::Wait(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ReconnectConfig {
        ReconnectConfig {
            max_jitter: Duration::ZERO,
            ..ReconnectConfig::default()
        }
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn classify_codes() {
        assert_eq!(classify_close(Some(1000), 1008), CloseClass::Normal);
        assert_eq!(classify_close(Some(1001), 1008), CloseClass::Normal);
        assert_eq!(classify_close(Some(1008), 1008), CloseClass::Rejected);
        assert_eq!(classify_close(Some(4001), 4001), CloseClass::Rejected);
        assert_eq!(classify_close(Some(1011), 1008), CloseClass::Abnormal);
        assert_eq!(classify_close(None, 1008), CloseClass::Abnormal);
    }

    #[test]
    fn connect_from_disconnected_opens() {
        let mut m = ConnectionMachine::new(config());
        assert_eq!(m.connect(Instant::now()), Directive::Open);
        assert_eq!(m.state(), ConnectionState::Connecting);
        assert_eq!(m.connect(Instant::now()), Directive::Idle);
    }

    #[test]
    fn open_resets_attempts() {
        let mut m = ConnectionMachine::new(config());
        let now = Instant::now();
        m.connect(now);
        assert_eq!(m.on_error(now), Directive::Wait(secs(1)));
        assert_eq!(m.on_timer(now), Directive::Open);
        m.on_open();
        assert_eq!(m.state(), ConnectionState::Connected);
        assert_eq!(m.attempt(), 0);
        assert!(m.has_connected());
    }

    #[test]
    fn normal_close_backs_off_from_base() {
        let mut m = ConnectionMachine::new(config());
        let now = Instant::now();
        m.connect(now);
        m.on_open();
        assert_eq!(m.on_close(Some(1000), now), Directive::Wait(secs(1)));
        assert_eq!(m.state(), ConnectionState::Backoff);
        assert_eq!(m.on_timer(now), Directive::Open);
        assert_eq!(m.on_close(Some(1006), now), Directive::Wait(secs(2)));
    }

    #[test]
    fn connected_clients_never_cool_down() {
        let mut m = ConnectionMachine::new(config());
        let now = Instant::now();
        m.connect(now);
        m.on_open();
        for _ in 0..10 {
            m.on_close(None, now);
            assert_eq!(m.state(), ConnectionState::Backoff);
            m.on_timer(now);
        }
    }

    #[test]
    fn rejection_blocks_until_explicit_connect() {
        let mut m = ConnectionMachine::new(config());
        let now = Instant::now();
        m.connect(now);
        m.on_open();
        assert_eq!(m.on_close(Some(1008), now), Directive::Idle);
        assert_eq!(m.state(), ConnectionState::Blocked);
        assert_eq!(m.on_timer(now + secs(3600)), Directive::Idle);
        assert_eq!(m.state(), ConnectionState::Blocked);

        assert_eq!(m.connect(now), Directive::Open);
        assert_eq!(m.state(), ConnectionState::Connecting);
    }

    #[test]
    fn repeated_first_connect_failure_enters_cooldown() {
        let mut m = ConnectionMachine::new(config());
        let start = Instant::now();
        m.connect(start);

        assert_eq!(m.on_error(start), Directive::Wait(secs(1)));
        m.on_timer(start);
        assert_eq!(m.on_error(start), Directive::Wait(secs(2)));
        m.on_timer(start);
        assert_eq!(m.on_error(start), Directive::Wait(secs(4)));
        m.on_timer(start);
        assert_eq!(m.on_error(start), Directive::Wait(secs(300)));
        assert_eq!(m.state(), ConnectionState::Cooldown);

        // Explicit connects are refused inside the window.
        assert_eq!(m.connect(start + secs(10)), Directive::Idle);
        // An early timer re-arms for the remainder.
        assert_eq!(m.on_timer(start + secs(100)), Directive::Wait(secs(200)));

        // Exactly one attempt after the window, then straight back to cooldown.
        assert_eq!(m.on_timer(start + secs(300)), Directive::Open);
        let later = start + secs(301);
        assert_eq!(m.on_error(later), Directive::Wait(secs(300)));
        assert_eq!(m.state(), ConnectionState::Cooldown);
    }

    #[test]
    fn cooldown_cleared_by_successful_open() {
        let mut m = ConnectionMachine::new(config());
        let start = Instant::now();
        m.connect(start);
        for _ in 0..3 {
            m.on_error(start);
            m.on_timer(start);
        }
        m.on_error(start);
        assert_eq!(m.state(), ConnectionState::Cooldown);

        m.on_timer(start + secs(300));
        m.on_open();
        assert_eq!(m.cooldown_remaining(start + secs(300)), None);
        assert_eq!(m.state(), ConnectionState::Connected);
    }

    #[test]
    fn disconnect_clears_everything() {
        let mut m = ConnectionMachine::new(config());
        let now = Instant::now();
        m.connect(now);
        m.on_close(Some(1008), now);
        m.disconnect();
        m.disconnect();
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert_eq!(m.attempt(), 0);
        assert!(!m.has_connected());
        assert_eq!(m.on_error(now), Directive::Idle);
        assert_eq!(m.connect(now), Directive::Open);
    }
}
