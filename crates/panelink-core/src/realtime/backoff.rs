// ── Reconnect timing ──

use std::time::Duration;

use panelink_api::websocket::POLICY_VIOLATION;
use rand::Rng;

/// Tuning for reconnection, cooldown, and keepalive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first retry. Default: 1s.
    pub base_interval: Duration,

    /// Upper bound on the exponential part of the delay. Default: 30s.
    pub max_delay: Duration,

    /// Random jitter added on top, uniform in `[0, max_jitter)`. Default: 1s.
    pub max_jitter: Duration,

    /// Exponent cap: the delay stops doubling after this many attempts. Default: 5.
    pub max_exponent: u32,

    /// Failed attempts without ever connecting before retries are
    /// suspended. Default: 4.
    pub cooldown_threshold: u32,

    /// How long retries stay suspended. Default: 5 minutes.
    pub cooldown: Duration,

    /// Close code meaning "credentials rejected". Default: 1008.
    pub auth_reject_code: u16,

    /// Interval between client pings while connected. `None` disables them.
    /// Default: 30s.
    pub keepalive: Option<Duration>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_secs(1),
            max_exponent: 5,
            cooldown_threshold: 4,
            cooldown: Duration::from_secs(5 * 60),
            auth_reject_code: POLICY_VIOLATION,
            keepalive: Some(Duration::from_secs(30)),
        }
    }
}

/// Deterministic part of the delay:
///
/// `min(max_delay, base_interval * 2^min(attempt, max_exponent))`
pub fn base_delay(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = attempt.min(config.max_exponent);
    let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
    config
        .base_interval
        .saturating_mul(factor)
        .min(config.max_delay)
}

/// Full delay: [`base_delay`] plus random jitter, spreading reconnect
/// storms from many clients.
pub fn backoff_delay(attempt: u32, config: &ReconnectConfig) -> Duration {
    base_delay(attempt, config) + jitter(config.max_jitter)
}

fn jitter(max: Duration) -> Duration {
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.base_interval, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.cooldown_threshold, 4);
        assert_eq!(config.cooldown, Duration::from_secs(300));
        assert_eq!(config.auth_reject_code, 1008);
    }

    #[test]
    fn base_delay_doubles_then_caps() {
        let config = ReconnectConfig::default();
        let delays: Vec<u64> = (0..8).map(|a| base_delay(a, &config).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30, 30]);
    }

    #[test]
    fn base_delay_is_monotonic_and_bounded() {
        let config = ReconnectConfig {
            max_delay: Duration::from_secs(10),
            ..ReconnectConfig::default()
        };
        let mut previous = Duration::ZERO;
        for attempt in 1..=5 {
            let d = base_delay(attempt, &config);
            assert!(d >= previous, "delay for attempt {attempt} went down");
            assert!(d <= config.max_delay);
            previous = d;
        }
    }

    #[test]
    fn exponent_is_capped() {
        let config = ReconnectConfig {
            max_delay: Duration::from_secs(3600),
            ..ReconnectConfig::default()
        };
        assert_eq!(base_delay(5, &config), base_delay(50, &config));
        assert_eq!(base_delay(u32::MAX, &config), Duration::from_secs(32));
    }

    #[test]
    fn jitter_stays_in_range() {
        let config = ReconnectConfig::default();
        for _ in 0..100 {
            let d = backoff_delay(0, &config);
            assert!(d >= config.base_interval);
            assert!(d < config.base_interval + config.max_jitter);
        }
    }

    #[test]
    fn zero_jitter_is_deterministic() {
        let config = ReconnectConfig {
            max_jitter: Duration::ZERO,
            ..ReconnectConfig::default()
        };
        assert_eq!(backoff_delay(2, &config), Duration::from_secs(4));
    }
}
