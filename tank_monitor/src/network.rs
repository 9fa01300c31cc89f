/// Bringing the network link up at boot.
///
/// Association is retried with a doubling delay capped at `max_delay_ms`.
/// With `max_attempts == 0` the loop never gives up, which is how the
/// device behaved before the retry budget existed.

use tracing::{info, warn};

use crate::hal::{Clock, NetworkLink};
use crate::model::MonitorError;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 0 means unbounded
    pub max_attempts: u32,
    pub initial_delay_ms: u32,
    pub max_delay_ms: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            initial_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> u32 {
        let doublings = attempt.saturating_sub(1).min(31);
        self.initial_delay_ms
            .saturating_mul(1u32 << doublings)
            .min(self.max_delay_ms.max(self.initial_delay_ms))
    }

    fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts != 0 && attempts >= self.max_attempts
    }
}

/// Start association and wait for the link, following `policy`.
///
/// Returns the number of attempts it took.
pub fn connect_with_retry<L, C>(
    link: &mut L,
    clock: &mut C,
    policy: &RetryPolicy,
    ssid: &str,
) -> Result<u32, MonitorError>
where
    L: NetworkLink,
    C: Clock,
{
    info!(ssid, "connecting to network");
    let mut attempts = 0;

    loop {
        attempts += 1;
        link.begin();

        if link.is_connected() {
            let ip = link
                .local_ip()
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            info!(attempts, %ip, rssi = link.rssi(), "network connected");
            return Ok(attempts);
        }

        if policy.exhausted(attempts) {
            warn!(attempts, ssid, "giving up on network association");
            return Err(MonitorError::NetworkUnavailable(format!(
                "not connected after {} attempts",
                attempts
            )));
        }

        let delay = policy.delay_after(attempts);
        warn!(attempts, delay_ms = delay, "network not up yet, retrying");
        clock.delay_ms(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{ManualClock, ScriptedLink};

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), 500);
        assert_eq!(policy.delay_after(2), 1_000);
        assert_eq!(policy.delay_after(3), 2_000);
        assert_eq!(policy.delay_after(5), 8_000);
        assert_eq!(policy.delay_after(6), 8_000);
        assert_eq!(policy.delay_after(40), 8_000);
    }

    #[test]
    fn test_fixed_delay_when_cap_equals_initial() {
        let policy = RetryPolicy {
            max_attempts: 0,
            initial_delay_ms: 500,
            max_delay_ms: 500,
        };
        assert_eq!(policy.delay_after(1), 500);
        assert_eq!(policy.delay_after(9), 500);
    }

    #[test]
    fn test_connects_on_first_try() {
        let mut link = ScriptedLink::connected(-60);
        let mut clock = ManualClock::default();
        let attempts = connect_with_retry(&mut link, &mut clock, &RetryPolicy::default(), "Ranch").unwrap();
        assert_eq!(attempts, 1);
        assert_eq!(clock.slept_ms, 0);
    }

    #[test]
    fn test_retries_until_connected() {
        let mut link = ScriptedLink::connecting_after(Some(4), -60);
        let mut clock = ManualClock::default();
        let attempts = connect_with_retry(&mut link, &mut clock, &RetryPolicy::default(), "Ranch").unwrap();
        assert_eq!(attempts, 4);
        assert_eq!(clock.slept_ms, 500 + 1_000 + 2_000);
    }

    #[test]
    fn test_gives_up_after_budget() {
        let mut link = ScriptedLink::unreachable();
        let mut clock = ManualClock::default();
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 1_000,
        };
        let result = connect_with_retry(&mut link, &mut clock, &policy, "Ranch");
        assert!(matches!(result, Err(MonitorError::NetworkUnavailable(_))));
        assert_eq!(link.begin_calls, 3);
        // no wait after the final attempt
        assert_eq!(clock.slept_ms, 100 + 200);
    }

    #[test]
    fn test_unbounded_policy_keeps_trying() {
        let mut link = ScriptedLink::connecting_after(Some(50), -70);
        let mut clock = ManualClock::default();
        let policy = RetryPolicy {
            max_attempts: 0,
            initial_delay_ms: 500,
            max_delay_ms: 500,
        };
        let attempts = connect_with_retry(&mut link, &mut clock, &policy, "Ranch").unwrap();
        assert_eq!(attempts, 50);
        assert_eq!(clock.slept_ms, 49 * 500);
    }
}
