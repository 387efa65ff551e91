use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admit,
    Reject,
}

#[derive(Debug, Clone, Copy)]
struct ClientWindow {
    requests: u32,
    window_start: DateTime<Utc>,
    last_seen: DateTime<Utc>,
}

/// Per-client sliding counter with reset-on-window-elapse semantics. A burst
/// straddling a window boundary can admit up to `2*limit - 1` requests; that
/// approximation is accepted (abuse mitigation, not billing-grade accounting).
///
/// Each instance owns its own map and lock, so tests and callers construct
/// independent limiters instead of sharing a global one.
pub struct RateLimiter {
    clients: Mutex<HashMap<String, ClientWindow>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Check-then-act runs atomically under the map lock.
    pub fn admit(
        &self,
        client_key: &str,
        limit: u32,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Admission {
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());

        let entry = clients.entry(client_key.to_string()).or_insert(ClientWindow {
            requests: 0,
            window_start: now,
            last_seen: now,
        });
        entry.last_seen = now;

        if now - entry.window_start > window {
            entry.requests = 1;
            entry.window_start = now;
            return Admission::Admit;
        }

        if entry.requests >= limit {
            return Admission::Reject;
        }

        entry.requests += 1;
        Admission::Admit
    }

    /// Evicts entries that have been idle for longer than `idle_for`,
    /// bounding the map to recently active clients. Returns the eviction
    /// count for logging.
    pub fn sweep(&self, idle_for: Duration, now: DateTime<Utc>) -> usize {
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        let before = clients.len();
        clients.retain(|_, info| now - info.last_seen <= idle_for);
        before - clients.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_admits_up_to_limit_then_rejects() {
        let limiter = RateLimiter::new();
        let window = Duration::hours(1);

        for _ in 0..10 {
            assert_eq!(limiter.admit("1.2.3.4", 10, window, t0()), Admission::Admit);
        }
        assert_eq!(limiter.admit("1.2.3.4", 10, window, t0()), Admission::Reject);
        // Still rejected later within the same window
        let later = t0() + Duration::minutes(59);
        assert_eq!(limiter.admit("1.2.3.4", 10, window, later), Admission::Reject);
    }

    #[test]
    fn test_window_elapse_resets_counter() {
        let limiter = RateLimiter::new();
        let window = Duration::hours(1);

        for _ in 0..10 {
            limiter.admit("1.2.3.4", 10, window, t0());
        }
        assert_eq!(limiter.admit("1.2.3.4", 10, window, t0()), Admission::Reject);

        let after = t0() + Duration::hours(1) + Duration::seconds(1);
        assert_eq!(limiter.admit("1.2.3.4", 10, window, after), Admission::Admit);
        // Counter restarted at 1, so 9 more fit
        for _ in 0..9 {
            assert_eq!(limiter.admit("1.2.3.4", 10, window, after), Admission::Admit);
        }
        assert_eq!(limiter.admit("1.2.3.4", 10, window, after), Admission::Reject);
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = RateLimiter::new();
        let window = Duration::hours(1);

        for _ in 0..3 {
            assert_eq!(limiter.admit("a", 3, window, t0()), Admission::Admit);
        }
        assert_eq!(limiter.admit("a", 3, window, t0()), Admission::Reject);
        assert_eq!(limiter.admit("b", 3, window, t0()), Admission::Admit);
    }

    #[test]
    fn test_instances_are_independent() {
        let window = Duration::hours(1);
        let a = RateLimiter::new();
        let b = RateLimiter::new();

        assert_eq!(a.admit("x", 1, window, t0()), Admission::Admit);
        assert_eq!(a.admit("x", 1, window, t0()), Admission::Reject);
        assert_eq!(b.admit("x", 1, window, t0()), Admission::Admit);
    }

    #[test]
    fn test_boundary_burst_is_bounded() {
        // Worst case across a window edge: limit requests at the end of one
        // window plus limit - 1 after the reset, never more.
        let limiter = RateLimiter::new();
        let window = Duration::hours(1);
        let mut admitted = 0;

        let late = t0() + Duration::minutes(59);
        for _ in 0..20 {
            if limiter.admit("c", 10, window, late) == Admission::Admit {
                admitted += 1;
            }
        }
        let past_edge = t0() + Duration::hours(2);
        for _ in 0..20 {
            if limiter.admit("c", 10, window, past_edge) == Admission::Admit {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 20); // 10 + 10, <= 2*limit
    }

    #[test]
    fn test_sweep_evicts_idle_clients() {
        let limiter = RateLimiter::new();
        let window = Duration::hours(1);

        limiter.admit("old", 10, window, t0());
        limiter.admit("fresh", 10, window, t0() + Duration::minutes(90));
        assert_eq!(limiter.tracked_clients(), 2);

        let evicted = limiter.sweep(window, t0() + Duration::minutes(100));
        assert_eq!(evicted, 1);
        assert_eq!(limiter.tracked_clients(), 1);

        // Evicted client starts over with a fresh window
        assert_eq!(
            limiter.admit("old", 10, window, t0() + Duration::minutes(100)),
            Admission::Admit
        );
    }
}
