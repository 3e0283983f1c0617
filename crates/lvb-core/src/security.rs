use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use crate::{config::Config, domain::UserId};

/// An empty allow-list admits everyone; otherwise the user must be listed.
/// Updates without a sender are always rejected.
pub fn is_authorized(user_id: Option<UserId>, allowed_users: &[i64]) -> bool {
    match user_id {
        None => false,
        Some(_) if allowed_users.is_empty() => true,
        Some(UserId(id)) => allowed_users.contains(&id),
    }
}

/// Result of asking the limiter whether a check may run now.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Admission {
    Allowed,
    /// `retry_after` is `None` when the quota never refills.
    Limited { retry_after: Option<Duration> },
}

impl Admission {
    pub fn is_allowed(self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

/// `burst` checks at once, refilled evenly over the window.
#[derive(Clone, Copy, Debug)]
struct Quota {
    burst: f64,
    per_sec: f64,
}

#[derive(Clone, Copy, Debug)]
struct Bucket {
    tokens: f64,
    at: Instant,
}

impl Bucket {
    fn refilled(self, quota: Quota, now: Instant) -> Self {
        let gained = now.saturating_duration_since(self.at).as_secs_f64() * quota.per_sec;
        Self {
            tokens: (self.tokens + gained).min(quota.burst),
            at: now,
        }
    }
}

/// Per-user token bucket limiting how often a user can start a link check.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    /// `None` disables limiting.
    quota: Option<Quota>,
    buckets: HashMap<UserId, Bucket>,
}

impl RateLimiter {
    pub fn new(enabled: bool, requests: u32, window: Duration) -> Self {
        let quota = enabled.then(|| {
            let burst = f64::from(requests);
            Quota {
                burst,
                per_sec: burst / window.as_secs_f64().max(f64::EPSILON),
            }
        });
        Self {
            quota,
            buckets: HashMap::new(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            cfg.rate_limit_enabled,
            cfg.rate_limit_requests,
            cfg.rate_limit_window,
        )
    }

    pub fn check(&mut self, user_id: UserId) -> Admission {
        self.check_at(user_id, Instant::now())
    }

    pub fn check_at(&mut self, user_id: UserId, now: Instant) -> Admission {
        let Some(quota) = self.quota else {
            return Admission::Allowed;
        };

        let bucket = self
            .buckets
            .get(&user_id)
            .copied()
            .unwrap_or(Bucket {
                tokens: quota.burst,
                at: now,
            })
            .refilled(quota, now);

        let (bucket, admission) = if bucket.tokens >= 1.0 {
            (
                Bucket {
                    tokens: bucket.tokens - 1.0,
                    ..bucket
                },
                Admission::Allowed,
            )
        } else {
            let retry_after = (quota.per_sec > 0.0)
                .then(|| Duration::from_secs_f64((1.0 - bucket.tokens) / quota.per_sec));
            (bucket, Admission::Limited { retry_after })
        };

        self.buckets.insert(user_id, bucket);
        admission
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_allow_list_is_open() {
        assert!(is_authorized(Some(UserId(7)), &[]));
        assert!(!is_authorized(None, &[]));
    }

    #[test]
    fn allow_list_is_enforced() {
        assert!(is_authorized(Some(UserId(7)), &[1, 7]));
        assert!(!is_authorized(Some(UserId(8)), &[1, 7]));
        assert!(!is_authorized(None, &[1, 7]));
    }

    #[test]
    fn bucket_refills_over_the_window() {
        let start = Instant::now();
        let mut rl = RateLimiter::new(true, 2, Duration::from_secs(10));
        let u = UserId(1);

        assert!(rl.check_at(u, start).is_allowed());
        assert!(rl.check_at(u, start).is_allowed());
        match rl.check_at(u, start) {
            Admission::Limited {
                retry_after: Some(wait),
            } => assert!(wait <= Duration::from_secs(5)),
            other => panic!("expected a retry hint, got {other:?}"),
        }

        // 2 checks per 10s: one comes back after 5 seconds.
        assert!(rl.check_at(u, start + Duration::from_secs(5)).is_allowed());
        assert!(!rl.check_at(u, start + Duration::from_secs(5)).is_allowed());
    }

    #[test]
    fn disabled_limiter_always_allows() {
        let start = Instant::now();
        let mut rl = RateLimiter::new(false, 0, Duration::from_secs(10));
        for _ in 0..5 {
            assert_eq!(rl.check_at(UserId(1), start), Admission::Allowed);
        }
    }

    #[test]
    fn zero_quota_never_refills() {
        let mut rl = RateLimiter::new(true, 0, Duration::from_secs(10));
        assert_eq!(
            rl.check_at(UserId(1), Instant::now()),
            Admission::Limited { retry_after: None }
        );
    }

    #[test]
    fn users_have_separate_buckets() {
        let start = Instant::now();
        let mut rl = RateLimiter::new(true, 1, Duration::from_secs(60));
        assert!(rl.check_at(UserId(1), start).is_allowed());
        assert!(!rl.check_at(UserId(1), start).is_allowed());
        assert!(rl.check_at(UserId(2), start).is_allowed());
    }
}
