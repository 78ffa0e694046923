//! Admission control (§4.2, §7): a per-session message-rate limiter and
//! a per-IP connection cap. Grounded in the teacher's
//! `warpgate-core::rate_limiting` use of `governor`, but the shape is
//! different — the teacher meters bytes/second for stream shaping,
//! this meters whole messages/minute and only ever says yes or no.

use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use dashmap::DashMap;
use governor::clock::{Clock, DefaultClock};
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// One per [`crate::Session`]: admits up to `messages_per_minute`
/// messages (§3 `limits.messages_per_minute`, default 20) per rolling
/// minute.
pub struct SessionRateLimiter {
    inner: DirectRateLimiter,
}

impl SessionRateLimiter {
    pub fn new(messages_per_minute: NonZeroU32) -> Self {
        Self {
            inner: RateLimiter::direct(Quota::per_minute(messages_per_minute)),
        }
    }

    /// `true` if this message is admitted. Never blocks (§4.2: the
    /// (N+1)th message in the window gets `ERROR 2001` immediately,
    /// not a delayed success).
    pub fn check(&self) -> bool {
        self.inner.check().is_ok()
    }
}

/// Tracks live connection counts per remote IP for
/// `limits.max_connections_per_ip` (§3). Shared across all transports
/// via a single instance in the listening binary.
#[derive(Default, Clone)]
pub struct ConnectionAdmission {
    counts: Arc<DashMap<IpAddr, usize>>,
}

impl ConnectionAdmission {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new connection attempt from `addr`. Returns `false`
    /// (and does not register) if `addr` is already at `max_per_ip`.
    pub fn try_admit(&self, addr: IpAddr, max_per_ip: usize) -> bool {
        let mut entry = self.counts.entry(addr).or_insert(0);
        if *entry >= max_per_ip {
            return false;
        }
        *entry += 1;
        true
    }

    pub fn release(&self, addr: IpAddr) {
        if let Some(mut entry) = self.counts.get_mut(&addr) {
            *entry = entry.saturating_sub(1);
            if *entry == 0 {
                drop(entry);
                self.counts.remove(&addr);
            }
        }
    }
}
