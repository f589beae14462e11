use std::time::Duration;

use tokio::time::Instant;

/// A stored value and the instant after which it reads as absent.
///
/// `expires_at == None` means the entry never expires.
#[derive(Debug, Clone)]
pub struct Entry<V> {
    pub value: V,
    pub expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    /// A zero `ttl` never expires. A `ttl` too large to represent is treated
    /// the same way.
    pub fn new(value: V, ttl: Duration) -> Self {
        let expires_at = if ttl.is_zero() {
            None
        } else {
            Instant::now().checked_add(ttl)
        };
        Self { value, expires_at }
    }

    /// Strictly after the deadline: an entry read exactly at `expires_at` is
    /// still live.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(deadline) if now > deadline)
    }
}
