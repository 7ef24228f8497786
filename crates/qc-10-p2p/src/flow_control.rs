//! Per-peer flow control: a sliding one-second window of bytes received,
//! checked against the peer's own declared rate limit on every frame.
//! `crate::session` periodically sends the peer a `P2P_ACK` carrying
//! `total()`, this node's own cumulative count of bytes read from that
//! peer; on receipt, the peer can tell whether the figure it reports
//! back as "bytes you've sent me" ever exceeds what it actually wrote,
//! which is the drift a misbehaving or buggy peer would show. Throttling
//! decisions are made purely from what this node has actually read off
//! the socket.

const WINDOW_SECS: u64 = 1;

#[derive(Debug, Default)]
pub struct ByteCounter {
    window_start: u64,
    window_bytes: u64,
    /// Count of windows in a row that exceeded the limit. Reaching
    /// `BAN_AFTER_VIOLATIONS` earns a ban, not just a throttle.
    violations: u32,
    /// Cumulative bytes recorded over the session's lifetime, reported to
    /// the peer via `Message::Ack`.
    total: u64,
}

pub const BAN_AFTER_VIOLATIONS: u32 = 3;

pub enum RateDecision {
    Ok,
    Throttle,
    Ban,
}

impl ByteCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `bytes` received at `now` and classifies the peer's
    /// current window against `limit_bytes_per_sec`. Rolls the window
    /// over at a one-second boundary rather than draining continuously —
    /// a peer sending in bursts still gets compared against a whole
    /// second's budget, not penalized for momentary spikes within it.
    pub fn record(&mut self, bytes: u64, now: u64, limit_bytes_per_sec: u64) -> RateDecision {
        self.total += bytes;
        if now.saturating_sub(self.window_start) >= WINDOW_SECS {
            self.window_start = now;
            self.window_bytes = 0;
        }
        self.window_bytes += bytes;

        if self.window_bytes <= limit_bytes_per_sec {
            self.violations = 0;
            return RateDecision::Ok;
        }

        self.violations += 1;
        if self.violations >= BAN_AFTER_VIOLATIONS {
            RateDecision::Ban
        } else {
            RateDecision::Throttle
        }
    }

    /// Cumulative bytes recorded since this counter was created.
    pub fn total(&self) -> u64 {
        self.total
    }
}
