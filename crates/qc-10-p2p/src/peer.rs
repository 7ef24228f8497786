//! Peer state and the peer table. One mutex guards the whole table — it
//! sits outside the chain write path, so a slow peer lookup never blocks
//! block validation (see `qc-08-chain`'s single-writer discipline).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;

/// `{addr, version, banned_until, credibility, last_contact_ts[N]}` as
/// specified: a fixed ring of recent contact timestamps rather than a
/// single one, so a burst of drops doesn't look identical to a peer that
/// has been silent for the whole window.
const CONTACT_HISTORY: usize = 8;

#[derive(Debug, Clone)]
pub struct PeerState {
    pub addr: SocketAddr,
    pub version: u32,
    pub banned_until: Option<u64>,
    pub credibility: f64,
    last_contact_ts: [u64; CONTACT_HISTORY],
    contact_cursor: usize,
}

impl PeerState {
    fn new(addr: SocketAddr, version: u32, now: u64) -> Self {
        let mut state = Self {
            addr,
            version,
            banned_until: None,
            credibility: 1.0,
            last_contact_ts: [0; CONTACT_HISTORY],
            contact_cursor: 0,
        };
        state.touch(now);
        state
    }

    pub fn touch(&mut self, now: u64) {
        self.last_contact_ts[self.contact_cursor] = now;
        self.contact_cursor = (self.contact_cursor + 1) % CONTACT_HISTORY;
    }

    pub fn last_contact(&self) -> u64 {
        self.last_contact_ts.iter().copied().max().unwrap_or(0)
    }

    pub fn is_idle(&self, now: u64, idle_timeout_secs: u64) -> bool {
        now.saturating_sub(self.last_contact()) > idle_timeout_secs
    }

    pub fn is_banned(&self, now: u64) -> bool {
        self.banned_until.is_some_and(|until| now < until)
    }

    fn reward(&mut self) {
        self.credibility = (self.credibility + 0.05).min(1.0);
    }

    fn penalize(&mut self, amount: f64) {
        self.credibility = (self.credibility - amount).max(0.0);
    }
}

#[derive(Default)]
struct Inner {
    peers: HashMap<SocketAddr, PeerState>,
    /// A permanent ban (genesis mismatch) is never evicted by
    /// [`PeerTable::prune_idle`] even after its peer entry is gone, so a
    /// banned address can be rejected at the TCP-accept stage before a
    /// `PeerState` even exists for it.
    permanent_bans: std::collections::HashSet<SocketAddr>,
    /// Each peer's last-advertised cumulative difficulty, refreshed by
    /// `VE`, `BH`, and `CHAINSTATE`. Kept separate from `PeerState` since
    /// it's a live announcement, not session bookkeeping.
    difficulties: HashMap<SocketAddr, u128>,
}

/// Tracks every peer this node knows about: connected sessions and the
/// ban list. A CLI or RPC layer can snapshot it for a `getpeerinfo`-style
/// query; the P2P session loop is the only writer in the hot path.
pub struct PeerTable {
    inner: Mutex<Inner>,
}

impl Default for PeerTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerTable {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner::default()) }
    }

    pub fn is_permanently_banned(&self, addr: &SocketAddr) -> bool {
        self.inner.lock().expect("peer table mutex poisoned").permanent_bans.contains(addr)
    }

    pub fn on_connected(&self, addr: SocketAddr, version: u32, now: u64) {
        let mut inner = self.inner.lock().expect("peer table mutex poisoned");
        inner.peers.insert(addr, PeerState::new(addr, version, now));
        quantum_telemetry::PEERS_CONNECTED.set(inner.peers.len() as f64);
        quantum_telemetry::log_peer_event!(info, "peer connected", addr, version);
    }

    pub fn on_disconnected(&self, addr: &SocketAddr) {
        let mut inner = self.inner.lock().expect("peer table mutex poisoned");
        inner.peers.remove(addr);
        quantum_telemetry::PEERS_CONNECTED.set(inner.peers.len() as f64);
    }

    pub fn touch(&self, addr: &SocketAddr, now: u64) {
        if let Some(peer) = self.inner.lock().expect("peer table mutex poisoned").peers.get_mut(addr) {
            peer.touch(now);
        }
    }

    pub fn reward(&self, addr: &SocketAddr) {
        if let Some(peer) = self.inner.lock().expect("peer table mutex poisoned").peers.get_mut(addr) {
            peer.reward();
        }
    }

    /// Temporary ban lasting `duration_secs` from `now`. A peer already
    /// under a longer ban keeps the longer one.
    pub fn ban_temporarily(&self, addr: SocketAddr, now: u64, duration_secs: u64) {
        let mut inner = self.inner.lock().expect("peer table mutex poisoned");
        let until = now + duration_secs;
        match inner.peers.get_mut(&addr) {
            Some(peer) => {
                peer.penalize(0.5);
                peer.banned_until = Some(peer.banned_until.map_or(until, |cur| cur.max(until)));
            }
            None => {
                let mut peer = PeerState::new(addr, 0, now);
                peer.banned_until = Some(until);
                inner.peers.insert(addr, peer);
            }
        }
        drop(inner);
        quantum_telemetry::PEERS_BANNED.inc();
        quantum_telemetry::log_peer_event!(warn, "peer temporarily banned", addr, until);
    }

    pub fn ban_permanently(&self, addr: SocketAddr) {
        let mut inner = self.inner.lock().expect("peer table mutex poisoned");
        inner.permanent_bans.insert(addr);
        inner.peers.remove(&addr);
        drop(inner);
        quantum_telemetry::PEERS_BANNED.inc();
        quantum_telemetry::log_peer_event!(warn, "peer permanently banned", addr);
    }

    pub fn connected_count(&self) -> usize {
        self.inner.lock().expect("peer table mutex poisoned").peers.len()
    }

    /// Addresses whose session should be dropped: idle past the timeout,
    /// or under an expired temporary ban that should be forgotten.
    pub fn idle_peers(&self, now: u64, idle_timeout_secs: u64) -> Vec<SocketAddr> {
        self.inner
            .lock()
            .expect("peer table mutex poisoned")
            .peers
            .values()
            .filter(|p| p.is_idle(now, idle_timeout_secs))
            .map(|p| p.addr)
            .collect()
    }

    pub fn update_difficulty(&self, addr: SocketAddr, cumulative_difficulty: u128) {
        self.inner.lock().expect("peer table mutex poisoned").difficulties.insert(addr, cumulative_difficulty);
    }

    pub fn difficulty_of(&self, addr: &SocketAddr) -> Option<u128> {
        self.inner.lock().expect("peer table mutex poisoned").difficulties.get(addr).copied()
    }

    /// The connected peer with the highest known cumulative difficulty,
    /// the syncer's header-sync source per the spec.
    pub fn best_peer(&self) -> Option<SocketAddr> {
        self.best_peer_by(|a| self.difficulty_of(a))
    }

    pub fn snapshot(&self) -> Vec<PeerState> {
        self.inner.lock().expect("peer table mutex poisoned").peers.values().cloned().collect()
    }

    /// The connected peer advertising the highest cumulative difficulty,
    /// used by the syncer to pick a header-sync source. Cumulative
    /// difficulty isn't part of `PeerState` (it's transient, refreshed by
    /// every `BH`/`CHAINSTATE`), so the caller supplies the lookup.
    pub fn best_peer_by<F: Fn(&SocketAddr) -> Option<u128>>(&self, difficulty_of: F) -> Option<SocketAddr> {
        self.snapshot()
            .into_iter()
            .filter_map(|p| difficulty_of(&p.addr).map(|d| (p.addr, d)))
            .max_by(|a, b| a.1.cmp(&b.1))
            .map(|(addr, _)| addr)
    }
}
