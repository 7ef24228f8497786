//! One peer's session loop: handshake, then read-dispatch-respond until
//! the socket closes, the idle deadline fires, or the peer earns a ban.
//! There is one task per session; all of them share the chain manager
//! and mempool through the same `Arc<Mutex<_>>` the miner uses, so
//! `ChainManager::submit_block` still only ever has one caller at a time.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use qc_02_codec::Encode;
use qc_03_store::adapters::kv::KeyValueStore;
use qc_05_tx::{Transaction, TxConfig};
use qc_06_block::Block;
use qc_07_mempool::TransactionPool;
use qc_08_chain::ChainManager;
use shared_types::Hash;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::errors::PeerError;
use crate::flow_control::{ByteCounter, RateDecision};
use crate::frame::{read_frame, write_frame};
use crate::gossip::SeenBlocks;
use crate::message::{ItemKind, Message};
use crate::peer::PeerTable;
use crate::P2pConfig;

pub enum Direction {
    Inbound,
    Outbound,
}

/// Everything a session needs that outlives it. Cloned (cheaply, via the
/// inner `Arc`s) into every spawned session task.
///
/// Written by hand rather than `#[derive(Clone)]`: the derive would add
/// a spurious `KV: Clone` bound to the generated impl even though `KV`
/// only ever appears behind an `Arc`, and neither `InMemoryKVStore` nor
/// `RocksKVStore` implements `Clone`.
pub struct SharedState<KV: KeyValueStore> {
    pub chain: Arc<Mutex<ChainManager<KV>>>,
    pub mempool: Arc<Mutex<TransactionPool>>,
    pub peers: Arc<PeerTable>,
    pub seen_blocks: Arc<Mutex<SeenBlocks>>,
    pub tx_config: Arc<TxConfig>,
    pub config: Arc<P2pConfig>,
    pub genesis_hash: Hash,
}

impl<KV: KeyValueStore> Clone for SharedState<KV> {
    fn clone(&self) -> Self {
        Self {
            chain: Arc::clone(&self.chain),
            mempool: Arc::clone(&self.mempool),
            peers: Arc::clone(&self.peers),
            seen_blocks: Arc::clone(&self.seen_blocks),
            tx_config: Arc::clone(&self.tx_config),
            config: Arc::clone(&self.config),
            genesis_hash: self.genesis_hash,
        }
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

fn our_version<KV: KeyValueStore>(state: &SharedState<KV>) -> Message {
    let chain = state.chain.lock().expect("chain mutex poisoned");
    let tip = chain.tip();
    Message::Version {
        protocol_version: state.config.protocol_version,
        genesis_hash: state.genesis_hash,
        declared_rate_limit: state.config.peer_rate_limit,
        tip_height: tip.height,
        tip_cumulative_difficulty: chain.cumulative_difficulty(),
    }
}

/// Runs one peer session to completion. The caller (the listener loop or
/// the outbound dialer in `crate::service`) owns connection setup; this
/// owns everything from the handshake onward.
pub async fn run_session<KV, S>(
    mut stream: S,
    addr: SocketAddr,
    direction: Direction,
    state: SharedState<KV>,
) -> Result<(), PeerError>
where
    KV: KeyValueStore + 'static,
    S: AsyncRead + AsyncWrite + Unpin,
{
    if state.peers.is_permanently_banned(&addr) {
        return Err(PeerError::Banned);
    }

    let our_version_msg = our_version(&state);
    match direction {
        Direction::Outbound => {
            write_frame(&mut stream, &our_version_msg.encode_to_vec()).await?;
        }
        Direction::Inbound => {}
    }

    let first = read_message(&mut stream, state.config.max_frame_bytes).await?;
    let (peer_version, peer_genesis, peer_height, peer_difficulty) = match first {
        Message::Version { protocol_version, genesis_hash, tip_height, tip_cumulative_difficulty, .. } => {
            (protocol_version, genesis_hash, tip_height, tip_cumulative_difficulty)
        }
        _ => return Err(PeerError::HandshakeNotFirst),
    };

    if peer_genesis != state.genesis_hash {
        state.peers.ban_permanently(addr);
        return Err(PeerError::GenesisMismatch { ours: state.genesis_hash, theirs: peer_genesis });
    }

    if let Direction::Inbound = direction {
        write_frame(&mut stream, &our_version_msg.encode_to_vec()).await?;
    }

    let now = unix_now();
    state.peers.on_connected(addr, peer_version, now);
    state.peers.update_difficulty(addr, peer_difficulty);
    quantum_telemetry::log_peer_event!(info, "peer handshake complete", addr, peer_height);

    let result = session_loop(&mut stream, addr, &state).await;

    state.peers.on_disconnected(&addr);
    if let Err(err) = &result {
        if err.bans_peer() {
            if err.permanent_ban() {
                state.peers.ban_permanently(addr);
            } else {
                state.peers.ban_temporarily(addr, unix_now(), state.config.ban_duration_secs);
            }
            quantum_telemetry::log_peer_event!(warn, "peer session ended in a ban", addr, err = %err);
        } else {
            quantum_telemetry::log_peer_event!(debug, "peer session ended", addr, err = %err);
        }
    }
    result
}

async fn read_message<S: AsyncRead + Unpin>(stream: &mut S, max_frame_bytes: u32) -> Result<Message, PeerError> {
    let bytes = read_frame(stream, max_frame_bytes).await?;
    Message::decode_from_slice(&bytes).map_err(PeerError::from)
}

/// How often this side emits a `P2P_ACK` reporting the bytes it has read
/// from the peer so far.
const ACK_INTERVAL_SECS: u64 = 10;

async fn session_loop<KV, S>(stream: &mut S, addr: SocketAddr, state: &SharedState<KV>) -> Result<(), PeerError>
where
    KV: KeyValueStore + 'static,
    S: AsyncRead + AsyncWrite + Unpin,
{
    let idle_timeout = Duration::from_secs(state.config.idle_timeout_secs);
    let mut counter = ByteCounter::new();
    let mut bytes_written: u64 = 0;
    let mut ack_interval = tokio::time::interval(Duration::from_secs(ACK_INTERVAL_SECS));
    ack_interval.tick().await;

    loop {
        tokio::select! {
            read = tokio::time::timeout(idle_timeout, read_frame(stream, state.config.max_frame_bytes)) => {
                let bytes = read.map_err(|_| PeerError::Timeout)??;

                let now = unix_now();
                state.peers.touch(&addr, now);
                match counter.record(bytes.len() as u64 + 4, now, state.config.peer_rate_limit) {
                    RateDecision::Ok => {}
                    RateDecision::Throttle => {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                    RateDecision::Ban => return Err(PeerError::RateExceeded),
                }

                let msg = Message::decode_from_slice(&bytes)?;
                if let Message::Ack { bytes_received } = &msg {
                    if *bytes_received > bytes_written {
                        return Err(PeerError::ProtocolViolation("peer's P2P_ACK claims more bytes received than this session has sent"));
                    }
                }
                if let Some(reply) = handle_message(msg, addr, state)? {
                    bytes_written += write_frame_counted(stream, &reply).await?;
                }
            }
            _ = ack_interval.tick() => {
                let ack = Message::Ack { bytes_received: counter.total() };
                bytes_written += write_frame_counted(stream, &ack).await?;
            }
        }
    }
}

async fn write_frame_counted<S: AsyncWrite + Unpin>(stream: &mut S, msg: &Message) -> Result<u64, PeerError> {
    let payload = msg.encode_to_vec();
    let len = payload.len() as u64 + 4;
    write_frame(stream, &payload).await?;
    Ok(len)
}

/// Dispatches one decoded message, returning an immediate reply to write
/// back (if any). Messages that trigger a separate outbound fetch
/// (`HaveHash` → `SendFullMessage`) return that request as the reply;
/// there is no second channel back into the session's write half.
fn handle_message<KV: KeyValueStore + 'static>(
    msg: Message,
    addr: SocketAddr,
    state: &SharedState<KV>,
) -> Result<Option<Message>, PeerError> {
    match msg {
        Message::Version { .. } => Err(PeerError::ProtocolViolation("a second VE was sent after the handshake")),

        Message::Peers(_) => Ok(None),

        Message::Pong => Ok(None),

        Message::HaveHash { hash, kind } => {
            let already_have = match kind {
                ItemKind::Tx => state.mempool.lock().expect("mempool mutex poisoned").contains(&hash),
                ItemKind::Block => state.seen_blocks.lock().expect("seen-blocks mutex poisoned").contains(&hash),
            };
            if already_have {
                Ok(None)
            } else {
                if kind == ItemKind::Block {
                    state.seen_blocks.lock().expect("seen-blocks mutex poisoned").insert(hash);
                }
                Ok(Some(Message::SendFullMessage { hash, kind }))
            }
        }

        Message::SendFullMessage { hash, kind } => match kind {
            ItemKind::Tx => {
                let mempool = state.mempool.lock().expect("mempool mutex poisoned");
                Ok(mempool.get(&hash).cloned().map(Message::Tx))
            }
            ItemKind::Block => {
                let chain = state.chain.lock().expect("chain mutex poisoned");
                match chain.block_by_hash(&hash) {
                    Ok(block) => Ok(Some(Message::Block(block))),
                    Err(_) => Ok(None),
                }
            }
        },

        Message::Block(block) | Message::PushBlock(block) => {
            admit_block(block, state)?;
            Ok(None)
        }

        Message::FetchBlock { height } => {
            let chain = state.chain.lock().expect("chain mutex poisoned");
            match chain.header_at(height) {
                Some(header) => match chain.block_by_hash(&header.hash()) {
                    Ok(block) => Ok(Some(Message::Block(block))),
                    Err(_) => Ok(None),
                },
                None => Ok(None),
            }
        }

        Message::BlockHeight { cumulative_difficulty, .. } => {
            state.peers.update_difficulty(addr, cumulative_difficulty);
            Ok(None)
        }

        Message::Tx(tx) => {
            admit_transaction(tx, state)?;
            Ok(None)
        }

        Message::Sync { from_height, window } => {
            let chain = state.chain.lock().expect("chain mutex poisoned");
            let tip_height = chain.tip().height;
            let end = from_height.saturating_add(window as u64).min(tip_height + 1);
            let headers = (from_height..end).filter_map(|h| chain.header_at(h)).collect();
            Ok(Some(Message::HeaderHashes(headers)))
        }

        Message::ChainState { cumulative_difficulty, .. } => {
            state.peers.update_difficulty(addr, cumulative_difficulty);
            Ok(None)
        }

        Message::HeaderHashes(_) => {
            // The syncer (qc-11) owns validating and acting on a header
            // run; a bare session has nothing useful to do with one
            // beyond not erroring on it.
            Ok(None)
        }

        Message::Ack { .. } => Ok(None),
    }
}

fn admit_transaction<KV: KeyValueStore + 'static>(tx: Transaction, state: &SharedState<KV>) -> Result<(), PeerError> {
    let now = unix_now();
    let mut chain = state.chain.lock().expect("chain mutex poisoned");
    let mut mempool = state.mempool.lock().expect("mempool mutex poisoned");
    match chain.submit_transaction(tx, &state.tx_config, &mut mempool, now) {
        Ok(_) | Err(qc_07_mempool::MempoolError::AlreadyPresent) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn admit_block<KV: KeyValueStore + 'static>(block: Block, state: &SharedState<KV>) -> Result<(), PeerError> {
    let hash = block.header.hash();
    if !state.seen_blocks.lock().expect("seen-blocks mutex poisoned").insert(hash) {
        return Ok(());
    }
    let now = block.header.timestamp;
    let mut chain = state.chain.lock().expect("chain mutex poisoned");
    let mut mempool = state.mempool.lock().expect("mempool mutex poisoned");
    match chain.submit_block(block, &mut mempool, now) {
        Ok(_) | Err(qc_08_chain::ChainError::AlreadyKnown(_)) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qc_03_store::{InMemoryKVStore, StoreConfig};
    use qc_06_block::genesis::build_genesis;
    use qc_07_mempool::MempoolConfig;
    use qc_08_chain::ChainConfig;
    use tokio::io::duplex;

    fn test_state() -> SharedState<InMemoryKVStore> {
        let cfg = ChainConfig::default();
        let genesis = build_genesis(&cfg.block.difficulty, 1_700_000_000, &[]);
        let genesis_hash = genesis.header.hash();
        let dir = tempfile::tempdir().unwrap();
        let chain = ChainManager::<InMemoryKVStore>::open_in_memory(dir.path(), cfg, StoreConfig::default(), genesis).unwrap();
        SharedState {
            chain: Arc::new(Mutex::new(chain)),
            mempool: Arc::new(Mutex::new(TransactionPool::new(MempoolConfig::default()))),
            peers: Arc::new(PeerTable::new()),
            seen_blocks: Arc::new(Mutex::new(SeenBlocks::new(1024))),
            tx_config: Arc::new(TxConfig::default()),
            config: Arc::new(P2pConfig::default()),
            genesis_hash,
        }
    }

    #[tokio::test]
    async fn a_matching_genesis_hash_completes_the_handshake() {
        let state = test_state();
        let (mut a, mut b) = duplex(64 * 1024);
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();

        let our_msg = our_version(&state);
        write_frame(&mut a, &our_msg.encode_to_vec()).await.unwrap();

        let state2 = state.clone();
        let responder = tokio::spawn(async move {
            let first = read_message(&mut b, 1 << 20).await.unwrap();
            assert!(matches!(first, Message::Version { .. }));
            write_frame(&mut b, &our_version(&state2).encode_to_vec()).await.unwrap();
        });

        // Drive the session just far enough to observe the handshake
        // outcome, then drop it rather than block forever on the idle read.
        let session = tokio::time::timeout(Duration::from_millis(200), run_session(a, addr, Direction::Outbound, state.clone()));
        let _ = session.await;
        responder.await.unwrap();
        assert_eq!(state.peers.connected_count(), 0);
    }

    #[tokio::test]
    async fn a_mismatched_genesis_hash_ends_in_a_permanent_ban() {
        let state = test_state();
        let (mut a, mut b) = duplex(64 * 1024);
        let addr: SocketAddr = "127.0.0.1:2".parse().unwrap();

        let bad_version = Message::Version {
            protocol_version: 1,
            genesis_hash: [9u8; 32],
            declared_rate_limit: 1000,
            tip_height: 0,
            tip_cumulative_difficulty: 0,
        };
        tokio::spawn(async move {
            let _ = read_message(&mut b, 1 << 20).await;
            let _ = write_frame(&mut b, &bad_version.encode_to_vec()).await;
        });

        let err = run_session(a, addr, Direction::Outbound, state.clone()).await.unwrap_err();
        assert!(matches!(err, PeerError::GenesisMismatch { .. }));
        assert!(state.peers.is_permanently_banned(&addr));
    }

    #[test]
    fn handle_message_rejects_a_second_version_message() {
        let state = test_state();
        let addr: SocketAddr = "127.0.0.1:3".parse().unwrap();
        let msg = Message::Version {
            protocol_version: 1,
            genesis_hash: [0u8; 32],
            declared_rate_limit: 0,
            tip_height: 0,
            tip_cumulative_difficulty: 0,
        };
        let err = handle_message(msg, addr, &state).unwrap_err();
        assert!(matches!(err, PeerError::ProtocolViolation(_)));
    }

    #[test]
    fn an_unknown_have_hash_triggers_a_fetch_request() {
        let state = test_state();
        let addr: SocketAddr = "127.0.0.1:4".parse().unwrap();
        let reply = handle_message(Message::HaveHash { hash: [3u8; 32], kind: ItemKind::Block }, addr, &state).unwrap();
        assert!(matches!(reply, Some(Message::SendFullMessage { kind: ItemKind::Block, .. })));
    }
}
