//! Header-first catch-up: pick the peer with the highest advertised
//! cumulative difficulty, walk its header chain backward from the
//! common tip, then fetch the missing block bodies in sliding windows.
//! Runs on its own dedicated connection per attempt rather than riding
//! along a `qc-10-p2p` gossip session, since this is a sequential
//! request/response exchange the gossip session's fire-and-forget
//! dispatch loop isn't shaped for.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use qc_02_codec::Encode;
use qc_03_store::adapters::kv::KeyValueStore;
use qc_06_block::BlockHeader;
use qc_07_mempool::TransactionPool;
use qc_08_chain::ChainManager;
use qc_10_p2p::message::Message;
use qc_10_p2p::peer::PeerTable;
use qc_10_p2p::{frame, ItemKind};
use shared_types::Hash;
use tokio::net::TcpStream;
use tracing::{info, warn};

use crate::config::SyncConfig;
use crate::errors::SyncError;
use crate::header_chain::validate_header_run;

pub struct Syncer<KV: KeyValueStore + 'static> {
    chain: Arc<Mutex<ChainManager<KV>>>,
    mempool: Arc<Mutex<TransactionPool>>,
    peers: Arc<PeerTable>,
    config: SyncConfig,
    genesis_hash: Hash,
}

fn unix_now() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

impl<KV: KeyValueStore + 'static> Syncer<KV> {
    pub fn new(
        chain: Arc<Mutex<ChainManager<KV>>>,
        mempool: Arc<Mutex<TransactionPool>>,
        peers: Arc<PeerTable>,
        config: SyncConfig,
        genesis_hash: Hash,
    ) -> Self {
        Self { chain, mempool, peers, config, genesis_hash }
    }

    /// Repeatedly pulls sliding windows from the best available peer
    /// until no connected peer is ahead of us, or no peer can serve a
    /// window without erroring out. Returns the number of blocks
    /// accepted. A peer whose window request fails (timeout, a
    /// malformed reply) is simply not retried this call — the next
    /// call re-selects, which may or may not be the same peer depending
    /// on whether its advertised difficulty has since been superseded.
    pub async fn sync_to_tip(&self) -> Result<u64, SyncError> {
        let mut total = 0u64;
        loop {
            let local_difficulty = self.chain.lock().expect("chain mutex poisoned").cumulative_difficulty();
            let Some(peer_addr) = self.peers.best_peer() else { return Ok(total) };
            match self.peers.difficulty_of(&peer_addr) {
                Some(d) if d > local_difficulty => {}
                _ => return Ok(total),
            }

            match self.sync_window_from(peer_addr).await {
                Ok(0) => return Ok(total),
                Ok(n) => {
                    total += n;
                    info!(%peer_addr, fetched = n, total, "synced a window of blocks");
                }
                Err(err) => {
                    warn!(%peer_addr, %err, "sync window failed");
                    if err.bans_peer() {
                        if err.permanent_ban() {
                            self.peers.ban_permanently(peer_addr);
                        } else {
                            self.peers.ban_temporarily(peer_addr, unix_now(), self.config.ban_duration_secs);
                        }
                    }
                    return Ok(total);
                }
            }
        }
    }

    /// One header-then-bodies round trip against `peer_addr`. Opens a
    /// dedicated connection, exchanges a handshake, requests headers
    /// starting one past our tip, validates the run, then fetches each
    /// missing body by height.
    async fn sync_window_from(&self, peer_addr: SocketAddr) -> Result<u64, SyncError> {
        let timeout = Duration::from_secs(self.config.request_timeout_secs);
        let mut stream = tokio::time::timeout(timeout, TcpStream::connect(peer_addr)).await.map_err(|_| SyncError::Timeout)??;

        let parent = self.chain.lock().expect("chain mutex poisoned").tip();
        let tip_difficulty = self.chain.lock().expect("chain mutex poisoned").cumulative_difficulty();

        let our_version = Message::Version {
            protocol_version: self.config.protocol_version,
            genesis_hash: self.genesis_hash,
            declared_rate_limit: u64::MAX,
            tip_height: parent.height,
            tip_cumulative_difficulty: tip_difficulty,
        };
        send(&mut stream, &our_version, timeout).await?;
        let reply = recv(&mut stream, self.config.max_frame_bytes, timeout).await?;
        let Message::Version { genesis_hash: peer_genesis, .. } = reply else {
            return Err(SyncError::InconsistentChain("peer's first reply was not VE".to_string()));
        };
        if peer_genesis != self.genesis_hash {
            return Err(SyncError::GenesisMismatch { ours: self.genesis_hash, theirs: peer_genesis });
        }

        send(&mut stream, &Message::Sync { from_height: parent.height + 1, window: self.config.window_size }, timeout).await?;
        let reply = recv(&mut stream, self.config.max_frame_bytes, timeout).await?;
        let Message::HeaderHashes(headers) = reply else {
            return Err(SyncError::InconsistentChain("expected HEADERHASHES in reply to SYNC".to_string()));
        };
        if headers.is_empty() {
            return Ok(0);
        }

        validate_header_run(&parent, &headers, unix_now())
            .map_err(|e| SyncError::InconsistentChain(format!("header run failed validation: {e}")))?;

        let mut fetched = 0u64;
        for header in &headers {
            self.fetch_and_submit_block(&mut stream, header, timeout).await?;
            fetched += 1;
        }
        Ok(fetched)
    }

    async fn fetch_and_submit_block(
        &self,
        stream: &mut TcpStream,
        header: &BlockHeader,
        timeout: Duration,
    ) -> Result<(), SyncError> {
        let hash = header.hash();
        if self.chain.lock().expect("chain mutex poisoned").block_by_hash(&hash).is_ok() {
            return Ok(());
        }

        send(stream, &Message::SendFullMessage { hash, kind: ItemKind::Block }, timeout).await?;
        let reply = recv(stream, self.config.max_frame_bytes, timeout).await?;
        let Message::Block(block) = reply else {
            return Err(SyncError::InconsistentChain("expected BK in reply to SFM".to_string()));
        };

        let got_hash = block.header.hash();
        if got_hash != hash {
            return Err(SyncError::BlockMismatch { expected: hash, got: got_hash });
        }

        let now = block.header.timestamp;
        let mut chain = self.chain.lock().expect("chain mutex poisoned");
        let mut mempool = self.mempool.lock().expect("mempool mutex poisoned");
        match chain.submit_block(block, &mut mempool, now) {
            Ok(_) | Err(qc_08_chain::ChainError::AlreadyKnown(_)) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

async fn send(stream: &mut TcpStream, msg: &Message, timeout: Duration) -> Result<(), SyncError> {
    tokio::time::timeout(timeout, frame::write_frame(stream, &msg.encode_to_vec())).await.map_err(|_| SyncError::Timeout)?.map_err(|e| match e {
        qc_10_p2p::PeerError::Io(e) => SyncError::Io(e),
        qc_10_p2p::PeerError::FrameTooLarge(_) => SyncError::InconsistentChain("outgoing frame too large".to_string()),
        other => SyncError::InconsistentChain(other.to_string()),
    })
}

async fn recv(stream: &mut TcpStream, max_frame_bytes: u32, timeout: Duration) -> Result<Message, SyncError> {
    let bytes = tokio::time::timeout(timeout, frame::read_frame(stream, max_frame_bytes))
        .await
        .map_err(|_| SyncError::Timeout)?
        .map_err(|e| match e {
            qc_10_p2p::PeerError::Io(e) => SyncError::Io(e),
            qc_10_p2p::PeerError::FrameTooLarge(n) => SyncError::InconsistentChain(format!("peer sent an oversized frame ({n} bytes)")),
            other => SyncError::InconsistentChain(other.to_string()),
        })?;
    Ok(Message::decode_from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qc_03_store::{InMemoryKVStore, StoreConfig};
    use qc_05_tx::{Transaction, TxPayload};
    use qc_06_block::genesis::build_genesis;
    use qc_06_block::{merkle_root, Block, BlockConfig, BlockHeader};
    use qc_07_mempool::MempoolConfig;
    use qc_08_chain::ChainConfig;
    use shared_types::{Address, PublicKeyBytes, SignatureBytes};
    use tokio::net::TcpListener;

    const EASY_BITS: u32 = 0x20ff_ffff;

    fn recipient() -> Address {
        let mut bytes = [0u8; 25];
        bytes[0] = Address::VERSION_DEV;
        bytes[1] = 7;
        Address(bytes)
    }

    fn test_config() -> ChainConfig {
        let mut block = BlockConfig::default();
        block.difficulty.initial_bits = EASY_BITS;
        block.difficulty.min_bits = EASY_BITS;
        ChainConfig { block, reorg_limit: 100, median_time_window: 3 }
    }

    fn mine_on(parent: &BlockHeader, timestamp: u64, nonce: u64) -> Block {
        let cfg = test_config();
        let height = parent.height + 1;
        let amount = qc_06_block::subsidy(&cfg.block.difficulty, height);
        let transactions = vec![Transaction {
            master_address: recipient(),
            public_key: PublicKeyBytes(Vec::new()),
            signature: SignatureBytes(Vec::new()),
            nonce: 0,
            fee: 0,
            payload: TxPayload::Coinbase { recipient: recipient(), amount },
        }];
        let header = BlockHeader {
            version: 1,
            height,
            parent_hash: parent.hash(),
            merkle_root: merkle_root(&transactions),
            timestamp,
            bits: EASY_BITS,
            nonce,
            extra_nonce: 0,
        };
        Block { header, transactions }
    }

    fn local_syncer() -> (tempfile::TempDir, Syncer<InMemoryKVStore>, Hash) {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config();
        let genesis = build_genesis(&cfg.block.difficulty, 1_700_000_000, &[]);
        let genesis_hash = genesis.header.hash();
        let chain = ChainManager::<InMemoryKVStore>::open_in_memory(dir.path(), cfg, StoreConfig::default(), genesis).unwrap();
        let syncer = Syncer::new(
            Arc::new(Mutex::new(chain)),
            Arc::new(Mutex::new(TransactionPool::new(MempoolConfig::default()))),
            Arc::new(PeerTable::new()),
            SyncConfig { request_timeout_secs: 2, ..SyncConfig::default() },
            genesis_hash,
        );
        (dir, syncer, genesis_hash)
    }

    async fn version_msg(genesis_hash: Hash, tip_height: u64, tip_cumulative_difficulty: u128) -> Message {
        Message::Version {
            protocol_version: 1,
            genesis_hash,
            declared_rate_limit: u64::MAX,
            tip_height,
            tip_cumulative_difficulty,
        }
    }

    #[tokio::test]
    async fn syncs_a_single_block_from_a_peer_that_serves_an_honest_chain() {
        let (_dir, syncer, genesis_hash) = local_syncer();
        let genesis_header = syncer.chain.lock().unwrap().tip();
        let child = mine_on(&genesis_header, 1_700_000_100, 1);
        let child_header = child.header.clone();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let child_header_for_peer = child_header.clone();
        let peer = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let _ours = recv_test(&mut sock).await;
            send_test(&mut sock, &version_msg(genesis_hash, 1, 1_000).await).await;
            let _sync_req = recv_test(&mut sock).await;
            send_test(&mut sock, &Message::HeaderHashes(vec![child_header_for_peer])).await;
            let _fetch = recv_test(&mut sock).await;
            send_test(&mut sock, &Message::Block(child)).await;
        });

        let fetched = syncer.sync_window_from(addr).await.unwrap();
        assert_eq!(fetched, 1);
        assert_eq!(syncer.chain.lock().unwrap().tip().hash(), child_header.hash());
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn a_header_run_that_does_not_chain_is_rejected_without_fetching_a_body() {
        let (_dir, syncer, genesis_hash) = local_syncer();
        let genesis_header = syncer.chain.lock().unwrap().tip();
        let mut broken = mine_on(&genesis_header, 1_700_000_100, 1).header;
        broken.parent_hash = [9u8; 32];

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let _ours = recv_test(&mut sock).await;
            send_test(&mut sock, &version_msg(genesis_hash, 1, 1_000).await).await;
            let _sync_req = recv_test(&mut sock).await;
            send_test(&mut sock, &Message::HeaderHashes(vec![broken])).await;
        });

        let err = syncer.sync_window_from(addr).await.unwrap_err();
        assert!(matches!(err, SyncError::InconsistentChain(_)));
        assert!(err.bans_peer());
    }

    #[tokio::test]
    async fn a_block_body_that_does_not_match_its_header_is_rejected() {
        let (_dir, syncer, genesis_hash) = local_syncer();
        let genesis_header = syncer.chain.lock().unwrap().tip();
        let child = mine_on(&genesis_header, 1_700_000_100, 1);
        let child_header = child.header.clone();
        let wrong_block = mine_on(&genesis_header, 1_700_000_100, 2);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let _ours = recv_test(&mut sock).await;
            send_test(&mut sock, &version_msg(genesis_hash, 1, 1_000).await).await;
            let _sync_req = recv_test(&mut sock).await;
            send_test(&mut sock, &Message::HeaderHashes(vec![child_header])).await;
            let _fetch = recv_test(&mut sock).await;
            send_test(&mut sock, &Message::Block(wrong_block)).await;
        });

        let err = syncer.sync_window_from(addr).await.unwrap_err();
        assert!(matches!(err, SyncError::BlockMismatch { .. }));
        assert!(err.bans_peer());
    }

    #[tokio::test]
    async fn a_mismatched_genesis_is_rejected_and_would_be_banned_permanently() {
        let (_dir, syncer, _genesis_hash) = local_syncer();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let _ours = recv_test(&mut sock).await;
            send_test(&mut sock, &version_msg([9u8; 32], 5, 9_999).await).await;
        });

        let err = syncer.sync_window_from(addr).await.unwrap_err();
        assert!(matches!(err, SyncError::GenesisMismatch { .. }));
        assert!(err.permanent_ban());
    }

    #[tokio::test]
    async fn a_peer_that_never_replies_times_out() {
        let (_dir, syncer, _genesis_hash) = local_syncer();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_sock, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let err = syncer.sync_window_from(addr).await.unwrap_err();
        assert!(matches!(err, SyncError::Timeout));
    }

    async fn send_test(stream: &mut TcpStream, msg: &Message) {
        frame::write_frame(stream, &msg.encode_to_vec()).await.unwrap();
    }

    async fn recv_test(stream: &mut TcpStream) -> Message {
        let bytes = frame::read_frame(stream, 8 * 1024 * 1024).await.unwrap();
        Message::decode_from_slice(&bytes).unwrap()
    }
}
