//! The envelope carried inside every frame: a one-byte function code plus
//! exactly one payload. Nested payloads (`Transaction`, `Block`,
//! `BlockHeader`) delegate to their own [`qc_02_codec::Encode`] impl
//! rather than re-describing their layout here.
//!
//! The wire set in the spec lists nine typed transaction tags (`TX`, `MT`,
//! `TK`, `TT`, `SL`, `MC`, `MS`, `MV`, `LT`) mirroring `TxPayload`'s
//! variants. `Transaction`'s own encoding already carries a tag byte that
//! self-describes which of those it is (see `qc_07_mempool::GossipItemType`),
//! so this envelope carries one `Tx` variant rather than nine near-identical
//! wrappers around the same struct.

use qc_02_codec::{CodecError, CodecResult, Encode, Reader, Writer};
use qc_05_tx::Transaction;
use qc_06_block::{Block, BlockHeader};
use shared_types::Hash;

/// What kind of content an `MR`/`SFM` hash refers to — a gossiped item is
/// either a transaction or a block, and the responder needs to know which
/// before it can look the hash up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Tx,
    Block,
}

impl ItemKind {
    fn tag(self) -> u8 {
        match self {
            ItemKind::Tx => 0,
            ItemKind::Block => 1,
        }
    }

    fn from_tag(tag: u8) -> CodecResult<Self> {
        match tag {
            0 => Ok(ItemKind::Tx),
            1 => Ok(ItemKind::Block),
            _ => Err(CodecError::Malformed("unknown item kind tag")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PeerAddr {
    pub ip: std::net::IpAddr,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub enum Message {
    /// Handshake. The initiator sends this first; the responder replies
    /// in kind. A genesis mismatch ends the session immediately.
    Version {
        protocol_version: u32,
        genesis_hash: Hash,
        declared_rate_limit: u64,
        tip_height: u64,
        tip_cumulative_difficulty: u128,
    },
    /// A sample of this node's peer table, sent on request during
    /// bootstrap.
    Peers(Vec<PeerAddr>),
    /// Idle-connection heartbeat; refreshes `last_contact_ts` on receipt.
    Pong,
    /// "I have this." Gossip announcement; the receiver requests the body
    /// with `SFM` only if it doesn't already have `hash`.
    HaveHash { hash: Hash, kind: ItemKind },
    /// "Send me the full thing for this hash."
    SendFullMessage { hash: Hash, kind: ItemKind },
    /// A full block, sent in answer to `FB` or `SFM`.
    Block(Block),
    /// Fetch a block by height, used by the syncer's sliding window.
    FetchBlock { height: u64 },
    /// An unsolicited push of a newly produced or newly received block.
    PushBlock(Block),
    /// This node's current tip height and cumulative difficulty, used by
    /// peers to decide whether they're behind.
    BlockHeight { height: u64, cumulative_difficulty: u128 },
    /// A gossiped transaction of any payload kind.
    Tx(Transaction),
    /// Header-first catch-up request: give me headers from `from_height`,
    /// at most `window` of them.
    Sync { from_height: u64, window: u32 },
    /// This node's chain state, sent in answer to `Sync` or on request.
    ChainState { tip_height: u64, tip_hash: Hash, cumulative_difficulty: u128 },
    /// A contiguous run of headers, walked backward from the requested
    /// height. The syncer validates the whole run before trusting it.
    HeaderHashes(Vec<BlockHeader>),
    /// Cumulative bytes received so far this session, used for flow
    /// control (see [`crate::flow_control`]).
    Ack { bytes_received: u64 },
}

const TAG_VERSION: u8 = 0;
const TAG_PEERS: u8 = 1;
const TAG_PONG: u8 = 2;
const TAG_HAVE_HASH: u8 = 3;
const TAG_SEND_FULL: u8 = 4;
const TAG_BLOCK: u8 = 5;
const TAG_FETCH_BLOCK: u8 = 6;
const TAG_PUSH_BLOCK: u8 = 7;
const TAG_BLOCK_HEIGHT: u8 = 8;
const TAG_TX: u8 = 9;
const TAG_SYNC: u8 = 10;
const TAG_CHAIN_STATE: u8 = 11;
const TAG_HEADER_HASHES: u8 = 12;
const TAG_ACK: u8 = 13;

fn encode_peer_addr(w: &mut Writer, addr: &PeerAddr) {
    match addr.ip {
        std::net::IpAddr::V4(v4) => {
            w.u8(4).fixed_bytes(&v4.octets());
        }
        std::net::IpAddr::V6(v6) => {
            w.u8(6).fixed_bytes(&v6.octets());
        }
    }
    w.u16(addr.port);
}

fn decode_peer_addr(r: &mut Reader) -> CodecResult<PeerAddr> {
    let ip = match r.u8()? {
        4 => std::net::IpAddr::V4(std::net::Ipv4Addr::from(r.fixed_bytes::<4>()?)),
        6 => std::net::IpAddr::V6(std::net::Ipv6Addr::from(r.fixed_bytes::<16>()?)),
        _ => return Err(CodecError::Malformed("unknown address family tag")),
    };
    let port = r.u16()?;
    Ok(PeerAddr { ip, port })
}

impl Encode for Message {
    fn encode(&self, w: &mut Writer) {
        match self {
            Message::Version { protocol_version, genesis_hash, declared_rate_limit, tip_height, tip_cumulative_difficulty } => {
                w.u8(TAG_VERSION)
                    .u32(*protocol_version)
                    .fixed_bytes(genesis_hash)
                    .u64(*declared_rate_limit)
                    .u64(*tip_height)
                    .u128(*tip_cumulative_difficulty);
            }
            Message::Peers(addrs) => {
                w.u8(TAG_PEERS).seq(addrs, |w, a| encode_peer_addr(w, a));
            }
            Message::Pong => {
                w.u8(TAG_PONG);
            }
            Message::HaveHash { hash, kind } => {
                w.u8(TAG_HAVE_HASH).fixed_bytes(hash).u8(kind.tag());
            }
            Message::SendFullMessage { hash, kind } => {
                w.u8(TAG_SEND_FULL).fixed_bytes(hash).u8(kind.tag());
            }
            Message::Block(block) => {
                w.u8(TAG_BLOCK);
                block.encode(w);
            }
            Message::FetchBlock { height } => {
                w.u8(TAG_FETCH_BLOCK).u64(*height);
            }
            Message::PushBlock(block) => {
                w.u8(TAG_PUSH_BLOCK);
                block.encode(w);
            }
            Message::BlockHeight { height, cumulative_difficulty } => {
                w.u8(TAG_BLOCK_HEIGHT).u64(*height).u128(*cumulative_difficulty);
            }
            Message::Tx(tx) => {
                w.u8(TAG_TX);
                tx.encode(w);
            }
            Message::Sync { from_height, window } => {
                w.u8(TAG_SYNC).u64(*from_height).u32(*window);
            }
            Message::ChainState { tip_height, tip_hash, cumulative_difficulty } => {
                w.u8(TAG_CHAIN_STATE).u64(*tip_height).fixed_bytes(tip_hash).u128(*cumulative_difficulty);
            }
            Message::HeaderHashes(headers) => {
                w.u8(TAG_HEADER_HASHES).seq(headers, |w, h| h.encode(w));
            }
            Message::Ack { bytes_received } => {
                w.u8(TAG_ACK).u64(*bytes_received);
            }
        }
    }

    fn decode(r: &mut Reader) -> CodecResult<Self> {
        let tag = r.u8()?;
        let msg = match tag {
            TAG_VERSION => Message::Version {
                protocol_version: r.u32()?,
                genesis_hash: r.fixed_bytes()?,
                declared_rate_limit: r.u64()?,
                tip_height: r.u64()?,
                tip_cumulative_difficulty: r.u128()?,
            },
            TAG_PEERS => Message::Peers(r.seq(decode_peer_addr)?),
            TAG_PONG => Message::Pong,
            TAG_HAVE_HASH => Message::HaveHash { hash: r.fixed_bytes()?, kind: ItemKind::from_tag(r.u8()?)? },
            TAG_SEND_FULL => Message::SendFullMessage { hash: r.fixed_bytes()?, kind: ItemKind::from_tag(r.u8()?)? },
            TAG_BLOCK => Message::Block(Block::decode(r)?),
            TAG_FETCH_BLOCK => Message::FetchBlock { height: r.u64()? },
            TAG_PUSH_BLOCK => Message::PushBlock(Block::decode(r)?),
            TAG_BLOCK_HEIGHT => Message::BlockHeight { height: r.u64()?, cumulative_difficulty: r.u128()? },
            TAG_TX => Message::Tx(Transaction::decode(r)?),
            TAG_SYNC => Message::Sync { from_height: r.u64()?, window: r.u32()? },
            TAG_CHAIN_STATE => {
                Message::ChainState { tip_height: r.u64()?, tip_hash: r.fixed_bytes()?, cumulative_difficulty: r.u128()? }
            }
            TAG_HEADER_HASHES => Message::HeaderHashes(r.seq(BlockHeader::decode)?),
            TAG_ACK => Message::Ack { bytes_received: r.u64()? },
            _ => return Err(CodecError::Malformed("unknown message tag")),
        };
        Ok(msg)
    }
}
