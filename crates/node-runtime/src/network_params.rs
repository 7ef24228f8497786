//! Per-network constants the rest of the node reads off of rather than
//! re-deriving: which genesis to build, what difficulty to start at, and
//! who to dial on first boot. Selected once at startup by
//! [`NetworkType`] and never mutated afterward.

use std::fmt;
use std::str::FromStr;

use qc_06_block::genesis::GenesisAllocation;
use qc_06_block::DifficultyConfig;
use shared_types::{build_address, Address};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Mainnet,
    Testnet,
    Dev,
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkType::Mainnet => write!(f, "mainnet"),
            NetworkType::Testnet => write!(f, "testnet"),
            NetworkType::Dev => write!(f, "dev"),
        }
    }
}

impl FromStr for NetworkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(NetworkType::Mainnet),
            "testnet" => Ok(NetworkType::Testnet),
            "dev" => Ok(NetworkType::Dev),
            other => Err(format!("unknown network type {other:?}, expected mainnet, testnet, or dev")),
        }
    }
}

/// The partition key between networks is the genesis hash carried in
/// every peer's `VE` handshake (`qc_10_p2p::message::Message::Version`) —
/// there's no separate magic-byte field to keep in sync with it.
pub struct NetworkParams {
    pub network_type: NetworkType,
    pub genesis_timestamp: u64,
    pub difficulty: DifficultyConfig,
    pub bootstrap_peers: &'static [&'static str],
    pub default_p2p_port: u16,
}

impl NetworkParams {
    pub fn for_network(network_type: NetworkType) -> Self {
        match network_type {
            NetworkType::Mainnet => Self {
                network_type,
                genesis_timestamp: 1_735_689_600,
                difficulty: DifficultyConfig::default(),
                bootstrap_peers: &[],
                default_p2p_port: 10900,
            },
            NetworkType::Testnet => Self {
                network_type,
                genesis_timestamp: 1_735_689_600,
                difficulty: testnet_difficulty(),
                bootstrap_peers: &[],
                default_p2p_port: 19_100,
            },
            NetworkType::Dev => Self {
                network_type,
                genesis_timestamp: 1_700_000_000,
                difficulty: dev_difficulty(),
                bootstrap_peers: &[],
                default_p2p_port: 19_200,
            },
        }
    }

    /// Mainnet is a fair-launch network: no pre-mine, every coin enters
    /// circulation through the subsidy schedule. Testnet and dev fund a
    /// fixed faucet address so a fresh node has something to spend
    /// against scenario 1's "pre-declared genesis balances" without a
    /// separate bootstrap transaction.
    pub fn genesis_allocations(&self) -> Vec<GenesisAllocation> {
        match self.network_type {
            NetworkType::Mainnet => Vec::new(),
            NetworkType::Testnet => vec![GenesisAllocation { recipient: faucet_address(Address::VERSION_TESTNET), amount: 100_000_000_000 }],
            NetworkType::Dev => vec![GenesisAllocation { recipient: faucet_address(Address::VERSION_DEV), amount: 100_000_000_000 }],
        }
    }
}

fn faucet_address(version: u8) -> Address {
    build_address(version, &[0xfau8; 20])
}

/// A four-minute target with a wide retarget window: testnet blocks arrive
/// fast enough for interactive testing without the PoW search being
/// trivial enough to defeat the point of testing difficulty adjustment.
fn testnet_difficulty() -> DifficultyConfig {
    let mut cfg = DifficultyConfig::default();
    cfg.initial_bits = 0x1f00_ffff;
    cfg
}

/// Loosest possible compact target: a dev node mines and validates
/// without spending real wall-clock time searching for a nonce.
fn dev_difficulty() -> DifficultyConfig {
    let mut cfg = DifficultyConfig::default();
    cfg.initial_bits = 0x20ff_ffff;
    cfg.min_bits = 0x20ff_ffff;
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mainnet_has_no_pre_mine() {
        let params = NetworkParams::for_network(NetworkType::Mainnet);
        assert!(params.genesis_allocations().is_empty());
    }

    #[test]
    fn dev_funds_a_faucet_address() {
        let params = NetworkParams::for_network(NetworkType::Dev);
        let allocations = params.genesis_allocations();
        assert_eq!(allocations.len(), 1);
        assert_eq!(allocations[0].recipient.version(), Address::VERSION_DEV);
    }

    #[test]
    fn network_type_round_trips_through_its_string_form() {
        for (s, nt) in [("mainnet", NetworkType::Mainnet), ("testnet", NetworkType::Testnet), ("dev", NetworkType::Dev)] {
            assert_eq!(nt.to_string(), s);
            assert_eq!(s.parse::<NetworkType>().unwrap(), nt);
        }
    }
}
