//! Builds the genesis block for a given network from its static
//! [`NetworkParams`] rather than letting one be supplied ad hoc — every
//! node on the same network must derive byte-identical genesis, or their
//! genesis hashes diverge and the `VE` handshake (`qc_10_p2p`) rejects
//! every peer the other side tries to dial.

use qc_06_block::genesis::build_genesis;
use qc_06_block::Block;

use crate::network_params::NetworkParams;

pub fn build_for_network(params: &NetworkParams) -> Block {
    build_genesis(&params.difficulty, params.genesis_timestamp, &params.genesis_allocations())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network_params::NetworkType;

    #[test]
    fn the_same_network_always_builds_the_same_genesis_hash() {
        let params = NetworkParams::for_network(NetworkType::Dev);
        let a = build_for_network(&params);
        let b = build_for_network(&params);
        assert_eq!(a.header.hash(), b.header.hash());
    }

    #[test]
    fn different_networks_build_different_genesis_hashes() {
        let dev = build_for_network(&NetworkParams::for_network(NetworkType::Dev));
        let testnet = build_for_network(&NetworkParams::for_network(NetworkType::Testnet));
        assert_ne!(dev.header.hash(), testnet.header.hash());
    }

    #[test]
    fn genesis_has_height_zero_and_a_zero_parent() {
        let params = NetworkParams::for_network(NetworkType::Dev);
        let block = build_for_network(&params);
        assert_eq!(block.header.height, 0);
        assert_eq!(block.header.parent_hash, shared_types::ZERO_HASH);
    }
}
