//! Node-wide mutable state shared across every connection-handling task.
//!
//! Replaces the original implementation's package-level mutable globals
//! (`KnownNodes`, `blocksInTransit`, `memoryPool`, ...) with a single value
//! every task holds an `Arc` to, each field behind its own lock so
//! unrelated mutations never contend.

use parking_lot::Mutex;
use strand_chain::{Chain, Mempool, UtxoIndex};
use strand_core::address::Address;
use strand_core::hash::Hash256;
use strand_store::Store;

/// The address every freshly-started node bootstraps its peer list from.
pub const SEED_NODE: &str = "localhost:3000";

pub struct NodeState<S: Store> {
    pub known_nodes: Mutex<Vec<String>>,
    pub blocks_in_transit: Mutex<Vec<Hash256>>,
    pub mempool: Mempool,
    pub node_address: String,
    pub mining_address: Mutex<Option<Address>>,
    pub chain: Chain<S>,
    pub utxo: UtxoIndex<S>,
}

impl<S: Store> NodeState<S> {
    pub fn new(
        node_address: String,
        mining_address: Option<Address>,
        chain: Chain<S>,
        utxo: UtxoIndex<S>,
    ) -> Self {
        let known_nodes = if node_address == SEED_NODE {
            Vec::new()
        } else {
            vec![SEED_NODE.to_string()]
        };

        Self {
            known_nodes: Mutex::new(known_nodes),
            blocks_in_transit: Mutex::new(Vec::new()),
            mempool: Mempool::new(),
            node_address,
            mining_address: Mutex::new(mining_address),
            chain,
            utxo,
        }
    }

    /// Whether this node is the seed node other nodes bootstrap against.
    pub fn is_seed(&self) -> bool {
        self.node_address == SEED_NODE
    }

    pub fn is_miner(&self) -> bool {
        self.mining_address.lock().is_some()
    }

    pub fn forget_node(&self, addr: &str) {
        self.known_nodes.lock().retain(|n| n != addr);
    }

    pub fn remember_node(&self, addr: String) {
        let mut nodes = self.known_nodes.lock();
        if !nodes.iter().any(|n| n == &addr) {
            nodes.push(addr);
        }
    }

    pub fn known_node_list(&self) -> Vec<String> {
        self.known_nodes.lock().clone()
    }
}
