//! The TCP gossip server: one task per accepted connection, plus a signal
//! handler task and (when a mining address is configured) continuous
//! block production whenever the mempool fills up.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

use strand_core::hash::Hash256;
use strand_core::transaction::Transaction;
use strand_store::Store;

use crate::error::NetworkError;
use crate::message::{InvKind, Message};
use crate::state::NodeState;

/// Mempool size at which an eligible node starts mining automatically,
/// mirroring the original protocol's threshold.
const MINE_THRESHOLD: usize = 2;

pub struct NetworkServer<S: Store> {
    pub state: Arc<NodeState<S>>,
}

impl<S: Store + 'static> NetworkServer<S> {
    pub fn new(state: Arc<NodeState<S>>) -> Self {
        Self { state }
    }

    /// Bind the node's TCP listener and run the accept loop until the
    /// process is signaled to stop.
    pub async fn run(self: Arc<Self>) -> Result<(), NetworkError> {
        let listener = TcpListener::bind(&self.state.node_address).await?;
        info!(address = %self.state.node_address, "listening");

        {
            let server = Arc::clone(&self);
            tokio::spawn(async move {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(sig) => sig,
                    Err(e) => {
                        error!(error = %e, "failed to install SIGTERM handler");
                        return;
                    }
                };

                tokio::select! {
                    res = tokio::signal::ctrl_c() => {
                        if res.is_err() {
                            return;
                        }
                        warn!("received SIGINT, closing database");
                    }
                    _ = sigterm.recv() => {
                        warn!("received SIGTERM, closing database");
                    }
                }

                if let Err(e) = server.state.chain.close_store() {
                    error!(error = %e, "failed to flush database on shutdown");
                }
                std::process::exit(1);
            });
        }

        if !self.state.is_seed() {
            let server = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = server.send_version(crate::state::SEED_NODE).await {
                    warn!(error = %e, "failed to announce version to seed node");
                }
            });
        }

        loop {
            let (stream, _) = listener.accept().await?;
            let server = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = server.handle_connection(stream).await {
                    error!(error = %e, "connection handling failed");
                }
            });
        }
    }

    async fn handle_connection(&self, mut stream: TcpStream) -> Result<(), NetworkError> {
        let mut frame = Vec::new();
        stream.read_to_end(&mut frame).await?;

        let message = Message::decode(&frame)?;
        info!(command = message_name(&message), "received command");

        match message {
            Message::Addr { addr_list } => self.handle_addr(addr_list).await,
            Message::Block { block, .. } => self.handle_block(*block).await,
            Message::Inv { addr_from, kind, items } => {
                self.handle_inv(addr_from, kind, items).await
            }
            Message::GetBlocks { addr_from } => self.handle_get_blocks(addr_from).await,
            Message::GetData { addr_from, kind, id } => {
                self.handle_get_data(addr_from, kind, id).await
            }
            Message::Tx { addr_from, transaction } => {
                self.handle_tx(addr_from, *transaction).await
            }
            Message::Version { addr_from, best_height, .. } => {
                self.handle_version(addr_from, best_height).await
            }
        }
    }

    async fn handle_addr(&self, addr_list: Vec<String>) -> Result<(), NetworkError> {
        for addr in addr_list {
            self.state.remember_node(addr);
        }
        info!(count = self.state.known_node_list().len(), "known nodes updated");
        self.request_blocks().await;
        Ok(())
    }

    async fn handle_block(&self, block: strand_core::block::Block) -> Result<(), NetworkError> {
        info!(hash = %block.hash, "received a new block");
        self.state.chain.add_block(block)?;

        let next = {
            let mut in_transit = self.state.blocks_in_transit.lock();
            if in_transit.is_empty() {
                None
            } else {
                Some(in_transit.remove(0))
            }
        };

        match next {
            Some(hash) => {
                let addr_from = self.state.node_address.clone();
                self.send_get_data(&addr_from, InvKind::Block, hash).await;
            }
            None => {
                self.state.utxo.reindex(&self.state.chain)?;
            }
        }
        Ok(())
    }

    async fn handle_inv(
        &self,
        addr_from: String,
        kind: InvKind,
        items: Vec<Hash256>,
    ) -> Result<(), NetworkError> {
        info!(count = items.len(), kind = ?kind, "received inventory");
        match kind {
            InvKind::Block => {
                if let Some(&first) = items.first() {
                    *self.state.blocks_in_transit.lock() = items.clone();
                    self.send_get_data(&addr_from, InvKind::Block, first).await;
                    self.state
                        .blocks_in_transit
                        .lock()
                        .retain(|h| *h != first);
                }
            }
            InvKind::Tx => {
                if let Some(&txid) = items.first() {
                    if !self.state.mempool.contains(txid) {
                        self.send_get_data(&addr_from, InvKind::Tx, txid).await;
                    }
                }
            }
        }
        Ok(())
    }

    async fn handle_get_blocks(&self, addr_from: String) -> Result<(), NetworkError> {
        let hashes = self.state.chain.get_block_hashes()?;
        self.send_inv(&addr_from, InvKind::Block, hashes).await;
        Ok(())
    }

    async fn handle_get_data(
        &self,
        addr_from: String,
        kind: InvKind,
        id: Hash256,
    ) -> Result<(), NetworkError> {
        match kind {
            InvKind::Block => {
                if let Some(block) = self.state.chain.get_block(id)? {
                    self.send_block(&addr_from, block).await;
                }
            }
            InvKind::Tx => {
                if let Some(tx) = self.state.mempool.get(id) {
                    self.send_tx(&addr_from, tx).await;
                }
            }
        }
        Ok(())
    }

    async fn handle_tx(&self, addr_from: String, transaction: Transaction) -> Result<(), NetworkError> {
        let txid = transaction.id;
        self.state.mempool.insert(transaction);
        info!(pending = self.state.mempool.len(), "transaction added to mempool");

        if self.state.is_seed() {
            for node in self.state.known_node_list() {
                if node != self.state.node_address && node != addr_from {
                    self.send_inv(&node, InvKind::Tx, vec![txid]).await;
                }
            }
        } else if self.state.mempool.len() >= MINE_THRESHOLD && self.state.is_miner() {
            self.mine_tx().await?;
        }
        Ok(())
    }

    async fn handle_version(&self, addr_from: String, best_height: u64) -> Result<(), NetworkError> {
        let my_height = self.state.chain.get_best_height()?;
        if my_height < best_height {
            self.send_get_blocks(&addr_from).await;
        } else if my_height > best_height {
            self.send_version(&addr_from).await?;
        }
        self.state.remember_node(addr_from);
        Ok(())
    }

    /// Mine every verifiable pending transaction into a block, reindex the
    /// UTXO set, and announce the new block to every peer. Repeats while
    /// the mempool is still non-empty afterward (a loop instead of the
    /// original's recursive call).
    async fn mine_tx(&self) -> Result<(), NetworkError> {
        loop {
            let pending = self.state.mempool.drain();
            let verified: Vec<Transaction> = pending
                .into_iter()
                .filter(|tx| self.state.chain.verify_transaction(tx).is_ok())
                .collect();

            if verified.is_empty() {
                warn!("no valid pending transactions to mine");
                return Ok(());
            }

            let mining_address = self.state.mining_address.lock().clone();
            let Some(mining_address) = mining_address else {
                return Ok(());
            };

            let coinbase = Transaction::coinbase(&mining_address, Vec::new());
            let mut txs = verified;
            txs.push(coinbase);

            let block = self.state.chain.mine_block(&txs)?;
            self.state.utxo.reindex(&self.state.chain)?;
            info!(hash = %block.hash, "mined a new block");

            for node in self.state.known_node_list() {
                if node != self.state.node_address {
                    self.send_inv(&node, InvKind::Block, vec![block.hash]).await;
                }
            }

            if self.state.mempool.is_empty() {
                return Ok(());
            }
        }
    }

    async fn request_blocks(&self) {
        for node in self.state.known_node_list() {
            self.send_get_blocks(&node).await;
        }
    }

    async fn send_version(&self, addr: &str) -> Result<(), NetworkError> {
        let best_height = self.state.chain.get_best_height()?;
        let message = Message::Version {
            version: 1,
            best_height,
            addr_from: self.state.node_address.clone(),
        };
        self.send_data(addr, &message).await;
        Ok(())
    }

    async fn send_get_blocks(&self, addr: &str) {
        let message = Message::GetBlocks {
            addr_from: self.state.node_address.clone(),
        };
        self.send_data(addr, &message).await;
    }

    async fn send_get_data(&self, addr: &str, kind: InvKind, id: Hash256) {
        let message = Message::GetData {
            addr_from: self.state.node_address.clone(),
            kind,
            id,
        };
        self.send_data(addr, &message).await;
    }

    async fn send_inv(&self, addr: &str, kind: InvKind, items: Vec<Hash256>) {
        let message = Message::Inv {
            addr_from: self.state.node_address.clone(),
            kind,
            items,
        };
        self.send_data(addr, &message).await;
    }

    async fn send_block(&self, addr: &str, block: strand_core::block::Block) {
        let message = Message::Block {
            addr_from: self.state.node_address.clone(),
            block: Box::new(block),
        };
        self.send_data(addr, &message).await;
    }

    async fn send_tx(&self, addr: &str, transaction: Transaction) {
        let message = Message::Tx {
            addr_from: self.state.node_address.clone(),
            transaction: Box::new(transaction),
        };
        self.send_data(addr, &message).await;
    }

    async fn send_data(&self, addr: &str, message: &Message) {
        let frame = match message.encode() {
            Ok(frame) => frame,
            Err(e) => {
                error!(error = %e, "failed to encode outgoing message");
                return;
            }
        };

        match TcpStream::connect(addr).await {
            Ok(mut stream) => {
                if let Err(e) = stream.write_all(&frame).await {
                    warn!(%addr, error = %e, "failed to send message");
                }
            }
            Err(_) => {
                warn!(%addr, "peer unavailable, forgetting node");
                self.state.forget_node(addr);
            }
        }
    }
}

fn message_name(message: &Message) -> &'static str {
    match message {
        Message::Version { .. } => "version",
        Message::Addr { .. } => "addr",
        Message::GetBlocks { .. } => "getblocks",
        Message::Inv { .. } => "inv",
        Message::GetData { .. } => "getdata",
        Message::Block { .. } => "block",
        Message::Tx { .. } => "tx",
    }
}
