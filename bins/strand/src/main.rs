//! strand — command-line interface to a Strand node: wallet management,
//! chain bootstrap and inspection, transaction submission, and the node's
//! network-facing mode.
//!
//! Every subcommand reads `NODE_ID` from the environment. It doubles as the
//! listen port (a node's address is always `localhost:<NODE_ID>`) and as
//! the suffix distinguishing one local node's on-disk state from another's,
//! so several nodes can run side by side on one machine for development.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use strand_chain::{Chain, UtxoIndex};
use strand_core::address::Address;
use strand_core::transaction::Transaction;
use strand_network::{NodeState, NetworkServer};
use strand_store::RocksStore;
use strand_wallet::Wallets;

#[derive(Parser)]
#[command(name = "strand")]
#[command(version, about = "Wallet, chain, and node commands for the Strand ledger")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new keypair and print its address.
    CreateWallet,
    /// List every address in this node's keystore.
    ListAddresses,
    /// Mint a new chain, crediting its genesis coinbase to `address`.
    CreateBlockchain {
        #[arg(long)]
        address: String,
    },
    /// Sum the unspent outputs locked to `address`.
    GetBalance {
        #[arg(long)]
        address: String,
    },
    /// Build, sign, and submit a transaction moving `amount` from `from` to `to`.
    Send {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: u64,
        /// Mine the transaction into a block locally instead of relaying it
        /// to the seed node.
        #[arg(long)]
        mine: bool,
    },
    /// Print every block from the tip back to genesis.
    PrintChain,
    /// Rebuild the UTXO index from a full chain scan.
    ReindexUtxo,
    /// Run this node's gossip server until interrupted.
    StartNode {
        /// Address to credit with mining rewards. Omit to run as a
        /// relay-only node that never mines.
        #[arg(long)]
        miner: Option<String>,
    },
}

fn node_id() -> Result<String> {
    std::env::var("NODE_ID").context("NODE_ID environment variable must be set")
}

fn db_path(node_id: &str) -> PathBuf {
    PathBuf::from(format!("tmp/db/blocks_{node_id}"))
}

fn wallet_dir() -> PathBuf {
    PathBuf::from("tmp/wallets")
}

fn open_store(node_id: &str) -> Result<Arc<RocksStore>> {
    Ok(Arc::new(RocksStore::open(db_path(node_id))?))
}

fn open_wallets(node_id: &str) -> Result<Wallets> {
    Ok(Wallets::new(&wallet_dir(), node_id)?)
}

fn parse_address(s: &str) -> Result<Address> {
    Address::parse(s).with_context(|| format!("invalid address: {s}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::CreateWallet => create_wallet(),
        Commands::ListAddresses => list_addresses(),
        Commands::CreateBlockchain { address } => create_blockchain(&address),
        Commands::GetBalance { address } => get_balance(&address),
        Commands::Send { from, to, amount, mine } => send(&from, &to, amount, mine),
        Commands::PrintChain => print_chain(),
        Commands::ReindexUtxo => reindex_utxo(),
        Commands::StartNode { miner } => start_node(miner).await,
    }
}

fn create_wallet() -> Result<()> {
    let node_id = node_id()?;
    let mut wallets = open_wallets(&node_id)?;
    let address = wallets.create_wallet();
    wallets.save_to_file(&wallet_dir(), &node_id)?;
    println!("{address}");
    Ok(())
}

fn list_addresses() -> Result<()> {
    let node_id = node_id()?;
    let wallets = open_wallets(&node_id)?;
    for address in wallets.get_all_addresses() {
        println!("{address}");
    }
    Ok(())
}

fn create_blockchain(address: &str) -> Result<()> {
    let node_id = node_id()?;
    let address = parse_address(address)?;
    let store = open_store(&node_id)?;

    let chain = Chain::init(store.clone(), &address)?;
    let utxo = UtxoIndex::new(store);
    utxo.reindex(&chain)?;

    println!("blockchain created at {}", db_path(&node_id).display());
    Ok(())
}

fn get_balance(address: &str) -> Result<()> {
    let node_id = node_id()?;
    let address = parse_address(address)?;
    let store = open_store(&node_id)?;
    let utxo = UtxoIndex::new(store);

    let outputs = utxo.find_unspent_transactions(&address.pubkey_hash())?;
    let balance: u64 = outputs.iter().map(|out| out.value).sum();
    println!("Balance of {address}: {balance}");
    Ok(())
}

fn send(from: &str, to: &str, amount: u64, mine: bool) -> Result<()> {
    let node_id = node_id()?;
    let from_address = parse_address(from)?;
    let to_address = parse_address(to)?;

    let wallets = open_wallets(&node_id)?;
    let wallet = wallets
        .get_wallet(from)
        .with_context(|| format!("no wallet found in this node's keystore for {from}"))?;

    let store = open_store(&node_id)?;
    let chain = Chain::continue_chain(store.clone())?;
    let utxo = UtxoIndex::new(store);

    let pubkey = wallet.key_pair().public_key().to_bytes();
    let mut tx = utxo.build_transaction(&pubkey, &to_address, amount)?;
    chain.sign_transaction(&mut tx, wallet.key_pair())?;

    if mine {
        let coinbase = Transaction::coinbase(&from_address, Vec::new());
        let block = chain.mine_block(&[coinbase, tx])?;
        utxo.reindex(&chain)?;
        println!("mined block {}", block.hash);
    } else {
        submit_to_seed(&node_id, tx)?;
        println!("transaction relayed to seed node");
    }

    Ok(())
}

/// Hand a transaction to the seed node over the same wire protocol a
/// running node speaks, as if this CLI invocation were a one-shot peer.
fn submit_to_seed(node_id: &str, transaction: Transaction) -> Result<()> {
    use std::io::Write;
    use std::net::TcpStream;

    let message = strand_network::Message::Tx {
        addr_from: format!("localhost:{node_id}"),
        transaction: Box::new(transaction),
    };
    let frame = message.encode()?;

    let mut stream = TcpStream::connect(strand_network::state::SEED_NODE)
        .context("failed to reach the seed node; is it running?")?;
    stream.write_all(&frame)?;
    Ok(())
}

fn print_chain() -> Result<()> {
    let node_id = node_id()?;
    let store = open_store(&node_id)?;
    let chain = Chain::continue_chain(store)?;

    for block in chain.iterator() {
        let block = block?;
        println!("height:     {}", block.height);
        println!("hash:       {}", block.hash);
        println!("prev hash:  {}", block.prev_hash);
        println!("merkle:     {}", block.merkle_root);
        println!("pow valid:  {}", block.validate_pow());
        for tx in &block.transactions {
            println!(
                "  tx {} ({} in, {} out)",
                tx.id,
                tx.inputs.len(),
                tx.outputs.len()
            );
        }
        println!();
    }
    Ok(())
}

fn reindex_utxo() -> Result<()> {
    let node_id = node_id()?;
    let store = open_store(&node_id)?;
    let chain = Chain::continue_chain(store.clone())?;
    let utxo = UtxoIndex::new(store);
    utxo.reindex(&chain)?;
    println!("{} transactions hold unspent outputs", utxo.count_transactions()?);
    Ok(())
}

async fn start_node(miner: Option<String>) -> Result<()> {
    let node_id = node_id()?;
    let mining_address = miner.as_deref().map(parse_address).transpose()?;

    if let Some(address) = &mining_address {
        info!(%address, "mining enabled");
    }

    let store = open_store(&node_id)?;
    let chain = Chain::continue_chain(store.clone())
        .context("no chain found; run createblockchain first")?;
    let utxo = UtxoIndex::new(store);
    utxo.reindex(&chain)?;

    let node_address = format!("localhost:{node_id}");
    let state = Arc::new(NodeState::new(node_address, mining_address, chain, utxo));
    let server = Arc::new(NetworkServer::new(state));

    server.run().await?;
    Ok(())
}
