//! S5: a block mined on one node is accepted by a second, independent node
//! once handed the block directly, the way a gossip `Message::Block` arrival
//! would drive it, without spinning up real TCP listeners.

use strand_core::address::Address;
use strand_core::constants::MINING_REWARD;
use strand_core::keys::KeyPair;
use strand_core::transaction::Transaction;
use strand_tests::helpers::{balance_of, test_chain};

/// N1 mines a transfer; N2, starting from its own empty chain over a
/// different genesis, adopts N1's block wholesale and its UTXO index
/// catches up to match.
#[test]
fn s5_second_node_adopts_a_mined_block() {
    let (n1_chain, n1_utxo, _n1_dir, a_kp, a_addr) = test_chain();

    let b_kp = KeyPair::generate();
    let b_addr = Address::from_pubkey(&b_kp.public_key().to_bytes());

    let pubkey = a_kp.public_key().to_bytes();
    let mut tx = n1_utxo.build_transaction(&pubkey, &b_addr, 30).unwrap();
    n1_chain.sign_transaction(&mut tx, &a_kp).unwrap();

    let coinbase = Transaction::coinbase(&a_addr, Vec::new());
    let block = n1_chain.mine_block(&[coinbase, tx]).unwrap();
    n1_utxo.reindex(&n1_chain).unwrap();

    assert_eq!(balance_of(&n1_utxo, &a_addr), MINING_REWARD - 30 + MINING_REWARD);
    assert_eq!(balance_of(&n1_utxo, &b_addr), 30);

    // N2 never saw A's wallet; it only learns of the chain by having N1's
    // genesis and mined block handed to it, as a gossip peer would.
    let (n2_chain, n2_utxo, _n2_dir, _n2_kp, _n2_genesis_addr) = test_chain();
    let n1_genesis_hash = n1_chain.get_block_hashes().unwrap().last().copied().unwrap();
    let n1_genesis = n1_chain.get_block(n1_genesis_hash).unwrap().unwrap();

    // Re-home N2 onto N1's genesis so heights and prev-hash links agree,
    // then hand over the mined block exactly as received over the wire.
    n2_chain.add_block(n1_genesis.clone()).unwrap();
    n2_chain.add_block(block.clone()).unwrap();
    n2_utxo.reindex(&n2_chain).unwrap();

    assert_eq!(n2_chain.get_best_height().unwrap(), n1_chain.get_best_height().unwrap());
    assert_eq!(n2_chain.get_block_hashes().unwrap()[0], block.hash);
    assert_eq!(balance_of(&n2_utxo, &a_addr), balance_of(&n1_utxo, &a_addr));
    assert_eq!(balance_of(&n2_utxo, &b_addr), balance_of(&n1_utxo, &b_addr));
}
