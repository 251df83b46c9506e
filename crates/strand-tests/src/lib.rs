//! Shared helpers for the Strand ledger's end-to-end and adversarial tests.

pub mod helpers {
    use std::sync::Arc;

    use strand_chain::{Chain, UtxoIndex};
    use strand_core::address::Address;
    use strand_core::keys::KeyPair;
    use strand_store::RocksStore;

    /// A fresh chain + UTXO index over a temp-dir-backed store, with a
    /// freshly generated keypair credited by the genesis coinbase.
    pub fn test_chain() -> (
        Chain<RocksStore>,
        UtxoIndex<RocksStore>,
        tempfile::TempDir,
        KeyPair,
        Address,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        let kp = KeyPair::generate();
        let addr = Address::from_pubkey(&kp.public_key().to_bytes());
        let chain = Chain::init(store.clone(), &addr).unwrap();
        let utxo = UtxoIndex::new(store);
        utxo.reindex(&chain).unwrap();
        (chain, utxo, dir, kp, addr)
    }

    /// Balance of `address` according to `utxo`.
    pub fn balance_of(utxo: &UtxoIndex<RocksStore>, address: &Address) -> u64 {
        utxo.find_unspent_transactions(&address.pubkey_hash())
            .unwrap()
            .iter()
            .map(|out| out.value)
            .sum()
    }
}
