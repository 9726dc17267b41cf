//! Thread-safe handle to the ledger state.
//!
//! Every operation takes the single ledger mutex for its whole duration, so
//! clone-validate-append-commit in [`State::add_block`] never interleaves with
//! another mutation, and log reads never interleave with an append.
//!
//! Calls block the caller for the duration of the file write and `fsync`,
//! including when made from async handlers and the sync loop.

use crate::core::block::Block;
use crate::core::genesis::Genesis;
use crate::core::state::{Balances, State, StateError};
use crate::core::transaction::{Account, Transaction};
use crate::storage::block_store::BlockStore;
use crate::storage::fs;
use crate::types::hash::Hash;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Ledger shared between the request path and the sync loop.
pub struct Ledger {
    inner: Mutex<State>,
}

impl Ledger {
    pub fn new(state: State) -> Self {
        Self {
            inner: Mutex::new(state),
        }
    }

    /// Opens the ledger stored under `data_dir`, creating a default genesis
    /// and empty log on first use, and replays the log.
    pub fn open(data_dir: &Path) -> Result<Self, StateError> {
        fs::init_data_dir(data_dir)?;
        let genesis = Genesis::load(&fs::genesis_path(data_dir))?;
        let store = BlockStore::open(fs::block_db_path(data_dir))?;
        Ok(Self::new(State::new(genesis.balances, store)?))
    }

    // State only changes after a successful append, so a panic while the
    // lock is held cannot leave a half-applied block behind.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_transaction(&self, tx: Transaction) -> Result<(), StateError> {
        self.lock().add_transaction(tx)
    }

    pub fn add_block(&self, block: Block) -> Result<Hash, StateError> {
        self.lock().add_block(block)
    }

    /// Applies `blocks` in order under one lock acquisition.
    pub fn add_blocks(&self, blocks: Vec<Block>) -> Result<(), StateError> {
        self.lock().add_blocks(blocks)
    }

    pub fn seal_pending(&self, time: u64) -> Result<Hash, StateError> {
        self.lock().seal_pending(time)
    }

    /// Queues `tx` and immediately seals the mempool into the next block.
    /// A failed submission leaves nothing queued.
    pub fn submit_transaction(&self, tx: Transaction, time: u64) -> Result<Hash, StateError> {
        self.lock().submit_transaction(tx, time)
    }

    pub fn latest_block_hash(&self) -> Hash {
        self.lock().latest_block_hash()
    }

    pub fn latest_block(&self) -> Block {
        self.lock().latest_block().clone()
    }

    /// Latest hash and block number read under the same lock.
    pub fn head(&self) -> (Hash, u64) {
        let state = self.lock();
        (state.latest_block_hash(), state.latest_block().header.number)
    }

    pub fn has_genesis_block(&self) -> bool {
        self.lock().has_genesis_block()
    }

    pub fn next_block_number(&self) -> u64 {
        self.lock().next_block_number()
    }

    /// Copy of the balance table together with the hash it corresponds to.
    pub fn balances(&self) -> (Hash, Balances) {
        let state = self.lock();
        (state.latest_block_hash(), state.balances().clone())
    }

    pub fn balance_of(&self, account: &Account) -> u64 {
        self.lock().balance_of(account)
    }

    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.lock().pending_transactions().to_vec()
    }

    pub fn blocks_after(&self, hash: Hash) -> Result<Vec<Block>, StateError> {
        self.lock().blocks_after(hash)
    }
}
