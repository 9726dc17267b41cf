//! Ledger state machine: balances, mempool and chain head.
//!
//! [`State`] turns an ordered sequence of blocks into account balances. Every
//! block is validated against a scratch copy of the balance table and only
//! committed (durable append first, then the in-memory swap) when every
//! transaction applies. A rejected block leaves balances, head and log
//! untouched.
//!
//! `State` is single-threaded; [`crate::core::ledger::Ledger`] wraps it in a
//! mutex for sharing between the request path and the sync loop.

use crate::core::block::{Block, BlockRecord};
use crate::core::genesis::GenesisError;
use crate::core::transaction::{Account, Transaction};
use crate::info;
use crate::storage::block_store::{BlockStore, StoreError};
use crate::types::hash::Hash;
use std::collections::BTreeMap;

/// Account balance table.
pub type Balances = BTreeMap<Account, u64>;

/// Errors raised while validating or committing transactions and blocks.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("insufficient balance: {account} holds {balance}, transfer needs {value}")]
    InsufficientBalance {
        account: Account,
        balance: u64,
        value: u64,
    },

    #[error("balance overflow crediting {account}")]
    BalanceOverflow { account: Account },

    #[error("invalid block number: expected {expected}, got {actual}")]
    BlockSequence { expected: u64, actual: u64 },

    #[error("block does not extend current head: expected parent {expected}, got {actual}")]
    ChainContinuity { expected: Hash, actual: Hash },

    #[error("no pending transactions to seal into a block")]
    EmptyMempool,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Genesis(#[from] GenesisError),
}

impl StateError {
    /// True when the rejected block is at or below the current head, i.e.
    /// it (or a competitor at the same height) has already been applied.
    pub fn is_already_applied(&self) -> bool {
        matches!(self, StateError::BlockSequence { expected, actual } if actual < expected)
    }
}

/// Applies one transaction to a balance table.
///
/// Rewards credit `to` only. Transfers debit `from` then credit `to` and fail
/// without touching the table when `from` holds less than `value`.
pub fn apply_tx(balances: &mut Balances, tx: &Transaction) -> Result<(), StateError> {
    if tx.is_reward() {
        return credit(balances, &tx.to, tx.value);
    }

    let balance = balances.get(&tx.from).copied().unwrap_or(0);
    if balance < tx.value {
        return Err(StateError::InsufficientBalance {
            account: tx.from.clone(),
            balance,
            value: tx.value,
        });
    }

    balances.insert(tx.from.clone(), balance - tx.value);
    credit(balances, &tx.to, tx.value)
}

fn credit(balances: &mut Balances, account: &Account, value: u64) -> Result<(), StateError> {
    let entry = balances.entry(account.clone()).or_insert(0);
    *entry = entry
        .checked_add(value)
        .ok_or_else(|| StateError::BalanceOverflow {
            account: account.clone(),
        })?;
    Ok(())
}

/// In-memory view of the chain plus the durable log it is rebuilt from.
pub struct State {
    balances: Balances,
    pending: Vec<Transaction>,
    store: BlockStore,
    latest_block: Block,
    latest_block_hash: Hash,
    has_genesis_block: bool,
}

impl State {
    /// Seeds balances from genesis, then replays the block log.
    pub fn new(genesis_balances: Balances, store: BlockStore) -> Result<Self, StateError> {
        let mut state = Self {
            balances: genesis_balances,
            pending: Vec::new(),
            store,
            latest_block: Block::new(Hash::zero(), 0, 0, Vec::new()),
            latest_block_hash: Hash::zero(),
            has_genesis_block: false,
        };
        state.replay()?;
        Ok(state)
    }

    /// Rebuilds balances and head from the log.
    ///
    /// Records are trusted to be structurally valid (they were validated
    /// before being written), so only the transaction rule is re-run. A
    /// record whose hash does not match its block, or whose transactions no
    /// longer apply, is reported as corruption.
    fn replay(&mut self) -> Result<(), StateError> {
        let mut records = self.store.records()?;
        let mut replayed = 0usize;

        while let Some(record) = records.next() {
            let record = record?;
            let corrupt = |reason: String| StoreError::CorruptLog {
                line: records.line(),
                reason,
            };

            let computed = record.value.hash();
            if computed != record.key {
                return Err(corrupt(format!(
                    "stored hash {} does not match block hash {computed}",
                    record.key
                ))
                .into());
            }

            for tx in &record.value.transactions {
                apply_tx(&mut self.balances, tx).map_err(|e| corrupt(e.to_string()))?;
            }

            self.latest_block = record.value;
            self.latest_block_hash = record.key;
            self.has_genesis_block = true;
            replayed += 1;
        }

        if replayed > 0 {
            info!(
                "replayed block log: blocks={replayed} head={} number={}",
                self.latest_block_hash, self.latest_block.header.number
            );
        }
        Ok(())
    }

    pub fn balances(&self) -> &Balances {
        &self.balances
    }

    pub fn balance_of(&self, account: &Account) -> u64 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn latest_block(&self) -> &Block {
        &self.latest_block
    }

    pub fn latest_block_hash(&self) -> Hash {
        self.latest_block_hash
    }

    pub fn has_genesis_block(&self) -> bool {
        self.has_genesis_block
    }

    /// Number the next block must carry: 0 before the first block.
    pub fn next_block_number(&self) -> u64 {
        if self.has_genesis_block {
            self.latest_block.header.number + 1
        } else {
            0
        }
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    pub fn blocks_after(&self, hash: Hash) -> Result<Vec<Block>, StateError> {
        Ok(self.store.blocks_after(hash)?)
    }

    /// Validates `tx` against committed balances and queues it.
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<(), StateError> {
        if !tx.is_reward() {
            let balance = self.balance_of(&tx.from);
            if balance < tx.value {
                return Err(StateError::InsufficientBalance {
                    account: tx.from,
                    balance,
                    value: tx.value,
                });
            }
        }
        self.pending.push(tx);
        Ok(())
    }

    /// Validates and commits one block, returning its hash.
    ///
    /// Once any block is committed the parent must equal the current head,
    /// including for block 1.
    pub fn add_block(&mut self, block: Block) -> Result<Hash, StateError> {
        let mut scratch = self.balances.clone();

        let expected = self.next_block_number();
        if block.header.number != expected {
            return Err(StateError::BlockSequence {
                expected,
                actual: block.header.number,
            });
        }

        if self.has_genesis_block && block.header.parent != self.latest_block_hash {
            return Err(StateError::ChainContinuity {
                expected: self.latest_block_hash,
                actual: block.header.parent,
            });
        }

        for tx in &block.transactions {
            apply_tx(&mut scratch, tx)?;
        }

        let record = BlockRecord::new(block);
        self.store.append(&record)?;

        info!(
            "adding a new block to the chain: number={} hash={} transactions={}",
            record.value.header.number,
            record.key,
            record.value.transactions.len()
        );

        self.balances = scratch;
        self.latest_block = record.value;
        self.latest_block_hash = record.key;
        self.has_genesis_block = true;
        self.pending.clear();

        Ok(record.key)
    }

    /// Applies blocks in order, stopping at the first failure.
    ///
    /// Blocks committed before the failure stay committed.
    pub fn add_blocks(
        &mut self,
        blocks: impl IntoIterator<Item = Block>,
    ) -> Result<(), StateError> {
        for block in blocks {
            self.add_block(block)?;
        }
        Ok(())
    }

    /// Seals every pending transaction into the next block.
    pub fn seal_pending(&mut self, time: u64) -> Result<Hash, StateError> {
        if self.pending.is_empty() {
            return Err(StateError::EmptyMempool);
        }
        let block = Block::new(
            self.latest_block_hash,
            self.next_block_number(),
            time,
            self.pending.clone(),
        );
        self.add_block(block)
    }

    /// Queues `tx` and seals the mempool into the next block.
    ///
    /// On failure the mempool is restored to what it held before the call.
    pub fn submit_transaction(&mut self, tx: Transaction, time: u64) -> Result<Hash, StateError> {
        let queued = self.pending.len();
        self.add_transaction(tx)?;
        match self.seal_pending(time) {
            Ok(hash) => Ok(hash),
            Err(e) => {
                self.pending.truncate(queued);
                Err(e)
            }
        }
    }
}
