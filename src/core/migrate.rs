//! Demonstration chain used to seed a fresh node.

use crate::core::block::Block;
use crate::core::ledger::Ledger;
use crate::core::state::StateError;
use crate::core::transaction::Transaction;
use crate::types::hash::Hash;

/// Appends three demonstration blocks on top of the current head and returns
/// their hashes in order.
///
/// Expects the default genesis (`owner` holding 1,000,000); any other
/// starting point may fail with `InsufficientBalance` partway through, in
/// which case the blocks committed so far stay committed.
pub fn seed_demo_chain(ledger: &Ledger, time: u64) -> Result<Vec<Hash>, StateError> {
    let payloads = vec![
        vec![
            Transaction::new("owner", "owner", 3, ""),
            Transaction::reward("owner", 700),
        ],
        vec![
            Transaction::new("owner", "harsh", 2000, ""),
            Transaction::reward("owner", 100),
            Transaction::new("harsh", "owner", 1, ""),
            Transaction::new("harsh", "ishan", 1000, ""),
            Transaction::new("harsh", "owner", 50, ""),
            Transaction::reward("owner", 600),
        ],
        vec![Transaction::reward("owner", 24700)],
    ];

    let mut hashes = Vec::with_capacity(payloads.len());
    for transactions in payloads {
        let (parent, _) = ledger.head();
        let block = Block::new(parent, ledger.next_block_number(), time, transactions);
        hashes.push(ledger.add_block(block)?);
    }
    Ok(hashes)
}
