//! Genesis balances loaded once before the block log is replayed.

use crate::core::transaction::Account;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::{fs, io};

/// Chain identifier written into freshly created genesis files.
pub const DEFAULT_CHAIN_ID: &str = "the-blockchain-bar-ledger";
/// Balance of the single account seeded by the default genesis file.
pub const DEFAULT_OWNER_BALANCE: u64 = 1_000_000;

/// Errors that can occur while reading or writing the genesis file.
#[derive(Debug, thiserror::Error)]
pub enum GenesisError {
    #[error("genesis file io: {0}")]
    Io(#[from] io::Error),

    #[error("malformed genesis file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Contents of `genesis.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genesis {
    pub genesis_time: String,
    pub chain_id: String,
    pub balances: BTreeMap<Account, u64>,
}

impl Default for Genesis {
    fn default() -> Self {
        let mut balances = BTreeMap::new();
        balances.insert(Account::from("owner"), DEFAULT_OWNER_BALANCE);
        Self {
            genesis_time: "2019-03-18T00:00:00.000000000Z".to_string(),
            chain_id: DEFAULT_CHAIN_ID.to_string(),
            balances,
        }
    }
}

impl Genesis {
    pub fn load(path: &Path) -> Result<Self, GenesisError> {
        let raw = fs::read(path)?;
        Ok(serde_json::from_slice(&raw)?)
    }

    pub fn write(&self, path: &Path) -> Result<(), GenesisError> {
        let json = serde_json::to_vec_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
