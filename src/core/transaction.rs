//! Accounts and value-transfer transactions.

use crate::types::encoding::{Encode, EncodeSink};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker carried in [`Transaction::data`] that turns a transfer into a mint.
pub const REWARD_DATA: &str = "reward";

/// Opaque account identifier.
///
/// There is no account registry: an account exists once it appears in the
/// genesis balances or in a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Account(String);

impl Account {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Account {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Account {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Encode for Account {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        self.0.encode(out);
    }
}

/// An unsigned transfer of `value` from `from` to `to`.
///
/// Reward transactions (`data == "reward"`) mint into `to` and never debit
/// `from`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub from: Account,
    pub to: Account,
    pub value: u64,
    pub data: String,
}

impl Transaction {
    pub fn new(
        from: impl Into<Account>,
        to: impl Into<Account>,
        value: u64,
        data: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            value,
            data: data.into(),
        }
    }

    /// Builds a reward transaction minting `value` into `to`.
    pub fn reward(to: impl Into<Account>, value: u64) -> Self {
        let to = to.into();
        Self {
            from: to.clone(),
            to,
            value,
            data: REWARD_DATA.to_string(),
        }
    }

    /// Returns true if this transaction mints instead of transferring.
    pub fn is_reward(&self) -> bool {
        self.data == REWARD_DATA
    }
}

impl Encode for Transaction {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        self.from.encode(out);
        self.to.encode(out);
        self.value.encode(out);
        self.data.encode(out);
    }
}
