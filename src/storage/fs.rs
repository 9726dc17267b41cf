//! Data directory layout.
//!
//! ```text
//! <datadir>/database/genesis.json
//! <datadir>/database/block.db
//! ```

use crate::core::genesis::{Genesis, GenesisError};
use std::fs;
use std::path::{Path, PathBuf};

pub fn database_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("database")
}

pub fn genesis_path(data_dir: &Path) -> PathBuf {
    database_dir(data_dir).join("genesis.json")
}

pub fn block_db_path(data_dir: &Path) -> PathBuf {
    database_dir(data_dir).join("block.db")
}

/// Creates the database directory with a default genesis file and an empty
/// block log, unless a genesis file already exists.
pub fn init_data_dir(data_dir: &Path) -> Result<(), GenesisError> {
    if genesis_path(data_dir).exists() {
        return Ok(());
    }

    fs::create_dir_all(database_dir(data_dir))?;
    Genesis::default().write(&genesis_path(data_dir))?;

    let db = block_db_path(data_dir);
    if !db.exists() {
        fs::write(db, b"")?;
    }
    Ok(())
}

/// Expands a leading `~` to the user's home directory.
pub fn expand_path(path: &str) -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    match (path.strip_prefix('~'), home) {
        (Some(rest), Some(home)) if rest.is_empty() => home,
        (Some(rest), Some(home)) if rest.starts_with('/') => home.join(&rest[1..]),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::Account;

    #[test]
    fn init_creates_layout() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        init_data_dir(dir.path()).unwrap();

        assert!(genesis_path(dir.path()).is_file());
        assert!(block_db_path(dir.path()).is_file());
        assert_eq!(fs::read(block_db_path(dir.path())).unwrap().len(), 0);
    }

    #[test]
    fn init_keeps_existing_genesis() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        init_data_dir(dir.path()).unwrap();

        let mut custom = Genesis::default();
        custom.balances.insert(Account::from("ishan"), 9);
        custom.write(&genesis_path(dir.path())).unwrap();

        init_data_dir(dir.path()).unwrap();
        assert_eq!(Genesis::load(&genesis_path(dir.path())).unwrap(), custom);
    }

    #[test]
    fn expand_path_leaves_plain_paths_alone() {
        assert_eq!(expand_path("/tmp/node"), PathBuf::from("/tmp/node"));
        assert_eq!(expand_path("relative/dir"), PathBuf::from("relative/dir"));
        assert_eq!(expand_path("~other"), PathBuf::from("~other"));
    }

    #[test]
    fn expand_path_replaces_tilde() {
        if let Some(home) = std::env::var_os("HOME") {
            assert_eq!(expand_path("~/.tbb"), PathBuf::from(home).join(".tbb"));
        }
    }
}
