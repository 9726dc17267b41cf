//! Append-only block log.
//!
//! One JSON [`BlockRecord`] per line, in commit order. The log is the
//! canonical chain; the in-memory ledger is a cache rebuilt from it by replay.
//!
//! Each append serializes the whole record into a single buffer and issues
//! one write followed by a flush and `fdatasync`, so a reader never observes
//! a half-written record from a completed append. A failed append truncates
//! the file back to its previous length.

use crate::core::block::{Block, BlockRecord};
use crate::types::hash::Hash;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Lines, Write};
use std::path::{Path, PathBuf};

/// Errors raised by the block log.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("block log io: {0}")]
    Io(#[from] io::Error),

    /// A line of the log could not be trusted. Fatal at startup.
    #[error("corrupt block log at line {line}: {reason}")]
    CorruptLog { line: usize, reason: String },

    #[error("failed to encode block record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Handle to the on-disk block log.
///
/// Single writer: the handle is owned by the ledger state and every append
/// goes through `&mut self`.
pub struct BlockStore {
    path: PathBuf,
    file: File,
}

impl BlockStore {
    /// Opens (creating if needed) the log at `path` for appending.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record as a single line.
    pub fn append(&mut self, record: &BlockRecord) -> Result<(), StoreError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let previous_len = self.file.metadata()?.len();
        let result = self
            .file
            .write_all(&line)
            .and_then(|_| self.file.flush())
            .and_then(|_| self.file.sync_data());

        if let Err(e) = result {
            // Best effort: drop the partial line so the log stays replayable.
            let _ = self.file.set_len(previous_len);
            return Err(e.into());
        }
        Ok(())
    }

    /// Iterates over every record in file order.
    ///
    /// Opens a separate read handle; callers serialize this against appends.
    pub fn records(&self) -> Result<RecordIter, StoreError> {
        let reader = BufReader::new(File::open(&self.path)?);
        Ok(RecordIter {
            lines: reader.lines(),
            line: 0,
        })
    }

    /// Returns every block committed after the block with hash `hash`.
    ///
    /// - `hash` is the empty sentinel: every block, in commit order.
    /// - `hash` found: the blocks after it (empty if it is the tip).
    /// - `hash` absent: empty. Indistinguishable from "found at tip";
    ///   use [`BlockStore::contains`] to tell the two apart.
    pub fn blocks_after(&self, hash: Hash) -> Result<Vec<Block>, StoreError> {
        let mut collecting = hash.is_empty();
        let mut blocks = Vec::new();

        for record in self.records()? {
            let record = record?;
            if collecting {
                blocks.push(record.value);
            } else if record.key == hash {
                collecting = true;
            }
        }
        Ok(blocks)
    }

    /// Returns true if a record with this hash is in the log.
    pub fn contains(&self, hash: Hash) -> Result<bool, StoreError> {
        for record in self.records()? {
            if record?.key == hash {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Number of records in the log.
    pub fn len(&self) -> Result<usize, StoreError> {
        let mut n = 0;
        for record in self.records()? {
            record?;
            n += 1;
        }
        Ok(n)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

/// Iterator over the records of a block log, yielding `CorruptLog` for any
/// line that is not a well-formed record. Blank lines are skipped.
pub struct RecordIter {
    lines: Lines<BufReader<File>>,
    line: usize,
}

impl RecordIter {
    /// 1-based line number of the most recently yielded record.
    pub fn line(&self) -> usize {
        self.line
    }
}

impl Iterator for RecordIter {
    type Item = Result<BlockRecord, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let raw = self.lines.next()?;
            self.line += 1;

            let raw = match raw {
                Ok(raw) => raw,
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    return Some(Err(StoreError::CorruptLog {
                        line: self.line,
                        reason: e.to_string(),
                    }));
                }
                Err(e) => return Some(Err(e.into())),
            };

            if raw.trim().is_empty() {
                continue;
            }

            return Some(serde_json::from_str::<BlockRecord>(&raw).map_err(|e| {
                StoreError::CorruptLog {
                    line: self.line,
                    reason: e.to_string(),
                }
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::Transaction;
    use std::fs;

    fn temp_store() -> (tempfile::TempDir, BlockStore) {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let store = BlockStore::open(dir.path().join("block.db")).expect("open store");
        (dir, store)
    }

    fn chain(n: u64) -> Vec<BlockRecord> {
        let mut parent = Hash::zero();
        let mut out = Vec::new();
        for number in 0..n {
            let block = Block::new(
                parent,
                number,
                number,
                vec![Transaction::reward("owner", number + 1)],
            );
            let record = BlockRecord::new(block);
            parent = record.key;
            out.push(record);
        }
        out
    }

    #[test]
    fn new_store_is_empty() {
        let (_dir, store) = temp_store();
        assert!(store.is_empty().unwrap());
        assert!(store.blocks_after(Hash::zero()).unwrap().is_empty());
    }

    #[test]
    fn append_writes_one_line_per_record() {
        let (_dir, mut store) = temp_store();
        for record in chain(3) {
            store.append(&record).unwrap();
        }

        let raw = fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw.lines().count(), 3);
        assert!(raw.ends_with('\n'));
        assert_eq!(store.len().unwrap(), 3);
    }

    #[test]
    fn records_come_back_in_commit_order() {
        let (_dir, mut store) = temp_store();
        let records = chain(4);
        for record in &records {
            store.append(record).unwrap();
        }

        let read: Vec<BlockRecord> = store.records().unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(read, records);
    }

    #[test]
    fn blocks_after_empty_hash_returns_everything() {
        let (_dir, mut store) = temp_store();
        let records = chain(3);
        for record in &records {
            store.append(record).unwrap();
        }

        let blocks = store.blocks_after(Hash::zero()).unwrap();
        let expected: Vec<Block> = records.into_iter().map(|r| r.value).collect();
        assert_eq!(blocks, expected);
    }

    #[test]
    fn blocks_after_middle_hash_returns_suffix() {
        let (_dir, mut store) = temp_store();
        let records = chain(4);
        for record in &records {
            store.append(record).unwrap();
        }

        let blocks = store.blocks_after(records[1].key).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].header.number, 2);
        assert_eq!(blocks[1].header.number, 3);
    }

    #[test]
    fn blocks_after_tip_is_empty() {
        let (_dir, mut store) = temp_store();
        let records = chain(2);
        for record in &records {
            store.append(record).unwrap();
        }

        assert!(store.blocks_after(records[1].key).unwrap().is_empty());
    }

    #[test]
    fn blocks_after_unknown_hash_is_empty() {
        let (_dir, mut store) = temp_store();
        for record in chain(2) {
            store.append(&record).unwrap();
        }

        let unknown = Block::new(Hash::zero(), 99, 0, vec![]).hash();
        assert!(store.blocks_after(unknown).unwrap().is_empty());
        assert!(!store.contains(unknown).unwrap());
    }

    #[test]
    fn contains_finds_committed_hashes() {
        let (_dir, mut store) = temp_store();
        let records = chain(2);
        for record in &records {
            store.append(record).unwrap();
        }
        assert!(store.contains(records[0].key).unwrap());
        assert!(store.contains(records[1].key).unwrap());
    }

    #[test]
    fn reopen_appends_after_existing_records() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("block.db");
        let records = chain(3);

        {
            let mut store = BlockStore::open(&path).unwrap();
            store.append(&records[0]).unwrap();
        }
        {
            let mut store = BlockStore::open(&path).unwrap();
            store.append(&records[1]).unwrap();
            store.append(&records[2]).unwrap();
        }

        let store = BlockStore::open(&path).unwrap();
        assert_eq!(store.len().unwrap(), 3);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let (_dir, mut store) = temp_store();
        let records = chain(2);
        store.append(&records[0]).unwrap();
        fs::OpenOptions::new()
            .append(true)
            .open(store.path())
            .unwrap()
            .write_all(b"\n   \n")
            .unwrap();
        store.append(&records[1]).unwrap();

        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn malformed_line_is_corrupt_log() {
        let (_dir, mut store) = temp_store();
        let records = chain(1);
        store.append(&records[0]).unwrap();
        fs::OpenOptions::new()
            .append(true)
            .open(store.path())
            .unwrap()
            .write_all(b"{\"hash\": \"zz\"\n")
            .unwrap();

        let results: Vec<_> = store.records().unwrap().collect();
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(StoreError::CorruptLog { line: 2, .. })
        ));
        assert!(matches!(
            store.blocks_after(Hash::zero()),
            Err(StoreError::CorruptLog { .. })
        ));
    }
}
