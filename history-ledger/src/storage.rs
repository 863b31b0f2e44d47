//! Checkpoint storage for the history ledger
//!
//! The checkpoint is a single bincode file holding the full ordered record
//! sequence. Writes rotate the previous checkpoint to `<name>.bak` first, so a
//! crash mid-write leaves the prior state recoverable under the backup name.
//! The backup is never read back automatically.
//!
//! # Format
//!
//! bincode `Vec<PaymentRecord>`: each record is a chrono `DateTime<Utc>` and a
//! `rust_decimal::Decimal`, not a pair of float seconds and float amount.
//! Histories written as pickled `(float, float)` tuples by older faucets are
//! not readable here; loading one fails and the ledger restarts from the
//! sentinel.

use crate::{
    error::{Error, Result},
    types::PaymentRecord,
};
use bincode::Options;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Suffix appended to the checkpoint path for the rotated backup
pub const BACKUP_SUFFIX: &str = ".bak";

/// On-disk checkpoint of the history ledger
#[derive(Debug, Clone)]
pub struct CheckpointStorage {
    path: PathBuf,
}

impl CheckpointStorage {
    /// Create storage rooted at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Primary checkpoint path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Backup path (`<name>.bak`)
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(BACKUP_SUFFIX);
        PathBuf::from(name)
    }

    /// Load the checkpoint, `None` if no checkpoint exists yet
    pub fn load(&self) -> Result<Option<Vec<PaymentRecord>>> {
        if !self.path.is_file() {
            return Ok(None);
        }

        let file = File::open(&self.path)?;
        let limit = file.metadata()?.len();

        // length prefixes in a foreign file must not drive allocation past its size
        let records: Vec<PaymentRecord> = bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .allow_trailing_bytes()
            .with_limit(limit)
            .deserialize_from(BufReader::new(file))?;

        match records.first() {
            None => return Err(Error::Corrupt("checkpoint holds no records".to_string())),
            Some(sentinel) if !sentinel.amount.is_zero() => {
                return Err(Error::Corrupt(format!(
                    "first record is not a sentinel: {}",
                    sentinel
                )));
            }
            Some(_) => {}
        }

        tracing::debug!(
            path = %self.path.display(),
            records = records.len(),
            "Checkpoint loaded"
        );

        Ok(Some(records))
    }

    /// Write the full ledger, rotating any existing checkpoint to `.bak` first
    pub fn write(&self, records: &[PaymentRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        if self.path.is_file() {
            fs::rename(&self.path, self.backup_path())?;
        }

        let file = File::create(&self.path)?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, records)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;

        tracing::debug!(
            path = %self.path.display(),
            records = records.len(),
            "Checkpoint written"
        );

        Ok(())
    }
}
