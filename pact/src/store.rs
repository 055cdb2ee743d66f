//! File-backed contract store.
//!
//! Writes go to a temporary file in the target directory which is then
//! renamed over the destination, so readers never observe a partial document.

use crate::contract::{Contract, Interaction, Participant};
use crate::error::{PactError, PactResult};
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Serializes read-merge-write cycles within the process.
static WRITE_LOCK: Mutex<()> = Mutex::new(());

/// Contract store rooted at one directory.
#[derive(Debug, Clone)]
pub struct ContractStore {
    dir: PathBuf,
}

impl ContractStore {
    /// Create a store writing into `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory the store writes into.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path the given contract is stored at.
    #[must_use]
    pub fn path_for(&self, contract: &Contract) -> PathBuf {
        self.dir.join(contract.file_name())
    }

    /// Atomically write a contract, replacing any existing file for the pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the contract is invalid or the file cannot be written.
    pub fn save(&self, contract: &Contract) -> PactResult<PathBuf> {
        contract.validate()?;
        fs::create_dir_all(&self.dir)?;

        let path = self.path_for(contract);
        let tmp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer_pretty(&mut writer, contract)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| PactError::Io(e.error))?;

        info!(
            path = %path.display(),
            interactions = contract.interactions.len(),
            "Contract written"
        );
        Ok(path)
    }

    /// Read and parse a contract file.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::ContractNotFound`] when the file is absent and
    /// [`PactError::MalformedContract`] when it cannot be parsed.
    pub fn load(path: &Path) -> PactResult<Contract> {
        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(PactError::ContractNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(PactError::Io(e)),
        };
        let contract = Self::parse(&raw, &path.display().to_string())?;
        debug!(path = %path.display(), interactions = contract.interactions.len(), "Contract loaded");
        Ok(contract)
    }

    /// Parse a contract document from bytes; `origin` names the source in errors.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::MalformedContract`] for invalid documents.
    pub fn parse(raw: &[u8], origin: &str) -> PactResult<Contract> {
        let contract: Contract =
            serde_json::from_slice(raw).map_err(|e| PactError::malformed(origin, e.to_string()))?;
        contract
            .validate()
            .map_err(|e| PactError::malformed(origin, e.to_string()))?;
        Ok(contract)
    }

    /// Merge interactions into the stored contract for the pair and save it.
    ///
    /// Interactions replace stored ones with the same description; the rest
    /// are appended in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the existing file is malformed or the write fails.
    pub fn merge_and_save(
        &self,
        consumer: &str,
        provider: &str,
        interactions: Vec<Interaction>,
    ) -> PactResult<PathBuf> {
        Participant::check_name("consumer", consumer)?;
        Participant::check_name("provider", provider)?;
        let _guard = WRITE_LOCK.lock().unwrap_or_else(PoisonError::into_inner);

        let path = self.dir.join(Contract::file_name_for(consumer, provider));
        let mut contract = match Self::load(&path) {
            Ok(existing) => existing,
            Err(PactError::ContractNotFound(_)) => Contract::new(consumer, provider),
            Err(e) => return Err(e),
        };
        for interaction in interactions {
            contract.upsert(interaction);
        }
        self.save(&contract)
    }
}
