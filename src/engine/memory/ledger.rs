//! Verified key/value ledger
//!
//! Append-only hash chain backing `verified_set` / `verified_get`. Each entry
//! hashes a canonical string of its transaction id, key, value and the hash
//! of the entry before it, so rewriting any stored value breaks the chain.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::engine::{Attestation, EngineError, VerifiedValue};

pub const GENESIS_HASH: &str =
    "sha256:0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub tx_id: u64,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub previous_hash: String,
    pub this_hash: String,
}

impl LedgerEntry {
    fn new(tx_id: u64, key: Vec<u8>, value: Vec<u8>, previous_hash: String) -> Self {
        let mut entry = Self {
            tx_id,
            key,
            value,
            previous_hash,
            this_hash: String::new(),
        };
        entry.this_hash = entry.calculate_hash();
        entry
    }

    pub fn canonical_string(&self) -> String {
        format!(
            "tx_id:{}|key:{}|value:{}|previous_hash:{}",
            self.tx_id,
            hex::encode(&self.key),
            hex::encode(&self.value),
            self.previous_hash
        )
    }

    pub fn calculate_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_string().as_bytes());
        format!("sha256:{}", hex::encode(hasher.finalize()))
    }

    pub fn verify_hash(&self) -> bool {
        self.this_hash == self.calculate_hash()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
    next_tx: u64,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_tx: 1,
        }
    }
}

impl Ledger {
    pub fn head_hash(&self) -> &str {
        self.entries
            .last()
            .map(|e| e.this_hash.as_str())
            .unwrap_or(GENESIS_HASH)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append all pairs as one transaction.
    pub fn append<I>(&mut self, pairs: I) -> Result<Attestation, EngineError>
    where
        I: IntoIterator<Item = (Vec<u8>, Vec<u8>)>,
    {
        let tx_id = self.next_tx;
        let before = self.entries.len();
        for (key, value) in pairs {
            let previous = self.head_hash().to_string();
            self.entries.push(LedgerEntry::new(tx_id, key, value, previous));
        }
        if self.entries.len() == before {
            return Err(EngineError::ConstraintViolation(
                "verified transaction without entries".to_string(),
            ));
        }
        self.next_tx += 1;
        Ok(Attestation {
            tx_id,
            state_root: self.head_hash().to_string(),
        })
    }

    /// Latest value for `key`, verified against the chain up to its entry.
    pub fn get(&self, key: &[u8]) -> Result<VerifiedValue, EngineError> {
        let position = self
            .entries
            .iter()
            .rposition(|e| e.key == key)
            .ok_or_else(|| EngineError::KeyNotFound(String::from_utf8_lossy(key).into_owned()))?;
        let entry = &self.entries[position];
        Ok(VerifiedValue {
            key: entry.key.clone(),
            value: entry.value.clone(),
            tx_id: entry.tx_id,
            verified: self.verify_chain(position),
        })
    }

    /// Check every entry's own hash and its link to the previous entry.
    pub fn verify_chain(&self, up_to: usize) -> bool {
        let mut previous = GENESIS_HASH;
        for entry in self.entries.iter().take(up_to + 1) {
            if entry.previous_hash != previous || !entry.verify_hash() {
                return false;
            }
            previous = entry.this_hash.as_str();
        }
        true
    }

    /// Overwrite the latest stored value for `key` without re-hashing.
    pub fn tamper(&mut self, key: &[u8], value: Vec<u8>) -> bool {
        match self.entries.iter_mut().rev().find(|e| e.key == key) {
            Some(entry) => {
                entry.value = value;
                true
            }
            None => false,
        }
    }
}
