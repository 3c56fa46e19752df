//! The bank's banknote table: face-value notes and their circulation status.
//!
//! This table is independent of the token cryptography. A banknote is a face value from a fixed
//! set of permitted denominations, identified by a sequential id and a random UUID, and moved
//! between circulation states by the bank.

use crate::{Error, Rng};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};
use tracing::{debug, info};

/// Face values a banknote may carry unless configured otherwise.
pub const DEFAULT_DENOMINATIONS: [u64; 5] = [100, 200, 500, 1000, 5000];

/// Circulation status of a banknote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteStatus {
    /// Created but not yet issued. The status of every new banknote.
    NotInCirculation,
    /// Issued.
    InCirculation,
    /// Permanently retired.
    Withdrawn,
}

impl Default for NoteStatus {
    fn default() -> Self {
        NoteStatus::NotInCirculation
    }
}

/// A random version-4 UUID identifying a banknote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NoteUuid([u8; 16]);

impl NoteUuid {
    /// Draw a fresh UUID.
    pub fn new(rng: &mut impl Rng) -> Self {
        let mut bytes = [0; 16];
        rng.fill_bytes(&mut bytes);
        bytes[6] = (bytes[6] & 0x0f) | 0x40;
        bytes[8] = (bytes[8] & 0x3f) | 0x80;
        Self(bytes)
    }
}

impl fmt::Display for NoteUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = hex::encode(self.0);
        write!(
            f,
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        )
    }
}

/// A banknote record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Banknote {
    /// Sequential identifier, starting from 1.
    pub id: u64,
    /// Random identifier.
    pub uuid: NoteUuid,
    /// Face value.
    pub denomination: u64,
    /// Circulation status.
    pub status: NoteStatus,
}

/// An in-memory banknote table.
#[derive(Debug)]
pub struct NoteRegistry {
    denominations: Vec<u64>,
    notes: BTreeMap<u64, Banknote>,
    next_id: u64,
}

impl Default for NoteRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_DENOMINATIONS.to_vec())
    }
}

impl NoteRegistry {
    /// An empty table accepting the given face values.
    pub fn new(denominations: Vec<u64>) -> Self {
        Self {
            denominations,
            notes: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// The permitted face values.
    pub fn denominations(&self) -> &[u64] {
        &self.denominations
    }

    /// Create a banknote of `denomination`, not yet in circulation.
    pub fn create(&mut self, rng: &mut impl Rng, denomination: u64) -> Result<&Banknote, Error> {
        if !self.denominations.contains(&denomination) {
            return Err(Error::InvalidDenomination(denomination));
        }
        let id = self.next_id;
        self.next_id += 1;
        let note = Banknote {
            id,
            uuid: NoteUuid::new(rng),
            denomination,
            status: NoteStatus::default(),
        };
        info!(id, uuid = %note.uuid, denomination, "created banknote");
        Ok(self.notes.entry(id).or_insert(note))
    }

    /// Look up a banknote by id.
    pub fn get(&self, id: u64) -> Result<&Banknote, Error> {
        self.notes.get(&id).ok_or(Error::UnknownNote(id))
    }

    /// Look up a banknote by UUID.
    pub fn get_by_uuid(&self, uuid: &NoteUuid) -> Option<&Banknote> {
        self.notes.values().find(|note| &note.uuid == uuid)
    }

    /// Move a banknote to `status`.
    pub fn update_status(&mut self, id: u64, status: NoteStatus) -> Result<&Banknote, Error> {
        let note = self.notes.get_mut(&id).ok_or(Error::UnknownNote(id))?;
        debug!(id, from = ?note.status, to = ?status, "updated banknote status");
        note.status = status;
        Ok(note)
    }

    /// Every banknote in `status`, by id.
    pub fn by_status(&self, status: NoteStatus) -> Vec<&Banknote> {
        self.notes
            .values()
            .filter(|note| note.status == status)
            .collect()
    }

    /// Every banknote, by id.
    pub fn all(&self) -> Vec<&Banknote> {
        self.notes.values().collect()
    }
}
