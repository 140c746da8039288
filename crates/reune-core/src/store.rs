//! Persistent storage for all records using redb.
//!
//! # Table design
//!
//! Every record type owns one table keyed by its `u64` id with the record
//! JSON-encoded as the value:
//! ```text
//! users        u64 -> User
//! objectives   u64 -> Objective
//! key_results  u64 -> KeyResult
//! ...
//! ```
//! Ids are allocated from the `sequences` table (`entity name -> last id`)
//! inside the same write transaction as the insert, so they are never
//! reused. `tokens` maps an API token digest to its user id.
//!
//! Multi-record mutations go through [`Store::write`]: the closure's writes
//! are committed together, or the transaction is aborted and nothing changes.

use std::path::Path;

use redb::{Database, ReadTransaction, ReadableTable, TableDefinition, WriteTransaction};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Result, ReuneError};

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

pub type RecordTable = TableDefinition<'static, u64, &'static [u8]>;

pub const USERS: RecordTable = TableDefinition::new("users");
pub const POSITIONS: RecordTable = TableDefinition::new("positions");
pub const TEAMS: RecordTable = TableDefinition::new("teams");
pub const COLLABORATORS: RecordTable = TableDefinition::new("collaborators");
pub const CYCLES: RecordTable = TableDefinition::new("cycles");
pub const COMPETENCIES: RecordTable = TableDefinition::new("competencies");
pub const ASSESSMENTS: RecordTable = TableDefinition::new("assessments");
pub const OBJECTIVES: RecordTable = TableDefinition::new("objectives");
pub const KEY_RESULTS: RecordTable = TableDefinition::new("key_results");
pub const CHECK_INS: RecordTable = TableDefinition::new("check_ins");
pub const MOODS: RecordTable = TableDefinition::new("moods");
pub const FEEDBACK: RecordTable = TableDefinition::new("feedback");

/// Key: entity name. Value: last id handed out.
const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

/// Key: hex SHA-256 of an API token. Value: user id.
const TOKENS: TableDefinition<&str, u64> = TableDefinition::new("tokens");

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// A JSON-encoded row in one of the record tables.
pub trait Record: Serialize + DeserializeOwned {
    const TABLE: RecordTable;
    /// Human-readable name used in not-found errors and as the sequence key.
    const ENTITY: &'static str;

    fn id(&self) -> u64;
    fn set_id(&mut self, id: u64);
}

/// `impl_record!(Type, TABLE, "entity", id_field)`
macro_rules! impl_record {
    ($ty:ty, $table:expr, $entity:literal, $field:ident) => {
        impl $crate::store::Record for $ty {
            const TABLE: $crate::store::RecordTable = $table;
            const ENTITY: &'static str = $entity;

            fn id(&self) -> u64 {
                self.$field
            }

            fn set_id(&mut self, id: u64) {
                self.$field = id;
            }
        }
    };
}
pub(crate) use impl_record;

pub(crate) fn storage(e: impl std::fmt::Display) -> ReuneError {
    ReuneError::Storage(e.to_string())
}

fn fetch<R, T>(table: &T, id: u64) -> Result<Option<R>>
where
    R: Record,
    T: ReadableTable<u64, &'static [u8]>,
{
    match table.get(id).map_err(storage)? {
        Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
        None => Ok(None),
    }
}

fn scan<R, T>(table: &T) -> Result<Vec<R>>
where
    R: Record,
    T: ReadableTable<u64, &'static [u8]>,
{
    let mut result = Vec::new();
    for entry in table.iter().map_err(storage)? {
        let (_, v) = entry.map_err(storage)?;
        result.push(serde_json::from_slice(v.value())?);
    }
    Ok(result)
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Read access shared by snapshots and write transactions, so the same
/// lookup helpers work on both sides of a mutation.
pub trait Reader {
    fn get<R: Record>(&self, id: u64) -> Result<Option<R>>;

    /// All records of a type in ascending id order.
    fn all<R: Record>(&self) -> Result<Vec<R>>;

    fn require<R: Record>(&self, id: u64) -> Result<R> {
        self.get(id)?.ok_or(ReuneError::NotFound {
            entity: R::ENTITY,
            id,
        })
    }

    fn exists<R: Record>(&self, id: u64) -> Result<bool> {
        Ok(self.get::<R>(id)?.is_some())
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct Store {
    db: Database,
}

impl Store {
    /// Open or create the database at `path`, creating every table up front
    /// so read transactions never hit a missing table.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            crate::io::ensure_dir(parent)?;
        }
        let db = Database::create(path).map_err(storage)?;
        let wt = db.begin_write().map_err(storage)?;
        for table in [
            USERS,
            POSITIONS,
            TEAMS,
            COLLABORATORS,
            CYCLES,
            COMPETENCIES,
            ASSESSMENTS,
            OBJECTIVES,
            KEY_RESULTS,
            CHECK_INS,
            MOODS,
            FEEDBACK,
        ] {
            wt.open_table(table).map_err(storage)?;
        }
        wt.open_table(SEQUENCES).map_err(storage)?;
        wt.open_table(TOKENS).map_err(storage)?;
        wt.commit().map_err(storage)?;
        tracing::debug!(path = %path.display(), "store opened");
        Ok(Self { db })
    }

    /// A consistent read-only view of the database.
    pub fn read(&self) -> Result<Snapshot> {
        let rt = self.db.begin_read().map_err(storage)?;
        Ok(Snapshot { rt })
    }

    /// Run `f` inside one write transaction.
    ///
    /// Commits when `f` returns `Ok`; aborts on `Err`, discarding every write
    /// `f` made.
    pub fn write<T>(&self, f: impl FnOnce(&Tx) -> Result<T>) -> Result<T> {
        let tx = Tx {
            wt: self.db.begin_write().map_err(storage)?,
        };
        match f(&tx) {
            Ok(value) => {
                tx.wt.commit().map_err(storage)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abort_err) = tx.wt.abort() {
                    tracing::warn!(error = %abort_err, "write transaction abort failed");
                }
                Err(e)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

pub struct Snapshot {
    rt: ReadTransaction,
}

impl Snapshot {
    pub fn token_owner(&self, digest: &str) -> Result<Option<u64>> {
        let table = self.rt.open_table(TOKENS).map_err(storage)?;
        let owner = table.get(digest).map_err(storage)?.map(|g| g.value());
        Ok(owner)
    }
}

impl Reader for Snapshot {
    fn get<R: Record>(&self, id: u64) -> Result<Option<R>> {
        let table = self.rt.open_table(R::TABLE).map_err(storage)?;
        fetch(&table, id)
    }

    fn all<R: Record>(&self) -> Result<Vec<R>> {
        let table = self.rt.open_table(R::TABLE).map_err(storage)?;
        scan(&table)
    }
}

// ---------------------------------------------------------------------------
// Tx
// ---------------------------------------------------------------------------

pub struct Tx {
    wt: WriteTransaction,
}

impl Tx {
    /// Assign the next id for `R` and store the record.
    pub fn insert<R: Record>(&self, record: &mut R) -> Result<u64> {
        let id = self.next_id(R::ENTITY)?;
        record.set_id(id);
        self.put(record)?;
        Ok(id)
    }

    /// Store `record` under its current id, replacing any previous value.
    pub fn put<R: Record>(&self, record: &R) -> Result<()> {
        let value = serde_json::to_vec(record)?;
        let mut table = self.wt.open_table(R::TABLE).map_err(storage)?;
        table
            .insert(record.id(), value.as_slice())
            .map_err(storage)?;
        Ok(())
    }

    /// Remove a record. Returns `false` if it did not exist.
    pub fn remove<R: Record>(&self, id: u64) -> Result<bool> {
        let mut table = self.wt.open_table(R::TABLE).map_err(storage)?;
        let removed = table.remove(id).map_err(storage)?.is_some();
        Ok(removed)
    }

    pub fn set_token(&self, digest: &str, user_id: u64) -> Result<()> {
        let mut table = self.wt.open_table(TOKENS).map_err(storage)?;
        table.insert(digest, user_id).map_err(storage)?;
        Ok(())
    }

    pub fn remove_token(&self, digest: &str) -> Result<()> {
        let mut table = self.wt.open_table(TOKENS).map_err(storage)?;
        table.remove(digest).map_err(storage)?;
        Ok(())
    }

    fn next_id(&self, entity: &str) -> Result<u64> {
        let mut table = self.wt.open_table(SEQUENCES).map_err(storage)?;
        let last = table.get(entity).map_err(storage)?.map(|g| g.value());
        let next = last.unwrap_or(0) + 1;
        table.insert(entity, next).map_err(storage)?;
        Ok(next)
    }
}

impl Reader for Tx {
    fn get<R: Record>(&self, id: u64) -> Result<Option<R>> {
        let table = self.wt.open_table(R::TABLE).map_err(storage)?;
        fetch(&table, id)
    }

    fn all<R: Record>(&self) -> Result<Vec<R>> {
        let table = self.wt.open_table(R::TABLE).map_err(storage)?;
        scan(&table)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: u64,
        text: String,
    }

    impl Record for Note {
        const TABLE: RecordTable = FEEDBACK;
        const ENTITY: &'static str = "note";

        fn id(&self) -> u64 {
            self.id
        }

        fn set_id(&mut self, id: u64) {
            self.id = id;
        }
    }

    fn note(text: &str) -> Note {
        Note {
            id: 0,
            text: text.to_string(),
        }
    }

    fn open_tmp() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("test.redb")).unwrap();
        (dir, store)
    }

    #[test]
    fn insert_assigns_sequential_ids() {
        let (_dir, store) = open_tmp();
        let first = store.write(|tx| tx.insert(&mut note("a"))).unwrap();
        let second = store.write(|tx| tx.insert(&mut note("b"))).unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[test]
    fn ids_are_not_reused_after_remove() {
        let (_dir, store) = open_tmp();
        store.write(|tx| tx.insert(&mut note("a"))).unwrap();
        store.write(|tx| tx.remove::<Note>(1)).unwrap();
        let id = store.write(|tx| tx.insert(&mut note("b"))).unwrap();
        assert_eq!(id, 2);
    }

    #[test]
    fn snapshot_reads_committed_records() {
        let (_dir, store) = open_tmp();
        store.write(|tx| tx.insert(&mut note("hello"))).unwrap();
        let snap = store.read().unwrap();
        let got: Note = snap.require(1).unwrap();
        assert_eq!(got.text, "hello");
        assert_eq!(snap.all::<Note>().unwrap().len(), 1);
    }

    #[test]
    fn require_missing_is_not_found() {
        let (_dir, store) = open_tmp();
        let snap = store.read().unwrap();
        match snap.require::<Note>(42) {
            Err(ReuneError::NotFound { entity, id }) => {
                assert_eq!(entity, "note");
                assert_eq!(id, 42);
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn failed_closure_rolls_back_every_write() {
        let (_dir, store) = open_tmp();
        store.write(|tx| tx.insert(&mut note("kept"))).unwrap();

        let result: Result<()> = store.write(|tx| {
            let mut existing: Note = tx.require(1)?;
            existing.text = "changed".to_string();
            tx.put(&existing)?;
            tx.insert(&mut note("extra"))?;
            Err(ReuneError::Storage("simulated failure".into()))
        });
        assert!(result.is_err());

        let snap = store.read().unwrap();
        let all = snap.all::<Note>().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].text, "kept");
        // The aborted insert did not consume an id either.
        drop(snap);
        let id = store.write(|tx| tx.insert(&mut note("next"))).unwrap();
        assert_eq!(id, 2);
    }

    #[test]
    fn writes_are_visible_inside_the_same_transaction() {
        let (_dir, store) = open_tmp();
        store
            .write(|tx| {
                tx.insert(&mut note("a"))?;
                let seen: Vec<Note> = tx.all()?;
                assert_eq!(seen.len(), 1);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn tokens_round_trip() {
        let (_dir, store) = open_tmp();
        store.write(|tx| tx.set_token("abc", 7)).unwrap();
        assert_eq!(store.read().unwrap().token_owner("abc").unwrap(), Some(7));
        store.write(|tx| tx.remove_token("abc")).unwrap();
        assert_eq!(store.read().unwrap().token_owner("abc").unwrap(), None);
    }

    #[test]
    fn reopen_keeps_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.redb");
        {
            let store = Store::open(&path).unwrap();
            store.write(|tx| tx.insert(&mut note("persisted"))).unwrap();
        }
        let store = Store::open(&path).unwrap();
        let got: Note = store.read().unwrap().require(1).unwrap();
        assert_eq!(got.text, "persisted");
    }
}
