// used for persistence
use rusqlite::{params, Connection, Error};

// the in-memory store uses a fast hasher, keyed by entry identity
use core::hash::BuildHasherDefault;
use std::collections::HashMap;
use seahash::SeaHasher;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::debug;

use crate::construct::TYPE_KEY;
use crate::error::{DevicedbError, Result};

/// The serialized field-value mapping of a container.
pub type Document = serde_json::Map<String, Value>;

// ------------- EntryId -------------
/// Identifier assigned by a backend when a document is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type EntryHasher = BuildHasherDefault<SeaHasher>;

pub const GENESIS: u64 = 0;

#[derive(Debug)]
pub struct EntryGenerator {
    lower_bound: u64,
}
impl EntryGenerator {
    pub fn new() -> Self {
        Self {
            lower_bound: GENESIS,
        }
    }
    // Identities only ever grow, a generated one is never handed out twice.
    pub fn generate(&mut self) -> EntryId {
        self.lower_bound += 1;
        EntryId(self.lower_bound)
    }
}
impl Default for EntryGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// ------------- Backend -------------
/// The narrow contract a backing store has to fulfil.
pub trait Backend: Send {
    fn create(&mut self, document: &Document) -> Result<EntryId>;
    /// Replaces the document stored under `id`; `NotFound` if there is none.
    fn update(&mut self, id: EntryId, document: &Document) -> Result<()>;
    fn read(&self, id: EntryId) -> Result<Option<Document>>;
    /// Every stored entry, in identifier order.
    fn all(&self) -> Result<Vec<(EntryId, Document)>>;
}

/// Where a store keeps its entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceMode {
    /// Plain in-process map, nothing touches SQLite.
    Memory,
    /// SQLite without a file, handy for tests.
    SqliteInMemory,
    /// SQLite database file at the given path.
    File(String),
}

pub fn open_backend(mode: &PersistenceMode) -> Result<Box<dyn Backend>> {
    Ok(match mode {
        PersistenceMode::Memory => Box::new(MemoryBackend::new()),
        PersistenceMode::SqliteInMemory => Box::new(SqlitePersistor::new(Connection::open_in_memory()?)?),
        PersistenceMode::File(path) => Box::new(SqlitePersistor::new(Connection::open(path)?)?),
    })
}

// ------------- MemoryBackend -------------
#[derive(Debug, Default)]
pub struct MemoryBackend {
    generator: EntryGenerator,
    kept: HashMap<EntryId, Document, EntryHasher>,
}
impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn len(&self) -> usize {
        self.kept.len()
    }
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}
impl Backend for MemoryBackend {
    fn create(&mut self, document: &Document) -> Result<EntryId> {
        let id = self.generator.generate();
        self.kept.insert(id, document.clone());
        Ok(id)
    }
    fn update(&mut self, id: EntryId, document: &Document) -> Result<()> {
        match self.kept.get_mut(&id) {
            Some(kept) => {
                *kept = document.clone();
                Ok(())
            }
            None => Err(DevicedbError::NotFound(format!("no entry with id {id}"))),
        }
    }
    fn read(&self, id: EntryId) -> Result<Option<Document>> {
        Ok(self.kept.get(&id).cloned())
    }
    fn all(&self) -> Result<Vec<(EntryId, Document)>> {
        let mut entries: Vec<(EntryId, Document)> =
            self.kept.iter().map(|(id, d)| (*id, d.clone())).collect();
        entries.sort_by_key(|(id, _)| *id);
        Ok(entries)
    }
}

// ------------- Persistence -------------
pub struct SqlitePersistor {
    db: Connection,
}
impl SqlitePersistor {
    pub fn new(connection: Connection) -> Result<Self> {
        // The "STRICT" keyword introduced in 3.37.0 breaks JDBC connections, which makes
        // debugging using an external tool like DBeaver impossible
        connection.execute_batch(
            "
            create table if not exists Entry (
                Entry_Identity integer not null,
                ContainerType text not null,
                Document text not null,
                constraint referenceable_Entry_Identity primary key (
                    Entry_Identity
                )
            );-- STRICT;
            ",
        )?;
        Ok(Self { db: connection })
    }
    fn decode(id: EntryId, text: &str) -> Result<Document> {
        match serde_json::from_str::<Value>(text)? {
            Value::Object(document) => Ok(document),
            other => Err(DevicedbError::DataCorruption {
                message: format!("entry {id} holds {other} where a document was expected"),
            }),
        }
    }
}
impl Backend for SqlitePersistor {
    fn create(&mut self, document: &Document) -> Result<EntryId> {
        let container_type = document
            .get(TYPE_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default();
        self.db
            .prepare_cached(
                "
                insert into Entry (
                    Entry_Identity,
                    ContainerType,
                    Document
                ) values (null, ?, ?)
            ",
            )?
            .execute(params![container_type, serde_json::to_string(document)?])?;
        let id = EntryId(self.db.last_insert_rowid() as u64);
        debug!(%id, container_type, "entry persisted");
        Ok(id)
    }
    fn update(&mut self, id: EntryId, document: &Document) -> Result<()> {
        let changed = self
            .db
            .prepare_cached(
                "
                update Entry
                    set Document = ?
                    where Entry_Identity = ?
            ",
            )?
            .execute(params![serde_json::to_string(document)?, id.0 as i64])?;
        if changed == 0 {
            return Err(DevicedbError::NotFound(format!("no entry with id {id}")));
        }
        Ok(())
    }
    fn read(&self, id: EntryId) -> Result<Option<Document>> {
        let mut statement = self.db.prepare_cached(
            "
            select Document
                from Entry
                where Entry_Identity = ?
        ",
        )?;
        match statement.query_row::<String, _, _>(params![id.0 as i64], |r| r.get(0)) {
            Ok(text) => Ok(Some(Self::decode(id, &text)?)),
            Err(Error::QueryReturnedNoRows) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
    fn all(&self) -> Result<Vec<(EntryId, Document)>> {
        let mut statement = self.db.prepare_cached(
            "
            select Entry_Identity, Document
                from Entry
                order by Entry_Identity
        ",
        )?;
        let rows = statement.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut entries = Vec::new();
        for row in rows {
            let (id, text) = row?;
            let id = EntryId(id as u64);
            entries.push((id, Self::decode(id, &text)?));
        }
        Ok(entries)
    }
}
