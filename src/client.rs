//! The persistence façade.
//!
//! A [`StoreClient`] registers new containers with a [`Backend`], flushes
//! their state on [`Container::save`] and hands out [`SearchResult`]s that
//! reflect what was last saved. Cloning a client is cheap: clones share the
//! same backend and class keeper.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tracing::{info, warn};

use crate::construct::{ClassKeeper, ContainerClass, ID_KEY, TYPE_KEY};
use crate::container::{Binding, Container};
use crate::error::{DevicedbError, Result};
use crate::persist::{open_backend, Backend, Document, EntryId, PersistenceMode};

const CREATION: &str = "creation";
const LAST_EDIT: &str = "last_edit";

#[derive(Clone)]
pub struct StoreClient {
    backend: Arc<Mutex<Box<dyn Backend>>>,
    keeper: Arc<Mutex<ClassKeeper>>,
}

impl fmt::Debug for StoreClient {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("StoreClient").finish_non_exhaustive()
    }
}

impl StoreClient {
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self {
            backend: Arc::new(Mutex::new(backend)),
            keeper: Arc::new(Mutex::new(ClassKeeper::with_builtins())),
        }
    }
    pub fn open(mode: &PersistenceMode) -> Result<Self> {
        Ok(Self::new(open_backend(mode)?))
    }

    fn backend(&self) -> Result<MutexGuard<'_, Box<dyn Backend>>> {
        Ok(self.backend.lock()?)
    }

    /// Makes a custom class known so that stored entries of it can be loaded.
    pub fn register(&self, class: &Arc<ContainerClass>) -> Result<Arc<ContainerClass>> {
        let (kept, _) = self.keeper.lock()?.keep(Arc::clone(class));
        Ok(kept)
    }

    /// Registers an unbound container with the store and binds it to the new identifier.
    pub fn add(&self, container: &mut Container) -> Result<EntryId> {
        if let Some(id) = container.id() {
            return Err(DevicedbError::Binding(format!(
                "{container} is already stored under id {id}"
            )));
        }
        let missing = container.missing_info();
        if !missing.is_empty() {
            return Err(DevicedbError::Binding(format!(
                "{container} is missing mandatory information: {}",
                missing.join(", ")
            )));
        }
        if let Some(name) = container.get("name").filter(|v| !v.is_null()) {
            if let Some(existing) = self.find("name", name.clone())? {
                return Err(DevicedbError::Duplicate(format!(
                    "an entry named {} already exists under id {}",
                    name,
                    existing.id()
                )));
            }
        }
        self.register(container.class())?;

        let stamps = timestamps(container, &[CREATION, LAST_EDIT])?;
        let mut document = container.post();
        for (key, value) in &stamps {
            document.insert(key.to_string(), value.clone());
        }
        let id = self.backend()?.create(&document)?;

        // the store accepted it, now it is safe to touch the container
        for (key, value) in stamps {
            container.set(key, value)?;
        }
        container.bind(Binding {
            id,
            client: self.clone(),
        });
        info!(%id, entry = %container, "entry added");
        Ok(id)
    }

    /// Writes the state of a bound container under its identifier.
    pub(crate) fn flush(&self, container: &mut Container) -> Result<()> {
        let id = match container.binding() {
            Some(binding) => binding.id,
            None => {
                return Err(DevicedbError::Binding(format!(
                    "{container} has not been added to a store"
                )));
            }
        };
        let missing = container.missing_info();
        if !missing.is_empty() {
            return Err(DevicedbError::Binding(format!(
                "{container} is missing mandatory information: {}",
                missing.join(", ")
            )));
        }
        let stamps = timestamps(container, &[LAST_EDIT])?;
        let mut document = container.post();
        // the identifier is the key of the entry, not part of what is stored
        document.remove(ID_KEY);
        for (key, value) in &stamps {
            document.insert(key.to_string(), value.clone());
        }
        self.backend()?.update(id, &document)?;
        for (key, value) in stamps {
            container.set(key, value)?;
        }
        info!(%id, entry = %container, "entry saved");
        Ok(())
    }

    /// The last saved state of an entry.
    pub fn lookup(&self, id: EntryId) -> Result<SearchResult> {
        match self.backend()?.read(id)? {
            Some(document) => Ok(SearchResult {
                id,
                document,
                client: self.clone(),
            }),
            None => Err(DevicedbError::NotFound(format!("no entry with id {id}"))),
        }
    }

    pub fn all_items(&self) -> Result<Vec<SearchResult>> {
        self.search(&[])
    }

    /// Entries whose documents hold every given key with an equal value.
    pub fn search(&self, criteria: &[(&str, Value)]) -> Result<Vec<SearchResult>> {
        let entries = self.backend()?.all()?;
        Ok(entries
            .into_iter()
            .filter(|(_, document)| {
                criteria
                    .iter()
                    .all(|(key, value)| document.get(*key) == Some(value))
            })
            .map(|(id, document)| SearchResult {
                id,
                document,
                client: self.clone(),
            })
            .collect())
    }

    pub fn find(&self, key: &str, value: impl Into<Value>) -> Result<Option<SearchResult>> {
        Ok(self.search(&[(key, value.into())])?.into_iter().next())
    }

    /// Loads every stored entry and returns the identifiers of those that no
    /// longer pass their class's validation or lack mandatory information.
    pub fn validate(&self) -> Result<Vec<EntryId>> {
        let mut invalid = Vec::new();
        for result in self.all_items()? {
            match result.item() {
                Err(e) => {
                    warn!(id = %result.id, error = %e, "entry failed validation");
                    invalid.push(result.id);
                }
                Ok(item) => {
                    let missing = item.missing_info();
                    if !missing.is_empty() {
                        warn!(id = %result.id, missing = ?missing, "entry lacks mandatory information");
                        invalid.push(result.id);
                    }
                }
            }
        }
        Ok(invalid)
    }
}

/// A stored entry as it was when it was looked up.
#[derive(Clone)]
pub struct SearchResult {
    id: EntryId,
    document: Document,
    client: StoreClient,
}

impl fmt::Debug for SearchResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SearchResult")
            .field("id", &self.id)
            .field("document", &self.document)
            .finish_non_exhaustive()
    }
}

impl SearchResult {
    pub fn id(&self) -> EntryId {
        self.id
    }
    pub fn document(&self) -> &Document {
        &self.document
    }
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.document.get(key)
    }
    /// Rebuilds a bound container from the stored document.
    pub fn item(&self) -> Result<Container> {
        let type_name = self
            .document
            .get(TYPE_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| DevicedbError::DataCorruption {
                message: format!("entry {} has no container type", self.id),
            })?;
        let class = self.client.keeper.lock()?.get(type_name).ok_or_else(|| {
            DevicedbError::NotFound(format!(
                "container type {type_name} of entry {} is not registered",
                self.id
            ))
        })?;
        Container::from_document(
            &class,
            self.document.clone(),
            Binding {
                id: self.id,
                client: self.client.clone(),
            },
        )
    }
}

// Bookkeeping timestamps for the given fields, already validated against the
// class so that writing them back after the store call cannot fail.
fn timestamps(container: &Container, keys: &[&'static str]) -> Result<Vec<(&'static str, Value)>> {
    let now = Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true));
    let mut stamps = Vec::new();
    for key in keys {
        if let Some(spec) = container.class().field(key) {
            stamps.push((*key, spec.enforce_value(now.clone())?));
        }
    }
    Ok(stamps)
}
