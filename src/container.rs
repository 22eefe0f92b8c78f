//! Container instances.
//!
//! A [`Container`] holds one value per field of its [`ContainerClass`] plus an
//! extraneous side-map for keyword data that matches no declared field. Its
//! identity is its serialized form: two containers are equal exactly when
//! [`Container::post`] yields the same document for both.
//!
//! Values are kept behind `Arc` so that a shallow copy shares nested storage
//! with its source. Writes never mutate shared storage in place, they swap in a
//! fresh value, so sharing is only ever visible through [`Container::shared`].

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::client::StoreClient;
use crate::construct::{is_reserved, ContainerClass, ID_KEY, TYPE_KEY};
use crate::datatype::as_text;
use crate::error::{DevicedbError, Result};
use crate::field::FieldSpec;
use crate::persist::{Document, EntryId};

/// The store a container has been registered with.
#[derive(Clone)]
pub(crate) struct Binding {
    pub(crate) id: EntryId,
    pub(crate) client: StoreClient,
}

#[derive(Clone)]
pub struct Container {
    class: Arc<ContainerClass>,
    values: Vec<Arc<Value>>,
    extraneous: BTreeMap<String, Arc<Value>>,
    binding: Option<Binding>,
}

impl Container {
    /// Creates an unbound container. Supplied values are checked field by
    /// field in schema order, so the first reported failure is deterministic.
    pub fn new<I, K>(class: &Arc<ContainerClass>, kwargs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut supplied: BTreeMap<String, Value> =
            kwargs.into_iter().map(|(k, v)| (k.into(), v)).collect();
        if let Some(name) = supplied.keys().find(|k| is_reserved(k)) {
            return Err(DevicedbError::NameCollision {
                container: class.name().to_string(),
                name: name.clone(),
            });
        }
        let mut values = Vec::with_capacity(class.entry_info().len());
        for spec in class.entry_info() {
            let value = match supplied.remove(spec.name()) {
                Some(value) => spec.enforce_value(value)?,
                None => spec.default_value().cloned().unwrap_or(Value::Null),
            };
            values.push(Arc::new(value));
        }
        let extraneous = supplied
            .into_iter()
            .map(|(k, v)| (k, Arc::new(v)))
            .collect();
        Ok(Self {
            class: Arc::clone(class),
            values,
            extraneous,
            binding: None,
        })
    }

    /// Rebuilds a container from a stored document, running every value
    /// through its field again.
    pub(crate) fn from_document(
        class: &Arc<ContainerClass>,
        mut document: Document,
        binding: Binding,
    ) -> Result<Self> {
        document.remove(ID_KEY);
        document.remove(TYPE_KEY);
        let mut container = Self::new(class, document)?;
        container.binding = Some(binding);
        Ok(container)
    }

    pub fn class(&self) -> &Arc<ContainerClass> {
        &self.class
    }
    pub fn class_name(&self) -> &str {
        self.class.name()
    }
    pub fn entry_info(&self) -> &[Arc<FieldSpec>] {
        self.class.entry_info()
    }
    pub fn info_names(&self) -> Vec<&str> {
        self.class.info_names()
    }
    pub fn mandatory_info(&self) -> &[String] {
        self.class.mandatory_info()
    }
    pub fn extraneous(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.extraneous.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }
    /// The store-assigned identifier, once the container has been added.
    pub fn id(&self) -> Option<EntryId> {
        self.binding.as_ref().map(|b| b.id)
    }
    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }
    pub(crate) fn binding(&self) -> Option<&Binding> {
        self.binding.as_ref()
    }
    pub(crate) fn bind(&mut self, binding: Binding) {
        self.binding = Some(binding);
    }

    /// Current value of a declared or extraneous field; `Null` for an empty declared field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.shared(name).map(Arc::as_ref)
    }
    /// The storage handle behind a field, to tell shared values apart from copies.
    pub fn shared(&self, name: &str) -> Option<&Arc<Value>> {
        match self.class.position(name) {
            Some(i) => Some(&self.values[i]),
            None => self.extraneous.get(name),
        }
    }

    /// Assigns a field. Declared fields are validated first and keep their
    /// previous value on failure; undeclared names go to the extraneous data.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        if is_reserved(name) {
            return Err(DevicedbError::NameCollision {
                container: self.class.name().to_string(),
                name: name.to_string(),
            });
        }
        let value = value.into();
        match self.class.position(name) {
            Some(i) => {
                let accepted = self.class.entry_info()[i].enforce_value(value)?;
                self.values[i] = Arc::new(accepted);
            }
            None => {
                self.extraneous.insert(name.to_string(), Arc::new(value));
            }
        }
        Ok(())
    }

    /// Names of mandatory fields that are still empty.
    pub fn missing_info(&self) -> Vec<&str> {
        self.mandatory_info()
            .iter()
            .filter(|name| self.get(name).is_none_or(Value::is_null))
            .map(String::as_str)
            .collect()
    }

    /// The canonical serialized form of this container.
    pub fn post(&self) -> Document {
        let mut document = Document::new();
        for (key, value) in &self.extraneous {
            document.insert(key.clone(), value.as_ref().clone());
        }
        for (spec, value) in self.class.entry_info().iter().zip(&self.values) {
            document.insert(spec.name().to_string(), value.as_ref().clone());
        }
        document.insert(TYPE_KEY.to_string(), Value::from(self.class.name()));
        if let Some(id) = self.id() {
            document.insert(ID_KEY.to_string(), Value::from(id.0));
        }
        document
    }

    /// Same key-value pairs as [`Container::post`].
    pub fn iter(&self) -> serde_json::map::IntoIter {
        self.post().into_iter()
    }

    /// A copy that shares nested values with `self`.
    pub fn shallow_copy(&self) -> Self {
        self.clone()
    }

    /// A copy that shares no value storage with `self`.
    pub fn deep_copy(&self) -> Self {
        Self {
            class: Arc::clone(&self.class),
            values: self
                .values
                .iter()
                .map(|v| Arc::new(v.as_ref().clone()))
                .collect(),
            extraneous: self
                .extraneous
                .iter()
                .map(|(k, v)| (k.clone(), Arc::new(v.as_ref().clone())))
                .collect(),
            binding: self.binding.clone(),
        }
    }

    /// Writes a readable table of every field except the store identifier.
    pub fn show_info(&self, sink: &mut dyn Write) -> Result<()> {
        let mut rows: Vec<(String, String)> = self
            .class
            .entry_info()
            .iter()
            .zip(&self.values)
            .map(|(spec, value)| (spec.name().to_string(), render(value)))
            .collect();
        rows.extend(self.extraneous.iter().map(|(k, v)| (k.clone(), render(v))));

        let key_width = rows.iter().map(|(k, _)| k.len()).chain([9]).max().unwrap_or(9);
        let value_width = rows.iter().map(|(_, v)| v.len()).chain([5]).max().unwrap_or(5);
        let rule = format!("+{}+{}+", "-".repeat(key_width + 2), "-".repeat(value_width + 2));
        writeln!(sink, "{rule}")?;
        writeln!(sink, "| {:<key_width$} | {:<value_width$} |", "EntryInfo", "Value")?;
        writeln!(sink, "{rule}")?;
        for (key, value) in rows {
            writeln!(sink, "| {key:<key_width$} | {value:<value_width$} |")?;
        }
        writeln!(sink, "{rule}")?;
        Ok(())
    }

    /// Flushes the current state to the store this container was added to.
    pub fn save(&mut self) -> Result<()> {
        let client = match &self.binding {
            Some(binding) => binding.client.clone(),
            None => {
                return Err(DevicedbError::Binding(format!(
                    "{self} has not been added to a store, it cannot be saved"
                )));
            }
        };
        client.flush(self)
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => String::from("None"),
        other => as_text(other),
    }
}

impl PartialEq for Container {
    fn eq(&self, other: &Self) -> bool {
        self.post() == other.post()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Container")
            .field("class", &self.class.name())
            .field("id", &self.id())
            .field("post", &self.post())
            .finish()
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.get("name") {
            Some(Value::String(name)) => write!(f, "{} (name={})", self.class.name(), name),
            _ => write!(f, "{}", self.class.name()),
        }
    }
}

impl Serialize for Container {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.post().serialize(serializer)
    }
}

impl<'a> IntoIterator for &'a Container {
    type Item = (String, Value);
    type IntoIter = serde_json::map::IntoIter;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
