//! Field descriptors.
//!
//! A [`FieldSpec`] describes one named entry of a container class: its
//! documentation, default, optionality and the constraint every assigned
//! value has to pass. Specs are immutable once attached to a class and are
//! shared through `Arc` by the declaring class and all of its subclasses.

use std::fmt;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::datatype::{as_text, TypeSpec};
use crate::error::{DevicedbError, Result};

/// The constraint a field places on its values.
#[derive(Debug, Clone)]
pub enum Enforce {
    /// Coerce into the given type.
    Type(TypeSpec),
    /// Value must equal one of these, no coercion.
    OneOf(Vec<Value>),
    /// Textual form must match the whole pattern.
    Pattern(Pattern),
}

impl Enforce {
    pub fn pattern(pattern: &str) -> Result<Self> {
        Ok(Enforce::Pattern(Pattern::new(pattern)?))
    }
    pub fn one_of<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Enforce::OneOf(values.into_iter().map(Into::into).collect())
    }
    fn describe(&self) -> String {
        match self {
            Enforce::Type(t) => format!("must be of type {t}"),
            Enforce::OneOf(values) => {
                let shown: Vec<String> = values.iter().map(Value::to_string).collect();
                format!("must be one of [{}]", shown.join(", "))
            }
            Enforce::Pattern(p) => format!("must match the pattern {p}"),
        }
    }
}

impl From<TypeSpec> for Enforce {
    fn from(t: TypeSpec) -> Self {
        Enforce::Type(t)
    }
}

/// A regular expression that is always applied to the complete text.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    anchored: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self> {
        let anchored = Regex::new(&format!("^(?:{source})$")).map_err(|e| {
            DevicedbError::Definition {
                container: String::from("<pattern>"),
                field: source.to_string(),
                message: e.to_string(),
            }
        })?;
        Ok(Self {
            source: source.to_string(),
            anchored,
        })
    }
    pub fn source(&self) -> &str {
        &self.source
    }
    pub fn is_full_match(&self, text: &str) -> bool {
        self.anchored.is_match(text)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: String,
    doc: String,
    default: Option<Value>,
    optional: bool,
    enforce: Option<Enforce>,
    enforce_doc: Option<String>,
}

impl FieldSpec {
    /// A new optional field without default or constraint.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: String::new(),
            default: None,
            optional: true,
            enforce: None,
            enforce_doc: None,
        }
    }
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }
    pub fn default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }
    pub fn enforce(mut self, enforce: impl Into<Enforce>) -> Self {
        self.enforce = Some(enforce.into());
        self
    }
    pub fn enforce_doc(mut self, enforce_doc: impl Into<String>) -> Self {
        self.enforce_doc = Some(enforce_doc.into());
        self
    }

    // It's intentional to only expose getters for the built field,
    // a field attached to a class must never change.
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn documentation(&self) -> &str {
        &self.doc
    }
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }
    pub fn is_optional(&self) -> bool {
        self.optional
    }
    pub fn constraint(&self) -> Option<&Enforce> {
        self.enforce.as_ref()
    }
    /// The explanation shown when a value is rejected. Falls back to a
    /// description of the constraint itself.
    pub fn enforce_doc_text(&self) -> String {
        match (&self.enforce_doc, &self.enforce) {
            (Some(doc), _) => doc.clone(),
            (None, Some(enforce)) => enforce.describe(),
            (None, None) => String::from("any value is accepted"),
        }
    }
    /// Required means it has to hold a value before the container may be stored.
    pub fn is_required(&self) -> bool {
        !self.optional && self.default.is_none()
    }

    /// Applies the constraint to `value`, returning the possibly coerced value.
    pub fn enforce_value(&self, value: Value) -> Result<Value> {
        if value.is_null() {
            return Ok(value);
        }
        let accepted = match &self.enforce {
            None => Some(value.clone()),
            Some(Enforce::Type(t)) => t.coerce(&value),
            Some(Enforce::OneOf(allowed)) => allowed.contains(&value).then(|| value.clone()),
            Some(Enforce::Pattern(p)) => {
                let text = as_text(&value);
                p.is_full_match(&text).then(|| Value::String(text))
            }
        };
        accepted.ok_or_else(|| {
            debug!(field = %self.name, value = %value, "value rejected");
            DevicedbError::Validation {
                field: self.name.clone(),
                message: format!(
                    "{} is not a valid value for {}: {}",
                    value,
                    self.name,
                    self.enforce_doc_text()
                ),
            }
        })
    }
}
