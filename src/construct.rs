use std::sync::Arc;

// other keepers use HashMap with a fast hasher
use core::hash::BuildHasherDefault;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use seahash::SeaHasher;

use lazy_static::lazy_static;
use tracing::debug;

// our own stuff that we need
use crate::datatype::TypeSpec;
use crate::error::{DevicedbError, Result};
use crate::field::{Enforce, FieldSpec};

pub type OtherHasher = BuildHasherDefault<SeaHasher>;

/// Key under which the store identifier appears in a posted document.
pub const ID_KEY: &str = "_id";
/// Key under which the class name appears in a posted document.
pub const TYPE_KEY: &str = "type";

/// Names a field may never take, since they are used for identity or introspection.
pub const RESERVED: [&str; 6] = [
    ID_KEY,
    TYPE_KEY,
    "info_names",
    "entry_info",
    "mandatory_info",
    "extraneous",
];

/// Identity fields every class lists in its `mandatory_info`, declared or not.
pub const IDENTITY_INFO: [&str; 2] = ["name", "prefix"];

pub fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name)
}

// ------------- ContainerClass -------------
/// A resolved container schema. Built once, then shared by every instance.
#[derive(Debug)]
pub struct ContainerClass {
    name: String,
    parent: Option<Arc<ContainerClass>>,
    entry_info: Vec<Arc<FieldSpec>>,
    mandatory_info: Vec<String>,
}

impl ContainerClass {
    pub fn builder(name: impl Into<String>) -> ContainerClassBuilder {
        ContainerClassBuilder {
            name: name.into(),
            parent: None,
            declared: Vec::new(),
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn parent(&self) -> Option<&Arc<ContainerClass>> {
        self.parent.as_ref()
    }
    /// Every field of this class, base-class fields first.
    pub fn entry_info(&self) -> &[Arc<FieldSpec>] {
        &self.entry_info
    }
    /// Fields that must hold a value before the container can be stored.
    pub fn mandatory_info(&self) -> &[String] {
        &self.mandatory_info
    }
    pub fn info_names(&self) -> Vec<&str> {
        self.entry_info.iter().map(|spec| spec.name()).collect()
    }
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entry_info.iter().position(|spec| spec.name() == name)
    }
    pub fn field(&self, name: &str) -> Option<&Arc<FieldSpec>> {
        self.position(name).map(|i| &self.entry_info[i])
    }
    /// True if this class is `other` or derives from it.
    pub fn is_a(&self, other: &ContainerClass) -> bool {
        if self.name == other.name {
            return true;
        }
        self.parent.as_ref().is_some_and(|p| p.is_a(other))
    }
}

pub struct ContainerClassBuilder {
    name: String,
    parent: Option<Arc<ContainerClass>>,
    declared: Vec<FieldSpec>,
}

impl ContainerClassBuilder {
    pub fn extends(mut self, parent: &Arc<ContainerClass>) -> Self {
        self.parent = Some(Arc::clone(parent));
        self
    }
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.declared.push(spec);
        self
    }

    /// Resolves the schema and runs every definition-time check. A class that
    /// fails here never comes into existence.
    pub fn build(self) -> Result<Arc<ContainerClass>> {
        let definition_error = |field: &str, message: String| DevicedbError::Definition {
            container: self.name.clone(),
            field: field.to_string(),
            message,
        };
        if self.name.trim().is_empty() {
            return Err(definition_error("", String::from("a container class needs a name")));
        }
        if is_reserved(&self.name) {
            return Err(DevicedbError::NameCollision {
                container: self.name.clone(),
                name: self.name.clone(),
            });
        }

        let mut entry_info: Vec<Arc<FieldSpec>> = self
            .parent
            .as_ref()
            .map(|p| p.entry_info.clone())
            .unwrap_or_default();
        let mut seen = HashSet::<&str, OtherHasher>::default();
        for spec in &self.declared {
            let name = spec.name();
            if is_reserved(name) {
                return Err(DevicedbError::NameCollision {
                    container: self.name.clone(),
                    name: name.to_string(),
                });
            }
            if name.is_empty() {
                return Err(definition_error(name, String::from("a field needs a name")));
            }
            if !seen.insert(name) {
                return Err(definition_error(name, String::from("declared more than once")));
            }
            let inherited_mandatory = self
                .parent
                .as_ref()
                .is_some_and(|p| p.mandatory_info.iter().any(|m| m == name));
            if inherited_mandatory && !spec.is_required() {
                return Err(definition_error(
                    name,
                    String::from("an inherited mandatory field cannot become optional or take a default"),
                ));
            }
        }

        for spec in self.declared.iter().cloned() {
            let spec = match spec.default_value().cloned() {
                Some(default) if spec.constraint().is_some() => {
                    let coerced = spec.enforce_value(default).map_err(|_| {
                        definition_error(
                            spec.name(),
                            format!(
                                "default {} violates the constraint: {}",
                                spec.default_value().map(|v| v.to_string()).unwrap_or_default(),
                                spec.enforce_doc_text()
                            ),
                        )
                    })?;
                    spec.default(coerced)
                }
                _ => spec,
            };
            // a redeclared field keeps the position it was inherited at
            match entry_info.iter().position(|kept| kept.name() == spec.name()) {
                Some(i) => entry_info[i] = Arc::new(spec),
                None => entry_info.push(Arc::new(spec)),
            }
        }

        // identity first, then whatever the ancestors require, then our own required fields
        let mut mandatory_info: Vec<String> = Vec::new();
        let inherited = self.parent.as_ref().map(|p| p.mandatory_info.clone()).unwrap_or_default();
        let required = entry_info
            .iter()
            .filter(|spec| spec.is_required())
            .map(|spec| spec.name().to_string());
        for name in IDENTITY_INFO.iter().map(|n| n.to_string()).chain(inherited).chain(required) {
            if !mandatory_info.contains(&name) {
                mandatory_info.push(name);
            }
        }
        let class = ContainerClass {
            name: self.name,
            parent: self.parent,
            entry_info,
            mandatory_info,
        };
        debug!(
            class = %class.name,
            fields = ?class.info_names(),
            mandatory = ?class.mandatory_info,
            "container class defined"
        );
        Ok(Arc::new(class))
    }
}

// ------------- ClassKeeper -------------
/// Owns container classes by name so stored documents can be turned back into containers.
#[derive(Debug)]
pub struct ClassKeeper {
    kept: HashMap<String, Arc<ContainerClass>, OtherHasher>,
}
impl ClassKeeper {
    pub fn new() -> Self {
        Self {
            kept: HashMap::default(),
        }
    }
    /// A keeper that already holds the built-in classes.
    pub fn with_builtins() -> Self {
        let mut keeper = Self::new();
        keeper.keep(Arc::clone(&ITEM));
        keeper.keep(Arc::clone(&DEVICE));
        keeper
    }
    pub fn keep(&mut self, class: Arc<ContainerClass>) -> (Arc<ContainerClass>, bool) {
        match self.kept.entry(class.name().to_owned()) {
            Entry::Vacant(e) => (Arc::clone(e.insert(class)), false),
            Entry::Occupied(e) => (Arc::clone(e.get()), true),
        }
    }
    pub fn get(&self, name: &str) -> Option<Arc<ContainerClass>> {
        self.kept.get(name).map(Arc::clone)
    }
    pub fn len(&self) -> usize {
        self.kept.len()
    }
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}
impl Default for ClassKeeper {
    fn default() -> Self {
        Self::new()
    }
}

// ------------- Built-in classes -------------
fn item_class() -> Result<Arc<ContainerClass>> {
    ContainerClass::builder("Item")
        .field(
            FieldSpec::new("name")
                .doc("Shorthand name of the entry")
                .optional(false)
                .enforce(Enforce::pattern(r"[a-z][a-z_0-9]{2,78}")?)
                .enforce_doc(
                    "names must be 3 to 79 characters of lowercase letters, digits and \
                     underscores, starting with a letter",
                ),
        )
        .field(
            FieldSpec::new("prefix")
                .doc("Locator of the entity, such as its base control-system address")
                .optional(false)
                .enforce(TypeSpec::Str),
        )
        .field(
            FieldSpec::new("active")
                .doc("Whether the entry is currently in use")
                .default(true)
                .enforce(TypeSpec::Bool),
        )
        .field(
            FieldSpec::new("documentation")
                .doc("Free-form description")
                .enforce(TypeSpec::Str),
        )
        .field(
            FieldSpec::new("kwargs")
                .doc("Keyword arguments handed to the loader of this entry")
                .default(serde_json::json!({}))
                .enforce(TypeSpec::Map),
        )
        .field(
            FieldSpec::new("creation")
                .doc("When the entry was first stored")
                .enforce(TypeSpec::Str),
        )
        .field(
            FieldSpec::new("last_edit")
                .doc("When the entry was last saved")
                .enforce(TypeSpec::Str),
        )
        .build()
}

fn device_class() -> Result<Arc<ContainerClass>> {
    ContainerClass::builder("Device")
        .extends(&ITEM)
        .field(
            FieldSpec::new("device_class")
                .doc("Fully qualified class used to instantiate the device")
                .enforce(Enforce::pattern(r"[A-Za-z_][A-Za-z_0-9]*(\.[A-Za-z_][A-Za-z_0-9]*)*")?)
                .enforce_doc("device_class must be a dotted path such as module.Class"),
        )
        .field(
            FieldSpec::new("args")
                .doc("Positional arguments handed to the device class")
                .default(serde_json::json!([]))
                .enforce(TypeSpec::List),
        )
        .build()
}

lazy_static! {
    /// Base of every container: identity, locator and bookkeeping fields.
    pub static ref ITEM: Arc<ContainerClass> =
        item_class().expect("built-in Item schema is valid");
    /// An [`ITEM`] that describes a loadable control-system device.
    pub static ref DEVICE: Arc<ContainerClass> =
        device_class().expect("built-in Device schema is valid");
}
