//! Devicedb – schema-validated records for control-system devices.
//!
//! Devicedb centers on the *container*: a record whose shape is described by a
//! [`construct::ContainerClass`], an ordered list of [`field::FieldSpec`]s that
//! a class declares itself or inherits from its parent.
//! * A [`field::FieldSpec`] names a field and owns its default, its optionality
//!   and its constraint (a type, a fixed set of values, or a pattern).
//! * A [`construct::ContainerClass`] resolves its schema once, when it is built.
//!   Defaults that break their own constraint and reserved field names are
//!   rejected right there, so a broken class never exists.
//! * A [`container::Container`] is one record. Every assignment goes through
//!   the field's constraint; identity is the serialized form returned by
//!   [`container::Container::post`].
//! * A [`client::StoreClient`] adds containers to a [`persist::Backend`],
//!   saves their later changes and looks stored entries up again.
//!
//! ## Modules
//! * [`datatype`] – Type specifiers and their coercion rules.
//! * [`field`] – Field descriptors and constraints.
//! * [`construct`] – Class composition, the class keeper and the built-in classes.
//! * [`container`] – Container instances.
//! * [`persist`] – The backend contract, an in-memory and a SQLite backend.
//! * [`client`] – The store client and search results.
//! * [`settings`] – Configuration loading.
//!
//! ## Quick Start
//! ```
//! use serde_json::json;
//! use devicedb::{client::StoreClient, construct::DEVICE, container::Container, persist::PersistenceMode};
//! let client = StoreClient::open(&PersistenceMode::Memory).unwrap();
//! let mut valve = Container::new(&DEVICE, [("name", json!("tst_valve")), ("prefix", json!("TST:VGC:01"))]).unwrap();
//! let id = client.add(&mut valve).unwrap();
//! valve.set("active", false).unwrap();
//! valve.save().unwrap();
//! assert_eq!(client.lookup(id).unwrap().get("active"), Some(&json!(false)));
//! ```
//!
//! ## Ordering
//! Inherited fields always come before the fields a class declares itself, in
//! `entry_info`, `mandatory_info` and `show_info` alike. A redeclared field
//! keeps the position of the field it replaces. `mandatory_info` always starts
//! with `name` and `prefix`, and a subclass can never make an inherited
//! mandatory field optional.

pub mod client;
pub mod construct;
pub mod container;
pub mod datatype;
pub mod error;
pub mod field;
pub mod persist;
pub mod settings;

pub use error::{DevicedbError, Result};
