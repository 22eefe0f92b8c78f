use std::sync::Arc;

use devicedb::DevicedbError;
use devicedb::construct::{ClassKeeper, ContainerClass, DEVICE, ITEM};
use devicedb::container::Container;
use devicedb::datatype::TypeSpec;
use devicedb::field::FieldSpec;
use serde_json::{json, Value};

#[test]
fn bad_default_fails_at_definition() {
    let err = ContainerClass::builder("Faulty")
        .extends(&ITEM)
        .field(
            FieldSpec::new("fault")
                .enforce(TypeSpec::Int)
                .default("not-int")
                .enforce_doc("fault is a count"),
        )
        .build()
        .unwrap_err();
    assert!(matches!(err, DevicedbError::Definition { .. }), "got {err:?}");
    assert!(err.to_string().contains("fault is a count"), "message was: {err}");
}

#[test]
fn restricted_attr() {
    for reserved in ["info_names", "mandatory_info", "entry_info", "_id", "type", "extraneous"] {
        let err = ContainerClass::builder("Restricted")
            .field(FieldSpec::new(reserved))
            .build()
            .unwrap_err();
        assert!(matches!(err, DevicedbError::NameCollision { .. }), "{reserved} gave {err:?}");
    }
}

#[test]
fn duplicate_declaration_is_rejected() {
    let err = ContainerClass::builder("Twice")
        .field(FieldSpec::new("beamline"))
        .field(FieldSpec::new("beamline"))
        .build()
        .unwrap_err();
    assert!(matches!(err, DevicedbError::Definition { .. }));
}

#[test]
fn defaults_are_stored_coerced() {
    let class = ContainerClass::builder("Stand")
        .field(FieldSpec::new("z").enforce(TypeSpec::Float).default("12.5"))
        .build()
        .unwrap();
    assert_eq!(class.field("z").unwrap().default_value(), Some(&json!(12.5)));
}

#[test]
fn mandatory_info() {
    for class in [&*ITEM, &*DEVICE] {
        for info in ["prefix", "name"] {
            assert!(class.mandatory_info().iter().any(|m| m == info), "{} lacks {info}", class.name());
        }
    }
}

#[test]
fn inherited_fields_come_first() {
    let valve = ContainerClass::builder("Valve")
        .extends(&DEVICE)
        .field(FieldSpec::new("beamline").optional(false))
        .field(FieldSpec::new("active").enforce(TypeSpec::Bool).default(false))
        .build()
        .unwrap();
    let names = valve.info_names();
    let inherited = DEVICE.info_names();
    assert_eq!(&names[..inherited.len()], &inherited[..]);
    assert_eq!(names.last(), Some(&"beamline"));
    // the redeclared field keeps its inherited position but takes the new default
    assert_eq!(valve.position("active"), DEVICE.position("active"));
    assert_eq!(valve.field("active").unwrap().default_value(), Some(&json!(false)));
    assert_eq!(valve.mandatory_info(), &["name", "prefix", "beamline"]);
    assert!(valve.is_a(&ITEM));
    assert!(!ITEM.is_a(&valve));
}

#[test]
fn inherited_mandatory_field_cannot_be_weakened() {
    for weakened in [
        FieldSpec::new("name"),
        FieldSpec::new("prefix").optional(false).default("TST:"),
    ] {
        let field = weakened.name().to_string();
        let err = ContainerClass::builder("Lenient")
            .extends(&DEVICE)
            .field(weakened)
            .build()
            .unwrap_err();
        match err {
            DevicedbError::Definition { field: rejected, .. } => assert_eq!(rejected, field),
            other => panic!("unexpected error {other:?}"),
        }
    }
    // redeclaring with a narrower constraint keeps it mandatory
    let strict = ContainerClass::builder("Strict")
        .extends(&DEVICE)
        .field(FieldSpec::new("prefix").optional(false).enforce(TypeSpec::Str))
        .build()
        .unwrap();
    assert_eq!(&strict.mandatory_info()[..2], &["name", "prefix"]);
}

#[test]
fn root_classes_still_require_identity() {
    let bare = ContainerClass::builder("Bare").build().unwrap();
    assert_eq!(bare.mandatory_info(), &["name", "prefix"]);
    let loose = ContainerClass::builder("Loose")
        .field(FieldSpec::new("name"))
        .field(FieldSpec::new("serial").optional(false))
        .build()
        .unwrap();
    assert_eq!(loose.mandatory_info(), &["name", "prefix", "serial"]);
}

#[test]
fn first_invalid_field_is_reported_in_schema_order() {
    // both are invalid, name is declared first
    let err = Container::new(
        &ITEM,
        [("active", json!("maybe")), ("name", json!("Invalid!Name"))],
    )
    .unwrap_err();
    match err {
        DevicedbError::Validation { field, .. } => assert_eq!(field, "name"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn reserved_keyword_is_rejected_on_construction() {
    let err = Container::new(&ITEM, [("_id", json!(4))]).unwrap_err();
    assert!(matches!(err, DevicedbError::NameCollision { .. }));
}

#[test]
fn keeper_keeps_first_registration() {
    let mut keeper = ClassKeeper::with_builtins();
    assert_eq!(keeper.len(), 2);
    let imposter = ContainerClass::builder("Item").build().unwrap();
    let (kept, previously_kept) = keeper.keep(Arc::clone(&imposter));
    assert!(previously_kept);
    assert!(Arc::ptr_eq(&kept, &ITEM));
    assert!(keeper.get("Device").is_some());
    assert!(keeper.get("Nothing").is_none());
}

#[test]
fn optional_without_default_is_empty() {
    let item = Container::new(&ITEM, [("name", json!("abcd")), ("prefix", json!("b"))]).unwrap();
    assert_eq!(item.get("documentation"), Some(&Value::Null));
    assert_eq!(item.get("active"), Some(&json!(true)));
}
