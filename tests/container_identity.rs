use std::sync::Arc;

use devicedb::construct::{DEVICE, ITEM};
use devicedb::container::Container;
use devicedb::persist::Document;
use serde_json::{json, Value};

fn item(name: &str, prefix: &str) -> Container {
    Container::new(&ITEM, [("name", json!(name)), ("prefix", json!(prefix))]).unwrap()
}

#[test]
fn init_and_get() {
    let device = Container::new(
        &DEVICE,
        [
            ("name", json!("alias")),
            ("prefix", json!("BASE:PV")),
            ("device_class", json!("types.SimpleNamespace")),
        ],
    )
    .unwrap();
    assert_eq!(device.get("name"), Some(&json!("alias")));
    assert_eq!(device.get("prefix"), Some(&json!("BASE:PV")));
    assert_eq!(device.get("args"), Some(&json!([])));
    assert_eq!(device.class_name(), "Device");
    assert_eq!(device.to_string(), "Device (name=alias)");
}

#[test]
fn set_and_enforce() {
    let mut device = item("alias", "BASE:PV");
    device.set("name", "new_name").unwrap();
    assert_eq!(device.get("name"), Some(&json!("new_name")));
    assert!(device.set("name", "Invalid!Name").is_err());
    assert_eq!(device.get("name"), Some(&json!("new_name")));
}

#[test]
fn device_equivalance() {
    let a = item("abcd", "b");
    let b = item("abcd", "b");
    let c = item("cbcd", "b");
    assert_eq!(a, b);
    assert_ne!(c, a);
}

#[test]
fn dictify() {
    let a = item("abcd", "b");
    let dict: Document = a.iter().collect();
    assert_eq!(dict, a.post());
    let by_ref: Document = (&a).into_iter().collect();
    assert_eq!(by_ref, a.post());
}

#[test]
fn post() {
    let a = item("abcd", "b");
    let post = a.post();
    assert_eq!(post["name"], json!("abcd"));
    assert_eq!(post["prefix"], json!("b"));
    assert_eq!(post["type"], json!("Item"));
    // unbound containers carry no store identity
    assert!(!post.contains_key("_id"));
    for name in a.info_names() {
        assert!(post.contains_key(name), "{name} missing from post");
    }
    assert_eq!(serde_json::to_value(&a).unwrap(), Value::Object(post));
}

#[test]
fn extraneous_data_is_kept_verbatim() {
    let mut a = Container::new(
        &ITEM,
        [
            ("name", json!("abcd")),
            ("prefix", json!("b")),
            ("beamline", json!({"hutch": "MFX", "z": 3})),
        ],
    )
    .unwrap();
    assert_eq!(a.post()["beamline"], json!({"hutch": "MFX", "z": 3}));
    a.set("stand", "DG2").unwrap();
    let extra: Vec<&str> = a.extraneous().map(|(k, _)| k).collect();
    assert_eq!(extra, ["beamline", "stand"]);
    assert_eq!(a.post()["stand"], json!("DG2"));
}

#[test]
fn device_copy() {
    let a = item("abcd", "b");
    let b = a.shallow_copy();
    let dict_a: Document = a.iter().collect();
    let dict_b: Document = b.iter().collect();
    assert_eq!(dict_a, dict_b);
    // shallow copies share nested storage
    assert!(Arc::ptr_eq(a.shared("kwargs").unwrap(), b.shared("kwargs").unwrap()));
}

#[test]
fn device_deepcopy() {
    let a = Container::new(
        &ITEM,
        [
            ("name", json!("abcd")),
            ("prefix", json!("abc")),
            ("kwargs", json!({"abc": "def"})),
        ],
    )
    .unwrap();
    let c = a.deep_copy();
    assert_eq!(a.get("kwargs"), c.get("kwargs"));
    assert!(!Arc::ptr_eq(a.shared("kwargs").unwrap(), c.shared("kwargs").unwrap()));
    assert_eq!(a, c);
}

#[test]
fn copies_do_not_see_later_writes() {
    let a = item("abcd", "b");
    let mut b = a.shallow_copy();
    b.set("kwargs", json!({"changed": true})).unwrap();
    assert_eq!(a.get("kwargs"), Some(&json!({})));
    assert_ne!(a, b);
}

#[test]
fn show_info() {
    let a = Container::new(
        &DEVICE,
        [
            ("name", json!("abcd")),
            ("prefix", json!("b")),
            ("location", json!("hutch")),
        ],
    )
    .unwrap();
    let mut out = Vec::new();
    a.show_info(&mut out).unwrap();
    let out = String::from_utf8(out).unwrap();
    assert!(!out.contains("_id"));
    for info in a.info_names() {
        assert!(out.contains(info), "{info} missing from:\n{out}");
    }
    assert!(out.contains("location"));
    assert!(out.contains("hutch"));
}

#[test]
fn missing_info_lists_empty_mandatory_fields() {
    let a = Container::new(&ITEM, [("name", json!("abcd"))]).unwrap();
    assert_eq!(a.missing_info(), ["prefix"]);
}
