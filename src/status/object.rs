//! Accessors over untyped Kubernetes objects (`serde_json::Value` trees)

use kube::core::GroupVersionKind;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{Error, Result};

pub fn api_version(obj: &Value) -> Option<&str> {
    obj.get("apiVersion").and_then(Value::as_str)
}

pub fn kind(obj: &Value) -> Option<&str> {
    obj.get("kind").and_then(Value::as_str)
}

pub fn name(obj: &Value) -> Option<&str> {
    nested_str(obj, &["metadata", "name"])
}

pub fn namespace(obj: &Value) -> Option<&str> {
    nested_str(obj, &["metadata", "namespace"])
}

pub fn uid(obj: &Value) -> Option<&str> {
    nested_str(obj, &["metadata", "uid"])
}

/// GroupVersionKind of an object, from its apiVersion and kind
pub fn gvk(obj: &Value) -> Result<GroupVersionKind> {
    let api_version =
        api_version(obj).ok_or_else(|| Error::document("object has no apiVersion"))?;
    let kind = kind(obj).ok_or_else(|| Error::document("object has no kind"))?;
    let (group, version) = match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    };
    Ok(GroupVersionKind::gvk(group, version, kind))
}

/// Walk a field path through nested maps
pub fn nested<'a>(obj: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(obj, |current, field| current.get(field))
}

pub fn nested_str<'a>(obj: &'a Value, path: &[&str]) -> Option<&'a str> {
    nested(obj, path).and_then(Value::as_str)
}

pub fn nested_i64(obj: &Value, path: &[&str]) -> Option<i64> {
    nested(obj, path).and_then(Value::as_i64)
}

pub fn labels(obj: &Value) -> BTreeMap<String, String> {
    nested(obj, &["metadata", "labels"])
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// True when `obj` carries a controller owner reference with the given uid
pub fn is_controlled_by(obj: &Value, owner_uid: &str) -> bool {
    nested(obj, &["metadata", "ownerReferences"])
        .and_then(Value::as_array)
        .is_some_and(|refs| {
            refs.iter().any(|r| {
                r.get("uid").and_then(Value::as_str) == Some(owner_uid)
                    && r.get("controller").and_then(Value::as_bool).unwrap_or(false)
            })
        })
}

/// One entry of `status.conditions`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition<'a> {
    pub type_: &'a str,
    pub status: &'a str,
    pub reason: &'a str,
    pub message: &'a str,
}

impl Condition<'_> {
    pub fn is_true(&self) -> bool {
        self.status == "True"
    }

    pub fn is_false(&self) -> bool {
        self.status == "False"
    }
}

pub fn conditions(obj: &Value) -> Vec<Condition<'_>> {
    nested(obj, &["status", "conditions"])
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|c| {
                    Some(Condition {
                        type_: c.get("type")?.as_str()?,
                        status: c.get("status").and_then(Value::as_str).unwrap_or(""),
                        reason: c.get("reason").and_then(Value::as_str).unwrap_or(""),
                        message: c.get("message").and_then(Value::as_str).unwrap_or(""),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

pub fn condition<'a>(obj: &'a Value, type_: &str) -> Option<Condition<'a>> {
    conditions(obj).into_iter().find(|c| c.type_ == type_)
}
