// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Resource status model
//!
//! Status names are not a closed set: custom resources define their own
//! through the status-check annotation, so [`Status`] is an open string label
//! with a handful of well-known values used by the built-in readers.

pub mod compute;
pub mod expression;
pub mod object;
pub mod status_map;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;

use crate::error::{Error, Result};

pub use compute::{ComputedStatus, StatusFunc};
pub use expression::Expression;
pub use status_map::StatusMap;

/// Opaque status label, e.g. "Stable", "Pending", "Current"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Status(Cow<'static, str>);

impl Status {
    /// Reserved default when nothing matched
    pub const UNKNOWN: Status = Status(Cow::Borrowed("Unknown"));
    pub const CURRENT: Status = Status(Cow::Borrowed("Current"));
    pub const IN_PROGRESS: Status = Status(Cow::Borrowed("InProgress"));
    pub const FAILED: Status = Status(Cow::Borrowed("Failed"));
    pub const TERMINATING: Status = Status(Cow::Borrowed("Terminating"));
    pub const NOT_FOUND: Status = Status(Cow::Borrowed("NotFound"));

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Status {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// API group plus kind, the key status readers are registered under
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKind {
    pub group: String,
    pub kind: String,
}

impl GroupKind {
    pub fn new(group: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
        }
    }

    /// Build from an apiVersion ("apps/v1", "v1") and kind
    pub fn from_api_version(api_version: &str, kind: &str) -> Self {
        let group = match api_version.split_once('/') {
            Some((group, _)) => group,
            None => "",
        };
        Self::new(group, kind)
    }

    /// GroupKind of an untyped object
    pub fn of(obj: &Value) -> Result<Self> {
        let api_version = object::api_version(obj)
            .ok_or_else(|| Error::document("object has no apiVersion"))?;
        let kind = object::kind(obj).ok_or_else(|| Error::document("object has no kind"))?;
        Ok(Self::from_api_version(api_version, kind))
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}.{}", self.kind, self.group)
        }
    }
}

/// Identifies one watched resource. `namespace` is empty for cluster-scoped kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjMetadata {
    pub group_kind: GroupKind,
    pub name: String,
    pub namespace: String,
}

impl ObjMetadata {
    pub fn new(
        group_kind: GroupKind,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            group_kind,
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// Identifier of an untyped object (document or live resource)
    pub fn from_object(obj: &Value) -> Result<Self> {
        let group_kind = GroupKind::of(obj)?;
        let name = object::name(obj)
            .ok_or_else(|| Error::document(format!("{} has no metadata.name", group_kind)))?;
        Ok(Self::new(
            group_kind,
            object::namespace(obj).unwrap_or_default(),
            name,
        ))
    }
}

impl fmt::Display for ObjMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}/{}", self.group_kind, self.name)
        } else {
            write!(f, "{}/{}/{}", self.group_kind, self.namespace, self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_well_known() {
        assert_eq!(Status::default(), Status::UNKNOWN);
        assert_eq!(Status::new("Current"), Status::CURRENT);
        assert_eq!(Status::from("Stable").to_string(), "Stable");
    }

    #[test]
    fn test_status_serde_transparent() {
        let json = serde_json::to_string(&Status::IN_PROGRESS).unwrap();
        assert_eq!(json, r#""InProgress""#);
        let parsed: Status = serde_json::from_str(r#""Pending""#).unwrap();
        assert_eq!(parsed, Status::new("Pending"));
    }

    #[test]
    fn test_group_kind_from_api_version() {
        assert_eq!(
            GroupKind::from_api_version("apps/v1", "Deployment"),
            GroupKind::new("apps", "Deployment")
        );
        assert_eq!(
            GroupKind::from_api_version("v1", "Pod"),
            GroupKind::new("", "Pod")
        );
        assert_eq!(GroupKind::new("apps", "Deployment").to_string(), "Deployment.apps");
        assert_eq!(GroupKind::new("", "Pod").to_string(), "Pod");
    }

    #[test]
    fn test_obj_metadata_from_object() {
        let obj = json!({
            "apiVersion": "example.com/v1",
            "kind": "Resource",
            "metadata": {"name": "stable-resource", "namespace": "target-infra"}
        });
        let id = ObjMetadata::from_object(&obj).unwrap();
        assert_eq!(id.group_kind, GroupKind::new("example.com", "Resource"));
        assert_eq!(id.name, "stable-resource");
        assert_eq!(id.namespace, "target-infra");
        assert_eq!(id.to_string(), "Resource.example.com/target-infra/stable-resource");
    }

    #[test]
    fn test_obj_metadata_requires_name() {
        let obj = json!({"apiVersion": "v1", "kind": "Namespace", "metadata": {}});
        let err = ObjMetadata::from_object(&obj).unwrap_err();
        assert!(matches!(err, Error::Document { .. }));
    }
}
