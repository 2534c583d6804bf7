// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Status tables derived from CustomResourceDefinition annotations
//!
//! A CRD opts in by carrying the [`STATUS_CHECK_ANNOTATION`] annotation, whose
//! value is a JSON array of `{"status": ..., "condition": ...}` entries:
//!
//! ```yaml
//! metadata:
//!   annotations:
//!     airshipit.org/status-check: |
//!       [
//!         {"status": "Stable",  "condition": "@.status.state==\"stable\""},
//!         {"status": "Pending", "condition": "@.status.state==\"pending\""}
//!       ]
//! ```
//!
//! Entries are tried in declaration order and the first matching condition
//! names the status. An object matching none of them is `Unknown`.

use kube::core::{GroupVersionKind, GroupVersionResource};
use kube::discovery::Scope;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

use super::compute::{ComputedStatus, StatusFunc};
use super::expression::{Expression, Outcome};
use super::object::{self, nested, nested_str};
use super::{GroupKind, Status};
use crate::bundle::{self, Bundle};
use crate::error::{Error, Result};
use crate::kubernetes::{ClusterClient, DEFAULT_NAMESPACE, RestMapper};

pub const STATUS_CHECK_ANNOTATION: &str = "airshipit.org/status-check";

/// One `(status, condition)` pair of a CRD's status-check annotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCheck {
    pub status: Status,
    pub expression: Expression,
}

/// Raw annotation entry; absent and empty fields are both rejected
#[derive(Deserialize)]
struct RawStatusCheck {
    #[serde(default)]
    status: String,
    #[serde(default)]
    condition: String,
}

/// Parse a status-check annotation value, compiling every condition
pub fn parse_status_checks(raw: &str) -> Result<Vec<StatusCheck>> {
    let entries: Vec<RawStatusCheck> = serde_json::from_str(raw).map_err(|e| {
        Error::invalid_status_check(format!("unable to parse jsonpath: {:?}: {}", raw, e))
    })?;

    let mut checks: Vec<StatusCheck> = Vec::with_capacity(entries.len());
    for entry in entries {
        if entry.status.is_empty() {
            return Err(Error::invalid_status_check("missing status field"));
        }
        if entry.condition.is_empty() {
            return Err(Error::invalid_status_check("missing condition field"));
        }

        let check = StatusCheck {
            status: Status::new(entry.status),
            expression: Expression::new(entry.condition),
        };
        check.expression.compile()?;

        // A repeated status keeps its first position with the newer condition
        match checks.iter_mut().find(|c| c.status == check.status) {
            Some(existing) => existing.expression = check.expression,
            None => checks.push(check),
        }
    }
    Ok(checks)
}

/// Resource -> ordered status checks, plus the REST mapping of every kind in it.
///
/// Immutable once built; share it behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct StatusMap {
    mapping: HashMap<GroupVersionResource, Arc<Vec<StatusCheck>>>,
    group_kinds: Vec<GroupKind>,
    rest_mapper: RestMapper,
}

impl StatusMap {
    /// Build from the CRDs contained in a bundle
    pub fn new(bundle: &Bundle) -> Result<Self> {
        Self::from_crds(bundle.crds())
    }

    pub fn from_crds<'a>(crds: impl IntoIterator<Item = &'a Value>) -> Result<Self> {
        let mut map = Self::default();
        for crd in crds {
            map.add_crd(crd)?;
        }
        debug!(
            kinds = map.group_kinds.len(),
            resources = map.mapping.len(),
            "Built status map"
        );
        Ok(map)
    }

    /// Build from the CRDs installed on the cluster
    pub async fn from_cluster(client: &dyn ClusterClient) -> Result<Self> {
        let builtin = RestMapper::builtin();
        let crd_kind = GroupKind::new("apiextensions.k8s.io", bundle::CRD_KIND);
        let mapping = builtin.rest_mapping(&crd_kind, None)?;
        let crds = client.list(&mapping.api_resource, None).await?;
        Self::from_crds(&crds)
    }

    fn add_crd(&mut self, crd: &Value) -> Result<()> {
        let Some(raw) = nested_str(crd, &["metadata", "annotations", STATUS_CHECK_ANNOTATION])
        else {
            return Ok(());
        };
        let crd_name = object::name(crd).unwrap_or("<unnamed>");
        trace!(crd = %crd_name, "Parsing status checks");
        let checks = Arc::new(parse_status_checks(raw)?);

        let missing = |field: &str| Error::document(format!("CRD {} has no {}", crd_name, field));
        let group = nested_str(crd, &["spec", "group"]).ok_or_else(|| missing("spec.group"))?;
        let kind =
            nested_str(crd, &["spec", "names", "kind"]).ok_or_else(|| missing("spec.names.kind"))?;
        let plural = nested_str(crd, &["spec", "names", "plural"])
            .ok_or_else(|| missing("spec.names.plural"))?;
        let scope = match nested_str(crd, &["spec", "scope"]) {
            Some("Cluster") => Scope::Cluster,
            _ => Scope::Namespaced,
        };

        let versions = served_versions(crd);
        if versions.is_empty() {
            return Err(missing("served versions"));
        }
        for version in versions {
            let gvk = GroupVersionKind::gvk(group, version, kind);
            self.rest_mapper.add(&gvk, plural, scope.clone());
            self.mapping.insert(
                GroupVersionResource::gvr(group, version, plural),
                checks.clone(),
            );
        }

        let group_kind = GroupKind::new(group, kind);
        if !self.group_kinds.contains(&group_kind) {
            self.group_kinds.push(group_kind);
        }
        Ok(())
    }

    /// Status of the live counterpart of `document`.
    ///
    /// Fails with [`Error::ResourceNotFound`] when the document's kind is not
    /// one of the annotated CRD kinds.
    pub async fn get_status_for_resource(
        &self,
        client: &dyn ClusterClient,
        document: &Value,
    ) -> Result<Status> {
        let name = object::name(document).unwrap_or_default();
        let gvk = object::gvk(document)?;
        let group_kind = GroupKind::new(&gvk.group, &gvk.kind);
        let mapping = self
            .rest_mapper
            .rest_mapping(&group_kind, Some(gvk.version.as_str()))
            .map_err(|_| Error::ResourceNotFound {
                resource: name.to_string(),
            })?;

        let namespace = if mapping.is_namespaced() {
            Some(object::namespace(document).unwrap_or(DEFAULT_NAMESPACE))
        } else {
            None
        };
        let live = client.get(&mapping.api_resource, namespace, name).await?;
        self.match_checks(&mapping.gvr(), &live)
    }

    /// Status of an object already fetched from the cluster
    pub fn compute_status(&self, obj: &Value) -> Result<ComputedStatus> {
        let gvk = object::gvk(obj)?;
        let group_kind = GroupKind::new(&gvk.group, &gvk.kind);
        let mapping = self
            .rest_mapper
            .rest_mapping(&group_kind, Some(gvk.version.as_str()))?;
        let status = self.match_checks(&mapping.gvr(), obj)?;
        let message = if status == Status::UNKNOWN {
            format!("{} matches no status check", gvk.kind)
        } else {
            format!("{} is {}", gvk.kind, status)
        };
        Ok(ComputedStatus::new(status, message))
    }

    fn match_checks(&self, gvr: &GroupVersionResource, obj: &Value) -> Result<Status> {
        let Some(checks) = self.mapping.get(gvr) else {
            return Ok(Status::UNKNOWN);
        };
        for check in checks.iter() {
            match check.expression.evaluate(obj)? {
                Outcome::Matched => return Ok(check.status.clone()),
                Outcome::NotMatched => {}
                Outcome::FieldNotFound(field) => {
                    trace!(
                        status = %check.status,
                        field = %field,
                        "Condition field absent, treating as not matched"
                    );
                }
            }
        }
        Ok(Status::UNKNOWN)
    }

    /// [`Self::compute_status`] as a [`StatusFunc`]
    pub fn status_func(self: &Arc<Self>) -> StatusFunc {
        let map = Arc::clone(self);
        Arc::new(move |obj: &Value| map.compute_status(obj))
    }

    /// Kinds with status checks, in CRD order
    pub fn group_kinds(&self) -> &[GroupKind] {
        &self.group_kinds
    }

    pub fn contains(&self, group_kind: &GroupKind) -> bool {
        self.group_kinds.contains(group_kind)
    }

    pub fn rest_mapper(&self) -> &RestMapper {
        &self.rest_mapper
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

/// Served versions of a v1 or v1beta1 CRD
fn served_versions(crd: &Value) -> Vec<&str> {
    let listed: Vec<&str> = nested(crd, &["spec", "versions"])
        .and_then(Value::as_array)
        .map(|versions| {
            versions
                .iter()
                .filter(|v| v.get("served").and_then(Value::as_bool) != Some(false))
                .filter_map(|v| v.get("name").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();
    if !listed.is_empty() {
        return listed;
    }
    // v1beta1 single-version form
    nested_str(crd, &["spec", "version"]).into_iter().collect()
}
