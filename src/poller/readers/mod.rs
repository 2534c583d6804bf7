// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Status readers: per-kind strategies turning a live object into a
//! [`ResourceStatus`].
//!
//! Workload readers delegate to the reader of the kind they generate, so a
//! Deployment consults its ReplicaSets, which in turn consult their Pods.

pub mod custom;
pub mod generic;
pub mod workload;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::cluster_reader::ClusterReader;
use super::event::ResourceStatus;
use crate::error::Result;
use crate::kubernetes::RestMapper;
use crate::kubernetes::selector::workload_selector;
use crate::status::{ComputedStatus, GroupKind, ObjMetadata, Status, object};

pub use custom::CustomResourceReader;
pub use generic::GenericStatusReader;
pub use workload::WorkloadStatusReader;

#[async_trait]
pub trait StatusReader: Send + Sync {
    /// Look the resource up through the cluster reader and compute its status
    async fn read_status(&self, identifier: &ObjMetadata) -> ResourceStatus;

    /// Compute the status of an object already in hand
    async fn read_status_for_object(&self, obj: &Value) -> ResourceStatus;
}

/// Kinds whose objects a workload of `group_kind` generates, in lookup order
pub fn generated_kinds(group_kind: &GroupKind) -> Vec<GroupKind> {
    let replica_set = || GroupKind::new("apps", "ReplicaSet");
    let pod = || GroupKind::new("", "Pod");
    match (group_kind.group.as_str(), group_kind.kind.as_str()) {
        ("apps", "Deployment") => vec![replica_set(), pod()],
        ("apps", "ReplicaSet") | ("apps", "StatefulSet") => vec![pod()],
        _ => Vec::new(),
    }
}

/// Fetch the object behind an identifier, failing early on unmapped kinds
pub(crate) async fn lookup(
    reader: &dyn ClusterReader,
    mapper: &RestMapper,
    identifier: &ObjMetadata,
) -> Result<Value> {
    mapper.rest_mapping(&identifier.group_kind, None)?;
    reader
        .get(&identifier.group_kind, &identifier.namespace, &identifier.name)
        .await
}

/// Identifier of a live object, tolerating missing fields
pub(crate) fn identifier_of(obj: &Value) -> ObjMetadata {
    ObjMetadata::from_object(obj).unwrap_or_else(|_| {
        ObjMetadata::new(
            GroupKind::from_api_version(
                object::api_version(obj).unwrap_or_default(),
                object::kind(obj).unwrap_or_default(),
            ),
            object::namespace(obj).unwrap_or_default(),
            object::name(obj).unwrap_or_default(),
        )
    })
}

/// Statuses of the `child_kind` objects selected and controlled by `owner`
pub(crate) async fn generated_statuses(
    reader: &dyn ClusterReader,
    child_reader: &Arc<dyn StatusReader>,
    owner: &Value,
    child_kind: &GroupKind,
) -> Result<Vec<ResourceStatus>> {
    let Some(selector) = workload_selector(owner)? else {
        return Ok(Vec::new());
    };
    let namespace = object::namespace(owner).unwrap_or_default();
    let children = reader
        .list_namespaced(child_kind, namespace, Some(&selector))
        .await?;

    let owner_uid = object::uid(owner);
    let mut statuses = Vec::new();
    for child in children
        .iter()
        .filter(|c| owner_uid.is_none_or(|uid| object::is_controlled_by(c, uid)))
    {
        statuses.push(child_reader.read_status_for_object(child).await);
    }
    statuses.sort_by(|a, b| a.identifier.cmp(&b.identifier));
    Ok(statuses)
}

/// Fold the statuses of generated objects into the workload's own status
pub(crate) fn aggregate(own: ComputedStatus, generated: &[ResourceStatus]) -> ComputedStatus {
    if own.status != Status::CURRENT {
        return own;
    }
    let pending = generated
        .iter()
        .filter(|g| g.status != Status::CURRENT)
        .count();
    if pending == 0 {
        return own;
    }
    ComputedStatus::in_progress(format!(
        "Waiting for {} of {} generated resources",
        pending,
        generated.len()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child(status: Status) -> ResourceStatus {
        ResourceStatus::new(
            ObjMetadata::new(GroupKind::new("", "Pod"), "ns", "p"),
            ComputedStatus::new(status, ""),
        )
    }

    #[test]
    fn test_generated_kinds() {
        assert_eq!(
            generated_kinds(&GroupKind::new("apps", "Deployment")),
            vec![GroupKind::new("apps", "ReplicaSet"), GroupKind::new("", "Pod")]
        );
        assert_eq!(
            generated_kinds(&GroupKind::new("apps", "StatefulSet")),
            vec![GroupKind::new("", "Pod")]
        );
        assert!(generated_kinds(&GroupKind::new("example.com", "Resource")).is_empty());
    }

    #[test]
    fn test_aggregate() {
        let own = ComputedStatus::current("ready");
        assert_eq!(aggregate(own.clone(), &[]), own);
        assert_eq!(aggregate(own.clone(), &[child(Status::CURRENT)]), own);

        let waiting = aggregate(
            own.clone(),
            &[child(Status::CURRENT), child(Status::IN_PROGRESS)],
        );
        assert_eq!(waiting.status, Status::IN_PROGRESS);
        assert_eq!(waiting.message, "Waiting for 1 of 2 generated resources");

        // the workload's own non-current status wins
        let failed = ComputedStatus::failed("deadline");
        assert_eq!(aggregate(failed.clone(), &[child(Status::CURRENT)]), failed);
    }

    #[test]
    fn test_identifier_of_partial_object() {
        let id = identifier_of(&serde_json::json!({"kind": "Thing"}));
        assert_eq!(id.group_kind, GroupKind::new("", "Thing"));
        assert!(id.name.is_empty());
    }
}
