// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Deployment, ReplicaSet and StatefulSet readers

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::{StatusReader, aggregate, generated_statuses, identifier_of, lookup};
use crate::kubernetes::RestMapper;
use crate::poller::cluster_reader::ClusterReader;
use crate::poller::event::ResourceStatus;
use crate::status::{GroupKind, ObjMetadata, compute};

/// Reader for a workload kind whose status also depends on the objects it
/// generates, read through `child_reader`
pub struct WorkloadStatusReader {
    reader: Arc<dyn ClusterReader>,
    mapper: Arc<RestMapper>,
    child_kind: GroupKind,
    child_reader: Arc<dyn StatusReader>,
}

impl WorkloadStatusReader {
    /// Deployments track their ReplicaSets
    pub fn deployment(
        reader: Arc<dyn ClusterReader>,
        mapper: Arc<RestMapper>,
        replica_set_reader: Arc<dyn StatusReader>,
    ) -> Self {
        Self {
            reader,
            mapper,
            child_kind: GroupKind::new("apps", "ReplicaSet"),
            child_reader: replica_set_reader,
        }
    }

    /// ReplicaSets track their Pods
    pub fn replica_set(
        reader: Arc<dyn ClusterReader>,
        mapper: Arc<RestMapper>,
        pod_reader: Arc<dyn StatusReader>,
    ) -> Self {
        Self {
            reader,
            mapper,
            child_kind: GroupKind::new("", "Pod"),
            child_reader: pod_reader,
        }
    }

    /// StatefulSets track their Pods
    pub fn stateful_set(
        reader: Arc<dyn ClusterReader>,
        mapper: Arc<RestMapper>,
        pod_reader: Arc<dyn StatusReader>,
    ) -> Self {
        Self {
            reader,
            mapper,
            child_kind: GroupKind::new("", "Pod"),
            child_reader: pod_reader,
        }
    }
}

#[async_trait]
impl StatusReader for WorkloadStatusReader {
    async fn read_status(&self, identifier: &ObjMetadata) -> ResourceStatus {
        match lookup(self.reader.as_ref(), &self.mapper, identifier).await {
            Ok(obj) => self.read_status_for_object(&obj).await,
            Err(e) => ResourceStatus::from_error(identifier.clone(), e),
        }
    }

    async fn read_status_for_object(&self, obj: &Value) -> ResourceStatus {
        let identifier = identifier_of(obj);
        let generated = match generated_statuses(
            self.reader.as_ref(),
            &self.child_reader,
            obj,
            &self.child_kind,
        )
        .await
        {
            Ok(generated) => generated,
            Err(e) => return ResourceStatus::unknown(identifier, e).with_resource(obj),
        };

        let own = match compute::compute(obj) {
            Ok(own) => own,
            Err(e) => return ResourceStatus::unknown(identifier, e).with_resource(obj),
        };

        let mut status =
            ResourceStatus::new(identifier, aggregate(own, &generated)).with_resource(obj);
        status.generated_resources = generated;
        status
    }
}
