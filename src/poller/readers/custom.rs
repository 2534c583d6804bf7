// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Reader for annotated custom resources and per-run condition overrides

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::{StatusReader, identifier_of, lookup};
use crate::kubernetes::RestMapper;
use crate::poller::cluster_reader::ClusterReader;
use crate::poller::event::ResourceStatus;
use crate::status::{ComputedStatus, Expression, GroupKind, ObjMetadata, StatusFunc};

pub struct CustomResourceReader {
    reader: Arc<dyn ClusterReader>,
    mapper: Arc<RestMapper>,
    status_func: StatusFunc,
    overrides: HashMap<GroupKind, Expression>,
}

impl CustomResourceReader {
    pub fn new(
        reader: Arc<dyn ClusterReader>,
        mapper: Arc<RestMapper>,
        status_func: StatusFunc,
        overrides: HashMap<GroupKind, Expression>,
    ) -> Self {
        Self {
            reader,
            mapper,
            status_func,
            overrides,
        }
    }

    fn read_override(
        &self,
        identifier: ObjMetadata,
        expression: &Expression,
        obj: &Value,
    ) -> ResourceStatus {
        match expression.matches(obj) {
            Ok(true) => ResourceStatus::new(
                identifier,
                ComputedStatus::current(format!(
                    "Resource matches condition '{}'",
                    expression.condition()
                )),
            )
            .with_resource(obj),
            Ok(false) => ResourceStatus::new(
                identifier,
                ComputedStatus::in_progress(format!(
                    "Resource has not reached condition '{}' yet",
                    expression.condition()
                )),
            )
            .with_resource(obj),
            Err(e) => ResourceStatus::unknown(identifier, e),
        }
    }
}

#[async_trait]
impl StatusReader for CustomResourceReader {
    async fn read_status(&self, identifier: &ObjMetadata) -> ResourceStatus {
        match lookup(self.reader.as_ref(), &self.mapper, identifier).await {
            Ok(obj) => self.read_status_for_object(&obj).await,
            Err(e) => ResourceStatus::from_error(identifier.clone(), e),
        }
    }

    async fn read_status_for_object(&self, obj: &Value) -> ResourceStatus {
        let identifier = identifier_of(obj);
        if let Some(expression) = self.overrides.get(&identifier.group_kind) {
            return self.read_override(identifier, expression, obj);
        }
        match (self.status_func)(obj) {
            Ok(computed) => ResourceStatus::new(identifier, computed).with_resource(obj),
            Err(e) => ResourceStatus::unknown(identifier, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::Bundle;
    use crate::kubernetes::fake::FakeClient;
    use crate::poller::cluster_reader::DirectClusterReader;
    use crate::status::{Status, StatusMap};
    use serde_json::json;

    const CRD: &str = r#"
apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: resources.example.com
  annotations:
    airshipit.org/status-check: |
      [
        {"status": "Stable", "condition": "@.status.state==\"stable\""},
        {"status": "Pending", "condition": "@.status.state==\"pending\""}
      ]
spec:
  group: example.com
  names:
    kind: Resource
    plural: resources
  scope: Namespaced
  versions:
    - name: v1
      served: true
      storage: true
"#;

    fn resource(name: &str, state: &str) -> Value {
        json!({
            "apiVersion": "example.com/v1",
            "kind": "Resource",
            "metadata": {"name": name, "namespace": "target-infra"},
            "status": {"state": state}
        })
    }

    fn id(name: &str) -> ObjMetadata {
        ObjMetadata::new(GroupKind::new("example.com", "Resource"), "target-infra", name)
    }

    fn reader(overrides: HashMap<GroupKind, Expression>) -> CustomResourceReader {
        let mut bundle = Bundle::default();
        bundle.parse_str(CRD).unwrap();
        let status_map = Arc::new(StatusMap::new(&bundle).unwrap());

        let mut mapper = RestMapper::builtin();
        mapper.merge(status_map.rest_mapper());
        let mapper = Arc::new(mapper);

        let client = FakeClient::with_objects([
            resource("stable-resource", "stable"),
            resource("pending-resource", "pending"),
            json!({
                "apiVersion": "example.com/v1", "kind": "Resource",
                "metadata": {"name": "broken", "namespace": "target-infra"},
                "status": {"state": 7}
            }),
        ]);
        let cluster = Arc::new(DirectClusterReader::new(Arc::new(client), mapper.clone()));
        CustomResourceReader::new(cluster, mapper, status_map.status_func(), overrides)
    }

    #[tokio::test]
    async fn test_status_from_status_map() {
        let reader = reader(HashMap::new());
        let stable = reader.read_status(&id("stable-resource")).await;
        assert_eq!(stable.status, Status::new("Stable"));
        assert_eq!(stable.message, "Resource is Stable");

        let pending = reader.read_status(&id("pending-resource")).await;
        assert_eq!(pending.status, Status::new("Pending"));
    }

    #[tokio::test]
    async fn test_not_found() {
        let status = reader(HashMap::new()).read_status(&id("missing-resource")).await;
        assert_eq!(status.status, Status::NOT_FOUND);
        assert!(status.error.is_none());
    }

    #[tokio::test]
    async fn test_status_func_error_is_unknown() {
        // comparing a number against a string is an evaluation error
        let status = reader(HashMap::new()).read_status(&id("broken")).await;
        assert_eq!(status.status, Status::UNKNOWN);
        assert!(status.error.is_some());
    }

    #[tokio::test]
    async fn test_override_takes_precedence() {
        let overrides = HashMap::from([(
            GroupKind::new("example.com", "Resource"),
            Expression::new(r#"@.status.state=="pending""#),
        )]);
        let reader = reader(overrides);

        let pending = reader.read_status(&id("pending-resource")).await;
        assert_eq!(pending.status, Status::CURRENT);

        let stable = reader.read_status(&id("stable-resource")).await;
        assert_eq!(stable.status, Status::IN_PROGRESS);
        assert!(stable.message.contains("has not reached condition"));
    }

    #[tokio::test]
    async fn test_override_error_is_unknown() {
        let overrides = HashMap::from([(
            GroupKind::new("example.com", "Resource"),
            Expression::new("@.status.missing=='x'"),
        )]);
        let status = reader(overrides).read_status(&id("stable-resource")).await;
        assert_eq!(status.status, Status::UNKNOWN);
        assert!(status.error.is_some());
    }
}
