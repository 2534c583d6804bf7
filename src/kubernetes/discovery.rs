// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! REST mapping for Kubernetes kinds.
//!
//! Translates a GroupKind (plus optional version) into the addressable
//! resource (plural name, scope) needed to talk to the API server. Built-in
//! kinds come from k8s-openapi type information, custom kinds are added from
//! CRD documents or discovered at runtime.

use kube::Client;
use kube::core::{GroupVersionKind, GroupVersionResource};
use kube::discovery::{ApiResource, Discovery, Scope};
use std::collections::HashMap;
use tracing::debug;

use crate::error::{Error, Result};
use crate::status::GroupKind;

/// Namespace used for namespaced kinds identified without one
pub const DEFAULT_NAMESPACE: &str = "default";

/// One served version of a kind
#[derive(Debug, Clone)]
pub struct RestMapping {
    pub api_resource: ApiResource,
    pub scope: Scope,
}

impl RestMapping {
    pub fn new(gvk: &GroupVersionKind, plural: &str, scope: Scope) -> Self {
        Self {
            api_resource: ApiResource::from_gvk_with_plural(gvk, plural),
            scope,
        }
    }

    pub fn is_namespaced(&self) -> bool {
        self.scope == Scope::Namespaced
    }

    pub fn gvr(&self) -> GroupVersionResource {
        GroupVersionResource::gvr(
            &self.api_resource.group,
            &self.api_resource.version,
            &self.api_resource.plural,
        )
    }

    pub fn group_kind(&self) -> GroupKind {
        GroupKind::new(&self.api_resource.group, &self.api_resource.kind)
    }
}

/// Kind to resource table. The first version registered for a kind is the
/// one used when the caller does not ask for a specific version.
#[derive(Debug, Clone, Default)]
pub struct RestMapper {
    by_group_kind: HashMap<GroupKind, Vec<RestMapping>>,
}

impl RestMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a version of a kind, replacing an earlier registration of the
    /// same version
    pub fn add(&mut self, gvk: &GroupVersionKind, plural: &str, scope: Scope) {
        self.insert(RestMapping::new(gvk, plural, scope));
    }

    fn insert(&mut self, mapping: RestMapping) {
        let versions = self.by_group_kind.entry(mapping.group_kind()).or_default();
        match versions
            .iter_mut()
            .find(|m| m.api_resource.version == mapping.api_resource.version)
        {
            Some(existing) => *existing = mapping,
            None => versions.push(mapping),
        }
    }

    /// Resolve a kind, optionally pinned to a version
    pub fn rest_mapping(
        &self,
        group_kind: &GroupKind,
        version: Option<&str>,
    ) -> Result<&RestMapping> {
        let no_mapping = || Error::NoMapping {
            group_kind: group_kind.to_string(),
        };
        let versions = self.by_group_kind.get(group_kind).ok_or_else(no_mapping)?;
        match version {
            Some(version) => versions
                .iter()
                .find(|m| m.api_resource.version == version)
                .ok_or_else(no_mapping),
            None => versions.first().ok_or_else(no_mapping),
        }
    }

    /// Add every mapping of `other`; its registrations win on conflicts
    pub fn merge(&mut self, other: &RestMapper) {
        for mapping in other.by_group_kind.values().flatten() {
            self.insert(mapping.clone());
        }
    }

    /// Mapper for the built-in kinds using k8s-openapi types (no discovery, instant startup)
    ///
    /// This uses compile-time type information from k8s-openapi, so it automatically
    /// stays in sync with the Kubernetes API version we're building against.
    pub fn builtin() -> Self {
        use k8s_openapi::api::{
            apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet},
            autoscaling::v2::HorizontalPodAutoscaler,
            batch::v1::{CronJob, Job},
            core::v1::{
                ConfigMap, Endpoints, LimitRange, Namespace, Node, PersistentVolume,
                PersistentVolumeClaim, Pod, ResourceQuota, Secret, Service, ServiceAccount,
            },
            networking::v1::{Ingress, NetworkPolicy},
            policy::v1::PodDisruptionBudget,
            rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding},
            storage::v1::StorageClass,
        };
        use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
        use kube::Resource;

        let mut mapper = RestMapper::new();

        // The Resource trait's Scope is an associated type, so scope is spelled out
        macro_rules! add_kind {
            ($type:ty, namespaced) => {{
                add_kind!(@inner $type, Scope::Namespaced)
            }};
            ($type:ty, cluster) => {{
                add_kind!(@inner $type, Scope::Cluster)
            }};
            (@inner $type:ty, $scope:expr) => {{
                let gvk = GroupVersionKind::gvk(
                    &<$type>::group(&()),
                    &<$type>::version(&()),
                    &<$type>::kind(&()),
                );
                mapper.add(&gvk, &<$type>::plural(&()), $scope);
            }};
        }

        // Core API (v1)
        add_kind!(Pod, namespaced);
        add_kind!(Service, namespaced);
        add_kind!(ConfigMap, namespaced);
        add_kind!(Secret, namespaced);
        add_kind!(ServiceAccount, namespaced);
        add_kind!(Endpoints, namespaced);
        add_kind!(PersistentVolumeClaim, namespaced);
        add_kind!(ResourceQuota, namespaced);
        add_kind!(LimitRange, namespaced);
        add_kind!(Node, cluster);
        add_kind!(Namespace, cluster);
        add_kind!(PersistentVolume, cluster);

        // Workloads
        add_kind!(Deployment, namespaced);
        add_kind!(StatefulSet, namespaced);
        add_kind!(DaemonSet, namespaced);
        add_kind!(ReplicaSet, namespaced);
        add_kind!(Job, namespaced);
        add_kind!(CronJob, namespaced);

        add_kind!(Ingress, namespaced);
        add_kind!(NetworkPolicy, namespaced);
        add_kind!(HorizontalPodAutoscaler, namespaced);
        add_kind!(PodDisruptionBudget, namespaced);
        add_kind!(StorageClass, cluster);

        add_kind!(Role, namespaced);
        add_kind!(RoleBinding, namespaced);
        add_kind!(ClusterRole, cluster);
        add_kind!(ClusterRoleBinding, cluster);

        add_kind!(CustomResourceDefinition, cluster);

        mapper
    }

    /// Query the discovery API for every served kind (including CRDs).
    ///
    /// Slow on large clusters; only the preferred version of each group is
    /// recorded.
    pub async fn discover(client: &Client) -> Result<Self> {
        let discovery = Discovery::new(client.clone()).run().await?;
        let mut mapper = RestMapper::new();

        for group in discovery.groups() {
            for (ar, caps) in group.recommended_resources() {
                // Skip subresources (e.g., pods/log, pods/exec)
                if ar.plural.contains('/') {
                    continue;
                }
                mapper.insert(RestMapping {
                    api_resource: ar,
                    scope: caps.scope,
                });
            }
        }

        debug!(kinds = mapper.by_group_kind.len(), "Discovered API resources");
        Ok(mapper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_kinds() {
        let mapper = RestMapper::builtin();
        let deploy = mapper
            .rest_mapping(&GroupKind::new("apps", "Deployment"), None)
            .unwrap();
        assert_eq!(deploy.api_resource.plural, "deployments");
        assert_eq!(deploy.api_resource.version, "v1");
        assert!(deploy.is_namespaced());

        let ns = mapper
            .rest_mapping(&GroupKind::new("", "Namespace"), Some("v1"))
            .unwrap();
        assert!(!ns.is_namespaced());

        let crd = mapper
            .rest_mapping(
                &GroupKind::new("apiextensions.k8s.io", "CustomResourceDefinition"),
                None,
            )
            .unwrap();
        assert_eq!(crd.api_resource.plural, "customresourcedefinitions");
    }

    #[test]
    fn test_missing_mapping() {
        let mapper = RestMapper::builtin();
        let err = mapper
            .rest_mapping(&GroupKind::new("example.com", "Resource"), None)
            .unwrap_err();
        assert!(matches!(err, Error::NoMapping { .. }));

        // known kind, unknown version
        assert!(
            mapper
                .rest_mapping(&GroupKind::new("apps", "Deployment"), Some("v1beta2"))
                .is_err()
        );
    }

    #[test]
    fn test_versions_and_gvr() {
        let mut mapper = RestMapper::new();
        mapper.add(
            &GroupVersionKind::gvk("example.com", "v1", "Resource"),
            "resources",
            Scope::Namespaced,
        );
        mapper.add(
            &GroupVersionKind::gvk("example.com", "v1beta1", "Resource"),
            "resources",
            Scope::Namespaced,
        );
        let gk = GroupKind::new("example.com", "Resource");

        // first registered version is the default
        let default = mapper.rest_mapping(&gk, None).unwrap();
        assert_eq!(default.api_resource.version, "v1");

        let beta = mapper.rest_mapping(&gk, Some("v1beta1")).unwrap();
        assert_eq!(
            beta.gvr(),
            GroupVersionResource::gvr("example.com", "v1beta1", "resources")
        );
        assert_eq!(beta.api_resource.api_version, "example.com/v1beta1");
    }

    #[test]
    fn test_merge_prefers_incoming() {
        let mut base = RestMapper::builtin();
        let mut custom = RestMapper::new();
        custom.add(
            &GroupVersionKind::gvk("example.com", "v1", "Resource"),
            "resources",
            Scope::Cluster,
        );
        base.merge(&custom);
        let gk = GroupKind::new("example.com", "Resource");
        assert!(!base.rest_mapping(&gk, None).unwrap().is_namespaced());
        assert!(base.rest_mapping(&GroupKind::new("", "Pod"), None).is_ok());
    }
}
