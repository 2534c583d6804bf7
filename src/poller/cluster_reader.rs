// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Cluster readers used by status readers during a poll run
//!
//! The caching reader lists every `(GroupKind, namespace)` pair the tracked
//! resources need once per sync pass, so a tick costs one list per pair no
//! matter how many resources share it.

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::readers::generated_kinds;
use crate::error::{Error, Result};
use crate::kubernetes::selector::selector_matches;
use crate::kubernetes::{ClusterClient, DEFAULT_NAMESPACE, RestMapper, RestMapping};
use crate::status::{GroupKind, ObjMetadata, object};

/// Timeouts a caching reader absorbs over its lifetime; the next one fails
/// the sync
pub const MAX_SYNC_TIMEOUTS: usize = 3;

#[async_trait]
pub trait ClusterReader: Send + Sync {
    /// Fetch one object. `namespace` is ignored for cluster-scoped kinds.
    async fn get(&self, group_kind: &GroupKind, namespace: &str, name: &str) -> Result<Value>;

    async fn list_namespaced(
        &self,
        group_kind: &GroupKind,
        namespace: &str,
        selector: Option<&LabelSelector>,
    ) -> Result<Vec<Value>>;

    /// Refresh state for the given identifiers before a tick
    async fn sync(&self, identifiers: &[ObjMetadata]) -> Result<()>;
}

fn namespace_for<'a>(mapping: &RestMapping, namespace: &'a str) -> Option<&'a str> {
    if !mapping.is_namespaced() {
        None
    } else if namespace.is_empty() {
        Some(DEFAULT_NAMESPACE)
    } else {
        Some(namespace)
    }
}

fn filter_by_selector(items: Vec<Value>, selector: Option<&LabelSelector>) -> Vec<Value> {
    match selector {
        Some(selector) => items
            .into_iter()
            .filter(|item| selector_matches(selector, &object::labels(item)))
            .collect(),
        None => items,
    }
}

/// Reads straight from the cluster on every call
pub struct DirectClusterReader {
    client: Arc<dyn ClusterClient>,
    mapper: Arc<RestMapper>,
}

impl DirectClusterReader {
    pub fn new(client: Arc<dyn ClusterClient>, mapper: Arc<RestMapper>) -> Self {
        Self { client, mapper }
    }
}

#[async_trait]
impl ClusterReader for DirectClusterReader {
    async fn get(&self, group_kind: &GroupKind, namespace: &str, name: &str) -> Result<Value> {
        let mapping = self.mapper.rest_mapping(group_kind, None)?;
        self.client
            .get(&mapping.api_resource, namespace_for(mapping, namespace), name)
            .await
    }

    async fn list_namespaced(
        &self,
        group_kind: &GroupKind,
        namespace: &str,
        selector: Option<&LabelSelector>,
    ) -> Result<Vec<Value>> {
        let mapping = self.mapper.rest_mapping(group_kind, None)?;
        let items = self
            .client
            .list(&mapping.api_resource, namespace_for(mapping, namespace))
            .await?;
        Ok(filter_by_selector(items, selector))
    }

    async fn sync(&self, _identifiers: &[ObjMetadata]) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct GkNamespace {
    group_kind: GroupKind,
    namespace: String,
}

#[derive(Debug, Clone)]
enum CacheEntry {
    Objects(Arc<Vec<Value>>),
    /// The kind has no REST mapping; lookups fail with `NoMapping`
    Unmapped,
}

/// Caches one list per `(GroupKind, namespace)` for the duration of a sync pass
pub struct CachingClusterReader {
    direct: DirectClusterReader,
    cache: RwLock<HashMap<GkNamespace, CacheEntry>>,
    timeouts: AtomicUsize,
}

impl CachingClusterReader {
    pub fn new(client: Arc<dyn ClusterClient>, mapper: Arc<RestMapper>) -> Self {
        Self {
            direct: DirectClusterReader::new(client, mapper),
            cache: RwLock::new(HashMap::new()),
            timeouts: AtomicUsize::new(0),
        }
    }

    /// Distinct pairs to list for the identifiers, including the kinds their
    /// status readers look up (ReplicaSets and Pods of workloads)
    fn sync_keys(&self, identifiers: &[ObjMetadata]) -> Vec<GkNamespace> {
        let mut keys: Vec<GkNamespace> = Vec::new();
        let mut push = |group_kind: GroupKind, namespace: &str| {
            let key = GkNamespace {
                group_kind,
                namespace: namespace.to_string(),
            };
            if !keys.contains(&key) {
                keys.push(key);
            }
        };
        for id in identifiers {
            push(id.group_kind.clone(), &id.namespace);
            for generated in generated_kinds(&id.group_kind) {
                push(generated, &id.namespace);
            }
        }
        keys
    }

    async fn lookup(&self, key: &GkNamespace) -> Option<Result<Arc<Vec<Value>>>> {
        let cache = self.cache.read().await;
        match cache.get(key)? {
            CacheEntry::Objects(items) => Some(Ok(items.clone())),
            CacheEntry::Unmapped => Some(Err(Error::NoMapping {
                group_kind: key.group_kind.to_string(),
            })),
        }
    }

    /// Cache key of a lookup; cluster-scoped kinds are cached under ""
    fn key(&self, group_kind: &GroupKind, namespace: &str) -> GkNamespace {
        let namespace = match self.direct.mapper.rest_mapping(group_kind, None) {
            Ok(mapping) => namespace_for(mapping, namespace).unwrap_or_default(),
            Err(_) => namespace,
        };
        GkNamespace {
            group_kind: group_kind.clone(),
            namespace: namespace.to_string(),
        }
    }
}

#[async_trait]
impl ClusterReader for CachingClusterReader {
    async fn get(&self, group_kind: &GroupKind, namespace: &str, name: &str) -> Result<Value> {
        let key = self.key(group_kind, namespace);
        match self.lookup(&key).await {
            Some(items) => items?
                .iter()
                .find(|o| object::name(o) == Some(name))
                .cloned()
                .ok_or_else(|| Error::NotFound {
                    resource: group_kind.to_string(),
                    name: name.to_string(),
                }),
            None => self.direct.get(group_kind, namespace, name).await,
        }
    }

    async fn list_namespaced(
        &self,
        group_kind: &GroupKind,
        namespace: &str,
        selector: Option<&LabelSelector>,
    ) -> Result<Vec<Value>> {
        let key = self.key(group_kind, namespace);
        match self.lookup(&key).await {
            Some(items) => Ok(filter_by_selector(items?.to_vec(), selector)),
            None => {
                self.direct
                    .list_namespaced(group_kind, namespace, selector)
                    .await
            }
        }
    }

    async fn sync(&self, identifiers: &[ObjMetadata]) -> Result<()> {
        let mut fresh: HashMap<GkNamespace, CacheEntry> = HashMap::new();

        for key in self.sync_keys(identifiers) {
            let mapping = match self.direct.mapper.rest_mapping(&key.group_kind, None) {
                Ok(mapping) => mapping,
                Err(_) => {
                    debug!(group_kind = %key.group_kind, "No REST mapping, caching miss");
                    fresh.insert(key, CacheEntry::Unmapped);
                    continue;
                }
            };
            let namespace = namespace_for(mapping, &key.namespace).map(str::to_string);
            let key = GkNamespace {
                namespace: namespace.clone().unwrap_or_default(),
                ..key
            };
            if fresh.contains_key(&key) {
                continue;
            }

            match self
                .direct
                .client
                .list(&mapping.api_resource, namespace.as_deref())
                .await
            {
                Ok(items) => {
                    debug!(
                        group_kind = %key.group_kind,
                        namespace = %key.namespace,
                        items = items.len(),
                        "Synced"
                    );
                    fresh.insert(key, CacheEntry::Objects(Arc::new(items)));
                }
                Err(e) if e.is_not_found() => {
                    fresh.insert(key, CacheEntry::Objects(Arc::new(Vec::new())));
                }
                Err(e) if e.is_timeout() => {
                    let seen = self.timeouts.fetch_add(1, Ordering::SeqCst) + 1;
                    if seen > MAX_SYNC_TIMEOUTS {
                        return Err(e);
                    }
                    warn!(
                        group_kind = %key.group_kind,
                        namespace = %key.namespace,
                        timeouts = seen,
                        error = %e,
                        "Timeout during sync, skipping"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        *self.cache.write().await = fresh;
        Ok(())
    }
}
