//! In-memory [`ClusterClient`] for tests

use async_trait::async_trait;
use kube::discovery::ApiResource;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::ClusterClient;
use crate::error::{Error, Result};
use crate::status::object;

/// Failure to inject into the next list of a kind
#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Timeout,
    NotFound,
    Server,
}

impl Failure {
    fn into_error(self, resource: &ApiResource) -> Error {
        match self {
            Failure::Timeout => Error::Timeout {
                what: format!("list {}", resource.plural),
            },
            Failure::NotFound => Error::NotFound {
                resource: resource.plural.clone(),
                name: String::new(),
            },
            Failure::Server => Error::Kube(kube::Error::Api(kube::core::ErrorResponse {
                status: "Failure".to_string(),
                message: "internal error".to_string(),
                reason: "InternalError".to_string(),
                code: 500,
            })),
        }
    }
}

#[derive(Default)]
pub struct FakeClient {
    objects: Mutex<Vec<Value>>,
    list_calls: Mutex<Vec<(String, Option<String>)>>,
    get_calls: Mutex<Vec<(String, String)>>,
    list_failures: Mutex<HashMap<String, VecDeque<Failure>>>,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_objects(objects: impl IntoIterator<Item = Value>) -> Self {
        let client = Self::new();
        for obj in objects {
            client.apply(obj);
        }
        client
    }

    /// Create or replace an object, keyed by apiVersion/kind/namespace/name
    pub fn apply(&self, obj: Value) {
        let mut objects = self.objects.lock().unwrap();
        let key = identity(&obj);
        match objects.iter_mut().find(|o| identity(o) == key) {
            Some(existing) => *existing = obj,
            None => objects.push(obj),
        }
    }

    /// Fail the next `times` lists of `kind`
    pub fn fail_list(&self, kind: &str, failure: Failure, times: usize) {
        let mut failures = self.list_failures.lock().unwrap();
        let queue = failures.entry(kind.to_string()).or_default();
        queue.extend(std::iter::repeat_n(failure, times));
    }

    /// `(kind, namespace)` of every list call so far
    pub fn list_calls(&self) -> Vec<(String, Option<String>)> {
        self.list_calls.lock().unwrap().clone()
    }

    /// `(kind, name)` of every get call so far
    pub fn get_calls(&self) -> Vec<(String, String)> {
        self.get_calls.lock().unwrap().clone()
    }

    fn matching(&self, resource: &ApiResource, namespace: Option<&str>) -> Vec<Value> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .filter(|o| {
                object::api_version(o) == Some(resource.api_version.as_str())
                    && object::kind(o) == Some(resource.kind.as_str())
                    && namespace.is_none_or(|ns| object::namespace(o) == Some(ns))
            })
            .cloned()
            .collect()
    }
}

fn identity(obj: &Value) -> (Option<String>, Option<String>, Option<String>, Option<String>) {
    (
        object::api_version(obj).map(str::to_string),
        object::kind(obj).map(str::to_string),
        object::namespace(obj).map(str::to_string),
        object::name(obj).map(str::to_string),
    )
}

#[async_trait]
impl ClusterClient for FakeClient {
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Value> {
        self.get_calls
            .lock()
            .unwrap()
            .push((resource.kind.clone(), name.to_string()));
        self.matching(resource, namespace)
            .into_iter()
            .find(|o| object::name(o) == Some(name))
            .ok_or_else(|| Error::NotFound {
                resource: resource.kind.clone(),
                name: name.to_string(),
            })
    }

    async fn list(&self, resource: &ApiResource, namespace: Option<&str>) -> Result<Vec<Value>> {
        self.list_calls
            .lock()
            .unwrap()
            .push((resource.kind.clone(), namespace.map(str::to_string)));
        let failure = self
            .list_failures
            .lock()
            .unwrap()
            .get_mut(&resource.kind)
            .and_then(VecDeque::pop_front);
        if let Some(failure) = failure {
            return Err(failure.into_error(resource));
        }
        Ok(self.matching(resource, namespace))
    }
}
