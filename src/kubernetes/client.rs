// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Dynamic, schema-less cluster access.

use anyhow::Context;
use async_trait::async_trait;
use kube::api::{DynamicObject, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::discovery::ApiResource;
use kube::{Api, Client, Config};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Connection timeout for establishing TCP connection to K8s API
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Read timeout for API responses
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum retries for transient API failures
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Items per list request; larger collections are fetched with continue tokens
const PAGE_SIZE: u32 = 500;

/// Read access to arbitrary resources, addressed by ApiResource + namespace + name.
///
/// `namespace` is `None` for cluster-scoped kinds (or, for `list`, all namespaces).
/// Returned objects always carry `apiVersion` and `kind`.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn get(&self, resource: &ApiResource, namespace: Option<&str>, name: &str)
    -> Result<Value>;

    async fn list(&self, resource: &ApiResource, namespace: Option<&str>) -> Result<Vec<Value>>;
}

/// [`ClusterClient`] backed by a kube-rs client
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
    context: String,
}

impl KubeClusterClient {
    /// Connect using the given kubeconfig context, or the current one
    pub async fn connect(context: Option<&str>) -> anyhow::Result<Self> {
        let kubeconfig = Kubeconfig::read().context("Failed to read kubeconfig")?;
        let context = match context {
            Some(c) => c.to_string(),
            None => kubeconfig
                .current_context
                .clone()
                .context("No current context set in kubeconfig")?,
        };

        if !kubeconfig.contexts.iter().any(|c| c.name == context) {
            anyhow::bail!("Context '{}' not found in kubeconfig", context);
        }

        let start = std::time::Instant::now();
        let mut config = Config::from_custom_kubeconfig(
            kubeconfig,
            &KubeConfigOptions {
                context: Some(context.clone()),
                ..Default::default()
            },
        )
        .await
        .with_context(|| format!("Failed to load kubeconfig for context '{}'", context))?;

        // Set timeouts for reliability
        config.connect_timeout = Some(CONNECT_TIMEOUT);
        config.read_timeout = Some(READ_TIMEOUT);

        let client = Client::try_from(config)
            .with_context(|| format!("Failed to create client for context '{}'", context))?;

        info!(
            context = %context,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Connected to cluster"
        );

        Ok(Self { client, context })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    fn api(&self, resource: &ApiResource, namespace: Option<&str>) -> Api<DynamicObject> {
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, resource),
            None => Api::all_with(self.client.clone(), resource),
        }
    }

    /// Run an API call, retrying transient failures with exponential backoff
    async fn with_retry<T, F, Fut>(&self, what: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = kube::Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if is_retryable_error(&e) && attempt + 1 < MAX_RETRIES => {
                    let delay = RETRY_BASE_DELAY * 2u32.pow(attempt);
                    warn!(
                        what = %what,
                        context = %self.context,
                        attempt = attempt + 1,
                        max_attempts = MAX_RETRIES,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "Retryable error, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    debug!(what = %what, context = %self.context, error = %e, "API call failed");
                    return Err(e.into());
                }
            }
        }
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Value> {
        let api = self.api(resource, namespace);
        let what = format!("get {}/{}", resource.kind, name);
        let obj = self.with_retry(&what, || api.get(name)).await.map_err(|e| {
            if e.is_not_found() {
                Error::NotFound {
                    resource: resource.kind.clone(),
                    name: name.to_string(),
                }
            } else {
                e
            }
        })?;
        Ok(with_type_meta(serde_json::to_value(obj)?, resource))
    }

    async fn list(&self, resource: &ApiResource, namespace: Option<&str>) -> Result<Vec<Value>> {
        let api = self.api(resource, namespace);
        let what = format!("list {}", resource.plural);
        let mut items = Vec::new();
        let mut continue_token: Option<String> = None;
        let mut page_count = 0u32;

        loop {
            let mut params = ListParams::default().limit(PAGE_SIZE);
            if let Some(ref token) = continue_token {
                params = params.continue_token(token);
            }

            let list = self.with_retry(&what, || api.list(&params)).await?;
            page_count += 1;
            for item in list.items {
                // K8s list API doesn't include apiVersion/kind per item
                items.push(with_type_meta(serde_json::to_value(item)?, resource));
            }

            match list.metadata.continue_ {
                Some(token) if !token.is_empty() => continue_token = Some(token),
                _ => break,
            }
        }

        debug!(
            resource = %resource.plural,
            namespace = ?namespace,
            pages = page_count,
            total_items = items.len(),
            "Listed resources"
        );
        Ok(items)
    }
}

fn with_type_meta(mut value: Value, resource: &ApiResource) -> Value {
    if let Value::Object(ref mut map) = value {
        map.insert(
            "apiVersion".to_string(),
            Value::String(resource.api_version.clone()),
        );
        map.insert("kind".to_string(), Value::String(resource.kind.clone()));
    }
    value
}

/// Check if an error is retryable (transient failures)
fn is_retryable_error(err: &kube::Error) -> bool {
    match err {
        // Network/connection errors are retryable
        kube::Error::HyperError(_) => true,
        // API errors: retry on 429 (rate limit), 503 (unavailable), 504 (timeout)
        kube::Error::Api(api_err) => matches!(api_err.code, 429 | 503 | 504),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::GroupVersionKind;
    use serde_json::json;

    #[test]
    fn test_type_meta_injected() {
        let ar = ApiResource::from_gvk_with_plural(
            &GroupVersionKind::gvk("example.com", "v1", "Resource"),
            "resources",
        );
        let value = with_type_meta(json!({"metadata": {"name": "x"}}), &ar);
        assert_eq!(value["apiVersion"], "example.com/v1");
        assert_eq!(value["kind"], "Resource");
    }

    #[test]
    fn test_retryable_codes() {
        let api_error = |code| {
            kube::Error::Api(kube::core::ErrorResponse {
                status: "Failure".to_string(),
                message: "boom".to_string(),
                reason: "".to_string(),
                code,
            })
        };
        assert!(is_retryable_error(&api_error(429)));
        assert!(is_retryable_error(&api_error(504)));
        assert!(!is_retryable_error(&api_error(404)));
        assert!(!is_retryable_error(&api_error(403)));
    }
}
