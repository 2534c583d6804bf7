// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Manifest bundles: the documents whose status is tracked, and the CRDs
//! that describe how to compute it.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::status::{ObjMetadata, object};

pub const CRD_KIND: &str = "CustomResourceDefinition";
pub const CRD_API_VERSIONS: [&str; 2] = ["apiextensions.k8s.io/v1", "apiextensions.k8s.io/v1beta1"];

/// An ordered collection of untyped Kubernetes documents
#[derive(Debug, Clone, Default)]
pub struct Bundle {
    documents: Vec<Value>,
}

impl Bundle {
    pub fn from_documents(documents: impl IntoIterator<Item = Value>) -> Self {
        let mut bundle = Self::default();
        for doc in documents {
            bundle.push(doc);
        }
        bundle
    }

    /// Load every YAML/JSON file under the given paths. Directories are walked
    /// recursively in name order.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut bundle = Self::default();
        for path in paths {
            bundle.load_path(path.as_ref())?;
        }
        debug!(documents = bundle.documents.len(), "Loaded bundle");
        Ok(bundle)
    }

    fn load_path(&mut self, path: &Path) -> Result<()> {
        let meta =
            fs::metadata(path).with_context(|| format!("failed to stat {}", path.display()))?;
        if meta.is_dir() {
            for entry in manifest_files(path)? {
                self.load_path(&entry)?;
            }
            return Ok(());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let before = self.documents.len();
        self.parse_str(&content)
            .with_context(|| format!("failed to parse YAML in {}", path.display()))?;
        debug!(
            path = %path.display(),
            documents = self.documents.len() - before,
            "Loaded manifest file"
        );
        Ok(())
    }

    /// Add all documents of a (possibly multi-document) YAML or JSON string
    pub fn parse_str(&mut self, content: &str) -> Result<()> {
        for doc in serde_yaml::Deserializer::from_str(content) {
            let value = Value::deserialize(doc)?;
            // Skip empty documents
            if value.is_null() {
                continue;
            }
            self.push(value);
        }
        Ok(())
    }

    /// Add a document, flattening `kind: List` wrappers
    fn push(&mut self, doc: Value) {
        if object::kind(&doc) == Some("List") {
            if let Some(Value::Array(items)) = doc.get("items") {
                for item in items {
                    self.push(item.clone());
                }
            }
            return;
        }
        self.documents.push(doc);
    }

    pub fn documents(&self) -> &[Value] {
        &self.documents
    }

    /// CustomResourceDefinition documents (v1 and v1beta1)
    pub fn crds(&self) -> impl Iterator<Item = &Value> {
        self.documents.iter().filter(|doc| is_crd(doc))
    }

    /// Identifiers of every document, in order, without duplicates
    pub fn identifiers(&self) -> crate::error::Result<Vec<ObjMetadata>> {
        let mut ids: Vec<ObjMetadata> = Vec::with_capacity(self.documents.len());
        for doc in &self.documents {
            let id = ObjMetadata::from_object(doc)?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }
}

pub fn is_crd(doc: &Value) -> bool {
    object::kind(doc) == Some(CRD_KIND)
        && object::api_version(doc).is_some_and(|v| CRD_API_VERSIONS.contains(&v))
}

/// YAML/JSON files and subdirectories of `dir`, sorted by path
fn manifest_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_dir()
                || p.extension()
                    .is_some_and(|ext| ext == "yaml" || ext == "yml" || ext == "json")
        })
        .collect();
    entries.sort();
    Ok(entries)
}
