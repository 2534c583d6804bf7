// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Error taxonomy for the status engine.
//!
//! The CLI layer works with `anyhow`; everything below it returns [`Error`]
//! so callers can tell a malformed status-check apart from a missing
//! resource or a failed cluster read.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed status-check annotation, missing field, or a condition that
    /// could not be parsed or evaluated
    #[error("invalid status-check: {what}")]
    InvalidStatusCheck { what: String },

    /// A document's kind has no registered mapping, so it cannot be queried
    #[error("could not find a status for resource {resource:?}")]
    ResourceNotFound { resource: String },

    /// The REST mapper has no entry for a GroupKind the poller was asked about
    #[error("no matches for kind {group_kind:?}")]
    NoMapping { group_kind: String },

    /// The object does not exist on the cluster
    #[error("{resource} {name:?} not found")]
    NotFound { resource: String, name: String },

    /// A cluster call exceeded its deadline
    #[error("request timed out: {what}")]
    Timeout { what: String },

    /// A document is missing required fields (apiVersion, kind, name)
    #[error("invalid document: {what}")]
    Document { what: String },

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid_status_check(what: impl Into<String>) -> Self {
        Self::InvalidStatusCheck { what: what.into() }
    }

    pub(crate) fn document(what: impl Into<String>) -> Self {
        Self::Document { what: what.into() }
    }

    /// True when the cluster reported the object (or its collection) as absent
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Kube(kube::Error::Api(resp)) => resp.code == 404,
            _ => false,
        }
    }

    /// True for gateway timeouts and client-side request timeouts
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Kube(kube::Error::Api(resp)) => {
                resp.code == 504 || resp.message.contains("timed out")
            }
            Self::Kube(err) => err.to_string().contains("timed out"),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_status_check_message() {
        let err = Error::invalid_status_check("missing status field");
        assert_eq!(err.to_string(), "invalid status-check: missing status field");
    }

    #[test]
    fn test_resource_not_found_message() {
        let err = Error::ResourceNotFound {
            resource: "missing-resource".to_string(),
        };
        assert_eq!(
            err.to_string(),
            r#"could not find a status for resource "missing-resource""#
        );
    }

    #[test]
    fn test_classification() {
        let not_found = Error::NotFound {
            resource: "Resource.example.com".to_string(),
            name: "foo".to_string(),
        };
        assert!(not_found.is_not_found());
        assert!(!not_found.is_timeout());

        let timeout = Error::Timeout {
            what: "list Deployment.apps".to_string(),
        };
        assert!(timeout.is_timeout());
        assert!(!timeout.is_not_found());

        assert!(!Error::document("no kind").is_not_found());
    }
}
