// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use serde_json::Value;
use std::sync::Arc;

use crate::error::Error;
use crate::status::{ComputedStatus, ObjMetadata, Status};

/// Status of one tracked resource at one tick
#[derive(Debug, Clone)]
pub struct ResourceStatus {
    pub identifier: ObjMetadata,
    pub status: Status,
    pub message: String,
    pub error: Option<Arc<Error>>,
    /// Live object the status was computed from
    pub resource: Option<Value>,
    /// Statuses of the objects a workload generated (ReplicaSets, Pods)
    pub generated_resources: Vec<ResourceStatus>,
}

impl ResourceStatus {
    pub fn new(identifier: ObjMetadata, computed: ComputedStatus) -> Self {
        Self {
            identifier,
            status: computed.status,
            message: computed.message,
            error: None,
            resource: None,
            generated_resources: Vec::new(),
        }
    }

    pub fn with_resource(mut self, resource: &Value) -> Self {
        self.resource = Some(resource.clone());
        self
    }

    /// `Unknown` carrying the error
    pub fn unknown(identifier: ObjMetadata, error: Error) -> Self {
        Self {
            identifier,
            status: Status::UNKNOWN,
            message: error.to_string(),
            error: Some(Arc::new(error)),
            resource: None,
            generated_resources: Vec::new(),
        }
    }

    /// Map a failed lookup: absent objects become `NotFound`, anything else `Unknown`
    pub fn from_error(identifier: ObjMetadata, error: Error) -> Self {
        if error.is_not_found() {
            Self::new(
                identifier,
                ComputedStatus::new(Status::NOT_FOUND, "Resource not found"),
            )
        } else {
            Self::unknown(identifier, error)
        }
    }

    /// Same status, message and error as `other`
    pub fn same_state(&self, other: &ResourceStatus) -> bool {
        self.status == other.status
            && self.message == other.message
            && self.error.as_ref().map(|e| e.to_string())
                == other.error.as_ref().map(|e| e.to_string())
    }
}

/// What a poll run streams to its caller
#[derive(Debug, Clone)]
pub enum Event {
    ResourceUpdate(ResourceStatus),
    /// The tick's sync pass failed; no resource updates follow for this tick
    SyncFailed(Arc<Error>),
    /// Every resource of the current tick has been reported
    TickComplete,
}
