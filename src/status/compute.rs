// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Generic status computation for built-in and condition-reporting resources
//!
//! Properties shared by every kind are checked first (deletion, observed
//! generation, the `Reconciling`/`Stalled` condition convention), then a
//! kind-specific rule, and finally the `Ready` condition if present.

use serde_json::Value;
use std::sync::Arc;

use super::object::{self, nested_i64, nested_str};
use super::{GroupKind, Status};
use crate::error::Result;

/// Status plus a human readable explanation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ComputedStatus {
    pub status: Status,
    pub message: String,
}

impl ComputedStatus {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn current(message: impl Into<String>) -> Self {
        Self::new(Status::CURRENT, message)
    }

    pub fn in_progress(message: impl Into<String>) -> Self {
        Self::new(Status::IN_PROGRESS, message)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(Status::FAILED, message)
    }
}

/// Pluggable status computation used by the custom resource reader
pub type StatusFunc = Arc<dyn Fn(&Value) -> Result<ComputedStatus> + Send + Sync>;

/// [`compute`] as a [`StatusFunc`]
pub fn compute_fn() -> StatusFunc {
    Arc::new(compute)
}

pub fn compute(obj: &Value) -> Result<ComputedStatus> {
    if let Some(status) = generic_status(obj) {
        return Ok(status);
    }

    let group_kind = GroupKind::of(obj)?;
    let status = match (group_kind.group.as_str(), group_kind.kind.as_str()) {
        ("apps", "Deployment") => deployment_status(obj),
        ("apps", "ReplicaSet") => replicaset_status(obj),
        ("apps", "StatefulSet") => statefulset_status(obj),
        ("apps", "DaemonSet") => daemonset_status(obj),
        ("", "Pod") => pod_status(obj),
        ("batch", "Job") => job_status(obj),
        ("", "PersistentVolumeClaim") => pvc_status(obj),
        ("apiextensions.k8s.io", "CustomResourceDefinition") => crd_status(obj),
        _ => ready_condition_status(obj),
    };
    Ok(status)
}

fn generic_status(obj: &Value) -> Option<ComputedStatus> {
    if object::nested(obj, &["metadata", "deletionTimestamp"]).is_some_and(|v| !v.is_null()) {
        return Some(ComputedStatus::new(
            Status::TERMINATING,
            "Resource scheduled for deletion",
        ));
    }

    let generation = nested_i64(obj, &["metadata", "generation"]);
    let observed = nested_i64(obj, &["status", "observedGeneration"]);
    if let (Some(generation), Some(observed)) = (generation, observed) {
        if observed < generation {
            return Some(ComputedStatus::in_progress(format!(
                "{} generation is {}, but latest observed generation is {}",
                object::kind(obj).unwrap_or("Resource"),
                generation,
                observed
            )));
        }
    }

    if let Some(c) = object::condition(obj, "Reconciling").filter(|c| c.is_true()) {
        return Some(ComputedStatus::in_progress(message_or(c.message, c.reason)));
    }
    if let Some(c) = object::condition(obj, "Stalled").filter(|c| c.is_true()) {
        return Some(ComputedStatus::failed(message_or(c.message, c.reason)));
    }
    None
}

fn message_or(message: &str, reason: &str) -> String {
    if message.is_empty() {
        reason.to_string()
    } else {
        message.to_string()
    }
}

fn int(obj: &Value, path: &[&str]) -> i64 {
    nested_i64(obj, path).unwrap_or(0)
}

fn deployment_status(obj: &Value) -> ComputedStatus {
    let desired = nested_i64(obj, &["spec", "replicas"]).unwrap_or(1);
    let replicas = int(obj, &["status", "replicas"]);
    let updated = int(obj, &["status", "updatedReplicas"]);
    let ready = int(obj, &["status", "readyReplicas"]);
    let available = int(obj, &["status", "availableReplicas"]);

    if let Some(c) = object::condition(obj, "Progressing") {
        if c.reason == "ProgressDeadlineExceeded" {
            return ComputedStatus::failed(message_or(c.message, c.reason));
        }
    }
    if let Some(c) = object::condition(obj, "Available") {
        if c.is_false() {
            return ComputedStatus::in_progress("Deployment not Available");
        }
    }
    if updated < desired {
        return ComputedStatus::in_progress(format!("Updated: {}/{}", updated, desired));
    }
    if replicas > updated {
        return ComputedStatus::in_progress(format!("Pending termination: {}", replicas - updated));
    }
    if available < updated {
        return ComputedStatus::in_progress(format!("Available: {}/{}", available, updated));
    }
    if ready < desired {
        return ComputedStatus::in_progress(format!("Ready: {}/{}", ready, desired));
    }
    ComputedStatus::current(format!("Deployment is available. Replicas: {}", replicas))
}

fn replicaset_status(obj: &Value) -> ComputedStatus {
    let desired = nested_i64(obj, &["spec", "replicas"]).unwrap_or(1);
    let labelled = int(obj, &["status", "fullyLabeledReplicas"]);
    let available = int(obj, &["status", "availableReplicas"]);
    let ready = int(obj, &["status", "readyReplicas"]);

    if let Some(c) = object::condition(obj, "ReplicaFailure") {
        if c.is_true() {
            return ComputedStatus::in_progress("Replica Failure condition. See events for details");
        }
    }
    if labelled < desired {
        return ComputedStatus::in_progress(format!("Labelled: {}/{}", labelled, desired));
    }
    if available < desired {
        return ComputedStatus::in_progress(format!("Available: {}/{}", available, desired));
    }
    if ready < desired {
        return ComputedStatus::in_progress(format!("Ready: {}/{}", ready, desired));
    }
    ComputedStatus::current(format!("ReplicaSet is available. Replicas: {}", desired))
}

fn statefulset_status(obj: &Value) -> ComputedStatus {
    let strategy = nested_str(obj, &["spec", "updateStrategy", "type"]).unwrap_or("RollingUpdate");
    let desired = nested_i64(obj, &["spec", "replicas"]).unwrap_or(1);
    let ready = int(obj, &["status", "readyReplicas"]);
    let current = int(obj, &["status", "currentReplicas"]);
    let updated = int(obj, &["status", "updatedReplicas"]);

    if ready < desired {
        return ComputedStatus::in_progress(format!("Ready: {}/{}", ready, desired));
    }
    if strategy == "RollingUpdate" {
        let partition = nested_i64(
            obj,
            &["spec", "updateStrategy", "rollingUpdate", "partition"],
        )
        .unwrap_or(0);
        if partition > 0 {
            let expected = desired - partition;
            if updated < expected {
                return ComputedStatus::in_progress(format!("updated: {}/{}", updated, expected));
            }
            return ComputedStatus::current(format!(
                "Partitioned roll out complete. updated: {}/{}",
                updated, expected
            ));
        }
        let current_revision = nested_str(obj, &["status", "currentRevision"]);
        let update_revision = nested_str(obj, &["status", "updateRevision"]);
        if current_revision != update_revision {
            return ComputedStatus::in_progress(format!(
                "Waiting for rolling update to complete {}/{}",
                updated, desired
            ));
        }
    }
    if strategy != "OnDelete" && current < desired {
        return ComputedStatus::in_progress(format!("current: {}/{}", current, desired));
    }
    ComputedStatus::current(format!("All replicas scheduled as expected. Replicas: {}", desired))
}

fn daemonset_status(obj: &Value) -> ComputedStatus {
    let desired = int(obj, &["status", "desiredNumberScheduled"]);
    let scheduled = int(obj, &["status", "currentNumberScheduled"]);
    let updated = int(obj, &["status", "updatedNumberScheduled"]);
    let available = int(obj, &["status", "numberAvailable"]);
    let ready = int(obj, &["status", "numberReady"]);

    if object::nested(obj, &["status", "desiredNumberScheduled"]).is_none() {
        return ComputedStatus::in_progress("Missing .status.desiredNumberScheduled");
    }
    for (label, have) in [
        ("Current", scheduled),
        ("Updated", updated),
        ("Available", available),
        ("Ready", ready),
    ] {
        if have < desired {
            return ComputedStatus::in_progress(format!("{}: {}/{}", label, have, desired));
        }
    }
    ComputedStatus::current(format!("All replicas scheduled as expected. Replicas: {}", desired))
}

fn pod_status(obj: &Value) -> ComputedStatus {
    let phase = nested_str(obj, &["status", "phase"]).unwrap_or("");
    match phase {
        "Succeeded" => ComputedStatus::current("Pod has completed successfully"),
        "Failed" => ComputedStatus::failed("Pod has completed, but not successfully"),
        "Running" => match object::condition(obj, "Ready") {
            Some(c) if c.is_true() => ComputedStatus::current("Pod is Ready"),
            _ => ComputedStatus::in_progress("Pod is running but is not Ready"),
        },
        _ => {
            let unschedulable = object::condition(obj, "PodScheduled")
                .is_some_and(|c| c.is_false() && c.reason == "Unschedulable");
            if unschedulable {
                ComputedStatus::in_progress("Pod could not be scheduled")
            } else {
                ComputedStatus::in_progress("Pod is in the Pending phase")
            }
        }
    }
}

fn job_status(obj: &Value) -> ComputedStatus {
    let completions = nested_i64(obj, &["spec", "completions"]).unwrap_or(1);
    let succeeded = int(obj, &["status", "succeeded"]);
    let failed = int(obj, &["status", "failed"]);
    let active = int(obj, &["status", "active"]);

    if object::condition(obj, "Failed").is_some_and(|c| c.is_true()) {
        return ComputedStatus::failed(format!("Job Failed. failed: {}/{}", failed, completions));
    }
    if object::condition(obj, "Complete").is_some_and(|c| c.is_true()) {
        return ComputedStatus::current(format!(
            "Job Completed. succeeded: {}/{}",
            succeeded, completions
        ));
    }
    if object::nested(obj, &["status", "startTime"]).is_none() {
        return ComputedStatus::in_progress("Job not started");
    }
    ComputedStatus::current(format!(
        "Job in progress. success:{}, active: {}, failed: {}",
        succeeded, active, failed
    ))
}

fn pvc_status(obj: &Value) -> ComputedStatus {
    match nested_str(obj, &["status", "phase"]) {
        Some("Bound") => ComputedStatus::current("PVC is Bound"),
        _ => ComputedStatus::in_progress("PVC is not Bound"),
    }
}

fn crd_status(obj: &Value) -> ComputedStatus {
    match object::condition(obj, "Established") {
        Some(c) if c.is_true() => ComputedStatus::current("CRD is established"),
        Some(c) if c.reason == "NotAccepted" => {
            ComputedStatus::failed(message_or(c.message, c.reason))
        }
        _ => ComputedStatus::in_progress("CRD is not established"),
    }
}

fn ready_condition_status(obj: &Value) -> ComputedStatus {
    match object::condition(obj, "Ready") {
        Some(c) if c.is_false() => ComputedStatus::in_progress(message_or(c.message, c.reason)),
        _ => ComputedStatus::current("Resource is current"),
    }
}
