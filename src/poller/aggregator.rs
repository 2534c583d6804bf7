// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Latest-status bookkeeping over a poll run

use std::collections::BTreeMap;

use super::event::ResourceStatus;
use crate::status::{ObjMetadata, Status};

/// Tracks the most recent status of every identifier of a run
#[derive(Debug, Clone)]
pub struct StatusTracker {
    statuses: BTreeMap<ObjMetadata, Option<ResourceStatus>>,
}

impl StatusTracker {
    pub fn new(identifiers: &[ObjMetadata]) -> Self {
        Self {
            statuses: identifiers.iter().map(|id| (id.clone(), None)).collect(),
        }
    }

    /// Record a status; statuses for untracked identifiers are ignored
    pub fn update(&mut self, status: ResourceStatus) {
        if let Some(slot) = self.statuses.get_mut(&status.identifier) {
            *slot = Some(status);
        }
    }

    /// True once every resource has been seen with `desired`
    pub fn all_reached(&self, desired: &Status) -> bool {
        self.statuses
            .values()
            .all(|s| s.as_ref().is_some_and(|s| &s.status == desired))
    }

    /// Resources currently reporting `Failed`
    pub fn failed(&self) -> Vec<&ResourceStatus> {
        self.statuses
            .values()
            .flatten()
            .filter(|s| s.status == Status::FAILED)
            .collect()
    }

    /// Resources not yet at `desired`, including ones never reported
    pub fn pending(&self, desired: &Status) -> Vec<&ObjMetadata> {
        self.statuses
            .iter()
            .filter(|(_, s)| s.as_ref().is_none_or(|s| &s.status != desired))
            .map(|(id, _)| id)
            .collect()
    }

    /// Latest statuses in identifier order
    pub fn statuses(&self) -> impl Iterator<Item = &ResourceStatus> {
        self.statuses.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}
