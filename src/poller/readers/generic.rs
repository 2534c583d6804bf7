// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::{StatusReader, identifier_of, lookup};
use crate::kubernetes::RestMapper;
use crate::poller::cluster_reader::ClusterReader;
use crate::poller::event::ResourceStatus;
use crate::status::{ObjMetadata, StatusFunc};

/// Fallback reader: applies a [`StatusFunc`] to the object itself
pub struct GenericStatusReader {
    reader: Arc<dyn ClusterReader>,
    mapper: Arc<RestMapper>,
    status_func: StatusFunc,
}

impl GenericStatusReader {
    pub fn new(
        reader: Arc<dyn ClusterReader>,
        mapper: Arc<RestMapper>,
        status_func: StatusFunc,
    ) -> Self {
        Self {
            reader,
            mapper,
            status_func,
        }
    }
}

#[async_trait]
impl StatusReader for GenericStatusReader {
    async fn read_status(&self, identifier: &ObjMetadata) -> ResourceStatus {
        match lookup(self.reader.as_ref(), &self.mapper, identifier).await {
            Ok(obj) => self.read_status_for_object(&obj).await,
            Err(e) => ResourceStatus::from_error(identifier.clone(), e),
        }
    }

    async fn read_status_for_object(&self, obj: &Value) -> ResourceStatus {
        let identifier = identifier_of(obj);
        match (self.status_func)(obj) {
            Ok(computed) => ResourceStatus::new(identifier, computed).with_resource(obj),
            Err(e) => ResourceStatus::unknown(identifier, e),
        }
    }
}
