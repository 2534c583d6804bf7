// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Status polling engine
//!
//! [`StatusPoller::poll`] spawns a task that, every poll interval, syncs a
//! cluster reader against the tracked identifiers, computes each resource's
//! status with the reader registered for its GroupKind, and streams
//! [`Event`]s until the cancellation token fires or the receiver is dropped.

pub mod aggregator;
pub mod cluster_reader;
pub mod event;
pub mod readers;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::kubernetes::{ClusterClient, RestMapper};
use crate::status::compute::compute_fn;
use crate::status::{Expression, GroupKind, ObjMetadata, StatusMap};
use cluster_reader::{CachingClusterReader, ClusterReader, DirectClusterReader};
use readers::{CustomResourceReader, GenericStatusReader, StatusReader, WorkloadStatusReader};

pub use aggregator::StatusTracker;
pub use event::{Event, ResourceStatus};

/// Default time between ticks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Buffered events before the poll task waits for the consumer
const EVENT_CHANNEL_SIZE: usize = 64;

#[derive(Debug, Clone)]
pub struct PollOptions {
    pub poll_interval: Duration,
    /// List each `(GroupKind, namespace)` once per tick instead of one get per resource
    pub use_cache: bool,
    /// Emit every resource every tick, not only the ones whose status changed
    pub emit_unchanged: bool,
    /// Per-run conditions replacing the status computation of a kind
    pub overrides: HashMap<GroupKind, Expression>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            use_cache: true,
            emit_unchanged: true,
            overrides: HashMap::new(),
        }
    }
}

pub struct StatusPoller {
    client: Arc<dyn ClusterClient>,
    mapper: Arc<RestMapper>,
    status_map: Option<Arc<StatusMap>>,
}

impl StatusPoller {
    /// The status map's REST mappings are merged into `mapper`
    pub fn new(
        client: Arc<dyn ClusterClient>,
        mut mapper: RestMapper,
        status_map: Option<Arc<StatusMap>>,
    ) -> Self {
        if let Some(status_map) = &status_map {
            mapper.merge(status_map.rest_mapper());
        }
        Self {
            client,
            mapper: Arc::new(mapper),
            status_map,
        }
    }

    /// Start polling. Returns immediately; the channel closes when `token`
    /// is cancelled.
    pub fn poll(
        &self,
        token: CancellationToken,
        identifiers: Vec<ObjMetadata>,
        options: PollOptions,
    ) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_SIZE);

        let cluster_reader: Arc<dyn ClusterReader> = if options.use_cache {
            Arc::new(CachingClusterReader::new(
                self.client.clone(),
                self.mapper.clone(),
            ))
        } else {
            Arc::new(DirectClusterReader::new(
                self.client.clone(),
                self.mapper.clone(),
            ))
        };
        let (readers, default_reader) = self.status_readers(&cluster_reader, &options.overrides);

        let runner = Runner {
            identifiers,
            options,
            cluster_reader,
            readers,
            default_reader,
            previous: HashMap::new(),
            tx,
            token,
        };
        tokio::spawn(runner.run());
        rx
    }

    /// Readers by GroupKind plus the fallback reader.
    ///
    /// Built-in workloads first, then kinds with status checks, then
    /// overrides, which replace whatever was registered for their kind.
    fn status_readers(
        &self,
        cluster_reader: &Arc<dyn ClusterReader>,
        overrides: &HashMap<GroupKind, Expression>,
    ) -> (HashMap<GroupKind, Arc<dyn StatusReader>>, Arc<dyn StatusReader>) {
        let reader = cluster_reader.clone();
        let mapper = self.mapper.clone();

        let generic: Arc<dyn StatusReader> = Arc::new(GenericStatusReader::new(
            reader.clone(),
            mapper.clone(),
            compute_fn(),
        ));
        let replica_set: Arc<dyn StatusReader> = Arc::new(WorkloadStatusReader::replica_set(
            reader.clone(),
            mapper.clone(),
            generic.clone(),
        ));
        let deployment: Arc<dyn StatusReader> = Arc::new(WorkloadStatusReader::deployment(
            reader.clone(),
            mapper.clone(),
            replica_set.clone(),
        ));
        let stateful_set: Arc<dyn StatusReader> = Arc::new(WorkloadStatusReader::stateful_set(
            reader.clone(),
            mapper.clone(),
            generic.clone(),
        ));

        let mut readers: HashMap<GroupKind, Arc<dyn StatusReader>> = HashMap::from([
            (GroupKind::new("apps", "Deployment"), deployment),
            (GroupKind::new("apps", "ReplicaSet"), replica_set),
            (GroupKind::new("apps", "StatefulSet"), stateful_set),
        ]);

        let custom_kinds: Vec<&GroupKind> = self
            .status_map
            .iter()
            .flat_map(|m| m.group_kinds())
            .chain(overrides.keys())
            .collect();
        if !custom_kinds.is_empty() {
            let status_func = match &self.status_map {
                Some(status_map) => status_map.status_func(),
                None => compute_fn(),
            };
            let custom: Arc<dyn StatusReader> = Arc::new(CustomResourceReader::new(
                reader,
                mapper,
                status_func,
                overrides.clone(),
            ));
            for group_kind in custom_kinds {
                if overrides.contains_key(group_kind) || !readers.contains_key(group_kind) {
                    readers.insert(group_kind.clone(), custom.clone());
                }
            }
        }

        (readers, generic)
    }
}

struct Runner {
    identifiers: Vec<ObjMetadata>,
    options: PollOptions,
    cluster_reader: Arc<dyn ClusterReader>,
    readers: HashMap<GroupKind, Arc<dyn StatusReader>>,
    default_reader: Arc<dyn StatusReader>,
    previous: HashMap<ObjMetadata, ResourceStatus>,
    tx: mpsc::Sender<Event>,
    token: CancellationToken,
}

impl Runner {
    async fn run(mut self) {
        info!(
            resources = self.identifiers.len(),
            interval = %humantime::format_duration(self.options.poll_interval),
            use_cache = self.options.use_cache,
            "Polling started"
        );

        let mut interval = tokio::time::interval(self.options.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                _ = interval.tick() => {}
            }
            if !self.tick().await {
                break;
            }
        }

        debug!("Polling stopped");
    }

    /// One sync pass plus one status per resource. False once the run should end.
    async fn tick(&mut self) -> bool {
        let synced = tokio::select! {
            biased;
            _ = self.token.cancelled() => return false,
            result = self.cluster_reader.sync(&self.identifiers) => result,
        };
        if let Err(e) = synced {
            warn!(error = %e, "Sync failed");
            return self.send(Event::SyncFailed(Arc::new(e))).await;
        }

        for identifier in self.identifiers.clone() {
            let reader = self
                .readers
                .get(&identifier.group_kind)
                .unwrap_or(&self.default_reader)
                .clone();
            let mut status = tokio::select! {
                biased;
                _ = self.token.cancelled() => return false,
                status = reader.read_status(&identifier) => status,
            };
            // report under the identifier the caller asked for
            status.identifier = identifier.clone();

            let changed = self
                .previous
                .get(&identifier)
                .is_none_or(|prev| !prev.same_state(&status));
            if changed {
                debug!(
                    resource = %identifier,
                    status = %status.status,
                    message = %status.message,
                    "Status changed"
                );
            }
            self.previous.insert(identifier, status.clone());

            if (changed || self.options.emit_unchanged)
                && !self.send(Event::ResourceUpdate(status)).await
            {
                return false;
            }
        }

        self.send(Event::TickComplete).await
    }

    /// False when cancelled or the receiver is gone
    async fn send(&self, event: Event) -> bool {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => false,
            sent = self.tx.send(event) => sent.is_ok(),
        }
    }
}
