// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{BundleArgs, OutputFormat};
use crate::bundle::Bundle;
use crate::config::Config;
use crate::kubernetes::{ClusterClient, KubeClusterClient, RestMapper};
use crate::output::StatusTable;
use crate::poller::{Event, PollOptions, ResourceStatus, StatusPoller};
use crate::progress::create_spinner;
use crate::status::{ComputedStatus, ObjMetadata, Status, StatusMap};

/// A connected poller plus the documents it should track
pub(super) struct Session {
    pub client: Arc<dyn ClusterClient>,
    pub status_map: Option<Arc<StatusMap>>,
    pub poller: StatusPoller,
    pub documents: Bundle,
    pub identifiers: Vec<ObjMetadata>,
}

impl Session {
    pub async fn open(bundle: &BundleArgs, context: Option<&str>, config: &Config) -> Result<Self> {
        let documents = Bundle::load(&bundle.paths)?;
        let extra_crds = Bundle::load(&bundle.crds)?;

        let spinner = create_spinner("Connecting to Kubernetes...");
        let client = KubeClusterClient::connect(context.or(config.context.as_deref())).await;
        let client = match client {
            Ok(client) => client,
            Err(e) => {
                spinner.finish_and_clear();
                return Err(e);
            }
        };

        let mut mapper = RestMapper::builtin();
        if config.discovery {
            spinner.set_message(format!("Discovering resources on {}...", client.context()));
            match RestMapper::discover(client.client()).await {
                Ok(discovered) => mapper.merge(&discovered),
                Err(e) => warn!(error = %e, "API discovery failed, using built-in mappings"),
            }
        }

        let client: Arc<dyn ClusterClient> = Arc::new(client);
        let status_map = if bundle.crds_from_cluster {
            spinner.set_message("Reading CRDs from cluster...");
            StatusMap::from_cluster(client.as_ref()).await
        } else {
            let crds = documents.crds().chain(extra_crds.crds()).cloned();
            StatusMap::new(&Bundle::from_documents(crds))
        };
        spinner.finish_and_clear();
        let status_map = status_map.context("Failed to build status map")?;

        Self::new(client, mapper, status_map, documents)
    }

    fn new(
        client: Arc<dyn ClusterClient>,
        mapper: RestMapper,
        status_map: StatusMap,
        documents: Bundle,
    ) -> Result<Self> {
        let identifiers = documents
            .identifiers()
            .context("Bundle contains an invalid document")?;
        if identifiers.is_empty() {
            bail!("No resources found in bundle");
        }

        info!(
            resources = identifiers.len(),
            custom_kinds = status_map.group_kinds().len(),
            "Opened session"
        );

        let status_map = (!status_map.is_empty()).then(|| Arc::new(status_map));
        Ok(Self {
            poller: StatusPoller::new(client.clone(), mapper, status_map.clone()),
            client,
            status_map,
            documents,
            identifiers,
        })
    }

    /// Status of every document, in bundle order.
    ///
    /// Kinds with status checks are read straight from their status map; the
    /// rest, and kinds with an override, go through one poller tick.
    pub async fn read_statuses(&self, options: PollOptions) -> Result<Vec<ResourceStatus>> {
        let mut statuses: HashMap<ObjMetadata, ResourceStatus> = HashMap::new();
        let mut seen = HashSet::new();
        let mut polled = Vec::new();

        for document in self.documents.documents() {
            let identifier = ObjMetadata::from_object(document)?;
            if !seen.insert(identifier.clone()) {
                continue;
            }
            match &self.status_map {
                Some(map)
                    if map.contains(&identifier.group_kind)
                        && !options.overrides.contains_key(&identifier.group_kind) =>
                {
                    let status =
                        annotated_status(map, self.client.as_ref(), identifier, document).await;
                    statuses.insert(status.identifier.clone(), status);
                }
                _ => polled.push(identifier),
            }
        }

        if !polled.is_empty() {
            debug!(resources = polled.len(), "Polling remaining resources");
            for status in read_once(&self.poller, polled, options).await? {
                statuses.insert(status.identifier.clone(), status);
            }
        }

        Ok(self
            .identifiers
            .iter()
            .filter_map(|id| statuses.remove(id))
            .collect())
    }
}

async fn annotated_status(
    map: &StatusMap,
    client: &dyn ClusterClient,
    identifier: ObjMetadata,
    document: &Value,
) -> ResourceStatus {
    match map.get_status_for_resource(client, document).await {
        Ok(status) => {
            let kind = &identifier.group_kind.kind;
            let message = if status == Status::UNKNOWN {
                format!("{} matches no status check", kind)
            } else {
                format!("{} is {}", kind, status)
            };
            ResourceStatus::new(identifier, ComputedStatus::new(status, message))
        }
        Err(e) => ResourceStatus::from_error(identifier, e),
    }
}

/// Read the status of every resource once
async fn read_once(
    poller: &StatusPoller,
    identifiers: Vec<ObjMetadata>,
    options: PollOptions,
) -> Result<Vec<ResourceStatus>> {
    let token = CancellationToken::new();
    let mut events = poller.poll(token.clone(), identifiers, options);
    let _guard = token.drop_guard();

    let mut statuses = Vec::new();
    while let Some(event) = events.recv().await {
        match event {
            Event::ResourceUpdate(status) => statuses.push(status),
            Event::SyncFailed(e) => bail!("Failed to read resources: {}", e),
            Event::TickComplete => return Ok(statuses),
        }
    }
    bail!("Status poller stopped before reporting")
}

pub async fn run_status(
    bundle: &BundleArgs,
    context: Option<&str>,
    config: &Config,
    output: &OutputFormat,
    no_headers: bool,
    wide: bool,
) -> Result<()> {
    let session = Session::open(bundle, context, config).await?;
    let options = PollOptions {
        use_cache: config.use_cache,
        overrides: config.override_expressions()?,
        ..PollOptions::default()
    };

    let statuses = session.read_statuses(options).await?;
    println!(
        "{}",
        StatusTable::from_statuses(&statuses, wide).format(output, no_headers)
    );

    for status in statuses.iter().filter(|s| s.error.is_some()) {
        eprintln!("Warning: {}: {}", status.identifier, status.message);
    }
    Ok(())
}
