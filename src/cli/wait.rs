// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use anyhow::{Result, bail};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::status::Session;
use super::{BundleArgs, OutputFormat};
use crate::config::Config;
use crate::output::StatusTable;
use crate::poller::{Event, PollOptions, StatusTracker};
use crate::progress::{create_spinner, summary};
use crate::status::{Expression, GroupKind, Status};

#[derive(Debug, PartialEq, Eq)]
enum WaitOutcome {
    Reached,
    Failed,
    TimedOut,
    Interrupted,
    Closed,
}

pub struct WaitOptions {
    pub interval: Option<Duration>,
    pub timeout: Option<Duration>,
    pub no_cache: bool,
    pub overrides: Vec<(GroupKind, Expression)>,
    pub status: String,
}

pub async fn run_wait(
    bundle: &BundleArgs,
    context: Option<&str>,
    config: &Config,
    wait: WaitOptions,
) -> Result<()> {
    let session = Session::open(bundle, context, config).await?;

    let mut overrides = config.override_expressions()?;
    overrides.extend(wait.overrides);
    let options = PollOptions {
        poll_interval: wait.interval.unwrap_or(config.poll_interval),
        use_cache: config.use_cache && !wait.no_cache,
        emit_unchanged: false,
        overrides,
    };
    let timeout = wait.timeout.unwrap_or(config.timeout);
    let desired = Status::new(wait.status);

    info!(
        resources = session.identifiers.len(),
        desired = %desired,
        timeout = %humantime::format_duration(timeout),
        "Waiting for resources"
    );

    let mut tracker = StatusTracker::new(&session.identifiers);
    let token = CancellationToken::new();
    let events = session.poller.poll(token.clone(), session.identifiers, options);

    let spinner = create_spinner(&format!("Waiting for resources to become {}...", desired));
    let outcome = tokio::select! {
        outcome = track(events, &mut tracker, &desired, |line| spinner.set_message(line)) => {
            outcome
        }
        _ = tokio::time::sleep(timeout) => WaitOutcome::TimedOut,
        _ = tokio::signal::ctrl_c() => WaitOutcome::Interrupted,
    };
    token.cancel();
    spinner.finish_and_clear();

    println!(
        "{}",
        StatusTable::from_statuses(tracker.statuses(), true).format(&OutputFormat::Table, false)
    );

    match outcome {
        WaitOutcome::Reached => Ok(()),
        WaitOutcome::Failed => {
            let failed: Vec<String> = tracker
                .failed()
                .iter()
                .map(|s| s.identifier.to_string())
                .collect();
            bail!("Resources failed: {}", failed.join(", "))
        }
        WaitOutcome::TimedOut => {
            let pending: Vec<String> = tracker
                .pending(&desired)
                .iter()
                .map(|id| id.to_string())
                .collect();
            bail!(
                "Timed out after {} waiting for: {}",
                humantime::format_duration(timeout),
                pending.join(", ")
            )
        }
        WaitOutcome::Interrupted => bail!("Interrupted"),
        WaitOutcome::Closed => bail!("Status poller stopped unexpectedly"),
    }
}

/// Consume events until every resource reached `desired` or one failed.
/// Decisions are only taken at tick boundaries.
async fn track(
    mut events: mpsc::Receiver<Event>,
    tracker: &mut StatusTracker,
    desired: &Status,
    mut report: impl FnMut(String),
) -> WaitOutcome {
    while let Some(event) = events.recv().await {
        match event {
            Event::ResourceUpdate(status) => {
                debug!(resource = %status.identifier, status = %status.status, "Status changed");
                tracker.update(status);
            }
            Event::SyncFailed(e) => {
                warn!(error = %e, "Sync failed, retrying next tick");
                report(format!("Sync failed: {}", e));
            }
            Event::TickComplete => {
                report(summary(tracker, desired));
                if tracker.all_reached(desired) {
                    return WaitOutcome::Reached;
                }
                if *desired != Status::FAILED && !tracker.failed().is_empty() {
                    return WaitOutcome::Failed;
                }
            }
        }
    }
    WaitOutcome::Closed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::poller::ResourceStatus;
    use crate::status::{ComputedStatus, ObjMetadata};
    use std::sync::Arc;

    fn id(name: &str) -> ObjMetadata {
        ObjMetadata::new(GroupKind::new("apps", "Deployment"), "apps", name)
    }

    fn update(name: &str, status: ComputedStatus) -> Event {
        Event::ResourceUpdate(ResourceStatus::new(id(name), status))
    }

    async fn run(events: Vec<Event>, desired: Status) -> (WaitOutcome, Vec<String>) {
        let (tx, rx) = mpsc::channel(events.len().max(1));
        for event in events {
            tx.send(event).await.unwrap();
        }
        drop(tx);

        let mut tracker = StatusTracker::new(&[id("a"), id("b")]);
        let mut lines = Vec::new();
        let outcome = track(rx, &mut tracker, &desired, |l| lines.push(l)).await;
        (outcome, lines)
    }

    #[tokio::test]
    async fn test_reached_at_tick_boundary() {
        let (outcome, lines) = run(
            vec![
                update("a", ComputedStatus::current("ok")),
                update("b", ComputedStatus::in_progress("rolling")),
                Event::TickComplete,
                update("b", ComputedStatus::current("ok")),
                Event::TickComplete,
            ],
            Status::CURRENT,
        )
        .await;
        assert_eq!(outcome, WaitOutcome::Reached);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("1/2"));
    }

    #[tokio::test]
    async fn test_failed_stops_early() {
        let (outcome, _) = run(
            vec![
                update("a", ComputedStatus::failed("crashloop")),
                Event::TickComplete,
                update("a", ComputedStatus::current("ok")),
                update("b", ComputedStatus::current("ok")),
                Event::TickComplete,
            ],
            Status::CURRENT,
        )
        .await;
        assert_eq!(outcome, WaitOutcome::Failed);
    }

    #[tokio::test]
    async fn test_sync_failure_is_reported_and_tolerated() {
        let (outcome, lines) = run(
            vec![
                Event::SyncFailed(Arc::new(Error::Timeout {
                    what: "list deployments".to_string(),
                })),
                update("a", ComputedStatus::current("ok")),
                update("b", ComputedStatus::current("ok")),
                Event::TickComplete,
            ],
            Status::CURRENT,
        )
        .await;
        assert_eq!(outcome, WaitOutcome::Reached);
        assert!(lines[0].starts_with("Sync failed"));
    }

    #[tokio::test]
    async fn test_closed_channel() {
        let (outcome, _) = run(
            vec![update("a", ComputedStatus::current("ok"))],
            Status::CURRENT,
        )
        .await;
        assert_eq!(outcome, WaitOutcome::Closed);
    }
}
