// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Terminal progress reporting for `wait`

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::poller::StatusTracker;
use crate::status::Status;

/// Create a spinner with consistent styling
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.cyan} {msg} {elapsed:.dim}")
    {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// One-line summary of a run, e.g. "2/3 resources Current (waiting for ...)"
pub fn summary(tracker: &StatusTracker, desired: &Status) -> String {
    let pending = tracker.pending(desired);
    let done = tracker.len() - pending.len();
    match pending.first() {
        Some(first) => format!(
            "{}/{} resources {} (waiting for {})",
            done,
            tracker.len(),
            desired,
            first
        ),
        None => format!("{}/{} resources {}", done, tracker.len(), desired),
    }
}
