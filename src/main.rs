// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod bundle;
mod cli;
pub mod config;
mod error;
mod kubernetes;
mod output;
mod poller;
pub mod progress;
mod status;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Mutex;
use tracing_subscriber::prelude::*;

use cli::{Args, Command, WaitOptions};

/// Initialize logging with file output and optional stderr
fn init_logging(verbose: bool) {
    use tracing_rolling_file::{RollingConditionBase, RollingFileAppenderBase};
    use tracing_subscriber::fmt::format::FmtSpan;

    let log_dir = config::base_dir()
        .map(|p| p.join("log"))
        .unwrap_or_else(|_| std::path::PathBuf::from("."));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Could not create log directory: {}", e);
        return;
    }

    // Rotate daily or at 10MB, keeping 5 files
    let log_path = log_dir.join("k8status.log");
    let condition = RollingConditionBase::new()
        .daily()
        .max_size(10 * 1024 * 1024);

    let file_appender = match RollingFileAppenderBase::new(log_path, condition, 5) {
        Ok(appender) => appender,
        Err(e) => {
            eprintln!("Warning: Could not create log file: {}", e);
            return;
        }
    };

    let filter = if verbose { "k8status=debug" } else { "k8status=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(file_appender))
        .with_ansi(false)
        .with_span_events(FmtSpan::NONE);

    let stderr_layer = verbose.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::NONE)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (aws-lc-rs)
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("Failed to install rustls crypto provider");
    }

    let args = Args::parse();
    init_logging(args.verbose);

    let config = config::Config::load()?;
    let context = args.context.as_deref();

    match args.command {
        Command::Status {
            bundle,
            output,
            no_headers,
            wide,
        } => cli::run_status(&bundle, context, &config, &output, no_headers, wide).await,
        Command::Wait {
            bundle,
            interval,
            timeout,
            no_cache,
            overrides,
            status,
        } => {
            let wait = WaitOptions {
                interval,
                timeout,
                no_cache,
                overrides,
                status,
            };
            cli::run_wait(&bundle, context, &config, wait).await
        }
        Command::Config => {
            let path = config::Config::config_path()?;
            let content =
                serde_json::to_string_pretty(&config).context("Failed to serialize config")?;
            println!("# {}\n{}", path.display(), content);
            Ok(())
        }
    }
}
