// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::status::{Expression, GroupKind};

#[derive(Parser, Debug)]
#[command(name = "k8status")]
#[command(author, version, about = "Report and wait for Kubernetes resource status")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Kubernetes context to use (defaults to the configured or current context)
    #[arg(short, long, global = true, value_name = "CONTEXT", env = "K8STATUS_CONTEXT")]
    pub context: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the current status of every resource in a bundle
    Status {
        #[command(flatten)]
        bundle: BundleArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        output: OutputFormat,

        /// Omit column headers in output
        #[arg(long)]
        no_headers: bool,

        /// Include namespace and message columns
        #[arg(short, long)]
        wide: bool,
    },

    /// Poll until every resource in a bundle reaches a status
    Wait {
        #[command(flatten)]
        bundle: BundleArgs,

        /// Time between polls (e.g. "2s", "500ms")
        #[arg(long, value_parser = humantime::parse_duration)]
        interval: Option<Duration>,

        /// Give up after this long (e.g. "10m")
        #[arg(long, value_parser = humantime::parse_duration)]
        timeout: Option<Duration>,

        /// Get each resource individually instead of listing per kind and namespace
        #[arg(long)]
        no_cache: bool,

        /// Replace the status computation of a kind: GROUP/KIND=CONDITION
        #[arg(
            long = "override",
            value_name = "GROUP/KIND=CONDITION",
            value_parser = parse_override
        )]
        overrides: Vec<(GroupKind, Expression)>,

        /// Status every resource must reach
        #[arg(long, default_value = "Current")]
        status: String,
    },

    /// Print the effective configuration
    Config,
}

/// Where resources and their status checks come from
#[derive(clap::Args, Debug, Clone)]
pub struct BundleArgs {
    /// Manifest files or directories
    #[arg(short = 'f', long = "filename", required = true, num_args = 1..)]
    pub paths: Vec<PathBuf>,

    /// Extra files or directories holding annotated CRDs
    #[arg(long)]
    pub crds: Vec<PathBuf>,

    /// Read annotated CRDs from the cluster instead of the bundle
    #[arg(long)]
    pub crds_from_cluster: bool,
}

#[derive(ValueEnum, Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

/// Parse `GROUP/KIND=CONDITION`; a bare `KIND=CONDITION` is a core kind
fn parse_override(s: &str) -> Result<(GroupKind, Expression), String> {
    let (target, condition) = s
        .split_once('=')
        .ok_or_else(|| format!("expected GROUP/KIND=CONDITION, got {:?}", s))?;
    let group_kind = match target.rsplit_once('/') {
        Some((group, kind)) => GroupKind::new(group, kind),
        None => GroupKind::new("", target),
    };
    if group_kind.kind.is_empty() {
        return Err(format!("missing kind in {:?}", s));
    }

    let expression = Expression::new(condition);
    expression.compile().map_err(|e| e.to_string())?;
    Ok((group_kind, expression))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_override() {
        let (gk, expr) =
            parse_override(r#"example.com/Resource=@.status.state=="stable""#).unwrap();
        assert_eq!(gk, GroupKind::new("example.com", "Resource"));
        assert_eq!(expr.condition(), r#"@.status.state=="stable""#);
    }

    #[test]
    fn test_parse_override_core_kind() {
        let (gk, _) = parse_override(r#"Pod=@.status.phase=="Running""#).unwrap();
        assert_eq!(gk, GroupKind::new("", "Pod"));
    }

    #[test]
    fn test_parse_override_invalid() {
        assert!(parse_override("example.com/Resource").is_err());
        assert!(parse_override("example.com/=@.x==1").is_err());
        assert!(parse_override("example.com/Resource=@.status[").is_err());
    }

    #[test]
    fn test_wait_args() {
        let args = Args::try_parse_from([
            "k8status",
            "wait",
            "-f",
            "manifests/",
            "--interval",
            "500ms",
            "--timeout",
            "1m",
            "--override",
            r#"example.com/Resource=@.status.state=="stable""#,
        ])
        .unwrap();
        match args.command {
            Command::Wait {
                bundle,
                interval,
                timeout,
                overrides,
                status,
                no_cache,
            } => {
                assert_eq!(bundle.paths, vec![PathBuf::from("manifests/")]);
                assert_eq!(interval, Some(Duration::from_millis(500)));
                assert_eq!(timeout, Some(Duration::from_secs(60)));
                assert_eq!(overrides.len(), 1);
                assert_eq!(status, "Current");
                assert!(!no_cache);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_status_requires_files() {
        assert!(Args::try_parse_from(["k8status", "status"]).is_err());
        let args = Args::try_parse_from([
            "k8status", "status", "-f", "a.yaml", "-o", "json", "-c", "kind",
        ])
        .unwrap();
        assert_eq!(args.context.as_deref(), Some("kind"));
        assert!(matches!(
            args.command,
            Command::Status {
                output: OutputFormat::Json,
                ..
            }
        ));
    }
}
