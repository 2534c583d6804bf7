// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod json;
mod table;
mod yaml;

pub use json::JsonFormatter;
pub use table::TableFormatter;
pub use yaml::YamlFormatter;

use serde_json::{Map, Value};

use crate::cli::OutputFormat;
use crate::poller::ResourceStatus;

/// Rows of resource statuses ready for printing
#[derive(Debug, Clone)]
pub struct StatusTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl StatusTable {
    /// Kind/Name/Status rows; `wide` adds namespace and message
    pub fn from_statuses<'a>(
        statuses: impl IntoIterator<Item = &'a ResourceStatus>,
        wide: bool,
    ) -> Self {
        let mut columns = vec!["kind", "name"];
        if wide {
            columns.push("namespace");
        }
        columns.push("status");
        if wide {
            columns.push("message");
        }

        let rows = statuses
            .into_iter()
            .map(|s| {
                let id = &s.identifier;
                let mut row = vec![id.group_kind.kind.clone(), id.name.clone()];
                if wide {
                    row.push(id.namespace.clone());
                }
                row.push(s.status.to_string());
                if wide {
                    row.push(s.message.clone());
                }
                row
            })
            .collect();

        Self {
            columns: columns.into_iter().map(String::from).collect(),
            rows,
        }
    }

    pub fn format(&self, format: &OutputFormat, no_headers: bool) -> String {
        match format {
            OutputFormat::Table => TableFormatter::format(self, no_headers),
            OutputFormat::Json => JsonFormatter::format(self),
            OutputFormat::Yaml => YamlFormatter::format(self),
        }
    }

    /// One JSON object per row, keyed by column name
    pub fn to_json_rows(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let object: Map<String, Value> = self
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(col, val)| (col.clone(), Value::String(val.clone())))
                    .collect();
                Value::Object(object)
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
