// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Label selector evaluation for finding the resources a workload generates

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::status::object;

/// `spec.selector` of a workload, if it has one
pub fn workload_selector(obj: &Value) -> Result<Option<LabelSelector>> {
    match object::nested(obj, &["spec", "selector"]) {
        Some(Value::Null) | None => Ok(None),
        Some(selector) => Ok(Some(serde_json::from_value(selector.clone())?)),
    }
}

/// Checks if a label selector matches the given labels.
/// An empty selector matches everything.
pub fn selector_matches(selector: &LabelSelector, labels: &BTreeMap<String, String>) -> bool {
    if let Some(match_labels) = &selector.match_labels {
        for (key, value) in match_labels {
            if labels.get(key) != Some(value) {
                return false;
            }
        }
    }

    if let Some(match_expressions) = &selector.match_expressions {
        for expr in match_expressions {
            if !requirement_matches(expr, labels) {
                return false;
            }
        }
    }

    true
}

fn requirement_matches(expr: &LabelSelectorRequirement, labels: &BTreeMap<String, String>) -> bool {
    let label_value = labels.get(&expr.key);
    let values = expr.values.as_deref().unwrap_or_default();

    match expr.operator.as_str() {
        "In" => label_value.is_some_and(|v| values.contains(v)),
        "NotIn" => label_value.is_none_or(|v| !values.contains(v)),
        "Exists" => label_value.is_some(),
        "DoesNotExist" => label_value.is_none(),
        _ => false,
    }
}
