use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::Date;

use super::todo::Todo;

/// Completion summary for every todo sharing one `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeMetrics {
    #[serde(rename = "type")]
    pub kind: String,
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub not_completed_tasks: u64,
    pub total_effort: i64,
    pub completion_percentage: f64,
}

impl TypeMetrics {
    pub fn new(kind: String, completed: u64, not_completed: u64, total_effort: i64) -> Self {
        let total = completed + not_completed;
        Self {
            kind,
            total_tasks: total,
            completed_tasks: completed,
            not_completed_tasks: not_completed,
            total_effort,
            completion_percentage: completion_percentage(completed, total),
        }
    }
}

pub fn completion_percentage(completed: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    completed as f64 / total as f64 * 100.0
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct PartitionKey {
    date: Date,
    kind: String,
    done: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PartitionTotals {
    count: u64,
    effort: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("task totals overflowed for type {kind:?}")]
pub struct TotalsOverflow {
    pub kind: String,
}

/// Two-stage grouping: first by (creation date, type, done), then by type.
/// Rows come back ordered by type.
pub fn aggregate(todos: &[Todo]) -> Result<Vec<TypeMetrics>, TotalsOverflow> {
    summarize_by_kind(partition(todos)?)
}

fn partition(todos: &[Todo]) -> Result<BTreeMap<PartitionKey, PartitionTotals>, TotalsOverflow> {
    let mut partitions: BTreeMap<PartitionKey, PartitionTotals> = BTreeMap::new();
    for todo in todos {
        let key = PartitionKey {
            date: todo.created.date(),
            kind: todo.kind.clone(),
            done: todo.done,
        };
        let totals = partitions.entry(key).or_default();
        totals.count = totals.count.checked_add(1).ok_or_else(|| overflow(&todo.kind))?;
        totals.effort = totals
            .effort
            .checked_add(todo.effort_hr)
            .ok_or_else(|| overflow(&todo.kind))?;
    }
    Ok(partitions)
}

fn summarize_by_kind(
    partitions: BTreeMap<PartitionKey, PartitionTotals>,
) -> Result<Vec<TypeMetrics>, TotalsOverflow> {
    // (completed, not completed, effort)
    let mut by_kind: BTreeMap<String, (u64, u64, i64)> = BTreeMap::new();
    for (key, totals) in partitions {
        let entry = by_kind.entry(key.kind.clone()).or_default();
        let count = if key.done { &mut entry.0 } else { &mut entry.1 };
        *count = count.checked_add(totals.count).ok_or_else(|| overflow(&key.kind))?;
        entry.2 = entry
            .2
            .checked_add(totals.effort)
            .ok_or_else(|| overflow(&key.kind))?;
    }
    by_kind
        .into_iter()
        .map(|(kind, (completed, not_completed, effort))| {
            if completed.checked_add(not_completed).is_none() {
                return Err(overflow(&kind));
            }
            Ok(TypeMetrics::new(kind, completed, not_completed, effort))
        })
        .collect()
}

fn overflow(kind: &str) -> TotalsOverflow {
    TotalsOverflow {
        kind: kind.to_string(),
    }
}
