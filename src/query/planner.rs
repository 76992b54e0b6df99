//! Strategy selection
//!
//! # Strategy Priority (strict order)
//!
//! 1. Emulated: the primary link produced no values, nothing can match
//! 2. Primary key lookup: the condition names exact primary keys
//! 3. Index length: unfiltered, unwindowed count
//! 4. Script scan: everything else
//!
//! The script is compiled before the choice is made, so an invalid
//! condition is rejected even when a cheaper strategy would apply.

use std::collections::BTreeMap;

use crate::script::{self, CompileResult, CompiledScript, Operation};

use super::condition::{ConditionNode, Operand, Value};
use super::descriptor::{QueryDescriptor, SupportsPagination};
use super::keys;
use super::row::Row;
use super::schema::RecordType;

/// How a query will be executed
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    Emulated,
    /// Normalized primary keys, deduplicated, in condition order
    PrimaryKey(Vec<String>),
    IndexLength,
    Script(CompiledScript),
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Emulated => "EMULATED",
            Strategy::PrimaryKey(_) => "PK_LOOKUP",
            Strategy::IndexLength => "INDEX_LENGTH",
            Strategy::Script(_) => "SCRIPT_SCAN",
        }
    }
}

/// A validated, executable plan
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub operation: Operation,
    pub column: Option<String>,
    pub strategy: Strategy,
}

/// Chooses a strategy for a descriptor whose primary link is resolved.
pub fn plan(
    record_type: &RecordType,
    query: &QueryDescriptor,
    operation: Operation,
    column: Option<&str>,
) -> CompileResult<QueryPlan> {
    script::validate(query)?;
    let column = operation.target_column(column)?.map(str::to_string);

    let compiled = script::compile(record_type, query, operation, column.as_deref())?;

    let strategy = if query.emulate_execution {
        Strategy::Emulated
    } else if let Some(keys) = query
        .condition
        .as_ref()
        .and_then(|c| primary_key_candidates(record_type, c))
    {
        Strategy::PrimaryKey(keys)
    } else if operation == Operation::Count
        && query.condition.is_none()
        && query.window().is_unbounded()
        && query.primary.is_none()
    {
        Strategy::IndexLength
    } else {
        Strategy::Script(compiled)
    };

    Ok(QueryPlan {
        operation,
        column,
        strategy,
    })
}

/// Returns the normalized primary keys a condition names exactly, or `None`
/// when the condition is not a pure primary-key selection.
pub fn primary_key_candidates(
    record_type: &RecordType,
    condition: &ConditionNode,
) -> Option<Vec<String>> {
    let pk = &record_type.primary_key;
    let candidates = match condition {
        ConditionNode::Hash(pairs) => hash_candidates(pk, pairs)?,
        ConditionNode::Operator(name, operands)
            if script::normalize_operator(name) == "in" && operands.len() == 2 =>
        {
            in_candidates(pk, &operands[0], &operands[1])?
        }
        _ => return None,
    };

    let mut seen = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let key = keys::normalize_key(&candidate);
        if !seen.contains(&key) {
            seen.push(key);
        }
    }
    Some(seen)
}

fn same_columns(pk: &[String], columns: &[&str]) -> bool {
    pk.len() == columns.len() && pk.iter().all(|c| columns.contains(&c.as_str()))
}

fn scalar_text(operand: &Operand) -> Option<String> {
    match operand {
        Operand::Value(value) => value.as_text(),
        _ => None,
    }
}

fn hash_candidates(
    pk: &[String],
    pairs: &[(String, Operand)],
) -> Option<Vec<BTreeMap<String, String>>> {
    let columns: Vec<&str> = pairs.iter().map(|(c, _)| c.as_str()).collect();
    if !same_columns(pk, &columns) {
        return None;
    }

    if let [(column, Operand::List(items))] = pairs {
        return items
            .iter()
            .map(|item| scalar_text(item).map(|v| BTreeMap::from([(column.clone(), v)])))
            .collect();
    }

    let candidate = pairs
        .iter()
        .map(|(column, operand)| scalar_text(operand).map(|v| (column.clone(), v)))
        .collect::<Option<BTreeMap<_, _>>>()?;
    Some(vec![candidate])
}

fn in_candidates(
    pk: &[String],
    columns: &Operand,
    values: &Operand,
) -> Option<Vec<BTreeMap<String, String>>> {
    let columns: Vec<&str> = match columns {
        Operand::Value(Value::Text(c)) => vec![c.as_str()],
        Operand::List(items) => items.iter().map(Operand::as_text).collect::<Option<_>>()?,
        _ => return None,
    };
    if !same_columns(pk, &columns) {
        return None;
    }

    let Operand::List(items) = values else {
        return None;
    };
    items
        .iter()
        .map(|item| match item {
            Operand::Value(value) if columns.len() == 1 => value
                .as_text()
                .map(|v| BTreeMap::from([(columns[0].to_string(), v)])),
            Operand::Map(pairs) => columns
                .iter()
                .map(|column| {
                    pairs
                        .iter()
                        .find(|(k, _)| k == column)
                        .and_then(|(_, v)| scalar_text(v))
                        .map(|v| (column.to_string(), v))
                })
                .collect(),
            _ => None,
        })
        .collect()
}

/// Folds the linked values of `parents` into the condition of `query`.
///
/// Returns a derived descriptor without a primary link; it is marked for
/// emulation when no parent carries the linked values.
pub fn apply_link(
    query: &QueryDescriptor,
    parents: &[Row],
    link: &[(String, String)],
) -> QueryDescriptor {
    let mut derived = query.clone();
    derived.primary = None;

    let condition = match link {
        [(target, source)] => {
            let mut values: Vec<&str> = Vec::new();
            for parent in parents {
                if let Some(value) = parent.get(source) {
                    if !values.contains(&value) {
                        values.push(value);
                    }
                }
            }
            if values.is_empty() {
                None
            } else {
                Some(ConditionNode::in_values(target.clone(), values))
            }
        }
        _ => {
            let targets: Vec<&str> = link.iter().map(|(t, _)| t.as_str()).collect();
            let mut tuples: Vec<Vec<(String, Value)>> = Vec::new();
            for parent in parents {
                let tuple = link
                    .iter()
                    .map(|(target, source)| {
                        parent
                            .get(source)
                            .map(|v| (target.clone(), Value::from(v)))
                    })
                    .collect::<Option<Vec<_>>>();
                if let Some(tuple) = tuple {
                    if !tuples.contains(&tuple) {
                        tuples.push(tuple);
                    }
                }
            }
            if tuples.is_empty() {
                None
            } else {
                Some(ConditionNode::in_tuples(&targets, tuples))
            }
        }
    };

    match condition {
        Some(condition) => derived.and_filter(condition),
        None => {
            derived.emulate_execution = true;
            derived
        }
    }
}
