//! Query requests read by `query` and `explain`
//!
//! ```json
//! {"type": "user", "op": "count", "where": {"status": "A"}, "limit": 10}
//! ```

use serde::Deserialize;
use serde_json::Value as Json;

use crate::query::{ConditionNode, QueryDescriptor, SortDirection};
use crate::script::Operation;

use super::errors::{CliError, CliResult};

fn default_op() -> String {
    "all".to_string()
}

/// One request, as sent on stdin
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryRequest {
    /// Record type name
    #[serde(rename = "type")]
    pub record_type: String,
    #[serde(default = "default_op")]
    pub op: String,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default, rename = "where")]
    pub condition: Option<Json>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
    /// `"col"`, `"col DESC"`, a list of those, or `{"col": "asc"|"desc"}`
    #[serde(default)]
    pub order_by: Option<Json>,
    #[serde(default)]
    pub with: Vec<String>,
    #[serde(default)]
    pub as_array: bool,
}

impl QueryRequest {
    pub fn from_json(value: Json) -> CliResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| CliError::invalid_request(format!("Invalid request: {}", e)))
    }

    pub fn operation(&self) -> CliResult<Operation> {
        Operation::from_name(&self.op)
            .ok_or_else(|| CliError::invalid_request(format!("Unknown op: '{}'", self.op)))
    }

    /// Builds the descriptor. Conditions are not validated here.
    pub fn to_descriptor(&self) -> CliResult<QueryDescriptor> {
        let mut query = QueryDescriptor::new(self.record_type.clone()).as_array(self.as_array);
        query.condition = match &self.condition {
            None | Some(Json::Null) => None,
            Some(json) => Some(ConditionNode::from_json(json)),
        };
        query.limit = self.limit;
        query.offset = self.offset;
        query.with = self.with.clone();
        if let Some(order_by) = &self.order_by {
            query.order_by = parse_order_by(order_by)?;
        }
        Ok(query)
    }
}

fn parse_order_by(value: &Json) -> CliResult<Vec<(String, SortDirection)>> {
    let direction = |text: &str| -> CliResult<SortDirection> {
        match text.trim().to_ascii_lowercase().as_str() {
            "" | "asc" => Ok(SortDirection::Ascending),
            "desc" => Ok(SortDirection::Descending),
            other => Err(CliError::invalid_request(format!(
                "Unknown sort direction: '{}'",
                other
            ))),
        }
    };
    let from_text = |text: &str| -> CliResult<(String, SortDirection)> {
        match text.trim().split_once(char::is_whitespace) {
            Some((column, dir)) => Ok((column.to_string(), direction(dir)?)),
            None => Ok((text.trim().to_string(), SortDirection::Ascending)),
        }
    };

    match value {
        Json::Null => Ok(Vec::new()),
        Json::String(text) => text.split(',').map(from_text).collect(),
        Json::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .ok_or_else(|| CliError::invalid_request("order_by entries must be strings"))
                    .and_then(from_text)
            })
            .collect(),
        Json::Object(map) => map
            .iter()
            .map(|(column, dir)| -> CliResult<(String, SortDirection)> {
                let dir = dir.as_str().ok_or_else(|| {
                    CliError::invalid_request("order_by directions must be strings")
                })?;
                Ok((column.clone(), direction(dir)?))
            })
            .collect(),
        _ => Err(CliError::invalid_request("order_by must be a string, list or object")),
    }
}
