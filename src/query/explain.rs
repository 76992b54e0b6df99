//! Explain output
//!
//! Reports how a query would run without touching the network.

use std::fmt;

use serde::Serialize;

use crate::script::{CompileError, Operation};

use super::descriptor::{QueryDescriptor, SupportsPagination};
use super::planner::{self, Strategy};
use super::schema::RecordType;

/// Explain plan output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplainPlan {
    /// Whether the query would be executed
    pub accepted: bool,
    pub record_type: String,
    pub operation: String,
    /// Strategy name (if accepted)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    /// Record keys read by a primary key lookup
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub candidate_keys: Vec<String>,
    /// Program text of a script scan
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    /// `(column, alias)` pairs of a script scan
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<(String, String)>,
    pub offset: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    /// True when a `via` hop still has to be resolved at execution time;
    /// the plan then describes the query before its link is applied
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub unresolved_link: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl ExplainPlan {
    /// Plans `query` and describes the outcome
    pub fn from_descriptor(
        record_type: &RecordType,
        query: &QueryDescriptor,
        operation: Operation,
        column: Option<&str>,
    ) -> Self {
        let mut unresolved_link = false;
        let resolved;
        let query = match &query.primary {
            Some(link) if link.via.is_none() => {
                resolved = planner::apply_link(query, &link.parents, &link.link);
                &resolved
            }
            Some(_) => {
                unresolved_link = true;
                query
            }
            None => query,
        };

        let window = query.window();
        let mut explain = Self {
            accepted: false,
            record_type: record_type.name.clone(),
            operation: operation.name().to_string(),
            strategy: None,
            candidate_keys: Vec::new(),
            script: None,
            columns: Vec::new(),
            offset: window.offset,
            limit: window.limit,
            unresolved_link,
            rejection_code: None,
            rejection_reason: None,
        };

        match planner::plan(record_type, query, operation, column) {
            Ok(plan) => {
                explain.accepted = true;
                explain.strategy = Some(plan.strategy.as_str().to_string());
                match plan.strategy {
                    Strategy::PrimaryKey(keys) => {
                        explain.candidate_keys =
                            keys.iter().map(|k| record_type.record_key(k)).collect();
                    }
                    Strategy::Script(script) => {
                        explain.script = Some(script.text);
                        explain.columns = script.columns;
                    }
                    Strategy::Emulated | Strategy::IndexLength => {}
                }
            }
            Err(err) => explain.reject(&err),
        }
        explain
    }

    fn reject(&mut self, err: &CompileError) {
        self.rejection_code = Some(err.code().to_string());
        self.rejection_reason = Some(err.to_string());
    }
}

impl fmt::Display for ExplainPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.operation, self.record_type)?;
        if !self.accepted {
            return write!(
                f,
                "  rejected: {} ({})",
                self.rejection_reason.as_deref().unwrap_or(""),
                self.rejection_code.as_deref().unwrap_or("")
            );
        }
        writeln!(f, "  strategy: {}", self.strategy.as_deref().unwrap_or(""))?;
        writeln!(f, "  window: offset {} limit {:?}", self.offset, self.limit)?;
        for key in &self.candidate_keys {
            writeln!(f, "  key: {}", key)?;
        }
        for (column, alias) in &self.columns {
            writeln!(f, "  column: {} as {}", column, alias)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{ConditionNode, PrimaryLink, Row, SortDirection};

    fn user() -> RecordType {
        RecordType::new("user", "app:user")
    }

    #[test]
    fn test_explain_pk_lookup() {
        let query = QueryDescriptor::new("user").filter(ConditionNode::eq("id", vec![1, 2]));
        let explain = ExplainPlan::from_descriptor(&user(), &query, Operation::All, None);
        assert!(explain.accepted);
        assert_eq!(explain.strategy.as_deref(), Some("PK_LOOKUP"));
        assert_eq!(explain.candidate_keys, vec!["app:user:a:1", "app:user:a:2"]);
        assert!(explain.script.is_none());
    }

    #[test]
    fn test_explain_script_scan() {
        let query = QueryDescriptor::new("user")
            .filter(ConditionNode::eq("status", "A"))
            .limit(5);
        let explain = ExplainPlan::from_descriptor(&user(), &query, Operation::Count, None);
        assert_eq!(explain.strategy.as_deref(), Some("SCRIPT_SCAN"));
        assert_eq!(explain.columns, vec![("status".into(), "cstatus0".into())]);
        assert!(explain.script.unwrap().contains("local key='app:user'"));
        assert_eq!(explain.limit, Some(5));
    }

    #[test]
    fn test_explain_index_length() {
        let explain = ExplainPlan::from_descriptor(
            &user(),
            &QueryDescriptor::new("user"),
            Operation::Count,
            None,
        );
        assert_eq!(explain.strategy.as_deref(), Some("INDEX_LENGTH"));
    }

    #[test]
    fn test_explain_rejection() {
        let query = QueryDescriptor::new("user").order_by("id", SortDirection::Descending);
        let explain = ExplainPlan::from_descriptor(&user(), &query, Operation::All, None);
        assert!(!explain.accepted);
        assert_eq!(explain.rejection_code.as_deref(), Some("REDQ_UNSUPPORTED_OPERATION"));
        assert!(explain.to_string().contains("rejected"));
    }

    #[test]
    fn test_explain_applies_local_link() {
        let query = QueryDescriptor::new("user").primary(PrimaryLink {
            parents: vec![Row::new()],
            link: vec![("id".into(), "user_id".into())],
            via: None,
        });
        let explain = ExplainPlan::from_descriptor(&user(), &query, Operation::All, None);
        assert_eq!(explain.strategy.as_deref(), Some("EMULATED"));
        assert!(!explain.unresolved_link);
    }

    #[test]
    fn test_explain_serializes_compactly() {
        let explain = ExplainPlan::from_descriptor(
            &user(),
            &QueryDescriptor::new("user"),
            Operation::Count,
            None,
        );
        let json = serde_json::to_value(&explain).unwrap();
        assert_eq!(json["strategy"], "INDEX_LENGTH");
        assert!(json.get("script").is_none());
        assert!(json.get("unresolved_link").is_none());
    }
}
