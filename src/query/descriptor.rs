//! Query descriptors
//!
//! A descriptor says which records of one record type a query addresses and
//! how much of the result to return. It is a plain value: the executor
//! never mutates one, resolution produces derived copies.

use super::condition::ConditionNode;
use crate::query::Row;

/// Sort direction, carried only to be rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Offset/limit over the stream of matching records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Window {
    pub offset: u64,
    pub limit: Option<u64>,
}

impl Window {
    pub fn new(offset: Option<u64>, limit: Option<u64>) -> Self {
        Self {
            offset: offset.unwrap_or(0),
            limit,
        }
    }

    /// True when neither offset nor limit restricts the stream
    pub fn is_unbounded(&self) -> bool {
        self.offset == 0 && self.limit.is_none()
    }

    /// True when the `position`th match (1-based) is inside the window
    pub fn admits(&self, position: u64) -> bool {
        position > self.offset
            && self
                .limit
                .map_or(true, |limit| position <= self.offset.saturating_add(limit))
    }

    /// True when no match after the `position`th can be inside the window
    pub fn is_exhausted(&self, position: u64) -> bool {
        self.limit
            .map_or(false, |limit| position >= self.offset.saturating_add(limit))
    }
}

/// Anything that restricts its result to a window
pub trait SupportsPagination {
    fn window(&self) -> Window;
}

/// The `via` hop of a relation: rows of this query link the target
#[derive(Debug, Clone, PartialEq)]
pub struct ViaHop {
    pub query: QueryDescriptor,
    pub multiple: bool,
}

/// Binds a relation query to the record(s) it was derived from
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryLink {
    /// Rows the linked values are read from (the parent, or the via rows
    /// once `via` is resolved)
    pub parents: Vec<Row>,
    /// `(target column, parent column)` pairs
    pub link: Vec<(String, String)>,
    pub via: Option<Box<ViaHop>>,
}

/// One query against one record type
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    pub record_type: String,
    pub condition: Option<ConditionNode>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub order_by: Vec<(String, SortDirection)>,
    /// Relations to load eagerly, dotted names nest
    pub with: Vec<String>,
    /// Whether the caller wants plain field maps back. Rows are returned
    /// either way; the flag is kept for the persistence layer.
    pub as_array: bool,
    pub primary: Option<PrimaryLink>,
    /// Set by resolution when the primary link yields no values
    pub emulate_execution: bool,
}

impl QueryDescriptor {
    pub fn new(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            condition: None,
            limit: None,
            offset: None,
            order_by: Vec::new(),
            with: Vec::new(),
            as_array: false,
            primary: None,
            emulate_execution: false,
        }
    }

    /// Replaces the condition
    pub fn filter(mut self, condition: ConditionNode) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Adds a condition with `and`
    pub fn and_filter(mut self, condition: ConditionNode) -> Self {
        self.condition = Some(match self.condition.take() {
            None => condition,
            Some(existing) => ConditionNode::and([existing, condition]),
        });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by.push((column.into(), direction));
        self
    }

    pub fn with(mut self, relation: impl Into<String>) -> Self {
        self.with.push(relation.into());
        self
    }

    pub fn as_array(mut self, as_array: bool) -> Self {
        self.as_array = as_array;
        self
    }

    pub fn primary(mut self, link: PrimaryLink) -> Self {
        self.primary = Some(link);
        self
    }
}

impl SupportsPagination for QueryDescriptor {
    fn window(&self) -> Window {
        Window::new(self.offset, self.limit)
    }
}
