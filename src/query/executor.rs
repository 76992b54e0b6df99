//! Query executor
//!
//! Runs query descriptors against a key-value store reached through a
//! [`CommandExecutor`].
//!
//! Execution flow (strict order):
//! 1. Look up the record type
//! 2. Compile once to reject invalid queries before any command is sent
//! 3. Resolve the primary link (may run the `via` query)
//! 4. Plan: emulated, primary key lookup, index length or script scan
//! 5. Execute the chosen strategy
//! 6. Hydrate replies into rows / values
//! 7. Load `with` relations onto the rows (`all`/`one` only)

use serde::Serialize;
use tracing::debug;

use crate::observability::Event;
use crate::protocol::{CommandExecutor, Commands, Reply};
use crate::script::{self, CompiledScript, Operation};

use super::descriptor::{QueryDescriptor, SupportsPagination, Window};
use super::errors::{QueryError, QueryResult};
use super::fold::{lua_tonumber, Fold};
use super::planner::{self, QueryPlan, Strategy};
use super::relations::ResolvesRelations;
use super::row::Row;
use super::schema::{RecordType, RecordTypes};

/// Result of [`QueryExecutor::execute`], shaped by the operation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryOutput {
    Rows(Vec<Row>),
    Row(Option<Row>),
    Count(u64),
    Column(Vec<Option<String>>),
    Number(Option<f64>),
}

/// Executes descriptors over one injected connection
pub struct QueryExecutor<'a, C: CommandExecutor> {
    pub(super) client: &'a mut C,
    pub(super) registry: &'a RecordTypes,
}

impl<'a, C: CommandExecutor> QueryExecutor<'a, C> {
    /// Creates a new executor
    pub fn new(client: &'a mut C, registry: &'a RecordTypes) -> Self {
        Self { client, registry }
    }

    pub fn registry(&self) -> &'a RecordTypes {
        self.registry
    }

    /// Runs any operation and returns its output in a common shape
    pub fn execute(
        &mut self,
        query: &QueryDescriptor,
        operation: Operation,
        column: Option<&str>,
    ) -> QueryResult<QueryOutput> {
        let target = operation.target_column(column)?.unwrap_or_default();
        Ok(match operation {
            Operation::All => QueryOutput::Rows(self.all(query)?),
            Operation::One => QueryOutput::Row(self.one(query)?),
            Operation::Count => QueryOutput::Count(self.count(query)?),
            Operation::Column => QueryOutput::Column(self.column(query, target)?),
            Operation::Sum => QueryOutput::Number(Some(self.sum(query, target)?)),
            Operation::Average | Operation::Min | Operation::Max => {
                QueryOutput::Number(self.aggregate(query, operation, target)?)
            }
        })
    }

    /// All matching rows, in index order
    pub fn all(&mut self, query: &QueryDescriptor) -> QueryResult<Vec<Row>> {
        let (record_type, plan) = self.prepare(query, Operation::All, None)?;
        let strategy = plan.strategy.as_str();

        let mut rows = match plan.strategy {
            Strategy::Emulated => Vec::new(),
            Strategy::PrimaryKey(keys) => self.fetch(record_type, &keys, query.window(), false)?,
            Strategy::Script(script) => hydrate_rows(self.eval(&script)?)?,
            Strategy::IndexLength => return Err(misplanned(Operation::All)),
        };
        if !query.with.is_empty() && !rows.is_empty() {
            self.populate(record_type, &query.with, &mut rows)?;
        }

        complete(record_type, Operation::All, strategy, rows.len());
        Ok(rows)
    }

    /// The first matching row
    pub fn one(&mut self, query: &QueryDescriptor) -> QueryResult<Option<Row>> {
        let (record_type, plan) = self.prepare(query, Operation::One, None)?;
        let strategy = plan.strategy.as_str();

        let row = match plan.strategy {
            Strategy::Emulated => None,
            Strategy::PrimaryKey(keys) => self
                .fetch(record_type, &keys, query.window(), true)?
                .into_iter()
                .next(),
            Strategy::Script(script) => {
                let pairs = self
                    .eval(&script)?
                    .into_pairs()
                    .ok_or_else(|| QueryError::unexpected("one", "not a field/value list"))?;
                if pairs.is_empty() {
                    None
                } else {
                    Some(Row::from_pairs(pairs))
                }
            }
            Strategy::IndexLength => return Err(misplanned(Operation::One)),
        };

        let row = match row {
            Some(row) if !query.with.is_empty() => {
                let mut rows = vec![row];
                self.populate(record_type, &query.with, &mut rows)?;
                rows.pop()
            }
            other => other,
        };

        complete(record_type, Operation::One, strategy, usize::from(row.is_some()));
        Ok(row)
    }

    /// Number of matching rows (inside the window)
    pub fn count(&mut self, query: &QueryDescriptor) -> QueryResult<u64> {
        let (record_type, plan) = self.prepare(query, Operation::Count, None)?;
        let strategy = plan.strategy.as_str();

        let count = match plan.strategy {
            Strategy::Emulated => 0,
            Strategy::PrimaryKey(keys) => {
                self.fetch(record_type, &keys, query.window(), false)?.len() as u64
            }
            Strategy::IndexLength => {
                let length = self.client.llen(record_type.index_key())?;
                u64::try_from(length)
                    .map_err(|_| QueryError::unexpected("count", format!("LLEN {}", length)))?
            }
            Strategy::Script(script) => {
                let reply = self.eval(&script)?;
                reply
                    .as_i64()
                    .and_then(|n| u64::try_from(n).ok())
                    .ok_or_else(|| QueryError::unexpected("count", describe(&reply)))?
            }
        };

        complete(record_type, Operation::Count, strategy, count as usize);
        Ok(count)
    }

    /// The value of `column` for every matching row; `None` where absent
    pub fn column(
        &mut self,
        query: &QueryDescriptor,
        column: &str,
    ) -> QueryResult<Vec<Option<String>>> {
        let (record_type, plan) = self.prepare(query, Operation::Column, Some(column))?;
        let strategy = plan.strategy.as_str();

        let values = match plan.strategy {
            Strategy::Emulated => Vec::new(),
            Strategy::PrimaryKey(keys) => self
                .fetch(record_type, &keys, query.window(), false)?
                .iter()
                .map(|row| row.get(column).map(str::to_string))
                .collect(),
            Strategy::Script(script) => self
                .eval(&script)?
                .into_array()
                .ok_or_else(|| QueryError::unexpected("column", "not a list"))?
                .into_iter()
                .map(Reply::into_bulk)
                .collect(),
            Strategy::IndexLength => return Err(misplanned(Operation::Column)),
        };

        complete(record_type, Operation::Column, strategy, values.len());
        Ok(values)
    }

    /// Sum of `column`; absent or non-numeric values count as zero
    pub fn sum(&mut self, query: &QueryDescriptor, column: &str) -> QueryResult<f64> {
        Ok(self
            .aggregate(query, Operation::Sum, column)?
            .unwrap_or(0.0))
    }

    /// Mean of `column` over matching rows; `None` when nothing matches
    pub fn average(&mut self, query: &QueryDescriptor, column: &str) -> QueryResult<Option<f64>> {
        self.aggregate(query, Operation::Average, column)
    }

    pub fn min(&mut self, query: &QueryDescriptor, column: &str) -> QueryResult<Option<f64>> {
        self.aggregate(query, Operation::Min, column)
    }

    pub fn max(&mut self, query: &QueryDescriptor, column: &str) -> QueryResult<Option<f64>> {
        self.aggregate(query, Operation::Max, column)
    }

    /// Whether any row matches
    pub fn exists(&mut self, query: &QueryDescriptor) -> QueryResult<bool> {
        Ok(self.one(&without_relations(query))?.is_some())
    }

    /// `column` of the first matching row
    pub fn scalar(&mut self, query: &QueryDescriptor, column: &str) -> QueryResult<Option<String>> {
        Ok(self
            .one(&without_relations(query))?
            .and_then(|row| row.get(column).map(str::to_string)))
    }

    fn aggregate(
        &mut self,
        query: &QueryDescriptor,
        operation: Operation,
        column: &str,
    ) -> QueryResult<Option<f64>> {
        let (record_type, plan) = self.prepare(query, operation, Some(column))?;
        let strategy = plan.strategy.as_str();

        let value = match plan.strategy {
            Strategy::Emulated => Fold::new(operation).finish(),
            Strategy::PrimaryKey(keys) => {
                let mut fold = Fold::new(operation);
                for row in self.fetch(record_type, &keys, query.window(), false)? {
                    fold.push(row.get(column));
                }
                fold.finish()
            }
            Strategy::Script(script) => match self.eval(&script)? {
                Reply::Bulk(None) => None,
                Reply::Bulk(Some(text)) | Reply::Integer(text) => Some(
                    lua_tonumber(&text)
                        .ok_or_else(|| QueryError::unexpected(operation.name(), text.clone()))?,
                ),
                other => return Err(QueryError::unexpected(operation.name(), describe(&other))),
            },
            Strategy::IndexLength => return Err(misplanned(operation)),
        };

        complete(record_type, operation, strategy, usize::from(value.is_some()));
        Ok(value)
    }

    /// Steps 1 to 4 of the execution flow
    fn prepare(
        &mut self,
        query: &QueryDescriptor,
        operation: Operation,
        column: Option<&str>,
    ) -> QueryResult<(&'a RecordType, QueryPlan)> {
        let registry = self.registry;
        let record_type = registry.get(&query.record_type)?;
        script::compile(record_type, query, operation, column)?;

        let resolved = self.resolve(query)?;
        let plan = planner::plan(record_type, &resolved, operation, column)?;

        match &plan.strategy {
            Strategy::Emulated => debug!(
                event = Event::QueryEmulated.as_str(),
                record_type = %record_type.name,
                operation = operation.name(),
                "query emulated"
            ),
            Strategy::PrimaryKey(keys) => debug!(
                event = Event::FastPathLookup.as_str(),
                record_type = %record_type.name,
                operation = operation.name(),
                candidates = keys.len(),
                "primary key lookup"
            ),
            Strategy::IndexLength | Strategy::Script(_) => {}
        }
        Ok((record_type, plan))
    }

    /// Reads candidate records in order, skipping missing ones, and keeps
    /// those inside the window.
    fn fetch(
        &mut self,
        record_type: &RecordType,
        keys: &[String],
        window: Window,
        first_only: bool,
    ) -> QueryResult<Vec<Row>> {
        let mut rows = Vec::new();
        let mut position = 0u64;
        for key in keys {
            if window.is_exhausted(position) {
                break;
            }
            let pairs = self.client.hgetall(&record_type.record_key(key))?;
            if pairs.is_empty() {
                continue;
            }
            position += 1;
            if window.admits(position) {
                rows.push(Row::from_pairs(pairs));
                if first_only {
                    break;
                }
            }
        }
        Ok(rows)
    }

    fn eval(&mut self, script: &CompiledScript) -> QueryResult<Reply> {
        Ok(self.client.eval(&script.text, &[], &[])?)
    }
}

fn hydrate_rows(reply: Reply) -> QueryResult<Vec<Row>> {
    reply
        .into_array()
        .ok_or_else(|| QueryError::unexpected("all", "not a list"))?
        .into_iter()
        .map(|item| {
            item.into_pairs()
                .map(Row::from_pairs)
                .ok_or_else(|| QueryError::unexpected("all", "row is not a field/value list"))
        })
        .collect()
}

fn without_relations(query: &QueryDescriptor) -> QueryDescriptor {
    let mut stripped = query.clone();
    stripped.with.clear();
    stripped
}

fn misplanned(operation: Operation) -> QueryError {
    QueryError::unexpected(operation.name(), "index length plan for a row query")
}

fn describe(reply: &Reply) -> String {
    match reply {
        Reply::Status(_) => "status reply".to_string(),
        Reply::Error(message) => format!("error reply: {}", message),
        Reply::Integer(n) => format!("integer {}", n),
        Reply::Bulk(None) => "nil".to_string(),
        Reply::Bulk(Some(text)) => format!("bulk '{}'", text),
        Reply::Array(items) => format!("array of {}", items.len()),
    }
}

fn complete(record_type: &RecordType, operation: Operation, strategy: &str, results: usize) {
    debug!(
        event = Event::QueryComplete.as_str(),
        record_type = %record_type.name,
        operation = operation.name(),
        strategy,
        results,
        "query complete"
    );
}
