//! Query subsystem
//!
//! Describes queries against record types and executes them.
//!
//! # Design Principles
//!
//! - Descriptors are values, never mutated by execution
//! - Everything is validated before the first command is sent
//! - Primary key lookups and script scans return identical results
//! - Errors surface unchanged, no partial results
//!
//! # Strategy Priority (strict order)
//!
//! 1. Emulated (relation without linked values)
//! 2. Primary key lookup
//! 3. Index length (plain count)
//! 4. Script scan

mod condition;
mod descriptor;
mod errors;
mod executor;
mod explain;
mod fold;
pub mod keys;
mod planner;
mod relations;
mod row;
mod schema;

pub use condition::{ConditionNode, Operand, Value};
pub use descriptor::{PrimaryLink, QueryDescriptor, SortDirection, SupportsPagination, ViaHop, Window};
pub use errors::{QueryError, QueryResult, SchemaError, SchemaResult};
pub use executor::{QueryExecutor, QueryOutput};
pub use explain::ExplainPlan;
pub use fold::{lua_tonumber, Fold};
pub use planner::{apply_link, plan, primary_key_candidates, QueryPlan, Strategy};
pub use relations::{relation_query, ResolvesRelations};
pub use row::Row;
pub use schema::{Relation, RecordType, RecordTypes};
