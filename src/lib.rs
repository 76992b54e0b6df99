//! redquery - relational queries over a Redis key space
//!
//! - [`protocol`]: blocking RESP client and typed command helpers
//! - [`script`]: compiles query conditions into server-side Lua programs
//! - [`query`]: descriptors, planning, execution and relation loading
//! - [`cli`]: the `redquery` binary
//! - [`observability`]: structured logging

pub mod cli;
pub mod observability;
pub mod protocol;
pub mod query;
pub mod script;
