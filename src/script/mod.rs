//! Condition compiler
//!
//! Translates a query descriptor into a Lua program evaluated server-side
//! with `EVAL <script> 0`. Pure: no I/O, no caching, a fresh program per
//! query.
//!
//! # Guarantees
//!
//! 1. All data embedded in a program goes through [`quote_value`]/[`quote_str`]
//! 2. Unsupported queries are rejected here, before any command is sent
//! 3. Output is deterministic for a given descriptor and operation

mod builder;
mod errors;
pub mod quote;

pub use builder::{
    compile, compile_condition, normalize_operator, validate, CompiledScript, Operation,
};
pub use errors::{CompileError, CompileResult};
pub use quote::{quote_str, quote_value};
