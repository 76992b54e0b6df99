//! Compiled scripts run in an embedded Lua 5.1 against an in-memory keyspace
//!
//! `redis.call` serves LRANGE/EXISTS/HGET/HGETALL from fixed lists and
//! hashes, reading missing fields as `false` the way the server does.
//!
//! Tests:
//! - filters keep index order
//! - the window applies to matching records only
//! - between compares numerically
//! - empty IN lists
//! - aggregates over no rows
//! - limit 0 selects nothing
//! - index entries without a record are skipped

use std::collections::BTreeMap;
use std::rc::Rc;

use mlua::{FromLuaMulti, IntoLua, Lua, Value, Variadic};
use redquery::query::{ConditionNode, QueryDescriptor, RecordType};
use redquery::script::{compile, Operation};

// =============================================================================
// Keyspace
// =============================================================================

#[derive(Default)]
struct Keyspace {
    lists: BTreeMap<String, Vec<String>>,
    hashes: BTreeMap<String, Vec<(String, String)>>,
}

impl Keyspace {
    /// Appends `pk` to the `num` index and stores its hash
    fn insert(&mut self, pk: &str, fields: &[(&str, &str)]) {
        self.index_only(pk);
        self.hashes.insert(
            format!("num:a:{}", pk),
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
    }

    /// Appends `pk` to the index without writing a record
    fn index_only(&mut self, pk: &str) {
        self.lists
            .entry("num".to_string())
            .or_default()
            .push(pk.to_string());
    }
}

/// An interpreter whose `redis.call` reads from `keyspace`
struct Sandbox {
    lua: Lua,
}

impl Sandbox {
    fn new(keyspace: Keyspace) -> Self {
        let lua = Lua::new();
        let keyspace = Rc::new(keyspace);
        let call = lua
            .create_function(move |lua, args: Variadic<String>| {
                let command = args.first().cloned().unwrap_or_default();
                let key = args.get(1).cloned().unwrap_or_default();
                let hash = keyspace.hashes.get(&key);
                match command.as_str() {
                    "LRANGE" => lua
                        .create_sequence_from(
                            keyspace.lists.get(&key).cloned().unwrap_or_default(),
                        )?
                        .into_lua(lua),
                    "EXISTS" => i64::from(hash.is_some()).into_lua(lua),
                    "HGET" => {
                        let field = args.get(2).cloned().unwrap_or_default();
                        match hash.and_then(|h| h.iter().find(|(k, _)| *k == field)) {
                            Some((_, value)) => value.clone().into_lua(lua),
                            None => Ok(Value::Boolean(false)),
                        }
                    }
                    "HGETALL" => lua
                        .create_sequence_from(
                            hash.into_iter()
                                .flatten()
                                .flat_map(|(k, v)| [k.clone(), v.clone()]),
                        )?
                        .into_lua(lua),
                    other => Err(mlua::Error::RuntimeError(format!(
                        "unexpected command {}",
                        other
                    ))),
                }
            })
            .unwrap();
        let redis = lua.create_table().unwrap();
        redis.set("call", call).unwrap();
        lua.globals().set("redis", redis).unwrap();
        Self { lua }
    }

    fn eval<'lua, R: FromLuaMulti<'lua>>(
        &'lua self,
        query: &QueryDescriptor,
        operation: Operation,
        column: Option<&str>,
    ) -> R {
        let script = compile(&RecordType::new("num", "num"), query, operation, column).unwrap();
        self.lua.load(script.text.as_str()).eval().unwrap()
    }

    fn ids(&self, query: &QueryDescriptor) -> Vec<String> {
        let rows: Vec<Vec<String>> = self.eval(query, Operation::All, None);
        rows.iter().filter_map(|row| field(row, "id")).collect()
    }

    fn count(&self, query: &QueryDescriptor) -> i64 {
        self.eval(query, Operation::Count, None)
    }
}

/// Reads `name` from an HGETALL field/value list
fn field(pairs: &[String], name: &str) -> Option<String> {
    pairs
        .chunks(2)
        .find(|pair| pair[0] == name)
        .and_then(|pair| pair.get(1).cloned())
}

/// Records 1..=10 with parity and score `5 * id`
fn numbers() -> Sandbox {
    let mut keyspace = Keyspace::default();
    for n in 1..=10 {
        let id = n.to_string();
        let parity = if n % 2 == 0 { "even" } else { "odd" };
        let score = (n * 5).to_string();
        keyspace.insert(&id, &[("id", &id), ("parity", parity), ("score", &score)]);
    }
    Sandbox::new(keyspace)
}

fn query() -> QueryDescriptor {
    QueryDescriptor::new("num")
}

// =============================================================================
// Selection
// =============================================================================

#[test]
fn test_filter_keeps_index_order() {
    let mut keyspace = Keyspace::default();
    keyspace.insert("3", &[("id", "3"), ("status", "A")]);
    keyspace.insert("1", &[("id", "1"), ("status", "A")]);
    keyspace.insert("2", &[("id", "2"), ("status", "B")]);
    let sandbox = Sandbox::new(keyspace);

    let active = query().filter(ConditionNode::eq("status", "A"));
    assert_eq!(sandbox.ids(&active), vec!["3", "1"]);
    assert_eq!(sandbox.count(&active), 2);
}

#[test]
fn test_window_counts_matches_only() {
    let sandbox = numbers();
    let evens = |offset, limit| {
        query()
            .filter(ConditionNode::eq("parity", "even"))
            .offset(offset)
            .limit(limit)
    };

    assert_eq!(sandbox.ids(&evens(1, 2)), vec!["4", "6"]);
    assert_eq!(sandbox.count(&evens(1, 2)), 2);
    assert_eq!(sandbox.ids(&evens(3, 5)), vec!["8", "10"]);
    assert!(sandbox.ids(&evens(5, 1)).is_empty());

    let first: Vec<String> = sandbox.eval(&evens(1, 2), Operation::One, None);
    assert_eq!(field(&first, "id").as_deref(), Some("4"));
}

#[test]
fn test_between_is_numeric() {
    let sandbox = numbers();
    let inside = query().filter(ConditionNode::between("score", 10, 20));
    let outside = query().filter(ConditionNode::not_between("score", 10, 20));

    // "25" sorts between "10" and "20" as a string
    assert_eq!(sandbox.ids(&inside), vec!["2", "3", "4"]);
    assert_eq!(sandbox.count(&outside), 7);
}

#[test]
fn test_empty_in_lists() {
    let sandbox = numbers();
    let none: Vec<&str> = Vec::new();

    assert_eq!(
        sandbox.count(&query().filter(ConditionNode::not_in_values("id", none.clone()))),
        10
    );
    assert_eq!(
        sandbox.count(&query().filter(ConditionNode::in_values("id", none))),
        0
    );
}

#[test]
fn test_limit_zero_selects_nothing() {
    let sandbox = numbers();

    assert_eq!(sandbox.count(&query().limit(0)), 0);
    assert!(sandbox.ids(&query().limit(0)).is_empty());
}

// =============================================================================
// Aggregates
// =============================================================================

#[test]
fn test_aggregates() {
    let sandbox = numbers();
    let evens = query().filter(ConditionNode::eq("parity", "even"));

    let sum: String = sandbox.eval(&evens, Operation::Sum, Some("score"));
    let average: String = sandbox.eval(&evens, Operation::Average, Some("score"));
    let max: String = sandbox.eval(&evens, Operation::Max, Some("score"));
    assert_eq!(sum.parse::<f64>().unwrap(), 150.0);
    assert_eq!(average.parse::<f64>().unwrap(), 30.0);
    assert_eq!(max.parse::<f64>().unwrap(), 50.0);
}

#[test]
fn test_aggregates_over_no_rows() {
    let sandbox = numbers();
    let nothing = query().filter(ConditionNode::eq("parity", "neither"));

    let average: Value = sandbox.eval(&nothing, Operation::Average, Some("score"));
    let min: Value = sandbox.eval(&nothing, Operation::Min, Some("score"));
    let sum: String = sandbox.eval(&nothing, Operation::Sum, Some("score"));
    assert!(matches!(average, Value::Boolean(false)));
    assert!(matches!(min, Value::Boolean(false)));
    assert_eq!(sum.parse::<f64>().unwrap(), 0.0);
}

// =============================================================================
// Dangling index entries
// =============================================================================

#[test]
fn test_missing_records_are_skipped() {
    let mut keyspace = Keyspace::default();
    keyspace.index_only("0");
    keyspace.insert("1", &[("id", "1")]);
    keyspace.index_only("2");
    keyspace.insert("3", &[("id", "3")]);
    let sandbox = Sandbox::new(keyspace);

    assert_eq!(sandbox.ids(&query()), vec!["1", "3"]);
    assert_eq!(sandbox.ids(&query().offset(1).limit(1)), vec!["3"]);
    assert_eq!(sandbox.count(&query()), 2);

    let first: Vec<String> = sandbox.eval(&query(), Operation::One, None);
    assert_eq!(field(&first, "id").as_deref(), Some("1"));

    // a missing record is not a record whose fields are all missing
    let absent = query().filter(ConditionNode::not_in_values("id", vec!["1"]));
    assert_eq!(sandbox.ids(&absent), vec!["3"]);
}
