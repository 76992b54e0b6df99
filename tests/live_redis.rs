//! Tests against a real server
//!
//! Run with `REDQUERY_TEST_REDIS=host:port`; without it every test returns
//! early. Each test writes under its own key prefix and deletes its keys
//! afterwards; nothing else in the database is touched.
//!
//! Tests:
//! - script scans filter and window on the server
//! - primary key lookups and script scans agree
//! - between and aggregates follow the numeric rules
//! - tricky strings survive quoting
//! - eager relations over a real index

use std::sync::atomic::{AtomicUsize, Ordering};

use redquery::protocol::{Commands, Connection, ConnectionConfig};
use redquery::query::{
    ConditionNode, QueryDescriptor, QueryExecutor, RecordType, RecordTypes, Relation, Row,
};

// =============================================================================
// Fixture
// =============================================================================

static NEXT: AtomicUsize = AtomicUsize::new(0);

fn server() -> Option<ConnectionConfig> {
    let target = std::env::var("REDQUERY_TEST_REDIS").ok()?;
    let (host, port) = target.rsplit_once(':').unwrap_or((target.as_str(), "6379"));
    let mut config = ConnectionConfig::new(host, port.parse().unwrap());
    config.read_timeout_ms = Some(10_000);
    Some(config)
}

/// A connection plus the keys written through it, removed on drop
struct Fixture {
    connection: Connection,
    prefix: String,
    written: Vec<String>,
}

impl Fixture {
    fn new(name: &str) -> Option<Self> {
        let config = server()?;
        let prefix = format!(
            "redquery-test:{}:{}:{}",
            std::process::id(),
            NEXT.fetch_add(1, Ordering::SeqCst),
            name
        );
        Some(Self {
            connection: Connection::new(config),
            prefix,
            written: Vec::new(),
        })
    }

    fn prefix(&self, record_type: &str) -> String {
        format!("{}:{}", self.prefix, record_type)
    }

    fn insert(&mut self, record_type: &str, pk: &str, fields: &[(&str, &str)]) {
        let index = self.prefix(record_type);
        let record = format!("{}:a:{}", index, pk);
        self.connection.rpush(&index, &[pk]).unwrap();
        self.connection.hset_all(&record, fields).unwrap();
        self.written.push(index);
        self.written.push(record);
    }

    fn registry(&self, types: &[&str]) -> RecordTypes {
        RecordTypes::from_types(
            types
                .iter()
                .map(|name| RecordType::new(*name, self.prefix(name))),
        )
        .unwrap()
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        self.written.sort();
        self.written.dedup();
        let keys: Vec<&str> = self.written.iter().map(String::as_str).collect();
        if !keys.is_empty() {
            let _ = self.connection.del(&keys);
        }
    }
}

fn ids(rows: &[Row]) -> Vec<&str> {
    rows.iter().map(|r| r.get("id").unwrap_or("?")).collect()
}

// =============================================================================
// Script scans
// =============================================================================

#[test]
fn test_scan_filters_on_server() {
    let Some(mut fx) = Fixture::new("scan") else { return };
    fx.insert("user", "1", &[("id", "1"), ("status", "A")]);
    fx.insert("user", "2", &[("id", "2"), ("status", "B")]);
    fx.insert("user", "3", &[("id", "3"), ("status", "A")]);
    let registry = fx.registry(&["user"]);

    let mut executor = QueryExecutor::new(&mut fx.connection, &registry);
    let query = QueryDescriptor::new("user").filter(ConditionNode::eq("status", "A"));

    assert_eq!(ids(&executor.all(&query).unwrap()), vec!["1", "3"]);
    assert_eq!(executor.count(&query).unwrap(), 2);
    assert_eq!(executor.one(&query).unwrap().unwrap().get("id"), Some("1"));
    assert_eq!(executor.count(&QueryDescriptor::new("user")).unwrap(), 3);
}

#[test]
fn test_scan_window_counts_matches() {
    let Some(mut fx) = Fixture::new("window") else { return };
    for n in 1..=10 {
        let id = n.to_string();
        let parity = if n % 2 == 0 { "even" } else { "odd" };
        fx.insert("num", &id, &[("id", &id), ("parity", parity)]);
    }
    let registry = fx.registry(&["num"]);

    let evens = |offset: u64, limit: u64| {
        QueryDescriptor::new("num")
            .filter(ConditionNode::eq("parity", "even"))
            .offset(offset)
            .limit(limit)
    };
    let mut executor = QueryExecutor::new(&mut fx.connection, &registry);

    assert_eq!(ids(&executor.all(&evens(1, 2)).unwrap()), vec!["4", "6"]);
    assert_eq!(executor.count(&evens(1, 2)).unwrap(), 2);
    assert_eq!(executor.one(&evens(1, 2)).unwrap().unwrap().get("id"), Some("4"));
    assert_eq!(ids(&executor.all(&evens(3, 5)).unwrap()), vec!["8", "10"]);
    assert!(executor.all(&evens(5, 1)).unwrap().is_empty());
}

#[test]
fn test_pk_lookup_matches_scan() {
    let Some(mut fx) = Fixture::new("paths") else { return };
    fx.insert("item", "1", &[("id", "1"), ("price", "10")]);
    fx.insert("item", "2", &[("id", "2"), ("price", "abc")]);
    fx.insert("item", "3", &[("id", "3")]);
    fx.insert("item", "4", &[("id", "4"), ("price", "0x10")]);
    fx.insert("item", "5", &[("id", "5"), ("price", "-2.5")]);
    let registry = fx.registry(&["item"]);

    let wanted = vec![5, 9, 1, 2, 3, 4];
    let fast = QueryDescriptor::new("item")
        .filter(ConditionNode::in_values("id", wanted.clone()))
        .offset(1)
        .limit(3);
    // Same selection, but no longer a pure primary key condition
    let scan = QueryDescriptor::new("item")
        .filter(ConditionNode::and([
            ConditionNode::in_values("id", wanted),
            ConditionNode::not_in_values("id", vec!["none"]),
        ]))
        .offset(1)
        .limit(3);

    let mut executor = QueryExecutor::new(&mut fx.connection, &registry);

    // Scans follow index order, lookups follow candidate order
    assert_eq!(ids(&executor.all(&fast).unwrap()), vec!["1", "2", "3"]);
    assert_eq!(ids(&executor.all(&scan).unwrap()), vec!["2", "3", "4"]);

    let unwindowed = |q: &QueryDescriptor| {
        let mut q = q.clone();
        q.offset = None;
        q.limit = None;
        q
    };
    let (fast, scan) = (unwindowed(&fast), unwindowed(&scan));
    assert_eq!(executor.count(&fast).unwrap(), executor.count(&scan).unwrap());
    for column in ["price", "missing"] {
        assert_eq!(
            executor.sum(&fast, column).unwrap(),
            executor.sum(&scan, column).unwrap()
        );
        assert_eq!(
            executor.average(&fast, column).unwrap(),
            executor.average(&scan, column).unwrap()
        );
        assert_eq!(
            executor.min(&fast, column).unwrap(),
            executor.min(&scan, column).unwrap()
        );
        assert_eq!(
            executor.max(&fast, column).unwrap(),
            executor.max(&scan, column).unwrap()
        );
    }
    assert_eq!(executor.sum(&scan, "price").unwrap(), 23.5);
    assert_eq!(executor.min(&scan, "price").unwrap(), Some(-2.5));
    assert_eq!(executor.max(&scan, "missing").unwrap(), None);
}

// =============================================================================
// Numeric rules
// =============================================================================

#[test]
fn test_between_is_numeric() {
    let Some(mut fx) = Fixture::new("between") else { return };
    fx.insert("player", "1", &[("id", "1"), ("score", "9")]);
    fx.insert("player", "2", &[("id", "2"), ("score", "10")]);
    fx.insert("player", "3", &[("id", "3"), ("score", "15.5")]);
    fx.insert("player", "4", &[("id", "4"), ("score", "25")]);
    fx.insert("player", "5", &[("id", "5")]);
    let registry = fx.registry(&["player"]);

    let mut executor = QueryExecutor::new(&mut fx.connection, &registry);
    let inside = QueryDescriptor::new("player").filter(ConditionNode::between("score", 10, 20));
    let outside =
        QueryDescriptor::new("player").filter(ConditionNode::not_between("score", 10, 20));

    assert_eq!(ids(&executor.all(&inside).unwrap()), vec!["2", "3"]);
    assert_eq!(ids(&executor.all(&outside).unwrap()), vec!["1", "4", "5"]);
    assert_eq!(executor.average(&inside, "score").unwrap(), Some(12.75));
}

#[test]
fn test_aggregates_over_nothing() {
    let Some(mut fx) = Fixture::new("empty") else { return };
    fx.insert("player", "1", &[("id", "1"), ("score", "3")]);
    let registry = fx.registry(&["player"]);

    let mut executor = QueryExecutor::new(&mut fx.connection, &registry);
    let none = QueryDescriptor::new("player").filter(ConditionNode::eq("score", "nope"));

    assert_eq!(executor.sum(&none, "score").unwrap(), 0.0);
    assert_eq!(executor.average(&none, "score").unwrap(), None);
    assert_eq!(executor.min(&none, "score").unwrap(), None);
    assert!(executor.column(&none, "score").unwrap().is_empty());
    assert!(!executor.exists(&none).unwrap());
}

// =============================================================================
// Quoting
// =============================================================================

#[test]
fn test_tricky_strings_round_trip() {
    let Some(mut fx) = Fixture::new("quoting") else { return };
    let tricky = [
        "it's",
        "back\\slash",
        "line\nbreak\r\n",
        "tab\tand\u{1}control",
        "]] end --",
        "ünïcödé ✓",
        "",
    ];
    for (i, value) in tricky.iter().enumerate() {
        let id = (i + 1).to_string();
        fx.insert("note", &id, &[("id", &id), ("body", value)]);
    }
    let registry = fx.registry(&["note"]);

    let mut executor = QueryExecutor::new(&mut fx.connection, &registry);
    for (i, value) in tricky.iter().enumerate() {
        let query = QueryDescriptor::new("note").filter(ConditionNode::eq("body", *value));
        let rows = executor.all(&query).unwrap();
        assert_eq!(ids(&rows), vec![(i + 1).to_string()], "value {:?}", value);
        assert_eq!(rows[0].get("body"), Some(*value));
    }
}

// =============================================================================
// Relations
// =============================================================================

#[test]
fn test_eager_relations() {
    let Some(mut fx) = Fixture::new("relations") else { return };
    fx.insert("customer", "1", &[("id", "1"), ("name", "Ann")]);
    fx.insert("customer", "2", &[("id", "2"), ("name", "Bob")]);
    fx.insert("order", "10", &[("id", "10"), ("customer_id", "1")]);
    fx.insert("order", "11", &[("id", "11"), ("customer_id", "2")]);
    fx.insert("order", "12", &[("id", "12"), ("customer_id", "1")]);

    let orders = Relation {
        name: "orders".into(),
        target: "order".into(),
        link: [("customer_id".to_string(), "id".to_string())].into(),
        multiple: true,
        via: None,
    };
    let customer = Relation {
        name: "customer".into(),
        target: "customer".into(),
        link: [("id".to_string(), "customer_id".to_string())].into(),
        multiple: false,
        via: None,
    };
    let registry = RecordTypes::from_types([
        RecordType::new("customer", fx.prefix("customer")).with_relation(orders),
        RecordType::new("order", fx.prefix("order")).with_relation(customer),
    ])
    .unwrap();

    let mut executor = QueryExecutor::new(&mut fx.connection, &registry);
    let customers = executor
        .all(&QueryDescriptor::new("customer").with("orders.customer"))
        .unwrap();

    assert_eq!(ids(customers[0].related("orders").unwrap()), vec!["10", "12"]);
    assert_eq!(ids(customers[1].related("orders").unwrap()), vec!["11"]);
    let back = &customers[0].related("orders").unwrap()[0];
    assert_eq!(back.related("customer").unwrap()[0].get("name"), Some("Ann"));
}
