//! Shared test support
//!
//! - `MemoryStore`: an in-memory `CommandExecutor` recording every call
//! - record type fixtures
//! - reply builders for canned script results

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};

use redquery::protocol::{ClientError, ClientResult, Command, CommandExecutor, Reply};
use redquery::query::{RecordType, RecordTypes, Relation, Row};

// =============================================================================
// Memory store
// =============================================================================

/// Serves LRANGE/LLEN/HGET/HGETALL from memory. EVAL cannot run Lua here;
/// it pops canned replies in order.
#[derive(Default)]
pub struct MemoryStore {
    lists: HashMap<String, Vec<String>>,
    hashes: HashMap<String, Vec<(String, String)>>,
    eval_replies: VecDeque<Reply>,
    pub calls: Vec<(Command, Vec<String>)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `pk` to the index of `prefix` and stores the record hash
    pub fn insert(&mut self, prefix: &str, pk: &str, fields: &[(&str, &str)]) {
        self.lists
            .entry(prefix.to_string())
            .or_default()
            .push(pk.to_string());
        self.hashes.insert(
            format!("{}:a:{}", prefix, pk),
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
    }

    /// Queues the reply for the next EVAL
    pub fn queue_eval(&mut self, reply: Reply) {
        self.eval_replies.push_back(reply);
    }

    pub fn commands(&self) -> Vec<Command> {
        self.calls.iter().map(|(c, _)| *c).collect()
    }

    pub fn count(&self, command: Command) -> usize {
        self.calls.iter().filter(|(c, _)| *c == command).count()
    }

    /// Script texts sent with EVAL, in order
    pub fn scripts(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter(|(c, _)| *c == Command::Eval)
            .filter_map(|(_, args)| args.first().cloned())
            .collect()
    }

    /// Keys read with HGETALL, in order
    pub fn fetched(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter(|(c, _)| *c == Command::Hgetall)
            .filter_map(|(_, args)| args.first().cloned())
            .collect()
    }
}

impl CommandExecutor for MemoryStore {
    fn execute(&mut self, command: Command, args: &[&str]) -> ClientResult<Reply> {
        self.calls
            .push((command, args.iter().map(|a| a.to_string()).collect()));
        let key = args.first().copied().unwrap_or_default();
        match command {
            Command::Lrange => Ok(Reply::Array(
                self.lists
                    .get(key)
                    .map(|l| l.iter().map(|v| bulk(v)).collect())
                    .unwrap_or_default(),
            )),
            Command::Llen => Ok(Reply::Integer(
                self.lists.get(key).map_or(0, Vec::len).to_string(),
            )),
            Command::Hgetall => Ok(pairs_reply(
                &self
                    .hashes
                    .get(key)
                    .map(|fields| {
                        fields
                            .iter()
                            .map(|(k, v)| (k.as_str(), v.as_str()))
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default(),
            )),
            Command::Hget => {
                let field = args.get(1).copied().unwrap_or_default();
                Ok(Reply::Bulk(self.hashes.get(key).and_then(|fields| {
                    fields.iter().find(|(k, _)| k == field).map(|(_, v)| v.clone())
                })))
            }
            Command::Eval => self
                .eval_replies
                .pop_front()
                .ok_or_else(|| ClientError::command("ERR no canned reply", "EVAL")),
            other => Err(ClientError::command(
                format!("ERR unknown command '{}'", other.name()),
                other.name(),
            )),
        }
    }
}

// =============================================================================
// Replies
// =============================================================================

pub fn bulk(text: &str) -> Reply {
    Reply::Bulk(Some(text.to_string()))
}

/// A field/value interleaved array, as HGETALL returns it
pub fn pairs_reply(fields: &[(&str, &str)]) -> Reply {
    Reply::Array(
        fields
            .iter()
            .flat_map(|(k, v)| [bulk(k), bulk(v)])
            .collect(),
    )
}

/// An array of records, as the `all` script returns it
pub fn rows_reply(rows: &[&[(&str, &str)]]) -> Reply {
    Reply::Array(rows.iter().map(|fields| pairs_reply(fields)).collect())
}

pub fn row(fields: &[(&str, &str)]) -> Row {
    fields.iter().copied().collect()
}

// =============================================================================
// Record types
// =============================================================================

/// user; customer → orders (many), customer → items via orders (many),
/// order → customer (one), item
pub fn registry() -> RecordTypes {
    let link = |target: &str, source: &str| -> BTreeMap<String, String> {
        [(target.to_string(), source.to_string())].into()
    };

    let customer = RecordType::new("customer", "customer")
        .with_relation(Relation {
            name: "orders".into(),
            target: "order".into(),
            link: link("customer_id", "id"),
            multiple: true,
            via: None,
        })
        .with_relation(Relation {
            name: "items".into(),
            target: "item".into(),
            link: link("order_id", "id"),
            multiple: true,
            via: Some("orders".into()),
        });
    let order = RecordType::new("order", "order").with_relation(Relation {
        name: "customer".into(),
        target: "customer".into(),
        link: link("id", "customer_id"),
        multiple: false,
        via: None,
    });

    RecordTypes::from_types([
        RecordType::new("user", "user"),
        customer,
        order,
        RecordType::new("item", "item"),
    ])
    .unwrap()
}

/// Index `1, 2, 3` with statuses A, B, A
pub fn users() -> MemoryStore {
    let mut store = MemoryStore::new();
    store.insert("user", "1", &[("id", "1"), ("status", "A")]);
    store.insert("user", "2", &[("id", "2"), ("status", "B")]);
    store.insert("user", "3", &[("id", "3"), ("status", "A")]);
    store
}
