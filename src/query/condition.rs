//! Condition tree
//!
//! Two shapes, mirroring how filters are usually written by hand:
//!
//! - hash form: `{"status": "A", "id": [1, 2]}`, column → value (equality),
//!   list (IN) or null (field absent);
//! - operator form: `["and", cond, cond]`, `["between", "score", 10, 20]`,
//!   `["in", ["a", "b"], [{"a": 1, "b": 2}]]`, ...
//!
//! Operators are kept as plain strings here and only interpreted by the
//! script compiler, so an unsupported operator can always be constructed
//! and is rejected at compile time.

use serde_json::Value as Json;

/// A scalar operand
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// A Lua expression embedded verbatim. Never built from user input.
    Expression(String),
}

impl Value {
    /// Returns the text a value compares as, `None` for null and expressions.
    ///
    /// Bools compare as `1`/`0`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Null | Value::Expression(_) => None,
            Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            Value::Int(n) => Some(n.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Text(s) => Some(s.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Converts a JSON scalar. Arrays and objects are not scalars.
    pub fn from_json(json: &Json) -> Option<Value> {
        match json {
            Json::Null => Some(Value::Null),
            Json::Bool(b) => Some(Value::Bool(*b)),
            Json::Number(n) => Some(if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if n.is_u64() {
                // beyond i64: keep the digits
                Value::Text(n.to_string())
            } else {
                Value::Float(n.as_f64().unwrap_or(0.0))
            }),
            Json::String(s) => Some(Value::Text(s.clone())),
            Json::Array(_) | Json::Object(_) => None,
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }

            impl From<$ty> for Operand {
                fn from(v: $ty) -> Self {
                    Operand::Value(Value::$variant(v.into()))
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i32 => Int,
    i64 => Int,
    u32 => Int,
    f64 => Float,
    String => Text,
    &str => Text,
}

/// A node in operator or hash position
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(Value),
    List(Vec<Operand>),
    /// Column → operand, in insertion order
    Map(Vec<(String, Operand)>),
    Condition(ConditionNode),
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Value(v)
    }
}

impl From<ConditionNode> for Operand {
    fn from(node: ConditionNode) -> Self {
        Operand::Condition(node)
    }
}

impl<T: Into<Operand>> From<Vec<T>> for Operand {
    fn from(items: Vec<T>) -> Self {
        Operand::List(items.into_iter().map(Into::into).collect())
    }
}

impl Operand {
    /// Converts any JSON value
    pub fn from_json(json: &Json) -> Operand {
        match json {
            Json::Array(items) => Operand::List(items.iter().map(Operand::from_json).collect()),
            Json::Object(map) => Operand::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Operand::from_json(v)))
                    .collect(),
            ),
            scalar => Operand::Value(Value::from_json(scalar).unwrap_or(Value::Null)),
        }
    }

    /// Returns the scalar, if this is one
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Operand::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the text of a `Value::Text` operand
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Operand::Value(Value::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// Interprets this operand as a condition, if it has a condition shape
    pub fn to_condition(&self) -> Option<ConditionNode> {
        match self {
            Operand::Condition(node) => Some(node.clone()),
            Operand::Map(pairs) => Some(ConditionNode::Hash(pairs.clone())),
            Operand::List(items) => match items.split_first() {
                Some((Operand::Value(Value::Text(operator)), rest)) => {
                    Some(ConditionNode::Operator(operator.clone(), rest.to_vec()))
                }
                None => Some(ConditionNode::Hash(Vec::new())),
                _ => None,
            },
            Operand::Value(_) => None,
        }
    }
}

/// A filter condition
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionNode {
    /// Column → operand pairs, all of which must hold
    Hash(Vec<(String, Operand)>),
    /// `[operator, operand...]`
    Operator(String, Vec<Operand>),
    /// A bare scalar. Never compilable.
    Raw(Value),
}

impl ConditionNode {
    /// Parses a JSON condition: objects are hash form, arrays with a string
    /// head are operator form, scalars are raw.
    pub fn from_json(json: &Json) -> ConditionNode {
        let operand = Operand::from_json(json);
        match operand.to_condition() {
            Some(node) => node,
            None => match operand {
                Operand::Value(v) => ConditionNode::Raw(v),
                other => ConditionNode::Operator(String::new(), vec![other]),
            },
        }
    }

    /// Hash form from column/value pairs
    pub fn hash<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Operand>,
    {
        ConditionNode::Hash(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// `{column: value}`
    pub fn eq(column: impl Into<String>, value: impl Into<Operand>) -> Self {
        ConditionNode::Hash(vec![(column.into(), value.into())])
    }

    /// Any operator with arbitrary operands
    pub fn operator(name: impl Into<String>, operands: Vec<Operand>) -> Self {
        ConditionNode::Operator(name.into(), operands)
    }

    pub fn and(nodes: impl IntoIterator<Item = ConditionNode>) -> Self {
        Self::operator("and", nodes.into_iter().map(Operand::Condition).collect())
    }

    pub fn or(nodes: impl IntoIterator<Item = ConditionNode>) -> Self {
        Self::operator("or", nodes.into_iter().map(Operand::Condition).collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(node: ConditionNode) -> Self {
        Self::operator("not", vec![Operand::Condition(node)])
    }

    pub fn between(
        column: impl Into<String>,
        low: impl Into<Operand>,
        high: impl Into<Operand>,
    ) -> Self {
        Self::operator(
            "between",
            vec![Operand::from(column.into()), low.into(), high.into()],
        )
    }

    pub fn not_between(
        column: impl Into<String>,
        low: impl Into<Operand>,
        high: impl Into<Operand>,
    ) -> Self {
        Self::operator(
            "not between",
            vec![Operand::from(column.into()), low.into(), high.into()],
        )
    }

    /// `["in", column, [values]]`
    pub fn in_values<V: Into<Operand>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::operator(
            "in",
            vec![
                Operand::from(column.into()),
                Operand::List(values.into_iter().map(Into::into).collect()),
            ],
        )
    }

    /// `["not in", column, [values]]`
    pub fn not_in_values<V: Into<Operand>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::operator(
            "not in",
            vec![
                Operand::from(column.into()),
                Operand::List(values.into_iter().map(Into::into).collect()),
            ],
        )
    }

    /// `["in", [columns], [{column: value, ...}, ...]]`
    pub fn in_tuples(columns: &[&str], candidates: Vec<Vec<(String, Value)>>) -> Self {
        Self::operator(
            "in",
            vec![
                Operand::List(columns.iter().map(|c| Operand::from(*c)).collect()),
                Operand::List(
                    candidates
                        .into_iter()
                        .map(|pairs| {
                            Operand::Map(
                                pairs
                                    .into_iter()
                                    .map(|(k, v)| (k, Operand::Value(v)))
                                    .collect(),
                            )
                        })
                        .collect(),
                ),
            ],
        )
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::operator(
            "like",
            vec![Operand::from(column.into()), Operand::from(pattern.into())],
        )
    }

    /// A scalar condition, e.g. a hand-written expression string
    pub fn raw(text: impl Into<String>) -> Self {
        ConditionNode::Raw(Value::Text(text.into()))
    }

    /// Returns the hash pairs if this is hash form
    pub fn as_hash(&self) -> Option<&[(String, Operand)]> {
        match self {
            ConditionNode::Hash(pairs) => Some(pairs),
            _ => None,
        }
    }
}
