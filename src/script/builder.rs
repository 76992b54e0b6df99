//! Lua script builder
//!
//! Turns a query descriptor into one Lua program that scans the primary key
//! index server-side and evaluates the condition per record.
//!
//! # Execution Flow (strict order)
//!
//! 1. Reject what the store cannot evaluate (ordering, raw conditions)
//! 2. Resolve the target column for column operations
//! 3. Compile the condition, registering each referenced column once
//! 4. Emit: index scan, one HGET per registered column, window guard,
//!    per-operation row body, per-operation return value
//!
//! Nothing here touches the network.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::observability::Event;
use crate::query::{ConditionNode, Operand, QueryDescriptor, RecordType, SupportsPagination, Value};

use super::errors::{CompileError, CompileResult};
use super::quote::{quote_str, quote_value};

/// What a query returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    All,
    One,
    Column,
    Count,
    Sum,
    Average,
    Min,
    Max,
}

const ALL_OPERATIONS: [Operation; 8] = [
    Operation::All,
    Operation::One,
    Operation::Column,
    Operation::Count,
    Operation::Sum,
    Operation::Average,
    Operation::Min,
    Operation::Max,
];

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::All => "all",
            Operation::One => "one",
            Operation::Column => "column",
            Operation::Count => "count",
            Operation::Sum => "sum",
            Operation::Average => "average",
            Operation::Min => "min",
            Operation::Max => "max",
        }
    }

    /// Case-insensitive lookup; `avg` is accepted for `average`
    pub fn from_name(name: &str) -> Option<Operation> {
        let lower = name.trim().to_ascii_lowercase();
        if lower == "avg" {
            return Some(Operation::Average);
        }
        ALL_OPERATIONS.into_iter().find(|op| op.name() == lower)
    }

    /// True for operations that read one target column
    pub fn needs_column(&self) -> bool {
        matches!(
            self,
            Operation::Column
                | Operation::Sum
                | Operation::Average
                | Operation::Min
                | Operation::Max
        )
    }

    /// Returns the target column, or MissingColumn when one is required
    pub fn target_column<'c>(&self, column: Option<&'c str>) -> CompileResult<Option<&'c str>> {
        match (self.needs_column(), column) {
            (true, None) => Err(CompileError::MissingColumn(self.name().to_string())),
            (true, Some(c)) if c.is_empty() => {
                Err(CompileError::MissingColumn(self.name().to_string()))
            }
            (true, column) => Ok(column),
            (false, _) => Ok(None),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A compiled program and the columns it reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledScript {
    pub text: String,
    /// `(column, alias)` in registration order
    pub columns: Vec<(String, String)>,
}

/// Rejects descriptors no strategy can execute.
pub fn validate(query: &QueryDescriptor) -> CompileResult<()> {
    if !query.order_by.is_empty() {
        return Err(CompileError::UnsupportedOperation(
            "ORDER BY is not supported by the key-value store".to_string(),
        ));
    }
    if let Some(ConditionNode::Raw(value)) = &query.condition {
        return Err(raw_condition(value));
    }
    Ok(())
}

/// Compiles the condition alone. `None` means "no constraint".
pub fn compile_condition(node: &ConditionNode) -> CompileResult<(Option<String>, Vec<(String, String)>)> {
    let mut compiler = ConditionCompiler::default();
    let expr = compiler.condition(node)?;
    Ok((expr, compiler.columns))
}

/// Compiles a query into a Lua program for `EVAL <script> 0`.
pub fn compile(
    record_type: &RecordType,
    query: &QueryDescriptor,
    operation: Operation,
    column: Option<&str>,
) -> CompileResult<CompiledScript> {
    validate(query)?;
    let target = operation.target_column(column)?;

    let mut compiler = ConditionCompiler::default();
    let condition = match &query.condition {
        Some(node) => compiler.condition(node)?,
        None => None,
    };
    let condition = condition.unwrap_or_else(|| "true".to_string());

    let target = target.map(quote_str);
    let window = query.window();
    let end = window.limit.map(|limit| window.offset.saturating_add(limit));

    let mut text = String::new();
    text.push_str(&format!("local key={}\n", quote_str(record_type.index_key())));
    text.push_str("local allpks=redis.call('LRANGE',key,0,-1)\n");
    text.push_str("local pks={}\nlocal n=0\nlocal v=nil\nlocal i=0\n");
    if compiler.uses_between {
        text.push_str(BETWEEN_HELPER);
    }
    text.push_str("for k,pk in ipairs(allpks) do\n");
    text.push_str("  local rk=key .. ':a:' .. pk\n");
    for (name, alias) in &compiler.columns {
        text.push_str(&format!(
            "  local {}=redis.call('HGET',rk,{})\n",
            alias,
            quote_str(name)
        ));
    }
    // dangling index entries are not records: never counted, never returned
    text.push_str(&format!(
        "  if redis.call('EXISTS',rk)==1 and {} then\n",
        condition
    ));
    text.push_str("    i=i+1\n");
    match end {
        Some(end) => text.push_str(&format!(
            "    if i>{} and i<={} then\n",
            window.offset, end
        )),
        None => text.push_str(&format!("    if i>{} then\n", window.offset)),
    }
    text.push_str(&format!("      {}\n", row_body(operation, target.as_deref())));
    text.push_str("    end\n");
    if let Some(end) = end {
        text.push_str(&format!("    if i>={} then break end\n", end));
    }
    text.push_str("  end\nend\n");
    text.push_str(&format!("return {}\n", return_value(operation)));

    debug!(
        event = Event::ScriptCompiled.as_str(),
        record_type = %record_type.name,
        operation = operation.name(),
        columns = compiler.columns.len(),
        bytes = text.len(),
        "script compiled"
    );

    Ok(CompiledScript {
        text,
        columns: compiler.columns,
    })
}

const BETWEEN_HELPER: &str = "local function between(x,lo,hi)
  if not x then return false end
  local nx,nl,nh=tonumber(x),tonumber(lo),tonumber(hi)
  if nx~=nil and nl~=nil and nh~=nil then return nx>=nl and nx<=nh end
  if type(lo)~='string' or type(hi)~='string' then return false end
  return x>=lo and x<=hi
end
";

fn row_body(operation: Operation, target: Option<&str>) -> String {
    let field = target.unwrap_or("''");
    let read = format!("redis.call('HGET',rk,{})", field);
    match operation {
        Operation::All => "n=n+1 pks[n]=redis.call('HGETALL',rk)".to_string(),
        Operation::One => "do return redis.call('HGETALL',rk) end".to_string(),
        Operation::Column => format!("n=n+1 pks[n]={}", read),
        Operation::Count => "n=n+1".to_string(),
        Operation::Sum => format!("n=n+(tonumber({}) or 0)", read),
        Operation::Average => format!("n=n+1 v=(v or 0)+(tonumber({}) or 0)", read),
        Operation::Min => format!(
            "local x=tonumber({}) if x~=nil and (v==nil or x<v) then v=x end",
            read
        ),
        Operation::Max => format!(
            "local x=tonumber({}) if x~=nil and (v==nil or x>v) then v=x end",
            read
        ),
    }
}

fn return_value(operation: Operation) -> &'static str {
    match operation {
        Operation::All | Operation::One | Operation::Column => "pks",
        Operation::Count => "n",
        Operation::Sum => "string.format('%.17g',n)",
        Operation::Average => "n>0 and string.format('%.17g',v/n) or false",
        Operation::Min | Operation::Max => "v~=nil and string.format('%.17g',v) or false",
    }
}

fn raw_condition(value: &Value) -> CompileError {
    let text = match value {
        Value::Expression(e) => e.clone(),
        other => other.as_text().unwrap_or_else(|| "null".to_string()),
    };
    CompileError::UnsupportedCondition(format!(
        "raw condition '{}' cannot be evaluated by the key-value store",
        text
    ))
}

fn separators() -> &'static Regex {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    SEPARATORS.get_or_init(|| Regex::new(r"[\s_\-]+").expect("literal pattern"))
}

fn non_letters() -> &'static Regex {
    static NON_LETTERS: OnceLock<Regex> = OnceLock::new();
    NON_LETTERS.get_or_init(|| Regex::new(r"[^A-Za-z]+").expect("literal pattern"))
}

/// Lowercases an operator and folds `-`/`_`/whitespace runs into one space.
pub fn normalize_operator(name: &str) -> String {
    separators()
        .replace_all(name.trim(), " ")
        .trim()
        .to_ascii_lowercase()
}

#[derive(Default)]
struct ConditionCompiler {
    columns: Vec<(String, String)>,
    uses_between: bool,
}

impl ConditionCompiler {
    /// Returns the alias of `column`, registering it on first use
    fn alias(&mut self, column: &str) -> String {
        if let Some((_, alias)) = self.columns.iter().find(|(c, _)| c == column) {
            return alias.clone();
        }
        let alias = format!(
            "c{}{}",
            non_letters().replace_all(column, ""),
            self.columns.len()
        );
        self.columns.push((column.to_string(), alias.clone()));
        alias
    }

    fn condition(&mut self, node: &ConditionNode) -> CompileResult<Option<String>> {
        match node {
            ConditionNode::Hash(pairs) => self.hash(pairs),
            ConditionNode::Operator(name, operands) => self.operator(name, operands),
            ConditionNode::Raw(value) => Err(raw_condition(value)),
        }
    }

    fn operand(&mut self, operand: &Operand) -> CompileResult<Option<String>> {
        match operand {
            Operand::Value(value) => Err(raw_condition(value)),
            other => match other.to_condition() {
                Some(node) => self.condition(&node),
                None => Err(CompileError::malformed(
                    "operand must be a hash or an operator list",
                )),
            },
        }
    }

    fn hash(&mut self, pairs: &[(String, Operand)]) -> CompileResult<Option<String>> {
        let mut parts = Vec::with_capacity(pairs.len());
        for (column, operand) in pairs {
            let alias = self.alias(column);
            let part = match operand {
                Operand::Value(value) => equality(&alias, value),
                Operand::List(items) => {
                    let values = items
                        .iter()
                        .map(|item| {
                            item.as_value().ok_or_else(|| {
                                CompileError::malformed(format!(
                                    "values for column '{}' must be scalars",
                                    column
                                ))
                            })
                        })
                        .collect::<CompileResult<Vec<_>>>()?;
                    disjunction(values.iter().map(|v| equality(&alias, v)).collect())
                        .unwrap_or_else(|| "false".to_string())
                }
                _ => {
                    return Err(CompileError::malformed(format!(
                        "value for column '{}' must be a scalar or a list",
                        column
                    )))
                }
            };
            parts.push(part);
        }
        Ok(conjunction(parts))
    }

    fn operator(&mut self, name: &str, operands: &[Operand]) -> CompileResult<Option<String>> {
        let operator = normalize_operator(name);
        if operator.contains("like") {
            return Err(CompileError::UnsupportedOperation(format!(
                "{} is not supported by the key-value store",
                operator.to_ascii_uppercase()
            )));
        }
        match operator.as_str() {
            "and" | "or" => {
                let mut parts = Vec::with_capacity(operands.len());
                for operand in operands {
                    if let Some(part) = self.operand(operand)? {
                        parts.push(part);
                    }
                }
                Ok(if operator == "and" {
                    conjunction(parts)
                } else {
                    disjunction(parts)
                })
            }
            "not" => {
                if operands.len() != 1 {
                    return Err(CompileError::malformed(format!(
                        "NOT expects 1 operand, got {}",
                        operands.len()
                    )));
                }
                let inner = self.operand(&operands[0])?;
                Ok(Some(format!("not ({})", inner.unwrap_or_else(|| "true".to_string()))))
            }
            "between" | "not between" => self.between(operator == "not between", operands).map(Some),
            "in" | "not in" => self.in_condition(operator == "not in", operands).map(Some),
            other => Err(CompileError::malformed(format!(
                "unknown operator '{}'",
                other
            ))),
        }
    }

    fn between(&mut self, negate: bool, operands: &[Operand]) -> CompileResult<String> {
        let (column, low, high) = match operands {
            [column, low, high] => (column, low, high),
            _ => {
                return Err(CompileError::malformed(format!(
                    "BETWEEN expects 3 operands, got {}",
                    operands.len()
                )))
            }
        };
        let column = column
            .as_text()
            .ok_or_else(|| CompileError::malformed("BETWEEN column must be a string"))?;
        let bound = |operand: &Operand| {
            operand
                .as_value()
                .map(quote_value)
                .ok_or_else(|| CompileError::malformed("BETWEEN bounds must be scalars"))
        };
        let (low, high) = (bound(low)?, bound(high)?);

        let alias = self.alias(column);
        self.uses_between = true;
        let call = format!("between({},{},{})", alias, low, high);
        Ok(if negate { format!("not {}", call) } else { call })
    }

    fn in_condition(&mut self, negate: bool, operands: &[Operand]) -> CompileResult<String> {
        let (columns, values) = match operands {
            [columns, values] => (columns, values),
            _ => {
                return Err(CompileError::malformed(format!(
                    "IN expects 2 operands, got {}",
                    operands.len()
                )))
            }
        };

        let columns: Vec<&str> = match columns {
            Operand::Value(Value::Text(column)) => vec![column.as_str()],
            Operand::List(items) if !items.is_empty() => items
                .iter()
                .map(|item| {
                    item.as_text()
                        .ok_or_else(|| CompileError::malformed("IN columns must be strings"))
                })
                .collect::<CompileResult<_>>()?,
            _ => {
                return Err(CompileError::malformed(
                    "IN expects a column or a non-empty list of columns",
                ))
            }
        };

        let candidates: Vec<&Operand> = match values {
            Operand::List(items) => items.iter().collect(),
            Operand::Value(_) | Operand::Map(_) => vec![values],
            Operand::Condition(_) => {
                return Err(CompileError::malformed("IN values must be a list"))
            }
        };

        let aliases: Vec<(String, &str)> = columns.iter().map(|c| (self.alias(c), *c)).collect();
        let mut alternatives = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let part = match (candidate, aliases.as_slice()) {
                (Operand::Value(value), [(alias, _)]) => equality(alias, value),
                (Operand::Map(pairs), _) => {
                    let mut checks = Vec::with_capacity(aliases.len());
                    for (alias, column) in &aliases {
                        let value = match pairs.iter().find(|(k, _)| k == column) {
                            None => Value::Null,
                            Some((_, Operand::Value(value))) => value.clone(),
                            Some(_) => {
                                return Err(CompileError::malformed(format!(
                                    "IN value for column '{}' must be a scalar",
                                    column
                                )))
                            }
                        };
                        checks.push(equality(alias, &value));
                    }
                    conjunction(checks).unwrap_or_else(|| "true".to_string())
                }
                (Operand::Value(_), _) => {
                    return Err(CompileError::malformed(
                        "IN over several columns expects column/value maps",
                    ))
                }
                _ => return Err(CompileError::malformed("IN values must be scalars or maps")),
            };
            alternatives.push(part);
        }

        Ok(match (disjunction(alternatives), negate) {
            (None, false) => "false".to_string(),
            (None, true) => "true".to_string(),
            (Some(expr), false) => expr,
            (Some(expr), true) => format!("not {}", expr),
        })
    }
}

fn equality(alias: &str, value: &Value) -> String {
    format!("{}=={}", alias, quote_value(value))
}

/// `(a) and (b)`, a single part unchanged, `None` when empty
fn conjunction(parts: Vec<String>) -> Option<String> {
    join(parts, " and ")
}

fn disjunction(parts: Vec<String>) -> Option<String> {
    join(parts, " or ")
}

fn join(parts: Vec<String>, joiner: &str) -> Option<String> {
    match parts.len() {
        0 => None,
        1 => parts.into_iter().next().map(|p| format!("({})", p)),
        _ => Some(format!(
            "({})",
            parts
                .iter()
                .map(|p| format!("({})", p))
                .collect::<Vec<_>>()
                .join(joiner)
        )),
    }
}
