//! Relation loading
//!
//! Lazy: [`relation_query`] derives a descriptor bound to parent rows; the
//! executor resolves that binding (running the `via` hop first) when the
//! descriptor is executed.
//!
//! Eager: [`ResolvesRelations::populate`] loads each `with` relation in one
//! query over all primary rows and distributes the results by link values.

use std::collections::BTreeMap;

use tracing::debug;

use crate::observability::Event;
use crate::protocol::CommandExecutor;

use super::descriptor::{PrimaryLink, QueryDescriptor, ViaHop};
use super::errors::{QueryResult, SchemaResult};
use super::executor::QueryExecutor;
use super::planner;
use super::row::Row;
use super::schema::{RecordType, RecordTypes};

/// Relation resolution, implemented by the executor
pub trait ResolvesRelations {
    /// Returns `query` with its primary link folded into the condition.
    /// Descriptors without a link are returned unchanged.
    fn resolve(&mut self, query: &QueryDescriptor) -> QueryResult<QueryDescriptor>;

    /// Loads the `with` relations of `record_type` onto `rows`
    fn populate(
        &mut self,
        record_type: &RecordType,
        with: &[String],
        rows: &mut [Row],
    ) -> QueryResult<()>;
}

/// Builds the descriptor of relation `name` of `source`, bound to `parents`.
pub fn relation_query(
    registry: &RecordTypes,
    source: &RecordType,
    name: &str,
    parents: Vec<Row>,
) -> SchemaResult<QueryDescriptor> {
    let relation = source.relation(name)?;
    registry.get(&relation.target)?;

    let (parents, via) = match &relation.via {
        None => (parents, None),
        Some(via_name) => {
            let via_relation = source.relation(via_name)?;
            let hop = ViaHop {
                query: relation_query(registry, source, via_name, parents)?,
                multiple: via_relation.multiple,
            };
            (Vec::new(), Some(Box::new(hop)))
        }
    };

    Ok(QueryDescriptor::new(relation.target.clone()).primary(PrimaryLink {
        parents,
        link: relation.link_pairs(),
        via,
    }))
}

/// Groups dotted relation names by their first segment:
/// `["a.b", "a.c", "d"]` → `{a: [b, c], d: []}`
fn group_with(with: &[String]) -> BTreeMap<&str, Vec<String>> {
    let mut groups: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for name in with {
        match name.split_once('.') {
            Some((head, rest)) => groups.entry(head).or_default().push(rest.to_string()),
            None => {
                groups.entry(name.as_str()).or_default();
            }
        }
    }
    groups
}

/// True when every `(target column, source column)` pair has equal values
fn linked(target: &Row, source: &Row, link: &[(String, String)]) -> bool {
    link.iter().all(|(t, s)| match (target.get(t), source.get(s)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    })
}

fn select(candidates: &[Row], source: &Row, link: &[(String, String)], multiple: bool) -> Vec<Row> {
    let matched = candidates.iter().filter(|c| linked(c, source, link));
    if multiple {
        matched.cloned().collect()
    } else {
        matched.take(1).cloned().collect()
    }
}

impl<C: CommandExecutor> ResolvesRelations for QueryExecutor<'_, C> {
    fn resolve(&mut self, query: &QueryDescriptor) -> QueryResult<QueryDescriptor> {
        let Some(link) = &query.primary else {
            return Ok(query.clone());
        };
        let resolved = match &link.via {
            None => planner::apply_link(query, &link.parents, &link.link),
            Some(hop) => {
                let parents = if hop.multiple {
                    self.all(&hop.query)?
                } else {
                    self.one(&hop.query)?.into_iter().collect()
                };
                planner::apply_link(query, &parents, &link.link)
            }
        };
        Ok(resolved)
    }

    fn populate(
        &mut self,
        record_type: &RecordType,
        with: &[String],
        rows: &mut [Row],
    ) -> QueryResult<()> {
        let registry = self.registry;
        for (name, nested) in group_with(with) {
            let relation = record_type.relation(name)?;
            let link = relation.link_pairs();

            let mut target_query = QueryDescriptor::new(relation.target.clone());
            target_query.with = nested;

            match &relation.via {
                None => {
                    let target_query = target_query.primary(PrimaryLink {
                        parents: rows.to_vec(),
                        link: link.clone(),
                        via: None,
                    });
                    let targets = self.all(&target_query)?;
                    for row in rows.iter_mut() {
                        let matched = select(&targets, row, &link, relation.multiple);
                        row.set_related(name, matched);
                    }
                }
                Some(via_name) => {
                    let via_relation = record_type.relation(via_name)?;
                    let via_link = via_relation.link_pairs();
                    let via_query = relation_query(registry, record_type, via_name, rows.to_vec())?;
                    let via_rows = self.all(&via_query)?;

                    let target_query = target_query.primary(PrimaryLink {
                        parents: via_rows.clone(),
                        link: link.clone(),
                        via: None,
                    });
                    let targets = self.all(&target_query)?;

                    for row in rows.iter_mut() {
                        let hops = select(&via_rows, row, &via_link, via_relation.multiple);
                        let mut matched: Vec<Row> = Vec::new();
                        for hop in &hops {
                            for target in select(&targets, hop, &link, true) {
                                if !matched.contains(&target) {
                                    matched.push(target);
                                }
                            }
                        }
                        if !relation.multiple {
                            matched.truncate(1);
                        }
                        row.set_related(name, matched);
                    }
                }
            }

            debug!(
                event = Event::RelationPopulated.as_str(),
                record_type = %record_type.name,
                relation = name,
                rows = rows.len(),
                "relation populated"
            );
        }
        Ok(())
    }
}
