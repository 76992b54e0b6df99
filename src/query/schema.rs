//! Record types and relations
//!
//! A record type names a key prefix and its primary-key columns; relations
//! describe how records of one type link to records of another. Loaded from
//! configuration, read-only afterwards.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::errors::{SchemaError, SchemaResult};
use super::keys;

fn default_primary_key() -> Vec<String> {
    vec!["id".to_string()]
}

/// A named link from one record type to another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub name: String,
    /// Target record type
    pub target: String,
    /// Target column → source column
    pub link: BTreeMap<String, String>,
    /// Whether the relation yields many rows
    #[serde(default)]
    pub multiple: bool,
    /// Another relation on the same source type used as intermediate hop
    #[serde(default)]
    pub via: Option<String>,
}

impl Relation {
    /// `(target column, source column)` pairs, ordered by target column
    pub fn link_pairs(&self) -> Vec<(String, String)> {
        self.link
            .iter()
            .map(|(target, source)| (target.clone(), source.clone()))
            .collect()
    }
}

/// One kind of stored record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordType {
    pub name: String,
    pub key_prefix: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl RecordType {
    pub fn new(name: impl Into<String>, key_prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_prefix: key_prefix.into(),
            primary_key: default_primary_key(),
            relations: Vec::new(),
        }
    }

    pub fn with_primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn relation(&self, name: &str) -> SchemaResult<&Relation> {
        self.relations
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| SchemaError::UnknownRelation {
                record_type: self.name.clone(),
                relation: name.to_string(),
            })
    }

    /// Key of the primary-key index list
    pub fn index_key(&self) -> &str {
        &self.key_prefix
    }

    /// Key of the hash holding the record with this normalized key
    pub fn record_key(&self, normalized_pk: &str) -> String {
        format!("{}:a:{}", self.key_prefix, normalized_pk)
    }

    /// Key of the counter a persistence layer uses to allocate `field`
    pub fn sequence_key(&self, field: &str) -> String {
        format!("{}:s:{}", self.key_prefix, field)
    }

    /// Normalizes a primary key given as column → value text
    pub fn normalize_key(&self, values: &BTreeMap<String, String>) -> String {
        keys::normalize_key(values)
    }

    pub fn validate(&self) -> SchemaResult<()> {
        if self.name.trim().is_empty() {
            return Err(SchemaError::Invalid("record type name must not be empty".into()));
        }
        if self.key_prefix.is_empty() {
            return Err(SchemaError::Invalid(format!(
                "record type '{}' has an empty key_prefix",
                self.name
            )));
        }
        if self.primary_key.is_empty() {
            return Err(SchemaError::Invalid(format!(
                "record type '{}' has no primary key columns",
                self.name
            )));
        }
        for relation in &self.relations {
            if relation.link.is_empty() {
                return Err(SchemaError::Invalid(format!(
                    "relation '{}.{}' has no link columns",
                    self.name, relation.name
                )));
            }
            if let Some(via) = &relation.via {
                if via == &relation.name {
                    return Err(SchemaError::Invalid(format!(
                        "relation '{}.{}' cannot go via itself",
                        self.name, relation.name
                    )));
                }
                self.relation(via)?;
            }
        }
        Ok(())
    }
}

/// Registry of all record types, by name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordTypes {
    types: HashMap<String, RecordType>,
}

impl RecordTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds and validates a registry. Relation targets must be registered.
    pub fn from_types(types: impl IntoIterator<Item = RecordType>) -> SchemaResult<Self> {
        let mut registry = Self::new();
        for record_type in types {
            record_type.validate()?;
            if registry.types.contains_key(&record_type.name) {
                return Err(SchemaError::Invalid(format!(
                    "record type '{}' declared twice",
                    record_type.name
                )));
            }
            registry.types.insert(record_type.name.clone(), record_type);
        }
        for record_type in registry.types.values() {
            for relation in &record_type.relations {
                registry.get(&relation.target)?;
            }
        }
        Ok(registry)
    }

    pub fn insert(&mut self, record_type: RecordType) {
        self.types.insert(record_type.name.clone(), record_type);
    }

    pub fn get(&self, name: &str) -> SchemaResult<&RecordType> {
        self.types
            .get(name)
            .ok_or_else(|| SchemaError::UnknownRecordType(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
