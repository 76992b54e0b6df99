//! Result rows

use std::collections::BTreeMap;

use serde::Serialize;

/// One stored record: its fields plus any relations loaded onto it
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Row {
    #[serde(flatten)]
    fields: BTreeMap<String, String>,
    #[serde(rename = "_related", skip_serializing_if = "BTreeMap::is_empty")]
    related: BTreeMap<String, Vec<Row>>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a row from field/value pairs as HGETALL returns them
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            fields: pairs.into_iter().collect(),
            related: BTreeMap::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Rows loaded for `relation`, if it was populated
    pub fn related(&self, relation: &str) -> Option<&[Row]> {
        self.related.get(relation).map(Vec::as_slice)
    }

    pub fn set_related(&mut self, relation: impl Into<String>, rows: Vec<Row>) {
        self.related.insert(relation.into(), rows);
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Row::from_pairs(iter.into_iter().map(|(k, v)| (k.into(), v.into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_fields() {
        let row: Row = [("id", "1"), ("name", "a")].into_iter().collect();
        assert_eq!(row.get("id"), Some("1"));
        assert_eq!(row.get("missing"), None);
        assert!(row.related("posts").is_none());
    }

    #[test]
    fn test_row_serializes_flat() {
        let mut row: Row = [("id", "1")].into_iter().collect();
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"{"id":"1"}"#);

        row.set_related("posts", vec![[("id", "7")].into_iter().collect()]);
        assert_eq!(
            serde_json::to_string(&row).unwrap(),
            r#"{"id":"1","_related":{"posts":[{"id":"7"}]}}"#
        );
    }
}
