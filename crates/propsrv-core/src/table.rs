//! Generic key/value property table exposed by the host.

use std::collections::HashMap;

use crate::value::PropertyValue;

/// Snapshot of the host's generic property table.
///
/// Names are looked up verbatim; the host may add and remove entries
/// between ticks, so a missing entry is an absent value, not an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyTable {
    values: HashMap<String, PropertyValue>,
}

impl PropertyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a value, returning the previous one.
    pub fn insert(&mut self, name: impl Into<String>, value: PropertyValue) -> Option<PropertyValue> {
        self.values.insert(name.into(), value)
    }

    pub fn remove(&mut self, name: &str) -> Option<PropertyValue> {
        self.values.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, PropertyValue)> for PropertyTable {
    fn from_iter<I: IntoIterator<Item = (K, PropertyValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let mut table = PropertyTable::new();
        assert!(table.is_empty());
        table.insert("DataCorePlugin.CurrentGame", PropertyValue::Str("AC".into()));
        assert_eq!(
            table.get("DataCorePlugin.CurrentGame"),
            Some(&PropertyValue::Str("AC".into()))
        );
        assert!(table.remove("DataCorePlugin.CurrentGame").is_some());
        assert!(table.get("DataCorePlugin.CurrentGame").is_none());
    }

    #[test]
    fn test_from_iter() {
        let table: PropertyTable = [("a", PropertyValue::Int(1)), ("b", PropertyValue::Bool(true))]
            .into_iter()
            .collect();
        assert_eq!(table.len(), 2);
    }
}
