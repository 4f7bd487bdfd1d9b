//! Record representation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One row, as an ordered tuple of field texts.
///
/// Equality is field-wise and the derived hash is consistent with it,
/// which is what the result merger's de-duplication relies on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<String>,
}

impl Record {
    /// Creates a record from field values.
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    /// The record's fields in order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Field at `index`, if present.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// A new record holding the fields at `indices`, in that order.
    pub fn project(&self, indices: &[usize]) -> Record {
        Record {
            fields: indices
                .iter()
                .filter_map(|&i| self.fields.get(i).cloned())
                .collect(),
        }
    }
}

impl<S: Into<String>> FromIterator<S> for Record {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Record {
            fields: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.fields.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_equality_is_field_wise() {
        let a: Record = ["1", "ada"].into_iter().collect();
        let b = Record::new(vec!["1".to_string(), "ada".to_string()]);
        assert_eq!(a, b);
        assert_ne!(a, ["1", "bob"].into_iter().collect());
    }

    #[test]
    fn test_hash_consistent_with_equality() {
        let mut set = HashSet::new();
        set.insert(Record::from_iter(["1", "ada"]));
        assert!(!set.insert(Record::from_iter(["1", "ada"])));
        assert!(set.insert(Record::from_iter(["2", "ada"])));
    }

    #[test]
    fn test_project_keeps_order() {
        let rec = Record::from_iter(["1", "ada", "true"]);
        assert_eq!(rec.project(&[0, 2]), Record::from_iter(["1", "true"]));
    }
}
