//! Filter specifications shared by every paged listing.
//!
//! A [`FilterSpec`] is plain data: it is built once per request and handed to
//! both the count and the fetch side of a record source, so the two can never
//! disagree about which records match.

use crate::entity::Entity;

/// A comparable field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Int(i64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// At least one of `fields` contains `needle` (case-insensitive).
    Contains {
        fields: Vec<&'static str>,
        needle: String,
    },
    /// `field` holds exactly `value`. Multi-valued fields match on any element.
    Equals {
        field: &'static str,
        value: FieldValue,
    },
}

/// Conjunction of predicates. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    predicates: Vec<Predicate>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a keyword predicate. Absent or blank needles add nothing.
    pub fn contains(mut self, fields: &[&'static str], needle: Option<&str>) -> Self {
        if let Some(needle) = needle.map(str::trim).filter(|n| !n.is_empty()) {
            self.predicates.push(Predicate::Contains {
                fields: fields.to_vec(),
                needle: needle.to_string(),
            });
        }
        self
    }

    pub fn equals(mut self, field: &'static str, value: FieldValue) -> Self {
        self.predicates.push(Predicate::Equals { field, value });
        self
    }

    pub fn equals_opt(self, field: &'static str, value: Option<FieldValue>) -> Self {
        match value {
            Some(value) => self.equals(field, value),
            None => self,
        }
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Evaluate the filter against an in-memory record.
    pub fn matches<R: Record>(&self, record: &R) -> bool {
        self.predicates.iter().all(|p| match p {
            Predicate::Contains { fields, needle } => {
                let needle = needle.to_lowercase();
                fields.iter().any(|f| {
                    record
                        .text(f)
                        .is_some_and(|v| v.to_lowercase().contains(&needle))
                })
            }
            Predicate::Equals { field, value } => record.has_value(field, value),
        })
    }
}

/// A record that can be filtered by a [`FilterSpec`].
///
/// The entity id doubles as the stable sort key for paging.
pub trait Record: Entity {
    fn text(&self, field: &str) -> Option<&str>;

    fn has_value(&self, field: &str, value: &FieldValue) -> bool;
}
