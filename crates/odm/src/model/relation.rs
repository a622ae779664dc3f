//! Relation declarations between models.
//!
//! A relation only describes how two indices are linked. Resolving it yields
//! the `(field, values)` filter to apply to a query on the related index;
//! fetching the related documents is left to the caller.

use serde_json::{Map, Value};

/// How a model links to documents in another index.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation {
    /// One related document holds this model's key in `foreign_key`.
    HasOne {
        related_index: String,
        foreign_key: String,
        local_key: String,
    },
    /// Many related documents hold this model's key in `foreign_key`.
    HasMany {
        related_index: String,
        foreign_key: String,
        local_key: String,
    },
    /// This model holds the related document's `owner_key` in `foreign_key`.
    BelongsTo {
        related_index: String,
        foreign_key: String,
        owner_key: String,
    },
    /// Related documents list this model's `parent_key` in their
    /// `related_pivot_key` array field.
    BelongsToMany {
        related_index: String,
        related_pivot_key: String,
        parent_key: String,
    },
}

/// The filter selecting the related documents of one parent.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationConstraint {
    /// Field on the related index.
    pub field: String,
    /// Accepted values for `field`.
    pub values: Vec<Value>,
}

impl Relation {
    /// `has_one` keyed on the parent's `id`.
    pub fn has_one(related_index: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Relation::HasOne {
            related_index: related_index.into(),
            foreign_key: foreign_key.into(),
            local_key: "id".to_string(),
        }
    }

    /// `has_many` keyed on the parent's `id`.
    pub fn has_many(related_index: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Relation::HasMany {
            related_index: related_index.into(),
            foreign_key: foreign_key.into(),
            local_key: "id".to_string(),
        }
    }

    /// `belongs_to` matching the related document's `id`.
    pub fn belongs_to(related_index: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Relation::BelongsTo {
            related_index: related_index.into(),
            foreign_key: foreign_key.into(),
            owner_key: "id".to_string(),
        }
    }

    /// `belongs_to_many` keyed on the parent's `id`.
    pub fn belongs_to_many(
        related_index: impl Into<String>,
        related_pivot_key: impl Into<String>,
    ) -> Self {
        Relation::BelongsToMany {
            related_index: related_index.into(),
            related_pivot_key: related_pivot_key.into(),
            parent_key: "id".to_string(),
        }
    }

    /// Returns the (unprefixed) index holding the related documents.
    pub fn related_index(&self) -> &str {
        match self {
            Relation::HasOne { related_index, .. }
            | Relation::HasMany { related_index, .. }
            | Relation::BelongsTo { related_index, .. }
            | Relation::BelongsToMany { related_index, .. } => related_index,
        }
    }

    /// Returns true if the relation resolves to at most one document.
    pub fn is_single(&self) -> bool {
        matches!(self, Relation::HasOne { .. } | Relation::BelongsTo { .. })
    }

    /// Resolves the filter for the given parent attributes.
    ///
    /// The parent's `id` is expected under the `"id"` key. Returns `None` when
    /// the parent lacks the key value, in which case nothing is related.
    pub fn constraint(&self, parent: &Map<String, Value>) -> Option<RelationConstraint> {
        let (field, key) = match self {
            Relation::HasOne {
                foreign_key,
                local_key,
                ..
            }
            | Relation::HasMany {
                foreign_key,
                local_key,
                ..
            } => (foreign_key, local_key),
            Relation::BelongsTo {
                foreign_key,
                owner_key,
                ..
            } => {
                let values = key_values(parent.get(foreign_key)?);
                return (!values.is_empty()).then(|| RelationConstraint {
                    field: owner_key.clone(),
                    values,
                });
            }
            Relation::BelongsToMany {
                related_pivot_key,
                parent_key,
                ..
            } => (related_pivot_key, parent_key),
        };

        let values = key_values(parent.get(key)?);
        (!values.is_empty()).then(|| RelationConstraint {
            field: field.clone(),
            values,
        })
    }
}

fn key_values(value: &Value) -> Vec<Value> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().filter(|v| !v.is_null()).cloned().collect(),
        other => vec![other.clone()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parent(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_has_many_uses_local_key() {
        let relation = Relation::has_many("comments", "post_id");
        let constraint = relation
            .constraint(&parent(json!({ "id": "p1", "title": "x" })))
            .unwrap();
        assert_eq!(constraint.field, "post_id");
        assert_eq!(constraint.values, vec![json!("p1")]);
        assert!(!relation.is_single());
    }

    #[test]
    fn test_belongs_to_uses_foreign_key_on_parent() {
        let relation = Relation::belongs_to("users", "author_id");
        let constraint = relation
            .constraint(&parent(json!({ "id": "p1", "author_id": "u7" })))
            .unwrap();
        assert_eq!(constraint.field, "id");
        assert_eq!(constraint.values, vec![json!("u7")]);
        assert!(relation.is_single());
        assert_eq!(relation.related_index(), "users");
    }

    #[test]
    fn test_belongs_to_many_matches_pivot_field() {
        let relation = Relation::belongs_to_many("tags", "post_ids");
        let constraint = relation.constraint(&parent(json!({ "id": "p1" }))).unwrap();
        assert_eq!(constraint.field, "post_ids");
        assert_eq!(constraint.values, vec![json!("p1")]);
    }

    #[test]
    fn test_missing_key_resolves_nothing() {
        let relation = Relation::belongs_to("users", "author_id");
        assert!(relation.constraint(&parent(json!({ "id": "p1" }))).is_none());
        assert!(
            relation
                .constraint(&parent(json!({ "author_id": null })))
                .is_none()
        );
    }
}
