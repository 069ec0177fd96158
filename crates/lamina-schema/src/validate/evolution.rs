//! Old-schema / new-schema comparison.
//!
//! Findings are values, accumulated in order; validation itself never
//! fails. Rules run in a fixed sequence so two runs over the same pair of
//! schemas yield identical results.

use crate::node::Schema;
use serde::Serialize;
use std::fmt::{self, Display};

///
/// EvolutionOptions
///

#[derive(Clone, Copy, Debug, Default)]
pub struct EvolutionOptions {
    /// Accept index format changes, downgrading them to warnings; the
    /// caller is expected to rebuild the affected indexes.
    pub allow_index_rebuilds: bool,
    /// Accept new required fields (the codec must supply defaults).
    pub allow_field_additions: bool,
    /// Accept optional -> required narrowing.
    pub allow_optional_fields: bool,
}

///
/// EvolutionError
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub enum EvolutionError {
    RecordTypeDeleted {
        entity: String,
    },
    FieldDeleted {
        entity: String,
        field: String,
    },
    FieldTypeChanged {
        entity: String,
        field: String,
        old: String,
        new: String,
    },
    RequiredFieldAdded {
        entity: String,
        field: String,
    },
    EnumValueDeleted {
        entity: String,
        field: String,
        cases: Vec<String>,
    },
    IndexFormatChanged {
        index: String,
        old: String,
        new: String,
    },
    IndexDeletedWithoutFormerIndex {
        index: String,
    },
}

impl Display for EvolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RecordTypeDeleted { entity } => {
                write!(f, "record type '{entity}' was deleted")
            }
            Self::FieldDeleted { entity, field } => {
                write!(f, "field '{entity}.{field}' was deleted")
            }
            Self::FieldTypeChanged {
                entity,
                field,
                old,
                new,
            } => write!(f, "field '{entity}.{field}' changed from {old} to {new}"),
            Self::RequiredFieldAdded { entity, field } => {
                write!(f, "required field '{entity}.{field}' was added")
            }
            Self::EnumValueDeleted {
                entity,
                field,
                cases,
            } => write!(
                f,
                "enum field '{entity}.{field}' lost cases: {}",
                cases.join(", ")
            ),
            Self::IndexFormatChanged { index, old, new } => {
                write!(f, "index '{index}' format changed from {old} to {new}")
            }
            Self::IndexDeletedWithoutFormerIndex { index } => {
                write!(f, "index '{index}' was deleted without a former-index marker")
            }
        }
    }
}

///
/// ValidationResult
///
/// Monoid: `valid()` is the identity, `add_error` flips validity and
/// appends, `add_warning` preserves validity.
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ValidationResult {
    errors: Vec<EvolutionError>,
    warnings: Vec<String>,
}

impl ValidationResult {
    #[must_use]
    pub fn valid() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: EvolutionError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn merge(&mut self, other: Self) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    #[must_use]
    pub fn errors(&self) -> &[EvolutionError] {
        &self.errors
    }

    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// Decide whether `new` can supersede `old`.
#[must_use]
pub fn validate_evolution(
    old: &Schema,
    new: &Schema,
    options: &EvolutionOptions,
) -> ValidationResult {
    let mut result = ValidationResult::valid();

    check_entity_deletions(old, new, &mut result);
    check_fields(old, new, options, &mut result);
    check_enum_shrinkage(old, new, &mut result);
    check_index_deletions(old, new, &mut result);
    check_index_formats(old, new, options, &mut result);

    result
}

// Rule 1: entity deletion is forbidden.
fn check_entity_deletions(old: &Schema, new: &Schema, result: &mut ValidationResult) {
    for entity in old.entities() {
        if new.entity(&entity.name).is_none() {
            result.add_error(EvolutionError::RecordTypeDeleted {
                entity: entity.name.clone(),
            });
        }
    }
}

// Rules 2-4: field deletion, required narrowing, required additions.
fn check_fields(
    old: &Schema,
    new: &Schema,
    options: &EvolutionOptions,
    result: &mut ValidationResult,
) {
    for old_entity in old.entities() {
        let Some(new_entity) = new.entity(&old_entity.name) else {
            continue;
        };

        for old_attr in &old_entity.attributes {
            match new_entity.attribute(&old_attr.name) {
                None => result.add_error(EvolutionError::FieldDeleted {
                    entity: old_entity.name.clone(),
                    field: old_attr.name.clone(),
                }),
                Some(new_attr) => {
                    // required -> optional is always safe; the reverse
                    // narrows what existing rows may contain.
                    if old_attr.optional && !new_attr.optional && !options.allow_optional_fields {
                        result.add_error(EvolutionError::FieldTypeChanged {
                            entity: old_entity.name.clone(),
                            field: old_attr.name.clone(),
                            old: "optional".to_string(),
                            new: "required".to_string(),
                        });
                    }
                }
            }
        }

        for new_attr in &new_entity.attributes {
            if old_entity.attribute(&new_attr.name).is_none()
                && !new_attr.optional
                && !options.allow_field_additions
            {
                result.add_error(EvolutionError::RequiredFieldAdded {
                    entity: old_entity.name.clone(),
                    field: new_attr.name.clone(),
                });
            }
        }
    }
}

// Rule 5: enum shrinkage is forbidden.
fn check_enum_shrinkage(old: &Schema, new: &Schema, result: &mut ValidationResult) {
    for old_entity in old.entities() {
        let Some(new_entity) = new.entity(&old_entity.name) else {
            continue;
        };

        for old_attr in &old_entity.attributes {
            let (Some(old_enum), Some(new_enum)) = (
                old_attr.enumeration.as_ref(),
                new_entity
                    .attribute(&old_attr.name)
                    .and_then(|a| a.enumeration.as_ref()),
            ) else {
                continue;
            };

            let mut deleted: Vec<String> = old_enum
                .cases
                .iter()
                .filter(|case| !new_enum.has_case(case))
                .cloned()
                .collect();

            if !deleted.is_empty() {
                deleted.sort();
                result.add_error(EvolutionError::EnumValueDeleted {
                    entity: old_entity.name.clone(),
                    field: old_attr.name.clone(),
                    cases: deleted,
                });
            }
        }
    }
}

// Rule 6: a dropped index needs a former-index marker.
fn check_index_deletions(old: &Schema, new: &Schema, result: &mut ValidationResult) {
    for index in old.indexes() {
        if new.index(&index.name).is_none() && !new.former_indexes().contains_key(&index.name) {
            result.add_error(EvolutionError::IndexDeletedWithoutFormerIndex {
                index: index.name.clone(),
            });
        }
    }
}

// Rule 7: surviving indexes must keep kind and column count. Deep
// structural equality of expression trees is a known future extension;
// a structural change that preserves the column count passes silently.
fn check_index_formats(
    old: &Schema,
    new: &Schema,
    options: &EvolutionOptions,
    result: &mut ValidationResult,
) {
    for old_index in old.indexes() {
        let Some(new_index) = new.index(&old_index.name) else {
            continue;
        };

        let old_format = format!(
            "{}/{} columns",
            old_index.kind,
            old_index.root.column_count()
        );
        let new_format = format!(
            "{}/{} columns",
            new_index.kind,
            new_index.root.column_count()
        );

        if old_format != new_format {
            if options.allow_index_rebuilds {
                result.add_warning(format!(
                    "index '{}' format changed from {old_format} to {new_format}; rebuild required",
                    old_index.name
                ));
            } else {
                result.add_error(EvolutionError::IndexFormatChanged {
                    index: old_index.name.clone(),
                    old: old_format,
                    new: new_format,
                });
            }
        }
    }
}
