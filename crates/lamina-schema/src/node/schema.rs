use crate::{
    MAX_ENTITY_NAME_LEN, MAX_FIELD_NAME_LEN, MAX_INDEX_NAME_LEN,
    node::{Entity, FormerIndex, Index, IndexKind},
    version::SchemaVersion,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error as ThisError;

///
/// BuildError
///
/// Construction-time contract violations. Checks run in a staged,
/// deterministic order and accumulate; the builder never rejects on the
/// first finding.
///

#[derive(Debug, ThisError)]
#[error("schema build failed: {}", issues.join("; "))]
pub struct BuildError {
    pub issues: Vec<String>,
}

///
/// Schema
///
/// The only source of truth the store consults during writes. Immutable
/// once built; evolution produces a new Schema and validates the pair.
///

#[derive(Clone, Debug, Serialize)]
pub struct Schema {
    version: SchemaVersion,
    entities: Vec<Entity>,
    indexes: Vec<Index>,
    former_indexes: BTreeMap<String, FormerIndex>,
    partition_field: Option<String>,
}

impl Schema {
    #[must_use]
    pub fn builder(version: SchemaVersion) -> SchemaBuilder {
        SchemaBuilder {
            version,
            entities: Vec::new(),
            indexes: Vec::new(),
            former_indexes: BTreeMap::new(),
            partition_field: None,
        }
    }

    #[must_use]
    pub const fn version(&self) -> SchemaVersion {
        self.version
    }

    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    #[must_use]
    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indexes.iter().find(|i| i.name == name)
    }

    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    #[must_use]
    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    #[must_use]
    pub const fn former_indexes(&self) -> &BTreeMap<String, FormerIndex> {
        &self.former_indexes
    }

    #[must_use]
    pub fn partition_field(&self) -> Option<&str> {
        self.partition_field.as_deref()
    }

    /// All indexes applicable to `record_name`, in insertion order.
    #[must_use]
    pub fn indexes_for(&self, record_name: &str) -> Vec<&Index> {
        self.indexes
            .iter()
            .filter(|i| i.applies_to(record_name))
            .collect()
    }
}

///
/// SchemaBuilder
///

pub struct SchemaBuilder {
    version: SchemaVersion,
    entities: Vec<Entity>,
    indexes: Vec<Index>,
    former_indexes: BTreeMap<String, FormerIndex>,
    partition_field: Option<String>,
}

impl SchemaBuilder {
    #[must_use]
    pub fn entity(mut self, entity: Entity) -> Self {
        self.entities.push(entity);
        self
    }

    #[must_use]
    pub fn index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    #[must_use]
    pub fn former_index(mut self, former: FormerIndex) -> Self {
        self.former_indexes.insert(former.name.clone(), former);
        self
    }

    /// Declare the field that partitions every entity (multi-tenant key).
    #[must_use]
    pub fn partition_field(mut self, field: impl Into<String>) -> Self {
        self.partition_field = Some(field.into());
        self
    }

    pub fn build(self) -> Result<Schema, BuildError> {
        let mut issues = Vec::new();

        self.check_entities(&mut issues);
        self.check_indexes(&mut issues);

        if issues.is_empty() {
            Ok(Schema {
                version: self.version,
                entities: self.entities,
                indexes: self.indexes,
                former_indexes: self.former_indexes,
                partition_field: self.partition_field,
            })
        } else {
            Err(BuildError { issues })
        }
    }

    fn check_entities(&self, issues: &mut Vec<String>) {
        let mut seen = BTreeSet::new();

        for entity in &self.entities {
            if entity.name.is_empty() || entity.name.len() > MAX_ENTITY_NAME_LEN {
                issues.push(format!("entity name '{}' has invalid length", entity.name));
            }
            if !seen.insert(entity.name.clone()) {
                issues.push(format!("duplicate entity name '{}'", entity.name));
            }

            let mut fields = BTreeSet::new();
            for attribute in &entity.attributes {
                if attribute.name.is_empty() || attribute.name.len() > MAX_FIELD_NAME_LEN {
                    issues.push(format!(
                        "entity '{}': field name '{}' has invalid length",
                        entity.name, attribute.name
                    ));
                }
                if !fields.insert(attribute.name.clone()) {
                    issues.push(format!(
                        "entity '{}': duplicate field '{}'",
                        entity.name, attribute.name
                    ));
                }

                if let Some(enumeration) = &attribute.enumeration {
                    if enumeration.cases.is_empty() {
                        issues.push(format!(
                            "entity '{}': enum '{}' has no cases",
                            entity.name, enumeration.name
                        ));
                    }
                    let unique: BTreeSet<_> = enumeration.cases.iter().collect();
                    if unique.len() != enumeration.cases.len() {
                        issues.push(format!(
                            "entity '{}': enum '{}' has duplicate cases",
                            entity.name, enumeration.name
                        ));
                    }
                }

                if attribute.primary_key
                    && !entity.primary_key_fields.contains(&attribute.name)
                {
                    issues.push(format!(
                        "entity '{}': field '{}' is flagged primary-key but absent from the key",
                        entity.name, attribute.name
                    ));
                }
            }

            if entity.primary_key_fields.is_empty() {
                issues.push(format!("entity '{}' has no primary key", entity.name));
            }
            for field in &entity.primary_key_fields {
                match entity.attribute(field) {
                    None => issues.push(format!(
                        "entity '{}': primary-key field '{}' is not an attribute",
                        entity.name, field
                    )),
                    Some(attribute) if attribute.optional => issues.push(format!(
                        "entity '{}': primary-key field '{}' must not be optional",
                        entity.name, field
                    )),
                    Some(_) => {}
                }
            }
        }
    }

    fn check_indexes(&self, issues: &mut Vec<String>) {
        let mut seen = BTreeSet::new();

        for index in &self.indexes {
            if index.name.is_empty() || index.name.len() > MAX_INDEX_NAME_LEN {
                issues.push(format!("index name '{}' has invalid length", index.name));
            }
            if !seen.insert(index.name.clone()) {
                issues.push(format!("duplicate index name '{}'", index.name));
            }

            if let Some(former) = self.former_indexes.get(&index.name)
                && former.removed_version >= self.version
            {
                issues.push(format!(
                    "index '{}' reuses a name retired at version {}",
                    index.name, former.removed_version
                ));
            }

            if index.options.unique
                && !matches!(index.kind, IndexKind::Value | IndexKind::Unique)
            {
                issues.push(format!(
                    "index '{}': unique option requires a value index",
                    index.name
                ));
            }

            if index.kind == IndexKind::Rank && index.root.column_count() == 0 {
                issues.push(format!(
                    "index '{}': rank root expression has no score column",
                    index.name
                ));
            }

            if index.kind == IndexKind::Vector && index.options.hnsw.is_none() {
                issues.push(format!("index '{}': vector index needs hnsw params", index.name));
            }
            if index.kind == IndexKind::Spatial && index.options.spatial.is_none() {
                issues.push(format!(
                    "index '{}': spatial index needs spatial params",
                    index.name
                ));
            }

            if !index.covering.is_empty()
                && !matches!(index.kind, IndexKind::Value | IndexKind::Unique)
            {
                issues.push(format!(
                    "index '{}': covering fields require a value index",
                    index.name
                ));
            }

            if let Some(types) = &index.record_types {
                for name in types {
                    if self.entities.iter().all(|e| &e.name != name) {
                        issues.push(format!(
                            "index '{}' names unknown record type '{name}'",
                            index.name
                        ));
                    }
                }
            }

            self.check_index_per_entity(index, issues);
        }
    }

    fn check_index_per_entity(&self, index: &Index, issues: &mut Vec<String>) {
        let root_fields = index.root.field_names();

        for entity in self
            .entities
            .iter()
            .filter(|e| index.applies_to(&e.name))
        {
            for covering in &index.covering {
                if root_fields.contains(covering) {
                    issues.push(format!(
                        "index '{}': covering field '{covering}' duplicates an indexed field",
                        index.name
                    ));
                }
                if entity.primary_key_fields.contains(covering) {
                    issues.push(format!(
                        "index '{}': covering field '{covering}' duplicates a primary-key field of '{}'",
                        index.name, entity.name
                    ));
                }
            }

            // A global index over partitioned records can only be split
            // back per tenant if the primary key leads with the partition
            // field. Rejected here rather than documented away.
            if index.scope == crate::node::IndexScope::Global
                && let Some(partition) = &self.partition_field
                && entity.primary_key_fields.first() != Some(partition)
            {
                issues.push(format!(
                    "index '{}': global scope requires entity '{}' to lead its primary key with partition field '{partition}'",
                    index.name, entity.name
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests;
