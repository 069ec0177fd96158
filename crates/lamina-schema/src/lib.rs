//! Schema metadata for Lamina: record-type descriptions, key expressions,
//! and the evolution validator that decides whether a new schema can
//! supersede an old one.
#![warn(unreachable_pub)]

pub mod expr;
pub mod node;
pub mod validate;
pub mod version;

/// Maximum length for entity schema identifiers.
pub const MAX_ENTITY_NAME_LEN: usize = 64;

/// Maximum length for field schema identifiers.
pub const MAX_FIELD_NAME_LEN: usize = 64;

/// Maximum length for index identifiers.
pub const MAX_INDEX_NAME_LEN: usize = 128;

///
/// Prelude
///

pub mod prelude {
    pub use crate::{
        expr::{FieldAccess, FieldValue, KeyExpression},
        node::{
            Attribute, EnumMetadata, Entity, FormerIndex, Index, IndexKind, IndexOptions,
            IndexScope, RankOrder, Schema, SchemaBuilder, ScoreKind,
        },
        version::SchemaVersion,
    };
}
