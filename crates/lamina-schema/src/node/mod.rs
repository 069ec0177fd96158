//! Schema nodes.
//!
//! Immutable descriptions of record types and their indexes. Built once at
//! process start via `SchemaBuilder` and shared by handle; nothing here
//! mutates after construction.

mod attribute;
mod entity;
mod former_index;
mod index;
mod schema;

pub use attribute::{Attribute, EnumMetadata};
pub use entity::Entity;
pub use former_index::FormerIndex;
pub use index::{
    DistanceMetric, HnswParams, Index, IndexKind, IndexOptions, IndexScope, RankOrder, ScoreKind,
    SpatialParams,
};
pub use schema::{BuildError, Schema, SchemaBuilder};
