//! # lamina
//!
//! `lamina` is the **public facade crate** for the Lamina record layer.
//! It is the recommended dependency for applications building on a
//! transactional ordered key-value store.
//!
//! ## Crate layout
//!
//! - `core`
//!   Tuple layer, subspaces, the KV driver boundary, RangeSet, and the
//!   record codec.
//!
//! - `schema`
//!   Record-type metadata, key expressions, schema build validation, and
//!   the evolution validator.
//!
//! - `store`
//!   Typed record stores, the index maintainer framework (value, unique,
//!   aggregates, rank, vector, spatial, version), the online indexer, and
//!   the multi-tenant container.
//!
//! - `migrate`
//!   Schema-version tracking and resumable online migrations.
//!
//! - `spatial`
//!   Hilbert-curve cell ids and bounded region covering.
//!
//! ## Prelude
//!
//! `prelude` re-exports the vocabulary applications touch every day:
//! schema nodes, the store surface, and the tuple types. Engine internals
//! stay one module level down.

// crates
pub use lamina_core as core;
pub use lamina_migrate as migrate;
pub use lamina_schema as schema;
pub use lamina_spatial as spatial;
pub use lamina_store as store;

pub use lamina_core::error::Error;

/// Workspace version re-export for downstream tooling and tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Prelude
/// using _ brings traits into scope and avoids name conflicts
///

pub mod prelude {
    pub use crate::Error;
    pub use lamina_core::{
        kv::{AtomicKind, Database as _, Transaction as _},
        subspace::Subspace,
        tuple::{Element, Tuple},
    };
    pub use lamina_migrate::{Migration, MigrationContext, MigrationManager};
    pub use lamina_schema::{
        expr::{FieldAccess, FieldValue, KeyExpression},
        node::{
            Attribute, EnumMetadata, Entity, FormerIndex, Index, IndexKind, IndexOptions,
            IndexScope, RankOrder, Schema, ScoreKind,
        },
        validate::{EvolutionOptions, validate_evolution},
        version::SchemaVersion,
    };
    pub use lamina_store::prelude::*;
    pub use serde::{Deserialize, Serialize};
}
