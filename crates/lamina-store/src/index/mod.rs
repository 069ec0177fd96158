//! Index maintainers.
//!
//! One maintainer per index per store, dispatched by index kind through a
//! tagged enum. Every maintainer exposes the same two entry points:
//! `update` reflects a single record change inside the caller's
//! transaction, and `scan_for_build` populates entries from existing data
//! during an online build. Updates must be idempotent with respect to the
//! emitted index keys for any given record state.

pub mod aggregate;
pub mod rank;
pub mod spatial;
pub mod value;
pub mod vector;
pub mod version;

use crate::index::{
    aggregate::{CountMaintainer, ExtremeMaintainer, SumMaintainer},
    rank::RankMaintainer,
    spatial::SpatialMaintainer,
    value::ValueMaintainer,
    vector::VectorMaintainer,
    version::VersionMaintainer,
};
use lamina_core::{error::Error, kv::Transaction, subspace::Subspace, tuple::Tuple};
use lamina_schema::{
    expr::FieldAccess,
    node::{Index, IndexKind},
};

/// `pack(prefix) + 0xff`: exclusive end bound covering every key that
/// extends `bytes` with further tuple columns.
pub(crate) fn prefix_end(mut bytes: Vec<u8>) -> Vec<u8> {
    bytes.push(0xff);
    bytes
}

///
/// Maintainer
///

pub enum Maintainer {
    Value(ValueMaintainer),
    Count(CountMaintainer),
    Sum(SumMaintainer),
    Extreme(ExtremeMaintainer),
    Rank(RankMaintainer),
    Version(VersionMaintainer),
    Vector(VectorMaintainer),
    Spatial(SpatialMaintainer),
}

impl Maintainer {
    /// Construct the maintainer for one index rooted at `subspace`.
    /// Collaborator-contract violations surface here and are fatal.
    pub fn build(index: &Index, subspace: Subspace) -> Result<Self, Error> {
        match index.kind {
            IndexKind::Value | IndexKind::Unique => {
                Ok(Self::Value(ValueMaintainer::new(index, subspace)))
            }
            IndexKind::Count => Ok(Self::Count(CountMaintainer::new(index, subspace))),
            IndexKind::Sum => SumMaintainer::new(index, subspace).map(Self::Sum),
            IndexKind::Min => Ok(Self::Extreme(ExtremeMaintainer::min(index, subspace))),
            IndexKind::Max => Ok(Self::Extreme(ExtremeMaintainer::max(index, subspace))),
            IndexKind::Rank => RankMaintainer::new(index, subspace).map(Self::Rank),
            IndexKind::Version => Ok(Self::Version(VersionMaintainer::new(index, subspace))),
            IndexKind::Vector => VectorMaintainer::new(index, subspace).map(Self::Vector),
            IndexKind::Spatial => SpatialMaintainer::new(index, subspace).map(Self::Spatial),
        }
    }

    #[must_use]
    pub fn index_name(&self) -> &str {
        match self {
            Self::Value(m) => m.index_name(),
            Self::Count(m) => m.index_name(),
            Self::Sum(m) => m.index_name(),
            Self::Extreme(m) => m.index_name(),
            Self::Rank(m) => m.index_name(),
            Self::Version(m) => m.index_name(),
            Self::Vector(m) => m.index_name(),
            Self::Spatial(m) => m.index_name(),
        }
    }

    /// Drive the index to reflect one record change. `old`/`new` are the
    /// before and after images; a save passes both, a delete passes only
    /// `old`, an initial insert only `new`.
    pub fn update(
        &self,
        tx: &mut dyn Transaction,
        pk: &Tuple,
        old: Option<&dyn FieldAccess>,
        new: Option<&dyn FieldAccess>,
    ) -> Result<(), Error> {
        match self {
            Self::Value(m) => m.update(tx, pk, old, new),
            Self::Count(m) => m.update(tx, pk, old, new),
            Self::Sum(m) => m.update(tx, pk, old, new),
            Self::Extreme(m) => m.update(tx, pk, old, new),
            Self::Rank(m) => m.update(tx, pk, old, new),
            Self::Version(m) => m.update(tx, pk, old, new),
            Self::Vector(m) => m.update(tx, pk, old, new),
            Self::Spatial(m) => m.update(tx, pk, old, new),
        }
    }

    /// Populate entries for one existing record (online indexer only).
    pub fn scan_for_build(
        &self,
        tx: &mut dyn Transaction,
        pk: &Tuple,
        record: &dyn FieldAccess,
    ) -> Result<(), Error> {
        self.update(tx, pk, None, Some(record))
    }

    /// Remove every entry this maintainer has written.
    pub fn clear(&self, tx: &mut dyn Transaction) {
        let (begin, end) = self.subspace().range();
        tx.clear_range(&begin, &end);
    }

    fn subspace(&self) -> &Subspace {
        match self {
            Self::Value(m) => m.subspace(),
            Self::Count(m) => m.subspace(),
            Self::Sum(m) => m.subspace(),
            Self::Extreme(m) => m.subspace(),
            Self::Rank(m) => m.subspace(),
            Self::Version(m) => m.subspace(),
            Self::Vector(m) => m.subspace(),
            Self::Spatial(m) => m.subspace(),
        }
    }

    /// The unique-value maintainer, when this index enforces uniqueness.
    #[must_use]
    pub fn as_unique_value(&self) -> Option<&ValueMaintainer> {
        match self {
            Self::Value(m) if m.is_unique() => Some(m),
            _ => None,
        }
    }
}
