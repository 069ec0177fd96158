//! Vector index scaffolding.
//!
//! Persists each record's embedding under a stable key for an external
//! HNSW implementation; the graph algorithm itself is a collaborator, not
//! part of this engine. Only the metadata shape (dimensions, m,
//! ef_construction, distance metric) is owned here.

use lamina_core::{
    error::Error,
    kv::Transaction,
    subspace::Subspace,
    tuple::Tuple,
};
use lamina_schema::{
    expr::{FieldAccess, KeyExpression},
    node::{HnswParams, Index},
};

///
/// VectorMaintainer
///
/// Entry layout: `<subspace>/entries/<pk...> -> pack(embedding columns)`.
///

pub struct VectorMaintainer {
    name: String,
    root: KeyExpression,
    entries: Subspace,
    params: HnswParams,
    subspace: Subspace,
}

impl VectorMaintainer {
    pub fn new(index: &Index, subspace: Subspace) -> Result<Self, Error> {
        let params = index.options.hnsw.ok_or_else(|| {
            Error::internal(format!("index '{}': vector index without hnsw params", index.name))
        })?;

        Ok(Self {
            name: index.name.clone(),
            root: index.root.clone(),
            entries: subspace.subspace("entries"),
            params,
            subspace,
        })
    }

    #[must_use]
    pub fn index_name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn subspace(&self) -> &Subspace {
        &self.subspace
    }

    #[must_use]
    pub const fn params(&self) -> &HnswParams {
        &self.params
    }

    pub fn update(
        &self,
        tx: &mut dyn Transaction,
        pk: &Tuple,
        old: Option<&dyn FieldAccess>,
        new: Option<&dyn FieldAccess>,
    ) -> Result<(), Error> {
        let key = self.entries.pack(pk);

        match new {
            Some(record) => {
                let embedding = Tuple::from_elements(self.root.evaluate(record)?);
                tx.set(&key, &embedding.pack());
            }
            None if old.is_some() => tx.clear(&key),
            None => {}
        }

        Ok(())
    }

    /// Stored embedding for one record.
    pub fn embedding(&self, tx: &dyn Transaction, pk: &Tuple) -> Result<Option<Tuple>, Error> {
        tx.get(&self.entries.pack(pk), true)?
            .map(|raw| Tuple::unpack(&raw))
            .transpose()
    }
}
