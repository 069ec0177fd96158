//! The typed record store.
//!
//! One store per (record type, subspace). A save writes the serialized
//! record row and drives every applicable index maintainer inside the same
//! transaction, so the row and its index entries are never observable out
//! of step. The store never commits; failure propagation bubbles to the
//! caller-owned transaction.

mod cursor;

#[cfg(test)]
mod tests;

pub use cursor::{RecordCursor, ScanOptions};

use crate::{
    index::Maintainer,
    record::Recordable,
    state::{self, IndexState},
};
use lamina_core::{
    codec::RecordCodec,
    error::Error,
    kv::Transaction,
    subspace::Subspace,
    tuple::Tuple,
};
use lamina_schema::node::{Entity, IndexScope, Schema};
use std::sync::Arc;

///
/// RecordStore
///
/// Key layout under the store root:
/// - `records/<typeName>/<pk...> -> record bytes`
/// - `indexes/<indexName>/...`    (partition-scoped index data)
/// - `storeInfo/...`              (index states, former-index markers)
///
/// The applicable-index list is computed at construction from the schema
/// handle; the container rebuilds stores when the schema reference
/// changes.
///

pub struct RecordStore {
    schema: Arc<Schema>,
    entity: Entity,
    root: Subspace,
    records: Subspace,
    store_info: Subspace,
    maintainers: Vec<Maintainer>,
    codec: RecordCodec,
}

impl RecordStore {
    /// Open a store for one record type. Contract violations by the
    /// schema or its indexes surface here and are fatal.
    pub fn open(
        schema: Arc<Schema>,
        record_name: &str,
        root: Subspace,
        global_root: Option<&Subspace>,
    ) -> Result<Self, Error> {
        let entity = schema
            .entity(record_name)
            .ok_or_else(|| Error::internal(format!("unknown record type '{record_name}'")))?
            .clone();

        let records = root.subspace("records").subspace(record_name);
        let store_info = root.subspace("storeInfo");

        let mut maintainers = Vec::new();
        for index in schema.indexes_for(record_name) {
            let subspace = match index.scope {
                IndexScope::Partition => root.subspace("indexes").subspace(index.name.clone()),
                IndexScope::Global => global_root
                    .ok_or_else(|| {
                        Error::internal(format!(
                            "index '{}' is global but the store has no global subspace",
                            index.name
                        ))
                    })?
                    .subspace("indexes")
                    .subspace(index.name.clone()),
            };
            maintainers.push(Maintainer::build(index, subspace)?);
        }

        Ok(Self {
            schema,
            entity,
            root,
            records,
            store_info,
            maintainers,
            codec: RecordCodec::default(),
        })
    }

    /// Replace the row codec (tightens or relaxes the row ceiling).
    #[must_use]
    pub const fn with_codec(mut self, codec: RecordCodec) -> Self {
        self.codec = codec;
        self
    }

    #[must_use]
    pub const fn codec(&self) -> &RecordCodec {
        &self.codec
    }

    #[must_use]
    pub const fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    #[must_use]
    pub const fn entity(&self) -> &Entity {
        &self.entity
    }

    #[must_use]
    pub const fn root(&self) -> &Subspace {
        &self.root
    }

    #[must_use]
    pub const fn store_info(&self) -> &Subspace {
        &self.store_info
    }

    #[must_use]
    pub fn maintainers(&self) -> &[Maintainer] {
        &self.maintainers
    }

    #[must_use]
    pub fn maintainer(&self, index_name: &str) -> Option<&Maintainer> {
        self.maintainers.iter().find(|m| m.index_name() == index_name)
    }

    /// Byte range holding every record row of this type.
    #[must_use]
    pub fn records_range(&self) -> (Vec<u8>, Vec<u8>) {
        self.records.range()
    }

    #[must_use]
    pub fn record_key(&self, pk: &Tuple) -> Vec<u8> {
        self.records.pack(pk)
    }

    /// Decode the primary key out of a record-row key.
    pub fn record_pk(&self, key: &[u8]) -> Result<Tuple, Error> {
        self.records.unpack(key)
    }

    pub fn index_state(&self, tx: &dyn Transaction, index_name: &str) -> Result<IndexState, Error> {
        state::read_state(tx, &self.store_info, index_name)
    }

    pub fn set_index_state(&self, tx: &mut dyn Transaction, index_name: &str, new: IndexState) {
        state::write_state(tx, &self.store_info, index_name, new);
    }

    /// Evaluate the entity's canonical primary-key expression.
    pub fn primary_key<R: Recordable>(&self, record: &R) -> Result<Tuple, Error> {
        let columns = self.entity.primary_key_expression().evaluate(record)?;
        if columns.len() != self.entity.primary_key_length() {
            return Err(Error::internal(format!(
                "primary key of '{}' evaluated to {} columns, expected {}",
                self.entity.name,
                columns.len(),
                self.entity.primary_key_length()
            )));
        }
        Ok(Tuple::from_elements(columns))
    }

    fn check_type<R: Recordable>(&self) -> Result<(), Error> {
        if R::record_name() == self.entity.name {
            Ok(())
        } else {
            Err(Error::internal(format!(
                "store for '{}' used with record type '{}'",
                self.entity.name,
                R::record_name()
            )))
        }
    }

    /// Insert or replace one record, maintaining every applicable index in
    /// the same transaction.
    pub fn save<R: Recordable>(&self, tx: &mut dyn Transaction, record: &R) -> Result<(), Error> {
        self.check_type::<R>()?;

        let pk = self.primary_key(record)?;
        let row_key = self.record_key(&pk);

        let old: Option<R> = tx
            .get(&row_key, false)?
            .map(|bytes| self.codec.decode(&bytes))
            .transpose()?;

        // Unique checks run before any write, in this same transaction,
        // so a conflicting concurrent insert cannot slip between check
        // and write.
        for maintainer in &self.maintainers {
            let Some(unique) = maintainer.as_unique_value() else {
                continue;
            };
            if !self
                .index_state(tx, maintainer.index_name())?
                .maintains_entries()
            {
                continue;
            }

            let conflicts = unique.conflicting_pks(tx, &pk, record)?;
            if conflicts.is_empty() {
                continue;
            }
            if unique.replaces_on_duplicate() {
                for conflict in conflicts {
                    self.delete::<R>(tx, &conflict)?;
                }
            } else {
                return Err(Error::UniquenessViolation {
                    index: maintainer.index_name().to_string(),
                    existing: format!("{:?}", conflicts[0].elements()),
                    attempted: format!("{:?}", pk.elements()),
                });
            }
        }

        tx.set(&row_key, &self.codec.encode(record)?);

        for maintainer in &self.maintainers {
            if !self
                .index_state(tx, maintainer.index_name())?
                .maintains_entries()
            {
                continue;
            }
            maintainer.update(
                tx,
                &pk,
                old.as_ref().map(|r| r as &dyn lamina_schema::expr::FieldAccess),
                Some(record),
            )?;
        }

        Ok(())
    }

    /// Delete one record by primary key. Deleting a missing key is a
    /// no-op.
    pub fn delete<R: Recordable>(&self, tx: &mut dyn Transaction, pk: &Tuple) -> Result<(), Error> {
        self.check_type::<R>()?;

        let row_key = self.record_key(pk);
        let Some(bytes) = tx.get(&row_key, false)? else {
            return Ok(());
        };
        let old: R = self.codec.decode(&bytes)?;

        tx.clear(&row_key);
        for maintainer in &self.maintainers {
            if !self
                .index_state(tx, maintainer.index_name())?
                .maintains_entries()
            {
                continue;
            }
            maintainer.update(
                tx,
                pk,
                Some(&old as &dyn lamina_schema::expr::FieldAccess),
                None,
            )?;
        }

        Ok(())
    }

    /// Snapshot read of one record.
    pub fn fetch<R: Recordable>(
        &self,
        tx: &dyn Transaction,
        pk: &Tuple,
    ) -> Result<Option<R>, Error> {
        self.check_type::<R>()?;

        tx.get(&self.record_key(pk), true)?
            .map(|bytes| self.codec.decode(&bytes))
            .transpose()
    }

    /// Lazy, finite, restartable scan over this type's records. Restart by
    /// passing the last seen primary key as `after`.
    pub fn scan<'a, R: Recordable>(
        &self,
        tx: &'a dyn Transaction,
        options: ScanOptions,
    ) -> Result<RecordCursor<'a, R>, Error> {
        self.check_type::<R>()?;
        Ok(RecordCursor::new(tx, &self.records, self.codec, options))
    }
}
