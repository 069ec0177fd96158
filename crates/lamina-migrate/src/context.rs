//! The surface handed to each migration's execute closure.

use lamina_core::{
    error::Error,
    kv::{Database, Transaction},
    rangeset::RangeSet,
    subspace::Subspace,
    tuple::Tuple,
};
use lamina_schema::{node::Schema, version::SchemaVersion};
use lamina_store::{
    batch::{BatchConfig, BatchStats, run_batches},
    indexer::OnlineIndexer,
    record::Recordable,
    state::IndexState,
    store::RecordStore,
};
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

///
/// MigrationContext
///
/// Every operation here creates and commits its own transactions; the
/// enclosing migration is durable only through its applied marker, written
/// by the manager after the whole closure succeeds.
///

pub struct MigrationContext {
    db: Arc<dyn Database>,
    schema: Arc<Schema>,
    store_root: Subspace,
    global_root: Option<Subspace>,
    migration_subspace: Subspace,
}

impl MigrationContext {
    pub(crate) fn new(
        db: Arc<dyn Database>,
        schema: Arc<Schema>,
        store_root: Subspace,
        global_root: Option<Subspace>,
        migration_subspace: Subspace,
    ) -> Self {
        Self {
            db,
            schema,
            store_root,
            global_root,
            migration_subspace,
        }
    }

    /// Open the store for one record type under this manager's root.
    pub fn store(&self, record_name: &str) -> Result<Arc<RecordStore>, Error> {
        RecordStore::open(
            Arc::clone(&self.schema),
            record_name,
            self.store_root.clone(),
            self.global_root.as_ref(),
        )
        .map(Arc::new)
    }

    fn indexer<R: Recordable>(&self) -> Result<OnlineIndexer, Error> {
        Ok(OnlineIndexer::new(
            Arc::clone(&self.db),
            self.store(R::record_name())?,
        ))
    }

    /// Enable an index (write-only), build it online from existing
    /// records, and mark it readable.
    pub fn add_index<R: Recordable>(&mut self, index_name: &str) -> Result<(), Error> {
        self.indexer::<R>()?.build::<R>(index_name)
    }

    /// Disable, clear, rebuild, and mark readable.
    pub fn rebuild_index<R: Recordable>(&mut self, index_name: &str) -> Result<(), Error> {
        self.indexer::<R>()?.rebuild::<R>(index_name)
    }

    /// Retire an index: write its former-index marker, disable it, and
    /// clear its data range. The index need not exist in the current
    /// schema anymore; only scalar fields are persisted.
    pub fn remove_index(
        &mut self,
        index_name: &str,
        added_version: SchemaVersion,
    ) -> Result<(), Error> {
        let store_info = self.store_root.subspace("storeInfo");
        let marker_key = store_info
            .subspace("formerIndexes")
            .pack(&Tuple::single(index_name));

        let mut marker = Tuple::new();
        marker.push(added_version.major);
        marker.push(added_version.minor);
        marker.push(added_version.patch);
        marker.push(wall_clock());

        let mut tx = self.db.create_transaction();
        tx.set(&marker_key, &marker.pack());
        lamina_store::state::write_state(tx.as_mut(), &store_info, index_name, IndexState::Disabled);

        let (begin, end) = self
            .store_root
            .subspace("indexes")
            .subspace(index_name)
            .range();
        tx.clear_range(&begin, &end);
        tx.commit()
    }

    /// Rewrite every record of one type through `f`, in resumable batches.
    /// Each batch commits atomically with its progress entry. The
    /// transformation must keep the primary key stable.
    pub fn transform_records<R: Recordable>(
        &mut self,
        config: &BatchConfig,
        mut f: impl FnMut(R) -> Result<R, Error>,
    ) -> Result<BatchStats, Error> {
        let store = self.store(R::record_name())?;
        let progress = RangeSet::new(
            self.migration_subspace
                .subspace("transform")
                .subspace(R::record_name()),
        );
        let (begin, end) = store.records_range();

        let stats = run_batches(
            self.db.as_ref(),
            &progress,
            &begin,
            &end,
            config,
            |tx, rows| {
                for (_, value) in rows {
                    let record: R = store.codec().decode(value)?;
                    let transformed = f(record)?;
                    store.save(tx, &transformed)?;
                }
                Ok(())
            },
        )?;
        tracing::info!(
            record = R::record_name(),
            batches = stats.batches,
            records = stats.records,
            "transform complete"
        );
        Ok(stats)
    }

    /// Delete every record of one type matching `predicate`, in resumable
    /// batches.
    pub fn delete_records<R: Recordable>(
        &mut self,
        config: &BatchConfig,
        mut predicate: impl FnMut(&R) -> bool,
    ) -> Result<BatchStats, Error> {
        let store = self.store(R::record_name())?;
        let progress = RangeSet::new(
            self.migration_subspace
                .subspace("delete")
                .subspace(R::record_name()),
        );
        let (begin, end) = store.records_range();

        let stats = run_batches(
            self.db.as_ref(),
            &progress,
            &begin,
            &end,
            config,
            |tx, rows| {
                for (key, value) in rows {
                    let record: R = store.codec().decode(value)?;
                    if predicate(&record) {
                        let pk = store.record_pk(key)?;
                        store.delete::<R>(tx, &pk)?;
                    }
                }
                Ok(())
            },
        )?;
        tracing::info!(
            record = R::record_name(),
            batches = stats.batches,
            records = stats.records,
            "delete pass complete"
        );
        Ok(stats)
    }

    /// Run an arbitrary read-modify-write in a fresh transaction.
    pub fn execute_operation(
        &mut self,
        f: impl FnOnce(&mut dyn Transaction) -> Result<(), Error>,
    ) -> Result<(), Error> {
        let mut tx = self.db.create_transaction();
        f(tx.as_mut())?;
        tx.commit()
    }
}

fn wall_clock() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
