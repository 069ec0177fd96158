//! Online index building.
//!
//! Populates an index from existing records without blocking writers: the
//! index is flipped to write-only (so live saves keep it current for new
//! changes), existing rows are back-filled in resumable batches, and only
//! then is it marked readable. Build progress lives in a RangeSet under
//! the store-info subspace, so a crashed build resumes at its last
//! committed batch.

use crate::{batch, record::Recordable, state::IndexState, store::RecordStore};
use lamina_core::{error::Error, kv::Database, rangeset::RangeSet, subspace::Subspace};
use std::sync::Arc;

///
/// OnlineIndexer
///

pub struct OnlineIndexer {
    db: Arc<dyn Database>,
    store: Arc<RecordStore>,
    config: batch::BatchConfig,
}

impl OnlineIndexer {
    #[must_use]
    pub fn new(db: Arc<dyn Database>, store: Arc<RecordStore>) -> Self {
        Self {
            db,
            store,
            config: batch::BatchConfig::default(),
        }
    }

    #[must_use]
    pub const fn with_config(mut self, config: batch::BatchConfig) -> Self {
        self.config = config;
        self
    }

    fn progress_subspace(&self, index_name: &str) -> Subspace {
        self.store
            .store_info()
            .subspace("indexBuild")
            .subspace(index_name)
    }

    /// Build `index_name` from existing records, then mark it readable.
    pub fn build<R: Recordable>(&self, index_name: &str) -> Result<(), Error> {
        let maintainer = self
            .store
            .maintainer(index_name)
            .ok_or_else(|| Error::IndexNotFound(index_name.to_string()))?;

        // Write-only first: live writers maintain the index from here on,
        // while the back-fill below catches up on existing rows.
        let mut tx = self.db.create_transaction();
        self.store
            .set_index_state(tx.as_mut(), index_name, IndexState::WriteOnly);
        tx.commit()?;

        let progress = RangeSet::new(self.progress_subspace(index_name));
        let (begin, end) = self.store.records_range();
        let store = Arc::clone(&self.store);

        let stats = batch::run_batches(
            self.db.as_ref(),
            &progress,
            &begin,
            &end,
            &self.config,
            |tx, rows| {
                for (key, value) in rows {
                    let pk = store.record_pk(key)?;
                    let record: R = store.codec().decode(value)?;
                    maintainer.scan_for_build(tx, &pk, &record)?;
                }
                Ok(())
            },
        )?;
        tracing::info!(
            index = index_name,
            batches = stats.batches,
            records = stats.records,
            "online index build complete"
        );

        // Readable, and the finished progress set is no longer needed.
        let mut tx = self.db.create_transaction();
        self.store
            .set_index_state(tx.as_mut(), index_name, IndexState::Readable);
        let (p_begin, p_end) = self.progress_subspace(index_name).range();
        tx.clear_range(&p_begin, &p_end);
        tx.commit()
    }

    /// Disable an index and clear its data range.
    pub fn disable(&self, index_name: &str) -> Result<(), Error> {
        let maintainer = self
            .store
            .maintainer(index_name)
            .ok_or_else(|| Error::IndexNotFound(index_name.to_string()))?;

        let mut tx = self.db.create_transaction();
        self.store
            .set_index_state(tx.as_mut(), index_name, IndexState::Disabled);
        maintainer.clear(tx.as_mut());
        tx.commit()
    }

    /// Disable, clear, rebuild from scratch, and mark readable.
    pub fn rebuild<R: Recordable>(&self, index_name: &str) -> Result<(), Error> {
        self.disable(index_name)?;

        // Drop any progress from an earlier build so the back-fill starts
        // from the beginning.
        let mut tx = self.db.create_transaction();
        let (p_begin, p_end) = self.progress_subspace(index_name).range();
        tx.clear_range(&p_begin, &p_end);
        tx.commit()?;

        self.build::<R>(index_name)
    }
}
