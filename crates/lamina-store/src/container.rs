//! Container: global configuration and the store cache.
//!
//! Given (tenant, collection, record type), the container hands out a
//! reusable typed store rooted in a directory-layer subspace. The cache
//! key includes the record-type name, so requesting two record types
//! under the same collection cannot clobber. Lock discipline everywhere:
//! read the cache under the lock, release, do I/O, reacquire to insert
//! (losing a race is fine, the values are equal).

use crate::store::RecordStore;
use derive_more::{Deref, DerefMut};
use lamina_core::{
    error::Error,
    kv::{Database, directory::{Directory, KvDirectory}},
    subspace::Subspace,
};
use lamina_schema::node::Schema;
use std::{collections::HashMap, sync::{Arc, Mutex}};

///
/// Config
///
/// In-process configuration; there is no CLI surface.
///

#[derive(Clone, Debug, Default)]
pub struct Config {
    pub cluster_file: Option<String>,
    pub api_version: Option<u32>,
    pub statistics_subspace: Option<Subspace>,
}

///
/// StoreCache
///

#[derive(Default, Deref, DerefMut)]
struct StoreCache(HashMap<String, Arc<RecordStore>>);

///
/// Container
///

pub struct Container {
    db: Arc<dyn Database>,
    schema: Arc<Schema>,
    config: Config,
    directory: KvDirectory,
    cache: Mutex<StoreCache>,
}

impl Container {
    #[must_use]
    pub fn new(db: Arc<dyn Database>, schema: Arc<Schema>, config: Config) -> Self {
        Self {
            db,
            schema,
            config,
            directory: KvDirectory::new(&Subspace::from_path("directory")),
            cache: Mutex::new(StoreCache::default()),
        }
    }

    #[must_use]
    pub const fn database(&self) -> &Arc<dyn Database> {
        &self.db
    }

    #[must_use]
    pub const fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    fn cache_key(tenant: &str, collection: &str, record_type: &str) -> String {
        format!("{tenant}.{collection}.{record_type}")
    }

    /// A reusable typed store for (tenant, collection, record type).
    pub fn store(
        &self,
        tenant: &str,
        collection: &str,
        record_type: &str,
    ) -> Result<Arc<RecordStore>, Error> {
        let key = Self::cache_key(tenant, collection, record_type);

        if let Some(hit) = self
            .cache
            .lock()
            .expect("store cache poisoned")
            .get(&key)
            .cloned()
        {
            return Ok(hit);
        }

        // Directory resolution and store construction happen outside the
        // lock so a slow open never serializes unrelated callers.
        let mut tx = self.db.create_transaction();
        let root = self
            .directory
            .create_or_open(tx.as_mut(), &["tenants", tenant, collection], b"record")?;
        let global = self.directory.create_or_open(tx.as_mut(), &["global"], b"record")?;
        tx.commit()?;

        let store = Arc::new(RecordStore::open(
            Arc::clone(&self.schema),
            record_type,
            root,
            Some(&global),
        )?);

        let mut cache = self.cache.lock().expect("store cache poisoned");
        let winner = cache.entry(key).or_insert(store);
        Ok(Arc::clone(winner))
    }

    /// Drop every cached store.
    pub fn clear_cache(&self) {
        self.cache.lock().expect("store cache poisoned").clear();
    }

    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.lock().expect("store cache poisoned").len()
    }

    /// Delete a tenant: evict its cached stores, then clear its entire
    /// subspace range (all collections, records, and index data) in a
    /// single transaction.
    pub fn delete_tenant(&self, tenant: &str) -> Result<(), Error> {
        let prefix = format!("{tenant}.");
        self.cache
            .lock()
            .expect("store cache poisoned")
            .retain(|key, _| !key.starts_with(&prefix));

        let mut tx = self.db.create_transaction();
        self.directory
            .remove_subtree(tx.as_mut(), &["tenants", tenant])?;
        tx.commit()?;

        tracing::info!(tenant, "tenant deleted");
        Ok(())
    }
}
