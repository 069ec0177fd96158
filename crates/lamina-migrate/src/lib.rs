//! Online schema migrations.
//!
//! The manager walks a deterministic chain of migrations toward a target
//! version, deduplicating by persisted "applied" markers. Bulk record work
//! inside a migration runs through resumable batches, so a crashed
//! migration re-runs from its last committed batch boundary rather than
//! from scratch.
//!
//! Persisted layout under the migration subspace:
//! - `current_version -> pack(major, minor, patch)`
//! - `applied/<from>-<to> -> pack(wall-clock seconds)`
//! - `transform/<typeName>/...` and `delete/<typeName>/...` RangeSets
#![warn(unreachable_pub)]

mod context;


pub use context::MigrationContext;

use lamina_core::{
    error::Error,
    kv::Database,
    subspace::Subspace,
    tuple::{Element, Tuple},
};
use lamina_schema::{node::Schema, version::SchemaVersion};
use std::{
    sync::{Arc, Mutex},
    time::{SystemTime, UNIX_EPOCH},
};

///
/// Migration
///

pub struct Migration {
    pub from_version: SchemaVersion,
    pub to_version: SchemaVersion,
    pub description: String,
    execute: ExecuteFn,
}

type ExecuteFn = Box<dyn Fn(&mut MigrationContext) -> Result<(), Error> + Send + Sync>;

impl Migration {
    pub fn new(
        from_version: SchemaVersion,
        to_version: SchemaVersion,
        description: impl Into<String>,
        execute: impl Fn(&mut MigrationContext) -> Result<(), Error> + Send + Sync + 'static,
    ) -> Self {
        Self {
            from_version,
            to_version,
            description: description.into(),
            execute: Box::new(execute),
        }
    }

    /// Stable identifier used for the applied marker.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}-{}", self.from_version, self.to_version)
    }
}

///
/// MigrationManager
///
/// Owns the ordered migration list for one store root. The running flag is
/// per-process; multi-process migration coordination is external.
///

pub struct MigrationManager {
    db: Arc<dyn Database>,
    schema: Arc<Schema>,
    store_root: Subspace,
    global_root: Option<Subspace>,
    subspace: Subspace,
    migrations: Vec<Migration>,
    running: Mutex<bool>,
}

impl MigrationManager {
    #[must_use]
    pub fn new(
        db: Arc<dyn Database>,
        schema: Arc<Schema>,
        store_root: Subspace,
        subspace: Subspace,
    ) -> Self {
        Self {
            db,
            schema,
            store_root,
            global_root: None,
            subspace,
            migrations: Vec::new(),
            running: Mutex::new(false),
        }
    }

    #[must_use]
    pub fn with_global_root(mut self, global_root: Subspace) -> Self {
        self.global_root = Some(global_root);
        self
    }

    /// Register a migration, keeping the list ordered by target version.
    pub fn register(&mut self, migration: Migration) {
        self.migrations.push(migration);
        self.migrations.sort_by_key(|m| m.to_version);
    }

    fn current_version_key(&self) -> Vec<u8> {
        self.subspace.pack(&Tuple::single("current_version"))
    }

    fn applied_key(&self, id: &str) -> Vec<u8> {
        self.subspace.subspace("applied").pack(&Tuple::single(id))
    }

    /// Persisted schema version; 0.0.0 if the store was never migrated.
    pub fn current_version(&self) -> Result<SchemaVersion, Error> {
        let tx = self.db.create_transaction();
        let Some(raw) = tx.get(&self.current_version_key(), true)? else {
            return Ok(SchemaVersion::ZERO);
        };

        let tuple = Tuple::unpack(&raw)?;
        match (tuple.get(0), tuple.get(1), tuple.get(2)) {
            (Some(Element::Int(major)), Some(Element::Int(minor)), Some(Element::Int(patch))) => {
                Ok(SchemaVersion::new(*major, *minor, *patch))
            }
            _ => Err(Error::internal("corrupt current_version entry")),
        }
    }

    /// Ids of migrations whose applied markers are present.
    pub fn applied_ids(&self) -> Result<Vec<String>, Error> {
        let tx = self.db.create_transaction();
        let (begin, end) = self.subspace.subspace("applied").range();
        let pairs = tx.get_range(&begin, &end, lamina_core::kv::RangeOptions::snapshot())?;

        let applied = self.subspace.subspace("applied");
        let mut out = Vec::new();
        for (key, _) in pairs {
            let tuple = applied.unpack(&key)?;
            match tuple.get(0) {
                Some(Element::String(id)) => out.push(id.clone()),
                _ => return Err(Error::internal("corrupt applied marker")),
            }
        }
        Ok(out)
    }

    /// Walk the migration chain from the persisted current version up to
    /// `target`, executing whatever has not been applied yet.
    ///
    /// Returns the ids of migrations executed by this call.
    pub fn migrate(&self, target: SchemaVersion) -> Result<Vec<String>, Error> {
        let _guard = RunningGuard::claim(&self.running)?;

        let mut current = self.current_version()?;
        let mut chain: Vec<&Migration> = Vec::new();
        while current < target {
            let next = self
                .migrations
                .iter()
                .find(|m| m.from_version == current && m.to_version <= target)
                .ok_or_else(|| Error::NoMigrationPath {
                    from: current.to_string(),
                    target: target.to_string(),
                })?;
            chain.push(next);
            current = next.to_version;
        }

        let mut executed = Vec::new();
        for migration in &chain {
            let id = migration.id();
            let marker_key = self.applied_key(&id);

            let already = {
                let tx = self.db.create_transaction();
                tx.get(&marker_key, false)?.is_some()
            };
            if already {
                continue;
            }

            tracing::info!(id = %id, description = %migration.description, "running migration");
            let mut context = MigrationContext::new(
                Arc::clone(&self.db),
                Arc::clone(&self.schema),
                self.store_root.clone(),
                self.global_root.clone(),
                self.subspace.clone(),
            );
            (migration.execute)(&mut context)?;

            // The marker commits only after the whole migration ran; a
            // crash mid-execute re-runs it from its last batch boundary.
            let mut tx = self.db.create_transaction();
            tx.set(&marker_key, &Tuple::single(Element::Double(wall_clock())).pack());
            tx.commit()?;
            executed.push(id);
        }

        // Persist the version the walk actually reached. With an empty
        // chain (the store already sits at or past `target`) `current`
        // still holds the original version, so a stale or smaller target
        // can never downgrade the tracked version.
        let mut tx = self.db.create_transaction();
        tx.set(
            &self.current_version_key(),
            &Tuple::from_elements([
                Element::Int(current.major),
                Element::Int(current.minor),
                Element::Int(current.patch),
            ])
            .pack(),
        );
        tx.commit()?;

        Ok(executed)
    }
}

fn wall_clock() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// Single-slot running flag with release on every exit path.
struct RunningGuard<'a> {
    flag: &'a Mutex<bool>,
}

impl<'a> RunningGuard<'a> {
    fn claim(flag: &'a Mutex<bool>) -> Result<Self, Error> {
        let mut running = flag.lock().expect("running flag poisoned");
        if *running {
            return Err(Error::MigrationInProgress);
        }
        *running = true;
        Ok(Self { flag })
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        *self.flag.lock().expect("running flag poisoned") = false;
    }
}
