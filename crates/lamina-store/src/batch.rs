//! Resumable batched range processing.
//!
//! Shared by the online indexer and the migration engine. Work over a byte
//! range proceeds in bounded batches, each committed atomically together
//! with its RangeSet progress entry, so a crash resumes from the last
//! committed batch boundary. Batch ceilings sit well inside the KV
//! driver's transaction limits (10 MB / ~5 s).

use lamina_core::{
    error::Error,
    kv::{Database, KeyValue, RangeOptions, Transaction, successor},
    rangeset::RangeSet,
};
use std::time::{Duration, Instant};

///
/// BatchConfig
///

#[derive(Clone, Copy, Debug)]
pub struct BatchConfig {
    pub max_records: usize,
    pub max_bytes: usize,
    pub max_time: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_records: 100,
            max_bytes: 5 * 1024 * 1024,
            max_time: Duration::from_secs(3),
        }
    }
}

///
/// BatchStats
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BatchStats {
    pub batches: u64,
    pub records: u64,
}

/// Process every key in `[full_begin, full_end)` not yet covered by
/// `progress`, in batches. `apply` runs inside the batch's write
/// transaction; the progress insert commits atomically with it.
///
/// Failure semantics: an error from `apply` or commit leaves the progress
/// set untouched, so a retry resumes from exactly the failed batch.
pub fn run_batches(
    db: &dyn Database,
    progress: &RangeSet,
    full_begin: &[u8],
    full_end: &[u8],
    config: &BatchConfig,
    mut apply: impl FnMut(&mut dyn Transaction, &[KeyValue]) -> Result<(), Error>,
) -> Result<BatchStats, Error> {
    let mut stats = BatchStats::default();

    let missing = {
        let tx = db.create_transaction();
        progress.missing_ranges(tx.as_ref(), full_begin, full_end)?
    };

    for (begin, end) in missing {
        let mut current = begin;

        while current < end {
            // Snapshot scan in its own transaction; limits keep both the
            // scan and the following write transaction bounded.
            let batch = {
                let tx = db.create_transaction();
                scan_batch(tx.as_ref(), &current, &end, config)?
            };

            let Some((last_key, _)) = batch.last() else {
                break; // nothing left in this gap
            };
            let next = successor(last_key);

            let mut tx = db.create_transaction();
            apply(tx.as_mut(), &batch)?;
            progress.insert(tx.as_mut(), &current, &next)?;
            tx.commit()?;

            stats.batches += 1;
            stats.records += batch.len() as u64;
            tracing::debug!(
                batch = stats.batches,
                records = batch.len(),
                "committed batch"
            );

            current = next;
        }
    }

    Ok(stats)
}

fn scan_batch(
    tx: &dyn Transaction,
    begin: &[u8],
    end: &[u8],
    config: &BatchConfig,
) -> Result<Vec<KeyValue>, Error> {
    let started = Instant::now();
    let mut out = Vec::new();
    let mut bytes = 0usize;
    let mut cursor = begin.to_vec();

    while out.len() < config.max_records
        && bytes < config.max_bytes
        && started.elapsed() < config.max_time
    {
        let remaining = config.max_records - out.len();
        let page = tx.get_range(
            &cursor,
            end,
            RangeOptions {
                snapshot: true,
                limit: Some(remaining.min(64)),
                reverse: false,
            },
        )?;
        if page.is_empty() {
            break;
        }

        cursor = successor(&page.last().map(|(k, _)| k.clone()).unwrap_or_default());
        for (key, value) in page {
            bytes += key.len() + value.len();
            out.push((key, value));
        }
    }

    Ok(out)
}
