//! Persistent set of disjoint byte ranges.
//!
//! Backs resumable batch work: each committed batch inserts the byte range
//! it covered, and restarts ask for the ranges still missing. One key per
//! interval: `<subspace>/<begin> -> <end>`. Stored intervals are always
//! disjoint and non-adjacent; insert merges neighbors in the caller's
//! transaction, so multi-process safety needs no in-memory shadow copy.

use crate::{
    error::Error,
    kv::{RangeOptions, Transaction, successor},
    subspace::Subspace,
    tuple::{Element, Tuple},
};

const MERGE_PAGE: usize = 64;

///
/// RangeSet
///

pub struct RangeSet {
    subspace: Subspace,
}

impl RangeSet {
    #[must_use]
    pub const fn new(subspace: Subspace) -> Self {
        Self { subspace }
    }

    fn key_for(&self, begin: &[u8]) -> Vec<u8> {
        self.subspace
            .pack(&Tuple::single(Element::Bytes(begin.to_vec())))
    }

    fn decode(&self, key: &[u8], value: &[u8]) -> Result<(Vec<u8>, Vec<u8>), Error> {
        let tuple = self.subspace.unpack(key)?;
        match tuple.get(0) {
            Some(Element::Bytes(begin)) => Ok((begin.clone(), value.to_vec())),
            _ => Err(Error::internal("corrupt range-set interval key")),
        }
    }

    /// Record `[begin, end)` as processed, merging any overlapping or
    /// adjacent stored intervals. Runs entirely within `tx`.
    pub fn insert(&self, tx: &mut dyn Transaction, begin: &[u8], end: &[u8]) -> Result<(), Error> {
        if begin > end {
            return Err(Error::invalid_argument("range begin exceeds end"));
        }
        if begin == end {
            return Ok(());
        }

        let mut merged_begin = begin.to_vec();
        let mut merged_end = end.to_vec();
        let mut doomed = Vec::new();

        // Walk stored intervals whose begin <= end, newest-first, until one
        // ends strictly before `begin`; everything collected overlaps or
        // touches [begin, end).
        let (sub_begin, _) = self.subspace.range();
        let mut bound = successor(&self.key_for(end));

        'outer: loop {
            let page = tx.get_range(
                &sub_begin,
                &bound,
                RangeOptions {
                    snapshot: false,
                    limit: Some(MERGE_PAGE),
                    reverse: true,
                },
            )?;
            let page_len = page.len();

            for (key, value) in page {
                let (stored_begin, stored_end) = self.decode(&key, &value)?;
                if stored_end < merged_begin {
                    break 'outer;
                }

                if stored_begin < merged_begin {
                    merged_begin = stored_begin;
                }
                if stored_end > merged_end {
                    merged_end = stored_end;
                }
                bound = key.clone();
                doomed.push(key);
            }

            if page_len < MERGE_PAGE {
                break;
            }
        }

        for key in doomed {
            tx.clear(&key);
        }
        tx.set(&self.key_for(&merged_begin), &merged_end);

        Ok(())
    }

    /// Gaps inside `[full_begin, full_end)` not yet covered by any stored
    /// interval, in key order, including any prefix and suffix gap.
    pub fn missing_ranges(
        &self,
        tx: &dyn Transaction,
        full_begin: &[u8],
        full_end: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, Error> {
        if full_begin >= full_end {
            return Ok(Vec::new());
        }

        let mut gaps = Vec::new();
        let mut cursor = full_begin.to_vec();

        // An interval starting at or before full_begin may already cover a
        // prefix of the window.
        let predecessor = tx.get_range(
            &self.subspace.range().0,
            &successor(&self.key_for(full_begin)),
            RangeOptions {
                snapshot: false,
                limit: Some(1),
                reverse: true,
            },
        )?;
        if let Some((key, value)) = predecessor.first() {
            let (_, stored_end) = self.decode(key, value)?;
            if stored_end > cursor {
                cursor = stored_end;
            }
        }

        let mut scan_begin = successor(&self.key_for(full_begin));
        let scan_end = self.key_for(full_end);

        while cursor.as_slice() < full_end {
            let page = tx.get_range(
                &scan_begin,
                &scan_end,
                RangeOptions {
                    snapshot: false,
                    limit: Some(MERGE_PAGE),
                    reverse: false,
                },
            )?;
            if page.is_empty() {
                break;
            }
            let page_len = page.len();

            for (key, value) in page {
                let (stored_begin, stored_end) = self.decode(&key, &value)?;
                if stored_begin > cursor {
                    let gap_end = stored_begin.min(full_end.to_vec());
                    gaps.push((cursor.clone(), gap_end));
                }
                if stored_end > cursor {
                    cursor = stored_end;
                }
                scan_begin = successor(&key);
                if cursor.as_slice() >= full_end {
                    break;
                }
            }

            if page_len < MERGE_PAGE {
                break;
            }
        }

        if cursor.as_slice() < full_end {
            gaps.push((cursor, full_end.to_vec()));
        }

        Ok(gaps)
    }
}
