//! Rank (leaderboard) index: a Range-Tree over bucketed score counters.
//!
//! Layout under the index subspace, per grouping prefix:
//! - score entries: `<group...>/<score>/<pk...> -> empty`
//! - count nodes:   `<group...>/"_count"/<level>/<bucket start> -> 8-byte LE`
//!
//! Count nodes at level `l` partition the group's entries into buckets of
//! span `bucket_size^l`; summing nodes strictly better than the target
//! bucket at each level, then scanning raw entries inside the level-1
//! bucket, answers rank queries in O(log n). The asymmetry around the
//! target bucket (nodes strictly better, raw scan inside) avoids double
//! counting.
//!
//! Ties always break by ascending primary-key bytes: among equal scores
//! the smaller primary key ranks first, in both rank orders.

mod score;


use crate::index::prefix_end;
use lamina_core::{
    error::Error,
    kv::{AtomicKind, RangeScan, Transaction, decode_counter, encode_counter},
    subspace::Subspace,
    tuple::{Element, Tuple},
};
use lamina_schema::{
    expr::{FieldAccess, KeyExpression},
    node::{Index, RankOrder, ScoreKind},
};
use std::collections::VecDeque;

/// Reserved grouping column separating count nodes from score entries.
/// Strings sort before every numeric type code, so the count subtree
/// always precedes the entries of its group.
const COUNT_SENTINEL: &str = "_count";

///
/// RankMaintainer
///

pub struct RankMaintainer {
    name: String,
    root: KeyExpression,
    subspace: Subspace,
    order: RankOrder,
    kind: ScoreKind,
    bucket_size: u64,
    levels: u32,
    grouping_count: usize,
}

impl RankMaintainer {
    pub fn new(index: &Index, subspace: Subspace) -> Result<Self, Error> {
        let column_count = index.root.column_count();
        if column_count == 0 {
            return Err(Error::internal(format!(
                "index '{}': rank expression has no score column",
                index.name
            )));
        }
        if index.options.bucket_size < 2 {
            return Err(Error::internal(format!(
                "index '{}': rank bucket size must be at least 2",
                index.name
            )));
        }

        Ok(Self {
            name: index.name.clone(),
            root: index.root.clone(),
            subspace,
            order: index.options.rank_order,
            kind: index.options.score,
            bucket_size: index.options.bucket_size,
            levels: index.options.levels.max(1),
            grouping_count: column_count - 1,
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

    // -- key layout

    fn entry_key(&self, group: &Tuple, score: &Element, pk: &Tuple) -> Vec<u8> {
        let mut tuple = group.clone();
        tuple.push(score.clone());
        tuple.extend(pk.clone());
        self.subspace.pack(&tuple)
    }

    fn entry_prefix(&self, group: &Tuple, score: &Element) -> Vec<u8> {
        let mut tuple = group.clone();
        tuple.push(score.clone());
        self.subspace.pack(&tuple)
    }

    fn count_key(&self, group: &Tuple, level: u32, bucket: &Element) -> Vec<u8> {
        let mut tuple = group.clone();
        tuple.push(COUNT_SENTINEL);
        tuple.push(i64::from(level));
        tuple.push(bucket.clone());
        self.subspace.pack(&tuple)
    }

    fn count_level_prefix(&self, group: &Tuple, level: u32) -> Vec<u8> {
        let mut tuple = group.clone();
        tuple.push(COUNT_SENTINEL);
        tuple.push(i64::from(level));
        self.subspace.pack(&tuple)
    }

    /// Split an evaluated root into (group, score).
    fn split_columns(&self, columns: Vec<Element>) -> Result<(Tuple, Element), Error> {
        let mut elements = columns;
        let score = elements
            .pop()
            .ok_or_else(|| Error::internal("rank expression yielded no columns"))?;
        score::check_kind(self.kind, &score)?;
        Ok((Tuple::from_elements(elements), score))
    }

    // -- maintenance

    pub fn update(
        &self,
        tx: &mut dyn Transaction,
        pk: &Tuple,
        old: Option<&dyn FieldAccess>,
        new: Option<&dyn FieldAccess>,
    ) -> Result<(), Error> {
        if let Some(record) = old {
            let (group, old_score) = self.split_columns(self.root.evaluate(record)?)?;
            self.remove_entry(tx, &group, &old_score, pk)?;
        }
        if let Some(record) = new {
            let (group, new_score) = self.split_columns(self.root.evaluate(record)?)?;
            self.insert_entry(tx, &group, &new_score, pk)?;
        }
        Ok(())
    }

    fn insert_entry(
        &self,
        tx: &mut dyn Transaction,
        group: &Tuple,
        score: &Element,
        pk: &Tuple,
    ) -> Result<(), Error> {
        tx.set(&self.entry_key(group, score, pk), &[]);
        self.adjust_counts(tx, group, score, 1)
    }

    fn remove_entry(
        &self,
        tx: &mut dyn Transaction,
        group: &Tuple,
        score: &Element,
        pk: &Tuple,
    ) -> Result<(), Error> {
        tx.clear(&self.entry_key(group, score, pk));
        self.adjust_counts(tx, group, score, -1)
    }

    fn adjust_counts(
        &self,
        tx: &mut dyn Transaction,
        group: &Tuple,
        score: &Element,
        delta: i64,
    ) -> Result<(), Error> {
        for level in 1..=self.levels {
            let bucket = score::bucket_boundary(self.kind, score, self.bucket_size, level)?;
            tx.atomic_op(
                &self.count_key(group, level, &bucket),
                &encode_counter(delta),
                AtomicKind::Add,
            );
        }
        Ok(())
    }

    // -- queries

    /// 1-indexed rank of `(score, pk)` within its group.
    pub fn rank_of(
        &self,
        tx: &dyn Transaction,
        group: &Tuple,
        score: &Element,
        pk: &Tuple,
    ) -> Result<u64, Error> {
        score::check_kind(self.kind, score)?;

        let mut better: u64 = 0;

        // Count nodes for buckets strictly better than the target bucket,
        // narrowing one level at a time (each level scans only within the
        // target's parent bucket, so nothing is counted twice).
        for level in (1..=self.levels).rev() {
            let (begin, end) = match self.order {
                RankOrder::Ascending => {
                    let upper = score::bucket_boundary(self.kind, score, self.bucket_size, level)?;
                    let begin = if level == self.levels {
                        self.count_level_prefix(group, level)
                    } else {
                        let parent =
                            score::bucket_boundary(self.kind, score, self.bucket_size, level + 1)?;
                        self.count_key(group, level, &parent)
                    };
                    (begin, self.count_key(group, level, &upper))
                }
                RankOrder::Descending => {
                    let bucket = score::bucket_boundary(self.kind, score, self.bucket_size, level)?;
                    let lower =
                        score::next_bucket_boundary(self.kind, score, self.bucket_size, level)?;
                    // An infinite score is its own bucket and its own next
                    // bucket; start just past its node so it is not
                    // counted as better than itself.
                    let begin = if lower == bucket {
                        lamina_core::kv::successor(&self.count_key(group, level, &bucket))
                    } else {
                        self.count_key(group, level, &lower)
                    };
                    let end = if level == self.levels {
                        prefix_end(self.count_level_prefix(group, level))
                    } else {
                        let parent = score::next_bucket_boundary(
                            self.kind,
                            score,
                            self.bucket_size,
                            level + 1,
                        )?;
                        self.count_key(group, level, &parent)
                    };
                    (begin, end)
                }
            };

            for pair in RangeScan::new(tx, begin, end, false) {
                let (_, value) = pair?;
                better += decode_counter(&value).max(0) as u64;
            }
        }

        // Raw entries inside the target's level-1 bucket, strictly better
        // than the score.
        let (raw_begin, raw_end) = match self.order {
            RankOrder::Ascending => {
                let bucket = score::bucket_boundary(self.kind, score, self.bucket_size, 1)?;
                (
                    self.entry_prefix(group, &bucket),
                    self.entry_prefix(group, score),
                )
            }
            RankOrder::Descending => {
                let next = score::next_bucket_boundary(self.kind, score, self.bucket_size, 1)?;
                (
                    prefix_end(self.entry_prefix(group, score)),
                    self.entry_prefix(group, &next),
                )
            }
        };
        for pair in RangeScan::new(tx, raw_begin, raw_end, false) {
            pair?;
            better += 1;
        }

        // Ties break by ascending primary-key bytes in either order.
        let tie_begin = self.entry_prefix(group, score);
        let tie_end = self.entry_key(group, score, pk);
        for pair in RangeScan::new(tx, tie_begin, tie_end, false) {
            pair?;
            better += 1;
        }

        Ok(better + 1)
    }

    /// `(score, pk)` at a 1-indexed rank, or `None` past the end. One
    /// traversal serves both record-at-rank and score-at-rank; the score
    /// column sits just before the primary key in the entry layout.
    pub fn entry_at_rank(
        &self,
        tx: &dyn Transaction,
        group: &Tuple,
        rank: u64,
    ) -> Result<Option<(Element, Tuple)>, Error> {
        if rank == 0 {
            return Err(Error::InvalidRank {
                rank,
                message: "ranks are 1-indexed".to_string(),
            });
        }

        match self.order {
            RankOrder::Ascending => self.entry_at_rank_ascending(tx, group, rank),
            RankOrder::Descending => self.entry_at_rank_descending(tx, group, rank),
        }
    }

    fn entry_at_rank_ascending(
        &self,
        tx: &dyn Transaction,
        group: &Tuple,
        rank: u64,
    ) -> Result<Option<(Element, Tuple)>, Error> {
        let mut seen = 0u64;
        for pair in self.entry_scan(tx, group) {
            let (key, _) = pair?;
            let Some(entry) = self.decode_entry(&key)? else {
                continue;
            };
            seen += 1;
            if seen == rank {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    // Descending order streams the same forward scan while keeping the
    // last `rank` entries in a bounded deque (O(1) eviction, O(rank)
    // memory). The deque's front is the rank-th best score; ties then
    // resolve by ascending primary key with one bounded second scan.
    fn entry_at_rank_descending(
        &self,
        tx: &dyn Transaction,
        group: &Tuple,
        rank: u64,
    ) -> Result<Option<(Element, Tuple)>, Error> {
        let capacity = usize::try_from(rank)
            .map_err(|_| Error::InvalidRank {
                rank,
                message: "rank exceeds addressable memory".to_string(),
            })?;

        let mut window: VecDeque<Element> = VecDeque::with_capacity(capacity);
        for pair in self.entry_scan(tx, group) {
            let (key, _) = pair?;
            let Some((score, _)) = self.decode_entry(&key)? else {
                continue;
            };
            if window.len() == capacity {
                window.pop_front();
            }
            window.push_back(score);
        }

        if window.len() < capacity {
            return Ok(None); // fewer than `rank` entries
        }
        let target_score = window.pop_front().expect("window is at capacity");

        // Everything better (strictly greater score) sits behind the
        // window's front; the remainder of the rank lands inside the tie
        // run, counted in ascending primary-key order.
        let better = window
            .iter()
            .filter(|s| s.canonical_cmp(&target_score) == std::cmp::Ordering::Greater)
            .count() as u64;
        let position_in_run = rank - better;

        let run_begin = self.entry_prefix(group, &target_score);
        let run_end = prefix_end(run_begin.clone());
        let mut seen = 0u64;
        for pair in RangeScan::new(tx, run_begin, run_end, true) {
            let (key, _) = pair?;
            let Some(entry) = self.decode_entry(&key)? else {
                continue;
            };
            seen += 1;
            if seen == position_in_run {
                return Ok(Some(entry));
            }
        }

        Err(Error::internal(
            "rank window and tie run disagree; concurrent mutation mid-scan",
        ))
    }

    /// Number of score entries in the group (count nodes are skipped).
    pub fn total_count(&self, tx: &dyn Transaction, group: &Tuple) -> Result<u64, Error> {
        let mut total = 0u64;
        for pair in self.entry_scan(tx, group) {
            let (key, _) = pair?;
            if self.decode_entry(&key)?.is_some() {
                total += 1;
            }
        }
        Ok(total)
    }

    // Scan the group's score entries. The count subtree sorts before every
    // numeric score, so starting past its prefix skips it wholesale.
    fn entry_scan<'a>(&self, tx: &'a dyn Transaction, group: &Tuple) -> RangeScan<'a> {
        let mut sentinel = group.clone();
        sentinel.push(COUNT_SENTINEL);
        let begin = prefix_end(self.subspace.pack(&sentinel));
        let end = prefix_end(self.subspace.pack(group));
        RangeScan::new(tx, begin, end, true)
    }

    /// Decode `(score, pk)` from an entry key; `None` for count nodes.
    fn decode_entry(&self, key: &[u8]) -> Result<Option<(Element, Tuple)>, Error> {
        let tuple = self.subspace.unpack(key)?;
        let mut elements = tuple.into_elements();
        if elements.len() < self.grouping_count + 2 {
            return Err(Error::internal("rank entry key is too short"));
        }

        let rest = elements.split_off(self.grouping_count);
        let mut rest = rest.into_iter();
        let score = rest.next().expect("length checked above");
        if score.as_str() == Some(COUNT_SENTINEL) {
            return Ok(None);
        }

        Ok(Some((score, Tuple::from_elements(rest))))
    }

    /// Sum of count nodes at one level for a group (diagnostics and
    /// invariant checks).
    pub fn level_total(
        &self,
        tx: &dyn Transaction,
        group: &Tuple,
        level: u32,
    ) -> Result<i64, Error> {
        let begin = self.count_level_prefix(group, level);
        let end = prefix_end(begin.clone());
        let mut total = 0i64;
        for pair in RangeScan::new(tx, begin, end, true) {
            let (_, value) = pair?;
            total += decode_counter(&value);
        }
        Ok(total)
    }
}
