use crate::record::Recordable;
use lamina_core::{
    codec::RecordCodec,
    error::Error,
    kv::{RangeScan, Transaction, successor},
    subspace::Subspace,
    tuple::Tuple,
};
use std::marker::PhantomData;

///
/// ScanOptions
///

#[derive(Clone, Debug, Default)]
pub struct ScanOptions {
    /// Resume strictly after this primary key (successor-key restart).
    pub after: Option<Tuple>,
    pub limit: Option<usize>,
    pub snapshot: bool,
}

impl ScanOptions {
    #[must_use]
    pub fn snapshot() -> Self {
        Self {
            snapshot: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn after(mut self, pk: Tuple) -> Self {
        self.after = Some(pk);
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

///
/// RecordCursor
///
/// Lazy decode-as-you-go iterator over record rows, yielding
/// `(primary key, record)` pairs in key order.
///

pub struct RecordCursor<'a, R> {
    scan: RangeScan<'a>,
    records: Subspace,
    codec: RecordCodec,
    _marker: PhantomData<R>,
}

impl<'a, R: Recordable> RecordCursor<'a, R> {
    pub(super) fn new(
        tx: &'a dyn Transaction,
        records: &Subspace,
        codec: RecordCodec,
        options: ScanOptions,
    ) -> Self {
        let (range_begin, range_end) = records.range();
        let begin = options
            .after
            .as_ref()
            .map_or(range_begin, |pk| successor(&records.pack(pk)));

        let mut scan = RangeScan::new(tx, begin, range_end, options.snapshot);
        if let Some(limit) = options.limit {
            scan = scan.with_limit(limit);
        }

        Self {
            scan,
            records: records.clone(),
            codec,
            _marker: PhantomData,
        }
    }
}

impl<R: Recordable> Iterator for RecordCursor<'_, R> {
    type Item = Result<(Tuple, R), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let pair = match self.scan.next()? {
            Ok(pair) => pair,
            Err(e) => return Some(Err(e)),
        };

        let decoded = self
            .records
            .unpack(&pair.0)
            .and_then(|pk| self.codec.decode(&pair.1).map(|record| (pk, record)));
        Some(decoded)
    }
}
