//! In-memory KV database.
//!
//! Hermetic stand-in for a real driver: one ordered map, snapshot taken at
//! transaction start, writes buffered and applied at commit. Atomic ops are
//! replayed against the committed state at commit time so concurrent adds
//! compose the way the real driver's do. No conflict detection: the last
//! committed writer wins, which is sufficient for cooperative tests.

use crate::{
    error::Error,
    kv::{AtomicKind, Database, KeyValue, RangeOptions, Transaction, decode_counter, encode_counter},
};
use std::{
    collections::BTreeMap,
    ops::Bound,
    sync::{Arc, Mutex},
};

type Map = BTreeMap<Vec<u8>, Vec<u8>>;

///
/// MemoryDatabase
///

#[derive(Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<Map>>,
}

impl MemoryDatabase {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the committed state (test hook).
    #[must_use]
    pub fn committed(&self) -> Map {
        self.state.lock().expect("memory db poisoned").clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().expect("memory db poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Database for MemoryDatabase {
    fn create_transaction(&self) -> Box<dyn Transaction> {
        let view = self.committed();
        Box::new(MemoryTransaction {
            db: Arc::clone(&self.state),
            view,
            log: Vec::new(),
            committed: false,
        })
    }
}

enum Op {
    Set(Vec<u8>, Vec<u8>),
    Clear(Vec<u8>),
    ClearRange(Vec<u8>, Vec<u8>),
    Atomic(Vec<u8>, Vec<u8>, AtomicKind),
}

///
/// MemoryTransaction
///
/// Reads see the snapshot plus this transaction's own writes.
///

struct MemoryTransaction {
    db: Arc<Mutex<Map>>,
    view: Map,
    log: Vec<Op>,
    committed: bool,
}

impl Transaction for MemoryTransaction {
    fn get(&self, key: &[u8], _snapshot: bool) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.view.get(key).cloned())
    }

    fn get_range(
        &self,
        begin: &[u8],
        end: &[u8],
        options: RangeOptions,
    ) -> Result<Vec<KeyValue>, Error> {
        if begin > end {
            return Err(Error::InvalidKey("range begin exceeds end".to_string()));
        }

        let range = self
            .view
            .range::<[u8], _>((Bound::Included(begin), Bound::Excluded(end)));

        let pairs: Vec<KeyValue> = if options.reverse {
            range.rev().map(|(k, v)| (k.clone(), v.clone())).collect()
        } else {
            range.map(|(k, v)| (k.clone(), v.clone())).collect()
        };

        Ok(match options.limit {
            Some(limit) => pairs.into_iter().take(limit).collect(),
            None => pairs,
        })
    }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        self.view.insert(key.to_vec(), value.to_vec());
        self.log.push(Op::Set(key.to_vec(), value.to_vec()));
    }

    fn clear(&mut self, key: &[u8]) {
        self.view.remove(key);
        self.log.push(Op::Clear(key.to_vec()));
    }

    fn clear_range(&mut self, begin: &[u8], end: &[u8]) {
        let doomed: Vec<Vec<u8>> = self
            .view
            .range::<[u8], _>((Bound::Included(begin), Bound::Excluded(end)))
            .map(|(k, _)| k.clone())
            .collect();
        for key in doomed {
            self.view.remove(&key);
        }
        self.log.push(Op::ClearRange(begin.to_vec(), end.to_vec()));
    }

    fn atomic_op(&mut self, key: &[u8], param: &[u8], kind: AtomicKind) {
        let merged = apply_atomic(self.view.get(key).map(Vec::as_slice), param, kind);
        self.view.insert(key.to_vec(), merged);
        self.log.push(Op::Atomic(key.to_vec(), param.to_vec(), kind));
    }

    fn commit(&mut self) -> Result<(), Error> {
        if self.committed {
            return Err(Error::internal("transaction committed twice"));
        }
        self.committed = true;

        let mut state = self.db.lock().expect("memory db poisoned");
        for op in self.log.drain(..) {
            match op {
                Op::Set(key, value) => {
                    state.insert(key, value);
                }
                Op::Clear(key) => {
                    state.remove(&key);
                }
                Op::ClearRange(begin, end) => {
                    let doomed: Vec<Vec<u8>> = state
                        .range::<[u8], _>((Bound::Included(&begin[..]), Bound::Excluded(&end[..])))
                        .map(|(k, _)| k.clone())
                        .collect();
                    for key in doomed {
                        state.remove(&key);
                    }
                }
                Op::Atomic(key, param, kind) => {
                    let merged = apply_atomic(state.get(&key).map(Vec::as_slice), &param, kind);
                    state.insert(key, merged);
                }
            }
        }

        Ok(())
    }
}

fn apply_atomic(existing: Option<&[u8]>, param: &[u8], kind: AtomicKind) -> Vec<u8> {
    let operand = decode_counter(param);
    match kind {
        AtomicKind::Add => {
            let current = existing.map_or(0, decode_counter);
            encode_counter(current.wrapping_add(operand)).to_vec()
        }
        AtomicKind::Min => existing.map_or_else(
            || param.to_vec(),
            |bytes| encode_counter(decode_counter(bytes).min(operand)).to_vec(),
        ),
        AtomicKind::Max => existing.map_or_else(
            || param.to_vec(),
            |bytes| encode_counter(decode_counter(bytes).max(operand)).to_vec(),
        ),
    }
}
