//! Version index: every record change gets a monotonically increasing
//! sequence number, and the index maps that sequence back to the record.
//!
//! Layout:
//! - `<subspace>/log/<seq>/<pk...> -> empty` (latest change per record)
//! - `<subspace>/pk/<pk...> -> 8-byte little-endian seq`
//! - `<subspace>/meta/seq -> 8-byte little-endian high-water mark`

use lamina_core::{
    error::Error,
    kv::{RangeScan, Transaction, decode_counter, encode_counter},
    subspace::Subspace,
    tuple::{Element, Tuple},
};
use lamina_schema::{expr::FieldAccess, node::Index};

///
/// VersionMaintainer
///

pub struct VersionMaintainer {
    name: String,
    log: Subspace,
    by_pk: Subspace,
    counter_key: Vec<u8>,
    subspace: Subspace,
}

impl VersionMaintainer {
    #[must_use]
    pub fn new(index: &Index, subspace: Subspace) -> Self {
        Self {
            name: index.name.clone(),
            log: subspace.subspace("log"),
            by_pk: subspace.subspace("pk"),
            counter_key: subspace.subspace("meta").pack(&Tuple::single("seq")),
            subspace,
        }
    }

    #[must_use]
    pub fn index_name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn subspace(&self) -> &Subspace {
        &self.subspace
    }

    pub fn update(
        &self,
        tx: &mut dyn Transaction,
        pk: &Tuple,
        old: Option<&dyn FieldAccess>,
        new: Option<&dyn FieldAccess>,
    ) -> Result<(), Error> {
        let pk_key = self.by_pk.pack(pk);

        // Retire the previous log entry for this record, if any.
        if old.is_some()
            && let Some(raw) = tx.get(&pk_key, false)?
        {
            let seq = decode_counter(&raw);
            tx.clear(&self.log_key(seq, pk));
        }

        match new {
            Some(_) => {
                let seq = tx
                    .get(&self.counter_key, false)?
                    .as_deref()
                    .map_or(0, decode_counter)
                    + 1;
                tx.set(&self.counter_key, &encode_counter(seq));
                tx.set(&self.log_key(seq, pk), &[]);
                tx.set(&pk_key, &encode_counter(seq));
            }
            None => tx.clear(&pk_key),
        }

        Ok(())
    }

    fn log_key(&self, seq: i64, pk: &Tuple) -> Vec<u8> {
        let mut tuple = Tuple::single(seq);
        tuple.extend(pk.clone());
        self.log.pack(&tuple)
    }

    /// Records in change order, oldest surviving change first.
    pub fn changes(&self, tx: &dyn Transaction, limit: Option<usize>) -> Result<Vec<(i64, Tuple)>, Error> {
        let (begin, end) = self.log.range();
        let mut scan = RangeScan::new(tx, begin, end, true);
        if let Some(limit) = limit {
            scan = scan.with_limit(limit);
        }

        let mut out = Vec::new();
        for pair in scan {
            let (key, _) = pair?;
            let tuple = self.log.unpack(&key)?;
            let mut elements = tuple.into_elements().into_iter();
            let Some(Element::Int(seq)) = elements.next() else {
                return Err(Error::internal(format!(
                    "index '{}': corrupt version entry",
                    self.name
                )));
            };
            out.push((seq, elements.collect()));
        }
        Ok(out)
    }
}
