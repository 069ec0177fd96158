//! Value indexes: plain, unique, and covering.

use crate::index::prefix_end;
use lamina_core::{
    error::Error,
    kv::{RangeScan, Transaction},
    subspace::Subspace,
    tuple::Tuple,
};
use lamina_schema::{
    expr::{FieldAccess, FieldValue, KeyExpression},
    node::Index,
};

///
/// ValueMaintainer
///
/// Entry layout: `<subspace>/<indexed columns...>/<pk...> -> value` where
/// the value is empty for plain indexes and the packed covering columns
/// otherwise. `column_count` splits a key back into indexed columns and
/// primary key.
///

pub struct ValueMaintainer {
    name: String,
    root: KeyExpression,
    covering: Vec<String>,
    unique: bool,
    replace_on_duplicate: bool,
    column_count: usize,
    subspace: Subspace,
}

impl ValueMaintainer {
    #[must_use]
    pub fn new(index: &Index, subspace: Subspace) -> Self {
        Self {
            name: index.name.clone(),
            root: index.root.clone(),
            covering: index.covering.clone(),
            unique: index.is_unique(),
            replace_on_duplicate: index.options.replace_on_duplicate,
            column_count: index.root.column_count(),
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

    #[must_use]
    pub const fn is_unique(&self) -> bool {
        self.unique
    }

    #[must_use]
    pub const fn replaces_on_duplicate(&self) -> bool {
        self.replace_on_duplicate
    }

    fn entry_key(&self, pk: &Tuple, record: &dyn FieldAccess) -> Result<Vec<u8>, Error> {
        let mut tuple = Tuple::from_elements(self.root.evaluate(record)?);
        tuple.extend(pk.clone());
        Ok(self.subspace.pack(&tuple))
    }

    fn entry_value(&self, record: &dyn FieldAccess) -> Result<Vec<u8>, Error> {
        if self.covering.is_empty() {
            return Ok(Vec::new());
        }

        let mut tuple = Tuple::new();
        for field in &self.covering {
            match record.field(field) {
                Some(FieldValue::Scalar(element)) => tuple.push(element),
                Some(_) => {
                    return Err(Error::invalid_argument(format!(
                        "covering field '{field}' is not scalar"
                    )));
                }
                None => return Err(Error::MissingField(field.clone())),
            }
        }
        Ok(tuple.pack())
    }

    pub fn update(
        &self,
        tx: &mut dyn Transaction,
        pk: &Tuple,
        old: Option<&dyn FieldAccess>,
        new: Option<&dyn FieldAccess>,
    ) -> Result<(), Error> {
        let old_key = old.map(|r| self.entry_key(pk, r)).transpose()?;
        let new_key = new.map(|r| self.entry_key(pk, r)).transpose()?;

        // Clearing before writing keeps the no-op update (same key, same
        // value) idempotent without a read.
        if let Some(key) = &old_key
            && Some(key) != new_key.as_ref()
        {
            tx.clear(key);
        }
        if let (Some(key), Some(record)) = (&new_key, new) {
            tx.set(key, &self.entry_value(record)?);
        }

        Ok(())
    }

    /// Primary keys other than `pk` that already own this record's indexed
    /// columns. Read in the caller's transaction, so the check and the
    /// subsequent write cannot race.
    pub fn conflicting_pks(
        &self,
        tx: &dyn Transaction,
        pk: &Tuple,
        record: &dyn FieldAccess,
    ) -> Result<Vec<Tuple>, Error> {
        let columns = Tuple::from_elements(self.root.evaluate(record)?);
        let begin = self.subspace.pack(&columns);
        let end = prefix_end(begin.clone());

        let mut conflicts = Vec::new();
        for pair in RangeScan::new(tx, begin, end, false) {
            let (key, _) = pair?;
            let tuple = self.subspace.unpack(&key)?;
            let entry_pk = Tuple::from_elements(tuple.into_elements().split_off(self.column_count));
            if entry_pk != *pk {
                conflicts.push(entry_pk);
            }
        }

        Ok(conflicts)
    }

    /// Scan one indexed prefix, yielding `(pk, covering columns)` pairs.
    pub fn scan_prefix(
        &self,
        tx: &dyn Transaction,
        prefix: &Tuple,
        limit: Option<usize>,
    ) -> Result<Vec<(Tuple, Tuple)>, Error> {
        let begin = self.subspace.pack(prefix);
        let end = prefix_end(begin.clone());

        let mut scan = RangeScan::new(tx, begin, end, true);
        if let Some(limit) = limit {
            scan = scan.with_limit(limit);
        }

        let mut out = Vec::new();
        for pair in scan {
            let (key, value) = pair?;
            let tuple = self.subspace.unpack(&key)?;
            let pk = Tuple::from_elements(tuple.into_elements().split_off(self.column_count));
            let covering = if value.is_empty() {
                Tuple::new()
            } else {
                Tuple::unpack(&value)?
            };
            out.push((pk, covering));
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lamina_core::{
        kv::{Database, memory::MemoryDatabase},
        tuple::Element,
    };
    use lamina_schema::node::{IndexKind, IndexOptions};

    struct Row {
        name: &'static str,
        rank: i64,
    }

    impl FieldAccess for Row {
        fn field(&self, field: &str) -> Option<FieldValue<'_>> {
            match field {
                "name" => Some(FieldValue::Scalar(Element::String(self.name.to_string()))),
                "rank" => Some(FieldValue::Scalar(Element::Int(self.rank))),
                _ => None,
            }
        }
    }

    fn maintainer(covering: &[&str], unique: bool) -> ValueMaintainer {
        let mut index = Index::new("by_name", IndexKind::Value, KeyExpression::field("name"))
            .covering(covering.iter().copied());
        index = index.options(IndexOptions {
            unique,
            ..IndexOptions::default()
        });
        ValueMaintainer::new(&index, Subspace::from_path("ix/by_name"))
    }

    #[test]
    fn insert_then_delete_leaves_no_entries() {
        let db = MemoryDatabase::new();
        let m = maintainer(&[], false);
        let pk = Tuple::single(1i64);
        let row = Row { name: "a", rank: 5 };

        let mut tx = db.create_transaction();
        m.update(tx.as_mut(), &pk, None, Some(&row)).expect("insert");
        m.update(tx.as_mut(), &pk, Some(&row), None).expect("delete");
        tx.commit().expect("commit");

        assert!(db.is_empty());
    }

    #[test]
    fn update_moves_the_entry_to_the_new_key() {
        let db = MemoryDatabase::new();
        let m = maintainer(&[], false);
        let pk = Tuple::single(1i64);
        let before = Row { name: "a", rank: 5 };
        let after = Row { name: "b", rank: 5 };

        let mut tx = db.create_transaction();
        m.update(tx.as_mut(), &pk, None, Some(&before)).expect("insert");
        m.update(tx.as_mut(), &pk, Some(&before), Some(&after)).expect("move");
        tx.commit().expect("commit");

        let tx = db.create_transaction();
        let hits = m
            .scan_prefix(tx.as_ref(), &Tuple::single("b"), None)
            .expect("scan");
        assert_eq!(hits.len(), 1);
        assert!(
            m.scan_prefix(tx.as_ref(), &Tuple::single("a"), None)
                .expect("scan")
                .is_empty(),
            "stale entry must be gone"
        );
    }

    #[test]
    fn covering_columns_ride_in_the_entry_value() {
        let db = MemoryDatabase::new();
        let m = maintainer(&["rank"], false);
        let pk = Tuple::single(9i64);

        let mut tx = db.create_transaction();
        m.update(tx.as_mut(), &pk, None, Some(&Row { name: "a", rank: 42 }))
            .expect("insert");
        tx.commit().expect("commit");

        let tx = db.create_transaction();
        let hits = m
            .scan_prefix(tx.as_ref(), &Tuple::single("a"), None)
            .expect("scan");
        assert_eq!(hits, vec![(Tuple::single(9i64), Tuple::single(42i64))]);
    }

    #[test]
    fn conflicting_pks_sees_other_owners_only() {
        let db = MemoryDatabase::new();
        let m = maintainer(&[], true);
        let row = Row { name: "a", rank: 0 };

        let mut tx = db.create_transaction();
        m.update(tx.as_mut(), &Tuple::single(1i64), None, Some(&row))
            .expect("insert");
        tx.commit().expect("commit");

        let tx = db.create_transaction();
        // Same owner: no conflict (idempotent re-save).
        assert!(
            m.conflicting_pks(tx.as_ref(), &Tuple::single(1i64), &row)
                .expect("check")
                .is_empty()
        );
        // Different owner: conflict.
        assert_eq!(
            m.conflicting_pks(tx.as_ref(), &Tuple::single(2i64), &row)
                .expect("check"),
            vec![Tuple::single(1i64)]
        );
    }
}
