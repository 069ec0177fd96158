//! Aggregate indexes: count, sum, min, max.
//!
//! Count and sum touch exactly one key per group through associative
//! atomic operations, so concurrent writers compose without conflicts.
//! Min and max keep value entries beside the aggregate key: the insert
//! path is still a single atomic op, and only a deletion of the current
//! extreme pays for a rescan of its group.

use crate::index::prefix_end;
use lamina_core::{
    error::Error,
    kv::{AtomicKind, RangeOptions, RangeScan, Transaction, decode_counter, encode_counter},
    subspace::Subspace,
    tuple::{Element, Tuple},
};
use lamina_schema::{
    expr::{FieldAccess, KeyExpression},
    node::Index,
};

fn evaluated(root: &KeyExpression, record: &dyn FieldAccess) -> Result<Tuple, Error> {
    Ok(Tuple::from_elements(root.evaluate(record)?))
}

/// Split `columns` into (grouping prefix, trailing integer operand).
fn split_operand(columns: Tuple, index_name: &str) -> Result<(Tuple, i64), Error> {
    let mut elements = columns.into_elements();
    let last = elements.pop().ok_or_else(|| {
        Error::internal(format!("index '{index_name}': empty aggregate expression"))
    })?;
    let Element::Int(operand) = last else {
        return Err(Error::internal(format!(
            "index '{index_name}': aggregate operand column must be an integer"
        )));
    };
    Ok((Tuple::from_elements(elements), operand))
}

///
/// CountMaintainer
///
/// `<subspace>/<grouping columns...> -> 8-byte little-endian count`.
///

pub struct CountMaintainer {
    name: String,
    root: KeyExpression,
    subspace: Subspace,
}

impl CountMaintainer {
    #[must_use]
    pub fn new(index: &Index, subspace: Subspace) -> Self {
        Self {
            name: index.name.clone(),
            root: index.root.clone(),
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
        _pk: &Tuple,
        old: Option<&dyn FieldAccess>,
        new: Option<&dyn FieldAccess>,
    ) -> Result<(), Error> {
        let old_group = old.map(|r| evaluated(&self.root, r)).transpose()?;
        let new_group = new.map(|r| evaluated(&self.root, r)).transpose()?;
        if old_group == new_group {
            return Ok(());
        }

        if let Some(group) = old_group {
            tx.atomic_op(&self.subspace.pack(&group), &encode_counter(-1), AtomicKind::Add);
        }
        if let Some(group) = new_group {
            tx.atomic_op(&self.subspace.pack(&group), &encode_counter(1), AtomicKind::Add);
        }
        Ok(())
    }

    /// Current count for one group.
    pub fn count(&self, tx: &dyn Transaction, group: &Tuple) -> Result<i64, Error> {
        Ok(tx
            .get(&self.subspace.pack(group), true)?
            .as_deref()
            .map_or(0, decode_counter))
    }
}

///
/// SumMaintainer
///
/// Root columns are `<grouping...> + <operand>`; one aggregate key per
/// group accumulates the operand with atomic adds.
///

pub struct SumMaintainer {
    name: String,
    root: KeyExpression,
    subspace: Subspace,
}

impl SumMaintainer {
    pub fn new(index: &Index, subspace: Subspace) -> Result<Self, Error> {
        if index.root.column_count() == 0 {
            return Err(Error::internal(format!(
                "index '{}': sum expression has no operand column",
                index.name
            )));
        }
        Ok(Self {
            name: index.name.clone(),
            root: index.root.clone(),
            subspace,
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

    pub fn update(
        &self,
        tx: &mut dyn Transaction,
        _pk: &Tuple,
        old: Option<&dyn FieldAccess>,
        new: Option<&dyn FieldAccess>,
    ) -> Result<(), Error> {
        if let Some(record) = old {
            let (group, operand) = split_operand(evaluated(&self.root, record)?, &self.name)?;
            tx.atomic_op(
                &self.subspace.pack(&group),
                &encode_counter(operand.wrapping_neg()),
                AtomicKind::Add,
            );
        }
        if let Some(record) = new {
            let (group, operand) = split_operand(evaluated(&self.root, record)?, &self.name)?;
            tx.atomic_op(
                &self.subspace.pack(&group),
                &encode_counter(operand),
                AtomicKind::Add,
            );
        }
        Ok(())
    }

    /// Current sum for one group.
    pub fn sum(&self, tx: &dyn Transaction, group: &Tuple) -> Result<i64, Error> {
        Ok(tx
            .get(&self.subspace.pack(group), true)?
            .as_deref()
            .map_or(0, decode_counter))
    }
}

///
/// ExtremeMaintainer
///
/// Min/max over an integer operand. Layout:
/// - entries:   `<subspace>/e/<grouping...>/<operand>/<pk...> -> empty`
/// - aggregate: `<subspace>/a/<grouping...> -> 8-byte little-endian`
///

pub struct ExtremeMaintainer {
    name: String,
    root: KeyExpression,
    entries: Subspace,
    aggregates: Subspace,
    subspace: Subspace,
    take_max: bool,
}

impl ExtremeMaintainer {
    #[must_use]
    pub fn min(index: &Index, subspace: Subspace) -> Self {
        Self::build(index, subspace, false)
    }

    #[must_use]
    pub fn max(index: &Index, subspace: Subspace) -> Self {
        Self::build(index, subspace, true)
    }

    fn build(index: &Index, subspace: Subspace, take_max: bool) -> Self {
        Self {
            name: index.name.clone(),
            root: index.root.clone(),
            entries: subspace.subspace("e"),
            aggregates: subspace.subspace("a"),
            subspace,
            take_max,
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
        if let Some(record) = old {
            let (group, operand) = split_operand(evaluated(&self.root, record)?, &self.name)?;
            self.remove(tx, &group, operand, pk)?;
        }
        if let Some(record) = new {
            let (group, operand) = split_operand(evaluated(&self.root, record)?, &self.name)?;
            self.insert(tx, &group, operand, pk);
        }
        Ok(())
    }

    fn insert(&self, tx: &mut dyn Transaction, group: &Tuple, operand: i64, pk: &Tuple) {
        let mut entry = group.clone();
        entry.push(operand);
        entry.extend(pk.clone());
        tx.set(&self.entries.pack(&entry), &[]);

        let kind = if self.take_max { AtomicKind::Max } else { AtomicKind::Min };
        tx.atomic_op(&self.aggregates.pack(group), &encode_counter(operand), kind);
    }

    fn remove(
        &self,
        tx: &mut dyn Transaction,
        group: &Tuple,
        operand: i64,
        pk: &Tuple,
    ) -> Result<(), Error> {
        let mut entry = group.clone();
        entry.push(operand);
        entry.extend(pk.clone());
        tx.clear(&self.entries.pack(&entry));

        let aggregate_key = self.aggregates.pack(group);
        let current = tx.get(&aggregate_key, false)?.as_deref().map(decode_counter);
        if current != Some(operand) {
            return Ok(()); // the extreme is untouched
        }

        // The departing entry owned the aggregate; recompute from what
        // remains of the group, in the same transaction.
        let begin = self.entries.pack(group);
        let end = prefix_end(begin.clone());
        let survivors = tx.get_range(
            &begin,
            &end,
            RangeOptions {
                snapshot: false,
                limit: Some(1),
                reverse: self.take_max,
            },
        )?;

        match survivors.first() {
            None => tx.clear(&aggregate_key),
            Some((key, _)) => {
                let tuple = self.entries.unpack(key)?;
                let Some(Element::Int(extreme)) = tuple.get(group.len()) else {
                    return Err(Error::internal(format!(
                        "index '{}': corrupt extreme entry",
                        self.name
                    )));
                };
                tx.set(&aggregate_key, &encode_counter(*extreme));
            }
        }

        Ok(())
    }

    /// Current extreme for one group, if the group has entries.
    pub fn extreme(&self, tx: &dyn Transaction, group: &Tuple) -> Result<Option<i64>, Error> {
        Ok(tx
            .get(&self.aggregates.pack(group), true)?
            .as_deref()
            .map(decode_counter))
    }

    /// Number of entries in one group (diagnostics).
    pub fn group_len(&self, tx: &dyn Transaction, group: &Tuple) -> Result<usize, Error> {
        let begin = self.entries.pack(group);
        let end = prefix_end(begin.clone());
        let mut n = 0;
        for pair in RangeScan::new(tx, begin, end, true) {
            pair?;
            n += 1;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests;
