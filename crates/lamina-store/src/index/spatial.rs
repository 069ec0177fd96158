//! Spatial index over Hilbert-curve cell ids.
//!
//! The root expression yields a (lat, lon) column pair; each record is
//! stored under the big-endian bytes of its leaf-level cell id, so a
//! region query becomes a handful of contiguous key ranges produced by the
//! coverer.

use crate::index::prefix_end;
use lamina_core::{
    error::Error,
    kv::{RangeScan, Transaction},
    subspace::Subspace,
    tuple::{Element, Tuple},
};
use lamina_schema::{
    expr::{FieldAccess, KeyExpression},
    node::{Index, SpatialParams},
};
use lamina_spatial::{CellId, LatLon, Region, RegionCoverer};

///
/// SpatialMaintainer
///
/// Entry layout: `<subspace>/<cell id bytes>/<pk...> -> empty`.
///

pub struct SpatialMaintainer {
    name: String,
    root: KeyExpression,
    params: SpatialParams,
    subspace: Subspace,
}

impl SpatialMaintainer {
    pub fn new(index: &Index, subspace: Subspace) -> Result<Self, Error> {
        if index.root.column_count() != 2 {
            return Err(Error::internal(format!(
                "index '{}': spatial expression must yield (lat, lon)",
                index.name
            )));
        }
        let params = index.options.spatial.ok_or_else(|| {
            Error::internal(format!(
                "index '{}': spatial index without spatial params",
                index.name
            ))
        })?;

        Ok(Self {
            name: index.name.clone(),
            root: index.root.clone(),
            params,
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

    fn cell_for(&self, record: &dyn FieldAccess) -> Result<CellId, Error> {
        let columns = self.root.evaluate(record)?;
        let (lat, lon) = match (columns.first(), columns.get(1)) {
            (Some(Element::Double(lat)), Some(Element::Double(lon))) => (*lat, *lon),
            _ => {
                return Err(Error::internal(format!(
                    "index '{}': position columns must be doubles",
                    self.name
                )));
            }
        };
        Ok(CellId::from_lat_lon(LatLon::new(lat, lon), self.params.max_level))
    }

    fn entry_key(&self, cell: CellId, pk: &Tuple) -> Vec<u8> {
        let mut tuple = Tuple::single(Element::Bytes(cell.0.to_be_bytes().to_vec()));
        tuple.extend(pk.clone());
        self.subspace.pack(&tuple)
    }

    pub fn update(
        &self,
        tx: &mut dyn Transaction,
        pk: &Tuple,
        old: Option<&dyn FieldAccess>,
        new: Option<&dyn FieldAccess>,
    ) -> Result<(), Error> {
        let old_key = old
            .map(|r| self.cell_for(r).map(|c| self.entry_key(c, pk)))
            .transpose()?;
        let new_key = new
            .map(|r| self.cell_for(r).map(|c| self.entry_key(c, pk)))
            .transpose()?;

        if let Some(key) = &old_key
            && Some(key) != new_key.as_ref()
        {
            tx.clear(key);
        }
        if let Some(key) = &new_key {
            tx.set(key, &[]);
        }

        Ok(())
    }

    /// Primary keys of records inside `region`. The coverer turns the
    /// region into cell ranges; each range is one contiguous scan.
    pub fn pks_in_region(
        &self,
        tx: &dyn Transaction,
        region: &dyn Region,
    ) -> Result<Vec<Tuple>, Error> {
        let coverer = RegionCoverer {
            min_level: self.params.min_level,
            max_level: self.params.max_level,
            max_cells: self.params.max_cells,
        };

        let mut out = Vec::new();
        for cell in coverer.covering(region) {
            let begin = self
                .subspace
                .pack(&Tuple::single(Element::Bytes(cell.range_min().0.to_be_bytes().to_vec())));
            let end = prefix_end(
                self.subspace
                    .pack(&Tuple::single(Element::Bytes(cell.range_max().0.to_be_bytes().to_vec()))),
            );

            for pair in RangeScan::new(tx, begin, end, true) {
                let (key, _) = pair?;
                let tuple = self.subspace.unpack(&key)?;
                out.push(Tuple::from_elements(tuple.into_elements().split_off(1)));
            }
        }

        out.dedup_by(|a, b| a == b);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lamina_core::kv::{Database, memory::MemoryDatabase};
    use lamina_schema::{
        expr::FieldValue,
        node::{IndexKind, IndexOptions},
    };
    use lamina_spatial::Cap;

    struct Poi {
        lat: f64,
        lon: f64,
    }

    impl FieldAccess for Poi {
        fn field(&self, field: &str) -> Option<FieldValue<'_>> {
            match field {
                "lat" => Some(FieldValue::Scalar(Element::Double(self.lat))),
                "lon" => Some(FieldValue::Scalar(Element::Double(self.lon))),
                _ => None,
            }
        }
    }

    fn maintainer() -> SpatialMaintainer {
        let index = Index::new(
            "by_position",
            IndexKind::Spatial,
            KeyExpression::concat([KeyExpression::field("lat"), KeyExpression::field("lon")]),
        )
        .options(IndexOptions {
            spatial: Some(SpatialParams {
                min_level: 2,
                max_level: 16,
                max_cells: 8,
            }),
            ..IndexOptions::default()
        });
        SpatialMaintainer::new(&index, Subspace::from_path("ix/by_position")).expect("maintainer")
    }

    #[test]
    fn region_query_finds_nearby_records_only() {
        let db = MemoryDatabase::new();
        let m = maintainer();

        let pois = [
            (1i64, Poi { lat: 48.8584, lon: 2.2945 }),  // Paris
            (2, Poi { lat: 48.8606, lon: 2.3376 }),     // Paris, ~3 km away
            (3, Poi { lat: 35.6762, lon: 139.6503 }),   // Tokyo
        ];
        let mut tx = db.create_transaction();
        for (pk, poi) in &pois {
            m.update(tx.as_mut(), &Tuple::single(*pk), None, Some(poi)).expect("insert");
        }
        tx.commit().expect("commit");

        let tx = db.create_transaction();
        let near_paris = Cap::new(LatLon::new(48.8584, 2.2945), 0.5);
        let mut found = m.pks_in_region(tx.as_ref(), &near_paris).expect("query");
        found.sort_by(|a, b| a.canonical_cmp(b));

        assert_eq!(found, vec![Tuple::single(1i64), Tuple::single(2i64)]);
    }

    #[test]
    fn moving_a_record_moves_its_entry() {
        let db = MemoryDatabase::new();
        let m = maintainer();

        let before = Poi { lat: 10.0, lon: 10.0 };
        let after = Poi { lat: -40.0, lon: 120.0 };

        let mut tx = db.create_transaction();
        m.update(tx.as_mut(), &Tuple::single(1i64), None, Some(&before)).expect("insert");
        m.update(tx.as_mut(), &Tuple::single(1i64), Some(&before), Some(&after)).expect("move");
        tx.commit().expect("commit");

        let tx = db.create_transaction();
        let old_spot = Cap::new(LatLon::new(10.0, 10.0), 1.0);
        let new_spot = Cap::new(LatLon::new(-40.0, 120.0), 1.0);

        assert!(m.pks_in_region(tx.as_ref(), &old_spot).expect("query").is_empty());
        assert_eq!(
            m.pks_in_region(tx.as_ref(), &new_spot).expect("query"),
            vec![Tuple::single(1i64)]
        );
    }
}
