use super::*;
use proptest::prelude::*;

#[test]
fn face_cells_are_valid_level_zero() {
    for face in 0..6 {
        let cell = CellId::from_face(face);
        assert!(cell.is_valid());
        assert_eq!(cell.face(), face);
        assert_eq!(cell.level(), 0);
    }
}

#[test]
fn level_round_trips_through_parent() {
    let leaf = CellId::from_lat_lon(LatLon::new(48.8566, 2.3522), MAX_LEVEL);
    assert!(leaf.is_leaf());
    assert_eq!(leaf.level(), MAX_LEVEL);

    for level in (0..MAX_LEVEL).rev() {
        let parent = leaf.parent(level);
        assert!(parent.is_valid());
        assert_eq!(parent.level(), level);
        assert!(parent.contains(leaf));
    }
}

#[test]
fn children_partition_the_parent() {
    let cell = CellId::from_lat_lon(LatLon::new(-33.86, 151.2), 10);
    let children = cell.children();

    for child in children {
        assert_eq!(child.level(), 11);
        assert!(cell.contains(child));
        assert_eq!(child.parent(10), cell);
    }

    // Children tile the parent's leaf range without gaps or overlap;
    // consecutive leaf ids differ by 2.
    assert_eq!(children[0].range_min(), cell.range_min());
    assert_eq!(children[3].range_max(), cell.range_max());
    for pair in children.windows(2) {
        assert_eq!(pair[0].range_max().0 + 2, pair[1].range_min().0);
    }
}

#[test]
fn contains_is_exclusive_between_siblings() {
    let cell = CellId::from_face(2).children()[1];
    let siblings = CellId::from_face(2).children();

    assert!(!siblings[0].contains(cell));
    assert!(!cell.contains(siblings[2]));
}

#[test]
fn center_round_trips_within_the_cell() {
    let points = [
        LatLon::new(0.0, 0.0),
        LatLon::new(51.5, -0.1),
        LatLon::new(-45.0, 170.0),
        LatLon::new(80.0, -120.0),
        LatLon::new(-89.0, 10.0),
    ];

    for point in points {
        for level in [4, 10, 16, 24] {
            let cell = CellId::from_lat_lon(point, level);
            let center = cell.to_lat_lon();
            let recovered = CellId::from_lat_lon(center, level);
            assert_eq!(cell, recovered, "center of {point:?}@{level} left the cell");
        }
    }
}

#[test]
fn edge_neighbors_are_distinct_same_level_cells() {
    let cell = CellId::from_lat_lon(LatLon::new(37.77, -122.42), 12);
    let neighbors = cell.edge_neighbors();

    for neighbor in neighbors {
        assert!(neighbor.is_valid());
        assert_eq!(neighbor.level(), 12);
        assert_ne!(neighbor, cell);
    }

    let mut unique: Vec<_> = neighbors.to_vec();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 4);
}

#[test]
fn edge_neighbors_wrap_across_faces() {
    // A cell on a face corner still has four valid neighbors.
    let corner = CellId::from_face(0).children()[0].children()[0];
    for neighbor in corner.edge_neighbors() {
        assert!(neighbor.is_valid());
        assert_eq!(neighbor.level(), 2);
    }
}

#[test]
fn range_brackets_descendants_only() {
    let cell = CellId::from_lat_lon(LatLon::new(10.0, 20.0), 8);
    let inside = CellId::from_lat_lon(cell.to_lat_lon(), 20);
    let outside = CellId::from_lat_lon(LatLon::new(-10.0, 20.0), 20);

    assert!(cell.range_min() <= inside && inside <= cell.range_max());
    assert!(!(cell.range_min() <= outside && outside <= cell.range_max()));
}

proptest! {
    #[test]
    fn prop_ancestry_is_consistent(
        lat in -89.0f64..89.0,
        lon in -179.0f64..179.0,
        level in 1u8..=MAX_LEVEL,
    ) {
        let point = LatLon::new(lat, lon);
        let cell = CellId::from_lat_lon(point, level);

        prop_assert!(cell.is_valid());
        prop_assert_eq!(cell.level(), level);

        let parent = cell.parent(level - 1);
        prop_assert!(parent.contains(cell));
        prop_assert!(parent.children().iter().any(|c| *c == cell));
    }

    #[test]
    fn prop_leaf_ids_sort_inside_ancestor_ranges(
        lat in -89.0f64..89.0,
        lon in -179.0f64..179.0,
    ) {
        let leaf = CellId::from_lat_lon(LatLon::new(lat, lon), MAX_LEVEL);
        for level in 0..MAX_LEVEL {
            let ancestor = leaf.parent(level);
            prop_assert!(ancestor.range_min() <= leaf);
            prop_assert!(leaf <= ancestor.range_max());
        }
    }
}
