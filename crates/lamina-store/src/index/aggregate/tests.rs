use super::*;
use lamina_core::kv::{Database, memory::MemoryDatabase};
use lamina_schema::{
    expr::FieldValue,
    node::IndexKind,
};

struct Score {
    tenant: &'static str,
    points: i64,
}

impl FieldAccess for Score {
    fn field(&self, field: &str) -> Option<FieldValue<'_>> {
        match field {
            "tenant" => Some(FieldValue::Scalar(Element::String(self.tenant.to_string()))),
            "points" => Some(FieldValue::Scalar(Element::Int(self.points))),
            _ => None,
        }
    }
}

fn grouped_root() -> KeyExpression {
    KeyExpression::concat([KeyExpression::field("tenant"), KeyExpression::field("points")])
}

fn group(tenant: &str) -> Tuple {
    Tuple::single(tenant)
}

#[test]
fn count_tracks_inserts_and_deletes_per_group() {
    let db = MemoryDatabase::new();
    let index = Index::new("cnt", IndexKind::Count, KeyExpression::field("tenant"));
    let m = CountMaintainer::new(&index, Subspace::from_path("ix/cnt"));

    let mut tx = db.create_transaction();
    let a1 = Score { tenant: "a", points: 1 };
    let a2 = Score { tenant: "a", points: 2 };
    let b1 = Score { tenant: "b", points: 3 };
    m.update(tx.as_mut(), &Tuple::single(1i64), None, Some(&a1)).expect("i");
    m.update(tx.as_mut(), &Tuple::single(2i64), None, Some(&a2)).expect("i");
    m.update(tx.as_mut(), &Tuple::single(3i64), None, Some(&b1)).expect("i");
    m.update(tx.as_mut(), &Tuple::single(2i64), Some(&a2), None).expect("d");
    tx.commit().expect("commit");

    let tx = db.create_transaction();
    assert_eq!(m.count(tx.as_ref(), &group("a")).expect("count"), 1);
    assert_eq!(m.count(tx.as_ref(), &group("b")).expect("count"), 1);
    assert_eq!(m.count(tx.as_ref(), &group("zz")).expect("count"), 0);
}

#[test]
fn count_ignores_updates_that_stay_in_the_group() {
    let db = MemoryDatabase::new();
    let index = Index::new("cnt", IndexKind::Count, KeyExpression::field("tenant"));
    let m = CountMaintainer::new(&index, Subspace::from_path("ix/cnt"));

    let before = Score { tenant: "a", points: 1 };
    let after = Score { tenant: "a", points: 99 };

    let mut tx = db.create_transaction();
    m.update(tx.as_mut(), &Tuple::single(1i64), None, Some(&before)).expect("i");
    m.update(tx.as_mut(), &Tuple::single(1i64), Some(&before), Some(&after)).expect("u");
    tx.commit().expect("commit");

    let tx = db.create_transaction();
    assert_eq!(m.count(tx.as_ref(), &group("a")).expect("count"), 1);
}

#[test]
fn sum_accumulates_the_operand_column() {
    let db = MemoryDatabase::new();
    let index = Index::new("sum", IndexKind::Sum, grouped_root());
    let m = SumMaintainer::new(&index, Subspace::from_path("ix/sum")).expect("new");

    let mut tx = db.create_transaction();
    m.update(tx.as_mut(), &Tuple::single(1i64), None, Some(&Score { tenant: "a", points: 10 }))
        .expect("i");
    m.update(tx.as_mut(), &Tuple::single(2i64), None, Some(&Score { tenant: "a", points: 32 }))
        .expect("i");
    tx.commit().expect("commit");

    // Update: 10 -> 4 adjusts the sum by the delta.
    let mut tx = db.create_transaction();
    m.update(
        tx.as_mut(),
        &Tuple::single(1i64),
        Some(&Score { tenant: "a", points: 10 }),
        Some(&Score { tenant: "a", points: 4 }),
    )
    .expect("u");
    tx.commit().expect("commit");

    let tx = db.create_transaction();
    assert_eq!(m.sum(tx.as_ref(), &group("a")).expect("sum"), 36);
}

#[test]
fn min_and_max_follow_inserts() {
    let db = MemoryDatabase::new();
    let min_index = Index::new("mn", IndexKind::Min, grouped_root());
    let max_index = Index::new("mx", IndexKind::Max, grouped_root());
    let mn = ExtremeMaintainer::min(&min_index, Subspace::from_path("ix/mn"));
    let mx = ExtremeMaintainer::max(&max_index, Subspace::from_path("ix/mx"));

    let mut tx = db.create_transaction();
    for (pk, points) in [(1i64, 50), (2, 9), (3, 120)] {
        let row = Score { tenant: "a", points };
        mn.update(tx.as_mut(), &Tuple::single(pk), None, Some(&row)).expect("i");
        mx.update(tx.as_mut(), &Tuple::single(pk), None, Some(&row)).expect("i");
    }
    tx.commit().expect("commit");

    let tx = db.create_transaction();
    assert_eq!(mn.extreme(tx.as_ref(), &group("a")).expect("min"), Some(9));
    assert_eq!(mx.extreme(tx.as_ref(), &group("a")).expect("max"), Some(120));
}

#[test]
fn deleting_the_extreme_recomputes_from_survivors() {
    let db = MemoryDatabase::new();
    let index = Index::new("mn", IndexKind::Min, grouped_root());
    let m = ExtremeMaintainer::min(&index, Subspace::from_path("ix/mn"));

    let rows = [(1i64, 50), (2, 9), (3, 120)];
    let mut tx = db.create_transaction();
    for (pk, points) in rows {
        m.update(tx.as_mut(), &Tuple::single(pk), None, Some(&Score { tenant: "a", points }))
            .expect("i");
    }
    tx.commit().expect("commit");

    // Remove the current minimum (9).
    let mut tx = db.create_transaction();
    m.update(
        tx.as_mut(),
        &Tuple::single(2i64),
        Some(&Score { tenant: "a", points: 9 }),
        None,
    )
    .expect("d");
    tx.commit().expect("commit");

    let tx = db.create_transaction();
    assert_eq!(m.extreme(tx.as_ref(), &group("a")).expect("min"), Some(50));
    assert_eq!(m.group_len(tx.as_ref(), &group("a")).expect("len"), 2);
}

#[test]
fn deleting_the_last_entry_clears_the_aggregate() {
    let db = MemoryDatabase::new();
    let index = Index::new("mx", IndexKind::Max, grouped_root());
    let m = ExtremeMaintainer::max(&index, Subspace::from_path("ix/mx"));
    let row = Score { tenant: "a", points: 7 };

    let mut tx = db.create_transaction();
    m.update(tx.as_mut(), &Tuple::single(1i64), None, Some(&row)).expect("i");
    tx.commit().expect("commit");

    let mut tx = db.create_transaction();
    m.update(tx.as_mut(), &Tuple::single(1i64), Some(&row), None).expect("d");
    tx.commit().expect("commit");

    let tx = db.create_transaction();
    assert_eq!(m.extreme(tx.as_ref(), &group("a")).expect("max"), None);
}

#[test]
fn non_integer_operand_is_a_contract_violation() {
    let db = MemoryDatabase::new();
    let index = Index::new(
        "sum",
        IndexKind::Sum,
        KeyExpression::concat([KeyExpression::field("points"), KeyExpression::field("tenant")]),
    );
    let m = SumMaintainer::new(&index, Subspace::from_path("ix/sum")).expect("new");

    let mut tx = db.create_transaction();
    let err = m
        .update(tx.as_mut(), &Tuple::single(1i64), None, Some(&Score { tenant: "a", points: 1 }))
        .expect_err("string operand");
    assert!(matches!(err, Error::Internal(_)));
}
