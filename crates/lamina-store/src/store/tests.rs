use super::*;
use crate::index::Maintainer;
use lamina_core::{
    kv::{Database, memory::MemoryDatabase},
    tuple::Element,
};
use lamina_schema::{
    expr::{FieldAccess, FieldValue, KeyExpression},
    node::{Attribute, Index, IndexKind, IndexOptions, RankOrder},
    version::SchemaVersion,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
struct Player {
    tenant_id: String,
    id: i64,
    handle: String,
    score: i64,
}

impl FieldAccess for Player {
    fn field(&self, field: &str) -> Option<FieldValue<'_>> {
        match field {
            "tenant_id" => Some(FieldValue::Scalar(Element::String(self.tenant_id.clone()))),
            "id" => Some(FieldValue::Scalar(Element::Int(self.id))),
            "handle" => Some(FieldValue::Scalar(Element::String(self.handle.clone()))),
            "score" => Some(FieldValue::Scalar(Element::Int(self.score))),
            _ => None,
        }
    }
}

impl Recordable for Player {
    fn record_name() -> &'static str {
        "Player"
    }
}

fn player(id: i64, handle: &str, score: i64) -> Player {
    Player {
        tenant_id: "T".to_string(),
        id,
        handle: handle.to_string(),
        score,
    }
}

fn pk(id: i64) -> Tuple {
    Tuple::from_elements([Element::String("T".to_string()), Element::Int(id)])
}

fn schema() -> Arc<Schema> {
    Arc::new(
        Schema::builder(SchemaVersion::new(1, 0, 0))
            .entity(lamina_schema::node::Entity::new(
                "Player",
                vec![
                    Attribute::new("tenant_id").primary_key(),
                    Attribute::new("id").primary_key(),
                    Attribute::new("handle"),
                    Attribute::new("score"),
                ],
                ["tenant_id", "id"],
            ))
            .index(Index::new(
                "by_handle",
                IndexKind::Value,
                KeyExpression::field("handle"),
            ).options(IndexOptions {
                unique: true,
                ..IndexOptions::default()
            }))
            .index(Index::new(
                "by_score",
                IndexKind::Rank,
                KeyExpression::concat([
                    KeyExpression::field("tenant_id"),
                    KeyExpression::field("score"),
                ]),
            ).options(IndexOptions {
                rank_order: RankOrder::Descending,
                ..IndexOptions::default()
            }))
            .index(Index::new(
                "count_by_tenant",
                IndexKind::Count,
                KeyExpression::field("tenant_id"),
            ))
            .build()
            .expect("schema"),
    )
}

fn store() -> (MemoryDatabase, RecordStore) {
    let db = MemoryDatabase::new();
    let store = RecordStore::open(schema(), "Player", Subspace::from_path("stores/T"), None)
        .expect("open");
    (db, store)
}

fn save(db: &MemoryDatabase, store: &RecordStore, record: &Player) -> Result<(), Error> {
    let mut tx = db.create_transaction();
    store.save(tx.as_mut(), record)?;
    tx.commit()
}

#[test]
fn save_then_fetch_round_trips() {
    let (db, store) = store();
    let record = player(1, "zed", 50);
    save(&db, &store, &record).expect("save");

    let tx = db.create_transaction();
    assert_eq!(
        store.fetch::<Player>(tx.as_ref(), &pk(1)).expect("fetch"),
        Some(record)
    );
    assert_eq!(store.fetch::<Player>(tx.as_ref(), &pk(99)).expect("fetch"), None);
}

#[test]
fn save_maintains_every_applicable_index() {
    let (db, store) = store();
    save(&db, &store, &player(1, "zed", 50)).expect("save");

    let tx = db.create_transaction();

    let Some(Maintainer::Value(by_handle)) = store.maintainer("by_handle") else {
        panic!("by_handle must be a value maintainer");
    };
    assert_eq!(
        by_handle
            .scan_prefix(tx.as_ref(), &Tuple::single("zed"), None)
            .expect("scan"),
        vec![(pk(1), Tuple::new())]
    );

    let Some(Maintainer::Rank(by_score)) = store.maintainer("by_score") else {
        panic!("by_score must be a rank maintainer");
    };
    assert_eq!(
        by_score
            .rank_of(tx.as_ref(), &Tuple::single("T"), &Element::Int(50), &pk(1))
            .expect("rank"),
        1
    );

    let Some(Maintainer::Count(count)) = store.maintainer("count_by_tenant") else {
        panic!("count_by_tenant must be a count maintainer");
    };
    assert_eq!(count.count(tx.as_ref(), &Tuple::single("T")).expect("count"), 1);
}

#[test]
fn updates_leave_no_stale_index_keys() {
    let (db, store) = store();
    save(&db, &store, &player(1, "zed", 50)).expect("save");
    save(&db, &store, &player(1, "zed_renamed", 70)).expect("resave");

    let tx = db.create_transaction();
    let Some(Maintainer::Value(by_handle)) = store.maintainer("by_handle") else {
        panic!("value maintainer");
    };
    assert!(
        by_handle
            .scan_prefix(tx.as_ref(), &Tuple::single("zed"), None)
            .expect("scan")
            .is_empty(),
        "old handle entry must be gone"
    );
    assert_eq!(
        by_handle
            .scan_prefix(tx.as_ref(), &Tuple::single("zed_renamed"), None)
            .expect("scan")
            .len(),
        1
    );

    let Some(Maintainer::Rank(by_score)) = store.maintainer("by_score") else {
        panic!("rank maintainer");
    };
    assert_eq!(by_score.total_count(tx.as_ref(), &Tuple::single("T")).expect("count"), 1);
}

#[test]
fn delete_removes_the_row_and_all_index_entries() {
    let (db, store) = store();
    save(&db, &store, &player(1, "zed", 50)).expect("save");

    let mut tx = db.create_transaction();
    store.delete::<Player>(tx.as_mut(), &pk(1)).expect("delete");
    tx.commit().expect("commit");

    let tx = db.create_transaction();
    assert_eq!(store.fetch::<Player>(tx.as_ref(), &pk(1)).expect("fetch"), None);

    let Some(Maintainer::Value(by_handle)) = store.maintainer("by_handle") else {
        panic!("value maintainer");
    };
    assert!(
        by_handle
            .scan_prefix(tx.as_ref(), &Tuple::single("zed"), None)
            .expect("scan")
            .is_empty()
    );

    let Some(Maintainer::Count(count)) = store.maintainer("count_by_tenant") else {
        panic!("count maintainer");
    };
    assert_eq!(count.count(tx.as_ref(), &Tuple::single("T")).expect("count"), 0);
}

#[test]
fn deleting_a_missing_key_is_a_no_op() {
    let (db, store) = store();

    let mut tx = db.create_transaction();
    store.delete::<Player>(tx.as_mut(), &pk(42)).expect("delete");
    tx.commit().expect("commit");

    assert!(db.is_empty());
}

#[test]
fn unique_index_rejects_a_second_owner() {
    let (db, store) = store();
    save(&db, &store, &player(1, "zed", 50)).expect("save");

    let err = save(&db, &store, &player(2, "zed", 60)).expect_err("duplicate handle");
    assert!(err.is_uniqueness_violation(), "got {err}");

    // The failed save must leave nothing behind.
    let tx = db.create_transaction();
    assert_eq!(store.fetch::<Player>(tx.as_ref(), &pk(2)).expect("fetch"), None);
}

#[test]
fn replace_on_duplicate_evicts_the_previous_owner() {
    let replace_schema = Arc::new(
        Schema::builder(SchemaVersion::new(1, 0, 0))
            .entity(lamina_schema::node::Entity::new(
                "Player",
                vec![
                    Attribute::new("tenant_id").primary_key(),
                    Attribute::new("id").primary_key(),
                    Attribute::new("handle"),
                    Attribute::new("score"),
                ],
                ["tenant_id", "id"],
            ))
            .index(
                Index::new("by_handle", IndexKind::Value, KeyExpression::field("handle")).options(
                    IndexOptions {
                        unique: true,
                        replace_on_duplicate: true,
                        ..IndexOptions::default()
                    },
                ),
            )
            .build()
            .expect("schema"),
    );

    let db = MemoryDatabase::new();
    let store = RecordStore::open(replace_schema, "Player", Subspace::from_path("stores/T"), None)
        .expect("open");

    save(&db, &store, &player(1, "zed", 50)).expect("save");
    save(&db, &store, &player(2, "zed", 60)).expect("replace");

    // The new owner won; the old record and its index entries are gone.
    let tx = db.create_transaction();
    assert_eq!(store.fetch::<Player>(tx.as_ref(), &pk(1)).expect("fetch"), None);
    assert_eq!(
        store.fetch::<Player>(tx.as_ref(), &pk(2)).expect("fetch"),
        Some(player(2, "zed", 60))
    );

    let Some(Maintainer::Value(by_handle)) = store.maintainer("by_handle") else {
        panic!("value maintainer");
    };
    assert_eq!(
        by_handle
            .scan_prefix(tx.as_ref(), &Tuple::single("zed"), None)
            .expect("scan"),
        vec![(pk(2), Tuple::new())]
    );
}

#[test]
fn resaving_the_same_record_is_not_a_conflict() {
    let (db, store) = store();
    save(&db, &store, &player(1, "zed", 50)).expect("save");
    save(&db, &store, &player(1, "zed", 55)).expect("resave with same handle");
}

#[test]
fn scan_yields_records_in_key_order_and_restarts() {
    let (db, store) = store();
    for id in [3i64, 1, 2, 5, 4] {
        save(&db, &store, &player(id, &format!("p{id}"), id * 10)).expect("save");
    }

    let tx = db.create_transaction();
    let all: Vec<(Tuple, Player)> = store
        .scan::<Player>(tx.as_ref(), ScanOptions::snapshot())
        .expect("scan")
        .collect::<Result<_, _>>()
        .expect("decode");
    let ids: Vec<i64> = all.iter().map(|(_, r)| r.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);

    // Restart after the second record.
    let resumed: Vec<(Tuple, Player)> = store
        .scan::<Player>(tx.as_ref(), ScanOptions::snapshot().after(all[1].0.clone()))
        .expect("scan")
        .collect::<Result<_, _>>()
        .expect("decode");
    let ids: Vec<i64> = resumed.iter().map(|(_, r)| r.id).collect();
    assert_eq!(ids, vec![3, 4, 5]);

    // Limits bound the cursor.
    let limited = store
        .scan::<Player>(tx.as_ref(), ScanOptions::snapshot().limit(2))
        .expect("scan")
        .count();
    assert_eq!(limited, 2);
}

#[test]
fn disabled_indexes_are_not_maintained() {
    let (db, store) = store();

    let mut tx = db.create_transaction();
    store.set_index_state(tx.as_mut(), "by_handle", crate::state::IndexState::Disabled);
    tx.commit().expect("commit");

    save(&db, &store, &player(1, "zed", 50)).expect("save");

    let tx = db.create_transaction();
    let Some(Maintainer::Value(by_handle)) = store.maintainer("by_handle") else {
        panic!("value maintainer");
    };
    assert!(
        by_handle
            .scan_prefix(tx.as_ref(), &Tuple::single("zed"), None)
            .expect("scan")
            .is_empty(),
        "disabled index must not receive entries"
    );
}

#[test]
fn wrong_record_type_is_fatal() {
    #[derive(Debug, Deserialize, Serialize)]
    struct Other;
    impl FieldAccess for Other {
        fn field(&self, _: &str) -> Option<FieldValue<'_>> {
            None
        }
    }
    impl Recordable for Other {
        fn record_name() -> &'static str {
            "Other"
        }
    }

    let (db, store) = store();
    let tx = db.create_transaction();
    assert!(matches!(
        store.fetch::<Other>(tx.as_ref(), &pk(1)),
        Err(Error::Internal(_))
    ));
}

#[test]
fn opening_an_unknown_type_is_fatal() {
    assert!(matches!(
        RecordStore::open(schema(), "Ghost", Subspace::from_path("stores/T"), None),
        Err(Error::Internal(_))
    ));
}
