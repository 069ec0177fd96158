//! End-to-end flow over the public facade: schema, container, typed
//! stores, a descending leaderboard, evolution validation, and an online
//! migration.

use lamina::prelude::*;
use lamina::core::kv::memory::MemoryDatabase;
use std::sync::Arc;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
struct Player {
    tenant_id: String,
    id: i64,
    score: i64,
}

impl FieldAccess for Player {
    fn field(&self, field: &str) -> Option<FieldValue<'_>> {
        match field {
            "tenant_id" => Some(FieldValue::Scalar(Element::String(self.tenant_id.clone()))),
            "id" => Some(FieldValue::Scalar(Element::Int(self.id))),
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

fn schema() -> Arc<Schema> {
    Arc::new(
        Schema::builder(SchemaVersion::new(1, 0, 0))
            .entity(Entity::new(
                "Player",
                vec![
                    Attribute::new("tenant_id").primary_key(),
                    Attribute::new("id").primary_key(),
                    Attribute::new("score"),
                ],
                ["tenant_id", "id"],
            ))
            .index(
                Index::new(
                    "leaderboard",
                    IndexKind::Rank,
                    KeyExpression::concat([
                        KeyExpression::field("tenant_id"),
                        KeyExpression::field("score"),
                    ]),
                )
                .options(IndexOptions {
                    rank_order: RankOrder::Descending,
                    bucket_size: 100,
                    ..IndexOptions::default()
                }),
            )
            .build()
            .expect("schema"),
    )
}

fn pk(tenant: &str, id: i64) -> Tuple {
    Tuple::from_elements([Element::String(tenant.to_string()), Element::Int(id)])
}

#[test]
fn leaderboard_over_the_container() {
    let container = Container::new(Arc::new(MemoryDatabase::new()), schema(), Config::default());
    let store = container.store("T", "players", "Player").expect("store");

    for (id, score) in [(1i64, 50i64), (2, 150), (3, 150), (4, 9)] {
        let mut tx = container.database().create_transaction();
        store
            .save(
                tx.as_mut(),
                &Player {
                    tenant_id: "T".to_string(),
                    id,
                    score,
                },
            )
            .expect("save");
        tx.commit().expect("commit");
    }

    let Some(Maintainer::Rank(board)) = store.maintainer("leaderboard") else {
        panic!("leaderboard must be a rank maintainer");
    };

    let tx = container.database().create_transaction();
    let group = Tuple::single("T");

    assert_eq!(
        board
            .rank_of(tx.as_ref(), &group, &Element::Int(150), &pk("T", 2))
            .expect("rank"),
        1
    );
    assert_eq!(
        board
            .rank_of(tx.as_ref(), &group, &Element::Int(150), &pk("T", 3))
            .expect("rank"),
        2
    );
    assert_eq!(
        board
            .rank_of(tx.as_ref(), &group, &Element::Int(50), &pk("T", 1))
            .expect("rank"),
        3
    );
    assert_eq!(
        board
            .rank_of(tx.as_ref(), &group, &Element::Int(9), &pk("T", 4))
            .expect("rank"),
        4
    );
    assert_eq!(
        board.entry_at_rank(tx.as_ref(), &group, 1).expect("lookup"),
        Some((Element::Int(150), pk("T", 2)))
    );
    assert_eq!(board.total_count(tx.as_ref(), &group).expect("count"), 4);
}

#[test]
fn evolution_gates_the_next_schema_version() {
    let old = schema();

    // Dropping the leaderboard without a former-index marker is rejected.
    let without_marker = Schema::builder(SchemaVersion::new(2, 0, 0))
        .entity(old.entity("Player").expect("entity").clone())
        .build()
        .expect("schema");
    let result = validate_evolution(&old, &without_marker, &EvolutionOptions::default());
    assert!(!result.is_valid());

    // With the marker, the same deletion is clean.
    let with_marker = Schema::builder(SchemaVersion::new(2, 0, 0))
        .entity(old.entity("Player").expect("entity").clone())
        .former_index(FormerIndex::new(
            "leaderboard",
            SchemaVersion::new(1, 0, 0),
            SchemaVersion::new(2, 0, 0),
        ))
        .build()
        .expect("schema");
    let result = validate_evolution(&old, &with_marker, &EvolutionOptions::default());
    assert!(result.is_valid(), "errors: {:?}", result.errors());
}

#[test]
fn migration_transforms_records_and_records_its_version() {
    let db = Arc::new(MemoryDatabase::new());
    let store_root = Subspace::from_path("app/players");

    let store =
        RecordStore::open(schema(), "Player", store_root.clone(), None).expect("open");
    for id in 0..30 {
        let mut tx = db.create_transaction();
        store
            .save(
                tx.as_mut(),
                &Player {
                    tenant_id: "T".to_string(),
                    id,
                    score: id,
                },
            )
            .expect("save");
        tx.commit().expect("commit");
    }

    let mut manager = MigrationManager::new(
        db.clone(),
        schema(),
        store_root.clone(),
        Subspace::from_path("app/migrations"),
    );
    manager.register(Migration::new(
        SchemaVersion::ZERO,
        SchemaVersion::new(1, 0, 0),
        "scores become percentages",
        |ctx| {
            ctx.transform_records::<Player>(
                &BatchConfig {
                    max_records: 8,
                    ..BatchConfig::default()
                },
                |mut player| {
                    player.score *= 100;
                    Ok(player)
                },
            )
            .map(|_| ())
        },
    ));

    let executed = manager.migrate(SchemaVersion::new(1, 0, 0)).expect("migrate");
    assert_eq!(executed, vec!["0.0.0-1.0.0".to_string()]);
    assert_eq!(
        manager.current_version().expect("version"),
        SchemaVersion::new(1, 0, 0)
    );

    let tx = db.create_transaction();
    let record = store
        .fetch::<Player>(tx.as_ref(), &pk("T", 7))
        .expect("fetch")
        .expect("present");
    assert_eq!(record.score, 700);
}
