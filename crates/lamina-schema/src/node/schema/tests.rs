use super::*;
use crate::{
    expr::KeyExpression,
    node::{Attribute, EnumMetadata, IndexOptions},
};

fn player() -> Entity {
    Entity::new(
        "Player",
        vec![
            Attribute::new("tenant_id").primary_key(),
            Attribute::new("id").primary_key(),
            Attribute::new("score"),
            Attribute::new("email").optional(),
        ],
        ["tenant_id", "id"],
    )
}

fn by_score() -> Index {
    Index::new(
        "by_score",
        IndexKind::Rank,
        KeyExpression::concat([
            KeyExpression::field("tenant_id"),
            KeyExpression::field("score"),
        ]),
    )
}

#[test]
fn a_well_formed_schema_builds() {
    let schema = Schema::builder(SchemaVersion::new(1, 0, 0))
        .entity(player())
        .index(by_score())
        .build()
        .expect("build");

    assert!(schema.entity("Player").is_some());
    assert!(schema.index("by_score").is_some());
    assert_eq!(schema.version(), SchemaVersion::new(1, 0, 0));
}

#[test]
fn duplicate_entity_names_are_rejected() {
    let err = Schema::builder(SchemaVersion::new(1, 0, 0))
        .entity(player())
        .entity(player())
        .build()
        .expect_err("duplicate");

    assert!(err.issues.iter().any(|i| i.contains("duplicate entity")));
}

#[test]
fn primary_key_fields_must_be_attributes() {
    let entity = Entity::new("U", vec![Attribute::new("id")], ["missing"]);
    let err = Schema::builder(SchemaVersion::new(1, 0, 0))
        .entity(entity)
        .build()
        .expect_err("missing pk attribute");

    assert!(err.issues.iter().any(|i| i.contains("not an attribute")));
}

#[test]
fn optional_primary_key_fields_are_rejected() {
    let entity = Entity::new("U", vec![Attribute::new("id").optional().primary_key()], ["id"]);
    let err = Schema::builder(SchemaVersion::new(1, 0, 0))
        .entity(entity)
        .build()
        .expect_err("optional pk");

    assert!(err.issues.iter().any(|i| i.contains("must not be optional")));
}

#[test]
fn empty_enums_are_rejected() {
    let entity = Entity::new(
        "U",
        vec![
            Attribute::new("id").primary_key(),
            Attribute::new("kind").enumeration(EnumMetadata::new("Kind", Vec::<String>::new())),
        ],
        ["id"],
    );
    let err = Schema::builder(SchemaVersion::new(1, 0, 0))
        .entity(entity)
        .build()
        .expect_err("empty enum");

    assert!(err.issues.iter().any(|i| i.contains("no cases")));
}

#[test]
fn unique_option_requires_value_kind() {
    let index = Index::new("c", IndexKind::Count, KeyExpression::field("score")).options(
        IndexOptions {
            unique: true,
            ..IndexOptions::default()
        },
    );
    let err = Schema::builder(SchemaVersion::new(1, 0, 0))
        .entity(player())
        .index(index)
        .build()
        .expect_err("unique count");

    assert!(err.issues.iter().any(|i| i.contains("unique option")));
}

#[test]
fn covering_fields_must_be_disjoint_from_key_fields() {
    let index = Index::new("v", IndexKind::Value, KeyExpression::field("score"))
        .covering(["score"]);
    let err = Schema::builder(SchemaVersion::new(1, 0, 0))
        .entity(player())
        .index(index)
        .build()
        .expect_err("overlapping covering");

    assert!(err.issues.iter().any(|i| i.contains("duplicates an indexed field")));
}

#[test]
fn covering_fields_must_be_disjoint_from_primary_key() {
    let index = Index::new("v", IndexKind::Value, KeyExpression::field("score"))
        .covering(["id"]);
    let err = Schema::builder(SchemaVersion::new(1, 0, 0))
        .entity(player())
        .index(index)
        .build()
        .expect_err("pk covering");

    assert!(err.issues.iter().any(|i| i.contains("primary-key field")));
}

#[test]
fn retired_index_names_cannot_be_reused() {
    let former = FormerIndex::new(
        "by_score",
        SchemaVersion::new(0, 1, 0),
        SchemaVersion::new(2, 0, 0),
    );
    let err = Schema::builder(SchemaVersion::new(1, 0, 0))
        .entity(player())
        .index(by_score())
        .former_index(former)
        .build()
        .expect_err("retired name");

    assert!(err.issues.iter().any(|i| i.contains("retired")));
}

#[test]
fn former_index_name_is_reusable_after_its_removal_version() {
    let former = FormerIndex::new(
        "by_score",
        SchemaVersion::new(0, 1, 0),
        SchemaVersion::new(0, 9, 0),
    );

    assert!(
        Schema::builder(SchemaVersion::new(1, 0, 0))
            .entity(player())
            .index(by_score())
            .former_index(former)
            .build()
            .is_ok()
    );
}

#[test]
fn global_scope_requires_partition_leading_primary_key() {
    let entity = Entity::new(
        "Event",
        vec![Attribute::new("id").primary_key(), Attribute::new("tenant_id")],
        ["id"],
    );
    let index = Index::new("g", IndexKind::Value, KeyExpression::field("id")).global();

    let err = Schema::builder(SchemaVersion::new(1, 0, 0))
        .partition_field("tenant_id")
        .entity(entity)
        .index(index)
        .build()
        .expect_err("global without partition pk");

    assert!(err.issues.iter().any(|i| i.contains("global scope")));
}

#[test]
fn indexes_for_filters_by_applicability_in_insertion_order() {
    let universal = Index::new("u", IndexKind::Value, KeyExpression::field("score"));
    let scoped = Index::new("s", IndexKind::Value, KeyExpression::field("score"))
        .for_types(["Player"]);
    let foreign = Index::new("f", IndexKind::Value, KeyExpression::field("score"))
        .for_types(["Other"]);

    let schema = Schema::builder(SchemaVersion::new(1, 0, 0))
        .entity(player())
        .entity(Entity::new("Other", vec![Attribute::new("score").primary_key()], ["score"]))
        .index(universal)
        .index(scoped)
        .index(foreign)
        .build()
        .expect("build");

    let names: Vec<_> = schema
        .indexes_for("Player")
        .into_iter()
        .map(|i| i.name.as_str())
        .collect();
    assert_eq!(names, vec!["u", "s"]);
}

#[test]
fn validation_accumulates_every_issue() {
    let err = Schema::builder(SchemaVersion::new(1, 0, 0))
        .entity(player())
        .entity(player())
        .entity(Entity::new("U", vec![Attribute::new("id")], ["missing"]))
        .build()
        .expect_err("multiple issues");

    assert!(err.issues.len() >= 2, "expected accumulation, got {:?}", err.issues);
}
