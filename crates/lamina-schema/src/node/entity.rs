use crate::{expr::KeyExpression, node::Attribute};
use serde::Serialize;

///
/// Entity
///
/// One record type: ordered attributes, ordered primary-key field names,
/// and the canonical key expression derived from them.
///

#[derive(Clone, Debug, Serialize)]
pub struct Entity {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub primary_key_fields: Vec<String>,

    primary_key_expression: KeyExpression,
}

impl Entity {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        attributes: Vec<Attribute>,
        primary_key_fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let primary_key_fields: Vec<String> =
            primary_key_fields.into_iter().map(Into::into).collect();
        let primary_key_expression = derive_primary_key_expression(&primary_key_fields);

        Self {
            name: name.into(),
            attributes,
            primary_key_fields,
            primary_key_expression,
        }
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Canonical expression producing the primary-key tuple.
    #[must_use]
    pub const fn primary_key_expression(&self) -> &KeyExpression {
        &self.primary_key_expression
    }

    /// Number of primary-key columns.
    #[must_use]
    pub fn primary_key_length(&self) -> usize {
        self.primary_key_fields.len()
    }
}

fn derive_primary_key_expression(fields: &[String]) -> KeyExpression {
    match fields {
        [single] => KeyExpression::field(single.clone()),
        many => KeyExpression::concat(many.iter().map(|f| KeyExpression::field(f.clone()))),
    }
}
