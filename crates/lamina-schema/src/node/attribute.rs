use serde::Serialize;

///
/// EnumMetadata
///
/// Type name plus ordered case list. Case order is stable; evolution
/// compares by name, never by position.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct EnumMetadata {
    pub name: String,
    pub cases: Vec<String>,
}

impl EnumMetadata {
    #[must_use]
    pub fn new(name: impl Into<String>, cases: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            cases: cases.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn has_case(&self, case: &str) -> bool {
        self.cases.iter().any(|c| c == case)
    }
}

///
/// Attribute
///

#[derive(Clone, Debug, Serialize)]
pub struct Attribute {
    pub name: String,
    pub optional: bool,
    pub primary_key: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enumeration: Option<EnumMetadata>,
}

impl Attribute {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            optional: false,
            primary_key: false,
            enumeration: None,
        }
    }

    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    #[must_use]
    pub fn enumeration(mut self, metadata: EnumMetadata) -> Self {
        self.enumeration = Some(metadata);
        self
    }
}
