use crate::version::SchemaVersion;
use serde::Serialize;

///
/// FormerIndex
///
/// Marker for an index that once existed. Persisted alongside the schema so
/// a removed index name cannot be accidentally reused with a different
/// layout. Only scalar fields are carried; the original index object is
/// never serialized.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FormerIndex {
    pub name: String,
    pub added_version: SchemaVersion,
    pub removed_version: SchemaVersion,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub former_name: Option<String>,
}

impl FormerIndex {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        added_version: SchemaVersion,
        removed_version: SchemaVersion,
    ) -> Self {
        Self {
            name: name.into(),
            added_version,
            removed_version,
            former_name: None,
        }
    }

    #[must_use]
    pub fn former_name(mut self, former_name: impl Into<String>) -> Self {
        self.former_name = Some(former_name.into());
        self
    }
}
