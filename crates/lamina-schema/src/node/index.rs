use crate::expr::KeyExpression;
use serde::Serialize;
use std::{
    collections::BTreeSet,
    fmt::{self, Display},
};

///
/// IndexKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum IndexKind {
    Value,
    Unique,
    Count,
    Sum,
    Min,
    Max,
    Rank,
    Vector,
    Spatial,
    Version,
}

impl Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Value => "value",
            Self::Unique => "unique",
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Min => "min",
            Self::Max => "max",
            Self::Rank => "rank",
            Self::Vector => "vector",
            Self::Spatial => "spatial",
            Self::Version => "version",
        };
        write!(f, "{label}")
    }
}

///
/// IndexScope
///
/// Partition-scoped index data lives inside each tenant's subspace; global
/// data lives in one shared top-level subspace.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub enum IndexScope {
    #[default]
    Partition,
    Global,
}

///
/// RankOrder
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub enum RankOrder {
    #[default]
    Ascending,
    Descending,
}

///
/// ScoreKind
///
/// Runtime selector for the rank engine's score type. The algorithm is
/// identical across score types; only boundary arithmetic differs.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub enum ScoreKind {
    Int32,
    #[default]
    Int64,
    Float32,
    Float64,
}

///
/// HnswParams
///
/// Metadata shape only; the graph algorithm is an external collaborator.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct HnswParams {
    pub dimensions: usize,
    pub m: usize,
    pub ef_construction: usize,
    pub metric: DistanceMetric,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum DistanceMetric {
    Euclidean,
    Cosine,
    Dot,
}

///
/// SpatialParams
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct SpatialParams {
    pub min_level: u8,
    pub max_level: u8,
    pub max_cells: usize,
}

impl Default for SpatialParams {
    fn default() -> Self {
        Self {
            min_level: 4,
            max_level: 16,
            max_cells: 8,
        }
    }
}

///
/// IndexOptions
///

#[derive(Clone, Debug, Serialize)]
pub struct IndexOptions {
    /// Enforce one primary key per indexed-columns prefix (value kind only).
    pub unique: bool,
    /// On a unique conflict, evict the existing owner instead of failing.
    pub replace_on_duplicate: bool,
    pub rank_order: RankOrder,
    /// Range-Tree bucket size; level `l` buckets span `bucket_size^l`.
    pub bucket_size: u64,
    /// Range-Tree depth.
    pub levels: u32,
    pub score: ScoreKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hnsw: Option<HnswParams>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub spatial: Option<SpatialParams>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            unique: false,
            replace_on_duplicate: false,
            rank_order: RankOrder::default(),
            bucket_size: 100,
            levels: 3,
            score: ScoreKind::default(),
            hnsw: None,
            spatial: None,
        }
    }
}

///
/// Index
///

#[derive(Clone, Debug, Serialize)]
pub struct Index {
    pub name: String,
    pub kind: IndexKind,
    pub root: KeyExpression,
    /// Extra record fields packed into the entry value so reads can skip
    /// the record row.
    pub covering: Vec<String>,
    /// Record type names this index applies to; `None` means universal.
    pub record_types: Option<BTreeSet<String>>,
    pub scope: IndexScope,
    pub options: IndexOptions,
}

impl Index {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: IndexKind, root: KeyExpression) -> Self {
        Self {
            name: name.into(),
            kind,
            root,
            covering: Vec::new(),
            record_types: None,
            scope: IndexScope::default(),
            options: IndexOptions::default(),
        }
    }

    #[must_use]
    pub fn covering(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.covering = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn for_types(mut self, types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.record_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub const fn global(mut self) -> Self {
        self.scope = IndexScope::Global;
        self
    }

    #[must_use]
    pub fn options(mut self, options: IndexOptions) -> Self {
        self.options = options;
        self
    }

    /// Whether this index maintains entries for the given record type.
    #[must_use]
    pub fn applies_to(&self, record_name: &str) -> bool {
        self.record_types
            .as_ref()
            .is_none_or(|types| types.contains(record_name))
    }

    /// Unique semantics: the dedicated kind or the value-kind flag.
    #[must_use]
    pub const fn is_unique(&self) -> bool {
        matches!(self.kind, IndexKind::Unique) || self.options.unique
    }
}

impl Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<String> = self.root.field_names().into_iter().collect();

        if self.is_unique() {
            write!(f, "{}: UNIQUE ({})", self.name, fields.join(", "))
        } else {
            write!(f, "{}: {} ({})", self.name, self.kind, fields.join(", "))
        }
    }
}
