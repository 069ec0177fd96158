//! Record stores for Lamina: typed save/fetch/scan over the KV substrate,
//! the index maintainer framework (value, unique, aggregates, rank,
//! vector, spatial, version), the online indexer, and the multi-tenant
//! container.
#![warn(unreachable_pub)]

pub mod batch;
pub mod container;
pub mod index;
pub mod indexer;
pub mod record;
pub mod router;
pub mod state;
pub mod store;

pub use record::Recordable;

///
/// Prelude
///

pub mod prelude {
    pub use crate::{
        batch::BatchConfig,
        container::{Config, Container},
        index::Maintainer,
        indexer::OnlineIndexer,
        record::Recordable,
        router::{DirectoryRouter, DirectoryTemplate, LayerTag, PathComponent},
        state::IndexState,
        store::{RecordStore, ScanOptions},
    };
}
