//! Core substrate for Lamina: the tuple layer, subspaces, the KV driver
//! boundary, the persistent RangeSet, and the record codec.
#![warn(unreachable_pub)]

pub mod codec;
pub mod error;
pub mod kv;
pub mod rangeset;
pub mod subspace;
pub mod tuple;

pub use error::Error;

///
/// Prelude
///
/// Domain vocabulary only; helpers stay one module level down.
///

pub mod prelude {
    pub use crate::{
        error::Error,
        kv::{AtomicKind, Database, RangeOptions, Transaction},
        subspace::Subspace,
        tuple::{Element, Tuple},
    };
}
