//! Hilbert-curve cell ids over the unit sphere and bounded region covering.
//!
//! A cell id is a 64-bit integer: face in bits 63..61, interleaved Hilbert
//! position bits below, and a marker bit whose trailing-zero count encodes
//! the level. Cell ids at any mix of levels sort so that an ancestor's
//! `[range_min, range_max]` brackets exactly its descendants, which is what
//! makes them usable as ordered index keys.
#![warn(unreachable_pub)]

mod cell;
mod cover;

pub use cell::{CellId, LatLon, MAX_LEVEL};
pub use cover::{Cap, Region, RegionCoverer};
