//! Score arithmetic for the Range-Tree.
//!
//! The rank algorithm is identical across score types; only bucket
//! boundary arithmetic differs. A `ScoreKind` tag from the index metadata
//! picks the implementation at the edge, and everything flows through
//! tuple `Element`s so maintainer code stays monomorphic.
//!
//! Floats treat +/-infinity as valid endpoints. NaN is undefined behavior
//! for an index score; callers must not index NaN.

use lamina_core::{error::Error, tuple::Element};
use lamina_schema::node::ScoreKind;
use num_traits::Float;

fn wrong_type(kind: ScoreKind, element: &Element) -> Error {
    Error::internal(format!(
        "score column has wrong type: expected {kind:?}, got {element:?}"
    ))
}

fn int_boundary(value: i64, base: u64, level: u32) -> i64 {
    let span = (base as i64).saturating_pow(level);
    value.div_euclid(span).saturating_mul(span)
}

fn int_next_boundary(value: i64, base: u64, level: u32) -> i64 {
    let span = (base as i64).saturating_pow(level);
    int_boundary(value, base, level).saturating_add(span)
}

fn float_boundary<F: Float>(value: F, base: u64, level: u32) -> F {
    let span = F::from(base).unwrap_or_else(F::max_value).powi(level as i32);
    if value.is_infinite() {
        return value;
    }
    (value / span).floor() * span
}

fn float_next_boundary<F: Float>(value: F, base: u64, level: u32) -> F {
    let span = F::from(base).unwrap_or_else(F::max_value).powi(level as i32);
    if value.is_infinite() {
        return value;
    }
    float_boundary(value, base, level) + span
}

/// Bucket start containing `score` at `level` (bucket span `base^level`).
pub(super) fn bucket_boundary(
    kind: ScoreKind,
    score: &Element,
    base: u64,
    level: u32,
) -> Result<Element, Error> {
    match (kind, score) {
        (ScoreKind::Int32 | ScoreKind::Int64, Element::Int(v)) => {
            Ok(Element::Int(int_boundary(*v, base, level)))
        }
        (ScoreKind::Float32, Element::Float(v)) => {
            Ok(Element::Float(float_boundary(*v, base, level)))
        }
        (ScoreKind::Float64, Element::Double(v)) => {
            Ok(Element::Double(float_boundary(*v, base, level)))
        }
        (kind, element) => Err(wrong_type(kind, element)),
    }
}

/// Start of the bucket after the one containing `score`.
pub(super) fn next_bucket_boundary(
    kind: ScoreKind,
    score: &Element,
    base: u64,
    level: u32,
) -> Result<Element, Error> {
    match (kind, score) {
        (ScoreKind::Int32 | ScoreKind::Int64, Element::Int(v)) => {
            Ok(Element::Int(int_next_boundary(*v, base, level)))
        }
        (ScoreKind::Float32, Element::Float(v)) => {
            Ok(Element::Float(float_next_boundary(*v, base, level)))
        }
        (ScoreKind::Float64, Element::Double(v)) => {
            Ok(Element::Double(float_next_boundary(*v, base, level)))
        }
        (kind, element) => Err(wrong_type(kind, element)),
    }
}

/// Validate a score element against the declared kind.
pub(super) fn check_kind(kind: ScoreKind, score: &Element) -> Result<(), Error> {
    match (kind, score) {
        (ScoreKind::Int32 | ScoreKind::Int64, Element::Int(_))
        | (ScoreKind::Float32, Element::Float(_))
        | (ScoreKind::Float64, Element::Double(_)) => Ok(()),
        (kind, element) => Err(wrong_type(kind, element)),
    }
}
