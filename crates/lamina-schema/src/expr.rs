//! Key expressions.
//!
//! A key expression maps a record to an ordered list of tuple columns. The
//! store packs those columns (plus the primary key) into index keys, and
//! splits index keys back apart using `column_count`, so the count contract
//! must equal the length of every successful evaluation.

use lamina_core::{error::Error, tuple::Element};
use serde::Serialize;
use std::collections::BTreeSet;

///
/// FieldValue
///
/// What a record accessor yields for one field. Optional fields that are
/// present-but-empty must yield `Scalar(Element::Null)`, not `None`;
/// `None` means the field does not exist on the record shape at all.
///

pub enum FieldValue<'a> {
    Scalar(Element),
    /// A half-open or closed interval value.
    Interval {
        low: Element,
        high: Element,
        upper_closed: bool,
    },
    Record(&'a dyn FieldAccess),
}

///
/// FieldAccess
///
/// Record-side accessor driven by expression evaluation. Implemented by
/// every record type registered with the engine.
///

pub trait FieldAccess {
    fn field(&self, name: &str) -> Option<FieldValue<'_>>;
}

///
/// KeyExpression
///

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum KeyExpression {
    /// One field, possibly a dotted path into nested records.
    Field { path: String },
    /// Flat concatenation of child expressions.
    Concat(Vec<KeyExpression>),
    /// A single interval-valued field: `[low, high, upper_closed]` columns.
    /// The boundary flag is the last column so range queries stay prefix
    /// scans over `[low, high]`.
    Range { field: String },
    /// Child expression evaluated against a sub-record.
    Nest {
        path: String,
        optional: bool,
        child: Box<KeyExpression>,
    },
}

impl KeyExpression {
    #[must_use]
    pub fn field(path: impl Into<String>) -> Self {
        Self::Field { path: path.into() }
    }

    #[must_use]
    pub fn concat(children: impl IntoIterator<Item = Self>) -> Self {
        Self::Concat(children.into_iter().collect())
    }

    #[must_use]
    pub fn range(field: impl Into<String>) -> Self {
        Self::Range {
            field: field.into(),
        }
    }

    #[must_use]
    pub fn nest(path: impl Into<String>, optional: bool, child: Self) -> Self {
        Self::Nest {
            path: path.into(),
            optional,
            child: Box::new(child),
        }
    }

    /// Number of columns every successful evaluation yields.
    #[must_use]
    pub fn column_count(&self) -> usize {
        match self {
            Self::Field { .. } => 1,
            Self::Concat(children) => children.iter().map(Self::column_count).sum(),
            Self::Range { .. } => 3,
            Self::Nest { child, .. } => child.column_count(),
        }
    }

    /// Dotted paths of every field this expression reads.
    #[must_use]
    pub fn field_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_field_names("", &mut names);
        names
    }

    fn collect_field_names(&self, prefix: &str, names: &mut BTreeSet<String>) {
        let qualify = |name: &str| {
            if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{prefix}.{name}")
            }
        };

        match self {
            Self::Field { path } | Self::Range { field: path } => {
                names.insert(qualify(path));
            }
            Self::Concat(children) => {
                for child in children {
                    child.collect_field_names(prefix, names);
                }
            }
            Self::Nest { path, child, .. } => {
                child.collect_field_names(&qualify(path), names);
            }
        }
    }

    /// Evaluate against a record, yielding exactly `column_count` columns.
    ///
    /// Never fails for records that match the entity shape. A missing
    /// nested record yields null columns when the nest is optional and
    /// `MissingField` otherwise.
    pub fn evaluate(&self, record: &dyn FieldAccess) -> Result<Vec<Element>, Error> {
        let mut columns = Vec::with_capacity(self.column_count());
        self.evaluate_into(record, &mut columns)?;
        Ok(columns)
    }

    fn evaluate_into(
        &self,
        record: &dyn FieldAccess,
        columns: &mut Vec<Element>,
    ) -> Result<(), Error> {
        match self {
            Self::Field { path } => {
                columns.push(resolve_scalar(record, path)?);
                Ok(())
            }
            Self::Concat(children) => {
                for child in children {
                    child.evaluate_into(record, columns)?;
                }
                Ok(())
            }
            Self::Range { field } => match record.field(field) {
                Some(FieldValue::Interval {
                    low,
                    high,
                    upper_closed,
                }) => {
                    columns.push(low);
                    columns.push(high);
                    columns.push(Element::Int(i64::from(upper_closed)));
                    Ok(())
                }
                Some(_) => Err(Error::invalid_argument(format!(
                    "field '{field}' is not interval-valued"
                ))),
                None => Err(Error::MissingField(field.clone())),
            },
            Self::Nest {
                path,
                optional,
                child,
            } => match record.field(path) {
                Some(FieldValue::Record(sub)) => child.evaluate_into(sub, columns),
                Some(FieldValue::Scalar(Element::Null)) | None if *optional => {
                    columns.extend(std::iter::repeat_n(Element::Null, child.column_count()));
                    Ok(())
                }
                Some(_) => Err(Error::invalid_argument(format!(
                    "field '{path}' is not a nested record"
                ))),
                None => Err(Error::MissingField(path.clone())),
            },
        }
    }
}

/// Walk a dotted path down through nested records to a scalar.
fn resolve_scalar(record: &dyn FieldAccess, path: &str) -> Result<Element, Error> {
    let mut current = record;
    let mut segments = path.split('.').peekable();

    while let Some(segment) = segments.next() {
        let last = segments.peek().is_none();
        match current.field(segment) {
            Some(FieldValue::Scalar(element)) if last => return Ok(element),
            Some(FieldValue::Record(sub)) if !last => current = sub,
            Some(FieldValue::Scalar(_)) => {
                return Err(Error::invalid_argument(format!(
                    "path '{path}' descends through scalar field '{segment}'"
                )));
            }
            Some(FieldValue::Record(_)) => {
                return Err(Error::invalid_argument(format!(
                    "path '{path}' ends at nested record '{segment}'"
                )));
            }
            Some(FieldValue::Interval { .. }) => {
                return Err(Error::invalid_argument(format!(
                    "interval field '{segment}' requires a range expression"
                )));
            }
            None => return Err(Error::MissingField(path.to_string())),
        }
    }

    Err(Error::MissingField(path.to_string()))
}
