//! Directory routing for record types.
//!
//! A record type may declare a directory template whose components are
//! literal path segments or fields substituted from a concrete record.
//! Non-partition layers get a layer-distinguishing suffix segment, so the
//! same logical path opened under two layers can never collide inside the
//! directory layer. Resolution is memoized per (path, layer).

use lamina_core::{
    error::Error,
    kv::{Transaction, directory::{Directory, KvDirectory}},
    subspace::Subspace,
    tuple::Element,
};
use lamina_schema::expr::{FieldAccess, FieldValue};
use std::{collections::HashMap, sync::Mutex};

///
/// PathComponent
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PathComponent {
    /// Literal path segment.
    Path(String),
    /// Segment substituted from a record field at resolution time.
    Field(String),
}

impl PathComponent {
    #[must_use]
    pub fn path(segment: impl Into<String>) -> Self {
        Self::Path(segment.into())
    }

    #[must_use]
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }
}

///
/// LayerTag
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LayerTag {
    Partition,
    Record,
    Custom(String),
}

impl LayerTag {
    #[must_use]
    pub fn tag(&self) -> &[u8] {
        match self {
            Self::Partition => b"partition",
            Self::Record => b"record",
            Self::Custom(tag) => tag.as_bytes(),
        }
    }

    #[must_use]
    pub const fn is_partition(&self) -> bool {
        matches!(self, Self::Partition)
    }
}

///
/// DirectoryTemplate
///

#[derive(Clone, Debug)]
pub struct DirectoryTemplate {
    pub components: Vec<PathComponent>,
    pub layer: LayerTag,
}

impl DirectoryTemplate {
    #[must_use]
    pub fn new(components: Vec<PathComponent>, layer: LayerTag) -> Self {
        Self { components, layer }
    }

    /// Substitute field components from a record into a concrete path.
    fn logical_path(&self, record: &dyn FieldAccess) -> Result<Vec<String>, Error> {
        let mut path = Vec::with_capacity(self.components.len() + 1);

        for component in &self.components {
            match component {
                PathComponent::Path(segment) => path.push(segment.clone()),
                PathComponent::Field(field) => match record.field(field) {
                    Some(FieldValue::Scalar(Element::String(s))) => path.push(s),
                    Some(FieldValue::Scalar(Element::Int(i))) => path.push(i.to_string()),
                    Some(_) => {
                        return Err(Error::invalid_argument(format!(
                            "directory field '{field}' must be a string or integer"
                        )));
                    }
                    None => return Err(Error::MissingField(field.clone())),
                },
            }
        }

        if !self.layer.is_partition() {
            path.push(format!("#{}", String::from_utf8_lossy(self.layer.tag())));
        }

        Ok(path)
    }
}

///
/// DirectoryRouter
///
/// Memoizes resolved subspaces per (path, layer). The lock is held only
/// around map access; directory I/O happens between the lookup and the
/// insert, and losing that race is fine (equal paths resolve equal
/// prefixes).
///

pub struct DirectoryRouter {
    directory: KvDirectory,
    cache: Mutex<HashMap<(Vec<String>, Vec<u8>), Subspace>>,
}

impl DirectoryRouter {
    #[must_use]
    pub fn new(directory: KvDirectory) -> Self {
        Self {
            directory,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn resolve(
        &self,
        tx: &mut dyn Transaction,
        template: &DirectoryTemplate,
        record: &dyn FieldAccess,
    ) -> Result<Subspace, Error> {
        let path = template.logical_path(record)?;
        let cache_key = (path.clone(), template.layer.tag().to_vec());

        if let Some(hit) = self
            .cache
            .lock()
            .expect("router cache poisoned")
            .get(&cache_key)
            .cloned()
        {
            return Ok(hit);
        }

        let segments: Vec<&str> = path.iter().map(String::as_str).collect();
        let subspace = self
            .directory
            .create_or_open(tx, &segments, template.layer.tag())?;

        self.cache
            .lock()
            .expect("router cache poisoned")
            .insert(cache_key, subspace.clone());

        Ok(subspace)
    }

    /// Drop all memoized resolutions (test hook).
    pub fn clear_cache(&self) {
        self.cache.lock().expect("router cache poisoned").clear();
    }

    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.lock().expect("router cache poisoned").len()
    }
}
