//! Directory layer facade.
//!
//! Maps logical path arrays to short, dense byte prefixes. Entries carry a
//! layer tag; opening an existing path with a different tag fails fast so
//! the same logical path cannot silently serve two incompatible layouts.

use crate::{
    error::Error,
    kv::Transaction,
    subspace::Subspace,
    tuple::{Element, Tuple},
};

///
/// Directory
///

pub trait Directory {
    /// Open `path`, creating it if absent. Lookup and creation happen
    /// atomically within the caller's transaction.
    fn create_or_open(
        &self,
        tx: &mut dyn Transaction,
        path: &[&str],
        layer: &[u8],
    ) -> Result<Subspace, Error>;
}

///
/// KvDirectory
///
/// Node entries live under `<root>/nodes/<path...>` and hold
/// `pack((layer, prefix))`. A child's prefix extends its parent's, so the
/// byte range of a directory covers its whole subtree and deleting a
/// parent range deletes every descendant. Prefix extensions are allocated
/// from a monotonic counter, so they stay short and dense.
///

pub struct KvDirectory {
    nodes: Subspace,
    counter_key: Vec<u8>,
    content: Subspace,
}

impl KvDirectory {
    #[must_use]
    pub fn new(root: &Subspace) -> Self {
        Self {
            nodes: root.subspace("nodes"),
            counter_key: root.subspace("meta").pack(&Tuple::single("alloc")),
            content: root.subspace("content"),
        }
    }

    fn node_key(&self, path: &[&str]) -> Vec<u8> {
        let tuple: Tuple = path.iter().map(|s| Element::from(*s)).collect();
        self.nodes.pack(&tuple)
    }

    fn allocate(&self, tx: &mut dyn Transaction, parent: &Subspace) -> Result<Subspace, Error> {
        // Read-modify-write on the allocation counter; serializable
        // isolation makes concurrent allocations safe.
        let next = tx
            .get(&self.counter_key, false)?
            .as_deref()
            .map_or(0, crate::kv::decode_counter)
            + 1;
        tx.set(&self.counter_key, &crate::kv::encode_counter(next));

        Ok(parent.subspace(next))
    }

    fn open_one(
        &self,
        tx: &mut dyn Transaction,
        path: &[&str],
        parent: &Subspace,
        layer: &[u8],
        enforce_layer: bool,
    ) -> Result<Subspace, Error> {
        let node_key = self.node_key(path);

        if let Some(raw) = tx.get(&node_key, false)? {
            let node = Tuple::unpack(&raw)?;
            let (stored_layer, prefix) = match (node.get(0), node.get(1)) {
                (Some(Element::Bytes(l)), Some(Element::Bytes(p))) => (l.clone(), p.clone()),
                _ => {
                    return Err(Error::internal(format!(
                        "corrupt directory node for path {path:?}"
                    )));
                }
            };

            if enforce_layer && stored_layer != layer {
                return Err(Error::invalid_argument(format!(
                    "directory layer mismatch at {path:?}: stored {stored_layer:?}, requested {layer:?}"
                )));
            }

            return Ok(Subspace::from_bytes(prefix));
        }

        let subspace = self.allocate(tx, parent)?;
        let node = Tuple::from_elements([
            Element::Bytes(layer.to_vec()),
            Element::Bytes(subspace.bytes().to_vec()),
        ]);
        tx.set(&node_key, &node.pack());

        Ok(subspace)
    }

    /// Remove a directory and everything below it: the content range (a
    /// child's prefix extends its parent's, so one clear covers the whole
    /// subtree) and the node entries, all within the caller's transaction.
    pub fn remove_subtree(&self, tx: &mut dyn Transaction, path: &[&str]) -> Result<(), Error> {
        if path.is_empty() {
            return Err(Error::invalid_argument("directory path is empty"));
        }

        let node_key = self.node_key(path);
        if let Some(raw) = tx.get(&node_key, false)? {
            let node = Tuple::unpack(&raw)?;
            if let Some(Element::Bytes(prefix)) = node.get(1) {
                let (begin, end) = Subspace::from_bytes(prefix.clone()).range();
                tx.clear_range(&begin, &end);
            }
        }

        // Node entries for the path and all longer paths share the packed
        // path prefix.
        let mut node_end = node_key.clone();
        node_end.push(0xff);
        tx.clear_range(&node_key, &node_end);

        Ok(())
    }
}

impl Directory for KvDirectory {
    fn create_or_open(
        &self,
        tx: &mut dyn Transaction,
        path: &[&str],
        layer: &[u8],
    ) -> Result<Subspace, Error> {
        if path.is_empty() {
            return Err(Error::invalid_argument("directory path is empty"));
        }

        // Intermediate nodes are created with the empty layer and accepted
        // with any; only the full path is checked against the requested tag.
        let mut parent = self.content.clone();
        for depth in 1..path.len() {
            parent = self.open_one(tx, &path[..depth], &parent, b"", false)?;
        }

        self.open_one(tx, path, &parent, layer, true)
    }
}
