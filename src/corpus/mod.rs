//! Suffix-tree-derived corpus model
//!
//! A [`Corpus`] is rebuilt from a [`CorpusTransfer`] record at the start of
//! every clustering invocation and dropped at its end. It holds the set of
//! [`Type`]s being clustered and the suffix-tree [`Node`]s addressed by node
//! number.
//!
//! # Node numbering
//!
//! External node numbers exclude the root (number 1), so the first internal
//! node is [`FIRST_NODE_NUMBER`]. A node number `n` lives in slot
//! `n - FIRST_NODE_NUMBER`, and the same mapping is used for insertion and
//! lookup. Numbers outside `FIRST_NODE_NUMBER..FIRST_NODE_NUMBER + numberOfNodes`
//! are rejected in both directions.
//!
//! # Invariants
//!
//! - `numberOfNodes` is fixed before the first insertion and never changes
//!   afterwards; the node array length always equals it.
//! - Type iteration order is ascending by type id.

pub mod transfer;
pub mod types;

pub use transfer::{CodecError, CorpusTransfer, JsonTransferCodec, TransferCodec};
#[cfg(test)]
pub use transfer::MockTransferCodec;
pub use types::{Node, Type};

use std::collections::BTreeSet;
use thiserror::Error;

/// Node number of the suffix-tree root, which is never stored.
pub const ROOT_NODE_NUMBER: u32 = 1;

/// Smallest valid external node number.
pub const FIRST_NODE_NUMBER: u32 = ROOT_NODE_NUMBER + 1;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CorpusError {
    #[error("node counts must be set before nodes are inserted")]
    CountsNotSet,

    #[error("node counts cannot change after {inserted} nodes were inserted")]
    CountsAlreadyFixed { inserted: usize },

    #[error("node number {number} is outside the valid range {first}..{end}")]
    NodeOutOfRange { number: u32, first: u32, end: u64 },

    #[error("node number {0} was inserted twice")]
    DuplicateNode(u32),

    #[error("node number {0} is missing")]
    MissingNode(u32),

    #[error("declared {declared} nodes but the record holds {actual}")]
    NodeCountMismatch { declared: usize, actual: usize },

    #[error("cannot allocate {requested} node slots")]
    NodeArrayTooLarge { requested: usize },

    #[error("declared {declared} types but the type set holds {actual}")]
    TypeCountMismatch { declared: usize, actual: usize },
}

impl CorpusError {
    /// Whether this is an addressing error, as opposed to an incomplete or
    /// inconsistent record.
    pub fn is_index_error(&self) -> bool {
        matches!(
            self,
            CorpusError::CountsNotSet
                | CorpusError::CountsAlreadyFixed { .. }
                | CorpusError::NodeOutOfRange { .. }
                | CorpusError::DuplicateNode(_)
        )
    }
}

/// The reconstructed corpus a clustering module operates on.
#[derive(Debug, Default)]
pub struct Corpus {
    number_of_types: usize,
    number_of_nodes: Option<usize>,
    types: BTreeSet<Type>,
    nodes: Vec<Option<Node>>,
    inserted: usize,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a corpus from a transfer record.
    ///
    /// Counts are set first, then every node is inserted. The record must
    /// hold exactly `numberOfNodes` distinct in-range nodes and exactly
    /// `numberOfTypes` distinct types.
    pub fn from_transfer(record: CorpusTransfer) -> Result<Self, CorpusError> {
        if record.nodes.len() != record.number_of_nodes {
            return Err(CorpusError::NodeCountMismatch {
                declared: record.number_of_nodes,
                actual: record.nodes.len(),
            });
        }
        let mut corpus = Corpus::new();
        corpus.set_counts(record.number_of_types, record.number_of_nodes)?;
        for node in record.nodes {
            corpus.insert_node(node)?;
        }
        for t in record.types {
            corpus.add_type(t);
        }

        if corpus.types.len() != corpus.number_of_types {
            return Err(CorpusError::TypeCountMismatch {
                declared: corpus.number_of_types,
                actual: corpus.types.len(),
            });
        }

        tracing::debug!(
            "Reconstructed corpus: {} types, {} nodes",
            corpus.number_of_types,
            corpus.nodes.len()
        );
        Ok(corpus)
    }

    /// Flatten back into a transfer record (nodes in slot order).
    pub fn to_transfer(&self) -> CorpusTransfer {
        CorpusTransfer {
            number_of_nodes: self.number_of_nodes(),
            number_of_types: self.number_of_types,
            nodes: self.nodes().cloned().collect(),
            types: self.types.iter().cloned().collect(),
        }
    }

    /// Fix the type and node counts and allocate the node array.
    pub fn set_counts(
        &mut self,
        number_of_types: usize,
        number_of_nodes: usize,
    ) -> Result<(), CorpusError> {
        if self.inserted > 0 {
            return Err(CorpusError::CountsAlreadyFixed {
                inserted: self.inserted,
            });
        }
        let mut nodes = Vec::new();
        nodes
            .try_reserve_exact(number_of_nodes)
            .map_err(|_| CorpusError::NodeArrayTooLarge {
                requested: number_of_nodes,
            })?;
        nodes.resize_with(number_of_nodes, || None);

        self.number_of_types = number_of_types;
        self.number_of_nodes = Some(number_of_nodes);
        self.nodes = nodes;
        Ok(())
    }

    pub fn number_of_types(&self) -> usize {
        self.number_of_types
    }

    pub fn number_of_nodes(&self) -> usize {
        self.number_of_nodes.unwrap_or(0)
    }

    /// Map an external node number to its array slot.
    fn slot(&self, number: u32) -> Result<usize, CorpusError> {
        let count = self.number_of_nodes.ok_or(CorpusError::CountsNotSet)?;
        number
            .checked_sub(FIRST_NODE_NUMBER)
            .map(|s| s as usize)
            .filter(|&s| s < count)
            .ok_or(CorpusError::NodeOutOfRange {
                number,
                first: FIRST_NODE_NUMBER,
                end: FIRST_NODE_NUMBER as u64 + count as u64,
            })
    }

    pub fn insert_node(&mut self, node: Node) -> Result<(), CorpusError> {
        let slot = self.slot(node.node_number)?;
        if self.nodes[slot].is_some() {
            return Err(CorpusError::DuplicateNode(node.node_number));
        }
        self.nodes[slot] = Some(node);
        self.inserted += 1;
        Ok(())
    }

    /// Look up a node by its external number.
    pub fn node(&self, number: u32) -> Result<&Node, CorpusError> {
        let slot = self.slot(number)?;
        self.nodes[slot]
            .as_ref()
            .ok_or(CorpusError::MissingNode(number))
    }

    /// Inserted nodes in slot order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().flatten()
    }

    pub fn is_complete(&self) -> bool {
        self.number_of_nodes.is_some() && self.inserted == self.nodes.len()
    }

    /// Add a type; returns `false` if a type with the same id was present.
    pub fn add_type(&mut self, t: Type) -> bool {
        self.types.insert(t)
    }

    pub fn set_types(&mut self, types: BTreeSet<Type>) {
        self.types = types;
    }

    pub fn types(&self) -> &BTreeSet<Type> {
        &self.types
    }

    /// Types as an ordered list (ascending id).
    pub fn type_list(&self) -> Vec<Type> {
        self.types.iter().cloned().collect()
    }
}
