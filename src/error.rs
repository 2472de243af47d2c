//! Errors reported by the checked construction and verification paths.

/// Integrity failures of a `HashedLookupTable`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError<K> {
    /// A key was supplied twice, either within one batch or across a
    /// build/extend boundary.
    #[error("duplicate key: {key:?}")]
    DuplicateKey { key: K },

    /// An entry is stored outside the bucket its hash selects.
    #[error("key {key:?} stored in bucket {found} but hashes to bucket {expected}")]
    Misplaced {
        key: K,
        found: usize,
        expected: usize,
    },
}

/// Integrity failures of a `DependencyGraph`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError<I> {
    /// An edge points at a node that no record in the version chain declared.
    #[error("node {id:?} is referenced by an edge but was never declared")]
    UnresolvedNode { id: I },

    /// An extension tried to redeclare a node the base already declares.
    #[error("node {id:?} is already declared in the base graph")]
    AlreadyDeclared { id: I },

    /// Two records in the same batch declare the same node.
    #[error("node {id:?} is declared more than once")]
    DuplicateDeclaration { id: I },

    /// The id→index table failed its own integrity check.
    #[error("node index: {0}")]
    Index(TableError<I>),
}

impl<I> From<TableError<I>> for GraphError<I> {
    fn from(e: TableError<I>) -> Self {
        GraphError::Index(e)
    }
}

impl<K: Clone> TableError<&K> {
    /// Converts an error borrowing its key into an owning one.
    pub fn cloned(self) -> TableError<K> {
        match self {
            TableError::DuplicateKey { key } => TableError::DuplicateKey { key: key.clone() },
            TableError::Misplaced {
                key,
                found,
                expected,
            } => TableError::Misplaced {
                key: key.clone(),
                found,
                expected,
            },
        }
    }
}

impl<I: Clone> GraphError<&I> {
    /// Converts an error borrowing its id into an owning one.
    pub fn cloned(self) -> GraphError<I> {
        match self {
            GraphError::UnresolvedNode { id } => GraphError::UnresolvedNode { id: id.clone() },
            GraphError::AlreadyDeclared { id } => GraphError::AlreadyDeclared { id: id.clone() },
            GraphError::DuplicateDeclaration { id } => {
                GraphError::DuplicateDeclaration { id: id.clone() }
            }
            GraphError::Index(e) => GraphError::Index(e.cloned()),
        }
    }
}
