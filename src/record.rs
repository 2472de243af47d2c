//! Build input for `DependencyGraph`.

/// One node declaration handed to `DependencyGraph::from_records` or
/// `DependencyGraph::extend`.
///
/// Records are read twice: once by reference to discover every id (declared
/// nodes and edge targets), then consumed for their values.
pub trait NodeRecord {
    type Id;
    type Value;
    /// Iterator over the outgoing edge targets, in declaration order.
    type Edges<'a>: Iterator<Item = &'a Self::Id>
    where
        Self: 'a;

    fn id(&self) -> &Self::Id;

    /// Terminal nodes have no outgoing edges; `edges` is not consulted.
    fn is_terminal(&self) -> bool;

    fn edges(&self) -> Self::Edges<'_>;

    fn into_value(self) -> Self::Value;
}

/// Stock `NodeRecord`: an id, a value and an optional edge list.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NodeDecl<I, N> {
    pub id: I,
    pub value: N,
    /// `None` marks a terminal node.
    pub edges: Option<Vec<I>>,
}

impl<I, N> NodeDecl<I, N> {
    pub fn terminal(id: I, value: N) -> Self {
        Self {
            id,
            value,
            edges: None,
        }
    }

    pub fn with_edges<E>(id: I, value: N, edges: E) -> Self
    where
        E: IntoIterator<Item = I>,
    {
        Self {
            id,
            value,
            edges: Some(edges.into_iter().collect()),
        }
    }
}

impl<I, N> NodeRecord for NodeDecl<I, N> {
    type Id = I;
    type Value = N;
    type Edges<'a>
        = core::slice::Iter<'a, I>
    where
        Self: 'a;

    fn id(&self) -> &I {
        &self.id
    }

    fn is_terminal(&self) -> bool {
        self.edges.is_none()
    }

    fn edges(&self) -> Self::Edges<'_> {
        self.edges.as_deref().unwrap_or(&[]).iter()
    }

    fn into_value(self) -> N {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_has_no_edges() {
        let d = NodeDecl::terminal("a", 1);
        assert!(d.is_terminal());
        assert_eq!(d.edges().count(), 0);
        assert_eq!(*d.id(), "a");
        assert_eq!(d.into_value(), 1);
    }

    #[test]
    fn edges_keep_declaration_order() {
        let d = NodeDecl::with_edges("a", (), ["c", "b", "c"]);
        assert!(!d.is_terminal());
        let e: Vec<&str> = d.edges().copied().collect();
        assert_eq!(e, ["c", "b", "c"]);
    }

    #[test]
    fn empty_edge_list_is_not_terminal() {
        let d: NodeDecl<u32, ()> = NodeDecl::with_edges(1, (), []);
        assert!(!d.is_terminal());
        assert_eq!(d.edges().count(), 0);
    }
}
