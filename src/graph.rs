//! DependencyGraph: directed graph over a `HashedLookupTable` of dense ids.
//!
//! Caller-facing ids are mapped once to `InternalId`s; edges are stored as
//! runs of `InternalId` in append-only `Rc<[InternalId]>` segments, one
//! segment per graph version, so traversal never hashes. A run's length is
//! not stored: the collaborator that built the graph knows how many
//! neighbors each node has.
//!
//! Node slots are per version (an extension copies them), which is what
//! lets `set_terminal` mutate in place without affecting other versions.

use crate::config::TableConfig;
use crate::error::GraphError;
use crate::lookup_table::HashedLookupTable;
use crate::record::NodeRecord;
use crate::verify;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use hashbrown::HashMap;
use std::collections::hash_map::RandomState;
use std::rc::Rc;

/// Dense index of a node slot, distinct from the caller-facing id.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct InternalId(u32);

impl InternalId {
    #[track_caller]
    fn from_index(i: usize) -> Self {
        match u32::try_from(i) {
            Ok(v) => InternalId(v),
            Err(_) => verify::contract_violation(format_args!(
                "DependencyGraph cannot hold more than {} nodes",
                u32::MAX
            )),
        }
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct EdgeRun {
    segment: usize,
    offset: usize,
}

#[derive(Clone, Debug)]
enum NodeSlot<N> {
    // Referenced as an edge target, not declared yet.
    Placeholder,
    Terminal(N),
    EdgeRange(N, EdgeRun),
}

pub struct DependencyGraph<I, N, S = RandomState> {
    index: HashedLookupTable<I, InternalId, S>,
    nodes: Vec<NodeSlot<N>>,
    edges: Vec<Rc<[InternalId]>>,
    depth: usize,
}

/// Handle to one node slot.
///
/// A handle stays valid for the graph it came from and for every graph
/// derived from it by `extend`, since internal ids never move. Using it
/// with an unrelated graph is a logic error; a handle whose id is out of
/// range for the graph (for example one minted by a derived version and
/// used on its base) panics with a contract-violation message.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeHandle(InternalId);

impl NodeHandle {
    pub fn internal_id(self) -> InternalId {
        self.0
    }

    /// Panics if the node is a placeholder (never declared).
    #[track_caller]
    pub fn value<I, N, S>(self, g: &DependencyGraph<I, N, S>) -> &N {
        g.value_of(self.0)
    }

    /// Panics if the node is a placeholder (never declared).
    #[track_caller]
    pub fn value_mut<I, N, S>(self, g: &mut DependencyGraph<I, N, S>) -> &mut N {
        g.value_mut_of(self.0)
    }

    pub fn try_value<I, N, S>(self, g: &DependencyGraph<I, N, S>) -> Option<&N> {
        match g.slot(self.0) {
            NodeSlot::Terminal(v) | NodeSlot::EdgeRange(v, _) => Some(v),
            NodeSlot::Placeholder => None,
        }
    }

    pub fn is_terminal<I, N, S>(self, g: &DependencyGraph<I, N, S>) -> bool {
        matches!(g.slot(self.0), NodeSlot::Terminal(_))
    }

    pub fn is_declared<I, N, S>(self, g: &DependencyGraph<I, N, S>) -> bool {
        !matches!(g.slot(self.0), NodeSlot::Placeholder)
    }

    /// Drops the node's edges, making it terminal. O(1) and idempotent.
    /// The edge run is not reclaimed. Panics on a placeholder.
    #[track_caller]
    pub fn set_terminal<I, N, S>(self, g: &mut DependencyGraph<I, N, S>) {
        g.set_terminal_at(self.0)
    }

    /// Cursor at the start of the node's edge run.
    ///
    /// Panics on a terminal node or a placeholder.
    #[track_caller]
    pub fn neighbors<I, N, S>(self, g: &DependencyGraph<I, N, S>) -> EdgeCursor<'_> {
        g.edge_cursor(self.0)
    }
}

/// Forward-only cursor over a node's edge run.
///
/// The cursor does not know where the run ends; reading past it yields the
/// next node's edges. Reading past the end of the version's edge storage
/// panics.
#[derive(Copy, Clone, Debug)]
pub struct EdgeCursor<'g> {
    rest: &'g [InternalId],
}

impl<'g> EdgeCursor<'g> {
    /// The neighbor at the current position.
    #[track_caller]
    pub fn get(&self) -> InternalId {
        match self.rest.first() {
            Some(&id) => id,
            None => past_end(),
        }
    }

    #[track_caller]
    pub fn advance(&mut self) {
        match self.rest.get(1..) {
            Some(rest) => self.rest = rest,
            None => past_end(),
        }
    }

    #[track_caller]
    pub fn node(&self) -> NodeHandle {
        NodeHandle(self.get())
    }

    /// Same as advancing `i` times and then calling `node`.
    #[track_caller]
    pub fn nth_node(&self, i: usize) -> NodeHandle {
        match self.rest.get(i) {
            Some(&id) => NodeHandle(id),
            None => past_end(),
        }
    }

    /// The next `n` neighbors, in declaration order.
    #[track_caller]
    pub fn take_nodes(self, n: usize) -> impl Iterator<Item = NodeHandle> + 'g {
        match self.rest.get(..n) {
            Some(run) => run.iter().map(|&id| NodeHandle(id)),
            None => past_end(),
        }
    }
}

#[cold]
#[track_caller]
fn past_end() -> ! {
    verify::contract_violation(format_args!("edge cursor moved past the end of edge storage"))
}

impl<I, N> DependencyGraph<I, N>
where
    I: Eq + Hash + Clone,
{
    /// Bulk-builds a graph with the default table config and a random hasher.
    pub fn from_records<R, It>(records: It) -> Self
    where
        R: NodeRecord<Id = I, Value = N>,
        It: IntoIterator<Item = R>,
    {
        Self::from_records_with(records, TableConfig::default(), RandomState::new())
    }
}

impl<I, N, S> DependencyGraph<I, N, S>
where
    I: Eq + Hash + Clone,
    S: BuildHasher,
{
    /// Bulk-builds a graph.
    ///
    /// Every id seen as a declared node or as an edge target gets a slot;
    /// targets without a record of their own become placeholders. Declaring
    /// a node twice is a contract violation, detected only in verification
    /// mode.
    pub fn from_records_with<R, It>(records: It, config: TableConfig, hasher: S) -> Self
    where
        R: NodeRecord<Id = I, Value = N>,
        It: IntoIterator<Item = R>,
    {
        let records: Vec<R> = records.into_iter().collect();
        if verify::ENABLED && verify::first_duplicate(records.iter().map(|r| r.id())).is_some() {
            verify::contract_violation(format_args!(
                "node declared more than once in DependencyGraph bulk build"
            ));
        }

        // Pass 1: dense ids in first-seen order.
        let mut ids: HashMap<I, InternalId> = HashMap::with_capacity(records.len());
        for r in &records {
            assign_id(&mut ids, r.id(), 0, |_| false);
            if !r.is_terminal() {
                for e in r.edges() {
                    assign_id(&mut ids, e, 0, |_| false);
                }
            }
        }
        let num_nodes = ids.len();
        let index = HashedLookupTable::from_records_with(ids, config, hasher);

        // Pass 2: slots and edge runs.
        let mut nodes: Vec<NodeSlot<N>> = (0..num_nodes).map(|_| NodeSlot::Placeholder).collect();
        let mut edges: Vec<InternalId> = Vec::new();
        let declared = records.len();
        for r in records {
            let id = *index.at(r.id());
            nodes[id.index()] = make_slot(r, &index, &mut edges, 0);
        }

        tracing::debug!(
            nodes = num_nodes,
            declared,
            placeholders = num_nodes.saturating_sub(declared),
            edges = edges.len(),
            "built dependency graph"
        );

        Self {
            index,
            nodes,
            edges: vec![edges.into()],
            depth: 1,
        }
    }

    /// Handle for a known id (declared or placeholder).
    ///
    /// Panics with a contract-violation message if the id was never seen.
    #[track_caller]
    pub fn at<Q>(&self, id: &Q) -> NodeHandle
    where
        I: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        match self.index.find(id) {
            Some(&iid) => NodeHandle(iid),
            None => verify::contract_violation(format_args!(
                "DependencyGraph::at called with an unknown node id"
            )),
        }
    }

    /// Unchecked variant of [`at`](Self::at).
    ///
    /// # Safety
    /// The id must be known to the graph. An unknown id is undefined
    /// behavior in release builds.
    pub unsafe fn at_unchecked<Q>(&self, id: &Q) -> NodeHandle
    where
        I: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        // SAFETY: forwarded caller guarantee.
        NodeHandle(unsafe { *self.index.at_unchecked(id) })
    }

    /// `None` only for ids this graph has never seen. Placeholders yield a
    /// handle whose `is_declared` is false.
    pub fn find<Q>(&self, id: &Q) -> Option<NodeHandle>
    where
        I: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.index.find(id).map(|&iid| NodeHandle(iid))
    }

    /// Looks up a node that must exist and makes it terminal.
    #[track_caller]
    pub fn change_node_to_terminal<Q>(&mut self, id: &Q)
    where
        I: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let h = self.at(id);
        h.set_terminal(self);
    }

    /// Fails if an edge points at a node that no record in the version
    /// chain declared. Reports the lowest such internal id.
    pub fn check_fully_constructed(&self) -> Result<(), GraphError<I>> {
        let unresolved = self
            .index
            .iter()
            .filter(|(_, iid)| matches!(self.nodes[iid.index()], NodeSlot::Placeholder))
            .min_by_key(|(_, iid)| **iid);
        match unresolved {
            Some((id, _)) => Err(GraphError::UnresolvedNode { id: id.clone() }),
            None => Ok(()),
        }
    }

    /// Full integrity check: the id table's own invariants, then
    /// `check_fully_constructed`.
    pub fn verify(&self) -> Result<(), GraphError<I>> {
        self.index.verify()?;
        self.check_fully_constructed()
    }

    fn check_extension<'r, R>(&self, records: &'r [R]) -> Result<(), GraphError<&'r I>>
    where
        R: NodeRecord<Id = I>,
    {
        if let Some(id) = verify::first_duplicate(records.iter().map(|r| r.id())) {
            return Err(GraphError::DuplicateDeclaration { id });
        }
        for r in records {
            if let Some(&iid) = self.index.find(r.id()) {
                if !matches!(self.nodes[iid.index()], NodeSlot::Placeholder) {
                    return Err(GraphError::AlreadyDeclared { id: r.id() });
                }
            }
        }
        Ok(())
    }
}

impl<I, N, S> DependencyGraph<I, N, S>
where
    I: Eq + Hash + Clone,
    N: Clone,
    S: BuildHasher + Clone,
{
    /// Creates a new version of `base` with additional node records.
    ///
    /// New records may resolve placeholders of `base` but must not
    /// redeclare nodes `base` already declares (checked only in
    /// verification mode). Node slots are copied; edge storage and the id
    /// table are shared with `base`, which stays valid and unchanged.
    pub fn extend<R, It>(base: &Self, records: It) -> Self
    where
        R: NodeRecord<Id = I, Value = N>,
        It: IntoIterator<Item = R>,
    {
        let records: Vec<R> = records.into_iter().collect();
        if verify::ENABLED {
            if let Err(e) = base.check_extension(&records) {
                let what = match e {
                    GraphError::DuplicateDeclaration { .. } => "a node declared twice in the batch",
                    _ => "a node the base graph already declares",
                };
                verify::contract_violation(format_args!(
                    "DependencyGraph::extend called with {}",
                    what
                ));
            }
        }
        Self::extend_unchecked(base, records)
    }

    /// Checked variant of [`extend`](Self::extend).
    pub fn try_extend<R, It>(base: &Self, records: It) -> Result<Self, GraphError<I>>
    where
        R: NodeRecord<Id = I, Value = N>,
        It: IntoIterator<Item = R>,
    {
        let records: Vec<R> = records.into_iter().collect();
        if let Err(e) = base.check_extension(&records) {
            return Err(e.cloned());
        }
        Ok(Self::extend_unchecked(base, records))
    }

    fn extend_unchecked<R>(base: &Self, records: Vec<R>) -> Self
    where
        R: NodeRecord<Id = I, Value = N>,
    {
        let base_len = base.nodes.len();

        let mut fresh: HashMap<I, InternalId> = HashMap::new();
        let known = |id: &I| base.index.contains_key(id);
        for r in &records {
            assign_id(&mut fresh, r.id(), base_len, known);
            if !r.is_terminal() {
                for e in r.edges() {
                    assign_id(&mut fresh, e, base_len, known);
                }
            }
        }
        let new_ids = fresh.len();
        let index = HashedLookupTable::extend(&base.index, fresh);

        let mut nodes = base.nodes.clone();
        nodes.extend((0..new_ids).map(|_| NodeSlot::Placeholder));

        let segment = base.edges.len();
        let mut edges: Vec<InternalId> = Vec::new();
        let added = records.len();
        let mut resolved = 0usize;
        for r in records {
            let id = *index.at(r.id());
            if id.index() < base_len {
                resolved += 1;
            }
            nodes[id.index()] = make_slot(r, &index, &mut edges, segment);
        }

        tracing::debug!(
            added,
            resolved_placeholders = resolved,
            new_ids,
            edges = edges.len(),
            depth = base.depth + 1,
            "extended dependency graph"
        );

        let mut segments = base.edges.clone();
        segments.push(edges.into());
        Self {
            index,
            nodes,
            edges: segments,
            depth: base.depth + 1,
        }
    }
}

impl<I, N, S> DependencyGraph<I, N, S> {
    /// Number of node slots, placeholders included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Edge ids stored across the whole version chain, including runs
    /// orphaned by `set_terminal`.
    pub fn num_edges(&self) -> usize {
        self.edges.iter().map(|s| s.len()).sum()
    }

    pub fn num_placeholders(&self) -> usize {
        self.nodes
            .iter()
            .filter(|s| matches!(s, NodeSlot::Placeholder))
            .count()
    }

    /// 1 for a bulk build, plus one per extension.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Handles of every slot, in internal id order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        (0..self.nodes.len()).map(|i| NodeHandle(InternalId::from_index(i)))
    }

    #[track_caller]
    fn slot(&self, id: InternalId) -> &NodeSlot<N> {
        match self.nodes.get(id.index()) {
            Some(slot) => slot,
            None => foreign_handle(id),
        }
    }

    #[track_caller]
    fn slot_mut(&mut self, id: InternalId) -> &mut NodeSlot<N> {
        match self.nodes.get_mut(id.index()) {
            Some(slot) => slot,
            None => foreign_handle(id),
        }
    }

    #[track_caller]
    fn value_of(&self, id: InternalId) -> &N {
        match self.slot(id) {
            NodeSlot::Terminal(v) | NodeSlot::EdgeRange(v, _) => v,
            NodeSlot::Placeholder => undeclared(),
        }
    }

    #[track_caller]
    fn value_mut_of(&mut self, id: InternalId) -> &mut N {
        match self.slot_mut(id) {
            NodeSlot::Terminal(v) | NodeSlot::EdgeRange(v, _) => v,
            NodeSlot::Placeholder => undeclared(),
        }
    }

    #[track_caller]
    fn set_terminal_at(&mut self, id: InternalId) {
        let slot = self.slot_mut(id);
        *slot = match core::mem::replace(slot, NodeSlot::Placeholder) {
            NodeSlot::Terminal(v) | NodeSlot::EdgeRange(v, _) => NodeSlot::Terminal(v),
            NodeSlot::Placeholder => undeclared(),
        };
        tracing::trace!(node = id.index(), "node frozen to terminal");
    }

    #[track_caller]
    fn edge_cursor(&self, id: InternalId) -> EdgeCursor<'_> {
        match self.slot(id) {
            NodeSlot::EdgeRange(_, run) => EdgeCursor {
                rest: &self.edges[run.segment][run.offset..],
            },
            NodeSlot::Terminal(_) => verify::contract_violation(format_args!(
                "neighbors requested on a terminal node"
            )),
            NodeSlot::Placeholder => undeclared(),
        }
    }
}

#[cold]
#[track_caller]
fn foreign_handle(id: InternalId) -> ! {
    verify::contract_violation(format_args!(
        "node handle {} does not belong to this graph or its ancestors",
        id.index()
    ))
}

#[cold]
#[track_caller]
fn undeclared() -> ! {
    verify::contract_violation(format_args!(
        "node was referenced by an edge but never declared"
    ))
}

// Gives `id` the next dense index unless it already has one here or
// `known` says an older version owns it.
fn assign_id<I, F>(ids: &mut HashMap<I, InternalId>, id: &I, base_len: usize, known: F)
where
    I: Eq + Hash + Clone,
    F: Fn(&I) -> bool,
{
    if ids.contains_key(id) || known(id) {
        return;
    }
    let next = InternalId::from_index(base_len + ids.len());
    ids.insert(id.clone(), next);
}

// Consumes a record into its slot, appending its edge run to `edges`.
fn make_slot<R, I, S>(
    r: R,
    index: &HashedLookupTable<I, InternalId, S>,
    edges: &mut Vec<InternalId>,
    segment: usize,
) -> NodeSlot<R::Value>
where
    R: NodeRecord<Id = I>,
    I: Eq + Hash,
    S: BuildHasher,
{
    if r.is_terminal() {
        return NodeSlot::Terminal(r.into_value());
    }
    let offset = edges.len();
    edges.extend(r.edges().map(|e| *index.at(e)));
    NodeSlot::EdgeRange(r.into_value(), EdgeRun { segment, offset })
}

impl<I, N, S> fmt::Debug for DependencyGraph<I, N, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("len", &self.len())
            .field("num_edges", &self.num_edges())
            .field("num_placeholders", &self.num_placeholders())
            .field("depth", &self.depth)
            .finish()
    }
}
