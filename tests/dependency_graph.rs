// DependencyGraph integration suite.
//
// Each test documents what behavior is being verified and which
// invariants are assumed or asserted. The core invariants exercised:
// - Shape: declared nodes keep their value and terminal flag; edge runs
//   resolve to neighbors in declaration order.
// - Placeholders: ids only seen as edge targets get a slot that a later
//   extension may resolve; verification fails until then.
// - Versioning: extensions never change the base; handles keep their
//   identity across versions of the same chain.
use semistatic::{DependencyGraph, GraphError, NodeDecl, NodeRecord, TableConfig};
use std::collections::hash_map::RandomState;

type Decl = NodeDecl<&'static str, usize>;

// A binding in a dependency-injection container: the value carries the
// number of dependencies so a caller can walk exactly that many edges.
#[derive(Clone, Debug, PartialEq)]
struct Binding {
    type_name: &'static str,
    deps: Vec<&'static str>,
    constructed: bool,
}

impl Binding {
    fn new(type_name: &'static str, deps: &[&'static str]) -> Self {
        Self {
            type_name,
            deps: deps.to_vec(),
            constructed: false,
        }
    }

    fn instance(type_name: &'static str) -> Self {
        Self {
            type_name,
            deps: Vec::new(),
            constructed: true,
        }
    }
}

impl NodeRecord for Binding {
    type Id = &'static str;
    type Value = Binding;
    type Edges<'a>
        = std::slice::Iter<'a, &'static str>
    where
        Self: 'a;

    fn id(&self) -> &&'static str {
        &self.type_name
    }

    fn is_terminal(&self) -> bool {
        self.constructed
    }

    fn edges(&self) -> Self::Edges<'_> {
        self.deps.iter()
    }

    fn into_value(self) -> Binding {
        self
    }
}

// Test: bulk build of a node with two terminal dependencies.
// Assumes: all three nodes declared together.
// Verifies: A is non-terminal with a 2-entry run resolving to B then C;
// B and C are terminal; verification passes.
#[test]
fn two_terminal_dependencies() {
    let g = DependencyGraph::from_records(vec![
        Decl::with_edges("A", 2, ["B", "C"]),
        Decl::terminal("B", 0),
        Decl::terminal("C", 0),
    ]);
    let a = g.at("A");
    assert!(!a.is_terminal(&g));
    let n = *a.value(&g);
    let deps: Vec<_> = a.neighbors(&g).take_nodes(n).collect();
    assert_eq!(deps, [g.at("B"), g.at("C")]);
    assert!(g.at("B").is_terminal(&g));
    assert!(g.at("C").is_terminal(&g));
    assert_eq!(g.len(), 3);
    assert!(g.verify().is_ok());

    // The unchecked accessor resolves the same handles.
    for id in ["A", "B", "C"] {
        assert_eq!(unsafe { g.at_unchecked(id) }, g.at(id));
    }
}

// Test: resolving a placeholder by extension.
// Assumes: base declares only A -> B.
// Verifies: base fails verification naming B; the extension passes and
// A's single neighbor is the same B identity, now terminal.
#[test]
fn placeholder_resolved_by_extension() {
    let base = DependencyGraph::from_records(vec![Decl::with_edges("A", 1, ["B"])]);
    assert_eq!(base.verify(), Err(GraphError::UnresolvedNode { id: "B" }));
    let b_before = base.at("B");

    let ext = DependencyGraph::extend(&base, vec![Decl::terminal("B", 0)]);
    assert!(ext.verify().is_ok());
    let b = ext.at("A").neighbors(&ext).node();
    assert_eq!(b, ext.at("B"));
    assert_eq!(b, b_before);
    assert!(b.is_terminal(&ext));

    // Base unchanged.
    assert!(!b_before.is_declared(&base));
    assert!(base.check_fully_constructed().is_err());
    assert_eq!(base.depth(), 1);
    assert_eq!(ext.depth(), 2);
}

// Test: a custom NodeRecord type.
// Assumes: constructed instances are terminal, the rest carry deps.
// Verifies: the dependency count in the value drives traversal.
#[test]
fn custom_record_drives_traversal() {
    let g = DependencyGraph::from_records(vec![
        Binding::new("App", &["Logger", "Db"]),
        Binding::new("Db", &["Logger"]),
        Binding::instance("Logger"),
    ]);
    let app = g.at("App");
    let deps = app.value(&g).deps.len();
    let names: Vec<&str> = app
        .neighbors(&g)
        .take_nodes(deps)
        .map(|h| h.value(&g).type_name)
        .collect();
    assert_eq!(names, ["Logger", "Db"]);

    let db = g.at("Db");
    assert_eq!(db.neighbors(&g).node(), g.at("Logger"));
    assert!(g.at("Logger").is_terminal(&g));
}

// Test: depth-first construction order.
// Assumes: acyclic graph, neighbor counts carried in values.
// Verifies: dependencies are visited before dependents; marking each
// visited node terminal stops repeat visits.
#[test]
fn construct_in_dependency_order() {
    let mut g = DependencyGraph::from_records(vec![
        Decl::with_edges("App", 2, ["Service", "Config"]),
        Decl::with_edges("Service", 2, ["Config", "Pool"]),
        Decl::with_edges("Pool", 1, ["Config"]),
        Decl::terminal("Config", 0),
    ]);

    fn visit(
        g: &mut DependencyGraph<&'static str, usize>,
        h: semistatic::NodeHandle,
        names: &[&'static str],
        order: &mut Vec<&'static str>,
    ) {
        if h.is_terminal(g) {
            return;
        }
        let n = *h.value(g);
        let deps: Vec<_> = h.neighbors(g).take_nodes(n).collect();
        for d in deps {
            visit(g, d, names, order);
        }
        h.set_terminal(g);
        order.push(names[h.internal_id().index()]);
    }

    let names: Vec<&'static str> = {
        let mut v = vec![""; g.len()];
        for id in ["App", "Service", "Config", "Pool"] {
            v[g.at(id).internal_id().index()] = id;
        }
        v
    };
    let mut order = Vec::new();
    let app = g.at("App");
    visit(&mut g, app, &names, &mut order);
    assert_eq!(order, ["Pool", "Service", "App"]);
    assert!(g.nodes().all(|h| h.is_terminal(&g)));
}

// Test: placeholders and find.
// Assumes: C only appears as an edge target.
// Verifies: find(C) is Some but undeclared; find of an unseen id is None;
// num_placeholders counts it.
#[test]
fn find_distinguishes_unknown_from_placeholder() {
    let g = DependencyGraph::from_records(vec![Decl::with_edges("A", 1, ["C"])]);
    let c = g.find("C").expect("edge target has a slot");
    assert!(!c.is_declared(&g));
    assert_eq!(c.try_value(&g), None);
    assert!(g.find("Z").is_none());
    assert_eq!(g.num_placeholders(), 1);
}

// Test: a chain of extensions that each resolve one placeholder and add
// another.
// Assumes: every extension declares only new or placeholder ids.
// Verifies: handles stay valid along the chain; only the last version
// is fully constructed.
#[test]
fn chain_of_extensions() {
    let mut versions =
        vec![DependencyGraph::from_records(vec![Decl::with_edges("n0", 1, ["n1"])])];
    for i in 1..6 {
        let id: &'static str = Box::leak(format!("n{i}").into_boxed_str());
        let next: &'static str = Box::leak(format!("n{}", i + 1).into_boxed_str());
        let rec = if i == 5 {
            Decl::terminal(id, 0)
        } else {
            Decl::with_edges(id, 1, [next])
        };
        let g = DependencyGraph::extend(versions.last().expect("non-empty"), vec![rec]);
        versions.push(g);
    }
    let last = versions.last().expect("non-empty");
    assert!(last.verify().is_ok());
    assert_eq!(last.depth(), 6);
    for v in &versions[..5] {
        assert!(v.verify().is_err());
    }

    // Walk n0 -> n5 in the last version.
    let mut h = last.at("n0");
    let mut hops = 0;
    while !h.is_terminal(last) {
        h = h.neighbors(last).node();
        hops += 1;
    }
    assert_eq!(hops, 5);
    assert_eq!(h, last.at("n5"));
    assert_eq!(h.internal_id().index(), 5);
    // n1 was a placeholder in the base; its handle still names the same node.
    assert_eq!(versions[0].at("n1"), last.at("n1"));
}

// Test: checked extension.
// Assumes: base declares A and B.
// Verifies: redeclaring either is rejected with the offending id; a
// placeholder may be declared.
#[test]
fn try_extend_checks_declarations() {
    let base = DependencyGraph::from_records(vec![
        Decl::with_edges("A", 2, ["B", "P"]),
        Decl::terminal("B", 0),
    ]);
    let err = DependencyGraph::try_extend(&base, vec![Decl::terminal("A", 0)])
        .expect_err("A is declared");
    assert_eq!(err, GraphError::AlreadyDeclared { id: "A" });
    assert_eq!(err.to_string(), "node \"A\" is already declared in the base graph");

    let ok = DependencyGraph::try_extend(&base, vec![Decl::terminal("P", 9)])
        .expect("P is a placeholder");
    assert_eq!(*ok.at("P").value(&ok), 9);
}

// Test: extension in verification mode.
// Assumes: debug build.
// Verifies: redeclaration through the unchecked `extend` panics.
#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "already declares")]
fn extend_redeclaration_panics_in_debug() {
    let base = DependencyGraph::from_records(vec![Decl::terminal("A", 0)]);
    let _ = DependencyGraph::extend(&base, vec![Decl::terminal("A", 1)]);
}

// Test: freezing a node that was built with an edge list.
// Assumes: A declares an edge to B.
// Verifies: after change_node_to_terminal, A is terminal and neighbors panics.
#[test]
#[should_panic(expected = "terminal node")]
fn neighbors_after_freeze_panics() {
    let mut g = DependencyGraph::from_records(vec![
        Decl::with_edges("A", 1, ["B"]),
        Decl::terminal("B", 0),
    ]);
    g.change_node_to_terminal("A");
    let a = g.at("A");
    assert!(a.is_terminal(&g));
    let _ = a.neighbors(&g);
}

// Test: a handle from a derived version used on its base.
// Assumes: C is declared only by the extension.
// Verifies: the base rejects it with a contract-violation message.
#[test]
#[should_panic(expected = "contract violation")]
fn derived_handle_rejected_by_base() {
    let base = DependencyGraph::from_records(vec![Decl::terminal("A", 0)]);
    let ext = DependencyGraph::extend(&base, vec![Decl::terminal("C", 0)]);
    let _ = ext.at("C").try_value(&base);
}

// Test: set_terminal on one version.
// Assumes: two versions share edge storage.
// Verifies: freezing in the derived version leaves the base's run intact.
#[test]
fn set_terminal_does_not_leak_to_base() {
    let base = DependencyGraph::from_records(vec![
        Decl::with_edges("A", 1, ["B"]),
        Decl::terminal("B", 0),
    ]);
    let mut ext = DependencyGraph::extend(&base, vec![Decl::terminal("C", 0)]);
    ext.change_node_to_terminal("A");
    assert!(ext.at("A").is_terminal(&ext));
    assert!(!base.at("A").is_terminal(&base));
    assert_eq!(base.at("A").neighbors(&base).node(), base.at("B"));
}

// Test: custom table config and hasher.
// Assumes: a deterministic BuildHasher.
// Verifies: the graph builds and looks up through from_records_with.
#[test]
fn from_records_with_config() {
    let g: DependencyGraph<&str, usize, RandomState> = DependencyGraph::from_records_with(
        vec![Decl::with_edges("A", 1, ["B"]), Decl::terminal("B", 0)],
        TableConfig::new().with_extra_bits(3),
        RandomState::new(),
    );
    assert_eq!(g.at("A").neighbors(&g).node(), g.at("B"));
    assert_eq!(g.num_edges(), 1);
}

// Test: cursor bounds.
// Assumes: the last run is the end of edge storage.
// Verifies: reading past the end panics instead of reading garbage.
#[test]
#[should_panic(expected = "past the end")]
fn cursor_past_end_panics() {
    let g = DependencyGraph::from_records(vec![Decl::with_edges("A", 1, ["B"])]);
    let mut c = g.at("A").neighbors(&g);
    c.advance();
    let _ = c.get();
}
