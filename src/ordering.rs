//! Node orderings over an equation system's unknowns: a plain depth-first
//! numbering with back-edge classification (`DFOrdering`), and Bourdoncle's
//! hierarchical ordering of strongly connected components
//! (`HierarchicalOrdering`). Both are built from a `GraphOrdering`, the
//! minimal "what are this unknown's successors" capability solvers and the
//! localized-combo transformation need; neither module needs to know
//! anything about equations or values.

use std::collections::HashMap as StdHashMap;
use std::hash::Hash;

/// The successor relation a graph-shaped equation system exposes for
/// ordering purposes: `successors(u)` are the unknowns `u`'s equation
/// reads from (the influence/dependency direction), and `roots()`
/// seeds the walk (typically the system's declared input unknowns).
pub trait GraphOrdering<U> {
    fn successors(&self, u: &U) -> Vec<U>;
    fn roots(&self) -> Vec<U>;
}

/// Classifies every edge visited by a single depth-first walk from
/// `roots()`: tree edges extend the walk, back edges close a cycle onto an
/// ancestor still on the stack, forward/cross edges are everything else.
/// Solvers use `is_back_edge` to decide where to place localized combos:
/// applied at back edges identified by this ordering.
pub struct DFOrdering<U> {
    back_edges: std::collections::HashSet<(U, U)>,
    preorder: StdHashMap<U, usize>,
}

impl<U: Eq + Hash + Clone> DFOrdering<U> {
    pub fn build<G: GraphOrdering<U>>(graph: &G) -> Self {
        let mut visited: std::collections::HashSet<U> = std::collections::HashSet::new();
        let mut on_stack: std::collections::HashSet<U> = std::collections::HashSet::new();
        let mut back_edges = std::collections::HashSet::new();
        let mut preorder = StdHashMap::new();
        let mut counter = 0usize;

        fn visit<U: Eq + Hash + Clone, G: GraphOrdering<U>>(
            u: &U,
            graph: &G,
            visited: &mut std::collections::HashSet<U>,
            on_stack: &mut std::collections::HashSet<U>,
            back_edges: &mut std::collections::HashSet<(U, U)>,
            preorder: &mut StdHashMap<U, usize>,
            counter: &mut usize,
        ) {
            if visited.contains(u) {
                return;
            }
            visited.insert(u.clone());
            on_stack.insert(u.clone());
            preorder.insert(u.clone(), *counter);
            *counter += 1;
            for succ in graph.successors(u) {
                if on_stack.contains(&succ) {
                    back_edges.insert((u.clone(), succ.clone()));
                } else if !visited.contains(&succ) {
                    visit(&succ, graph, visited, on_stack, back_edges, preorder, counter);
                }
            }
            on_stack.remove(u);
        }

        for root in graph.roots() {
            visit(
                &root,
                graph,
                &mut visited,
                &mut on_stack,
                &mut back_edges,
                &mut preorder,
                &mut counter,
            );
        }

        DFOrdering {
            back_edges,
            preorder,
        }
    }

    pub fn is_back_edge(&self, from: &U, to: &U) -> bool {
        self.back_edges.contains(&(from.clone(), to.clone()))
    }

    /// Depth-first preorder position, for callers that just want "visited
    /// before" rather than the full hierarchical structure.
    pub fn position(&self, u: &U) -> Option<usize> {
        self.preorder.get(u).copied()
    }

    pub fn back_edges(&self) -> impl Iterator<Item = &(U, U)> {
        self.back_edges.iter()
    }
}

/// One entry of a hierarchical ordering: either a plain unknown, or a
/// nested strongly connected component headed by `head`, whose `body` is
/// itself a hierarchical ordering (a weak topological ordering, in the
/// sense of Bourdoncle 1993). The head is the component's sole entry
/// point: every back edge within the component targets it.
#[derive(Debug, Clone)]
pub enum Component<U> {
    Vertex(U),
    Nested { head: U, body: Vec<Component<U>> },
}

/// The flattened, bracketed view of a `Component` tree: `Left(h)` opens a
/// nested component headed by `h`, `Right(h)` closes it, and plain unknowns
/// appear as themselves in between. `is_head`/`lteq` are computed once at
/// construction and are then O(1)/O(log n) to query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bracket<U> {
    Left(U),
    Elem(U),
    Right(U),
}

pub struct HierarchicalOrdering<U> {
    top: Vec<Component<U>>,
    brackets: Vec<Bracket<U>>,
    heads: std::collections::HashSet<U>,
    position: StdHashMap<U, usize>,
}

impl<U: Eq + Hash + Clone> HierarchicalOrdering<U> {
    /// Bourdoncle's algorithm: a depth-first walk that detects, for each
    /// vertex, the smallest DFS number reachable via a back edge from its
    /// subtree. When that minimum equals the vertex's own number it roots
    /// a (possibly trivial) component; anything still on the stack between
    /// the root and the vertex currently closing is that component's body,
    /// and gets its DFS numbers reset to 0 so it can be revisited as part
    /// of a fresh walk that peels the component's internal structure off
    /// layer by layer.
    pub fn build<G: GraphOrdering<U>>(graph: &G) -> Self {
        struct State<U: Eq + Hash + Clone> {
            dfn: StdHashMap<U, i64>,
            num: i64,
            stack: Vec<U>,
        }

        fn visit<U: Eq + Hash + Clone, G: GraphOrdering<U>>(
            vertex: &U,
            graph: &G,
            st: &mut State<U>,
            partition: &mut Vec<Component<U>>,
        ) -> i64 {
            st.stack.push(vertex.clone());
            st.num += 1;
            st.dfn.insert(vertex.clone(), st.num);
            let mut head = st.num;
            let mut loop_head = false;

            for succ in graph.successors(vertex) {
                let succ_dfn = st.dfn.get(&succ).copied().unwrap_or(0);
                let min = if succ_dfn == 0 {
                    visit(&succ, graph, st, partition)
                } else {
                    succ_dfn
                };
                if min <= head {
                    head = min;
                    loop_head = true;
                }
            }

            if head == *st.dfn.get(vertex).unwrap() {
                st.dfn.insert(vertex.clone(), i64::MAX);
                let mut element = st.stack.pop().unwrap();
                if loop_head {
                    while element != *vertex {
                        st.dfn.insert(element.clone(), 0);
                        element = st.stack.pop().unwrap();
                    }
                    component(vertex, graph, st, partition);
                } else {
                    partition.push(Component::Vertex(vertex.clone()));
                }
            }
            head
        }

        // Re-walks `vertex`'s successors from scratch once its loop body
        // has been unwound and reset to dfn==0 above, so each member gets
        // its own nested-component detection; the resulting elements
        // become the component's body, headed by `vertex` itself.
        fn component<U: Eq + Hash + Clone, G: GraphOrdering<U>>(
            vertex: &U,
            graph: &G,
            st: &mut State<U>,
            partition: &mut Vec<Component<U>>,
        ) {
            let mut body = Vec::new();
            for succ in graph.successors(vertex) {
                if st.dfn.get(&succ).copied().unwrap_or(0) == 0 {
                    visit(&succ, graph, st, &mut body);
                }
            }
            partition.push(Component::Nested {
                head: vertex.clone(),
                body,
            });
        }

        let mut st = State {
            dfn: StdHashMap::new(),
            num: 0,
            stack: Vec::new(),
        };
        let mut top = Vec::new();
        for root in graph.roots() {
            if st.dfn.get(&root).copied().unwrap_or(0) == 0 {
                visit(&root, graph, &mut st, &mut top);
            }
        }
        // `visit`/`component` append each vertex or nested component only
        // once it closes, i.e. in post-order; reversing every partition
        // (recursively, since the same applies inside each nested body)
        // restores the forward order callers expect.
        reverse_components(&mut top);

        let mut brackets = Vec::new();
        let mut heads = std::collections::HashSet::new();
        let mut position = StdHashMap::new();
        flatten(&top, &mut brackets, &mut heads, &mut position);

        HierarchicalOrdering {
            top,
            brackets,
            heads,
            position,
        }
    }

    pub fn components(&self) -> &[Component<U>] {
        &self.top
    }

    pub fn brackets(&self) -> &[Bracket<U>] {
        &self.brackets
    }

    /// True iff `u` roots a nested strongly connected component: solvers
    /// use this to decide whether to re-stabilize `u` before moving past
    /// it (Kleene-style restart) or where to place a localized combo.
    pub fn is_head(&self, u: &U) -> bool {
        self.heads.contains(u)
    }

    /// The ordering's total order, consistent with nesting: a component's
    /// head precedes every element of its own body, and otherwise
    /// elements compare by their position in the flattened walk.
    pub fn lteq(&self, a: &U, b: &U) -> bool {
        match (self.position.get(a), self.position.get(b)) {
            (Some(pa), Some(pb)) => pa <= pb,
            _ => false,
        }
    }
}

fn reverse_components<U: Eq + Hash + Clone>(components: &mut Vec<Component<U>>) {
    components.reverse();
    for c in components.iter_mut() {
        if let Component::Nested { body, .. } = c {
            reverse_components(body);
        }
    }
}

fn flatten<U: Eq + Hash + Clone>(
    components: &[Component<U>],
    brackets: &mut Vec<Bracket<U>>,
    heads: &mut std::collections::HashSet<U>,
    position: &mut StdHashMap<U, usize>,
) {
    for c in components {
        match c {
            Component::Vertex(u) => {
                position.entry(u.clone()).or_insert(brackets.len());
                brackets.push(Bracket::Elem(u.clone()));
            }
            Component::Nested { head, body } => {
                heads.insert(head.clone());
                position.entry(head.clone()).or_insert(brackets.len());
                brackets.push(Bracket::Left(head.clone()));
                brackets.push(Bracket::Elem(head.clone()));
                flatten(body, brackets, heads, position);
                brackets.push(Bracket::Right(head.clone()));
            }
        }
    }
}
