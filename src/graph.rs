//! `GraphEquationSystem`: the hyper-graph specialization of an equation
//! system. Each unknown is a node; each equation's right-hand side is
//! derived mechanically by
//! reducing the contributions of the node's ingoing edges through a
//! per-node combiner, rather than being supplied as an arbitrary `Body`.
//! This is the shape most static-analysis callers actually have (a CFG or
//! call graph with a transfer function per edge and a join per node), and
//! it's also what `DFOrdering`/`HierarchicalOrdering` walk directly.

use crate::domain::Magma;
use crate::error::fatal;
use crate::ordering::GraphOrdering;
use crate::system::{Body, EquationSystem, FiniteEquationSystem};
use std::hash::Hash;
use std::rc::Rc;

/// One hyper-edge: reads the values at `sources()` (via `rho`, so it only
/// ever sees what it declared as a source — no incidental extra reads)
/// and produces a contribution to `target()`.
pub trait Edge<U, V> {
    fn sources(&self) -> Vec<U>;
    fn target(&self) -> U;
    fn action(&self, rho: &dyn Fn(&U) -> V) -> V;
}

/// An edge built from a plain closure, for callers who don't need a named
/// edge type (most graph builders; compare `combo`'s insistence on named
/// structs for combos, which callers copy and inspect, versus edges,
/// which are write-only transfer functions).
pub struct FnEdge<U, V, F> {
    pub sources: Vec<U>,
    pub target: U,
    pub action: F,
}

impl<U: Clone, V, F: Fn(&dyn Fn(&U) -> V) -> V> Edge<U, V> for FnEdge<U, V, F> {
    fn sources(&self) -> Vec<U> {
        self.sources.clone()
    }
    fn target(&self) -> U {
        self.target.clone()
    }
    fn action(&self, rho: &dyn Fn(&U) -> V) -> V {
        (self.action)(rho)
    }
}

/// The graph-shaped equation system capability: edges, sources, target,
/// an edge action, and a per-node combiner. `combiner` is the per-node magma
/// combining however many ingoing edges a node has (usually the domain's
/// `upper_bound`, via `crate::domain::UpperBoundMagma`); nodes with zero
/// ingoing edges are expected to be in `input_unknowns()` instead.
pub trait GraphEquationSystem<U, V> {
    fn nodes(&self) -> Vec<U>;
    fn edges(&self) -> Vec<Rc<dyn Edge<U, V>>>;
    fn ingoing(&self, u: &U) -> Vec<Rc<dyn Edge<U, V>>>;
    fn combiner(&self, u: &U) -> Rc<dyn Magma<V>>;
    fn input_unknowns(&self) -> Vec<U>;
}

struct GraphBody<U, V> {
    target: U,
    edges: Vec<Rc<dyn Edge<U, V>>>,
    combiner: Rc<dyn Magma<V>>,
}

impl<U: std::fmt::Debug, V> Body<U, V> for GraphBody<U, V> {
    fn apply(&self, _u: &U, rho: &dyn Fn(&U) -> V) -> V {
        let mut iter = self.edges.iter();
        let first = iter.next().unwrap_or_else(|| {
            fatal::graph_contract_violation(
                "GraphBody::apply",
                &format!("node {:?} has no ingoing edges and is not an input unknown", self.target),
            )
        });
        let mut acc = first.action(rho);
        for edge in iter {
            let contribution = edge.action(rho);
            acc = self.combiner.combine(&acc, &contribution);
        }
        acc
    }
}

/// Adapts a `GraphEquationSystem` into a `FiniteEquationSystem` by
/// deriving each node's `Body` mechanically, via a reduce over its
/// ingoing edges. This is the only way client code gets
/// an `EquationSystem` out of a graph: there's no separate "write the body
/// yourself" escape hatch, since the whole point of the graph
/// specialization is that the body follows from the edges.
#[derive(Debug, Clone, Copy)]
pub struct GraphSystemAdapter<G> {
    pub graph: G,
}

impl<G> GraphSystemAdapter<G> {
    pub fn new(graph: G) -> Self {
        GraphSystemAdapter { graph }
    }
}

impl<G, U, V> EquationSystem<U, V> for GraphSystemAdapter<G>
where
    G: GraphEquationSystem<U, V>,
    U: Eq + Hash + Clone + std::fmt::Debug + 'static,
    V: 'static,
{
    fn body(&self, u: &U) -> Rc<dyn Body<U, V>> {
        Rc::new(GraphBody {
            target: u.clone(),
            edges: self.graph.ingoing(u),
            combiner: self.graph.combiner(u),
        })
    }

    fn input_unknowns(&self) -> Vec<U> {
        self.graph.input_unknowns()
    }
}

impl<G, U, V> FiniteEquationSystem<U, V> for GraphSystemAdapter<G>
where
    G: GraphEquationSystem<U, V>,
    U: Eq + Hash + Clone + std::fmt::Debug + 'static,
    V: 'static,
{
    fn unknowns(&self) -> Vec<U> {
        self.graph.nodes()
    }

    fn influence(&self, u: &U) -> Vec<U> {
        self.graph
            .edges()
            .into_iter()
            .filter(|e| e.sources().iter().any(|s| s == u))
            .map(|e| e.target())
            .collect()
    }
}

/// Lets `DFOrdering`/`HierarchicalOrdering` walk a graph system directly:
/// an unknown's "successors" for ordering purposes are exactly
/// `influence(u)` (the forward direction an edge's contribution flows,
/// from source to target), and the walk's roots are the input unknowns.
impl<G, U, V> GraphOrdering<U> for GraphSystemAdapter<G>
where
    G: GraphEquationSystem<U, V>,
    U: Eq + Hash + Clone + std::fmt::Debug + 'static,
    V: 'static,
{
    fn successors(&self, u: &U) -> Vec<U> {
        FiniteEquationSystem::influence(self, u)
    }

    fn roots(&self) -> Vec<U> {
        self.graph.input_unknowns()
    }
}

/// Computes the set of loop heads a graph system's `DFOrdering` back edges
/// target — exactly the unknowns `WithLocalizedCombos` should place a
/// combo at. Supplementary convenience so a `driver.rs` caller doesn't
/// have to re-derive this from `DFOrdering` by hand.
pub fn loop_heads<G, U, V>(adapter: &GraphSystemAdapter<G>) -> hashbrown::HashSet<U>
where
    G: GraphEquationSystem<U, V>,
    U: Eq + Hash + Clone + std::fmt::Debug + 'static,
    V: 'static,
{
    let df = crate::ordering::DFOrdering::build(adapter);
    df.back_edges().map(|(_, to)| to.clone()).collect()
}

/// The single-pass replacement for the two-phase widen-then-narrow chain,
/// applied directly at a node's ingoing edges instead of at every unknown:
/// evaluate every ingoing edge, combine the contributions with the node's
/// own combiner, and widen if any contributing edge is a back edge whose
/// contribution isn't already `<= rho(x)`, narrow if the combined result
/// is strictly below `rho(x)`, or pass the combined result through
/// unchanged otherwise. A node with no ingoing edges returns `rho(x)`
/// unchanged, same as `GraphBody` bypasses combos entirely in that case.
struct LocalizedWarrowingBody<U, V> {
    edges: Vec<Rc<dyn Edge<U, V>>>,
    combiner: Rc<dyn Magma<V>>,
    back_edge_sources: hashbrown::HashSet<U>,
    widen: Rc<dyn crate::combo::Combo<V>>,
    narrow: Rc<dyn crate::combo::Combo<V>>,
}

impl<U, V> Body<U, V> for LocalizedWarrowingBody<U, V>
where
    U: Eq + Hash,
    V: crate::domain::OrderedDomain,
{
    fn apply(&self, u: &U, rho: &dyn Fn(&U) -> V) -> V {
        let old = rho(u);
        if self.edges.is_empty() {
            return old;
        }

        let mut needs_widen = false;
        let mut iter = self.edges.iter();
        let first = iter.next().expect("checked non-empty above");
        let mut acc = first.action(rho);
        if self.back_edge_sources.iter().any(|s| first.sources().contains(s)) && !acc.leq(&old) {
            needs_widen = true;
        }
        for edge in iter {
            let contribution = edge.action(rho);
            if self.back_edge_sources.iter().any(|s| edge.sources().contains(s)) && !contribution.leq(&old) {
                needs_widen = true;
            }
            acc = self.combiner.combine(&acc, &contribution);
        }

        if needs_widen {
            self.widen.apply(&old, &acc)
        } else if acc.lt(&old) {
            self.narrow.apply(&old, &acc)
        } else {
            acc
        }
    }
}

/// Wraps a `GraphEquationSystem` so every node's body is
/// `LocalizedWarrowingBody` instead of the plain reduce-over-ingoing-edges
/// derivation — the graph+localized+warrowing special case, a single-pass
/// driver path that replaces the two separate ascending/descending
/// wrappings. Back edges are computed once via `DFOrdering` at
/// construction.
pub struct WithLocalizedWarrowing<G, U, V> {
    graph: G,
    back_edges: hashbrown::HashSet<(U, U)>,
    widen: Rc<dyn crate::combo::Combo<V>>,
    narrow: Rc<dyn crate::combo::Combo<V>>,
}

impl<G, U, V> WithLocalizedWarrowing<G, U, V>
where
    G: GraphEquationSystem<U, V>,
    U: Eq + Hash + Clone + std::fmt::Debug + 'static,
    V: 'static,
{
    pub fn new(graph: G, widen: Rc<dyn crate::combo::Combo<V>>, narrow: Rc<dyn crate::combo::Combo<V>>) -> Self {
        let adapter = GraphSystemAdapter::new(graph);
        let df = crate::ordering::DFOrdering::build(&adapter);
        let back_edges = df.back_edges().cloned().collect();
        WithLocalizedWarrowing {
            graph: adapter.graph,
            back_edges,
            widen,
            narrow,
        }
    }
}

impl<G, U, V> EquationSystem<U, V> for WithLocalizedWarrowing<G, U, V>
where
    G: GraphEquationSystem<U, V>,
    U: Eq + Hash + Clone + std::fmt::Debug + 'static,
    V: crate::domain::OrderedDomain + 'static,
{
    fn body(&self, u: &U) -> Rc<dyn Body<U, V>> {
        let edges = self.graph.ingoing(u);
        let back_edge_sources: hashbrown::HashSet<U> = edges
            .iter()
            .flat_map(|e| e.sources())
            .filter(|s| self.back_edges.contains(&(s.clone(), u.clone())))
            .collect();
        Rc::new(LocalizedWarrowingBody {
            edges,
            combiner: self.graph.combiner(u),
            back_edge_sources,
            widen: self.widen.clone(),
            narrow: self.narrow.clone(),
        })
    }

    fn input_unknowns(&self) -> Vec<U> {
        self.graph.input_unknowns()
    }
}

impl<G, U, V> FiniteEquationSystem<U, V> for WithLocalizedWarrowing<G, U, V>
where
    G: GraphEquationSystem<U, V>,
    U: Eq + Hash + Clone + std::fmt::Debug + 'static,
    V: crate::domain::OrderedDomain + 'static,
{
    fn unknowns(&self) -> Vec<U> {
        self.graph.nodes()
    }

    fn influence(&self, u: &U) -> Vec<U> {
        self.graph
            .edges()
            .into_iter()
            .filter(|e| e.sources().iter().any(|s| s == u))
            .map(|e| e.target())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UpperBoundMagma;

    /// u0 -> u1 -> u2, single-source edges, upper_bound combiner.
    struct Chain;

    impl GraphEquationSystem<u32, i32> for Chain {
        fn nodes(&self) -> Vec<u32> {
            vec![0, 1, 2]
        }
        fn edges(&self) -> Vec<Rc<dyn Edge<u32, i32>>> {
            vec![
                Rc::new(FnEdge {
                    sources: vec![0],
                    target: 1,
                    action: |rho: &dyn Fn(&u32) -> i32| rho(&0) + 1,
                }),
                Rc::new(FnEdge {
                    sources: vec![1],
                    target: 2,
                    action: |rho: &dyn Fn(&u32) -> i32| rho(&1) + 1,
                }),
            ]
        }
        fn ingoing(&self, u: &u32) -> Vec<Rc<dyn Edge<u32, i32>>> {
            self.edges().into_iter().filter(|e| e.target() == *u).collect()
        }
        fn combiner(&self, _u: &u32) -> Rc<dyn Magma<i32>> {
            Rc::new(UpperBoundMagma)
        }
        fn input_unknowns(&self) -> Vec<u32> {
            vec![0]
        }
    }

    #[test]
    fn derived_body_reduces_ingoing_edges() {
        let sys = GraphSystemAdapter::new(Chain);
        let rho = |u: &u32| match u {
            0 => 10,
            1 => 11,
            _ => 0,
        };
        assert_eq!(sys.body(&1).apply(&1, &rho), 11);
        assert_eq!(sys.body(&2).apply(&2, &rho), 12);
    }

    #[test]
    fn influence_is_forward_edge_direction() {
        let sys = GraphSystemAdapter::new(Chain);
        assert_eq!(FiniteEquationSystem::influence(&sys, &0), vec![1]);
        assert_eq!(FiniteEquationSystem::influence(&sys, &1), vec![2]);
        assert!(FiniteEquationSystem::influence(&sys, &2).is_empty());
    }

    #[test]
    fn loop_heads_is_empty_on_a_dag() {
        let sys = GraphSystemAdapter::new(Chain);
        assert!(loop_heads(&sys).is_empty());
    }

    /// 0 -> 1 -> 2 -> 1: a self-loop back onto 1, capped contribution via
    /// the edge action itself (so convergence doesn't depend on the widen
    /// operator actually being unbounded). Widening here just jumps
    /// straight to the cap; narrowing is identity, so the localized
    /// warrowing body should behave exactly like the uncombo'd reduction
    /// once the cap is reached.
    struct SelfLoop;

    impl GraphEquationSystem<u32, i32> for SelfLoop {
        fn nodes(&self) -> Vec<u32> {
            vec![0, 1, 2]
        }
        fn edges(&self) -> Vec<Rc<dyn Edge<u32, i32>>> {
            vec![
                Rc::new(FnEdge { sources: vec![0], target: 1, action: |rho: &dyn Fn(&u32) -> i32| rho(&0) }),
                Rc::new(FnEdge { sources: vec![1], target: 2, action: |rho: &dyn Fn(&u32) -> i32| (rho(&1) + 1).min(10) }),
                Rc::new(FnEdge { sources: vec![2], target: 1, action: |rho: &dyn Fn(&u32) -> i32| rho(&2) }),
            ]
        }
        fn ingoing(&self, u: &u32) -> Vec<Rc<dyn Edge<u32, i32>>> {
            self.edges().into_iter().filter(|e| e.target() == *u).collect()
        }
        fn combiner(&self, _u: &u32) -> Rc<dyn Magma<i32>> {
            Rc::new(UpperBoundMagma)
        }
        fn input_unknowns(&self) -> Vec<u32> {
            vec![0]
        }
    }

    #[test]
    fn localized_warrowing_converges_on_a_self_loop() {
        use crate::combo::UpperBound;
        let widen: Rc<dyn crate::combo::Combo<i32>> = Rc::new(UpperBound);
        let narrow: Rc<dyn crate::combo::Combo<i32>> = Rc::new(UpperBound);
        let sys = WithLocalizedWarrowing::new(SelfLoop, widen, narrow);

        let initial = crate::assignment::FnAssignment::new(|u: &u32| if *u == 0 { Some(0) } else { None });
        let values = crate::solver::worklist::solve_finite(&sys, &initial);
        assert_eq!(values[&0], 0);
        assert_eq!(values[&1], 10);
        assert_eq!(values[&2], 10);
    }

    #[test]
    fn localized_warrowing_bypasses_combo_on_empty_ingoing() {
        let widen: Rc<dyn crate::combo::Combo<i32>> = Rc::new(crate::combo::UpperBound);
        let narrow: Rc<dyn crate::combo::Combo<i32>> = Rc::new(crate::combo::UpperBound);
        let sys = WithLocalizedWarrowing::new(Chain, widen, narrow);
        let rho = |u: &u32| if *u == 0 { 42 } else { 0 };
        assert_eq!(sys.body(&0).apply(&0, &rho), 42); // node 0 has no ingoing edges
    }
}
