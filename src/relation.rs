//! `Relation<A, B>`: `A -> Set[B]` with insertion order preserved, and
//! `with_diagonal`.
//!
//! Graph equation systems use relations for dependency/influence edges;
//! insertion order matters because it seeds the deterministic iteration
//! order solvers rely on. Built on `indexmap` rather than `hashbrown`,
//! drawing the usual split between "needs a stable iteration order" data
//! and "pure lookup, order doesn't matter" data.

use indexmap::{IndexMap, IndexSet};
use std::hash::Hash;

/// A finite relation `A -> Set[B]`, iterated in the order entries (and,
/// within an entry, targets) were first inserted.
#[derive(Debug, Clone)]
pub struct Relation<A, B> {
    edges: IndexMap<A, IndexSet<B>>,
}

impl<A: Eq + Hash + Clone, B: Eq + Hash + Clone> Relation<A, B> {
    pub fn new() -> Self {
        Relation {
            edges: IndexMap::new(),
        }
    }

    /// Build from an iterable of `(a, b)` pairs, preserving the order
    /// pairs are yielded in.
    pub fn from_pairs<I: IntoIterator<Item = (A, B)>>(pairs: I) -> Self {
        let mut rel = Relation::new();
        for (a, b) in pairs {
            rel.insert(a, b);
        }
        rel
    }

    /// Build from a map `A -> Set[B]` directly.
    pub fn from_map(map: IndexMap<A, IndexSet<B>>) -> Self {
        Relation { edges: map }
    }

    pub fn insert(&mut self, a: A, b: B) {
        self.edges.entry(a).or_insert_with(IndexSet::new).insert(b);
    }

    /// Ensure `a` appears as a key, even with no targets yet. Needed so a
    /// node with no outgoing edges still shows up in `domain()`.
    pub fn ensure_key(&mut self, a: A) {
        self.edges.entry(a).or_insert_with(IndexSet::new);
    }

    pub fn get(&self, a: &A) -> Option<&IndexSet<B>> {
        self.edges.get(a)
    }

    pub fn contains(&self, a: &A, b: &B) -> bool {
        self.edges.get(a).map_or(false, |s| s.contains(b))
    }

    /// All keys with at least one declared entry, in insertion order.
    pub fn domain(&self) -> impl Iterator<Item = &A> {
        self.edges.keys()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&A, &IndexSet<B>)> {
        self.edges.iter()
    }
}

impl<A: Eq + Hash + Clone> Relation<A, A> {
    /// `this ∪ {(a, a) | a ∈ domain}`: every
    /// node gets itself as an additional target, used to make `leq` or
    /// self-dependency checks total over a node set without special-casing
    /// "no self edge" elsewhere.
    pub fn with_diagonal(&self) -> Relation<A, A>
    where
        A: Eq + Hash,
    {
        let mut out = self.clone();
        let keys: Vec<A> = out.edges.keys().cloned().collect();
        for a in keys {
            out.insert(a.clone(), a);
        }
        out
    }
}

impl<A: Eq + Hash + Clone, B: Eq + Hash + Clone> Default for Relation<A, B> {
    fn default() -> Self {
        Relation::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_pairs_preserves_insertion_order() {
        let rel = Relation::from_pairs(vec![(1, "b"), (1, "a"), (2, "c")]);
        let domain: Vec<_> = rel.domain().copied().collect();
        assert_eq!(domain, vec![1, 2]);
        let targets: Vec<_> = rel.get(&1).unwrap().iter().copied().collect();
        assert_eq!(targets, vec!["b", "a"]);
    }

    #[test]
    fn with_diagonal_adds_self_edges() {
        let rel = Relation::from_pairs(vec![(1, 2), (2, 3)]);
        let diag = rel.with_diagonal();
        assert!(diag.contains(&1, &1));
        assert!(diag.contains(&2, &2));
        assert!(diag.contains(&1, &2));
        // node 3 never appeared as a source, so with_diagonal cannot add
        // it (it isn't in the domain to begin with).
        assert!(!diag.contains(&3, &3));
    }

    #[test]
    fn ensure_key_keeps_sourceless_nodes_in_domain() {
        let mut rel: Relation<i32, i32> = Relation::new();
        rel.ensure_key(5);
        rel.insert(1, 2);
        let domain: Vec<_> = rel.domain().copied().collect();
        assert_eq!(domain, vec![5, 1]);
    }
}
