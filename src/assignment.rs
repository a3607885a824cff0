//! Assignments: `U -> V`, partial or total, mutable or immutable.
//!
//! A small mutable overlay layered on top of an immutable base: a
//! `MutableAssignment` is a `hashbrown::HashMap` overlay queried first,
//! falling back to an immutable base assignment (a constant or a plain
//! function) when the overlay has nothing for that unknown.

use crate::error::fatal;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

/// A (possibly partial) read-only view `U -> V`.
pub trait Assignment<U, V> {
    fn is_defined_at(&self, u: &U) -> bool;

    /// Panics via [`fatal::empty_assignment_access`] if `u` is not in the
    /// domain; this is treated as a programmer error (querying a slot the
    /// system never declared), not a recoverable one.
    fn apply(&self, u: &U) -> V;

    fn try_apply(&self, u: &U) -> Option<V> {
        if self.is_defined_at(u) {
            Some(self.apply(u))
        } else {
            None
        }
    }
}

/// The same value at every unknown; `is_defined_at` is always true.
#[derive(Debug, Clone, Copy)]
pub struct ConstAssignment<V>(pub V);

impl<U, V: Clone> Assignment<U, V> for ConstAssignment<V> {
    fn is_defined_at(&self, _u: &U) -> bool {
        true
    }
    fn apply(&self, _u: &U) -> V {
        self.0.clone()
    }
}

/// Undefined everywhere; looking anything up panics.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyAssignment;

impl<U: std::fmt::Debug, V> Assignment<U, V> for EmptyAssignment {
    fn is_defined_at(&self, _u: &U) -> bool {
        false
    }
    fn apply(&self, u: &U) -> V {
        fatal::empty_assignment_access("EmptyAssignment::apply", u)
    }
}

/// An `Assignment` built from a plain function; used for pure/generated
/// input assignments (`FiniteEquationSystem::input_unknowns`, or a caller
/// supplying a closed-form initial value).
pub struct FnAssignment<U, V, F> {
    f: F,
    _marker: std::marker::PhantomData<(U, V)>,
}

impl<U, V, F: Fn(&U) -> Option<V>> FnAssignment<U, V, F> {
    pub fn new(f: F) -> Self {
        FnAssignment {
            f,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<U: std::fmt::Debug, V, F: Fn(&U) -> Option<V>> Assignment<U, V> for FnAssignment<U, V, F> {
    fn is_defined_at(&self, u: &U) -> bool {
        (self.f)(u).is_some()
    }
    fn apply(&self, u: &U) -> V {
        (self.f)(u).unwrap_or_else(|| fatal::empty_assignment_access("FnAssignment::apply", u))
    }
}

/// A mutable `HashMap` overlay on top of an immutable fallback: a partial
/// map layered over a fallback immutable assignment. Every solver's
/// working state is one of these: reads check the overlay first, then the
/// base; writes only ever touch the overlay.
pub struct MutableAssignment<U, V, Base> {
    overlay: hashbrown::HashMap<U, V>,
    base: Base,
}

impl<U: Eq + Hash + Clone, V: Clone, Base: Assignment<U, V>> MutableAssignment<U, V, Base> {
    pub fn new(base: Base) -> Self {
        MutableAssignment {
            overlay: hashbrown::HashMap::new(),
            base,
        }
    }

    pub fn with_capacity(base: Base, capacity: usize) -> Self {
        MutableAssignment {
            overlay: hashbrown::HashMap::with_capacity(capacity),
            base,
        }
    }

    /// Write `v` at `u`, returning the previous overlay value if any (the
    /// base is never consulted or mutated: it's a read-only fallback).
    pub fn update(&mut self, u: U, v: V) -> Option<V> {
        self.overlay.insert(u, v)
    }

    pub fn overlay_get(&self, u: &U) -> Option<&V> {
        self.overlay.get(u)
    }

    pub fn overlay_contains(&self, u: &U) -> bool {
        self.overlay.contains_key(u)
    }

    pub fn overlay_len(&self) -> usize {
        self.overlay.len()
    }

    pub fn overlay_iter(&self) -> impl Iterator<Item = (&U, &V)> {
        self.overlay.iter()
    }

    /// The unknowns this assignment currently has an overlay value for
    /// (the base fallback's domain isn't enumerable in general, so this
    /// only ever reports what's actually been written).
    pub fn unknowns(&self) -> impl Iterator<Item = &U> {
        self.overlay.keys()
    }

    pub fn base(&self) -> &Base {
        &self.base
    }
}

impl<U: Eq + Hash + Clone, V: Clone, Base: Assignment<U, V>> Assignment<U, V>
    for MutableAssignment<U, V, Base>
{
    fn is_defined_at(&self, u: &U) -> bool {
        self.overlay.contains_key(u) || self.base.is_defined_at(u)
    }

    fn apply(&self, u: &U) -> V {
        match self.overlay.get(u) {
            Some(v) => v.clone(),
            None => self.base.apply(u),
        }
    }
}

/// Builds fresh mutable assignments, parameterized over the immutable
/// base they layer on. Solvers take one of these rather than a concrete
/// assignment type so re-entrant evaluation (independent mutable
/// assignments over the same body) can mint as many independent working
/// copies as it needs.
pub trait AssignmentFactory<U, V> {
    type Built: Assignment<U, V>;
    fn build(&self) -> Self::Built;
}

/// Builds `MutableAssignment`s over a cloneable immutable base.
pub struct HashMapAssignmentFactory<Base> {
    base: Base,
}

impl<Base: Clone> HashMapAssignmentFactory<Base> {
    pub fn new(base: Base) -> Self {
        HashMapAssignmentFactory { base }
    }
}

impl<U, V, Base> AssignmentFactory<U, V> for HashMapAssignmentFactory<Base>
where
    U: Eq + Hash + Clone,
    V: Clone,
    Base: Assignment<U, V> + Clone,
{
    type Built = MutableAssignment<U, V, Base>;
    fn build(&self) -> Self::Built {
        MutableAssignment::new(self.base.clone())
    }
}

/// Node-resident slot storage for graph-shaped systems: each unknown
/// claims a slot index once, from a shared atomic counter, so
/// concurrently-built graph nodes never race over slot numbers even though
/// the solvers that read the resulting assignment are themselves
/// single-threaded.
pub struct SlotAllocator {
    next: AtomicUsize,
}

impl SlotAllocator {
    pub fn new() -> Self {
        SlotAllocator {
            next: AtomicUsize::new(0),
        }
    }

    pub fn allocate(&self) -> usize {
        self.next.fetch_add(1, AtomicOrdering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.next.load(AtomicOrdering::Relaxed)
    }
}

impl Default for SlotAllocator {
    fn default() -> Self {
        SlotAllocator::new()
    }
}

/// An assignment backed by a flat `Vec<Option<V>>` indexed by slot, with a
/// `U -> slot` map built once up front via a `SlotAllocator`. Reads are a
/// direct index instead of a hash lookup, the node-resident-storage
/// counterpart to `MutableAssignment`'s map overlay; used by
/// `GraphEquationSystem` solvers where unknowns are graph nodes with a
/// stable, densely-packed slot numbering.
pub struct SlotAssignment<U, V> {
    slot_of: hashbrown::HashMap<U, usize>,
    slots: Vec<Option<V>>,
}

impl<U: Eq + Hash + Clone, V: Clone> SlotAssignment<U, V> {
    pub fn new(slot_of: hashbrown::HashMap<U, usize>, capacity: usize) -> Self {
        SlotAssignment {
            slot_of,
            slots: vec![None; capacity],
        }
    }

    pub fn update(&mut self, u: &U, v: V) {
        let slot = *self
            .slot_of
            .get(u)
            .unwrap_or_else(|| fatal::empty_assignment_access("SlotAssignment::update", u));
        self.slots[slot] = Some(v);
    }
}

impl<U: Eq + Hash + Clone + std::fmt::Debug, V: Clone> Assignment<U, V> for SlotAssignment<U, V> {
    fn is_defined_at(&self, u: &U) -> bool {
        self.slot_of
            .get(u)
            .map_or(false, |&slot| self.slots[slot].is_some())
    }

    fn apply(&self, u: &U) -> V {
        let slot = *self
            .slot_of
            .get(u)
            .unwrap_or_else(|| fatal::empty_assignment_access("SlotAssignment::apply", u));
        self.slots[slot]
            .clone()
            .unwrap_or_else(|| fatal::empty_assignment_access("SlotAssignment::apply", u))
    }
}
