//! The solver family: five ways to find (or approximate) a fixpoint of an
//! equation system, from the naive `round_robin` sweep to the
//! `hierarchical` solver that follows a Bourdoncle ordering directly.
//! Every solver is a free function rather than a trait object —
//! `driver::run` picks one by matching on a strategy enum rather than
//! boxing up a `dyn Solver`.
//!
//! All solvers are single-threaded and synchronous: a solve call owns its
//! `values` map outright and returns it when done.

pub mod hierarchical;
pub mod kleene;
pub mod priority_worklist;
pub mod round_robin;
pub mod worklist;

use crate::assignment::Assignment;
use crate::system::{Body, EquationSystem};
use std::hash::Hash;
use std::rc::Rc;

/// A read-only `Assignment` view over a solver's in-progress `values` map,
/// falling back to `initial` — exactly what `MutableAssignment` computes,
/// but without owning the map, so it can be handed to a `Tracer` callback
/// at any point mid-solve without cloning the whole working set.
pub(crate) struct ValuesView<'a, U, V> {
    pub values: &'a hashbrown::HashMap<U, V>,
    pub initial: &'a dyn Assignment<U, V>,
}

impl<'a, U: Eq + Hash, V: Clone> Assignment<U, V> for ValuesView<'a, U, V> {
    fn is_defined_at(&self, u: &U) -> bool {
        self.values.contains_key(u) || self.initial.is_defined_at(u)
    }
    fn apply(&self, u: &U) -> V {
        match self.values.get(u) {
            Some(v) => v.clone(),
            None => self.initial.apply(u),
        }
    }
}

/// Evaluate `u`'s body against a snapshot `values` map, falling back to
/// `initial` for any unknown not yet in the map (the usual assignment
/// fallback semantics, specialized here to a plain `HashMap` because every
/// solver's working state is exactly that rather than a full
/// `MutableAssignment`). Shared by every solver in this module so the
/// `rho`-closure shape stays identical across all five.
pub(crate) fn eval<U, V, S>(
    system: &S,
    initial: &dyn Assignment<U, V>,
    values: &hashbrown::HashMap<U, V>,
    u: &U,
) -> V
where
    U: Eq + Hash + Clone,
    V: Clone,
    S: EquationSystem<U, V>,
{
    let rho = |x: &U| {
        values
            .get(x)
            .cloned()
            .unwrap_or_else(|| initial.apply(x))
    };
    let body: Rc<dyn Body<U, V>> = system.body(u);
    body.apply(u, &rho)
}

/// Look up `x`'s value for the infinite-system discovery solvers: the
/// snapshot `values` map first, then `initial` where it's actually
/// defined there, else `V::default()` as the starting approximation for an
/// unknown nobody has computed or supplied a seed for yet. Unlike `eval`'s
/// rho (which requires every non-input unknown to already be in `values`
/// or `initial`), this has to tolerate a completely partial `initial`
/// because discovery solvers enqueue dependencies the first time they're
/// read, before anything is known about them.
pub(crate) fn fallback_value<U, V>(
    values: &hashbrown::HashMap<U, V>,
    initial: &dyn Assignment<U, V>,
    x: &U,
) -> V
where
    U: Eq + Hash,
    V: Clone + Default,
{
    match values.get(x) {
        Some(v) => v.clone(),
        None if initial.is_defined_at(x) => initial.apply(x),
        None => V::default(),
    }
}

/// Seed a fresh `values` map with whatever `initial` defines at each of
/// `unknowns` — used by every solver to build its starting point before
/// the first round of evaluation.
pub(crate) fn seed<U, V>(
    initial: &dyn Assignment<U, V>,
    unknowns: &[U],
) -> hashbrown::HashMap<U, V>
where
    U: Eq + Hash + Clone,
    V: Clone,
{
    let mut values = hashbrown::HashMap::with_capacity(unknowns.len());
    for u in unknowns {
        if let Some(v) = initial.try_apply(u) {
            values.insert(u.clone(), v);
        }
    }
    values
}
