//! Equation systems: `Body`/`BodyWithDependencies`, `EquationSystem` and
//! `FiniteEquationSystem`, and the three combo-placement transformations
//! (`WithBaseAssignment`, `WithCombos`, `WithLocalizedCombos`) the
//! acceleration layer is built out of.
//!
//! A `Body` is represented as a callback over `rho: &dyn Fn(&U) -> V`
//! rather than over a concrete `Assignment` impl — an "accept whatever
//! the caller already has" shape, taking a trait-bounded view rather than
//! demanding one specific concrete type. This keeps `Body` object-safe
//! (`Rc<dyn Body<U, V>>`) while letting every solver supply its own
//! assignment as the closure's captured state.

use crate::assignment::Assignment;
use crate::combo::{Combo, ComboAssignment};
use crate::domain::Magma;
use std::hash::Hash;
use std::rc::Rc;

/// One equation `x = F(x)`'s right-hand side, evaluated at `u` against the
/// current (possibly partial) assignment `rho`.
pub trait Body<U, V> {
    fn apply(&self, u: &U, rho: &dyn Fn(&U) -> V) -> V;
}

impl<U, V, F: Fn(&U, &dyn Fn(&U) -> V) -> V> Body<U, V> for F {
    fn apply(&self, u: &U, rho: &dyn Fn(&U) -> V) -> V {
        self(u, rho)
    }
}

/// A `Body` that can additionally report, for a given `rho`, exactly which
/// unknowns it read. Worklist-style solvers use this to learn the
/// dependency graph on the fly instead of requiring it up front.
pub trait BodyWithDependencies<U, V>: Body<U, V> {
    /// Evaluate at `u`, recording every unknown `rho` was called with via
    /// `dep`, and return the same value `apply` would.
    fn apply_with_dependencies(&self, u: &U, rho: &dyn Fn(&U) -> V, dep: &mut dyn FnMut(&U)) -> V;
}

/// The minimal equation-system capability: possibly infinite, possibly
/// without known dependencies ahead of time.
pub trait EquationSystem<U, V> {
    fn body(&self, u: &U) -> Rc<dyn Body<U, V>>;

    /// A `BodyWithDependencies` for `u`, when this system can report
    /// dependencies directly rather than needing a recording `rho`
    /// wrapper. `None` by default.
    fn body_with_dependencies(&self, _u: &U) -> Option<Rc<dyn BodyWithDependencies<U, V>>> {
        None
    }

    /// Unknowns whose equation is `x = input value` with no dependencies,
    /// i.e. the system's entry points.
    fn input_unknowns(&self) -> Vec<U>;
}

/// An `EquationSystem` whose full unknown set and dependency relation are
/// known up front: round-robin and Kleene solvers need this; the
/// worklist solvers only need the infinite variant plus
/// `BodyWithDependencies`.
pub trait FiniteEquationSystem<U, V>: EquationSystem<U, V> {
    /// All unknowns the system is defined over, in a fixed (solver-visible)
    /// order.
    fn unknowns(&self) -> Vec<U>;

    /// Unknowns whose equation reads `u` — the reverse of the dependency
    /// relation each equation induces, used to decide which unknowns need
    /// re-evaluating after `u` changes.
    fn influence(&self, u: &U) -> Vec<U>;
}

struct WithBaseAssignmentBody<U, V> {
    inner: Rc<dyn Body<U, V>>,
    base: Option<V>,
    magma: Rc<dyn Magma<V>>,
}

impl<U, V: Clone> Body<U, V> for WithBaseAssignmentBody<U, V> {
    fn apply(&self, u: &U, rho: &dyn Fn(&U) -> V) -> V {
        let computed = self.inner.apply(u, rho);
        match &self.base {
            Some(b) => self.magma.combine(b, &computed),
            None => computed,
        }
    }
}

/// Folds a default/base value into every unknown's result via a `Magma`:
/// applies a base/default value via a magma combiner when there's no
/// graph-level combiner available — the non-graph counterpart of
/// `GraphEquationSystem`'s edge combiner.
pub struct WithBaseAssignment<S, U, V> {
    inner: S,
    base: Rc<dyn crate::assignment::Assignment<U, V>>,
    magma: Rc<dyn Magma<V>>,
}

impl<S, U, V> WithBaseAssignment<S, U, V> {
    pub fn new(
        inner: S,
        base: Rc<dyn crate::assignment::Assignment<U, V>>,
        magma: Rc<dyn Magma<V>>,
    ) -> Self {
        WithBaseAssignment { inner, base, magma }
    }
}

impl<S, U, V> EquationSystem<U, V> for WithBaseAssignment<S, U, V>
where
    S: EquationSystem<U, V>,
    V: Clone + 'static,
    U: 'static,
{
    fn body(&self, u: &U) -> Rc<dyn Body<U, V>> {
        Rc::new(WithBaseAssignmentBody {
            inner: self.inner.body(u),
            base: self.base.try_apply(u),
            magma: self.magma.clone(),
        })
    }

    fn input_unknowns(&self) -> Vec<U> {
        self.inner.input_unknowns()
    }
}

impl<S, U, V> FiniteEquationSystem<U, V> for WithBaseAssignment<S, U, V>
where
    S: FiniteEquationSystem<U, V>,
    V: Clone + 'static,
    U: 'static,
{
    fn unknowns(&self) -> Vec<U> {
        self.inner.unknowns()
    }
    fn influence(&self, u: &U) -> Vec<U> {
        self.inner.influence(u)
    }
}

struct WithCombosBody<U, V> {
    inner: Rc<dyn Body<U, V>>,
    combo: Rc<dyn Combo<V>>,
}

impl<U, V> Body<U, V> for WithCombosBody<U, V> {
    fn apply(&self, u: &U, rho: &dyn Fn(&U) -> V) -> V {
        let old = rho(u);
        let computed = self.inner.apply(u, rho);
        self.combo.apply(&old, &computed)
    }
}

/// Combines every unknown's freshly computed value with its current one
/// through a `ComboAssignment` ("standard" scope — every unknown in the
/// system, as opposed to `WithLocalizedCombos`'s back-edges only).
pub struct WithCombos<S, U, V> {
    inner: S,
    combos: ComboAssignment<U, V>,
}

impl<S, U, V> WithCombos<S, U, V> {
    pub fn new(inner: S, combos: ComboAssignment<U, V>) -> Self {
        WithCombos { inner, combos }
    }
}

impl<S, U, V> EquationSystem<U, V> for WithCombos<S, U, V>
where
    S: EquationSystem<U, V>,
    U: Eq + Hash + Clone + 'static,
    V: Clone + 'static,
{
    fn body(&self, u: &U) -> Rc<dyn Body<U, V>> {
        Rc::new(WithCombosBody {
            inner: self.inner.body(u),
            combo: self.combos.combo(u),
        })
    }

    fn input_unknowns(&self) -> Vec<U> {
        self.inner.input_unknowns()
    }
}

impl<S, U, V> FiniteEquationSystem<U, V> for WithCombos<S, U, V>
where
    S: FiniteEquationSystem<U, V>,
    U: Eq + Hash + Clone + 'static,
    V: Clone + 'static,
{
    fn unknowns(&self) -> Vec<U> {
        self.inner.unknowns()
    }

    /// `inner`'s influence, widened with the diagonal at `u` when the
    /// combos aren't all idempotent: a non-idempotent combo may keep
    /// changing the value without any dependency changing, so `u` must
    /// be considered its own dependent.
    fn influence(&self, u: &U) -> Vec<U> {
        let mut infl = self.inner.influence(u);
        if !self.combos.is_idempotent() && !infl.iter().any(|x| x == u) {
            infl.push(u.clone());
        }
        infl
    }
}

/// Combines only at the unknowns named in `heads` (typically the loop
/// heads a `DFOrdering`/`HierarchicalOrdering` identifies as back-edge
/// targets), leaving every other unknown's raw computed value untouched —
/// applied at back-edges per the depth-first ordering. Widening confined
/// to loop heads converges just as well as widening everywhere and
/// perturbs far fewer values, which is why `CC77`'s default `ComboScope`
/// is `Localized` rather than `Standard`.
pub struct WithLocalizedCombos<S, U, V> {
    inner: S,
    combos: ComboAssignment<U, V>,
    heads: hashbrown::HashSet<U>,
}

impl<S, U: Eq + Hash, V> WithLocalizedCombos<S, U, V> {
    pub fn new(inner: S, combos: ComboAssignment<U, V>, heads: hashbrown::HashSet<U>) -> Self {
        WithLocalizedCombos {
            inner,
            combos,
            heads,
        }
    }
}

impl<S, U, V> EquationSystem<U, V> for WithLocalizedCombos<S, U, V>
where
    S: EquationSystem<U, V>,
    U: Eq + Hash + Clone + 'static,
    V: Clone + 'static,
{
    fn body(&self, u: &U) -> Rc<dyn Body<U, V>> {
        let inner_body = self.inner.body(u);
        if self.heads.contains(u) {
            Rc::new(WithCombosBody {
                inner: inner_body,
                combo: self.combos.combo(u),
            })
        } else {
            inner_body
        }
    }

    fn input_unknowns(&self) -> Vec<U> {
        self.inner.input_unknowns()
    }
}

impl<S, U, V> FiniteEquationSystem<U, V> for WithLocalizedCombos<S, U, V>
where
    S: FiniteEquationSystem<U, V>,
    U: Eq + Hash + Clone + 'static,
    V: Clone + 'static,
{
    fn unknowns(&self) -> Vec<U> {
        self.inner.unknowns()
    }

    /// Only heads can read their own prior value through a combo here
    /// (the corresponding edges are added to `outgoing(x)` so influence
    /// is self-reflexive at `x`), so the diagonal widening is confined to
    /// `heads`, unlike `WithCombos` which applies everywhere.
    fn influence(&self, u: &U) -> Vec<U> {
        let mut infl = self.inner.influence(u);
        if self.heads.contains(u) && !self.combos.is_idempotent() && !infl.iter().any(|x| x == u) {
            infl.push(u.clone());
        }
        infl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::Assignment;
    use crate::combo::UpperBound;
    use hashbrown::HashMap as HMap;

    /// A toy finite system over `u32` unknowns backed by a plain map of
    /// closures, enough to exercise the combo-placement wrappers without
    /// pulling in a real graph system.
    struct MapSystem {
        bodies: HMap<u32, Rc<dyn Body<u32, i32>>>,
    }

    impl EquationSystem<u32, i32> for MapSystem {
        fn body(&self, u: &u32) -> Rc<dyn Body<u32, i32>> {
            self.bodies.get(u).expect("test system total").clone()
        }
        fn input_unknowns(&self) -> Vec<u32> {
            vec![]
        }
    }

    impl FiniteEquationSystem<u32, i32> for MapSystem {
        fn unknowns(&self) -> Vec<u32> {
            self.bodies.keys().copied().collect()
        }
        fn influence(&self, _u: &u32) -> Vec<u32> {
            vec![]
        }
    }

    #[test]
    fn with_combos_joins_old_and_new() {
        let mut bodies: HMap<u32, Rc<dyn Body<u32, i32>>> = HMap::new();
        bodies.insert(0, Rc::new(|_u: &u32, _rho: &dyn Fn(&u32) -> i32| 5i32));
        let sys = MapSystem { bodies };

        let combos: ComboAssignment<u32, i32> = ComboAssignment::uniform(Rc::new(UpperBound));
        let wrapped = WithCombos::new(sys, combos);

        let rho = |u: &u32| if *u == 0 { 10 } else { 0 };
        let result = wrapped.body(&0).apply(&0, &rho);
        assert_eq!(result, 10); // upper_bound(10, 5) == 10
    }

    #[test]
    fn with_localized_combos_only_touches_heads() {
        let mut bodies: HMap<u32, Rc<dyn Body<u32, i32>>> = HMap::new();
        bodies.insert(0, Rc::new(|_u: &u32, _rho: &dyn Fn(&u32) -> i32| 5i32));
        bodies.insert(1, Rc::new(|_u: &u32, _rho: &dyn Fn(&u32) -> i32| 1i32));
        let sys = MapSystem { bodies };

        let combos: ComboAssignment<u32, i32> = ComboAssignment::uniform(Rc::new(UpperBound));
        let mut heads = hashbrown::HashSet::new();
        heads.insert(0u32);
        let wrapped = WithLocalizedCombos::new(sys, combos, heads);

        let rho = |u: &u32| if *u == 0 { 10 } else { 100 };
        assert_eq!(wrapped.body(&0).apply(&0, &rho), 10); // combo applied
        assert_eq!(wrapped.body(&1).apply(&1, &rho), 1); // raw value, no combo
    }
}
