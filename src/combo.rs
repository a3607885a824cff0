//! Combos: binary operators on values used to force or accelerate
//! convergence, and `ComboAssignment`, the per-unknown mapping onto them.
//!
//! Combos are named structs implementing the `Combo<V>` trait rather than
//! boxed closures, preferring a named type over an anonymous tuple or
//! closure whenever the value needs to be stored, matched on, or copied.

use crate::domain::OrderedDomain;
use crate::error::fatal;
use std::cell::RefCell;
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

/// A binary operator on values, combining the value currently stored at an
/// unknown ("old") with a freshly computed one ("new"). `is_right` and
/// `is_idempotent` are the two flags that matter for convergence; `is_stateful`
/// additionally tells `ComboAssignment` whether `copy` needs to deep-copy
/// this combo's internal counter or can just share it.
pub trait Combo<V> {
    /// Combine `old` and `new`, producing the value to store.
    fn apply(&self, old: &V, new: &V) -> V;

    /// True iff this combo always returns its second argument.
    fn is_right(&self) -> bool {
        false
    }

    /// True iff applying this combo repeatedly at a fixed first argument
    /// stabilizes (`apply(x, apply(x, y)) == apply(x, y)` for all `y`).
    fn is_idempotent(&self) -> bool {
        false
    }

    /// True iff this combo carries internal state (a call counter) that
    /// must be independently copied rather than shared.
    fn is_stateful(&self) -> bool {
        false
    }

    /// Produce a fresh, independent copy: resets any internal counter.
    /// Stateless combos may just clone their (empty) representation.
    fn copy_combo(&self) -> Rc<dyn Combo<V>>;
}

/// `(x, y) -> y`. Idempotent; flagged right.
#[derive(Debug, Clone, Copy, Default)]
pub struct Right;

impl<V: Clone + 'static> Combo<V> for Right {
    fn apply(&self, _old: &V, new: &V) -> V {
        new.clone()
    }
    fn is_right(&self) -> bool {
        true
    }
    fn is_idempotent(&self) -> bool {
        true
    }
    fn copy_combo(&self) -> Rc<dyn Combo<V>> {
        Rc::new(Right)
    }
}

/// `(x, y) -> x`. Idempotent.
#[derive(Debug, Clone, Copy, Default)]
pub struct Left;

impl<V: Clone + 'static> Combo<V> for Left {
    fn apply(&self, old: &V, _new: &V) -> V {
        old.clone()
    }
    fn is_idempotent(&self) -> bool {
        true
    }
    fn copy_combo(&self) -> Rc<dyn Combo<V>> {
        Rc::new(Left)
    }
}

/// `(x, y) -> x ⊔ y`. Idempotent.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpperBound;

impl<V: OrderedDomain + Debug + 'static> Combo<V> for UpperBound {
    fn apply(&self, old: &V, new: &V) -> V {
        old.upper_bound(new)
    }
    fn is_idempotent(&self) -> bool {
        true
    }
    fn copy_combo(&self) -> Rc<dyn Combo<V>> {
        Rc::new(UpperBound)
    }
}

/// A widening combo `∇`, supplied by the caller as the actual acceleration
/// operator for their lattice (the concrete widening/narrowing operator is
/// left to the client lattice; the core only needs the shape
/// `(V, V) -> V`). Not idempotent in general and not flagged right.
pub struct Widening<F> {
    pub op: F,
}

impl<F> Widening<F> {
    pub fn new(op: F) -> Self {
        Widening { op }
    }
}

impl<V, F> Combo<V> for Widening<F>
where
    F: Fn(&V, &V) -> V + Clone + 'static,
{
    fn apply(&self, old: &V, new: &V) -> V {
        (self.op)(old, new)
    }
    fn copy_combo(&self) -> Rc<dyn Combo<V>> {
        Rc::new(Widening { op: self.op.clone() })
    }
}

/// A narrowing combo `△`, supplied by the caller. Produces a value with
/// `y <= result <= x` whenever `y <= x`; the core trusts the supplied
/// operator to uphold that law.
pub struct Narrowing<F> {
    pub op: F,
}

impl<F> Narrowing<F> {
    pub fn new(op: F) -> Self {
        Narrowing { op }
    }
}

impl<V, F> Combo<V> for Narrowing<F>
where
    F: Fn(&V, &V) -> V + Clone + 'static,
{
    fn apply(&self, old: &V, new: &V) -> V {
        (self.op)(old, new)
    }
    fn copy_combo(&self) -> Rc<dyn Combo<V>> {
        Rc::new(Narrowing { op: self.op.clone() })
    }
}

/// Acts as `right` for the first `k` calls, then as `base`. Stateful: the
/// call counter lives in a `Cell` so `apply` can take `&self`, matching the
/// shape every other `Combo` method uses. `copy_combo` resets the counter.
pub struct Delayed<V> {
    base: Rc<dyn Combo<V>>,
    k: i64,
    calls: std::cell::Cell<i64>,
}

impl<V> Delayed<V> {
    pub fn new(base: Rc<dyn Combo<V>>, k: i64) -> Self {
        if k < 0 {
            fatal::negative_delay("Delayed::new", k);
        }
        Delayed {
            base,
            k,
            calls: std::cell::Cell::new(0),
        }
    }
}

impl<V: Clone + 'static> Combo<V> for Delayed<V> {
    fn apply(&self, old: &V, new: &V) -> V {
        let n = self.calls.get();
        self.calls.set(n + 1);
        if n < self.k {
            new.clone()
        } else {
            self.base.apply(old, new)
        }
    }
    fn is_right(&self) -> bool {
        // During the delay window this always returns `new` (right), and
        // once the window ends it defers to `base` — so the whole combo is
        // right regardless of `k` iff `base` is.
        self.base.is_right()
    }
    fn is_idempotent(&self) -> bool {
        // Only idempotent if the delay window never ends (k == 0 means no
        // delay at all, so idempotence reduces to the base's).
        self.k == 0 && self.base.is_idempotent()
    }
    fn is_stateful(&self) -> bool {
        true
    }
    fn copy_combo(&self) -> Rc<dyn Combo<V>> {
        Rc::new(Delayed {
            base: self.base.copy_combo(),
            k: self.k,
            calls: std::cell::Cell::new(0),
        })
    }
}

/// `first` for `k` calls then `second`. `is_right` iff both are right —
/// for non-zero delay this only holds when both are right, since `first`
/// only ever applies for `k > 0` calls. `is_idempotent` iff `second` is
/// idempotent and `k == 0` (the `first` phase never executes, so the
/// cascade degenerates to `second` alone).
pub struct Cascade<V> {
    first: Rc<dyn Combo<V>>,
    k: i64,
    second: Rc<dyn Combo<V>>,
    calls: std::cell::Cell<i64>,
}

impl<V> Cascade<V> {
    pub fn new(first: Rc<dyn Combo<V>>, k: i64, second: Rc<dyn Combo<V>>) -> Self {
        if k < 0 {
            fatal::negative_delay("Cascade::new", k);
        }
        Cascade {
            first,
            k,
            second,
            calls: std::cell::Cell::new(0),
        }
    }
}

impl<V: Clone + 'static> Combo<V> for Cascade<V> {
    fn apply(&self, old: &V, new: &V) -> V {
        let n = self.calls.get();
        self.calls.set(n + 1);
        if n < self.k {
            self.first.apply(old, new)
        } else {
            self.second.apply(old, new)
        }
    }
    fn is_right(&self) -> bool {
        self.first.is_right() && self.second.is_right()
    }
    fn is_idempotent(&self) -> bool {
        self.k == 0 && self.second.is_idempotent()
    }
    fn is_stateful(&self) -> bool {
        true
    }
    fn copy_combo(&self) -> Rc<dyn Combo<V>> {
        Rc::new(Cascade {
            first: self.first.copy_combo(),
            k: self.k,
            second: self.second.copy_combo(),
            calls: std::cell::Cell::new(0),
        })
    }
}

/// `(x, y) -> x ∇ y` if `y` is not `<= x`, else `x △ y` if `y < x`, else
/// `y`. A single-pass operator replacing the two-phase widening/narrowing
/// chain. The two conditions are checked in a fixed order: widen first,
/// else narrow, else pass-through.
pub struct Warrowing<V> {
    pub widen: Rc<dyn Combo<V>>,
    pub narrow: Rc<dyn Combo<V>>,
}

impl<V> Warrowing<V> {
    pub fn new(widen: Rc<dyn Combo<V>>, narrow: Rc<dyn Combo<V>>) -> Self {
        Warrowing { widen, narrow }
    }
}

impl<V: OrderedDomain + Clone + 'static> Combo<V> for Warrowing<V> {
    fn apply(&self, old: &V, new: &V) -> V {
        if !new.leq(old) {
            self.widen.apply(old, new)
        } else if new.lt(old) {
            self.narrow.apply(old, new)
        } else {
            new.clone()
        }
    }
    fn copy_combo(&self) -> Rc<dyn Combo<V>> {
        Rc::new(Warrowing {
            widen: self.widen.copy_combo(),
            narrow: self.narrow.copy_combo(),
        })
    }
}

/// Produces a fresh `Rc<dyn Combo<V>>` on demand: the seam that lets
/// `ComboAssignment::uniform` share one instance when the combo is
/// stateless, and mint independent per-unknown instances (memoized on
/// first access) when it's stateful.
pub trait ComboFactory<V> {
    fn stateful(&self) -> bool;
    fn make(&self) -> Rc<dyn Combo<V>>;
}

/// Wraps a single shared, stateless combo: every unknown gets the same
/// `Rc`.
struct SharedFactory<V>(Rc<dyn Combo<V>>);

impl<V> ComboFactory<V> for SharedFactory<V> {
    fn stateful(&self) -> bool {
        false
    }
    fn make(&self) -> Rc<dyn Combo<V>> {
        self.0.clone()
    }
}

/// Wraps a stateful combo as a template: every unknown gets an independent
/// `copy_combo()` of it.
struct StatefulFactory<V>(Rc<dyn Combo<V>>);

impl<V> ComboFactory<V> for StatefulFactory<V> {
    fn stateful(&self) -> bool {
        true
    }
    fn make(&self) -> Rc<dyn Combo<V>> {
        self.0.copy_combo()
    }
}

enum ComboAssignmentInner<U, V> {
    Empty,
    Uniform {
        factory: Rc<dyn ComboFactory<V>>,
        idempotent: bool,
        cache: RefCell<hashbrown::HashMap<U, Rc<dyn Combo<V>>>>,
    },
    Map(hashbrown::HashMap<U, Rc<dyn Combo<V>>>),
}

/// `U -> Combo[V]`, possibly partial. Built from a single combo (shared
/// when stateless, per-unknown copies when stateful), from a map, or as
/// empty (every unknown maps to `right`, `is_empty() == true`).
pub struct ComboAssignment<U, V> {
    inner: ComboAssignmentInner<U, V>,
}

impl<U, V> ComboAssignment<U, V>
where
    U: Eq + Hash + Clone,
{
    pub fn empty() -> Self {
        ComboAssignment {
            inner: ComboAssignmentInner::Empty,
        }
    }

    /// Build from a single combo, shared across every unknown if it's
    /// stateless, or copied fresh per unknown (and memoized on first
    /// access) if it's stateful.
    pub fn uniform(combo: Rc<dyn Combo<V>>) -> Self
    where
        V: 'static,
    {
        let idempotent = combo.is_idempotent();
        let factory: Rc<dyn ComboFactory<V>> = if combo.is_stateful() {
            Rc::new(StatefulFactory(combo))
        } else {
            Rc::new(SharedFactory(combo))
        };
        ComboAssignment {
            inner: ComboAssignmentInner::Uniform {
                factory,
                idempotent,
                cache: RefCell::new(hashbrown::HashMap::new()),
            },
        }
    }

    pub fn from_map(map: hashbrown::HashMap<U, Rc<dyn Combo<V>>>) -> Self {
        ComboAssignment {
            inner: ComboAssignmentInner::Map(map),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.inner, ComboAssignmentInner::Empty)
    }

    pub fn is_defined_at(&self, u: &U) -> bool {
        match &self.inner {
            ComboAssignmentInner::Empty => false,
            ComboAssignmentInner::Uniform { .. } => true,
            ComboAssignmentInner::Map(m) => m.contains_key(u),
        }
    }

    /// True iff every combo this assignment can ever produce is
    /// idempotent. `Empty` trivially qualifies (it only ever produces
    /// `right`, which is idempotent).
    pub fn is_idempotent(&self) -> bool {
        match &self.inner {
            ComboAssignmentInner::Empty => true,
            ComboAssignmentInner::Uniform { idempotent, .. } => *idempotent,
            ComboAssignmentInner::Map(m) => m.values().all(|c| c.is_idempotent()),
        }
    }

    /// The combo at `u`, or `right` when this assignment isn't defined
    /// there (an empty assignment returns right at every unknown).
    /// Memoizes per-unknown instances for stateful `Uniform` assignments
    /// so repeated access returns the *same* combo on repeated access.
    pub fn combo(&self, u: &U) -> Rc<dyn Combo<V>>
    where
        V: Clone + 'static,
    {
        match &self.inner {
            ComboAssignmentInner::Empty => Rc::new(Right),
            ComboAssignmentInner::Uniform { factory, cache, .. } => {
                if let Some(existing) = cache.borrow().get(u) {
                    return existing.clone();
                }
                let made = factory.make();
                cache.borrow_mut().insert(u.clone(), made.clone());
                made
            }
            ComboAssignmentInner::Map(m) => m
                .get(u)
                .cloned()
                .unwrap_or_else(|| Rc::new(Right) as Rc<dyn Combo<V>>),
        }
    }

    /// Fresh independent copy when any combo could be stateful, else
    /// returns an assignment sharing the same underlying instances.
    pub fn copy(&self) -> Self
    where
        V: Clone + 'static,
    {
        match &self.inner {
            ComboAssignmentInner::Empty => ComboAssignment {
                inner: ComboAssignmentInner::Empty,
            },
            ComboAssignmentInner::Uniform {
                factory,
                idempotent,
                ..
            } => {
                // Either way the new assignment shares the factory and
                // starts with a fresh, empty per-unknown cache: a stateful
                // factory mints independent `copy_combo()`s on next access,
                // a stateless one just hands back the same shared `Rc`.
                ComboAssignment {
                    inner: ComboAssignmentInner::Uniform {
                        factory: factory.clone(),
                        idempotent: *idempotent,
                        cache: RefCell::new(hashbrown::HashMap::new()),
                    },
                }
            }
            ComboAssignmentInner::Map(m) => {
                let any_stateful = m.values().any(|c| c.is_stateful());
                if any_stateful {
                    let copied = m
                        .iter()
                        .map(|(k, v)| (k.clone(), v.copy_combo()))
                        .collect();
                    ComboAssignment {
                        inner: ComboAssignmentInner::Map(copied),
                    }
                } else {
                    let shared = m.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                    ComboAssignment {
                        inner: ComboAssignmentInner::Map(shared),
                    }
                }
            }
        }
    }

    /// Restrict this assignment to the unknowns in `heads`, used by the
    /// driver's `ComboLocation::Loop` placement.
    pub fn restrict_to(&self, heads: &hashbrown::HashSet<U>) -> Self
    where
        V: Clone + 'static,
    {
        match &self.inner {
            ComboAssignmentInner::Empty => ComboAssignment {
                inner: ComboAssignmentInner::Empty,
            },
            ComboAssignmentInner::Uniform { .. } => {
                let mut map = hashbrown::HashMap::new();
                for u in heads {
                    map.insert(u.clone(), self.combo(u));
                }
                ComboAssignment {
                    inner: ComboAssignmentInner::Map(map),
                }
            }
            ComboAssignmentInner::Map(m) => {
                let map = m
                    .iter()
                    .filter(|(k, _)| heads.contains(*k))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                ComboAssignment {
                    inner: ComboAssignmentInner::Map(map),
                }
            }
        }
    }
}
