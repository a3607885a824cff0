//! The ordered-domain and magma capabilities values (`V`) must supply.
//!
//! `Unknown`s and `Value`s are opaque type parameters everywhere else in the
//! crate (`U: Clone + Eq + Hash`, `V: Clone`); this module is where `V`
//! additionally picks up the algebraic structure the solver family actually
//! needs: a partial order with an upper bound, and (separately) a magma for
//! callers who want `with_base_assignment` without a graph-level combiner.

use crate::error::fatal;
use std::cmp::Ordering;

/// `(<=, <, =, upper_bound)` over values.
///
/// Implementations must satisfy the usual partial-order laws: if
/// `leq(x, y)` and `leq(y, x)` then `x == y`. `upper_bound(x, y)` must
/// return some element `>= ` both arguments; not every pair needs to have
/// one defined, but calling `upper_bound` on such a pair is a client
/// error and panics via [`fatal::domain_incomparable`].
pub trait OrderedDomain: Clone {
    fn leq(&self, other: &Self) -> bool;

    fn lt(&self, other: &Self) -> bool {
        self.leq(other) && !other.leq(self)
    }

    fn domain_eq(&self, other: &Self) -> bool {
        self.leq(other) && other.leq(self)
    }

    /// Returns `Some(upper bound)` when one is defined for this pair, else
    /// `None`. The panicking [`OrderedDomain::upper_bound`] is built on top
    /// of this so every implementor only has to write the partial version.
    fn try_upper_bound(&self, other: &Self) -> Option<Self>;

    fn upper_bound(&self, other: &Self) -> Self
    where
        Self: std::fmt::Debug,
    {
        self.try_upper_bound(other)
            .unwrap_or_else(|| fatal::domain_incomparable("OrderedDomain::upper_bound", self, other))
    }
}

/// Blanket implementation over any totally- or partially-ordered type via
/// `PartialOrd`, so ordinary numeric domains (and anything deriving
/// `PartialOrd`) get `OrderedDomain` for free. When the domain arises from
/// a total order, `try_upper_bound` is exactly `max`.
impl<T: PartialOrd + Clone> OrderedDomain for T {
    fn leq(&self, other: &Self) -> bool {
        matches!(
            self.partial_cmp(other),
            Some(Ordering::Less) | Some(Ordering::Equal)
        )
    }

    fn lt(&self, other: &Self) -> bool {
        matches!(self.partial_cmp(other), Some(Ordering::Less))
    }

    fn domain_eq(&self, other: &Self) -> bool {
        matches!(self.partial_cmp(other), Some(Ordering::Equal))
    }

    fn try_upper_bound(&self, other: &Self) -> Option<Self> {
        match self.partial_cmp(other)? {
            Ordering::Less | Ordering::Equal => Some(other.clone()),
            Ordering::Greater => Some(self.clone()),
        }
    }
}

/// The magma capability required by `with_base_assignment` outside the
/// graph-based case, where there is no edge combiner to fall back on.
/// A single binary operator on `V`; most callers will just hand in the
/// domain's own `upper_bound`.
pub trait Magma<V> {
    fn combine(&self, a: &V, b: &V) -> V;
}

/// A `Magma` built from any closure, for callers who don't want to name a
/// struct for a one-off combiner.
pub struct MagmaFn<F>(pub F);

impl<V, F: Fn(&V, &V) -> V> Magma<V> for MagmaFn<F> {
    fn combine(&self, a: &V, b: &V) -> V {
        (self.0)(a, b)
    }
}

/// Adapts an `OrderedDomain`'s `upper_bound` into a `Magma`, the common
/// case in practice: in the graph-based case the combiner at an unknown
/// is simply the domain's upper bound.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpperBoundMagma;

impl<V: OrderedDomain + std::fmt::Debug> Magma<V> for UpperBoundMagma {
    fn combine(&self, a: &V, b: &V) -> V {
        a.upper_bound(b)
    }
}

/// Product of two ordered domains, join/order computed component-wise.
/// Real analyzer lattices are usually products of smaller domains, so
/// this combinator is supplementary sugar on top of the core
/// `OrderedDomain` interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairDomain<A, B> {
    pub first: A,
    pub second: B,
}

impl<A: OrderedDomain, B: OrderedDomain> OrderedDomain for PairDomain<A, B> {
    fn leq(&self, other: &Self) -> bool {
        self.first.leq(&other.first) && self.second.leq(&other.second)
    }

    fn try_upper_bound(&self, other: &Self) -> Option<Self> {
        Some(PairDomain {
            first: self.first.try_upper_bound(&other.first)?,
            second: self.second.try_upper_bound(&other.second)?,
        })
    }
}

/// A domain of maps `K -> V` ordered point-wise, with missing keys treated
/// as bottom (absent from one map but present in the other never blocks an
/// upper bound: the result just carries the present side's value forward).
/// Supplementary, in the same spirit as `PairDomain` above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapDomain<K, V> {
    pub map: hashbrown::HashMap<K, V>,
}

impl<K, V> OrderedDomain for MapDomain<K, V>
where
    K: std::hash::Hash + Eq + Clone,
    V: OrderedDomain,
{
    fn leq(&self, other: &Self) -> bool {
        self.map.iter().all(|(k, v)| match other.map.get(k) {
            Some(v2) => v.leq(v2),
            None => false,
        })
    }

    fn try_upper_bound(&self, other: &Self) -> Option<Self> {
        let mut map = self.map.clone();
        for (k, v2) in &other.map {
            match map.get(k) {
                Some(v1) => {
                    let joined = v1.try_upper_bound(v2)?;
                    map.insert(k.clone(), joined);
                }
                None => {
                    map.insert(k.clone(), v2.clone());
                }
            }
        }
        Some(MapDomain { map })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f64_leq_matches_native_order() {
        assert!(1.0f64.leq(&2.0));
        assert!(!2.0f64.leq(&1.0));
        assert!(1.0f64.domain_eq(&1.0));
    }

    #[test]
    fn f64_upper_bound_is_max() {
        assert_eq!(1.0f64.upper_bound(&2.0), 2.0);
        assert_eq!(5.0f64.upper_bound(&2.0), 5.0);
    }

    #[test]
    fn pair_domain_is_componentwise() {
        let a = PairDomain { first: 1.0, second: 3.0 };
        let b = PairDomain { first: 2.0, second: 1.0 };
        let joined = a.try_upper_bound(&b).expect("f64 is totally ordered");
        assert_eq!(joined.first, 2.0);
        assert_eq!(joined.second, 3.0);
    }
}
