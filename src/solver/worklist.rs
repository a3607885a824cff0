//! The FIFO worklist solver: only re-evaluate unknowns whose dependencies
//! actually changed, rather than sweeping everything every round.
//! `solve_finite` needs the system's full dependency relation up front
//! (`influence`); `solve_infinite` discovers it on the fly via
//! `BodyWithDependencies` (or, lacking that, a recording `rho` wrapper),
//! for systems too large or unbounded to enumerate `unknowns()` for.
//!
//! The queue itself is a plain `VecDeque` paired with a membership set —
//! single-threaded here since every solver in this crate is, but the same
//! queue-plus-dedup-set shape any FIFO work queue needs.

use crate::assignment::Assignment;
use crate::solver::{eval, fallback_value, seed, ValuesView};
use crate::system::{EquationSystem, FiniteEquationSystem};
use crate::tracer::{NullTracer, Tracer};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::hash::Hash;

pub fn solve_finite<U, V, S>(system: &S, initial: &dyn Assignment<U, V>) -> hashbrown::HashMap<U, V>
where
    U: Eq + Hash + Clone,
    V: Clone + PartialEq,
    S: FiniteEquationSystem<U, V>,
{
    solve_finite_traced(system, initial, &mut NullTracer)
}

pub fn solve_finite_traced<U, V, S>(
    system: &S,
    initial: &dyn Assignment<U, V>,
    tracer: &mut dyn Tracer<U, V>,
) -> hashbrown::HashMap<U, V>
where
    U: Eq + Hash + Clone,
    V: Clone + PartialEq,
    S: FiniteEquationSystem<U, V>,
{
    let unknowns = system.unknowns();
    let inputs: hashbrown::HashSet<U> = system.input_unknowns().into_iter().collect();
    let mut values = seed(initial, &unknowns);
    tracer.initialized(&ValuesView { values: &values, initial });

    let mut queue: VecDeque<U> = unknowns.iter().filter(|u| !inputs.contains(u)).cloned().collect();
    let mut queued: hashbrown::HashSet<U> = queue.iter().cloned().collect();

    while let Some(u) = queue.pop_front() {
        queued.remove(&u);
        let new_val = eval(system, initial, &values, &u);
        let changed = values.get(&u) != Some(&new_val);
        values.insert(u.clone(), new_val.clone());
        tracer.evaluated(&ValuesView { values: &values, initial }, &u, &new_val);
        if changed {
            for dep in system.influence(&u) {
                if queued.insert(dep.clone()) {
                    queue.push_back(dep);
                }
            }
        }
    }
    tracer.completed(&ValuesView { values: &values, initial });
    values
}

/// Worklist solving for systems with no enumerable `unknowns()`: starts
/// from `roots` (the unknowns the caller actually wants solved) and
/// discovers the dependency relation by recording every unknown each
/// body's `rho` argument is called with as it runs, the same on-the-fly
/// discovery a query-driven analyzer needs when it can't afford to
/// enumerate the whole (possibly infinite) unknown set up front. A
/// dependency read for the first time (not yet in `values`, and not
/// defined by `initial`) gets `V::default()` as its starting approximation
/// rather than failing outright; it's still enqueued, so once its own
/// equation is solved any dependent that read the placeholder gets
/// re-evaluated against the real value.
pub fn solve_infinite<U, V, S>(
    system: &S,
    initial: &dyn Assignment<U, V>,
    roots: Vec<U>,
) -> hashbrown::HashMap<U, V>
where
    U: Eq + Hash + Clone,
    V: Clone + PartialEq + Default,
    S: EquationSystem<U, V>,
{
    let mut values: hashbrown::HashMap<U, V> = hashbrown::HashMap::new();
    let mut rev_deps: hashbrown::HashMap<U, hashbrown::HashSet<U>> = hashbrown::HashMap::new();
    let mut seen: hashbrown::HashSet<U> = hashbrown::HashSet::new();
    let mut queue: VecDeque<U> = VecDeque::new();
    let mut queued: hashbrown::HashSet<U> = hashbrown::HashSet::new();

    for r in roots {
        if seen.insert(r.clone()) {
            queued.insert(r.clone());
            queue.push_back(r);
        }
    }

    while let Some(u) = queue.pop_front() {
        queued.remove(&u);

        if let Some(v) = initial.try_apply(&u) {
            values.insert(u.clone(), v);
            continue;
        }

        let recorded: RefCell<Vec<U>> = RefCell::new(Vec::new());
        let new_val = if let Some(bwd) = system.body_with_dependencies(&u) {
            let rho = |x: &U| fallback_value(&values, initial, x);
            bwd.apply_with_dependencies(&u, &rho, &mut |dep: &U| {
                recorded.borrow_mut().push(dep.clone())
            })
        } else {
            let rho = |x: &U| {
                recorded.borrow_mut().push(x.clone());
                fallback_value(&values, initial, x)
            };
            system.body(&u).apply(&u, &rho)
        };

        for dep in recorded.into_inner() {
            rev_deps
                .entry(dep.clone())
                .or_insert_with(hashbrown::HashSet::new)
                .insert(u.clone());
            if seen.insert(dep.clone()) {
                queued.insert(dep.clone());
                queue.push_back(dep);
            }
        }

        let changed = values.get(&u) != Some(&new_val);
        values.insert(u.clone(), new_val);

        if changed {
            if let Some(dependents) = rev_deps.get(&u) {
                for dep_u in dependents.iter() {
                    if queued.insert(dep_u.clone()) {
                        queue.push_back(dep_u.clone());
                    }
                }
            }
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::{EmptyAssignment, FnAssignment};
    use crate::system::Body;
    use std::rc::Rc;

    struct Counter;

    impl EquationSystem<u32, i32> for Counter {
        fn body(&self, u: &u32) -> Rc<dyn Body<u32, i32>> {
            let u = *u;
            Rc::new(move |_u: &u32, rho: &dyn Fn(&u32) -> i32| match u {
                0 => 0,
                1 => rho(&0) + 1,
                2 => rho(&1) + 1,
                _ => unreachable!(),
            })
        }
        fn input_unknowns(&self) -> Vec<u32> {
            vec![0]
        }
    }

    impl FiniteEquationSystem<u32, i32> for Counter {
        fn unknowns(&self) -> Vec<u32> {
            vec![0, 1, 2]
        }
        fn influence(&self, u: &u32) -> Vec<u32> {
            match u {
                0 => vec![1],
                1 => vec![2],
                _ => vec![],
            }
        }
    }

    #[test]
    fn finite_worklist_converges() {
        let initial = FnAssignment::new(|u: &u32| if *u == 0 { Some(0) } else { None });
        let values = solve_finite(&Counter, &initial);
        assert_eq!(values[&2], 2);
    }

    #[test]
    fn infinite_worklist_discovers_dependencies_from_roots() {
        let values = solve_infinite(&Counter, &EmptyAssignment, vec![2]);
        assert_eq!(values[&2], 2);
        assert_eq!(values[&1], 1);
        assert_eq!(values[&0], 0);
    }
}
