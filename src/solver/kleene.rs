//! The snapshot-based solver: each round
//! reads entirely from the *previous* round's completed values and writes
//! into a fresh map, instead of updating in place as `round_robin` does.
//! This is literally iterating the Kleene sequence `F^0(bottom), F^1(...),
//! ...`: round `n+1`'s value at `u` only ever depends on round `n`'s
//! values, never on values already updated earlier in the same round.

use crate::assignment::Assignment;
use crate::solver::{eval, seed, ValuesView};
use crate::system::FiniteEquationSystem;
use crate::tracer::{NullTracer, Tracer};
use std::hash::Hash;

pub fn solve<U, V, S>(system: &S, initial: &dyn Assignment<U, V>) -> hashbrown::HashMap<U, V>
where
    U: Eq + Hash + Clone,
    V: Clone + PartialEq,
    S: FiniteEquationSystem<U, V>,
{
    solve_traced(system, initial, &mut NullTracer)
}

pub fn solve_traced<U, V, S>(
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
    let mut current = seed(initial, &unknowns);
    tracer.initialized(&ValuesView { values: &current, initial });

    loop {
        let mut next = current.clone();
        let mut changed = false;
        for u in &unknowns {
            if inputs.contains(u) {
                continue;
            }
            let new_val = eval(system, initial, &current, u);
            if current.get(u) != Some(&new_val) {
                changed = true;
            }
            next.insert(u.clone(), new_val.clone());
            tracer.evaluated(&ValuesView { values: &next, initial }, u, &new_val);
        }
        current = next;
        if !changed {
            break;
        }
    }
    tracer.completed(&ValuesView { values: &current, initial });
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::FnAssignment;
    use crate::system::{Body, EquationSystem};
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
    fn converges_reading_only_the_prior_snapshot() {
        let initial = FnAssignment::new(|u: &u32| if *u == 0 { Some(0) } else { None });
        let values = solve(&Counter, &initial);
        assert_eq!(values[&1], 1);
        assert_eq!(values[&2], 2);
    }
}
