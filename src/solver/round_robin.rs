//! The naive fixpoint solver: sweep
//! every non-input unknown in a fixed order, updating in place as it
//! goes, and repeat until a full sweep makes no change. Simple, always
//! correct for a monotone system over a domain of finite height, and the
//! baseline every other solver is judged against for iteration count.

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
    let mut values = seed(initial, &unknowns);
    tracer.initialized(&ValuesView { values: &values, initial });

    loop {
        let mut changed = false;
        for u in &unknowns {
            if inputs.contains(u) {
                continue;
            }
            let new_val = eval(system, initial, &values, u);
            let is_new = values.get(u) != Some(&new_val);
            if is_new {
                changed = true;
            }
            values.insert(u.clone(), new_val.clone());
            tracer.evaluated(&ValuesView { values: &values, initial }, u, &new_val);
        }
        if !changed {
            break;
        }
    }
    tracer.completed(&ValuesView { values: &values, initial });
    values
}
