//! The ordering-aware solver: walks a `HierarchicalOrdering` directly
//! rather than discovering
//! structure as it goes. A nested component is stabilized by iterating
//! its body until the head unknown stops changing (or, under
//! `RestartStrategy::None`, by a single descent — appropriate when the
//! combo placed at the head, e.g. a widening, is already relied on to
//! force convergence in one pass).

use crate::assignment::Assignment;
use crate::ordering::{Component, HierarchicalOrdering};
use crate::solver::{eval, ValuesView};
use crate::system::EquationSystem;
use crate::tracer::{NullTracer, Tracer};
use std::hash::Hash;

/// Whether a stabilized loop head gets re-descended into its body after a
/// change, or whether one descent per encounter is trusted to suffice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartStrategy {
    /// Descend into a component's body exactly once per encounter.
    None,
    /// Keep re-descending into a component's body until its head value
    /// stops changing.
    Restart,
}

pub fn solve<U, V, S>(
    system: &S,
    initial: &dyn Assignment<U, V>,
    ordering: &HierarchicalOrdering<U>,
    restart: RestartStrategy,
) -> hashbrown::HashMap<U, V>
where
    U: Eq + Hash + Clone,
    V: Clone + PartialEq,
    S: EquationSystem<U, V>,
{
    solve_traced(system, initial, ordering, restart, &mut NullTracer)
}

pub fn solve_traced<U, V, S>(
    system: &S,
    initial: &dyn Assignment<U, V>,
    ordering: &HierarchicalOrdering<U>,
    restart: RestartStrategy,
    tracer: &mut dyn Tracer<U, V>,
) -> hashbrown::HashMap<U, V>
where
    U: Eq + Hash + Clone,
    V: Clone + PartialEq,
    S: EquationSystem<U, V>,
{
    let inputs: hashbrown::HashSet<U> = system.input_unknowns().into_iter().collect();
    let mut values = hashbrown::HashMap::new();
    for u in &inputs {
        if let Some(v) = initial.try_apply(u) {
            values.insert(u.clone(), v);
        }
    }
    tracer.initialized(&ValuesView { values: &values, initial });
    stabilize(system, initial, ordering.components(), &mut values, &inputs, restart, tracer);
    tracer.completed(&ValuesView { values: &values, initial });
    values
}

fn stabilize<U, V, S>(
    system: &S,
    initial: &dyn Assignment<U, V>,
    components: &[Component<U>],
    values: &mut hashbrown::HashMap<U, V>,
    inputs: &hashbrown::HashSet<U>,
    restart: RestartStrategy,
    tracer: &mut dyn Tracer<U, V>,
) where
    U: Eq + Hash + Clone,
    V: Clone + PartialEq,
    S: EquationSystem<U, V>,
{
    for component in components {
        match component {
            Component::Vertex(u) => {
                if !inputs.contains(u) {
                    let new_val = eval(system, initial, values, u);
                    values.insert(u.clone(), new_val.clone());
                    tracer.evaluated(&ValuesView { values, initial }, u, &new_val);
                }
            }
            Component::Nested { head, body } => loop {
                let before = values.get(head).cloned();
                stabilize(system, initial, body, values, inputs, restart, tracer);
                if !inputs.contains(head) {
                    let new_head = eval(system, initial, values, head);
                    values.insert(head.clone(), new_head.clone());
                    tracer.evaluated(&ValuesView { values, initial }, head, &new_head);
                }
                let after = values.get(head).cloned();
                match restart {
                    RestartStrategy::None => break,
                    RestartStrategy::Restart => {
                        if after == before {
                            break;
                        }
                    }
                }
            },
        }
    }
}
