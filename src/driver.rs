//! The high-level CC77 driver: picks a solver, wraps the equation system
//! with a widening combo assignment according to a placement/scope
//! policy, runs it ("ascending"), then — unless the strategy says
//! otherwise — wraps the *original* system with a narrowing combo
//! assignment and runs it again from the ascending result ("descending").
//! `Warrowing` collapses both phases into one, using a single combo that
//! behaves as widening or narrowing depending on the contribution.
//!
//! `Parameters` doesn't carry a tracer field: every solver in `solver::*`
//! already takes its tracer as a trailing `&mut dyn Tracer<U, V>` rather
//! than bundling it into a config struct, and the driver needs exclusive
//! access to it across two sequential solver calls — holding it behind a
//! `RefCell` just to fit it inside `Parameters` would trade a real
//! aliasing hazard for no benefit. `run`/`run_traced` follow the same
//! split every other entry point in this crate uses: a plain `run` for
//! callers who don't care, `run_traced` for callers who do.

use crate::assignment::Assignment;
use crate::combo::{Combo, ComboAssignment, Warrowing};
use crate::domain::OrderedDomain;
use crate::graph::{GraphEquationSystem, WithLocalizedWarrowing};
use crate::ordering::{DFOrdering, GraphOrdering, HierarchicalOrdering};
use crate::solver::priority_worklist::DynamicPriority;
use crate::solver::{hierarchical, kleene, priority_worklist, round_robin, worklist};
use crate::system::{FiniteEquationSystem, WithCombos, WithLocalizedCombos};
use crate::tracer::{NullTracer, Tracer};
use std::hash::Hash;
use std::rc::Rc;

/// Which solver the driver hands the wrapped system to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Solver {
    RoundRobin,
    Kleene,
    WorkList,
    PriorityWorkList,
    HierarchicalOrdering,
}

/// Where combos are placed. `None`: no combos
/// applied. `All`: the combo assignment is used as-is, everywhere it's
/// defined. `Loop`: restricted to unknowns that are heads (back-edge
/// targets) in the system's depth-first ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComboLocation {
    None,
    All,
    Loop,
}

/// Whether a placed combo folds into every unknown's body (`Standard`,
/// via `WithCombos`) or only the unknowns in the placement set
/// (`Localized`, via `WithLocalizedCombos`) — see `graph.rs`'s note on why
/// CC77 defaults to the latter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComboScope {
    Standard,
    Localized,
}

/// Whether the driver runs the full two-phase ascending/descending chain,
/// stops after ascending, or collapses both into a single warrowing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComboStrategy {
    OnlyWidening,
    TwoPhases,
    Warrowing,
}

pub use crate::solver::hierarchical::RestartStrategy;

/// The driver's full configuration, minus the tracer (see module doc).
pub struct Parameters<U, V> {
    pub solver: Solver,
    pub start: Rc<dyn Assignment<U, V>>,
    pub combo_location: ComboLocation,
    pub combo_scope: ComboScope,
    pub combo_strategy: ComboStrategy,
    pub restart_strategy: RestartStrategy,
    pub widenings: ComboAssignment<U, V>,
    pub narrowings: ComboAssignment<U, V>,
}

impl<U, V> Parameters<U, V>
where
    U: Eq + Hash + Clone,
{
    /// CC77's usual defaults: combos placed at loop heads only, applied
    /// locally rather than at every unknown, a full widen-then-narrow
    /// chain, and restarting the hierarchical solver's inner components
    /// on change.
    pub fn new(
        solver: Solver,
        start: Rc<dyn Assignment<U, V>>,
        widenings: ComboAssignment<U, V>,
        narrowings: ComboAssignment<U, V>,
    ) -> Self {
        Parameters {
            solver,
            start,
            combo_location: ComboLocation::Loop,
            combo_scope: ComboScope::Localized,
            combo_strategy: ComboStrategy::TwoPhases,
            restart_strategy: RestartStrategy::Restart,
            widenings,
            narrowings,
        }
    }
}

/// Adapts any `FiniteEquationSystem` into a `GraphOrdering` by treating
/// `influence` as the successor relation and `input_unknowns` as the
/// roots — exactly the direction `DFOrdering`/`HierarchicalOrdering` need
/// to find loop heads or build a hierarchical walk, without requiring the
/// caller's system to be graph-shaped.
struct InfluenceOrdering<'a, S> {
    system: &'a S,
}

impl<'a, S, U, V> GraphOrdering<U> for InfluenceOrdering<'a, S>
where
    S: FiniteEquationSystem<U, V>,
    U: Clone,
{
    fn successors(&self, u: &U) -> Vec<U> {
        self.system.influence(u)
    }
    fn roots(&self) -> Vec<U> {
        self.system.input_unknowns()
    }
}

/// Resolves a `ComboLocation` into a concrete set of unknowns to place
/// combos at, for a given system and combo assignment.
fn combo_heads<U, V, S>(
    system: &S,
    combos: &ComboAssignment<U, V>,
    location: ComboLocation,
) -> hashbrown::HashSet<U>
where
    U: Eq + Hash + Clone,
    S: FiniteEquationSystem<U, V>,
{
    match location {
        ComboLocation::None => hashbrown::HashSet::new(),
        ComboLocation::All => system
            .unknowns()
            .into_iter()
            .filter(|u| combos.is_defined_at(u))
            .collect(),
        ComboLocation::Loop => {
            let ordering = InfluenceOrdering { system };
            let df = DFOrdering::build(&ordering);
            df.back_edges()
                .map(|(_, to)| to.clone())
                .filter(|u| combos.is_defined_at(u))
                .collect()
        }
    }
}

fn run_solver<U, V, S>(
    system: &S,
    start: &dyn Assignment<U, V>,
    solver: Solver,
    restart: RestartStrategy,
    tracer: &mut dyn Tracer<U, V>,
) -> hashbrown::HashMap<U, V>
where
    U: Eq + Hash + Clone + 'static,
    V: Clone + PartialEq + 'static,
    S: FiniteEquationSystem<U, V>,
{
    match solver {
        Solver::RoundRobin => round_robin::solve_traced(system, start, tracer),
        Solver::Kleene => kleene::solve_traced(system, start, tracer),
        Solver::WorkList => worklist::solve_finite_traced(system, start, tracer),
        Solver::PriorityWorkList => {
            let priority: DynamicPriority<U> = DynamicPriority::new();
            priority_worklist::solve_finite_traced(system, start, &priority, tracer)
        }
        Solver::HierarchicalOrdering => {
            let ordering_system = InfluenceOrdering { system };
            let ordering = HierarchicalOrdering::build(&ordering_system);
            hierarchical::solve_traced(system, start, &ordering, restart, tracer)
        }
    }
}

/// Wraps `system` with `combos` according to `location`/`scope` and runs
/// `solver` against it from `start` — one phase of the two-phase chain.
fn run_phase<U, V, S>(
    system: S,
    combos: ComboAssignment<U, V>,
    location: ComboLocation,
    scope: ComboScope,
    start: &dyn Assignment<U, V>,
    solver: Solver,
    restart: RestartStrategy,
    tracer: &mut dyn Tracer<U, V>,
) -> hashbrown::HashMap<U, V>
where
    U: Eq + Hash + Clone + 'static,
    V: Clone + PartialEq + 'static,
    S: FiniteEquationSystem<U, V> + 'static,
{
    let heads = combo_heads(&system, &combos, location);
    match scope {
        ComboScope::Standard => {
            let restricted = combos.restrict_to(&heads);
            let wrapped = WithCombos::new(system, restricted);
            run_solver(&wrapped, start, solver, restart, tracer)
        }
        ComboScope::Localized => {
            let wrapped = WithLocalizedCombos::new(system, combos, heads);
            run_solver(&wrapped, start, solver, restart, tracer)
        }
    }
}

/// A read-only `Assignment` over a completed phase's results, falling
/// back to `base` — used to seed the descending phase from the ascending
/// phase's output.
struct PhaseResult<'a, U, V> {
    values: hashbrown::HashMap<U, V>,
    base: &'a dyn Assignment<U, V>,
}

impl<'a, U: Eq + Hash, V: Clone> Assignment<U, V> for PhaseResult<'a, U, V> {
    fn is_defined_at(&self, u: &U) -> bool {
        self.values.contains_key(u) || self.base.is_defined_at(u)
    }
    fn apply(&self, u: &U) -> V {
        match self.values.get(u) {
            Some(v) => v.clone(),
            None => self.base.apply(u),
        }
    }
}

pub fn run<U, V, S>(system: S, params: Parameters<U, V>) -> hashbrown::HashMap<U, V>
where
    U: Eq + Hash + Clone + 'static,
    V: OrderedDomain + PartialEq + 'static,
    S: FiniteEquationSystem<U, V> + Clone + 'static,
{
    run_traced(system, params, &mut NullTracer)
}

/// The two-phase ascending/descending chain: for
/// `OnlyWidening`, phase 2 is skipped entirely. For `Warrowing`, the
/// widening and narrowing assignments are fused into a single
/// per-unknown `Warrowing` combo and run in one pass instead.
pub fn run_traced<U, V, S>(
    system: S,
    params: Parameters<U, V>,
    tracer: &mut dyn Tracer<U, V>,
) -> hashbrown::HashMap<U, V>
where
    U: Eq + Hash + Clone + 'static,
    V: OrderedDomain + PartialEq + 'static,
    S: FiniteEquationSystem<U, V> + Clone + 'static,
{
    match params.combo_strategy {
        ComboStrategy::OnlyWidening => {
            tracer.ascending_begins(params.start.as_ref());
            run_phase(
                system,
                params.widenings.copy(),
                params.combo_location,
                params.combo_scope,
                params.start.as_ref(),
                params.solver,
                params.restart_strategy,
                tracer,
            )
        }
        ComboStrategy::TwoPhases => {
            tracer.ascending_begins(params.start.as_ref());
            let ascended = run_phase(
                system.clone(),
                params.widenings.copy(),
                params.combo_location,
                params.combo_scope,
                params.start.as_ref(),
                params.solver,
                params.restart_strategy,
                tracer,
            );
            let phase1 = PhaseResult {
                values: ascended,
                base: params.start.as_ref(),
            };
            tracer.descending_begins(&phase1);
            run_phase(
                system,
                params.narrowings.copy(),
                params.combo_location,
                params.combo_scope,
                &phase1,
                params.solver,
                params.restart_strategy,
                tracer,
            )
        }
        ComboStrategy::Warrowing => {
            let unknowns = system.unknowns();
            let mut map: hashbrown::HashMap<U, Rc<dyn Combo<V>>> =
                hashbrown::HashMap::with_capacity(unknowns.len());
            for u in &unknowns {
                let widen = params.widenings.combo(u);
                let narrow = params.narrowings.combo(u);
                map.insert(u.clone(), Rc::new(Warrowing::new(widen, narrow)) as Rc<dyn Combo<V>>);
            }
            let warrow_combos = ComboAssignment::from_map(map);
            tracer.ascending_begins(params.start.as_ref());
            run_phase(
                system,
                warrow_combos,
                params.combo_location,
                params.combo_scope,
                params.start.as_ref(),
                params.solver,
                params.restart_strategy,
                tracer,
            )
        }
    }
}

/// The graph+localized+warrowing special case: skips `Parameters`
/// entirely and runs a single pass directly against a
/// `WithLocalizedWarrowing`-wrapped graph system.
pub fn run_graph_warrowing<G, U, V>(
    graph: G,
    widen: Rc<dyn Combo<V>>,
    narrow: Rc<dyn Combo<V>>,
    start: &dyn Assignment<U, V>,
    solver: Solver,
    restart: RestartStrategy,
    tracer: &mut dyn Tracer<U, V>,
) -> hashbrown::HashMap<U, V>
where
    G: GraphEquationSystem<U, V>,
    U: Eq + Hash + Clone + std::fmt::Debug + 'static,
    V: OrderedDomain + PartialEq + 'static,
{
    let wrapped = WithLocalizedWarrowing::new(graph, widen, narrow);
    tracer.ascending_begins(start);
    run_solver(&wrapped, start, solver, restart, tracer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::{Assignment, ConstAssignment, FnAssignment};
    use crate::combo::{Narrowing, Widening};
    use crate::domain::{Magma, UpperBoundMagma};
    use crate::graph::{Edge, FnEdge, GraphSystemAdapter};
    use crate::tracer::{Event, RecordingTracer};
    use std::cmp::Ordering;

    /// A saturating extended-integer domain: `-inf <= n <= +inf` for every
    /// finite `n`, used for the CC77 worked example below (a widening that
    /// jumps straight to `+inf` and a narrowing that keeps whatever's
    /// already finite).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum ExtInt {
        NegInf,
        Fin(i64),
        PosInf,
    }

    impl PartialOrd for ExtInt {
        fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
            use ExtInt::*;
            Some(match (self, other) {
                (NegInf, NegInf) | (PosInf, PosInf) => Ordering::Equal,
                (NegInf, _) => Ordering::Less,
                (_, NegInf) => Ordering::Greater,
                (PosInf, _) => Ordering::Greater,
                (_, PosInf) => Ordering::Less,
                (Fin(a), Fin(b)) => a.cmp(b),
            })
        }
    }

    fn cap_at_ten(v: ExtInt) -> ExtInt {
        match v {
            ExtInt::NegInf => ExtInt::NegInf,
            ExtInt::Fin(x) => ExtInt::Fin(x.min(10)),
            ExtInt::PosInf => ExtInt::Fin(10),
        }
    }

    fn inc(v: ExtInt) -> ExtInt {
        match v {
            ExtInt::NegInf => ExtInt::NegInf,
            ExtInt::Fin(x) => ExtInt::Fin(x + 1),
            ExtInt::PosInf => ExtInt::PosInf,
        }
    }

    fn widen(old: &ExtInt, new: &ExtInt) -> ExtInt {
        if new.leq(old) {
            *old
        } else {
            ExtInt::PosInf
        }
    }

    fn narrow(old: &ExtInt, new: &ExtInt) -> ExtInt {
        if *old == ExtInt::PosInf {
            *new
        } else if new.leq(old) {
            *new
        } else {
            *old
        }
    }

    /// The worked example: `0 -> 1 -> 2 -> 3 -> 1`, edge actions
    /// `a(rho)=rho(0)`, `b(rho)=min(rho(1),10)`, `c(rho)=rho(2)+1`,
    /// `d(rho)=rho(3)`, combiner `max`, input `{0}`.
    #[derive(Clone, Copy)]
    struct FourNode;

    impl GraphEquationSystem<u32, ExtInt> for FourNode {
        fn nodes(&self) -> Vec<u32> {
            vec![0, 1, 2, 3]
        }
        fn edges(&self) -> Vec<Rc<dyn Edge<u32, ExtInt>>> {
            vec![
                Rc::new(FnEdge {
                    sources: vec![0],
                    target: 1,
                    action: |rho: &dyn Fn(&u32) -> ExtInt| rho(&0),
                }),
                Rc::new(FnEdge {
                    sources: vec![1],
                    target: 2,
                    action: |rho: &dyn Fn(&u32) -> ExtInt| cap_at_ten(rho(&1)),
                }),
                Rc::new(FnEdge {
                    sources: vec![2],
                    target: 3,
                    action: |rho: &dyn Fn(&u32) -> ExtInt| inc(rho(&2)),
                }),
                Rc::new(FnEdge {
                    sources: vec![3],
                    target: 1,
                    action: |rho: &dyn Fn(&u32) -> ExtInt| rho(&3),
                }),
            ]
        }
        fn ingoing(&self, u: &u32) -> Vec<Rc<dyn Edge<u32, ExtInt>>> {
            self.edges().into_iter().filter(|e| e.target() == *u).collect()
        }
        fn combiner(&self, _u: &u32) -> Rc<dyn Magma<ExtInt>> {
            Rc::new(UpperBoundMagma)
        }
        fn input_unknowns(&self) -> Vec<u32> {
            vec![0]
        }
    }

    fn scenario_start() -> Rc<dyn Assignment<u32, ExtInt>> {
        Rc::new(FnAssignment::new(|u: &u32| {
            Some(if *u == 0 { ExtInt::Fin(0) } else { ExtInt::NegInf })
        }))
    }

    fn scenario_widenings() -> ComboAssignment<u32, ExtInt> {
        ComboAssignment::uniform(Rc::new(Widening::new(widen)))
    }

    fn scenario_narrowings() -> ComboAssignment<u32, ExtInt> {
        ComboAssignment::uniform(Rc::new(Narrowing::new(narrow)))
    }

    #[test]
    fn two_phase_cc77_matches_the_worked_example() {
        let params = Parameters::new(Solver::WorkList, scenario_start(), scenario_widenings(), scenario_narrowings());
        let values = run(GraphSystemAdapter::new(FourNode), params);
        assert_eq!(values[&0], ExtInt::Fin(0));
        assert_eq!(values[&1], ExtInt::Fin(11));
        assert_eq!(values[&2], ExtInt::Fin(10));
        assert_eq!(values[&3], ExtInt::Fin(11));
    }

    #[test]
    fn only_widening_skips_the_descending_phase() {
        let mut params = Parameters::new(Solver::WorkList, scenario_start(), scenario_widenings(), scenario_narrowings());
        params.combo_strategy = ComboStrategy::OnlyWidening;
        let values = run(GraphSystemAdapter::new(FourNode), params);
        assert_eq!(values[&0], ExtInt::Fin(0));
        assert_eq!(values[&1], ExtInt::PosInf);
        assert_eq!(values[&2], ExtInt::Fin(10));
        assert_eq!(values[&3], ExtInt::Fin(11));
    }

    #[test]
    fn priority_worklist_with_dynamic_ordering_matches_worklist() {
        let mut params = Parameters::new(Solver::PriorityWorkList, scenario_start(), scenario_widenings(), scenario_narrowings());
        params.combo_strategy = ComboStrategy::TwoPhases;
        let values = run(GraphSystemAdapter::new(FourNode), params);
        assert_eq!(values[&1], ExtInt::Fin(11));
        assert_eq!(values[&2], ExtInt::Fin(10));
        assert_eq!(values[&3], ExtInt::Fin(11));
    }

    #[test]
    fn hierarchical_ordering_solver_matches_worklist() {
        let params = Parameters::new(
            Solver::HierarchicalOrdering,
            scenario_start(),
            scenario_widenings(),
            scenario_narrowings(),
        );
        let values = run(GraphSystemAdapter::new(FourNode), params);
        assert_eq!(values[&1], ExtInt::Fin(11));
        assert_eq!(values[&2], ExtInt::Fin(10));
        assert_eq!(values[&3], ExtInt::Fin(11));
    }

    #[test]
    fn warrowing_reaches_the_same_fixpoint_in_one_pass() {
        let mut params = Parameters::new(Solver::WorkList, scenario_start(), scenario_widenings(), scenario_narrowings());
        params.combo_strategy = ComboStrategy::Warrowing;
        let values = run(GraphSystemAdapter::new(FourNode), params);
        assert_eq!(values[&1], ExtInt::Fin(11));
        assert_eq!(values[&2], ExtInt::Fin(10));
        assert_eq!(values[&3], ExtInt::Fin(11));
    }

    #[test]
    fn constant_start_never_rises_above_its_own_floor() {
        let start: Rc<dyn Assignment<u32, ExtInt>> = Rc::new(ConstAssignment(ExtInt::NegInf));
        let params = Parameters::new(Solver::WorkList, start, scenario_widenings(), scenario_narrowings());
        let values = run(GraphSystemAdapter::new(FourNode), params);
        for u in 0..4u32 {
            assert_eq!(values[&u], ExtInt::NegInf);
        }
    }

    #[test]
    fn tracer_sequencing_brackets_the_two_phases() {
        let params = Parameters::new(Solver::WorkList, scenario_start(), scenario_widenings(), scenario_narrowings());
        let mut tracer: RecordingTracer<u32, ExtInt> = RecordingTracer::new();
        run_traced(GraphSystemAdapter::new(FourNode), params, &mut tracer);

        let first_evaluated = tracer.events.iter().position(|e| matches!(e, Event::Evaluated(_, _)));
        let first_ascending = tracer.events.iter().position(|e| matches!(e, Event::AscendingBegins));
        let first_descending = tracer.events.iter().position(|e| matches!(e, Event::DescendingBegins));
        let completions: Vec<usize> = tracer
            .events
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e, Event::Completed))
            .map(|(i, _)| i)
            .collect();

        assert_eq!(first_ascending, Some(0));
        assert!(first_evaluated.unwrap() > first_ascending.unwrap());
        assert_eq!(completions.len(), 2);
        assert!(first_descending.unwrap() > completions[0]);
        assert!(completions[1] > first_descending.unwrap());
    }
}
