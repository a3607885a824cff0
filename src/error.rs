use std::fmt::Debug;

/// Free functions used at the few "this can only happen if a capability was
/// implemented incorrectly" sites in the solver core: an incomparable pair
/// handed to `upper_bound`, a strict `apply` on an unknown the assignment
/// has no fallback for, a graph whose edges disagree with its own node set.
///
/// These are programmer errors, not something a caller should plan to
/// recover from, so they panic rather than return a `Result`. Each takes
/// a `loc` tag naming the call site so a panic message is traceable
/// without a backtrace.
pub mod fatal {
    use super::Debug;

    pub fn domain_incomparable<T: Debug>(loc: &'static str, a: &T, b: &T) -> ! {
        panic!(
            "{loc}: upper_bound called on a pair with no defined upper bound.\n  a = {a:?}\n  b = {b:?}",
        );
    }

    pub fn empty_assignment_access<U: Debug>(loc: &'static str, u: &U) -> ! {
        panic!(
            "{loc}: strict apply() on an empty assignment with no fallback, looking for {u:?}. \
             Use is_defined_at() first, or construct with a fallback.",
        );
    }

    pub fn graph_contract_violation(loc: &'static str, detail: &str) -> ! {
        panic!("{loc}: graph equation system contract violated: {detail}");
    }

    pub fn negative_delay(loc: &'static str, k: i64) -> ! {
        panic!("{loc}: combo delay must be >= 0, got {k}");
    }

    pub fn combo_not_defined<U: Debug>(loc: &'static str, u: &U) -> ! {
        panic!("{loc}: combo assignment is not defined at unknown {u:?}");
    }
}

/// Result alias for the handful of construction-time mistakes a caller can
/// check in advance and recover from, as opposed to the fatal in-solver
/// contract violations above.
pub type FixResult<T> = Result<T, FixError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixError {
    /// `Relation::from_pairs` or a graph builder was given structurally
    /// inconsistent data (e.g. an edge naming a target with no declared
    /// node, duplicate edge ids).
    InconsistentGraph(String),
    /// A combo factory was asked to build a `Delayed`/`Cascade` combo with
    /// a negative delay count.
    InvalidDelay(i64),
    /// A `ComboAssignment` built from a map was queried for an unknown it
    /// does not cover, where the caller explicitly asked for a checked
    /// lookup (`try_combo`) instead of the panicking default.
    ComboUndefined(String),
}

impl std::fmt::Display for FixError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            FixError::InconsistentGraph(detail) => {
                write!(f, "inconsistent graph equation system: {detail}")
            }
            FixError::InvalidDelay(k) => write!(f, "invalid combo delay: {k}"),
            FixError::ComboUndefined(u) => write!(f, "combo assignment undefined at {u}"),
        }
    }
}

impl std::error::Error for FixError {}
