//! Observability for a solver run: synchronous event callbacks a caller
//! can hook into an invocation without the solver itself taking on any
//! logging policy.
//!
//! This module reaches for the `tracing` crate for structured diagnostics,
//! gated behind a Cargo feature — logging is excluded from scope only as
//! driver-scoped CLI output, not as an ambient concern, so the solver core
//! still gets a proper `tracing` integration rather than `println!`.

use crate::assignment::Assignment;
use std::hash::Hash;

/// The five solver-run events. All callbacks are synchronous: the solver
/// does not continue until a call returns.
pub trait Tracer<U, V> {
    fn initialized(&mut self, _rho: &dyn Assignment<U, V>) {}
    fn evaluated(&mut self, _rho: &dyn Assignment<U, V>, _u: &U, _new_value: &V) {}
    fn completed(&mut self, _rho: &dyn Assignment<U, V>) {}
    fn ascending_begins(&mut self, _rho: &dyn Assignment<U, V>) {}
    fn descending_begins(&mut self, _rho: &dyn Assignment<U, V>) {}
}

/// The default: does nothing, at zero cost. Every solver entry point in
/// `driver` takes a `&mut dyn Tracer<U, V>`, so a caller who doesn't care
/// about events passes `&mut NullTracer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTracer;

impl<U, V> Tracer<U, V> for NullTracer {}

/// Emits a `tracing::trace!`/`tracing::debug!` event per callback, behind
/// the crate's `tracing` feature. `evaluated` fires at `trace!` level
/// (one per re-evaluation, potentially a lot of them on a large system);
/// the phase-boundary events fire at `debug!`.
#[cfg(feature = "tracing")]
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingTracer;

#[cfg(feature = "tracing")]
impl<U: std::fmt::Debug, V: std::fmt::Debug> Tracer<U, V> for LoggingTracer {
    fn initialized(&mut self, _rho: &dyn Assignment<U, V>) {
        tracing::debug!("solver initialized");
    }
    fn evaluated(&mut self, _rho: &dyn Assignment<U, V>, u: &U, new_value: &V) {
        tracing::trace!(unknown = ?u, value = ?new_value, "evaluated");
    }
    fn completed(&mut self, _rho: &dyn Assignment<U, V>) {
        tracing::debug!("solver completed");
    }
    fn ascending_begins(&mut self, _rho: &dyn Assignment<U, V>) {
        tracing::debug!("ascending phase begins");
    }
    fn descending_begins(&mut self, _rho: &dyn Assignment<U, V>) {
        tracing::debug!("descending phase begins");
    }
}

/// One observed event, stripped of the assignment snapshot (which isn't
/// `Clone`-friendly in general) down to the parts a test assertion cares
/// about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event<U, V> {
    Initialized,
    Evaluated(U, V),
    Completed,
    AscendingBegins,
    DescendingBegins,
}

/// Appends every observed event to an in-memory log, in order, for
/// asserting tracer-sequencing properties in tests. A plain append-only
/// `Vec`: there's no need to dedupe events here, only to preserve their
/// order.
#[derive(Debug, Default)]
pub struct RecordingTracer<U, V> {
    pub events: Vec<Event<U, V>>,
}

impl<U, V> RecordingTracer<U, V> {
    pub fn new() -> Self {
        RecordingTracer { events: Vec::new() }
    }
}

impl<U, V> Tracer<U, V> for RecordingTracer<U, V>
where
    U: Eq + Hash + Clone,
    V: Clone,
{
    fn initialized(&mut self, _rho: &dyn Assignment<U, V>) {
        self.events.push(Event::Initialized);
    }
    fn evaluated(&mut self, _rho: &dyn Assignment<U, V>, u: &U, new_value: &V) {
        self.events.push(Event::Evaluated(u.clone(), new_value.clone()));
    }
    fn completed(&mut self, _rho: &dyn Assignment<U, V>) {
        self.events.push(Event::Completed);
    }
    fn ascending_begins(&mut self, _rho: &dyn Assignment<U, V>) {
        self.events.push(Event::AscendingBegins);
    }
    fn descending_begins(&mut self, _rho: &dyn Assignment<U, V>) {
        self.events.push(Event::DescendingBegins);
    }
}
