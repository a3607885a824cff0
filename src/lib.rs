//! `fixrs`: solvers for fixpoint equation systems over ordered domains,
//! with widening/narrowing/warrowing acceleration.
//!
//! A client builds an [`system::EquationSystem`] (possibly the graph
//! specialization, [`graph::GraphEquationSystem`]), optionally layers
//! combos onto it (`system::WithCombos`, `system::WithLocalizedCombos`),
//! hands it to one of the five [`solver`] families, or drives the whole
//! widen/narrow chain through [`driver::run`].

pub mod assignment;
pub mod combo;
pub mod domain;
pub mod driver;
pub mod error;
pub mod graph;
pub mod ordering;
pub mod relation;
pub mod solver;
pub mod system;
pub mod tracer;
