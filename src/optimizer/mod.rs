//! Optimiser (C6, `spec.md` §4.5): a multi-pass hill-climber over
//! `Schedule`, scored by C7 and backed by the worker pool (C4).
//!
//! Grounded on the teacher's `optimizer::dp::DynamicProgrammingOptimizer`
//! and `optimizer::greedy::GreedyOptimizer` for the general shape of "try a
//! candidate action, simulate, keep the best" — but `spec.md` §4.5 calls
//! for neither dynamic programming nor a single greedy threshold; it wants
//! a hill-climber with four ordered passes of increasing granularity, so
//! that is what this module implements.

pub mod config;
pub mod passes;

pub use config::OptimizerConfig;
pub use passes::run_optimizer;
