//! Arbitrage module for detecting and executing cross-venue opportunities.
//!
//! This module handles:
//! - Leg sums and buffered limit prices
//! - Band detection with leg-1 priority
//! - At-most-once execution per (ticker, leg)

pub mod calculator;
pub mod detector;
pub mod executor;

pub use calculator::{leg_sum, ArbOpportunity, Leg};
pub use detector::{detect, ArbBand, Detection, LegSums};
pub use executor::{
    ArbExecutionState, ArbitrageExecutor, EvaluateOutcome, ExecutorSettings, ExecutorStats,
    LegExecution, SharedExecutionState, Submission,
};
