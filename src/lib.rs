//! Daily sentiment-driven long/short portfolio construction.
//!
//! A day's sentiment snapshot is filtered into a universe, ranked into
//! quantiles and split into long/short sets by fixed thresholds. The sets are
//! turned into equal-weight targets and submitted to an execution venue once
//! per day, with an end-of-day record of the resulting book.

pub mod config;
pub mod data;
pub mod engine;
pub mod execution;
pub mod monitoring;
pub mod strategies;
