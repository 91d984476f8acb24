pub mod persistence;
pub mod simulator;
pub mod types;

use anyhow::Result;
use chrono::NaiveDate;
use crate::data::types::Asset;
use types::{Fill, Position};

/// Order-management side of the rebalance: tradability checks, target-weight
/// instructions and the current book.
pub trait ExecutionVenue {
    /// Called once at the start of each trading day before any event fires.
    fn begin_day(&mut self, _day: NaiveDate) {}

    fn is_tradable(&self, asset: &Asset, day: NaiveDate) -> bool;

    /// Move the position in `asset` toward `weight` of portfolio value.
    fn set_target_weight(&mut self, asset: &Asset, weight: f64) -> Result<Option<Fill>>;

    fn held_positions(&self) -> Vec<Position>;

    fn leverage(&self) -> f64;

    fn portfolio_value(&self) -> f64;
}
