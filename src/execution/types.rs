use chrono::NaiveDate;
use crate::data::types::Asset;
use crate::strategies::types::Leg;

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub asset: Asset,
    /// Signed share count; negative for shorts.
    pub amount: f64,
    pub cost_basis: f64,
    pub last_price: f64,
}

impl Position {
    pub fn market_value(&self) -> f64 {
        self.amount * self.last_price
    }

    pub fn is_long(&self) -> bool {
        self.amount > 0.0
    }

    pub fn is_short(&self) -> bool {
        self.amount < 0.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub asset: Asset,
    pub day: NaiveDate,
    /// Signed share delta.
    pub shares: f64,
    pub price: f64,
    pub commission: f64,
}

impl Fill {
    pub fn notional(&self) -> f64 {
        self.shares * self.price
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionStatus {
    Submitted,
    SkippedUntradable,
    Rejected,
}

impl InstructionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstructionStatus::Submitted => "submitted",
            InstructionStatus::SkippedUntradable => "skipped_untradable",
            InstructionStatus::Rejected => "rejected",
        }
    }
}

/// A target-weight instruction as the driver handled it.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub day: NaiveDate,
    pub asset: Asset,
    pub weight: f64,
    pub leg: Leg,
    pub status: InstructionStatus,
}
