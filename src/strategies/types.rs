use crate::data::types::Asset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Leg {
    Long,
    Short,
    Flatten,
}

impl std::fmt::Display for Leg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Leg::Long => write!(f, "long"),
            Leg::Short => write!(f, "short"),
            Leg::Flatten => write!(f, "flatten"),
        }
    }
}

/// One asset's classification for a day. `quantile` is informational only;
/// orders are driven by the threshold flags.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub asset: Asset,
    pub score: f64,
    pub rank: f64,
    pub quantile: usize,
    pub is_long: bool,
    pub is_short: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TargetWeight {
    pub asset: Asset,
    pub weight: f64,
    pub leg: Leg,
}
