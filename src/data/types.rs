use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque identifier for a tradeable instrument.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Asset(String);

impl Asset {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    pub fn symbol(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sentiment scores for a single trading day. `None` means the feed had no
/// reading for that asset.
#[derive(Debug, Clone, Default)]
pub struct SignalSnapshot {
    scores: BTreeMap<Asset, Option<f64>>,
}

impl SignalSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, asset: Asset, score: Option<f64>) {
        self.scores.insert(asset, score);
    }

    pub fn score(&self, asset: &Asset) -> Option<f64> {
        self.scores.get(asset).copied().flatten()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Asset, Option<f64>)> {
        self.scores.iter().map(|(asset, score)| (asset, *score))
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

impl FromIterator<(Asset, Option<f64>)> for SignalSnapshot {
    fn from_iter<I: IntoIterator<Item = (Asset, Option<f64>)>>(iter: I) -> Self {
        Self {
            scores: iter.into_iter().collect(),
        }
    }
}

/// Per-asset facts for one day, as delivered by the data feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetFacts {
    #[serde(default)]
    pub in_base_universe: bool,
    #[serde(default)]
    pub signal_asof: Option<NaiveDate>,
    #[serde(default)]
    pub days_until_earnings: Option<u32>,
    #[serde(default)]
    pub days_since_earnings: Option<u32>,
    #[serde(default)]
    pub announced_acq_target: bool,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default = "default_tradable")]
    pub tradable: bool,
}

fn default_tradable() -> bool {
    true
}
