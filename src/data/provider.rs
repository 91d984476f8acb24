use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::sync::Arc;
use tracing::info;
use crate::config::FilterParams;
use crate::data::filters::{build_predicates, DayFacts, EligibilityPredicate};
use crate::data::types::{Asset, AssetFacts, SignalSnapshot};

/// Source of the daily sentiment snapshot and the universe filters.
pub trait DataProvider {
    /// Trading days the provider can serve, in ascending order.
    fn trading_days(&self) -> Vec<NaiveDate>;

    fn daily_snapshot(&self, day: NaiveDate) -> Result<SignalSnapshot, DataError>;

    fn eligibility_predicates(
        &self,
        day: NaiveDate,
    ) -> Result<Vec<Box<dyn EligibilityPredicate>>, DataError>;
}

/// Prices and tradability, as seen by the simulated broker.
pub trait MarketData {
    fn price(&self, asset: &Asset, day: NaiveDate) -> Option<f64>;
    fn is_tradable(&self, asset: &Asset, day: NaiveDate) -> bool;
}

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("No snapshot available for {0}")]
    SnapshotUnavailable(NaiveDate),

    #[error("Duplicate row for {asset} on {day}")]
    DuplicateRow { asset: Asset, day: NaiveDate },
}

#[derive(Debug, Deserialize)]
struct DataFile {
    days: Vec<DayRecord>,
}

#[derive(Debug, Deserialize)]
struct DayRecord {
    date: NaiveDate,
    #[serde(default)]
    assets: Vec<AssetRow>,
}

#[derive(Debug, Deserialize)]
struct AssetRow {
    symbol: Asset,
    #[serde(default)]
    sentiment: Option<f64>,
    #[serde(flatten)]
    facts: AssetFacts,
}

struct DayData {
    snapshot: SignalSnapshot,
    facts: DayFacts,
}

/// JSON-file backed data feed. Serves both the strategy inputs and the
/// market data the paper broker needs.
pub struct FileDataSource {
    filters: FilterParams,
    days: BTreeMap<NaiveDate, DayData>,
}

impl FileDataSource {
    pub fn load(path: &str, filters: FilterParams) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read data file: {}", path))?;

        let source = Self::from_json(&contents, filters)
            .with_context(|| format!("Failed to parse data file: {}", path))?;

        info!("Loaded {} trading days from {}", source.days.len(), path);
        Ok(source)
    }

    pub fn from_json(contents: &str, filters: FilterParams) -> Result<Self> {
        let file: DataFile = serde_json::from_str(contents)?;

        let mut days = BTreeMap::new();
        for record in file.days {
            let mut snapshot = SignalSnapshot::new();
            let mut facts = HashMap::with_capacity(record.assets.len());

            for row in record.assets {
                if facts.contains_key(&row.symbol) {
                    return Err(DataError::DuplicateRow {
                        asset: row.symbol,
                        day: record.date,
                    }
                    .into());
                }
                // NaN readings are treated as missing
                let score = row.sentiment.filter(|s| s.is_finite());
                snapshot.insert(row.symbol.clone(), score);
                facts.insert(row.symbol, row.facts);
            }

            days.insert(
                record.date,
                DayData {
                    snapshot,
                    facts: Arc::new(facts),
                },
            );
        }

        Ok(Self { filters, days })
    }

    fn day(&self, day: NaiveDate) -> Result<&DayData, DataError> {
        self.days.get(&day).ok_or(DataError::SnapshotUnavailable(day))
    }

    fn facts(&self, asset: &Asset, day: NaiveDate) -> Option<&AssetFacts> {
        self.days.get(&day).and_then(|d| d.facts.get(asset))
    }
}

impl DataProvider for FileDataSource {
    fn trading_days(&self) -> Vec<NaiveDate> {
        self.days.keys().copied().collect()
    }

    fn daily_snapshot(&self, day: NaiveDate) -> Result<SignalSnapshot, DataError> {
        Ok(self.day(day)?.snapshot.clone())
    }

    fn eligibility_predicates(
        &self,
        day: NaiveDate,
    ) -> Result<Vec<Box<dyn EligibilityPredicate>>, DataError> {
        let data = self.day(day)?;
        Ok(build_predicates(&self.filters, day, data.facts.clone()))
    }
}

impl MarketData for FileDataSource {
    fn price(&self, asset: &Asset, day: NaiveDate) -> Option<f64> {
        self.facts(asset, day)
            .and_then(|f| f.price)
            .filter(|p| p.is_finite() && *p > 0.0)
    }

    fn is_tradable(&self, asset: &Asset, day: NaiveDate) -> bool {
        self.facts(asset, day).map_or(false, |f| f.tradable) && self.price(asset, day).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "days": [
            {
                "date": "2024-01-08",
                "assets": [
                    { "symbol": "AAPL", "sentiment": 3.0, "in_base_universe": true, "price": 185.0 },
                    { "symbol": "MSFT", "sentiment": null, "in_base_universe": true, "price": 370.0 },
                    { "symbol": "HALT", "sentiment": -3.0, "in_base_universe": true, "price": 10.0, "tradable": false }
                ]
            }
        ]
    }"#;

    fn filters() -> FilterParams {
        FilterParams {
            require_base_universe: true,
            exclude_near_earnings: false,
            earnings_window_days: 2,
            exclude_acquisition_targets: false,
            require_fresh_signal: false,
            max_signal_age_days: 1,
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
    }

    #[test]
    fn test_parse_sample() {
        let source = FileDataSource::from_json(SAMPLE, filters()).unwrap();
        assert_eq!(source.trading_days(), vec![day()]);

        let snapshot = source.daily_snapshot(day()).unwrap();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.score(&Asset::new("AAPL")), Some(3.0));
        assert_eq!(snapshot.score(&Asset::new("MSFT")), None);
    }

    #[test]
    fn test_missing_day_is_unavailable() {
        let source = FileDataSource::from_json(SAMPLE, filters()).unwrap();
        let other = NaiveDate::from_ymd_opt(2024, 1, 9).unwrap();

        assert!(matches!(
            source.daily_snapshot(other),
            Err(DataError::SnapshotUnavailable(d)) if d == other
        ));
        assert!(source.eligibility_predicates(other).is_err());
    }

    #[test]
    fn test_tradability() {
        let source = FileDataSource::from_json(SAMPLE, filters()).unwrap();

        assert!(source.is_tradable(&Asset::new("AAPL"), day()));
        assert!(!source.is_tradable(&Asset::new("HALT"), day()));
        assert!(!source.is_tradable(&Asset::new("NOPE"), day()));
        assert_eq!(source.price(&Asset::new("MSFT"), day()), Some(370.0));
    }

    #[test]
    fn test_duplicate_rows_rejected() {
        let json = r#"{ "days": [ { "date": "2024-01-08", "assets": [
            { "symbol": "AAPL", "sentiment": 1.0 },
            { "symbol": "AAPL", "sentiment": 2.0 }
        ] } ] }"#;

        assert!(FileDataSource::from_json(json, filters()).is_err());
    }
}
