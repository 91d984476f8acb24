use anyhow::{Context, Result};
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::Arc;
use crate::config::PaperTradingConfig;
use crate::data::provider::MarketData;
use crate::data::types::Asset;
use crate::execution::types::{Fill, Position};
use crate::execution::ExecutionVenue;
use tracing::{debug, info};

/// Simulated broker that fills target-percent orders at the day's price.
pub struct PaperBroker<M: MarketData> {
    config: PaperTradingConfig,
    market: Arc<M>,
    cash: f64,
    positions: BTreeMap<Asset, Position>,
    day: Option<NaiveDate>,
    rng: StdRng,
}

impl<M: MarketData> PaperBroker<M> {
    pub fn new(config: PaperTradingConfig, market: Arc<M>) -> Self {
        let cash = config.initial_balance_usd;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        info!("Paper broker initialized with ${:.2}", cash);

        Self {
            config,
            market,
            cash,
            positions: BTreeMap::new(),
            day: None,
            rng,
        }
    }

    fn gross_exposure(&self) -> f64 {
        self.positions.values().map(|p| p.market_value().abs()).sum()
    }

    /// Buys pay up and sells give up a random fraction of `slippage_pct`.
    fn execution_price(&mut self, price: f64, shares: f64) -> f64 {
        if self.config.slippage_pct <= 0.0 {
            return price;
        }
        let slippage = self.rng.gen::<f64>() * self.config.slippage_pct;
        price * (1.0 + shares.signum() * slippage)
    }

    fn apply_fill(&mut self, fill: &Fill, market_price: f64) {
        self.cash -= fill.notional() + fill.commission;

        let current = self.positions.get(&fill.asset).map_or(0.0, |p| p.amount);
        let new_amount = current + fill.shares;

        if new_amount == 0.0 {
            self.positions.remove(&fill.asset);
            return;
        }

        let position = self
            .positions
            .entry(fill.asset.clone())
            .or_insert_with(|| Position {
                asset: fill.asset.clone(),
                amount: 0.0,
                cost_basis: fill.price,
                last_price: market_price,
            });

        let same_direction = current == 0.0 || current.signum() == fill.shares.signum();
        if same_direction {
            position.cost_basis =
                (position.cost_basis * current + fill.price * fill.shares) / new_amount;
        } else if current.signum() != new_amount.signum() {
            // flipped through zero
            position.cost_basis = fill.price;
        }
        position.amount = new_amount;
        position.last_price = market_price;
    }
}

impl<M: MarketData> ExecutionVenue for PaperBroker<M> {
    fn begin_day(&mut self, day: NaiveDate) {
        self.day = Some(day);
        for position in self.positions.values_mut() {
            if let Some(price) = self.market.price(&position.asset, day) {
                position.last_price = price;
            }
        }
        debug!("Marked {} positions to market for {}", self.positions.len(), day);
    }

    fn is_tradable(&self, asset: &Asset, day: NaiveDate) -> bool {
        self.market.is_tradable(asset, day)
    }

    fn set_target_weight(&mut self, asset: &Asset, weight: f64) -> Result<Option<Fill>> {
        let day = self.day.context("No trading day started")?;
        let price = self
            .market
            .price(asset, day)
            .with_context(|| format!("No price for {} on {}", asset, day))?;

        let target_value = weight * self.portfolio_value();
        let target_shares = (target_value / price).trunc();
        let current = self.positions.get(asset).map_or(0.0, |p| p.amount);
        let shares = target_shares - current;

        if shares == 0.0 {
            return Ok(None);
        }

        let fill = Fill {
            asset: asset.clone(),
            day,
            shares,
            price: self.execution_price(price, shares),
            commission: self.config.commission_per_trade,
        };
        self.apply_fill(&fill, price);

        debug!(
            "Filled {} {:+} shares @ ${:.2} (target {:.4})",
            asset, shares, fill.price, weight
        );
        Ok(Some(fill))
    }

    fn held_positions(&self) -> Vec<Position> {
        self.positions.values().cloned().collect()
    }

    fn leverage(&self) -> f64 {
        let gross = self.gross_exposure();
        if gross == 0.0 {
            return 0.0;
        }
        let value = self.portfolio_value();
        if value <= 0.0 {
            return f64::INFINITY;
        }
        gross / value
    }

    fn portfolio_value(&self) -> f64 {
        self.cash + self.positions.values().map(Position::market_value).sum::<f64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FixedPrices(HashMap<(Asset, NaiveDate), f64>);

    impl MarketData for FixedPrices {
        fn price(&self, asset: &Asset, day: NaiveDate) -> Option<f64> {
            self.0.get(&(asset.clone(), day)).copied()
        }

        fn is_tradable(&self, asset: &Asset, day: NaiveDate) -> bool {
            self.price(asset, day).is_some()
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn broker(prices: &[(&str, u32, f64)]) -> PaperBroker<FixedPrices> {
        let market = FixedPrices(
            prices
                .iter()
                .map(|(s, d, p)| ((Asset::new(*s), day(*d)), *p))
                .collect(),
        );
        let config = PaperTradingConfig {
            initial_balance_usd: 10_000.0,
            ..Default::default()
        };
        PaperBroker::new(config, Arc::new(market))
    }

    #[test]
    fn test_requires_started_day() {
        let mut broker = broker(&[("A", 8, 100.0)]);
        assert!(broker.set_target_weight(&Asset::new("A"), 0.5).is_err());
    }

    #[test]
    fn test_long_and_short_targets() {
        let mut broker = broker(&[("A", 8, 100.0), ("B", 8, 50.0)]);
        broker.begin_day(day(8));

        let fill = broker.set_target_weight(&Asset::new("A"), 0.5).unwrap().unwrap();
        assert_eq!(fill.shares, 50.0);
        let fill = broker.set_target_weight(&Asset::new("B"), -1.0).unwrap().unwrap();
        assert_eq!(fill.shares, -200.0);

        assert_eq!(broker.cash, 10_000.0 - 5_000.0 + 10_000.0);
        assert_eq!(broker.portfolio_value(), 10_000.0);
        assert!((broker.leverage() - 1.5).abs() < 1e-12);

        let held = broker.held_positions();
        assert_eq!(held.iter().filter(|p| p.is_long()).count(), 1);
        assert_eq!(held.iter().filter(|p| p.is_short()).count(), 1);
    }

    #[test]
    fn test_partial_shares_truncate() {
        let mut broker = broker(&[("A", 8, 3000.0)]);
        broker.begin_day(day(8));

        let fill = broker.set_target_weight(&Asset::new("A"), 0.5).unwrap().unwrap();
        assert_eq!(fill.shares, 1.0);
    }

    #[test]
    fn test_flatten_removes_position() {
        let mut broker = broker(&[("A", 8, 100.0), ("A", 9, 120.0)]);
        broker.begin_day(day(8));
        broker.set_target_weight(&Asset::new("A"), 1.0).unwrap();

        broker.begin_day(day(9));
        assert_eq!(broker.portfolio_value(), 12_000.0);

        let fill = broker.set_target_weight(&Asset::new("A"), 0.0).unwrap().unwrap();
        assert_eq!(fill.shares, -100.0);
        assert!(broker.held_positions().is_empty());
        assert_eq!(broker.cash, 12_000.0);
        assert_eq!(broker.leverage(), 0.0);
    }

    #[test]
    fn test_unchanged_target_is_noop() {
        let mut broker = broker(&[("A", 8, 100.0)]);
        broker.begin_day(day(8));
        broker.set_target_weight(&Asset::new("A"), 0.5).unwrap();

        assert!(broker.set_target_weight(&Asset::new("A"), 0.5).unwrap().is_none());
        assert!(broker.set_target_weight(&Asset::new("Z"), 0.0).is_err());
    }

    #[test]
    fn test_commission_charged_per_trade() {
        let market = FixedPrices(HashMap::from([((Asset::new("A"), day(8)), 100.0)]));
        let config = PaperTradingConfig {
            initial_balance_usd: 10_000.0,
            commission_per_trade: 1.0,
            ..Default::default()
        };
        let mut broker = PaperBroker::new(config, Arc::new(market));
        broker.begin_day(day(8));
        broker.set_target_weight(&Asset::new("A"), 0.5).unwrap();

        assert_eq!(broker.portfolio_value(), 9_999.0);
    }

    #[test]
    fn test_seeded_slippage_is_adverse() {
        let market = FixedPrices(HashMap::from([((Asset::new("A"), day(8)), 100.0)]));
        let config = PaperTradingConfig {
            initial_balance_usd: 10_000.0,
            slippage_pct: 0.01,
            seed: Some(7),
            ..Default::default()
        };
        let mut broker = PaperBroker::new(config, Arc::new(market));
        broker.begin_day(day(8));

        let fill = broker.set_target_weight(&Asset::new("A"), 0.5).unwrap().unwrap();
        assert!(fill.price >= 100.0 && fill.price <= 101.0);
    }
}
