use anyhow::Result;
use chrono::NaiveDate;
use prometheus::{Encoder, Gauge, IntGauge, Registry, TextEncoder};
use crate::monitoring::{DailyRecord, RecordSink};

/// Exposes the latest daily record as Prometheus gauges.
pub struct PrometheusSink {
    registry: Registry,
    num_long: IntGauge,
    num_short: IntGauge,
    leverage: Gauge,
    portfolio_value: Gauge,
}

impl PrometheusSink {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let num_long = IntGauge::new("longshort_num_long", "Long positions held at close")?;
        let num_short = IntGauge::new("longshort_num_short", "Short positions held at close")?;
        let leverage = Gauge::new("longshort_leverage", "Gross exposure over portfolio value")?;
        let portfolio_value = Gauge::new("longshort_portfolio_value", "Portfolio value at close")?;

        registry.register(Box::new(num_long.clone()))?;
        registry.register(Box::new(num_short.clone()))?;
        registry.register(Box::new(leverage.clone()))?;
        registry.register(Box::new(portfolio_value.clone()))?;

        Ok(Self {
            registry,
            num_long,
            num_short,
            leverage,
            portfolio_value,
        })
    }

    /// Text exposition of the current gauge values.
    pub fn render(&self) -> Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

impl RecordSink for PrometheusSink {
    fn name(&self) -> &str {
        "prometheus"
    }

    fn record(&mut self, _day: NaiveDate, record: &DailyRecord) -> Result<()> {
        self.num_long.set(record.num_long as i64);
        self.num_short.set(record.num_short as i64);
        self.leverage.set(record.leverage);
        self.portfolio_value.set(record.portfolio_value);
        Ok(())
    }
}
