pub mod logger;
#[cfg(feature = "metrics")]
pub mod metrics;

use anyhow::Result;
use chrono::NaiveDate;
use tracing::warn;

/// End-of-day summary of the book.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyRecord {
    pub num_long: usize,
    pub num_short: usize,
    pub leverage: f64,
    pub portfolio_value: f64,
}

/// Write-only destination for daily records.
pub trait RecordSink: Send {
    fn name(&self) -> &str;
    fn record(&mut self, day: NaiveDate, record: &DailyRecord) -> Result<()>;
}

/// Fans a record out to every registered sink. A failing sink is logged and
/// skipped.
#[derive(Default)]
pub struct RecordSinks {
    sinks: Vec<Box<dyn RecordSink>>,
}

impl RecordSinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sink: Box<dyn RecordSink>) {
        self.sinks.push(sink);
    }

    /// Returns the number of sinks that accepted the record.
    pub fn record(&mut self, day: NaiveDate, record: &DailyRecord) -> usize {
        let mut accepted = 0;
        for sink in &mut self.sinks {
            match sink.record(day, record) {
                Ok(()) => accepted += 1,
                Err(e) => warn!("Record sink '{}' failed for {}: {:#}", sink.name(), day, e),
            }
        }
        accepted
    }
}
