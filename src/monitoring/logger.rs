use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use crate::monitoring::{DailyRecord, RecordSink};

pub struct CsvLogger {
    log_path: String,
}

impl CsvLogger {
    pub fn new(log_path: String) -> Result<Self> {
        // Create CSV file with headers if it doesn't exist
        if !std::path::Path::new(&log_path).exists() {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .open(&log_path)
                .with_context(|| format!("Failed to create CSV log: {}", log_path))?;

            writeln!(
                file,
                "logged_at,day,num_long,num_short,leverage,portfolio_value"
            )?;
        }

        Ok(Self { log_path })
    }

    /// Append one day's record
    pub fn log_record(&self, day: NaiveDate, record: &DailyRecord) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.log_path)?;

        writeln!(
            file,
            "{},{},{},{},{:.4},{:.2}",
            Utc::now().to_rfc3339(),
            day,
            record.num_long,
            record.num_short,
            record.leverage,
            record.portfolio_value,
        )?;

        Ok(())
    }
}

impl RecordSink for CsvLogger {
    fn name(&self) -> &str {
        "csv"
    }

    fn record(&mut self, day: NaiveDate, record: &DailyRecord) -> Result<()> {
        self.log_record(day, record)
    }
}
