use anyhow::Result;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use crate::engine::driver::{RebalanceDriver, RecordDriver};
use crate::data::provider::DataProvider;
use crate::execution::persistence::RunDatabase;
use crate::execution::types::InstructionStatus;
use crate::execution::ExecutionVenue;
use crate::monitoring::{DailyRecord, RecordSink, RecordSinks};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebalancePhase {
    AwaitingSnapshot,
    Rebalanced,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordPhase {
    AwaitingRecord,
    Recorded,
}

#[derive(Debug, Clone)]
pub struct DayReport {
    pub day: NaiveDate,
    pub rebalance: RebalancePhase,
    pub record_phase: RecordPhase,
    pub submitted: usize,
    pub skipped: usize,
    pub record: Option<DailyRecord>,
}

impl DayReport {
    fn new(day: NaiveDate) -> Self {
        Self {
            day,
            rebalance: RebalancePhase::AwaitingSnapshot,
            record_phase: RecordPhase::AwaitingRecord,
            submitted: 0,
            skipped: 0,
            record: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub days_run: usize,
    pub days_failed: usize,
    pub instructions_submitted: usize,
    pub instructions_skipped: usize,
    pub initial_value: f64,
    pub final_value: f64,
    pub stopped_early: bool,
}

impl RunSummary {
    pub fn total_return(&self) -> f64 {
        if self.initial_value == 0.0 {
            return 0.0;
        }
        self.final_value / self.initial_value - 1.0
    }
}

/// Drives the two daily events (open offset, close) across the provider's
/// trading days.
pub struct Scheduler<D, E> {
    data: Arc<D>,
    venue: E,
    driver: RebalanceDriver,
    recorder: RecordDriver,
    sinks: RecordSinks,
    journal: Option<RunDatabase>,
    stop: Arc<AtomicBool>,
}

impl<D, E> Scheduler<D, E>
where
    D: DataProvider,
    E: ExecutionVenue,
{
    pub fn new(data: Arc<D>, venue: E, driver: RebalanceDriver) -> Self {
        Self {
            data,
            venue,
            driver,
            recorder: RecordDriver,
            sinks: RecordSinks::new(),
            journal: None,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_sinks(mut self, sinks: RecordSinks) -> Self {
        self.sinks = sinks;
        self
    }

    pub fn with_journal(mut self, journal: RunDatabase) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Setting the flag stops the run before the next day starts.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn venue(&self) -> &E {
        &self.venue
    }

    pub fn journal(&self) -> Option<&RunDatabase> {
        self.journal.as_ref()
    }

    pub fn run(&mut self) -> Result<RunSummary> {
        let days = self.data.trading_days();
        let mut summary = RunSummary {
            initial_value: self.venue.portfolio_value(),
            ..Default::default()
        };
        info!("Starting run over {} trading days", days.len());

        for day in days {
            if self.stop.load(Ordering::SeqCst) {
                warn!("Stop requested, ending run before {}", day);
                summary.stopped_early = true;
                break;
            }

            let report = self.run_day(day);
            summary.days_run += 1;
            if report.rebalance == RebalancePhase::Failed {
                summary.days_failed += 1;
            }
            summary.instructions_submitted += report.submitted;
            summary.instructions_skipped += report.skipped;
        }

        summary.final_value = self.venue.portfolio_value();
        info!(
            "Run complete: {} days ({} failed), value ${:.2} -> ${:.2} ({:+.2}%)",
            summary.days_run,
            summary.days_failed,
            summary.initial_value,
            summary.final_value,
            summary.total_return() * 100.0
        );
        Ok(summary)
    }

    /// One trading day: open offset then close. A failed rebalance never
    /// prevents the close record.
    pub fn run_day(&mut self, day: NaiveDate) -> DayReport {
        let mut report = DayReport::new(day);
        self.venue.begin_day(day);

        match self.driver.on_open_offset(day, self.data.as_ref(), &mut self.venue) {
            Ok(outcome) => {
                report.rebalance = RebalancePhase::Rebalanced;
                report.submitted = outcome.count(InstructionStatus::Submitted);
                report.skipped = outcome.count(InstructionStatus::SkippedUntradable);

                if let Some(journal) = &self.journal {
                    if let Err(e) = journal.log_rebalance(&outcome.instructions, &outcome.fills) {
                        warn!("Failed to journal instructions for {}: {:#}", day, e);
                    }
                }
            }
            Err(e) => {
                error!("Rebalance for {} aborted: {}", day, e);
                report.rebalance = RebalancePhase::Failed;
            }
        }

        let record = self.recorder.on_close(&self.venue);
        self.sinks.record(day, &record);
        if let Some(journal) = &mut self.journal {
            if let Err(e) = journal.record(day, &record) {
                warn!("Failed to journal record for {}: {:#}", day, e);
            }
        }
        info!(
            "Close {}: num_long={} num_short={} leverage={:.3}",
            day, record.num_long, record.num_short, record.leverage
        );

        report.record_phase = RecordPhase::Recorded;
        report.record = Some(record);
        report
    }
}
