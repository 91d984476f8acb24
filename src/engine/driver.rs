use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::BTreeSet;
use crate::config::StrategyParams;
use crate::data::provider::{DataError, DataProvider};
use crate::data::types::Asset;
use crate::execution::types::{Fill, Instruction, InstructionStatus, Position};
use crate::execution::ExecutionVenue;
use crate::monitoring::DailyRecord;
use crate::strategies::allocator::{AllocationError, WeightAllocator};
use crate::strategies::classifier::{partition, SignalClassifier};
use crate::strategies::types::Classification;
use tracing::{debug, info, warn};

/// Everything the rebalance needs for one day, built once per invocation.
#[derive(Debug, Clone)]
pub struct DayContext {
    pub day: NaiveDate,
    pub scheduled_at: NaiveDateTime,
    pub classifications: Vec<Classification>,
    pub longs: BTreeSet<Asset>,
    pub shorts: BTreeSet<Asset>,
}

#[derive(Debug, Clone, Default)]
pub struct RebalanceOutcome {
    pub instructions: Vec<Instruction>,
    pub fills: Vec<Fill>,
    pub long_count: usize,
    pub short_count: usize,
}

impl RebalanceOutcome {
    pub fn count(&self, status: InstructionStatus) -> usize {
        self.instructions.iter().filter(|i| i.status == status).count()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RebalanceError {
    #[error("Data unavailable: {0}")]
    Data(#[from] DataError),

    #[error("Allocation failed: {0}")]
    Allocation(#[from] AllocationError),
}

/// Runs the open-offset rebalance: classify, allocate, submit.
pub struct RebalanceDriver {
    classifier: SignalClassifier,
    allocator: WeightAllocator,
    rebalance_time: NaiveTime,
}

impl RebalanceDriver {
    pub fn new(params: &StrategyParams, rebalance_time: NaiveTime) -> Self {
        Self {
            classifier: SignalClassifier::new(params),
            allocator: WeightAllocator::new(),
            rebalance_time,
        }
    }

    pub fn prepare<D>(&self, day: NaiveDate, data: &D) -> Result<DayContext, RebalanceError>
    where
        D: DataProvider + ?Sized,
    {
        let snapshot = data.daily_snapshot(day)?;
        let predicates = data.eligibility_predicates(day)?;
        let classifications = self.classifier.classify(&snapshot, &predicates);
        let (longs, shorts) = partition(&classifications);

        Ok(DayContext {
            day,
            scheduled_at: day.and_time(self.rebalance_time),
            classifications,
            longs,
            shorts,
        })
    }

    /// Rebalance toward the day's targets. Untradable assets are skipped for
    /// the day; any data or allocation failure aborts before orders go out.
    pub fn on_open_offset<D, E>(
        &self,
        day: NaiveDate,
        data: &D,
        venue: &mut E,
    ) -> Result<RebalanceOutcome, RebalanceError>
    where
        D: DataProvider + ?Sized,
        E: ExecutionVenue + ?Sized,
    {
        let ctx = self.prepare(day, data)?;
        let held: BTreeSet<Asset> = venue
            .held_positions()
            .into_iter()
            .filter(|p| p.amount != 0.0)
            .map(|p| p.asset)
            .collect();

        let targets = self.allocator.allocate(&ctx.longs, &ctx.shorts, &held)?;

        info!(
            "Rebalance {}: universe={} longs={} shorts={} held={}",
            ctx.scheduled_at,
            ctx.classifications.len(),
            ctx.longs.len(),
            ctx.shorts.len(),
            held.len()
        );

        let mut outcome = RebalanceOutcome {
            long_count: ctx.longs.len(),
            short_count: ctx.shorts.len(),
            ..Default::default()
        };

        for target in targets {
            let status = if !venue.is_tradable(&target.asset, day) {
                debug!("{} not tradable on {}, skipping", target.asset, day);
                InstructionStatus::SkippedUntradable
            } else {
                match venue.set_target_weight(&target.asset, target.weight) {
                    Ok(fill) => {
                        outcome.fills.extend(fill);
                        InstructionStatus::Submitted
                    }
                    Err(e) => {
                        warn!("Order for {} rejected: {:#}", target.asset, e);
                        InstructionStatus::Rejected
                    }
                }
            };

            outcome.instructions.push(Instruction {
                day,
                asset: target.asset,
                weight: target.weight,
                leg: target.leg,
                status,
            });
        }

        Ok(outcome)
    }
}

/// Count long and short positions in the book.
pub fn tally(positions: &[Position]) -> (usize, usize) {
    let longs = positions.iter().filter(|p| p.is_long()).count();
    let shorts = positions.iter().filter(|p| p.is_short()).count();
    (longs, shorts)
}

/// Session-close bookkeeping.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordDriver;

impl RecordDriver {
    pub fn on_close<E>(&self, venue: &E) -> DailyRecord
    where
        E: ExecutionVenue + ?Sized,
    {
        let (num_long, num_short) = tally(&venue.held_positions());
        DailyRecord {
            num_long,
            num_short,
            leverage: venue.leverage(),
            portfolio_value: venue.portfolio_value(),
        }
    }
}
