use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::HashMap;
use std::sync::Arc;
use crate::config::FilterParams;
use crate::data::types::{Asset, AssetFacts};

/// A boolean test applied to every asset when building a day's universe.
pub trait EligibilityPredicate: Send + Sync {
    fn name(&self) -> &str;
    fn holds(&self, asset: &Asset) -> bool;
}

/// Shared per-day facts the built-in predicates are evaluated against.
pub type DayFacts = Arc<HashMap<Asset, AssetFacts>>;

/// Member of the liquid base universe for the day.
pub struct InBaseUniverse {
    facts: DayFacts,
}

impl EligibilityPredicate for InBaseUniverse {
    fn name(&self) -> &str {
        "in_base_universe"
    }

    fn holds(&self, asset: &Asset) -> bool {
        self.facts.get(asset).map(|f| f.in_base_universe).unwrap_or(false)
    }
}

/// Sentiment reading was updated within `max_age_days` business days.
pub struct FreshSignal {
    facts: DayFacts,
    day: NaiveDate,
    max_age_days: i64,
}

impl EligibilityPredicate for FreshSignal {
    fn name(&self) -> &str {
        "fresh_signal"
    }

    fn holds(&self, asset: &Asset) -> bool {
        match self.facts.get(asset).and_then(|f| f.signal_asof) {
            Some(asof) => business_days_between(asof, self.day) <= self.max_age_days,
            None => false,
        }
    }
}

/// Not within `window_days` business days of an earnings announcement on either side.
pub struct NotNearEarnings {
    facts: DayFacts,
    window_days: u32,
}

impl EligibilityPredicate for NotNearEarnings {
    fn name(&self) -> &str {
        "not_near_earnings"
    }

    fn holds(&self, asset: &Asset) -> bool {
        let Some(facts) = self.facts.get(asset) else {
            return true;
        };
        // Unknown distances never count as near.
        let near_next = facts.days_until_earnings.map_or(false, |d| d <= self.window_days);
        let near_prev = facts.days_since_earnings.map_or(false, |d| d <= self.window_days);
        !(near_next || near_prev)
    }
}

/// Not an announced acquisition target.
pub struct NotAcquisitionTarget {
    facts: DayFacts,
}

impl EligibilityPredicate for NotAcquisitionTarget {
    fn name(&self) -> &str {
        "not_acquisition_target"
    }

    fn holds(&self, asset: &Asset) -> bool {
        !self.facts.get(asset).map(|f| f.announced_acq_target).unwrap_or(false)
    }
}

/// Build the active predicate set for a day from the strategy's filter settings.
pub fn build_predicates(
    params: &FilterParams,
    day: NaiveDate,
    facts: DayFacts,
) -> Vec<Box<dyn EligibilityPredicate>> {
    let mut predicates: Vec<Box<dyn EligibilityPredicate>> = Vec::new();

    if params.require_base_universe {
        predicates.push(Box::new(InBaseUniverse { facts: facts.clone() }));
    }
    if params.exclude_near_earnings {
        predicates.push(Box::new(NotNearEarnings {
            facts: facts.clone(),
            window_days: params.earnings_window_days,
        }));
    }
    if params.exclude_acquisition_targets {
        predicates.push(Box::new(NotAcquisitionTarget { facts: facts.clone() }));
    }
    if params.require_fresh_signal {
        predicates.push(Box::new(FreshSignal {
            facts,
            day,
            max_age_days: i64::from(params.max_signal_age_days),
        }));
    }

    predicates
}

/// Weekdays in `[from, to)`; negative when `to` precedes `from`.
pub fn business_days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    if to < from {
        return -business_days_between(to, from);
    }

    let mut count = 0;
    let mut cursor = from;
    while cursor < to {
        if !matches!(cursor.weekday(), Weekday::Sat | Weekday::Sun) {
            count += 1;
        }
        cursor += Duration::days(1);
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn facts_for(entries: Vec<(&str, AssetFacts)>) -> DayFacts {
        Arc::new(entries.into_iter().map(|(s, f)| (Asset::new(s), f)).collect())
    }

    #[test]
    fn test_business_days_skip_weekend() {
        // Friday -> Monday counts only the Friday
        assert_eq!(business_days_between(date(2024, 1, 5), date(2024, 1, 8)), 1);
        assert_eq!(business_days_between(date(2024, 1, 8), date(2024, 1, 8)), 0);
        assert_eq!(business_days_between(date(2024, 1, 8), date(2024, 1, 12)), 4);
        assert_eq!(business_days_between(date(2024, 1, 12), date(2024, 1, 8)), -4);
    }

    #[test]
    fn test_fresh_signal() {
        let facts = facts_for(vec![
            ("NEW", AssetFacts { signal_asof: Some(date(2024, 1, 5)), ..Default::default() }),
            ("OLD", AssetFacts { signal_asof: Some(date(2024, 1, 2)), ..Default::default() }),
            ("NONE", AssetFacts::default()),
        ]);
        let pred = FreshSignal { facts, day: date(2024, 1, 8), max_age_days: 1 };

        assert!(pred.holds(&Asset::new("NEW")));
        assert!(!pred.holds(&Asset::new("OLD")));
        assert!(!pred.holds(&Asset::new("NONE")));
    }

    #[test]
    fn test_not_near_earnings() {
        let facts = facts_for(vec![
            ("SOON", AssetFacts { days_until_earnings: Some(2), ..Default::default() }),
            ("JUST", AssetFacts { days_since_earnings: Some(1), ..Default::default() }),
            ("FAR", AssetFacts {
                days_until_earnings: Some(30),
                days_since_earnings: Some(35),
                ..Default::default()
            }),
            ("UNKNOWN", AssetFacts::default()),
        ]);
        let pred = NotNearEarnings { facts, window_days: 2 };

        assert!(!pred.holds(&Asset::new("SOON")));
        assert!(!pred.holds(&Asset::new("JUST")));
        assert!(pred.holds(&Asset::new("FAR")));
        assert!(pred.holds(&Asset::new("UNKNOWN")));
    }

    #[test]
    fn test_build_predicates_respects_flags() {
        let params = FilterParams {
            require_base_universe: true,
            exclude_near_earnings: false,
            earnings_window_days: 2,
            exclude_acquisition_targets: true,
            require_fresh_signal: false,
            max_signal_age_days: 1,
        };
        let facts = facts_for(vec![(
            "ACQ",
            AssetFacts { in_base_universe: true, announced_acq_target: true, ..Default::default() },
        )]);
        let preds = build_predicates(&params, date(2024, 1, 8), facts);

        let names: Vec<&str> = preds.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["in_base_universe", "not_acquisition_target"]);
        assert!(!preds.iter().all(|p| p.holds(&Asset::new("ACQ"))));
    }
}
