use std::collections::BTreeSet;
use crate::config::StrategyParams;
use crate::data::filters::EligibilityPredicate;
use crate::data::types::{Asset, SignalSnapshot};
use crate::strategies::types::Classification;
use tracing::debug;

/// Ranks the day's sentiment scores into quantiles and flags long/short
/// candidates from fixed thresholds.
#[derive(Debug, Clone)]
pub struct SignalClassifier {
    long_threshold: f64,
    short_threshold: f64,
    quantiles: usize,
}

impl SignalClassifier {
    pub fn new(params: &StrategyParams) -> Self {
        Self {
            long_threshold: params.long_threshold,
            short_threshold: params.short_threshold,
            quantiles: params.quantiles.max(1),
        }
    }

    /// Assets with a score that pass every predicate, in asset order. NaN
    /// counts as a missing score.
    pub fn universe(
        &self,
        snapshot: &SignalSnapshot,
        predicates: &[Box<dyn EligibilityPredicate>],
    ) -> Vec<(Asset, f64)> {
        snapshot
            .iter()
            .filter_map(|(asset, score)| score.filter(|s| !s.is_nan()).map(|s| (asset, s)))
            .filter(|(asset, _)| predicates.iter().all(|p| p.holds(asset)))
            .map(|(asset, score)| (asset.clone(), score))
            .collect()
    }

    pub fn classify(
        &self,
        snapshot: &SignalSnapshot,
        predicates: &[Box<dyn EligibilityPredicate>],
    ) -> Vec<Classification> {
        let universe = self.universe(snapshot, predicates);
        debug!(
            "Universe: {} of {} assets eligible",
            universe.len(),
            snapshot.len()
        );

        let scores: Vec<f64> = universe.iter().map(|(_, s)| *s).collect();
        let ranks = average_ranks(&scores);
        let buckets = quantile_buckets(&ranks, self.quantiles);

        universe
            .into_iter()
            .zip(ranks)
            .zip(buckets)
            .map(|(((asset, score), rank), quantile)| Classification {
                asset,
                score,
                rank,
                quantile,
                is_long: score >= self.long_threshold,
                is_short: score <= self.short_threshold,
            })
            .collect()
    }
}

/// Split a day's classifications into the long and short target sets.
pub fn partition(classifications: &[Classification]) -> (BTreeSet<Asset>, BTreeSet<Asset>) {
    let longs = classifications
        .iter()
        .filter(|c| c.is_long)
        .map(|c| c.asset.clone())
        .collect();
    let shorts = classifications
        .iter()
        .filter(|c| c.is_short)
        .map(|c| c.asset.clone())
        .collect();
    (longs, shorts)
}

/// 1-based ascending ranks; tied values share the mean rank of their group.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start..end hold ranks start+1 ..= end
        let mean = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = mean;
        }
        start = end;
    }
    ranks
}

/// Equal-frequency bucketing. Edges are linearly interpolated quantiles of
/// `values`; bucket `k` covers `(edge_k, edge_k+1]` and the first bucket also
/// includes the minimum. Buckets collapse downward when edges coincide.
pub fn quantile_buckets(values: &[f64], bins: usize) -> Vec<usize> {
    if values.is_empty() || bins == 0 {
        return vec![0; values.len()];
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let edges: Vec<f64> = (0..=bins)
        .map(|k| interpolate(&sorted, k as f64 / bins as f64))
        .collect();

    values
        .iter()
        .map(|v| {
            (0..bins)
                .find(|&k| *v <= edges[k + 1])
                .unwrap_or(bins - 1)
        })
        .collect()
}

fn interpolate(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrategyVariant;

    struct Only(Vec<&'static str>);

    impl EligibilityPredicate for Only {
        fn name(&self) -> &str {
            "only"
        }

        fn holds(&self, asset: &Asset) -> bool {
            self.0.iter().any(|s| *s == asset.symbol())
        }
    }

    fn snapshot(entries: &[(&str, Option<f64>)]) -> SignalSnapshot {
        entries
            .iter()
            .map(|(s, v)| (Asset::new(*s), *v))
            .collect()
    }

    fn classifier() -> SignalClassifier {
        SignalClassifier::new(&StrategyVariant::Psychsignal.preset())
    }

    #[test]
    fn test_average_ranks_ties() {
        assert_eq!(average_ranks(&[3.0, 1.0, 2.0]), vec![3.0, 1.0, 2.0]);
        assert_eq!(average_ranks(&[1.0, 1.0, 1.0, 2.0]), vec![2.0, 2.0, 2.0, 4.0]);
        assert_eq!(average_ranks(&[5.0, 2.0, 5.0, 0.0]), vec![3.5, 2.0, 3.5, 1.0]);
        assert!(average_ranks(&[]).is_empty());
    }

    #[test]
    fn test_two_quantiles_split_at_median() {
        assert_eq!(quantile_buckets(&[1.0, 2.0, 3.0, 4.0], 2), vec![0, 0, 1, 1]);
        // odd count: the median itself falls in the lower bucket
        assert_eq!(quantile_buckets(&[1.0, 2.0, 3.0], 2), vec![0, 0, 1]);
        assert_eq!(quantile_buckets(&[7.0], 2), vec![0]);
    }

    #[test]
    fn test_tied_group_stays_in_one_bucket() {
        let ranks = average_ranks(&[1.0, 1.0, 1.0, 2.0]);
        assert_eq!(quantile_buckets(&ranks, 2), vec![0, 0, 0, 1]);

        // the same scores in a different order give the same bucket counts
        let ranks = average_ranks(&[2.0, 1.0, 1.0, 1.0]);
        let buckets = quantile_buckets(&ranks, 2);
        assert_eq!(buckets.iter().filter(|&&b| b == 0).count(), 3);
        assert_eq!(buckets.iter().filter(|&&b| b == 1).count(), 1);
    }

    #[test]
    fn test_null_scores_excluded_regardless_of_predicates() {
        let snap = snapshot(&[("A", Some(3.0)), ("B", None), ("C", Some(-1.0))]);
        let preds: Vec<Box<dyn EligibilityPredicate>> = vec![Box::new(Only(vec!["A", "B", "C"]))];

        let universe = classifier().universe(&snap, &preds);
        let assets: Vec<&str> = universe.iter().map(|(a, _)| a.symbol()).collect();
        assert_eq!(assets, vec!["A", "C"]);
    }

    #[test]
    fn test_predicates_are_conjunctive() {
        let snap = snapshot(&[("A", Some(3.0)), ("B", Some(1.0)), ("C", Some(-3.0))]);
        let preds: Vec<Box<dyn EligibilityPredicate>> = vec![
            Box::new(Only(vec!["A", "B"])),
            Box::new(Only(vec!["B", "C"])),
        ];

        let result = classifier().classify(&snap, &preds);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].asset, Asset::new("B"));
    }

    #[test]
    fn test_threshold_flags() {
        let snap = snapshot(&[
            ("LONG", Some(2.5)),
            ("SHORT", Some(-2.0)),
            ("MID", Some(0.5)),
            ("BIG", Some(9.0)),
        ]);

        let result = classifier().classify(&snap, &[]);
        let get = |s: &str| result.iter().find(|c| c.asset.symbol() == s).unwrap();

        assert!(get("LONG").is_long && !get("LONG").is_short);
        assert!(get("SHORT").is_short && !get("SHORT").is_long);
        assert!(!get("MID").is_long && !get("MID").is_short);
        assert_eq!(get("BIG").quantile, 1);
        assert_eq!(get("SHORT").quantile, 0);
    }

    #[test]
    fn test_score_between_bands_is_neither() {
        let params = StrategyVariant::Sentdex.preset();
        let snap = snapshot(&[("X", Some(3.0))]);

        let result = SignalClassifier::new(&params).classify(&snap, &[]);
        assert!(!result[0].is_long);
        assert!(!result[0].is_short);
    }

    #[test]
    fn test_partition() {
        let snap = snapshot(&[("A", Some(5.0)), ("B", Some(-5.0)), ("C", Some(0.0))]);
        let (longs, shorts) = partition(&classifier().classify(&snap, &[]));

        assert_eq!(longs.into_iter().collect::<Vec<_>>(), vec![Asset::new("A")]);
        assert_eq!(shorts.into_iter().collect::<Vec<_>>(), vec![Asset::new("B")]);
    }
}
