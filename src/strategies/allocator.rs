use std::collections::BTreeSet;
use crate::data::types::Asset;
use crate::strategies::types::{Leg, TargetWeight};

/// Target weights for one day, in submission order: longs, then shorts,
/// then flattens. Each group is sorted by asset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetWeights {
    entries: Vec<TargetWeight>,
}

impl TargetWeights {
    pub fn iter(&self) -> impl Iterator<Item = &TargetWeight> {
        self.entries.iter()
    }
}

#[cfg(test)]
impl TargetWeights {
    fn get(&self, asset: &Asset) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| &e.asset == asset)
            .map(|e| e.weight)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn gross_long(&self) -> f64 {
        self.leg_total(Leg::Long)
    }

    fn gross_short(&self) -> f64 {
        -self.leg_total(Leg::Short)
    }

    fn leg_total(&self, leg: Leg) -> f64 {
        self.entries
            .iter()
            .filter(|e| e.leg == leg)
            .map(|e| e.weight)
            .sum()
    }
}

impl IntoIterator for TargetWeights {
    type Item = TargetWeight;
    type IntoIter = std::vec::IntoIter<TargetWeight>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AllocationError {
    #[error("Asset {0} selected for both long and short")]
    OverlappingSelection(Asset),
}

/// Equal-weight long/short allocator.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightAllocator;

impl WeightAllocator {
    pub fn new() -> Self {
        Self
    }

    /// Long side gets `1/|longs|` each, short side `-1/|shorts|` each; held
    /// assets outside both sets are flattened to zero. An empty side weighs 0.
    pub fn allocate(
        &self,
        longs: &BTreeSet<Asset>,
        shorts: &BTreeSet<Asset>,
        held: &BTreeSet<Asset>,
    ) -> Result<TargetWeights, AllocationError> {
        if let Some(asset) = longs.intersection(shorts).next() {
            return Err(AllocationError::OverlappingSelection(asset.clone()));
        }

        let long_weight = side_weight(longs.len());
        let short_weight = -side_weight(shorts.len());

        let mut entries = Vec::with_capacity(longs.len() + shorts.len() + held.len());
        entries.extend(longs.iter().map(|asset| TargetWeight {
            asset: asset.clone(),
            weight: long_weight,
            leg: Leg::Long,
        }));
        entries.extend(shorts.iter().map(|asset| TargetWeight {
            asset: asset.clone(),
            weight: short_weight,
            leg: Leg::Short,
        }));
        entries.extend(
            held.iter()
                .filter(|asset| !longs.contains(*asset) && !shorts.contains(*asset))
                .map(|asset| TargetWeight {
                    asset: asset.clone(),
                    weight: 0.0,
                    leg: Leg::Flatten,
                }),
        );

        Ok(TargetWeights { entries })
    }
}

fn side_weight(count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        1.0 / count as f64
    }
}
