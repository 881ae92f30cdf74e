//! Usage-tier labeling policy
//!
//! Maps a station's average daily sessions onto a [`UsageLabel`] through an
//! ordered list of bands. The first band whose bound admits the value wins;
//! values above every bound get the top label.

use crate::error::{ThresholdError, TrainingError};
use crate::models::{StationStats, TrainingExample, UsageLabel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default inclusive upper bound of the `basso` tier (no sessions at all)
pub const DEFAULT_IDLE_MAX: f64 = 0.0;

/// Default inclusive lower bound of the `alto` tier (about 9 sessions in 90 days)
pub const DEFAULT_HIGH_MIN: f64 = 0.1;

/// Upper bound of a band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Bound {
    /// value <= bound
    AtMost(f64),
    /// value < bound
    Below(f64),
}

impl Bound {
    fn admits(&self, value: f64) -> bool {
        match *self {
            Bound::AtMost(b) => value <= b,
            Bound::Below(b) => value < b,
        }
    }

    fn value(&self) -> f64 {
        match *self {
            Bound::AtMost(b) | Bound::Below(b) => b,
        }
    }
}

/// Ordered threshold policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageThresholds {
    bands: Vec<(Bound, UsageLabel)>,
    top: UsageLabel,
}

impl Default for UsageThresholds {
    fn default() -> Self {
        Self {
            bands: vec![
                (Bound::AtMost(DEFAULT_IDLE_MAX), UsageLabel::Basso),
                (Bound::Below(DEFAULT_HIGH_MIN), UsageLabel::Medio),
            ],
            top: UsageLabel::Alto,
        }
    }
}

impl UsageThresholds {
    /// Build a policy from explicit bands
    pub fn new(bands: Vec<(Bound, UsageLabel)>, top: UsageLabel) -> Result<Self, ThresholdError> {
        let mut previous: Option<f64> = None;
        for (bound, _) in &bands {
            let value = bound.value();
            if !value.is_finite() {
                return Err(ThresholdError::NotFinite(value));
            }
            if let Some(prev) = previous {
                if value < prev {
                    return Err(ThresholdError::Unordered {
                        previous: prev,
                        next: value,
                    });
                }
            }
            previous = Some(value);
        }
        Ok(Self { bands, top })
    }

    /// Three-tier policy: `<= idle_max` is basso, `< high_min` is medio, the rest alto
    pub fn three_tier(idle_max: f64, high_min: f64) -> Result<Self, ThresholdError> {
        Self::new(
            vec![
                (Bound::AtMost(idle_max), UsageLabel::Basso),
                (Bound::Below(high_min), UsageLabel::Medio),
            ],
            UsageLabel::Alto,
        )
    }

    /// Label for a given average of daily sessions
    pub fn classify(&self, avg_daily_sessions: f64) -> UsageLabel {
        self.bands
            .iter()
            .find(|(bound, _)| bound.admits(avg_daily_sessions))
            .map(|(_, label)| *label)
            .unwrap_or(self.top)
    }
}

/// Attach a label to each station's feature row
pub fn label_examples(stats: &[StationStats], thresholds: &UsageThresholds) -> Vec<TrainingExample> {
    stats
        .iter()
        .map(|s| TrainingExample {
            station_id: s.station_id,
            features: s.features(),
            label: thresholds.classify(s.avg_daily_sessions()),
        })
        .collect()
}

/// Count of stations per label
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelDistribution {
    pub counts: BTreeMap<UsageLabel, usize>,
}

impl LabelDistribution {
    pub fn from_examples(examples: &[TrainingExample]) -> Self {
        let mut counts = BTreeMap::new();
        for example in examples {
            *counts.entry(example.label).or_insert(0) += 1;
        }
        Self { counts }
    }

    pub fn count(&self, label: UsageLabel) -> usize {
        self.counts.get(&label).copied().unwrap_or(0)
    }

    pub fn distinct(&self) -> usize {
        self.counts.values().filter(|c| **c > 0).count()
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Reject tables a classifier cannot be trained on
    pub fn ensure_trainable(&self) -> Result<(), TrainingError> {
        if self.total() == 0 {
            return Err(TrainingError::NoStations);
        }
        if self.distinct() < 2 {
            let only = self
                .counts
                .keys()
                .next()
                .copied()
                .unwrap_or(UsageLabel::Basso);
            return Err(TrainingError::SingleClass(only));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(id: i32, sessions: u32) -> StationStats {
        StationStats {
            station_id: id,
            power_kw: 22.0,
            neighborhood: "Isola".to_string(),
            session_count: sessions,
            avg_duration_min: 0.0,
            avg_energy_kwh: 0.0,
            window_days: 90,
        }
    }

    #[test]
    fn test_default_thresholds() {
        let t = UsageThresholds::default();
        assert_eq!(t.classify(0.0), UsageLabel::Basso);
        assert_eq!(t.classify(1.0 / 90.0), UsageLabel::Medio);
        assert_eq!(t.classify(0.5), UsageLabel::Alto);
    }

    #[test]
    fn test_high_boundary_is_half_open() {
        let t = UsageThresholds::default();
        assert_eq!(t.classify(0.0999999), UsageLabel::Medio);
        assert_eq!(t.classify(0.1), UsageLabel::Alto);
        assert_eq!(t.classify(0.1000000001), UsageLabel::Alto);
        // Largest double below 0.1
        assert_eq!(t.classify(f64::from_bits(0.1f64.to_bits() - 1)), UsageLabel::Medio);
    }

    #[test]
    fn test_nine_sessions_in_ninety_days_is_alto() {
        let t = UsageThresholds::default();
        assert_eq!(t.classify(stats(1, 9).avg_daily_sessions()), UsageLabel::Alto);
        assert_eq!(t.classify(stats(1, 8).avg_daily_sessions()), UsageLabel::Medio);
    }

    #[test]
    fn test_three_tier_custom() {
        let t = UsageThresholds::three_tier(0.5, 2.0).unwrap();
        assert_eq!(t.classify(0.5), UsageLabel::Basso);
        assert_eq!(t.classify(1.99), UsageLabel::Medio);
        assert_eq!(t.classify(2.0), UsageLabel::Alto);
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        assert_eq!(
            UsageThresholds::three_tier(0.5, 0.1),
            Err(ThresholdError::Unordered {
                previous: 0.5,
                next: 0.1
            })
        );
        assert!(matches!(
            UsageThresholds::three_tier(f64::NAN, 0.1),
            Err(ThresholdError::NotFinite(_))
        ));
    }

    #[test]
    fn test_label_examples_and_distribution() {
        let rows = vec![stats(1, 0), stats(2, 3), stats(3, 30), stats(4, 0)];
        let examples = label_examples(&rows, &UsageThresholds::default());
        let labels: Vec<_> = examples.iter().map(|e| e.label).collect();
        assert_eq!(
            labels,
            vec![
                UsageLabel::Basso,
                UsageLabel::Medio,
                UsageLabel::Alto,
                UsageLabel::Basso
            ]
        );

        let dist = LabelDistribution::from_examples(&examples);
        assert_eq!(dist.count(UsageLabel::Basso), 2);
        assert_eq!(dist.distinct(), 3);
        assert_eq!(dist.total(), 4);
        assert!(dist.ensure_trainable().is_ok());
    }

    #[test]
    fn test_single_class_is_fatal() {
        let rows = vec![stats(1, 0), stats(2, 0)];
        let examples = label_examples(&rows, &UsageThresholds::default());
        let err = LabelDistribution::from_examples(&examples)
            .ensure_trainable()
            .unwrap_err();
        assert!(matches!(err, TrainingError::SingleClass(UsageLabel::Basso)));
        assert!(err.to_string().contains("basso"));
    }

    #[test]
    fn test_empty_table_is_fatal() {
        let err = LabelDistribution::default().ensure_trainable().unwrap_err();
        assert!(matches!(err, TrainingError::NoStations));
    }
}
