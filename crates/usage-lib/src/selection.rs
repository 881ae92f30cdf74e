//! Model selection
//!
//! Splits the labeled table into stratified train/test partitions, fits
//! every candidate family behind the same preprocessing, scores held-out
//! accuracy and keeps the best pipeline.

use crate::error::TrainingError;
use crate::models::{TrainingExample, UsageLabel};
use crate::pipeline::{ModelFamily, Pipeline};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Default share of stations held out for evaluation
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;

/// Default seed for the split and the random forest
pub const DEFAULT_SEED: u64 = 42;

/// Train/test partition
#[derive(Debug, Clone)]
pub struct Split {
    pub train: Vec<TrainingExample>,
    pub test: Vec<TrainingExample>,
}

/// Split per label so both partitions keep the label proportions.
///
/// Each label holds out `round(n * test_fraction)` of its rows, clamped so
/// that both partitions get at least one.
pub fn stratified_split(
    examples: &[TrainingExample],
    test_fraction: f64,
    seed: u64,
) -> Result<Split, TrainingError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(TrainingError::InvalidConfig(format!(
            "test fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }

    let mut by_label: BTreeMap<UsageLabel, Vec<usize>> = BTreeMap::new();
    for (i, e) in examples.iter().enumerate() {
        by_label.entry(e.label).or_default().push(i);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train_idx = Vec::new();
    let mut test_idx = Vec::new();

    for (label, mut indices) in by_label {
        let n = indices.len();
        if n < 2 {
            return Err(TrainingError::ClassTooSmall { label, count: n });
        }
        indices.shuffle(&mut rng);
        let n_test = ((n as f64 * test_fraction).round() as usize).clamp(1, n - 1);
        test_idx.extend_from_slice(&indices[..n_test]);
        train_idx.extend_from_slice(&indices[n_test..]);
    }

    train_idx.sort_unstable();
    test_idx.sort_unstable();

    Ok(Split {
        train: train_idx.iter().map(|&i| examples[i].clone()).collect(),
        test: test_idx.iter().map(|&i| examples[i].clone()).collect(),
    })
}

/// Fraction of matching labels
pub fn accuracy(truth: &[UsageLabel], predicted: &[UsageLabel]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let correct = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
    correct as f64 / truth.len() as f64
}

/// Precision/recall/F1 for one label. Undefined ratios count as 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: UsageLabel,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-label scores over the labels present in truth or predictions
pub fn classification_report(truth: &[UsageLabel], predicted: &[UsageLabel]) -> Vec<LabelScore> {
    UsageLabel::ALL
        .iter()
        .filter(|l| truth.contains(l) || predicted.contains(l))
        .map(|&label| {
            let tp = truth
                .iter()
                .zip(predicted)
                .filter(|(t, p)| **t == label && **p == label)
                .count() as f64;
            let predicted_pos = predicted.iter().filter(|p| **p == label).count() as f64;
            let support = truth.iter().filter(|t| **t == label).count();

            let precision = if predicted_pos > 0.0 { tp / predicted_pos } else { 0.0 };
            let recall = if support > 0 { tp / support as f64 } else { 0.0 };
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };

            LabelScore {
                label,
                precision,
                recall,
                f1,
                support,
            }
        })
        .collect()
}

/// Held-out evaluation of one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub family: ModelFamily,
    pub accuracy: f64,
    pub report: Vec<LabelScore>,
}

/// Winning pipeline plus the scores of every candidate
#[derive(Debug)]
pub struct SelectionOutcome {
    pub winner: Pipeline,
    pub winner_accuracy: f64,
    pub candidates: Vec<CandidateResult>,
    pub train_size: usize,
    pub test_size: usize,
}

/// Fits and compares candidate families
#[derive(Debug, Clone)]
pub struct ModelSelector {
    families: Vec<ModelFamily>,
    test_fraction: f64,
    seed: u64,
}

impl Default for ModelSelector {
    fn default() -> Self {
        Self::new(DEFAULT_TEST_FRACTION, DEFAULT_SEED)
    }
}

impl ModelSelector {
    pub fn new(test_fraction: f64, seed: u64) -> Self {
        Self {
            families: ModelFamily::ALL.to_vec(),
            test_fraction,
            seed,
        }
    }

    /// Restrict or reorder the candidates. Order matters for ties.
    pub fn with_families(mut self, families: Vec<ModelFamily>) -> Self {
        self.families = families;
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Evaluate every candidate; the first strictly best accuracy wins
    pub fn select(&self, examples: &[TrainingExample]) -> Result<SelectionOutcome, TrainingError> {
        if self.families.is_empty() {
            return Err(TrainingError::InvalidConfig(
                "no candidate model families".to_string(),
            ));
        }

        let split = stratified_split(examples, self.test_fraction, self.seed)?;
        info!(
            train = split.train.len(),
            test = split.test.len(),
            "Split training table"
        );

        let test_rows: Vec<_> = split.test.iter().map(|e| e.features.clone()).collect();
        let truth: Vec<UsageLabel> = split.test.iter().map(|e| e.label).collect();

        let mut best: Option<(Pipeline, f64)> = None;
        let mut candidates = Vec::with_capacity(self.families.len());

        for family in &self.families {
            let pipeline = Pipeline::fit(*family, &split.train, self.seed)?;
            let predicted = pipeline.predict(&test_rows)?;
            let acc = accuracy(&truth, &predicted);

            info!(
                event = "candidate_evaluated",
                family = %family,
                accuracy = acc,
                "Evaluated candidate model"
            );

            candidates.push(CandidateResult {
                family: *family,
                accuracy: acc,
                report: classification_report(&truth, &predicted),
            });

            let better = match &best {
                None => true,
                Some((_, best_acc)) => acc > *best_acc,
            };
            if better {
                best = Some((pipeline, acc));
            }
        }

        let (winner, winner_accuracy) = best.ok_or_else(|| {
            TrainingError::InvalidConfig("no candidate produced a model".to_string())
        })?;

        Ok(SelectionOutcome {
            winner,
            winner_accuracy,
            candidates,
            train_size: split.train.len(),
            test_size: split.test.len(),
        })
    }
}
