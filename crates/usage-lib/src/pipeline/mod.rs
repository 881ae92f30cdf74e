//! Preprocessing + classifier pipeline
//!
//! A [`Pipeline`] owns a fitted [`Preprocessor`] and a fitted
//! [`Classifier`]. Training and inference both go through it, so a row is
//! always transformed the same way before it reaches the model. The
//! estimators themselves come from smartcore.

mod preprocess;

pub use preprocess::{OneHotEncoder, Preprocessor, NUM_NUMERIC};

use crate::models::{StationFeatures, TrainingExample, UsageLabel};
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_classifier::{
    RandomForestClassifier, RandomForestClassifierParameters,
};
use smartcore::error::{Failed, FailedError};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::logistic_regression::{LogisticRegression, LogisticRegressionParameters};
use smartcore::tree::decision_tree_classifier::{
    DecisionTreeClassifier, DecisionTreeClassifierParameters,
};
use std::fmt;

/// Dense row-major design matrix
pub type Matrix = DenseMatrix<f64>;

/// Class ids as smartcore sees them ([`UsageLabel::index`])
pub type ClassIds = Vec<i32>;

pub type LogisticModel = LogisticRegression<f64, i32, Matrix, ClassIds>;
pub type TreeModel = DecisionTreeClassifier<f64, i32, Matrix, ClassIds>;
pub type ForestModel = RandomForestClassifier<f64, i32, Matrix, ClassIds>;

/// L2 penalty of the logistic model
pub const DEFAULT_ALPHA: f64 = 1.0;
/// Trees in the random forest
pub const DEFAULT_TREES: u16 = 100;

/// Candidate classifier families, simplest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    LogisticRegression,
    DecisionTree,
    RandomForest,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 3] = [
        ModelFamily::LogisticRegression,
        ModelFamily::DecisionTree,
        ModelFamily::RandomForest,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            ModelFamily::LogisticRegression => "Logistic Regression",
            ModelFamily::DecisionTree => "Decision Tree",
            ModelFamily::RandomForest => "Random Forest",
        }
    }

    /// Fit this family on a preprocessed matrix. `seed` drives every
    /// randomized choice the estimator makes.
    pub fn fit(&self, x: &Matrix, y: &ClassIds, seed: u64) -> Result<Classifier, Failed> {
        let classifier = match self {
            ModelFamily::LogisticRegression => Classifier::LogisticRegression(
                LogisticRegression::fit(
                    x,
                    y,
                    LogisticRegressionParameters::default().with_alpha(DEFAULT_ALPHA),
                )?,
            ),
            ModelFamily::DecisionTree => Classifier::DecisionTree(DecisionTreeClassifier::fit(
                x,
                y,
                DecisionTreeClassifierParameters {
                    seed: Some(seed),
                    ..Default::default()
                },
            )?),
            ModelFamily::RandomForest => Classifier::RandomForest(RandomForestClassifier::fit(
                x,
                y,
                RandomForestClassifierParameters {
                    n_trees: DEFAULT_TREES,
                    seed,
                    ..Default::default()
                },
            )?),
        };
        Ok(classifier)
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A fitted classifier of any family
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "family", content = "model", rename_all = "snake_case")]
pub enum Classifier {
    LogisticRegression(LogisticModel),
    DecisionTree(TreeModel),
    RandomForest(ForestModel),
}

impl Classifier {
    pub fn family(&self) -> ModelFamily {
        match self {
            Classifier::LogisticRegression(_) => ModelFamily::LogisticRegression,
            Classifier::DecisionTree(_) => ModelFamily::DecisionTree,
            Classifier::RandomForest(_) => ModelFamily::RandomForest,
        }
    }

    pub fn predict(&self, x: &Matrix) -> Result<ClassIds, Failed> {
        match self {
            Classifier::LogisticRegression(m) => m.predict(x),
            Classifier::DecisionTree(m) => m.predict(x),
            Classifier::RandomForest(m) => m.predict(x),
        }
    }
}

/// Fitted preprocessing followed by a fitted classifier
#[derive(Debug, Serialize, Deserialize)]
pub struct Pipeline {
    preprocessor: Preprocessor,
    classifier: Classifier,
}

impl Pipeline {
    /// Fit the preprocessor and the given family on labeled examples
    pub fn fit(
        family: ModelFamily,
        examples: &[TrainingExample],
        seed: u64,
    ) -> Result<Self, Failed> {
        let rows: Vec<StationFeatures> = examples.iter().map(|e| e.features.clone()).collect();
        let labels: ClassIds = examples.iter().map(|e| e.label.index() as i32).collect();

        let preprocessor = Preprocessor::fit(&rows)?;
        let x = preprocessor.transform(&rows)?;
        let classifier = family.fit(&x, &labels, seed)?;

        Ok(Self {
            preprocessor,
            classifier,
        })
    }

    pub fn family(&self) -> ModelFamily {
        self.classifier.family()
    }

    pub fn predict_one(&self, row: &StationFeatures) -> Result<UsageLabel, Failed> {
        let mut labels = self.predict(std::slice::from_ref(row))?;
        labels
            .pop()
            .ok_or_else(|| Failed::because(FailedError::PredictFailed, "no label returned"))
    }

    pub fn predict(&self, rows: &[StationFeatures]) -> Result<Vec<UsageLabel>, Failed> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let x = self.preprocessor.transform(rows)?;
        self.classifier
            .predict(&x)?
            .into_iter()
            .map(|id| {
                usize::try_from(id)
                    .ok()
                    .and_then(UsageLabel::from_index)
                    .ok_or_else(|| {
                        Failed::because(
                            FailedError::PredictFailed,
                            &format!("unknown class id {}", id),
                        )
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example(power: f64, nil: &str, daily: f64, label: UsageLabel) -> TrainingExample {
        TrainingExample {
            station_id: 0,
            features: StationFeatures {
                power_kw: power,
                neighborhood: nil.to_string(),
                avg_daily_sessions: daily,
                avg_duration_min: if daily > 0.0 { 30.0 } else { 0.0 },
                avg_energy_kwh: if daily > 0.0 { 20.0 } else { 0.0 },
            },
            label,
        }
    }

    fn examples() -> Vec<TrainingExample> {
        vec![
            example(22.0, "Brera", 0.0, UsageLabel::Basso),
            example(11.0, "Isola", 0.0, UsageLabel::Basso),
            example(50.0, "Duomo", 0.0, UsageLabel::Basso),
            example(50.0, "Duomo", 0.05, UsageLabel::Medio),
            example(22.0, "Brera", 0.03, UsageLabel::Medio),
            example(11.0, "Isola", 0.07, UsageLabel::Medio),
            example(150.0, "Centrale", 0.3, UsageLabel::Alto),
            example(50.0, "Duomo", 0.2, UsageLabel::Alto),
            example(22.0, "Isola", 0.5, UsageLabel::Alto),
        ]
    }

    fn rows(data: &[TrainingExample]) -> Vec<StationFeatures> {
        data.iter().map(|e| e.features.clone()).collect()
    }

    #[test]
    fn test_tree_families_fit_the_table() {
        let data = examples();
        for family in [ModelFamily::DecisionTree, ModelFamily::RandomForest] {
            let pipeline = Pipeline::fit(family, &data, 42).unwrap();
            assert_eq!(pipeline.family(), family);
            let predicted = pipeline.predict(&rows(&data)).unwrap();
            let correct = predicted
                .iter()
                .zip(&data)
                .filter(|(p, e)| **p == e.label)
                .count();
            assert!(correct >= 8, "{} got {}/9", family, correct);
        }
    }

    #[test]
    fn test_logistic_regression_fits_and_predicts_known_labels() {
        let data = examples();
        let pipeline = Pipeline::fit(ModelFamily::LogisticRegression, &data, 42).unwrap();
        assert_eq!(pipeline.family(), ModelFamily::LogisticRegression);

        let predicted = pipeline.predict(&rows(&data)).unwrap();
        assert_eq!(predicted.len(), data.len());
        let correct = predicted
            .iter()
            .zip(&data)
            .filter(|(p, e)| **p == e.label)
            .count();
        assert!(correct >= 6, "logistic got {}/9", correct);
    }

    #[test]
    fn test_unseen_neighborhood_still_predicts() {
        let pipeline = Pipeline::fit(ModelFamily::DecisionTree, &examples(), 42).unwrap();
        let mut row = examples()[3].features.clone();
        row.neighborhood = "Quarto Oggiaro".to_string();
        assert!(pipeline.predict_one(&row).is_ok());
    }

    #[test]
    fn test_empty_batch_predicts_nothing() {
        let pipeline = Pipeline::fit(ModelFamily::DecisionTree, &examples(), 42).unwrap();
        assert!(pipeline.predict(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_seeded_forest_is_reproducible() {
        let data = examples();
        let a = Pipeline::fit(ModelFamily::RandomForest, &data, 7).unwrap();
        let b = Pipeline::fit(ModelFamily::RandomForest, &data, 7).unwrap();
        assert_eq!(
            serde_json::to_value(&a).unwrap(),
            serde_json::to_value(&b).unwrap()
        );
    }

    #[test]
    fn test_classifier_serializes_with_family_tag() {
        let data = examples();
        let pipeline = Pipeline::fit(ModelFamily::DecisionTree, &data, 42).unwrap();
        let value = serde_json::to_value(&pipeline).unwrap();
        assert_eq!(value["classifier"]["family"], "decision_tree");

        let back: Pipeline = serde_json::from_value(value).unwrap();
        assert_eq!(
            back.predict(&rows(&data)).unwrap(),
            pipeline.predict(&rows(&data)).unwrap()
        );
    }
}
