//! Column preprocessing: standardization of the numeric columns and
//! one-hot encoding of the neighborhood code.
//!
//! Output layout is the four scaled numeric columns followed by one
//! indicator column per neighborhood seen at fit time.

use super::Matrix;
use crate::models::StationFeatures;
use serde::{Deserialize, Serialize};
use smartcore::api::{Transformer, UnsupervisedEstimator};
use smartcore::error::Failed;
use smartcore::linalg::basic::arrays::Array;
use smartcore::preprocessing::numerical::{StandardScaler, StandardScalerParameters};

/// Number of numeric input columns
pub const NUM_NUMERIC: usize = 4;

/// One-hot encoding that ignores categories unseen at fit time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    categories: Vec<String>,
}

impl OneHotEncoder {
    /// Categories are kept sorted so the encoding does not depend on row order
    pub fn fit<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let mut categories: Vec<String> = values.into_iter().map(str::to_string).collect();
        categories.sort();
        categories.dedup();
        Self { categories }
    }

    pub fn width(&self) -> usize {
        self.categories.len()
    }

    /// Indicator block for a value; all zeros for an unseen category
    pub fn transform(&self, value: &str) -> Vec<f64> {
        let mut out = vec![0.0; self.categories.len()];
        if let Ok(i) = self.categories.binary_search_by(|c| c.as_str().cmp(value)) {
            out[i] = 1.0;
        }
        out
    }
}

/// Fitted transform from [`StationFeatures`] to a dense model matrix
#[derive(Debug, Serialize, Deserialize)]
pub struct Preprocessor {
    scaler: StandardScaler<f64>,
    /// Columns with no spread at fit time; they always map to 0
    constant: [bool; NUM_NUMERIC],
    encoder: OneHotEncoder,
}

fn numeric_matrix(rows: &[StationFeatures]) -> Matrix {
    let values: Vec<Vec<f64>> = rows.iter().map(|r| r.numeric().to_vec()).collect();
    Matrix::from_2d_vec(&values)
}

impl Preprocessor {
    /// Fit on a non-empty set of rows
    pub fn fit(rows: &[StationFeatures]) -> Result<Self, Failed> {
        let scaler =
            StandardScaler::fit(&numeric_matrix(rows), StandardScalerParameters::default())?;

        let mut constant = [true; NUM_NUMERIC];
        if let Some(first) = rows.first().map(|r| r.numeric()) {
            for row in rows.iter().skip(1) {
                for (i, v) in row.numeric().iter().enumerate() {
                    if (v - first[i]).abs() > f64::EPSILON {
                        constant[i] = false;
                    }
                }
            }
        }

        Ok(Self {
            scaler,
            constant,
            encoder: OneHotEncoder::fit(rows.iter().map(|r| r.neighborhood.as_str())),
        })
    }

    /// Width of the transformed row
    pub fn output_width(&self) -> usize {
        NUM_NUMERIC + self.encoder.width()
    }

    /// Transform a non-empty set of rows
    pub fn transform(&self, rows: &[StationFeatures]) -> Result<Matrix, Failed> {
        let scaled = self.scaler.transform(&numeric_matrix(rows))?;

        let mut out = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let mut values = Vec::with_capacity(self.output_width());
            for j in 0..NUM_NUMERIC {
                values.push(if self.constant[j] {
                    0.0
                } else {
                    *scaled.get((i, j))
                });
            }
            values.extend(self.encoder.transform(&row.neighborhood));
            out.push(values);
        }
        Ok(Matrix::from_2d_vec(&out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(power: f64, nil: &str, daily: f64) -> StationFeatures {
        StationFeatures {
            power_kw: power,
            neighborhood: nil.to_string(),
            avg_daily_sessions: daily,
            avg_duration_min: 30.0,
            avg_energy_kwh: 10.0,
        }
    }

    fn cell(m: &Matrix, i: usize, j: usize) -> f64 {
        *m.get((i, j))
    }

    #[test]
    fn test_numeric_columns_are_standardized() {
        let rows = vec![row(10.0, "Brera", 0.0), row(30.0, "Brera", 0.4)];
        let pre = Preprocessor::fit(&rows).unwrap();
        let out = pre.transform(&rows).unwrap();

        // Two rows: each lands the same distance either side of the mean
        assert!(cell(&out, 0, 0) < 0.0);
        assert!(cell(&out, 1, 0) > 0.0);
        assert!((cell(&out, 0, 0) + cell(&out, 1, 0)).abs() < 1e-9);
        assert!((cell(&out, 0, 1) + cell(&out, 1, 1)).abs() < 1e-9);
    }

    #[test]
    fn test_constant_column_maps_to_zero() {
        let rows = vec![row(22.0, "Brera", 0.0), row(22.0, "Duomo", 0.2)];
        let pre = Preprocessor::fit(&rows).unwrap();

        // Power and duration never varied during fit
        let out = pre.transform(&[row(150.0, "Duomo", 0.1)]).unwrap();
        assert_eq!(cell(&out, 0, 0), 0.0);
        assert_eq!(cell(&out, 0, 2), 0.0);
        assert!(cell(&out, 0, 1).is_finite());
    }

    #[test]
    fn test_one_hot_sorted_and_unknown_tolerant() {
        let enc = OneHotEncoder::fit(["Isola", "Brera", "Isola", "Duomo"]);
        assert_eq!(enc.width(), 3);
        assert_eq!(enc.transform("Brera"), vec![1.0, 0.0, 0.0]);
        assert_eq!(enc.transform("Duomo"), vec![0.0, 1.0, 0.0]);
        assert_eq!(enc.transform("Isola"), vec![0.0, 0.0, 1.0]);
        assert_eq!(enc.transform("Navigli"), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_preprocessor_layout() {
        let rows = vec![row(22.0, "Brera", 0.0), row(50.0, "Duomo", 0.2)];
        let pre = Preprocessor::fit(&rows).unwrap();
        assert_eq!(pre.output_width(), 6);

        let out = pre.transform(&rows[1..]).unwrap();
        assert_eq!(out.shape(), (1, 6));
        assert_eq!(cell(&out, 0, 4), 0.0);
        assert_eq!(cell(&out, 0, 5), 1.0);
    }

    #[test]
    fn test_unseen_neighborhood_encodes_to_zeros() {
        let rows = vec![row(22.0, "Brera", 0.0), row(50.0, "Duomo", 0.2)];
        let pre = Preprocessor::fit(&rows).unwrap();

        let out = pre.transform(&[row(50.0, "Quarto Oggiaro", 0.2)]).unwrap();
        assert_eq!(cell(&out, 0, 4), 0.0);
        assert_eq!(cell(&out, 0, 5), 0.0);
    }
}
