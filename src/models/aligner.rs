//! Alignment of engineered features to the models' input layout

use crate::types::features::{FeatureVector, TEXT_COLUMNS};
use tracing::{debug, warn};

/// Row-major f32 matrix whose columns are exactly the models' required columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    rows: usize,
    data: Vec<f32>,
}

impl FeatureMatrix {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// The whole matrix in row-major order
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn row(&self, index: usize) -> &[f32] {
        let cols = self.cols();
        &self.data[index * cols..(index + 1) * cols]
    }

    /// Value at `row` for a named column
    pub fn get(&self, row: usize, column: &str) -> Option<f32> {
        let col = self.columns.iter().position(|c| c == column)?;
        (row < self.rows).then(|| self.data[row * self.cols() + col])
    }
}

/// Build the model input matrix.
///
/// Columns follow `required_columns` order. A required column the feature
/// vectors cannot supply is filled with 0; engineered columns the models do
/// not use are left out.
pub fn align(vectors: &[FeatureVector], required_columns: &[String]) -> FeatureMatrix {
    for column in required_columns {
        let supplied = vectors
            .first()
            .map_or(true, |v| v.value(column).is_some());
        if supplied {
            continue;
        }
        if TEXT_COLUMNS.contains(&column.as_str()) {
            warn!(column = %column, "Text column has no numeric encoding, filling with 0");
        } else {
            debug!(column = %column, "Required column not engineered, filling with 0");
        }
    }

    let mut data = Vec::with_capacity(vectors.len() * required_columns.len());
    for vector in vectors {
        data.extend(
            required_columns
                .iter()
                .map(|column| vector.value(column).unwrap_or(0.0) as f32),
        );
    }

    FeatureMatrix {
        columns: required_columns.to_vec(),
        rows: vectors.len(),
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_engineer::FeatureEngineer;
    use crate::types::event::Event;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn vectors() -> Vec<FeatureVector> {
        let events = vec![
            Event::new(35.0, -118.0, 5.0, 3.2).with_place("A"),
            Event::new(61.0, -150.0, 45.0, 4.8).with_place("B"),
        ];
        FeatureEngineer::new().enrich(&events)
    }

    #[test]
    fn test_missing_columns_filled_in_order() {
        // Only "mag" is known; the others are injected as 0
        let required = columns(&["plate_a", "mag", "plate_c"]);
        let matrix = align(&vectors(), &required);

        assert_eq!(matrix.columns(), required.as_slice());
        assert_eq!(matrix.row(0), &[0.0, 3.2, 0.0]);
        assert_eq!(matrix.row(1), &[0.0, 4.8, 0.0]);
    }

    #[test]
    fn test_column_order_follows_required_list() {
        let matrix = align(&vectors(), &columns(&["depth_category", "depth", "latitude"]));

        assert_eq!(matrix.row(1), &[2.0, 45.0, 61.0]);
        assert_eq!(matrix.get(0, "depth"), Some(5.0));
        assert_eq!(matrix.get(0, "mag"), None);
        assert_eq!(matrix.get(5, "depth"), None);
    }

    #[test]
    fn test_extra_columns_excluded() {
        let matrix = align(&vectors(), &columns(&["mag"]));
        assert_eq!(matrix.cols(), 1);
        assert_eq!(matrix.as_slice(), &[3.2, 4.8]);
    }

    #[test]
    fn test_text_columns_become_zero() {
        let matrix = align(&vectors(), &columns(&["place", "mag"]));
        assert_eq!(matrix.row(0), &[0.0, 3.2]);
    }

    #[test]
    fn test_undefined_values_pass_through_as_nan() {
        let matrix = align(&vectors(), &columns(&["rolling_mag_var", "season"]));
        assert!(matrix.row(0).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_empty_batch() {
        let matrix = align(&[], &columns(&["mag", "depth"]));
        assert!(matrix.is_empty());
        assert_eq!(matrix.cols(), 2);
        assert!(matrix.as_slice().is_empty());
    }
}
