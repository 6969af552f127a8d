use nalgebra::DMatrix;

/// Scales every column of `data` into `[0, 1]`.
///
/// Constant columns are mapped to `0`.
///
/// # Examples
///
/// ```
/// use fistrain_cluster::normalize::normalize;
/// use nalgebra::DMatrix;
///
/// let data = DMatrix::from_row_slice(3, 2, &[1.0, 7.0, 2.0, 7.0, 3.0, 7.0]);
/// let normalized = normalize(&data);
/// assert_eq!(normalized.column(0).iter().copied().collect::<Vec<_>>(), [0.0, 0.5, 1.0]);
/// assert_eq!(normalized.column(1).iter().copied().collect::<Vec<_>>(), [0.0, 0.0, 0.0]);
/// ```
#[must_use]
pub fn normalize(data: &DMatrix<f64>) -> DMatrix<f64> {
    let mut normalized = data.clone();
    for mut column in normalized.column_iter_mut() {
        if column.is_empty() {
            continue;
        }
        let min = column.min();
        let range = column.max() - min;
        if range > 0.0 {
            column.apply(|v| *v = (*v - min) / range);
        } else {
            column.fill(0.0);
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_matrix() {
        let data = DMatrix::<f64>::zeros(0, 3);
        assert_eq!(normalize(&data).shape(), (0, 3));
    }

    #[test]
    fn test_shape_is_preserved() {
        let data = DMatrix::from_fn(5, 4, |r, c| (r * c) as f64 - 3.0);
        let normalized = normalize(&data);
        assert_eq!(normalized.shape(), data.shape());
        assert!(normalized.iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
