//! Prediction error metrics.

use ndarray::{Array2, Axis};

use crate::data::stack_rows;
use crate::error::{Error, Result};

/// Root relative squared error in percent
///
/// ```text
/// rrse = 100 * mean_c sqrt(SE_c / D)
/// ```
///
/// `SE_c` is the summed squared error of channel `c`; `D` is the squared
/// deviation of `truth` from its per-channel means, summed over all
/// channels. A prediction equal to the per-channel mean of `truth` scores
/// `100 * mean_c sqrt(D_c / D)`.
pub fn rrse(truth: &Array2<f64>, prediction: &Array2<f64>) -> Result<f64> {
    if truth.dim() != prediction.dim() {
        return Err(Error::shape("rrse", truth.dim(), prediction.dim()));
    }
    if truth.nrows() == 0 || truth.ncols() == 0 {
        return Err(Error::shape("rrse", "non-empty truth", truth.dim()));
    }

    let squared_error = (truth - prediction).mapv(|e| e * e).sum_axis(Axis(0));

    let Some(means) = truth.mean_axis(Axis(0)) else {
        return Err(Error::shape("rrse", "non-empty truth", truth.dim()));
    };
    let deviation = (truth - &means).mapv(|d| d * d).sum();

    let per_channel = squared_error.mapv(|se| (se / deviation).sqrt());
    Ok(100.0 * per_channel.mean().unwrap_or(f64::NAN))
}

/// RRSE of several trajectories evaluated jointly: rows are stacked so the
/// normalisation uses the statistics of the whole split
pub fn rrse_joint(truth: &[Array2<f64>], prediction: &[Array2<f64>]) -> Result<f64> {
    if truth.len() != prediction.len() {
        return Err(Error::shape("rrse trajectories", truth.len(), prediction.len()));
    }
    rrse(&stack_rows(truth)?, &stack_rows(prediction)?)
}

/// Mean squared error over all rows and channels
pub fn mse(truth: &Array2<f64>, prediction: &Array2<f64>) -> Result<f64> {
    if truth.dim() != prediction.dim() {
        return Err(Error::shape("mse", truth.dim(), prediction.dim()));
    }
    Ok((truth - prediction).mapv(|e| e * e).mean().unwrap_or(f64::NAN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_perfect_prediction_scores_zero() {
        let truth = array![[1.0, 2.0], [3.0, 5.0], [0.0, -1.0]];
        assert_eq!(rrse(&truth, &truth).unwrap(), 0.0);
    }

    #[test]
    fn test_single_channel_mean_predictor_scores_hundred() {
        let truth = array![[1.0], [2.0], [3.0], [6.0]];
        let mean = Array2::from_elem((4, 1), 3.0);
        assert_relative_eq!(rrse(&truth, &mean).unwrap(), 100.0, epsilon = 1e-10);
    }

    #[test]
    fn test_global_denominator() {
        // channel deviations 2 and 8, D = 10
        let truth = array![[0.0, 0.0], [2.0, 4.0]];
        let prediction = array![[1.0, 2.0], [1.0, 2.0]];
        let expected = 100.0 * ((2.0f64 / 10.0).sqrt() + (8.0f64 / 10.0).sqrt()) / 2.0;
        assert_relative_eq!(rrse(&truth, &prediction).unwrap(), expected, epsilon = 1e-10);
    }

    #[test]
    fn test_shape_mismatch() {
        let truth = array![[1.0, 2.0]];
        let prediction = array![[1.0]];
        assert!(matches!(rrse(&truth, &prediction), Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_joint_matches_stacked() {
        let a = array![[1.0], [2.0]];
        let b = array![[4.0], [8.0], [0.0]];
        let pa = array![[1.5], [2.0]];
        let pb = array![[4.0], [7.0], [1.0]];

        let joint = rrse_joint(&[a.clone(), b.clone()], &[pa.clone(), pb.clone()]).unwrap();
        let stacked = rrse(
            &stack_rows(&[a, b]).unwrap(),
            &stack_rows(&[pa, pb]).unwrap(),
        )
        .unwrap();
        assert_eq!(joint, stacked);
    }

    #[test]
    fn test_mse() {
        let truth = array![[1.0, 2.0], [0.0, 1.0]];
        let prediction = Array2::zeros((2, 2));
        assert_relative_eq!(mse(&truth, &prediction).unwrap(), 1.5);
    }
}
