//! Error types for model construction, rollout and training.
//!
//! Configuration and shape errors are fatal: they signal an invalid setup or
//! a bug in the data pipeline and are never recovered inside the crate.
//! Numerical divergence is reported with the epoch/window that produced it.

use thiserror::Error;

/// The error type for every fallible operation in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or incompatible model/training settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Misaligned input/output/interval lengths or a wrong state size.
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Where the mismatch was detected.
        context: &'static str,
        /// The expected shape or length.
        expected: String,
        /// The shape or length that was supplied.
        actual: String,
    },

    /// The training loss became NaN or infinite.
    #[error(
        "numerical divergence at epoch {epoch} (trajectories {trajectories:?}, window {window}): loss {loss}"
    )]
    NumericalDivergence {
        /// Epoch index (1-based).
        epoch: usize,
        /// Trajectories batched into the diverging step.
        trajectories: Vec<usize>,
        /// Window index within those trajectories.
        window: usize,
        /// The offending loss value.
        loss: f64,
    },

    /// Reading tensor values back to the host failed.
    #[error("tensor data conversion failed: {0}")]
    TensorData(String),
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub(crate) fn shape(
        context: &'static str,
        expected: impl std::fmt::Debug,
        actual: impl std::fmt::Debug,
    ) -> Self {
        Error::ShapeMismatch {
            context,
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_message() {
        let err = Error::shape("state0", [1, 20], [1, 10]);
        assert_eq!(
            err.to_string(),
            "shape mismatch in state0: expected [1, 20], got [1, 10]"
        );
    }

    #[test]
    fn test_divergence_message_carries_context() {
        let err = Error::NumericalDivergence {
            epoch: 3,
            trajectories: vec![1, 3],
            window: 4,
            loss: f64::NAN,
        };
        let msg = err.to_string();
        assert!(msg.contains("epoch 3"));
        assert!(msg.contains("window 4"));
        assert!(msg.contains("[1, 3]"));
    }
}
