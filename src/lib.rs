//! # TAHO - Time-Aware Higher-Order RNNs (Rust)
//!
//! Recurrent sequence models for irregularly sampled multivariate time
//! series, built on the Burn framework. The hidden-state recurrence is
//! treated as a numerical integrator of a continuous-time system, so the
//! state is advanced by the true elapsed interval between samples.
//!
//! ## Features
//!
//! - **HOGRU / HOARNN**: time-aware GRU and antisymmetric RNN cells
//!   integrated with Euler, Midpoint, Kutta3 or RK4
//! - **Incremental baselines**: interval as an input feature, one update per sample
//! - **MIMO**: sequence-to-sequence regressor with explicit state hand-off
//!   between train, dev and test rollouts
//! - **Truncated BPTT**: windowed training with early stopping on dev RRSE
//!
//! ## Quick Start
//!
//! ```rust
//! use taho::prelude::*;
//! use ndarray::Array2;
//!
//! let inputs = Array2::from_shape_fn((60, 2), |(i, c)| ((i + c) as f64 * 0.1).sin());
//! let outputs = Array2::from_shape_fn((60, 1), |(i, _)| (i as f64 * 0.1).cos());
//! let trajectory = Trajectory::with_constant_interval(inputs, outputs, 0.1).unwrap();
//!
//! let mut splits = SplitSet::new(&[trajectory], 0.15, 0.15).unwrap();
//! let prepared = splits.prepare(TimeAware::Variable).unwrap();
//!
//! let config = MimoConfig::new(prepared.input_size, prepared.output_size, 8)
//!     .with_model(ModelKind::Gru)
//!     .with_scheme(Scheme::RK4)
//!     .with_mean_dt(prepared.mean_dt);
//! assert_eq!(config.cell_kind().unwrap(), CellKind::HoGru);
//! ```
//!
//! ## Training
//!
//! ```ignore
//! use burn::backend::{Autodiff, NdArray};
//!
//! type Train = Autodiff<NdArray<f32>>;
//! let model: Mimo<Train> = config.init(&device)?;
//! let report = fit(model, &splits, &TrainingConfig::default().with_epochs(200), &device)?;
//! ```

pub mod cells;
pub mod config;
pub mod data;
pub mod error;
mod init;
pub mod integrator;
pub mod metrics;
pub mod rnn;
pub mod train;

pub use error::{Error, Result};

pub mod prelude {
    pub use crate::cells::{Cell, CellKind, CellOptions};
    pub use crate::config::{MimoConfig, ModelKind, TimeAware, TrainingConfig};
    pub use crate::data::{Prepared, Segment, SplitSet, Trajectory};
    pub use crate::error::{Error, Result};
    pub use crate::integrator::{Dynamics, Interpolation, Scheme};
    pub use crate::metrics::{rrse, rrse_joint};
    pub use crate::rnn::{first_input, last_state, Mimo};
    pub use crate::train::{fit, rollout, BestModel, EpochTrainer, Evaluation, TrainingReport};
}
