//! # Recurrent Cell Implementations
//!
//! Single-step cells that advance a hidden state across one sampling
//! interval. [`crate::rnn::Mimo`] wraps a [`Cell`] for whole sequences.
//!
//! ## Cell Kinds
//!
//! | Kind | Update | Uses `dt` |
//! |------|--------|-----------|
//! | [`CellKind::Gru`] | plain GRU step | no |
//! | [`CellKind::HoGru`] | Runge-Kutta integration of the GRU flow | integrated |
//! | [`CellKind::IncrHoGru`] | `h + (1 - z) ⊙ u` | as input feature |
//! | [`CellKind::HoArnn`] | Runge-Kutta integration of the ARNN flow | integrated |
//! | [`CellKind::IncrHoArnn`] | `h + step_size · z ⊙ u` | as input feature |
//!
//! ## Higher-Order Cells
//!
//! The higher-order cells define a derivative scaled by the mean training
//! interval:
//! ```text
//! GRU:  dh/dt = (1 - z) ⊙ (u - h) / mean_dt
//! ARNN: dh/dt = step_size · z ⊙ u / mean_dt
//! ```
//! One Euler step of length `mean_dt` therefore equals one discrete step of
//! the corresponding baseline cell.
//!
//! ## Incremental Cells
//!
//! The incremental baselines append `dt / mean_dt` to the input and apply a
//! single discrete update per sample, however long the interval is.
//!
//! ## Tensor Shapes
//!
//! | Tensor | Shape |
//! |--------|-------|
//! | `input`, `next_input` | `[batch, input_size]` |
//! | `state` | `[batch, state_size]` |
//! | `dt` | `[batch]` |

pub mod arnn_cell;
pub mod gru_cell;

pub use arnn_cell::ArnnGates;
pub use gru_cell::GruGates;

use std::fmt;

use burn::module::{Ignored, Module};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::config::{ModelKind, TimeAware};
use crate::error::{Error, Result};
use crate::integrator::{self, Interpolation, Scheme};
use arnn_cell::ArnnFlow;
use gru_cell::GruFlow;

/// The closed set of cell variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellKind {
    /// Plain GRU, ignores `dt`
    Gru,
    /// Time-aware higher-order GRU
    HoGru,
    /// Incremental GRU baseline
    IncrHoGru,
    /// Time-aware higher-order antisymmetric RNN
    HoArnn,
    /// Incremental antisymmetric RNN baseline
    IncrHoArnn,
}

impl CellKind {
    /// Cell used for a model family under a time-awareness option
    pub fn select(model: ModelKind, time_aware: TimeAware) -> Self {
        match (model, time_aware) {
            (ModelKind::Gru, TimeAware::No) => CellKind::Gru,
            (ModelKind::Gru, _) => CellKind::HoGru,
            (ModelKind::GruInc, _) => CellKind::IncrHoGru,
            (ModelKind::Arnn, _) => CellKind::HoArnn,
            (ModelKind::ArnnInc, _) => CellKind::IncrHoArnn,
        }
    }

    pub fn check_time_aware(&self, time_aware: TimeAware) -> Result<()> {
        match (self, time_aware) {
            (CellKind::Gru, TimeAware::Variable) => Err(Error::config(
                "the plain GRU cell ignores intervals; use HoGru for time_aware=variable",
            )),
            (CellKind::IncrHoGru | CellKind::IncrHoArnn, TimeAware::Input) => {
                Err(Error::config(format!(
                    "{} already consumes the interval as an input feature; \
                     time_aware=input would add it twice",
                    self
                )))
            }
            _ => Ok(()),
        }
    }

    /// Whether the state is advanced by a Runge-Kutta scheme
    pub fn is_integrated(&self) -> bool {
        matches!(self, CellKind::HoGru | CellKind::HoArnn)
    }

    /// Whether the cell appends `dt / mean_dt` to its input
    pub fn uses_interval_feature(&self) -> bool {
        matches!(self, CellKind::IncrHoGru | CellKind::IncrHoArnn)
    }

    fn is_gru(&self) -> bool {
        matches!(self, CellKind::Gru | CellKind::HoGru | CellKind::IncrHoGru)
    }
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CellKind::Gru => "GRUCell",
            CellKind::HoGru => "HOGRUCell",
            CellKind::IncrHoGru => "IncrHOGRUCell",
            CellKind::HoArnn => "HOARNNCell",
            CellKind::IncrHoArnn => "IncrHOARNNCell",
        })
    }
}

/// Cell hyper-parameters that are not sizes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellOptions {
    pub gamma: f64,
    pub step_size: f64,
    pub mean_dt: f64,
}

impl Default for CellOptions {
    fn default() -> Self {
        Self {
            gamma: 1.0,
            step_size: 1.0,
            mean_dt: 1.0,
        }
    }
}

/// Gate block of a cell family
#[derive(Module, Debug)]
pub enum CellGates<B: Backend> {
    Gru(GruGates<B>),
    Arnn(ArnnGates<B>),
}

/// A recurrent cell of one [`CellKind`], selected at construction
#[derive(Module, Debug)]
pub struct Cell<B: Backend> {
    kind: Ignored<CellKind>,
    input_size: usize,
    state_size: usize,
    step_size: f64,
    mean_dt: f64,
    gates: CellGates<B>,
}

impl<B: Backend> Cell<B> {
    pub fn new(
        kind: CellKind,
        input_size: usize,
        state_size: usize,
        options: CellOptions,
        rng: &mut StdRng,
        device: &B::Device,
    ) -> Self {
        let gate_inputs = if kind.uses_interval_feature() {
            input_size + 1
        } else {
            input_size
        };

        let gates = if kind.is_gru() {
            CellGates::Gru(GruGates::new(gate_inputs, state_size, rng, device))
        } else {
            CellGates::Arnn(ArnnGates::new(
                gate_inputs,
                state_size,
                options.gamma,
                rng,
                device,
            ))
        };

        Self {
            kind: Ignored(kind),
            input_size,
            state_size,
            step_size: options.step_size,
            mean_dt: options.mean_dt,
            gates,
        }
    }

    pub fn kind(&self) -> CellKind {
        self.kind.0
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn state_size(&self) -> usize {
        self.state_size
    }

    pub fn mean_dt(&self) -> f64 {
        self.mean_dt
    }

    pub fn gates(&self) -> &CellGates<B> {
        &self.gates
    }

    /// Append the normalised interval `dt / mean_dt` as a last input column
    fn with_interval_feature(&self, input: Tensor<B, 2>, dt: Tensor<B, 1>) -> Tensor<B, 2> {
        let feature = dt.div_scalar(self.mean_dt).unsqueeze_dim::<2>(1);
        Tensor::cat(vec![input, feature], 1)
    }

    /// Advance `state` across one sampling interval
    ///
    /// `dt` is the elapsed interval per batch row. `next_input` is the
    /// following sample, read only by integrated cells with linear
    /// interpolation.
    pub fn advance(
        &self,
        state: Tensor<B, 2>,
        input: Tensor<B, 2>,
        next_input: Tensor<B, 2>,
        dt: Tensor<B, 1>,
        scheme: Scheme,
        interpolation: Interpolation,
    ) -> Tensor<B, 2> {
        match (&self.gates, self.kind()) {
            (CellGates::Gru(gates), CellKind::Gru) => {
                let increment = gates.increment(input, state.clone());
                state + increment
            }
            (CellGates::Gru(gates), CellKind::HoGru) => {
                let flow = GruFlow {
                    gates,
                    mean_dt: self.mean_dt,
                };
                integrator::advance(&flow, state, input, next_input, dt, scheme, interpolation)
            }
            (CellGates::Gru(gates), _) => {
                let input = self.with_interval_feature(input, dt);
                let increment = gates.raw_increment(input, state.clone());
                state + increment
            }
            (CellGates::Arnn(gates), CellKind::HoArnn) => {
                let flow = ArnnFlow {
                    gates,
                    step_size: self.step_size,
                    mean_dt: self.mean_dt,
                };
                integrator::advance(&flow, state, input, next_input, dt, scheme, interpolation)
            }
            (CellGates::Arnn(gates), _) => {
                let input = self.with_interval_feature(input, dt);
                let increment = gates.increment(input, state.clone(), self.step_size);
                state + increment
            }
        }
    }
}
