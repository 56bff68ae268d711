//! Model and training configuration.
//!
//! All settings are plain serde values; the string spellings accepted by
//! [`FromStr`] match the historical command-line choices (`GRU`, `GRUinc`,
//! `variable`, `RK4`, ...).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cells::CellKind;
use crate::error::{Error, Result};
use crate::integrator::{Interpolation, Scheme};

/// Model family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModelKind {
    /// Compensated GRU; the standard GRU is its Euler special case on
    /// equidistant data
    #[default]
    #[serde(rename = "GRU")]
    Gru,
    /// Incremental GRU baseline
    #[serde(rename = "GRUinc")]
    GruInc,
    /// Antisymmetric RNN
    #[serde(rename = "ARNN")]
    Arnn,
    /// Incremental antisymmetric RNN baseline
    #[serde(rename = "ARNNinc")]
    ArnnInc,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModelKind::Gru => "GRU",
            ModelKind::GruInc => "GRUinc",
            ModelKind::Arnn => "ARNN",
            ModelKind::ArnnInc => "ARNNinc",
        })
    }
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "GRU" => Ok(ModelKind::Gru),
            "GRUinc" => Ok(ModelKind::GruInc),
            "ARNN" => Ok(ModelKind::Arnn),
            "ARNNinc" => Ok(ModelKind::ArnnInc),
            other => Err(Error::config(format!("unknown model type '{}'", other))),
        }
    }
}

/// How uneven sample spacing is exposed to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeAware {
    /// Ignore spacing: every interval is treated as 1
    No,
    /// Normalised interval as an extra input feature; intervals set to 1
    Input,
    /// Integrate the true interval
    #[default]
    Variable,
}

impl fmt::Display for TimeAware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TimeAware::No => "no",
            TimeAware::Input => "input",
            TimeAware::Variable => "variable",
        })
    }
}

impl FromStr for TimeAware {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "no" => Ok(TimeAware::No),
            "input" => Ok(TimeAware::Input),
            "variable" => Ok(TimeAware::Variable),
            other => Err(Error::config(format!(
                "unknown time_aware option '{}', expected no, input or variable",
                other
            ))),
        }
    }
}

/// Configuration of a [`Mimo`](crate::rnn::Mimo) sequence model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MimoConfig {
    /// Input features per step (after any interval feature was appended)
    pub input_size: usize,
    pub output_size: usize,
    /// Hidden state dimension (k_state)
    pub state_size: usize,
    pub model: ModelKind,
    pub time_aware: TimeAware,
    /// Explicit cell choice; derived from `model` and `time_aware` when unset
    pub cell: Option<CellKind>,
    pub train_scheme: Scheme,
    pub eval_scheme: Scheme,
    pub interpolation: Interpolation,
    /// ARNN diffusion coefficient
    pub gamma: f64,
    /// ARNN internal step size
    pub step_size: f64,
    /// Dropout on the hidden state before the output projection
    pub dropout: f64,
    /// Mean training interval used for calibration and feature scaling
    pub mean_dt: f64,
    /// Seed for parameter initialisation
    pub seed: u64,
}

impl MimoConfig {
    pub fn new(input_size: usize, output_size: usize, state_size: usize) -> Self {
        Self {
            input_size,
            output_size,
            state_size,
            model: ModelKind::default(),
            time_aware: TimeAware::default(),
            cell: None,
            train_scheme: Scheme::default(),
            eval_scheme: Scheme::default(),
            interpolation: Interpolation::default(),
            gamma: 1.0,
            step_size: 1.0,
            dropout: 0.0,
            mean_dt: 1.0,
            seed: 0,
        }
    }

    pub fn with_model(mut self, model: ModelKind) -> Self {
        self.model = model;
        self
    }

    pub fn with_time_aware(mut self, time_aware: TimeAware) -> Self {
        self.time_aware = time_aware;
        self
    }

    /// Force a specific cell instead of deriving it from the model kind
    pub fn with_cell(mut self, cell: CellKind) -> Self {
        self.cell = Some(cell);
        self
    }

    /// Use the same scheme for training and evaluation
    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.train_scheme = scheme;
        self.eval_scheme = scheme;
        self
    }

    pub fn with_train_scheme(mut self, scheme: Scheme) -> Self {
        self.train_scheme = scheme;
        self
    }

    pub fn with_eval_scheme(mut self, scheme: Scheme) -> Self {
        self.eval_scheme = scheme;
        self
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_step_size(mut self, step_size: f64) -> Self {
        self.step_size = step_size;
        self
    }

    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    pub fn with_mean_dt(mut self, mean_dt: f64) -> Self {
        self.mean_dt = mean_dt;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Resolve the cell kind, rejecting incompatible combinations
    pub fn cell_kind(&self) -> Result<CellKind> {
        let kind = match self.cell {
            Some(kind) => kind,
            None => CellKind::select(self.model, self.time_aware),
        };
        kind.check_time_aware(self.time_aware)?;
        Ok(kind)
    }

    /// Check every setting; called by `init` before any parameter is built
    pub fn validate(&self) -> Result<CellKind> {
        if self.input_size == 0 || self.output_size == 0 || self.state_size == 0 {
            return Err(Error::config(format!(
                "sizes must be positive (input {}, output {}, state {})",
                self.input_size, self.output_size, self.state_size
            )));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(Error::config(format!("dropout {} not in [0, 1)", self.dropout)));
        }
        if !(self.mean_dt.is_finite() && self.mean_dt > 0.0) {
            return Err(Error::config(format!("mean_dt {} must be positive", self.mean_dt)));
        }
        if !(self.step_size.is_finite() && self.step_size > 0.0) {
            return Err(Error::config(format!(
                "step_size {} must be positive",
                self.step_size
            )));
        }
        if !self.gamma.is_finite() {
            return Err(Error::config("gamma must be finite"));
        }
        self.cell_kind()
    }
}

/// Configuration of the training loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub epochs: usize,
    /// Truncated backpropagation window length
    pub bptt: usize,
    /// Windows from distinct trajectories trained in one optimizer step
    pub batch_size: usize,
    pub learning_rate: f64,
    /// L2 weight decay
    pub l2: f64,
    /// Evaluate on train/dev every so many epochs
    pub eval_epochs: usize,
    /// Stop when the dev error has not improved for this many epochs
    pub max_epochs_no_decrease: usize,
    pub frac_dev: f64,
    pub frac_test: f64,
    /// Seed for window shuffling
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 1000,
            bptt: 20,
            batch_size: 16,
            learning_rate: 0.001,
            l2: 0.0,
            eval_epochs: 20,
            max_epochs_no_decrease: 1000,
            frac_dev: 0.15,
            frac_test: 0.15,
            seed: 0,
        }
    }
}

impl TrainingConfig {
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_bptt(mut self, bptt: usize) -> Self {
        self.bptt = bptt;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_l2(mut self, l2: f64) -> Self {
        self.l2 = l2;
        self
    }

    pub fn with_eval_epochs(mut self, eval_epochs: usize) -> Self {
        self.eval_epochs = eval_epochs;
        self
    }

    pub fn with_max_epochs_no_decrease(mut self, epochs: usize) -> Self {
        self.max_epochs_no_decrease = epochs;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 || self.bptt == 0 || self.batch_size == 0 || self.eval_epochs == 0 {
            return Err(Error::config(
                "epochs, bptt, batch_size and eval_epochs must be positive",
            ));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::config(format!(
                "learning rate {} must be positive",
                self.learning_rate
            )));
        }
        if !(self.l2.is_finite() && self.l2 >= 0.0) {
            return Err(Error::config(format!("l2 {} must be non-negative", self.l2)));
        }
        let fractions_ok = (0.0..1.0).contains(&self.frac_dev)
            && (0.0..1.0).contains(&self.frac_test)
            && self.frac_dev + self.frac_test < 1.0;
        if !fractions_ok {
            return Err(Error::config(format!(
                "invalid split fractions dev {} / test {}",
                self.frac_dev, self.frac_test
            )));
        }
        Ok(())
    }
}
