//! Multi-input multi-output sequence regressor
//!
//! Wraps a [`Cell`] and a linear read-out into a sequence-to-sequence model
//! over irregularly sampled trajectories.

use burn::module::{Ignored, Module};
use burn::nn::loss::{MseLoss, Reduction};
use burn::nn::{Dropout, DropoutConfig, Linear};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rand::prelude::*;

use crate::cells::{Cell, CellKind, CellOptions};
use crate::config::MimoConfig;
use crate::error::{Error, Result};
use crate::init;
use crate::integrator::{Interpolation, Scheme};

/// MIMO sequence model
///
/// Consumes `[batch, seq, input_size]` inputs with `[batch, seq]` intervals
/// and produces per-step outputs and hidden states. Each batch row is an
/// independent trajectory.
///
/// The integration scheme follows the backend: the train scheme under an
/// autodiff backend, the eval scheme on the inner (validation) backend.
#[derive(Module, Debug)]
pub struct Mimo<B: Backend> {
    cell: Cell<B>,
    dropout: Dropout,
    output: Linear<B>,
    input_size: usize,
    output_size: usize,
    state_size: usize,
    train_scheme: Ignored<Scheme>,
    eval_scheme: Ignored<Scheme>,
    interpolation: Ignored<Interpolation>,
}

impl MimoConfig {
    /// Build the model, validating the configuration first
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<Mimo<B>> {
        let kind = self.validate()?;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let options = CellOptions {
            gamma: self.gamma,
            step_size: self.step_size,
            mean_dt: self.mean_dt,
        };
        let cell = Cell::new(
            kind,
            self.input_size,
            self.state_size,
            options,
            &mut rng,
            device,
        );
        let output = init::linear(self.state_size, self.output_size, true, &mut rng, device);

        Ok(Mimo {
            cell,
            dropout: DropoutConfig::new(self.dropout).init(),
            output,
            input_size: self.input_size,
            output_size: self.output_size,
            state_size: self.state_size,
            train_scheme: Ignored(self.train_scheme),
            eval_scheme: Ignored(self.eval_scheme),
            interpolation: Ignored(self.interpolation),
        })
    }
}

impl<B: Backend> Mimo<B> {
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    pub fn state_size(&self) -> usize {
        self.state_size
    }

    pub fn cell_kind(&self) -> CellKind {
        self.cell.kind()
    }

    /// Scheme used by `forward` on this backend
    pub fn scheme(&self) -> Scheme {
        if B::ad_enabled() {
            self.train_scheme.0
        } else {
            self.eval_scheme.0
        }
    }

    pub fn cell(&self) -> &Cell<B> {
        &self.cell
    }

    /// Output read-out layer
    pub fn output_layer(&self) -> &Linear<B> {
        &self.output
    }

    /// Roll the model over a batch of trajectories
    ///
    /// # Arguments
    /// * `inputs` - `[batch, seq, input_size]`
    /// * `dt` - `[batch, seq]`, interval from each sample to the next
    /// * `state0` - optional `[batch, state_size]` starting state; zeros when absent
    ///
    /// # Returns
    /// `(outputs, states)` with shapes `[batch, seq, output_size]` and
    /// `[batch, seq, state_size]`. The last state can be handed to the next
    /// call as `state0` to continue the rollout.
    ///
    /// The last step holds its own input for linear interpolation; use
    /// [`Mimo::forward_with_lookahead`] when the following sample is known.
    pub fn forward(
        &self,
        inputs: Tensor<B, 3>,
        dt: Tensor<B, 2>,
        state0: Option<Tensor<B, 2>>,
    ) -> Result<(Tensor<B, 3>, Tensor<B, 3>)> {
        self.forward_with_lookahead(inputs, dt, state0, None)
    }

    /// Like [`Mimo::forward`], with `lookahead` `[batch, input_size]` as the
    /// sample that follows the last step
    ///
    /// Passing the first input of the next call makes two chained calls
    /// equal to one call over the joined sequence under any interpolation.
    pub fn forward_with_lookahead(
        &self,
        inputs: Tensor<B, 3>,
        dt: Tensor<B, 2>,
        state0: Option<Tensor<B, 2>>,
        lookahead: Option<Tensor<B, 2>>,
    ) -> Result<(Tensor<B, 3>, Tensor<B, 3>)> {
        let [batch_size, seq_len, features] = inputs.dims();
        if features != self.input_size {
            return Err(Error::shape("inputs features", self.input_size, features));
        }
        if dt.dims() != [batch_size, seq_len] {
            return Err(Error::shape("dt", [batch_size, seq_len], dt.dims()));
        }
        if seq_len == 0 {
            return Err(Error::shape("inputs steps", "at least one step", seq_len));
        }
        if let Some(next) = &lookahead {
            if next.dims() != [batch_size, self.input_size] {
                return Err(Error::shape(
                    "lookahead",
                    [batch_size, self.input_size],
                    next.dims(),
                ));
            }
        }

        let device = inputs.device();
        let mut state = match state0 {
            Some(state) if state.dims() != [batch_size, self.state_size] => {
                return Err(Error::shape(
                    "state0",
                    [batch_size, self.state_size],
                    state.dims(),
                ));
            }
            Some(state) => state,
            None => Tensor::zeros([batch_size, self.state_size], &device),
        };

        let scheme = self.scheme();
        let step_input = |t: usize| -> Tensor<B, 2> { inputs.clone().narrow(1, t, 1).squeeze(1) };

        let mut outputs: Vec<Tensor<B, 2>> = Vec::with_capacity(seq_len);
        let mut states: Vec<Tensor<B, 2>> = Vec::with_capacity(seq_len);
        let mut input = step_input(0);
        let mut lookahead = lookahead;

        for t in 0..seq_len {
            let next_input = if t + 1 < seq_len {
                step_input(t + 1)
            } else {
                lookahead.take().unwrap_or_else(|| input.clone())
            };
            let step_dt: Tensor<B, 1> = dt.clone().narrow(1, t, 1).squeeze(1);

            state = self.cell.advance(
                state,
                input,
                next_input.clone(),
                step_dt,
                scheme,
                self.interpolation.0,
            );

            outputs.push(self.output.forward(self.dropout.forward(state.clone())));
            states.push(state.clone());
            input = next_input;
        }

        Ok((Tensor::stack(outputs, 1), Tensor::stack(states, 1)))
    }

    /// Mean squared error over all steps and output channels
    pub fn criterion(&self, predictions: Tensor<B, 3>, targets: Tensor<B, 3>) -> Result<Tensor<B, 1>> {
        if predictions.dims() != targets.dims() {
            return Err(Error::shape("criterion", targets.dims(), predictions.dims()));
        }
        Ok(MseLoss::new().forward(predictions, targets, Reduction::Mean))
    }

    /// Total number of trainable scalars
    pub fn num_parameters(&self) -> usize {
        self.num_params()
    }
}

/// Last hidden state `[batch, state_size]` of a `[batch, seq, state_size]`
/// rollout, `None` when the rollout has no steps
pub fn last_state<B: Backend>(states: &Tensor<B, 3>) -> Option<Tensor<B, 2>> {
    let [_, seq_len, _] = states.dims();
    let last = seq_len.checked_sub(1)?;
    Some(states.clone().narrow(1, last, 1).squeeze(1))
}

/// First input `[batch, input_size]` of a `[batch, seq, input_size]` tensor,
/// `None` when it has no steps
pub fn first_input<B: Backend>(inputs: &Tensor<B, 3>) -> Option<Tensor<B, 2>> {
    let [_, seq_len, _] = inputs.dims();
    (seq_len > 0).then(|| inputs.clone().narrow(1, 0, 1).squeeze(1))
}
