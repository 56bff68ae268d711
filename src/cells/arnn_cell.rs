//! Antisymmetric RNN gate block.
//!
//! Reference: Chang et al., "AntisymmetricRNN: A dynamical system view on
//! recurrent neural networks", ICLR 2019.
//!
//! The recurrent matrix is `A = W - Wᵀ - γI`. Its antisymmetric part has
//! purely imaginary eigenvalues; the diffusion term `γ` shifts them into the
//! left half-plane so the dynamics stay stable.

use burn::module::{Module, Param};
use burn::nn::Linear;
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rand::rngs::StdRng;

use crate::init;
use crate::integrator::Dynamics;

/// Gated antisymmetric update:
/// - z = σ(A_z h + V_z x + b_z)
/// - u = tanh(A h + V x + b)
///
/// with `A = W - Wᵀ - γI` and `A_z = W_z - W_zᵀ - γI`. The discrete ARNN
/// step is `h' = h + step_size · z ⊙ u`.
#[derive(Module, Debug)]
pub struct ArnnGates<B: Backend> {
    input_size: usize,
    state_size: usize,
    /// Diffusion coefficient
    gamma: f64,
    recurrent: Param<Tensor<B, 2>>,
    recurrent_gate: Param<Tensor<B, 2>>,
    input_map: Linear<B>, // input -> 2 * state_size (with bias)
}

impl<B: Backend> ArnnGates<B> {
    pub fn new(
        input_size: usize,
        state_size: usize,
        gamma: f64,
        rng: &mut StdRng,
        device: &B::Device,
    ) -> Self {
        let recurrent = init::param([state_size, state_size], state_size, rng, device);
        let recurrent_gate = init::param([state_size, state_size], state_size, rng, device);
        let input_map = init::linear(input_size, 2 * state_size, true, rng, device);

        Self {
            input_size,
            state_size,
            gamma,
            recurrent,
            recurrent_gate,
            input_map,
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn state_size(&self) -> usize {
        self.state_size
    }

    /// Row-batched `A h` for `A = W - Wᵀ - γI`, i.e. `h (Wᵀ - W) - γ h`
    fn antisymmetric(&self, weight: Tensor<B, 2>, state: Tensor<B, 2>) -> Tensor<B, 2> {
        let skew = weight.clone().transpose() - weight;
        state.clone().matmul(skew) - state.mul_scalar(self.gamma)
    }

    /// Returns `(z, u)`, each `[batch, state_size]`
    pub fn forward(&self, input: Tensor<B, 2>, state: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let x_chunks = self.input_map.forward(input).chunk(2, 1);

        let gate = activation::sigmoid(
            self.antisymmetric(self.recurrent_gate.val(), state.clone()) + x_chunks[0].clone(),
        );
        let candidate =
            (self.antisymmetric(self.recurrent.val(), state) + x_chunks[1].clone()).tanh();

        (gate, candidate)
    }

    /// `step_size · z ⊙ u`
    pub fn increment(&self, input: Tensor<B, 2>, state: Tensor<B, 2>, step_size: f64) -> Tensor<B, 2> {
        let (gate, candidate) = self.forward(input, state);
        (gate * candidate).mul_scalar(step_size)
    }
}

/// Continuous-time ARNN flow `dh/dt = step_size · z ⊙ u / mean_dt`
pub(crate) struct ArnnFlow<'a, B: Backend> {
    pub gates: &'a ArnnGates<B>,
    pub step_size: f64,
    pub mean_dt: f64,
}

impl<B: Backend> Dynamics<B> for ArnnFlow<'_, B> {
    fn derivative(&self, state: Tensor<B, 2>, input: Tensor<B, 2>) -> Tensor<B, 2> {
        self.gates
            .increment(input, state, self.step_size)
            .div_scalar(self.mean_dt)
    }
}
