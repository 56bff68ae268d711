use burn::module::Module;
use burn::nn::Linear;
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rand::rngs::StdRng;

use crate::init;
use crate::integrator::Dynamics;

/// GRU gate block shared by the plain, higher-order and incremental GRU cells
///
/// Computes the update gate and candidate state:
/// - r = σ(W_xr x + b_r + W_hr h)
/// - z = σ(W_xz x + b_z + W_hz h)
/// - u = tanh(W_xu x + b_u + W_hu (r ⊙ h))
///
/// The plain GRU step is `h' = z ⊙ h + (1 - z) ⊙ u = h + (1 - z) ⊙ (u - h)`.
#[derive(Module, Debug)]
pub struct GruGates<B: Backend> {
    input_size: usize,
    state_size: usize,
    input_map: Linear<B>,     // input -> 3 * state_size (with bias)
    recurrent_map: Linear<B>, // state -> 2 * state_size (no bias)
    candidate_map: Linear<B>, // reset state -> state_size (no bias)
}

impl<B: Backend> GruGates<B> {
    /// Create the gate block with weights drawn from `rng`
    pub fn new(input_size: usize, state_size: usize, rng: &mut StdRng, device: &B::Device) -> Self {
        let input_map = init::linear(input_size, 3 * state_size, true, rng, device);
        let recurrent_map = init::linear(state_size, 2 * state_size, false, rng, device);
        let candidate_map = init::linear(state_size, state_size, false, rng, device);

        Self {
            input_size,
            state_size,
            input_map,
            recurrent_map,
            candidate_map,
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn state_size(&self) -> usize {
        self.state_size
    }

    /// Returns `(z, u)`, each `[batch, state_size]`
    pub fn forward(&self, input: Tensor<B, 2>, state: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let x_chunks = self.input_map.forward(input).chunk(3, 1);
        let h_chunks = self.recurrent_map.forward(state.clone()).chunk(2, 1);

        let reset = activation::sigmoid(x_chunks[0].clone() + h_chunks[0].clone());
        let update = activation::sigmoid(x_chunks[1].clone() + h_chunks[1].clone());
        let candidate =
            (x_chunks[2].clone() + self.candidate_map.forward(reset * state)).tanh();

        (update, candidate)
    }

    /// Compensated increment `(1 - z) ⊙ (u - h)`; one plain GRU step adds
    /// exactly this to `h`.
    pub fn increment(&self, input: Tensor<B, 2>, state: Tensor<B, 2>) -> Tensor<B, 2> {
        let (update, candidate) = self.forward(input, state.clone());
        (update.ones_like() - update) * (candidate - state)
    }

    /// Uncompensated increment `(1 - z) ⊙ u`, which lets the state drift
    /// linearly with the number of updates.
    pub fn raw_increment(&self, input: Tensor<B, 2>, state: Tensor<B, 2>) -> Tensor<B, 2> {
        let (update, candidate) = self.forward(input, state);
        (update.ones_like() - update) * candidate
    }
}

/// Continuous-time GRU flow `dh/dt = (1 - z) ⊙ (u - h) / mean_dt`
///
/// Scaled so that one Euler step of length `mean_dt` reproduces the plain
/// GRU update.
pub(crate) struct GruFlow<'a, B: Backend> {
    pub gates: &'a GruGates<B>,
    pub mean_dt: f64,
}

impl<B: Backend> Dynamics<B> for GruFlow<'_, B> {
    fn derivative(&self, state: Tensor<B, 2>, input: Tensor<B, 2>) -> Tensor<B, 2> {
        self.gates.increment(input, state).div_scalar(self.mean_dt)
    }
}
