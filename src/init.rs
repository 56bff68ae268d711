//! Seeded parameter initialisation.
//!
//! Every parameter is drawn from an explicit [`StdRng`] handed down from the
//! model configuration, so two models built from the same seed hold
//! identical weights without touching any backend-global RNG.

use burn::module::Param;
use burn::nn::Linear;
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use rand::prelude::*;

/// Uniform tensor in `[-bound, bound)` drawn from `rng`.
pub(crate) fn uniform<B: Backend, const D: usize>(
    shape: [usize; D],
    bound: f64,
    rng: &mut StdRng,
    device: &B::Device,
) -> Tensor<B, D> {
    let len: usize = shape.iter().product();
    let data: Vec<f32> = (0..len)
        .map(|_| rng.gen_range(-bound..bound) as f32)
        .collect();
    Tensor::from_data(TensorData::new(data, shape), device)
}

/// Trainable parameter with the usual `1/sqrt(fan_in)` uniform bound.
pub(crate) fn param<B: Backend, const D: usize>(
    shape: [usize; D],
    fan_in: usize,
    rng: &mut StdRng,
    device: &B::Device,
) -> Param<Tensor<B, D>> {
    let bound = 1.0 / (fan_in.max(1) as f64).sqrt();
    Param::from_tensor(uniform(shape, bound, rng, device))
}

/// Dense layer `d_input -> d_output`, initialised like torch's `nn.Linear`.
pub(crate) fn linear<B: Backend>(
    d_input: usize,
    d_output: usize,
    bias: bool,
    rng: &mut StdRng,
    device: &B::Device,
) -> Linear<B> {
    let weight = param([d_input, d_output], d_input, rng, device);
    let bias = bias.then(|| param([d_output], d_input, rng, device));
    Linear { weight, bias }
}
