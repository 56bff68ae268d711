//! Explicit Runge-Kutta integration of hidden-state dynamics.
//!
//! A time-aware cell only defines the instantaneous derivative
//! `dh/dt = f(h, x)`; this module advances `h` across an arbitrary interval
//! `dt` with one of four explicit schemes, all expressed as Butcher tableaus:
//!
//! ```text
//! k_i    = f(h + dt * sum_j a_ij * k_j, x(c_i))
//! h_next = h + dt * sum_i b_i * k_i
//! ```
//!
//! `dt` is per batch row, so every trajectory in a batch is advanced by its
//! own elapsed interval.

use std::fmt;
use std::str::FromStr;

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Instantaneous state derivative of a continuous-time recurrent model.
pub trait Dynamics<B: Backend> {
    /// Evaluate `f(h, x)` for a batch: `state` is `[batch, state_size]`,
    /// `input` is `[batch, input_size]`.
    fn derivative(&self, state: Tensor<B, 2>, input: Tensor<B, 2>) -> Tensor<B, 2>;
}

/// Explicit Runge-Kutta scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Scheme {
    /// Forward Euler, first order.
    #[default]
    Euler,
    /// Explicit midpoint, second order.
    Midpoint,
    /// Kutta's third-order method.
    Kutta3,
    /// Classical fourth-order Runge-Kutta.
    RK4,
}

struct Tableau {
    a: &'static [&'static [f64]],
    b: &'static [f64],
    c: &'static [f64],
}

const EULER: Tableau = Tableau {
    a: &[&[]],
    b: &[1.0],
    c: &[0.0],
};

const MIDPOINT: Tableau = Tableau {
    a: &[&[], &[0.5]],
    b: &[0.0, 1.0],
    c: &[0.0, 0.5],
};

const KUTTA3: Tableau = Tableau {
    a: &[&[], &[0.5], &[-1.0, 2.0]],
    b: &[1.0 / 6.0, 4.0 / 6.0, 1.0 / 6.0],
    c: &[0.0, 0.5, 1.0],
};

const RK4: Tableau = Tableau {
    a: &[&[], &[0.5], &[0.0, 0.5], &[0.0, 0.0, 1.0]],
    b: &[1.0 / 6.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 6.0],
    c: &[0.0, 0.5, 0.5, 1.0],
};

impl Scheme {
    pub const ALL: [Scheme; 4] = [Scheme::Euler, Scheme::Midpoint, Scheme::Kutta3, Scheme::RK4];

    fn tableau(&self) -> &'static Tableau {
        match self {
            Scheme::Euler => &EULER,
            Scheme::Midpoint => &MIDPOINT,
            Scheme::Kutta3 => &KUTTA3,
            Scheme::RK4 => &RK4,
        }
    }

    /// Number of derivative evaluations per step.
    pub fn stages(&self) -> usize {
        self.tableau().b.len()
    }

    /// Global order of accuracy.
    pub fn order(&self) -> usize {
        match self {
            Scheme::Euler => 1,
            Scheme::Midpoint => 2,
            Scheme::Kutta3 => 3,
            Scheme::RK4 => 4,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Scheme::Euler => "Euler",
            Scheme::Midpoint => "Midpoint",
            Scheme::Kutta3 => "Kutta3",
            Scheme::RK4 => "RK4",
        };
        f.write_str(name)
    }
}

impl FromStr for Scheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Euler" => Ok(Scheme::Euler),
            "Midpoint" => Ok(Scheme::Midpoint),
            "Kutta3" => Ok(Scheme::Kutta3),
            "RK4" => Ok(Scheme::RK4),
            other => Err(Error::config(format!(
                "unknown scheme '{}', expected one of Euler, Midpoint, Kutta3, RK4",
                other
            ))),
        }
    }
}

/// How the input is sampled at intermediate stages of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    /// Hold the current sample for every stage.
    #[default]
    Constant,
    /// Linear interpolation between the current and the next sample.
    Linear,
}

impl Interpolation {
    /// Input at relative position `c` in `[0, 1]` of the interval.
    pub fn sample<B: Backend>(
        &self,
        input: &Tensor<B, 2>,
        next_input: &Tensor<B, 2>,
        c: f64,
    ) -> Tensor<B, 2> {
        match self {
            Interpolation::Constant => input.clone(),
            Interpolation::Linear if c <= 0.0 => input.clone(),
            Interpolation::Linear if c >= 1.0 => next_input.clone(),
            Interpolation::Linear => input
                .clone()
                .mul_scalar(1.0 - c)
                .add(next_input.clone().mul_scalar(c)),
        }
    }
}

impl FromStr for Interpolation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "constant" => Ok(Interpolation::Constant),
            "linear" => Ok(Interpolation::Linear),
            other => Err(Error::config(format!(
                "unknown interpolation '{}', expected constant or linear",
                other
            ))),
        }
    }
}

/// Advance `state` by the per-row interval `dt` (`[batch]`).
///
/// `next_input` is only read with [`Interpolation::Linear`].
pub fn advance<B: Backend, D: Dynamics<B> + ?Sized>(
    dynamics: &D,
    state: Tensor<B, 2>,
    input: Tensor<B, 2>,
    next_input: Tensor<B, 2>,
    dt: Tensor<B, 1>,
    scheme: Scheme,
    interpolation: Interpolation,
) -> Tensor<B, 2> {
    let [batch, state_size] = state.dims();
    let tableau = scheme.tableau();

    // [batch] -> [batch, 1] -> [batch, state_size]
    let dt = dt.unsqueeze_dim::<2>(1).expand([batch, state_size]);

    let mut stages: Vec<Tensor<B, 2>> = Vec::with_capacity(tableau.b.len());
    for (row, &c) in tableau.a.iter().zip(tableau.c) {
        let mut stage_state = state.clone();
        for (k, &a) in stages.iter().zip(row.iter()) {
            if a != 0.0 {
                stage_state = stage_state.add(dt.clone().mul(k.clone()).mul_scalar(a));
            }
        }
        let stage_input = interpolation.sample(&input, &next_input, c);
        stages.push(dynamics.derivative(stage_state, stage_input));
    }

    let mut increment = state.zeros_like();
    for (k, &b) in stages.into_iter().zip(tableau.b) {
        if b != 0.0 {
            increment = increment.add(k.mul_scalar(b));
        }
    }

    state.add(dt.mul(increment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type Backend = NdArray<f32>;

    /// dh/dt = x, independent of h.
    struct Drift;

    impl Dynamics<Backend> for Drift {
        fn derivative(&self, _state: Tensor<Backend, 2>, input: Tensor<Backend, 2>) -> Tensor<Backend, 2> {
            input
        }
    }

    #[test]
    fn test_tableau_weights_sum_to_one() {
        for scheme in Scheme::ALL {
            let tableau = scheme.tableau();
            let sum: f64 = tableau.b.iter().sum();
            assert!((sum - 1.0).abs() < 1e-12, "{} weights sum to {}", scheme, sum);
            assert_eq!(tableau.a.len(), scheme.stages());
            for (row, &c) in tableau.a.iter().zip(tableau.c) {
                let row_sum: f64 = row.iter().sum();
                assert!((row_sum - c).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_scheme_parse_round_trip() {
        for scheme in Scheme::ALL {
            assert_eq!(scheme.to_string().parse::<Scheme>().unwrap(), scheme);
        }
        assert!("RK5".parse::<Scheme>().is_err());
    }

    #[test]
    fn test_per_row_intervals() {
        let device = Default::default();
        let state = Tensor::<Backend, 2>::zeros([2, 3], &device);
        let input = Tensor::<Backend, 2>::ones([2, 3], &device);
        let dt = Tensor::<Backend, 1>::from_floats([0.5, 2.0], &device);

        let next = advance(&Drift, state, input.clone(), input, dt, Scheme::RK4, Interpolation::Constant);
        let values = next.into_data().to_vec::<f32>().unwrap();

        for (i, value) in values.iter().enumerate() {
            let expected = if i < 3 { 0.5 } else { 2.0 };
            assert!((value - expected).abs() < 1e-6, "row value {} != {}", value, expected);
        }
    }

    #[test]
    fn test_linear_interpolation_integrates_ramp() {
        // x ramps from 0 to 1 across the step, so h(1) = 0.5 exactly for
        // any scheme that samples the midpoint.
        let device = Default::default();
        let state = Tensor::<Backend, 2>::zeros([1, 1], &device);
        let input = Tensor::<Backend, 2>::zeros([1, 1], &device);
        let next = Tensor::<Backend, 2>::ones([1, 1], &device);
        let dt = Tensor::<Backend, 1>::ones([1], &device);

        for scheme in [Scheme::Midpoint, Scheme::Kutta3, Scheme::RK4] {
            let h = advance(
                &Drift,
                state.clone(),
                input.clone(),
                next.clone(),
                dt.clone(),
                scheme,
                Interpolation::Linear,
            );
            let value = h.into_scalar();
            assert!((value - 0.5).abs() < 1e-6, "{}: {}", scheme, value);
        }

        let h = advance(&Drift, state, input, next, dt, Scheme::RK4, Interpolation::Constant);
        assert_eq!(h.into_scalar(), 0.0);
    }
}
