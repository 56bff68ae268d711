//! # Sequence Models
//!
//! [`Mimo`] rolls a [`Cell`](crate::cells::Cell) over whole trajectories and
//! projects every hidden state to the outputs.
//!
//! ## Quick Start
//!
//! ```rust
//! use burn::backend::NdArray;
//! use burn::tensor::Tensor;
//! use taho::prelude::*;
//!
//! type Backend = NdArray<f32>;
//! let device = Default::default();
//!
//! let config = MimoConfig::new(3, 2, 16)
//!     .with_model(ModelKind::Gru)
//!     .with_time_aware(TimeAware::Variable)
//!     .with_scheme(Scheme::RK4);
//! let model: Mimo<Backend> = config.init(&device).unwrap();
//!
//! // [batch=1, seq=10, features=3] with a 0.1 interval between samples
//! let inputs = Tensor::<Backend, 3>::zeros([1, 10, 3], &device);
//! let dt = Tensor::<Backend, 2>::full([1, 10], 0.1, &device);
//! let (outputs, states) = model.forward(inputs, dt, None).unwrap();
//!
//! assert_eq!(outputs.dims(), [1, 10, 2]);
//! assert_eq!(states.dims(), [1, 10, 16]);
//! ```
//!
//! ## Tensor Shapes
//!
//! | Tensor | Shape |
//! |--------|-------|
//! | `inputs` | `[batch, seq_len, input_size]` |
//! | `dt` | `[batch, seq_len]` |
//! | `state0` | `[batch, state_size]` |
//! | outputs | `[batch, seq_len, output_size]` |
//! | states | `[batch, seq_len, state_size]` |
//!
//! ## Stateful Rollout
//!
//! ```ignore
//! // hand over the last train state; the first dev input is the lookahead
//! let (y_train, h_train) =
//!     model.forward_with_lookahead(x_train, dt_train, None, first_input(&x_dev))?;
//! let (y_dev, h_dev) = model.forward(x_dev, dt_dev, last_state(&h_train))?;
//! ```

pub mod mimo;

pub use mimo::{first_input, last_state, Mimo};
