#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use burn::tensor::backend::Backend;
    use burn::tensor::{Distribution, Tensor};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use taho::cells::{ArnnGates, Cell, CellKind, CellOptions, GruGates};
    use taho::integrator::{advance, Dynamics, Interpolation, Scheme};

    type Backend64 = NdArray<f64>;
    type Backend32 = NdArray<f32>;

    /// dh/dt = -h
    struct Decay;

    impl<B: Backend> Dynamics<B> for Decay {
        fn derivative(&self, state: Tensor<B, 2>, _input: Tensor<B, 2>) -> Tensor<B, 2> {
            state.neg()
        }
    }

    /// Error of integrating h(0) = 1 to t = 1 with `steps` equal steps
    fn decay_error(scheme: Scheme, steps: usize) -> f64 {
        let device = Default::default();
        let input = Tensor::<Backend64, 2>::zeros([1, 1], &device);
        let dt = Tensor::<Backend64, 1>::full([1], 1.0 / steps as f64, &device);
        let mut state = Tensor::<Backend64, 2>::ones([1, 1], &device);

        for _ in 0..steps {
            state = advance(
                &Decay,
                state,
                input.clone(),
                input.clone(),
                dt.clone(),
                scheme,
                Interpolation::Constant,
            );
        }

        (state.into_scalar() - (-1.0f64).exp()).abs()
    }

    #[test]
    fn test_higher_order_schemes_are_more_accurate() {
        for steps in [10, 20] {
            let errors: Vec<f64> = Scheme::ALL.iter().map(|&s| decay_error(s, steps)).collect();
            for pair in errors.windows(2) {
                assert!(pair[1] < pair[0], "errors not decreasing with order: {:?}", errors);
            }
        }
    }

    #[test]
    fn test_error_shrinks_at_theoretical_rate() {
        for scheme in Scheme::ALL {
            let expected = 2f64.powi(scheme.order() as i32);
            for steps in [10, 20] {
                let ratio = decay_error(scheme, steps) / decay_error(scheme, 2 * steps);
                assert!(
                    ratio > 0.75 * expected && ratio < 1.25 * expected,
                    "{}: halving the step reduced the error by {:.2}, expected about {}",
                    scheme,
                    ratio,
                    expected
                );
            }
        }
    }

    #[test]
    fn test_stage_counts() {
        let stages: Vec<usize> = Scheme::ALL.iter().map(Scheme::stages).collect();
        assert_eq!(stages, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_hogru_euler_matches_gru_step() {
        let device = Default::default();
        let mean_dt = 0.37;
        let options = CellOptions {
            mean_dt,
            ..CellOptions::default()
        };

        let plain = Cell::<Backend32>::new(CellKind::Gru, 5, 12, options, &mut StdRng::seed_from_u64(3), &device);
        let high_order =
            Cell::<Backend32>::new(CellKind::HoGru, 5, 12, options, &mut StdRng::seed_from_u64(3), &device);

        for _ in 0..5 {
            let x = Tensor::<Backend32, 2>::random([32, 5], Distribution::Uniform(-3.0, 3.0), &device);
            let h = Tensor::<Backend32, 2>::random([32, 12], Distribution::Uniform(-1.0, 1.0), &device);
            let dt = Tensor::<Backend32, 1>::full([32], mean_dt, &device);

            let expected = plain.advance(
                h.clone(),
                x.clone(),
                x.clone(),
                dt.clone(),
                Scheme::Euler,
                Interpolation::Constant,
            );
            let actual = high_order.advance(h, x.clone(), x, dt, Scheme::Euler, Interpolation::Constant);

            let diff = (expected - actual).abs().max().into_scalar();
            assert!(diff < 1e-5, "max difference {}", diff);
        }
    }

    #[test]
    fn test_hogru_euler_matches_gate_update() {
        // The plain GRU step written out with the gate block directly
        let device = Default::default();
        let options = CellOptions {
            mean_dt: 2.0,
            ..CellOptions::default()
        };
        let gates = GruGates::<Backend32>::new(4, 6, &mut StdRng::seed_from_u64(21), &device);
        let cell = Cell::<Backend32>::new(CellKind::HoGru, 4, 6, options, &mut StdRng::seed_from_u64(21), &device);

        let x = Tensor::<Backend32, 2>::random([8, 4], Distribution::Uniform(-1.0, 1.0), &device);
        let h = Tensor::<Backend32, 2>::random([8, 6], Distribution::Uniform(-1.0, 1.0), &device);
        let (z, u) = gates.forward(x.clone(), h.clone());
        let expected = z.clone() * h.clone() + (z.ones_like() - z) * u;

        let dt = Tensor::<Backend32, 1>::full([8], 2.0, &device);
        let actual = cell.advance(h, x.clone(), x, dt, Scheme::Euler, Interpolation::Constant);

        let diff = (expected - actual).abs().max().into_scalar();
        assert!(diff < 1e-5, "max difference {}", diff);
    }

    #[test]
    fn test_hoarnn_euler_matches_arnn_step() {
        let device = Default::default();
        let options = CellOptions {
            gamma: 0.5,
            step_size: 0.2,
            mean_dt: 0.1,
        };
        let gates = ArnnGates::<Backend32>::new(4, 6, 0.5, &mut StdRng::seed_from_u64(5), &device);
        let cell = Cell::<Backend32>::new(CellKind::HoArnn, 4, 6, options, &mut StdRng::seed_from_u64(5), &device);

        let x = Tensor::<Backend32, 2>::random([8, 4], Distribution::Uniform(-1.0, 1.0), &device);
        let h = Tensor::<Backend32, 2>::random([8, 6], Distribution::Uniform(-1.0, 1.0), &device);
        let expected = h.clone() + gates.increment(x.clone(), h.clone(), 0.2);

        let dt = Tensor::<Backend32, 1>::full([8], 0.1, &device);
        let actual = cell.advance(h, x.clone(), x, dt, Scheme::Euler, Interpolation::Constant);

        let diff = (expected - actual).abs().max().into_scalar();
        assert!(diff < 1e-5, "max difference {}", diff);
    }

    #[test]
    fn test_integrated_cell_halved_interval_twice() {
        // Two RK4 steps of dt/2 stay close to one step of dt for a smooth flow
        let device = Default::default();
        let cell = Cell::<Backend32>::new(
            CellKind::HoGru,
            3,
            8,
            CellOptions::default(),
            &mut StdRng::seed_from_u64(8),
            &device,
        );
        let x = Tensor::<Backend32, 2>::random([4, 3], Distribution::Uniform(-1.0, 1.0), &device);
        let h = Tensor::<Backend32, 2>::random([4, 8], Distribution::Uniform(-0.5, 0.5), &device);
        let full = Tensor::<Backend32, 1>::full([4], 0.2, &device);
        let half = Tensor::<Backend32, 1>::full([4], 0.1, &device);

        let once = cell.advance(h.clone(), x.clone(), x.clone(), full, Scheme::RK4, Interpolation::Constant);
        let mid = cell.advance(h, x.clone(), x.clone(), half.clone(), Scheme::RK4, Interpolation::Constant);
        let twice = cell.advance(mid, x.clone(), x, half, Scheme::RK4, Interpolation::Constant);

        let diff = (once - twice).abs().max().into_scalar();
        assert!(diff < 1e-4, "max difference {}", diff);
    }
}
