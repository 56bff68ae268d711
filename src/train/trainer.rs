//! Truncated backpropagation through time over one or more trajectories.

use std::ops::Range;

use burn::optim::{GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{ElementConversion, Tensor};
use rand::prelude::*;
use tracing::{debug, warn};

use crate::data::{Segment, SegmentTensors};
use crate::error::{Error, Result};
use crate::rnn::{last_state, Mimo};

/// Consecutive, non-overlapping windows of at most `bptt` steps covering
/// `0..len`; the final shorter window is kept.
pub fn windows(len: usize, bptt: usize) -> Vec<Range<usize>> {
    (0..len)
        .step_by(bptt.max(1))
        .map(|start| start..(start + bptt).min(len))
        .collect()
}

/// Order in which `(trajectory, window)` pairs are visited in one epoch
///
/// Round `r` visits window `r` of every trajectory that still has one, in
/// an order shuffled by `rng`. Windows of the same trajectory always stay
/// in sequence, so each hidden state is carried forward in time.
pub fn schedule(window_counts: &[usize], rng: &mut StdRng) -> Vec<(usize, usize)> {
    let rounds = window_counts.iter().copied().max().unwrap_or(0);
    let mut order = Vec::with_capacity(window_counts.iter().sum());
    for round in 0..rounds {
        let mut active: Vec<usize> = (0..window_counts.len())
            .filter(|&i| round < window_counts[i])
            .collect();
        active.shuffle(rng);
        order.extend(active.into_iter().map(|i| (i, round)));
    }
    order
}

/// Groups a [`schedule`] into optimizer steps
///
/// Within one round, windows of equal length from different trajectories
/// share a batch of at most `batch_size` rows. A batch never spans two
/// rounds, so every trajectory's windows are still trained in order. With
/// `batch_size == 1` the schedule order is kept unchanged.
pub fn batches(
    order: &[(usize, usize)],
    window_ranges: &[Vec<Range<usize>>],
    batch_size: usize,
) -> Vec<Vec<(usize, usize)>> {
    let batch_size = batch_size.max(1);
    let steps = |(trajectory, window): (usize, usize)| window_ranges[trajectory][window].len();

    let mut batches = Vec::new();
    let mut start = 0;
    while start < order.len() {
        let round = order[start].1;
        let end = order[start..]
            .iter()
            .position(|&(_, window)| window != round)
            .map_or(order.len(), |offset| start + offset);

        let mut open: Vec<Vec<(usize, usize)>> = Vec::new();
        for &entry in &order[start..end] {
            let slot = match open.iter().position(|batch| steps(batch[0]) == steps(entry)) {
                Some(slot) => slot,
                None => {
                    open.push(Vec::with_capacity(batch_size));
                    open.len() - 1
                }
            };
            open[slot].push(entry);
            if open[slot].len() == batch_size {
                batches.push(open.remove(slot));
            }
        }
        batches.extend(open);
        start = end;
    }
    batches
}

/// Final state of a window, cut from the gradient graph so the next window
/// receives its value only
pub fn carry_state<B: AutodiffBackend>(states: &Tensor<B, 3>) -> Option<Tensor<B, 2>> {
    last_state(states).map(|state| state.detach())
}

/// Runs training epochs over a fixed set of training segments
///
/// Holds only the optimizer and the training data; hidden states are
/// recreated at the start of every epoch.
pub struct EpochTrainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<Mimo<B>, B>,
{
    optim: O,
    learning_rate: f64,
    bptt: usize,
    batch_size: usize,
    seed: u64,
    segments: Vec<SegmentTensors<B>>,
    device: B::Device,
}

impl<B, O> EpochTrainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<Mimo<B>, B>,
{
    pub fn new<'a>(
        optim: O,
        segments: impl IntoIterator<Item = &'a Segment>,
        learning_rate: f64,
        bptt: usize,
        batch_size: usize,
        seed: u64,
        device: &B::Device,
    ) -> Result<Self> {
        if bptt == 0 || batch_size == 0 {
            return Err(Error::config("bptt and batch_size must be positive"));
        }
        let segments: Vec<SegmentTensors<B>> = segments
            .into_iter()
            .map(|segment| segment.to_tensors(device))
            .collect();
        if segments.is_empty() {
            return Err(Error::config("no training segments"));
        }

        Ok(Self {
            optim,
            learning_rate,
            bptt,
            batch_size,
            seed,
            segments,
            device: device.clone(),
        })
    }

    /// Number of training samples per epoch
    pub fn num_samples(&self) -> usize {
        self.segments.iter().map(|s| s.dt.dims()[1]).sum()
    }

    /// Train one epoch and return the updated model with the
    /// sample-weighted mean window loss
    pub fn epoch(&mut self, mut model: Mimo<B>, epoch: usize) -> Result<(Mimo<B>, f64)> {
        let window_ranges: Vec<Vec<Range<usize>>> = self
            .segments
            .iter()
            .map(|s| windows(s.dt.dims()[1], self.bptt))
            .collect();
        let counts: Vec<usize> = window_ranges.iter().map(Vec::len).collect();

        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(epoch as u64));
        let order = schedule(&counts, &mut rng);

        let mut states: Vec<Option<Tensor<B, 2>>> = vec![None; self.segments.len()];
        let mut weighted_loss = 0.0;
        let mut samples = 0usize;

        for batch in batches(&order, &window_ranges, self.batch_size) {
            let window = batch[0].1;
            let steps = window_ranges[batch[0].0][window].len();
            let trajectories: Vec<usize> = batch.iter().map(|&(trajectory, _)| trajectory).collect();

            let mut inputs: Vec<Tensor<B, 3>> = Vec::with_capacity(batch.len());
            let mut targets: Vec<Tensor<B, 3>> = Vec::with_capacity(batch.len());
            let mut dt: Vec<Tensor<B, 2>> = Vec::with_capacity(batch.len());
            let mut lookahead: Vec<Tensor<B, 2>> = Vec::with_capacity(batch.len());
            let mut state0: Vec<Tensor<B, 2>> = Vec::with_capacity(batch.len());

            for &trajectory in &trajectories {
                let range = window_ranges[trajectory][window].clone();
                let segment = &self.segments[trajectory];
                // the sample after the window; the window's own last one at the segment end
                let next = range.end.min(segment.dt.dims()[1] - 1);

                inputs.push(segment.inputs.clone().narrow(1, range.start, steps));
                targets.push(segment.outputs.clone().narrow(1, range.start, steps));
                dt.push(segment.dt.clone().narrow(1, range.start, steps));
                lookahead.push(segment.inputs.clone().narrow(1, next, 1).squeeze(1));
                state0.push(
                    states[trajectory]
                        .take()
                        .unwrap_or_else(|| Tensor::zeros([1, model.state_size()], &self.device)),
                );
            }

            let (predictions, hidden) = model.forward_with_lookahead(
                Tensor::cat(inputs, 0),
                Tensor::cat(dt, 0),
                Some(Tensor::cat(state0, 0)),
                Some(Tensor::cat(lookahead, 0)),
            )?;
            let loss = model.criterion(predictions, Tensor::cat(targets, 0))?;
            let value: f64 = loss.clone().into_scalar().elem();

            if !value.is_finite() {
                warn!(epoch, ?trajectories, window, loss = value, "training loss diverged");
                return Err(Error::NumericalDivergence {
                    epoch,
                    trajectories,
                    window,
                    loss: value,
                });
            }
            debug!(epoch, ?trajectories, window, steps, loss = value, "bptt batch");

            for (row, &trajectory) in trajectories.iter().enumerate() {
                states[trajectory] = carry_state(&hidden.clone().narrow(0, row, 1));
            }

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = self.optim.step(self.learning_rate, model, grads);

            let values = steps * trajectories.len();
            weighted_loss += value * values as f64;
            samples += values;
        }

        Ok((model, weighted_loss / samples.max(1) as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_windows_keep_short_tail() {
        assert_eq!(windows(25, 10), vec![0..10, 10..20, 20..25]);
        assert_eq!(windows(20, 10), vec![0..10, 10..20]);
        assert_eq!(windows(3, 10), vec![0..3]);
        assert!(windows(0, 10).is_empty());
    }

    #[test]
    fn test_schedule_keeps_windows_in_order() {
        let mut rng = StdRng::seed_from_u64(4);
        let order = schedule(&[3, 1, 2], &mut rng);
        assert_eq!(order.len(), 6);

        for trajectory in 0..3 {
            let seen: Vec<usize> = order
                .iter()
                .filter(|(t, _)| *t == trajectory)
                .map(|(_, w)| *w)
                .collect();
            let expected: Vec<usize> = (0..[3, 1, 2][trajectory]).collect();
            assert_eq!(seen, expected);
        }
    }

    #[test]
    fn test_batches_group_equal_windows_per_round() {
        // trajectory 1 is shorter: its second window is a tail of 3 steps
        let ranges = vec![windows(20, 10), windows(13, 10), windows(20, 10)];
        let order = vec![(0, 0), (1, 0), (2, 0), (2, 1), (1, 1), (0, 1)];

        let grouped = batches(&order, &ranges, 2);
        assert_eq!(
            grouped,
            vec![
                vec![(0, 0), (1, 0)],
                vec![(2, 0)],
                vec![(2, 1), (0, 1)],
                vec![(1, 1)],
            ]
        );
    }

    #[test]
    fn test_single_row_batches_keep_schedule_order() {
        let ranges = vec![windows(25, 10), windows(8, 10), windows(30, 10)];
        let counts: Vec<usize> = ranges.iter().map(Vec::len).collect();
        let order = schedule(&counts, &mut StdRng::seed_from_u64(1));

        let grouped = batches(&order, &ranges, 1);
        let flat: Vec<(usize, usize)> = grouped.into_iter().flatten().collect();
        assert_eq!(flat, order);
    }

    #[test]
    fn test_batches_never_repeat_a_trajectory() {
        let ranges: Vec<_> = (0..7).map(|i| windows(30 + 4 * i, 10)).collect();
        let counts: Vec<usize> = ranges.iter().map(Vec::len).collect();
        let order = schedule(&counts, &mut StdRng::seed_from_u64(2));

        for batch in batches(&order, &ranges, 3) {
            assert!(batch.len() <= 3);
            let mut seen: Vec<usize> = batch.iter().map(|(t, _)| *t).collect();
            seen.sort_unstable();
            seen.dedup();
            assert_eq!(seen.len(), batch.len());
            assert!(batch.iter().all(|(_, w)| *w == batch[0].1));
        }
    }

    #[test]
    fn test_schedule_is_seeded() {
        let counts = [4, 4, 4, 4];
        let a = schedule(&counts, &mut StdRng::seed_from_u64(9));
        let b = schedule(&counts, &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }
}
