//! Trajectories, train/dev/test splits and tensor conversion.
//!
//! Trajectories from different sources are never concatenated: every split
//! keeps one [`Segment`] per trajectory, and each is rolled out with its own
//! hidden state.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use ndarray::{concatenate, s, Array1, Array2, ArrayView2, Axis};

use crate::config::TimeAware;
use crate::error::{Error, Result};

/// One irregularly sampled multivariate trajectory
///
/// Row `i` holds the sample at `time[i]`; `dt[i]` is the interval from
/// sample `i` to sample `i + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    time: Array1<f64>,
    inputs: Array2<f64>,
    outputs: Array2<f64>,
    dt: Array1<f64>,
}

impl Trajectory {
    pub fn new(
        time: Array1<f64>,
        inputs: Array2<f64>,
        outputs: Array2<f64>,
        dt: Array1<f64>,
    ) -> Result<Self> {
        let len = inputs.nrows();
        if outputs.nrows() != len {
            return Err(Error::shape("trajectory outputs rows", len, outputs.nrows()));
        }
        if time.len() != len {
            return Err(Error::shape("trajectory time length", len, time.len()));
        }
        if dt.len() != len {
            return Err(Error::shape("trajectory dt length", len, dt.len()));
        }
        if inputs.ncols() == 0 || outputs.ncols() == 0 {
            return Err(Error::shape(
                "trajectory channels",
                "at least one input and one output channel",
                [inputs.ncols(), outputs.ncols()],
            ));
        }

        Ok(Self {
            time,
            inputs,
            outputs,
            dt,
        })
    }

    /// Equidistant trajectory sampled every `sample_rate` time units from 0
    pub fn with_constant_interval(
        inputs: Array2<f64>,
        outputs: Array2<f64>,
        sample_rate: f64,
    ) -> Result<Self> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(Error::config(format!(
                "sample rate {} must be positive",
                sample_rate
            )));
        }
        let len = inputs.nrows();
        let time = Array1::from_iter((0..len).map(|i| i as f64 * sample_rate));
        let dt = Array1::from_elem(len, sample_rate);
        Self::new(time, inputs, outputs, dt)
    }

    pub fn len(&self) -> usize {
        self.inputs.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn input_size(&self) -> usize {
        self.inputs.ncols()
    }

    pub fn output_size(&self) -> usize {
        self.outputs.ncols()
    }

    pub fn time(&self) -> &Array1<f64> {
        &self.time
    }

    pub fn inputs(&self) -> &Array2<f64> {
        &self.inputs
    }

    pub fn outputs(&self) -> &Array2<f64> {
        &self.outputs
    }

    pub fn dt(&self) -> &Array1<f64> {
        &self.dt
    }

    /// Split into contiguous train/dev/test segments
    ///
    /// With `N` samples, `n_dev = floor(frac_dev * N)` and
    /// `n_test = floor(frac_test * N)`. Outputs and timestamps are shifted
    /// one sample ahead of the inputs, so the model predicts the next
    /// observation; the last input has no successor and is dropped from the
    /// test segment.
    pub fn split(&self, frac_dev: f64, frac_test: f64) -> Result<TrajectorySplit> {
        let len = self.len();
        let n_dev = (frac_dev * len as f64).floor() as usize;
        let n_test = (frac_test * len as f64).floor() as usize;
        let n_train = len.saturating_sub(n_dev + n_test);

        if n_train == 0 || n_dev == 0 || n_test < 2 {
            return Err(Error::config(format!(
                "trajectory of {} samples is too short for a {}/{} dev/test split",
                len, frac_dev, frac_test
            )));
        }

        let dev_start = n_train;
        let test_start = n_train + n_dev;
        Ok(TrajectorySplit {
            train: self.segment(0, n_train),
            dev: self.segment(dev_start, test_start),
            test: self.segment(test_start, len - 1),
        })
    }

    /// Inputs and intervals `[start, end)`, outputs and time `[start+1, end+1)`
    fn segment(&self, start: usize, end: usize) -> Segment {
        Segment {
            time: self.time.slice(s![start + 1..end + 1]).to_owned(),
            inputs: self.inputs.slice(s![start..end, ..]).to_owned(),
            outputs: self.outputs.slice(s![start + 1..end + 1, ..]).to_owned(),
            dt: self.dt.slice(s![start..end]).to_owned(),
        }
    }
}

/// Index-aligned slice of one trajectory: `outputs[i]` and `time[i]` are
/// the observation following `inputs[i]`, reached after `dt[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub time: Array1<f64>,
    pub inputs: Array2<f64>,
    pub outputs: Array2<f64>,
    pub dt: Array1<f64>,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.inputs.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn input_size(&self) -> usize {
        self.inputs.ncols()
    }

    pub fn output_size(&self) -> usize {
        self.outputs.ncols()
    }

    /// Single-trajectory batch: inputs `[1, len, k_in]`, outputs
    /// `[1, len, k_out]`, intervals `[1, len]`
    pub fn to_tensors<B: Backend>(&self, device: &B::Device) -> SegmentTensors<B> {
        SegmentTensors {
            inputs: tensor_from_array2(&self.inputs, device),
            outputs: tensor_from_array2(&self.outputs, device),
            dt: tensor_from_array1(&self.dt, device),
        }
    }

    /// Replace every interval by one
    fn reset_intervals(&mut self) {
        self.dt.fill(1.0);
    }

    /// Append an extra input column
    fn append_input(&mut self, column: Array1<f64>) -> Result<()> {
        let column = column.insert_axis(Axis(1));
        let inputs = concatenate(Axis(1), &[self.inputs.view(), column.view()])
            .map_err(|e| Error::shape("interval feature", self.len(), e.to_string()))?;
        self.inputs = inputs;
        Ok(())
    }
}

/// Tensor view of a [`Segment`]
#[derive(Debug, Clone)]
pub struct SegmentTensors<B: Backend> {
    pub inputs: Tensor<B, 3>,
    pub outputs: Tensor<B, 3>,
    pub dt: Tensor<B, 2>,
}

/// The three segments cut from one trajectory
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectorySplit {
    pub train: Segment,
    pub dev: Segment,
    pub test: Segment,
}

/// Summary returned by [`SplitSet::prepare`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prepared {
    /// Input features per step after preparation
    pub input_size: usize,
    pub output_size: usize,
    /// Mean training interval after preparation
    pub mean_dt: f64,
}

/// Train/dev/test splits of every trajectory, index-aligned per trajectory
#[derive(Debug, Clone, PartialEq)]
pub struct SplitSet {
    pub trajectories: Vec<TrajectorySplit>,
}

impl SplitSet {
    /// Split every trajectory with the same fractions
    pub fn new(trajectories: &[Trajectory], frac_dev: f64, frac_test: f64) -> Result<Self> {
        let first = trajectories
            .first()
            .ok_or_else(|| Error::config("at least one trajectory is required"))?;

        let mut splits = Vec::with_capacity(trajectories.len());
        for trajectory in trajectories {
            if trajectory.input_size() != first.input_size() {
                return Err(Error::shape(
                    "trajectory input channels",
                    first.input_size(),
                    trajectory.input_size(),
                ));
            }
            if trajectory.output_size() != first.output_size() {
                return Err(Error::shape(
                    "trajectory output channels",
                    first.output_size(),
                    trajectory.output_size(),
                ));
            }
            splits.push(trajectory.split(frac_dev, frac_test)?);
        }

        Ok(Self {
            trajectories: splits,
        })
    }

    pub fn len(&self) -> usize {
        self.trajectories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty()
    }

    pub fn input_size(&self) -> usize {
        self.trajectories
            .first()
            .map_or(0, |split| split.train.input_size())
    }

    pub fn output_size(&self) -> usize {
        self.trajectories
            .first()
            .map_or(0, |split| split.train.output_size())
    }

    pub fn train(&self) -> impl Iterator<Item = &Segment> {
        self.trajectories.iter().map(|split| &split.train)
    }

    pub fn dev(&self) -> impl Iterator<Item = &Segment> {
        self.trajectories.iter().map(|split| &split.dev)
    }

    pub fn test(&self) -> impl Iterator<Item = &Segment> {
        self.trajectories.iter().map(|split| &split.test)
    }

    fn segments_mut(&mut self) -> impl Iterator<Item = &mut Segment> {
        self.trajectories
            .iter_mut()
            .flat_map(|split| [&mut split.train, &mut split.dev, &mut split.test])
    }

    /// Apply the time-awareness option to every split
    ///
    /// - `input`: append `(dt - mean) / std` using training statistics, then
    ///   set every interval to 1
    /// - `no`: set every interval to 1
    /// - `variable`: keep the true intervals
    ///
    /// The returned `mean_dt` is the mean prepared training interval, used
    /// to calibrate the time-aware cells.
    pub fn prepare(&mut self, time_aware: TimeAware) -> Result<Prepared> {
        if time_aware == TimeAware::Input {
            let (mean, std) = self.train_interval_stats();
            // a constant interval carries no information; avoid dividing by zero
            let std = if std > 0.0 { std } else { 1.0 };
            for segment in self.segments_mut() {
                let feature = segment.dt.mapv(|dt| (dt - mean) / std);
                segment.append_input(feature)?;
            }
        }
        if time_aware != TimeAware::Variable {
            for segment in self.segments_mut() {
                segment.reset_intervals();
            }
        }

        let (mean_dt, _) = self.train_interval_stats();
        if !(mean_dt.is_finite() && mean_dt > 0.0) {
            return Err(Error::config(format!(
                "mean training interval {} must be positive",
                mean_dt
            )));
        }

        Ok(Prepared {
            input_size: self.input_size(),
            output_size: self.output_size(),
            mean_dt,
        })
    }

    /// Population mean and standard deviation of all training intervals
    fn train_interval_stats(&self) -> (f64, f64) {
        let intervals: Vec<f64> = self.train().flat_map(|segment| segment.dt.iter().copied()).collect();
        let n = intervals.len().max(1) as f64;
        let mean = intervals.iter().sum::<f64>() / n;
        let var = intervals.iter().map(|dt| (dt - mean).powi(2)).sum::<f64>() / n;
        (mean, var.sqrt())
    }
}

/// Stack per-trajectory matrices row-wise for joint evaluation
pub fn stack_rows(parts: &[Array2<f64>]) -> Result<Array2<f64>> {
    let views: Vec<ArrayView2<f64>> = parts.iter().map(|part| part.view()).collect();
    concatenate(Axis(0), &views).map_err(|e| Error::shape("stacked rows", "equal column counts", e.to_string()))
}

/// `[len, k]` host matrix as a `[1, len, k]` tensor
pub fn tensor_from_array2<B: Backend>(arr: &Array2<f64>, device: &B::Device) -> Tensor<B, 3> {
    let (rows, cols) = arr.dim();
    let data: Vec<f32> = arr.iter().map(|&x| x as f32).collect();
    Tensor::<B, 1>::from_floats(data.as_slice(), device).reshape([1, rows, cols])
}

/// `[len]` host vector as a `[1, len]` tensor
pub fn tensor_from_array1<B: Backend>(arr: &Array1<f64>, device: &B::Device) -> Tensor<B, 2> {
    let data: Vec<f32> = arr.iter().map(|&x| x as f32).collect();
    Tensor::<B, 1>::from_floats(data.as_slice(), device).reshape([1, arr.len()])
}

/// `[1, len, k]` tensor back to a `[len, k]` host matrix
pub fn array2_from_tensor<B: Backend>(tensor: Tensor<B, 3>) -> Result<Array2<f64>> {
    let [batch, rows, cols] = tensor.dims();
    if batch != 1 {
        return Err(Error::shape("prediction batch", 1, batch));
    }
    let values = tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| Error::TensorData(format!("{:?}", e)))?;
    Array2::from_shape_vec((rows, cols), values.into_iter().map(f64::from).collect())
        .map_err(|e| Error::TensorData(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use ndarray::array;

    type TestBackend = NdArray<f32>;

    /// Inputs and outputs both hold the sample index, so alignment is visible
    fn indexed(len: usize) -> Trajectory {
        let inputs = Array2::from_shape_fn((len, 2), |(i, c)| (i * 10 + c) as f64);
        let outputs = Array2::from_shape_fn((len, 1), |(i, _)| i as f64);
        Trajectory::with_constant_interval(inputs, outputs, 0.5).unwrap()
    }

    #[test]
    fn test_split_sizes() {
        let split = indexed(100).split(0.15, 0.15).unwrap();
        assert_eq!(split.train.len(), 70);
        assert_eq!(split.dev.len(), 15);
        assert_eq!(split.test.len(), 14);
    }

    #[test]
    fn test_outputs_lead_inputs_by_one() {
        let split = indexed(20).split(0.15, 0.15).unwrap();

        for segment in [&split.train, &split.dev, &split.test] {
            for i in 0..segment.len() {
                let input_index = segment.inputs[[i, 0]] / 10.0;
                assert_eq!(segment.outputs[[i, 0]], input_index + 1.0);
                assert_eq!(segment.time[i], (input_index + 1.0) * 0.5);
            }
        }

        // contiguous hand-off between splits
        assert_eq!(split.train.outputs[[split.train.len() - 1, 0]], split.dev.inputs[[0, 0]] / 10.0);
        assert_eq!(split.dev.outputs[[split.dev.len() - 1, 0]], split.test.inputs[[0, 0]] / 10.0);
        assert_eq!(split.test.outputs[[split.test.len() - 1, 0]], 19.0);
    }

    #[test]
    fn test_misaligned_trajectory_rejected() {
        let result = Trajectory::new(
            array![0.0, 1.0, 2.0],
            Array2::zeros((3, 2)),
            Array2::zeros((2, 1)),
            array![1.0, 1.0, 1.0],
        );
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_short_trajectory_rejected() {
        assert!(matches!(indexed(5).split(0.15, 0.15), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_prepare_variable_keeps_intervals() {
        let mut splits = SplitSet::new(&[indexed(40)], 0.15, 0.15).unwrap();
        let prepared = splits.prepare(TimeAware::Variable).unwrap();
        assert_eq!(prepared.input_size, 2);
        assert_eq!(prepared.mean_dt, 0.5);
    }

    #[test]
    fn test_prepare_input_appends_feature() {
        let len = 40;
        let inputs = Array2::zeros((len, 2));
        let outputs = Array2::zeros((len, 1));
        let time = Array1::from_iter((0..len).map(|i| i as f64));
        let dt = Array1::from_iter((0..len).map(|i| if i % 2 == 0 { 1.0 } else { 3.0 }));
        let trajectory = Trajectory::new(time, inputs, outputs, dt).unwrap();

        let mut splits = SplitSet::new(&[trajectory], 0.15, 0.15).unwrap();
        let prepared = splits.prepare(TimeAware::Input).unwrap();

        assert_eq!(prepared.input_size, 3);
        assert_eq!(prepared.mean_dt, 1.0);
        let train = &splits.trajectories[0].train;
        assert_eq!(train.inputs[[0, 2]], -1.0);
        assert_eq!(train.inputs[[1, 2]], 1.0);
        assert!(train.dt.iter().all(|&dt| dt == 1.0));
        assert!(splits.test().all(|segment| segment.input_size() == 3));
    }

    #[test]
    fn test_prepare_constant_interval_input_feature_is_zero() {
        let mut splits = SplitSet::new(&[indexed(40)], 0.15, 0.15).unwrap();
        splits.prepare(TimeAware::Input).unwrap();
        let dev = &splits.trajectories[0].dev;
        assert!(dev.inputs.column(2).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_mismatched_channels_rejected() {
        let other = Trajectory::with_constant_interval(Array2::zeros((40, 3)), Array2::zeros((40, 1)), 1.0).unwrap();
        assert!(SplitSet::new(&[indexed(40), other], 0.15, 0.15).is_err());
    }

    #[test]
    fn test_tensor_round_trip_layout() {
        let device = Default::default();
        let segment = indexed(20).split(0.15, 0.15).unwrap().train;
        let tensors = segment.to_tensors::<TestBackend>(&device);

        assert_eq!(tensors.inputs.dims(), [1, 14, 2]);
        assert_eq!(tensors.outputs.dims(), [1, 14, 1]);
        assert_eq!(tensors.dt.dims(), [1, 14]);
        assert_eq!(array2_from_tensor(tensors.inputs).unwrap(), segment.inputs);
    }
}
