//! # Training
//!
//! [`EpochTrainer`] runs truncated BPTT epochs; [`fit`] drives it with
//! periodic evaluation, best-dev model selection and early stopping.
//!
//! ## Evaluation Rollout
//!
//! Every trajectory is rolled out train → dev → test without resetting the
//! hidden state: the dev rollout starts from the last train state and the
//! test rollout from the last dev state.
//!
//! ```ignore
//! type Train = Autodiff<NdArray<f32>>;
//!
//! let prepared = splits.prepare(TimeAware::Variable)?;
//! let model: Mimo<Train> = MimoConfig::new(prepared.input_size, prepared.output_size, 20)
//!     .with_mean_dt(prepared.mean_dt)
//!     .init(&device)?;
//! let report = fit(model, &splits, &TrainingConfig::default(), &device)?;
//! ```

pub mod trainer;

pub use trainer::{batches, carry_state, schedule, windows, EpochTrainer};

use burn::module::AutodiffModule;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::AdamConfig;
use burn::tensor::backend::{AutodiffBackend, Backend};
use ndarray::Array2;
use tracing::{debug, info};

use crate::config::TrainingConfig;
use crate::data::{array2_from_tensor, stack_rows, Segment, SplitSet};
use crate::error::{Error, Result};
use crate::metrics::{mse, rrse_joint};
use crate::rnn::{first_input, last_state, Mimo};

/// Predictions of one evaluation rollout, one matrix per trajectory
#[derive(Debug, Clone, PartialEq)]
pub struct Rollout {
    pub train: Vec<Array2<f64>>,
    pub dev: Vec<Array2<f64>>,
    pub test: Vec<Array2<f64>>,
    /// Mean squared error of the dev predictions in model units
    pub dev_mse: f64,
}

impl Rollout {
    pub fn train_rrse(&self, splits: &SplitSet) -> Result<f64> {
        rrse_joint(&truth(splits.train()), &self.train)
    }

    pub fn dev_rrse(&self, splits: &SplitSet) -> Result<f64> {
        rrse_joint(&truth(splits.dev()), &self.dev)
    }

    pub fn test_rrse(&self, splits: &SplitSet) -> Result<f64> {
        rrse_joint(&truth(splits.test()), &self.test)
    }
}

fn truth<'a>(segments: impl Iterator<Item = &'a Segment>) -> Vec<Array2<f64>> {
    segments.map(|segment| segment.outputs.clone()).collect()
}

/// Roll `model` over every trajectory, threading the hidden state from
/// train into dev and from dev into test
///
/// Each split sees the first input of the following one, so the rollout
/// equals a single pass over the whole trajectory.
pub fn rollout<B: Backend>(model: &Mimo<B>, splits: &SplitSet, device: &B::Device) -> Result<Rollout> {
    let mut train = Vec::with_capacity(splits.len());
    let mut dev = Vec::with_capacity(splits.len());
    let mut test = Vec::with_capacity(splits.len());

    for split in &splits.trajectories {
        let train_tensors = split.train.to_tensors::<B>(device);
        let dev_tensors = split.dev.to_tensors::<B>(device);
        let test_tensors = split.test.to_tensors::<B>(device);

        let (predictions, states) = model.forward_with_lookahead(
            train_tensors.inputs,
            train_tensors.dt,
            None,
            first_input(&dev_tensors.inputs),
        )?;
        train.push(array2_from_tensor(predictions)?);

        let (predictions, states) = model.forward_with_lookahead(
            dev_tensors.inputs,
            dev_tensors.dt,
            last_state(&states),
            first_input(&test_tensors.inputs),
        )?;
        dev.push(array2_from_tensor(predictions)?);

        let (predictions, _) =
            model.forward(test_tensors.inputs, test_tensors.dt, last_state(&states))?;
        test.push(array2_from_tensor(predictions)?);
    }

    let dev_mse = mse(&stack_rows(&truth(splits.dev()))?, &stack_rows(&dev)?)?;
    Ok(Rollout {
        train,
        dev,
        test,
        dev_mse,
    })
}

/// Errors recorded at one evaluation epoch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub epoch: usize,
    pub train_loss: f64,
    pub train_rrse: f64,
    pub dev_mse: f64,
    pub dev_rrse: f64,
}

/// Snapshot of the model with the lowest dev error seen so far
#[derive(Debug, Clone)]
pub struct BestModel<B: Backend> {
    pub model: Mimo<B>,
    pub epoch: usize,
    pub train_rrse: f64,
    pub dev_rrse: f64,
    /// Test error of this snapshot, rolled out from its dev end state
    pub test_rrse: f64,
    pub dev_predictions: Vec<Array2<f64>>,
    pub test_predictions: Vec<Array2<f64>>,
}

/// Outcome of [`fit`]
#[derive(Debug, Clone)]
pub struct TrainingReport<B: Backend> {
    /// Mean training loss of every completed epoch
    pub losses: Vec<f64>,
    pub evaluations: Vec<Evaluation>,
    pub best: Option<BestModel<B>>,
    pub stopped_early: bool,
}

impl<B: Backend> TrainingReport<B> {
    pub fn epochs_run(&self) -> usize {
        self.losses.len()
    }
}

/// Train `model` on the training segments of `splits`
///
/// Runs up to `config.epochs` epochs. Every `eval_epochs` epochs (and after
/// the last one) the inference model is rolled out over all splits; a new
/// lowest dev RRSE replaces the [`BestModel`] snapshot. Training stops once
/// the dev error has not improved for more than `max_epochs_no_decrease`
/// epochs.
pub fn fit<B: AutodiffBackend>(
    model: Mimo<B>,
    splits: &SplitSet,
    config: &TrainingConfig,
    device: &B::Device,
) -> Result<TrainingReport<B::InnerBackend>> {
    config.validate()?;
    if splits.input_size() != model.input_size() {
        return Err(Error::shape("split inputs", model.input_size(), splits.input_size()));
    }
    if splits.output_size() != model.output_size() {
        return Err(Error::shape("split outputs", model.output_size(), splits.output_size()));
    }

    let weight_decay = (config.l2 > 0.0).then(|| WeightDecayConfig::new(config.l2 as f32));
    let optim = AdamConfig::new()
        .with_weight_decay(weight_decay)
        .init::<B, Mimo<B>>();
    let mut trainer = EpochTrainer::new(
        optim,
        splits.train(),
        config.learning_rate,
        config.bptt,
        config.batch_size,
        config.seed,
        device,
    )?;

    info!(
        cell = %model.cell_kind(),
        scheme = %model.scheme(),
        integrated = model.cell_kind().is_integrated(),
        parameters = model.num_parameters(),
        trajectories = splits.len(),
        samples = trainer.num_samples(),
        "training model"
    );

    let mut model = model;
    let mut report = TrainingReport {
        losses: Vec::with_capacity(config.epochs),
        evaluations: Vec::new(),
        best: None,
        stopped_early: false,
    };
    let mut best_dev = f64::INFINITY;
    let mut best_epoch = 0;

    for epoch in 1..=config.epochs {
        let (trained, loss) = trainer.epoch(model, epoch)?;
        model = trained;
        report.losses.push(loss);
        debug!(epoch, loss, "epoch finished");

        if epoch % config.eval_epochs != 0 && epoch != config.epochs {
            continue;
        }

        let valid = model.valid();
        let outcome = rollout(&valid, splits, device)?;
        let evaluation = Evaluation {
            epoch,
            train_loss: loss,
            train_rrse: outcome.train_rrse(splits)?,
            dev_mse: outcome.dev_mse,
            dev_rrse: outcome.dev_rrse(splits)?,
        };
        info!(
            epoch,
            train_loss = evaluation.train_loss,
            dev_loss = evaluation.dev_mse,
            train_error = evaluation.train_rrse,
            dev_error = evaluation.dev_rrse,
            "evaluation"
        );
        report.evaluations.push(evaluation);

        if evaluation.dev_rrse < best_dev {
            best_dev = evaluation.dev_rrse;
            best_epoch = epoch;
            let test_rrse = outcome.test_rrse(splits)?;
            info!(epoch, dev_error = best_dev, test_error = test_rrse, "new best dev error");

            report.best = Some(BestModel {
                model: valid,
                epoch,
                train_rrse: evaluation.train_rrse,
                dev_rrse: evaluation.dev_rrse,
                test_rrse,
                dev_predictions: outcome.dev,
                test_predictions: outcome.test,
            });
        }

        if epoch - best_epoch > config.max_epochs_no_decrease {
            info!(epoch, best_epoch, "dev error stopped improving");
            report.stopped_early = true;
            break;
        }
    }

    match &report.best {
        Some(best) => info!(
            epochs = report.epochs_run(),
            best_epoch = best.epoch,
            dev_error = best.dev_rrse,
            test_error = best.test_rrse,
            "training finished"
        ),
        None => info!(epochs = report.epochs_run(), "training finished without evaluation"),
    }

    Ok(report)
}
