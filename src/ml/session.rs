// ============================================================
// Layer 5 — Fine-Tuning Session
// ============================================================
// Bundles the mutable state one training run owns exclusively:
//
//   model      BlipVqaModel on the autodiff backend
//   optimizer  AdamW over every parameter
//   scheduler  ExponentialDecay, stepped per epoch
//   scaler     LossScaler around backward
//
// One train step:
//   forward → loss → scale → backward → unscale grads
//     ├─ non-finite → skip the optimizer step
//     └─ finite     → optimizer.step(lr)
//   → scaler.update
//
// Evaluation runs on model.valid(): inner backend, no graph,
// dropout off.
//
// Reference: Burn Book §5 (Custom Training Loop)

use burn::{
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::batcher::VqaBatch;
use crate::domain::error::Result;
use crate::domain::traits::{FineTuneSession, LossEvaluator};
use crate::ml::model::{BlipVqaConfig, BlipVqaModel};
use crate::ml::scaler::LossScaler;
use crate::ml::schedule::ExponentialDecay;

pub struct BurnSession<B: AutodiffBackend, O> {
    model:         BlipVqaModel<B>,
    config:        BlipVqaConfig,
    optimizer:     O,
    scheduler:     ExponentialDecay,
    scaler:        LossScaler,
    skipped_steps: usize,
}

impl<B, O> BurnSession<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<BlipVqaModel<B>, B>,
{
    pub fn new(
        model:     BlipVqaModel<B>,
        config:    BlipVqaConfig,
        optimizer: O,
        scheduler: ExponentialDecay,
        scaler:    LossScaler,
    ) -> Self {
        Self { model, config, optimizer, scheduler, scaler, skipped_steps: 0 }
    }

    pub fn model(&self) -> &BlipVqaModel<B> {
        &self.model
    }

    pub fn config(&self) -> &BlipVqaConfig {
        &self.config
    }

    /// Optimizer steps dropped because of non-finite gradients.
    pub fn skipped_steps(&self) -> usize {
        self.skipped_steps
    }
}

impl<B, O> LossEvaluator for BurnSession<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<BlipVqaModel<B>, B>,
{
    type EvalBatch = VqaBatch<B::InnerBackend>;

    fn eval_batch(&self, batch: VqaBatch<B::InnerBackend>) -> Result<f64> {
        self.model.valid().eval_batch(batch)
    }
}

impl<B, O> FineTuneSession for BurnSession<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<BlipVqaModel<B>, B>,
{
    type TrainBatch = VqaBatch<B>;

    fn train_batch(&mut self, batch: VqaBatch<B>) -> Result<f64> {
        let loss       = self.model.forward_loss(batch);
        let loss_value = loss.clone().into_scalar().elem::<f64>();

        let grads     = self.scaler.scale_loss(loss).backward();
        let mut grads = GradientsParams::from_grads(grads, &self.model);
        let found_inf = self.scaler.unscale(&self.model, &mut grads);

        if found_inf {
            self.skipped_steps += 1;
            tracing::warn!(
                "Skipping optimizer step: non-finite gradients at loss scale {}",
                self.scaler.scale()
            );
        } else {
            self.model = self.optimizer.step(
                self.scheduler.learning_rate(),
                self.model.clone(),
                grads,
            );
        }
        self.scaler.update(found_inf);

        Ok(loss_value)
    }

    fn learning_rate(&self) -> f64 {
        self.scheduler.learning_rate()
    }

    fn step_scheduler(&mut self) {
        self.scheduler.step();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::optim::AdamWConfig;

    use crate::ml::model::tests::{tiny_batch, tiny_config};

    type TestBackend = Autodiff<NdArray>;

    fn session(mixed_precision: bool) -> BurnSession<TestBackend, impl Optimizer<BlipVqaModel<TestBackend>, TestBackend>> {
        let device = Default::default();
        let cfg    = tiny_config();
        BurnSession::new(
            cfg.init::<TestBackend>(&device),
            cfg,
            AdamWConfig::new().init::<TestBackend, BlipVqaModel<TestBackend>>(),
            ExponentialDecay::new(1e-2, 0.5),
            LossScaler::new(mixed_precision),
        )
    }

    #[test]
    fn test_training_reduces_loss_on_repeated_batch() {
        let device      = Default::default();
        let mut session = session(false);

        let first = session.train_batch(tiny_batch::<TestBackend>(&device, 2)).unwrap();
        let mut last = first;
        for _ in 0..20 {
            last = session.train_batch(tiny_batch::<TestBackend>(&device, 2)).unwrap();
        }
        assert!(last < first, "loss did not drop: {first} → {last}");
    }

    #[test]
    fn test_scaled_step_keeps_loss_finite() {
        let device      = Default::default();
        let mut session = session(true);

        let loss = session.train_batch(tiny_batch::<TestBackend>(&device, 2)).unwrap();
        assert!(loss.is_finite());
        assert_eq!(session.skipped_steps(), 0);
    }

    #[test]
    fn test_eval_does_not_change_weights() {
        let device  = Default::default();
        let session = session(false);

        let a = session.eval_batch(tiny_batch::<NdArray>(&device, 2)).unwrap();
        let b = session.eval_batch(tiny_batch::<NdArray>(&device, 2)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_scheduler_step() {
        let mut session = session(false);
        session.step_scheduler();
        assert!((session.learning_rate() - 5e-3).abs() < 1e-12);
    }
}
