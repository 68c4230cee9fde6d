// ============================================================
// Layer 5 — Dynamic Loss Scaler
// ============================================================
// Loss scaling for reduced-precision training:
//
//   1. multiply the loss by `scale` before backward
//   2. divide every gradient by `scale`
//   3. any non-finite gradient → skip the optimizer step,
//      scale × backoff
//   4. `growth_interval` clean steps in a row → scale × growth
//
// A disabled scaler keeps scale 1.0, never reports overflow and
// never changes.
//
// Reference: Micikevicius et al. (2018) Mixed Precision Training

use std::marker::PhantomData;

use burn::{
    module::{Module, ModuleVisitor, ParamId},
    optim::GradientsParams,
    prelude::*,
    tensor::backend::AutodiffBackend,
};

pub const INITIAL_SCALE: f64 = 65536.0;
pub const GROWTH_FACTOR: f64 = 2.0;
pub const BACKOFF_FACTOR: f64 = 0.5;
pub const GROWTH_INTERVAL: usize = 2000;

#[derive(Debug, Clone, PartialEq)]
pub struct LossScaler {
    enabled:         bool,
    scale:           f64,
    growth_factor:   f64,
    backoff_factor:  f64,
    growth_interval: usize,
    clean_steps:     usize,
}

impl LossScaler {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            scale:           if enabled { INITIAL_SCALE } else { 1.0 },
            growth_factor:   GROWTH_FACTOR,
            backoff_factor:  BACKOFF_FACTOR,
            growth_interval: GROWTH_INTERVAL,
            clean_steps:     0,
        }
    }

    #[cfg(test)]
    pub fn with_growth_interval(mut self, interval: usize) -> Self {
        self.growth_interval = interval.max(1);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Adjust the scale after one optimizer step attempt.
    pub fn update(&mut self, found_inf: bool) {
        if !self.enabled {
            return;
        }
        if found_inf {
            self.scale      *= self.backoff_factor;
            self.clean_steps = 0;
            tracing::debug!("Non-finite gradients, loss scale backed off to {}", self.scale);
            return;
        }

        self.clean_steps += 1;
        if self.clean_steps >= self.growth_interval {
            self.scale      *= self.growth_factor;
            self.clean_steps = 0;
        }
    }

    pub fn scale_loss<B: Backend>(&self, loss: Tensor<B, 1>) -> Tensor<B, 1> {
        if self.enabled {
            loss.mul_scalar(self.scale)
        } else {
            loss
        }
    }

    /// Divide every gradient of `model` by the current scale.
    /// Returns true if any gradient contains a non-finite value.
    pub fn unscale<B, M>(&self, model: &M, grads: &mut GradientsParams) -> bool
    where
        B: AutodiffBackend,
        M: Module<B>,
    {
        if !self.enabled {
            return false;
        }
        let mut visitor = GradientUnscaler::<B> {
            grads,
            factor:    1.0 / self.scale,
            found_inf: false,
            _backend:  PhantomData,
        };
        model.visit(&mut visitor);
        visitor.found_inf
    }
}

struct GradientUnscaler<'a, B: AutodiffBackend> {
    grads:     &'a mut GradientsParams,
    factor:    f64,
    found_inf: bool,
    _backend:  PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for GradientUnscaler<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id) else {
            return;
        };
        let grad  = grad.mul_scalar(self.factor);
        let total = grad.clone().sum().into_scalar().elem::<f64>();
        if !total.is_finite() {
            self.found_inf = true;
        }
        self.grads.register::<B::InnerBackend, D>(id, grad);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::nn::{Linear, LinearConfig};

    type TestBackend = Autodiff<NdArray>;

    #[test]
    fn test_backoff_on_overflow() {
        let mut s = LossScaler::new(true);
        s.update(true);
        assert_eq!(s.scale(), INITIAL_SCALE * 0.5);
    }

    #[test]
    fn test_growth_after_clean_interval() {
        let mut s = LossScaler::new(true).with_growth_interval(3);
        s.update(false);
        s.update(false);
        assert_eq!(s.scale(), INITIAL_SCALE);
        s.update(false);
        assert_eq!(s.scale(), INITIAL_SCALE * 2.0);
    }

    #[test]
    fn test_overflow_resets_clean_streak() {
        let mut s = LossScaler::new(true).with_growth_interval(2);
        s.update(false);
        s.update(true);
        s.update(false);
        assert_eq!(s.scale(), INITIAL_SCALE * 0.5);
    }

    #[test]
    fn test_disabled_is_pass_through() {
        let mut s = LossScaler::new(false);
        s.update(true);
        s.update(false);
        assert_eq!(s.scale(), 1.0);
        assert!(!s.is_enabled());
    }

    #[test]
    fn test_unscale_recovers_true_gradients() {
        let device = Default::default();
        let layer: Linear<TestBackend> = LinearConfig::new(2, 1).init(&device);
        let input  = Tensor::<TestBackend, 2>::from_floats([[1.0, 2.0]], &device);

        let plain  = layer.forward(input.clone()).sum();
        let plain  = GradientsParams::from_grads(plain.backward(), &layer);

        let scaler = LossScaler::new(true);
        let scaled = scaler.scale_loss(layer.forward(input).sum());
        let mut scaled = GradientsParams::from_grads(scaled.backward(), &layer);
        assert!(!scaler.unscale(&layer, &mut scaled));

        let id = layer.weight.id;
        let a  = plain.get::<NdArray, 2>(id).unwrap().into_data().to_vec::<f32>().unwrap();
        let b  = scaled.get::<NdArray, 2>(id).unwrap().into_data().to_vec::<f32>().unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-4);
        }
    }
}
