// ============================================================
// Layer 5 — Learning-Rate Schedule
// ============================================================
// Exponential decay, stepped once per epoch by the loop:
//
//   lr(k+1) = lr(k) × gamma
//
// Reference: PyTorch ExponentialLR

#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialDecay {
    lr:    f64,
    gamma: f64,
}

impl ExponentialDecay {
    pub fn new(initial_lr: f64, gamma: f64) -> Self {
        Self { lr: initial_lr, gamma }
    }

    pub fn learning_rate(&self) -> f64 {
        self.lr
    }

    pub fn step(&mut self) {
        self.lr *= self.gamma;
    }
}
