use vole_core::backend::Backend;
use vole_core::error::Result;
use vole_core::parameter::SharedParameter;
use vole_core::tensor::Tensor;

use crate::Optimizer;

/// Adam optimizer (https://arxiv.org/abs/1412.6980).
///
/// Keeps first and second gradient-moment estimates per parameter and
/// applies bias-corrected updates:
///
/// ```text
/// m = beta1 * m + (1 - beta1) * g
/// v = beta2 * v + (1 - beta2) * g^2
/// value += -alpha * m_hat / (sqrt(v_hat) + eps)
/// ```
pub struct Adam<B: Backend> {
    params: Vec<SharedParameter<B>>,
    alpha: f32,
    beta1: f32,
    beta2: f32,
    eps: f32,
    epoch: u32,
    moments: Vec<(Tensor<B>, Tensor<B>)>,
}

impl<B: Backend> Adam<B> {
    /// Create an Adam optimizer with explicit hyperparameters. Moment state
    /// starts at zero for every parameter.
    pub fn new(
        params: Vec<SharedParameter<B>>,
        alpha: f32,
        beta1: f32,
        beta2: f32,
        eps: f32,
    ) -> Result<Self> {
        let mut moments = Vec::with_capacity(params.len());
        for param in &params {
            let param = param.read().unwrap();
            let zero = Tensor::zeros(param.shape(), param.device())?;
            moments.push((zero.clone(), zero));
        }
        Ok(Adam {
            params,
            alpha,
            beta1,
            beta2,
            eps,
            epoch: 0,
            moments,
        })
    }

    /// Create an Adam optimizer with the usual defaults
    /// (alpha 1e-3, beta1 0.9, beta2 0.999, eps 1e-8).
    pub fn with_defaults(params: Vec<SharedParameter<B>>) -> Result<Self> {
        Self::new(params, 1e-3, 0.9, 0.999, 1e-8)
    }

    /// Number of completed update steps.
    pub fn epoch(&self) -> u32 {
        self.epoch
    }
}

impl<B: Backend> Optimizer<B> for Adam<B> {
    fn parameters(&self) -> &[SharedParameter<B>] {
        &self.params
    }

    fn step(&mut self) -> Result<()> {
        self.epoch += 1;
        let correction1 = 1.0 - self.beta1.powi(self.epoch as i32);
        let correction2 = 1.0 - self.beta2.powi(self.epoch as i32);

        for (param, (m, v)) in self.params.iter().zip(self.moments.iter_mut()) {
            let mut param = param.write().unwrap();
            let grad = param.gradient().clone();

            let new_m = m
                .affine(self.beta1, 0.0)?
                .add(&grad.affine(1.0 - self.beta1, 0.0)?)?;
            let new_v = v
                .affine(self.beta2, 0.0)?
                .add(&grad.square()?.affine(1.0 - self.beta2, 0.0)?)?;

            let m_hat = new_m.affine(1.0 / correction1, 0.0)?;
            let v_hat = new_v.affine(1.0 / correction2, 0.0)?;
            let denom = v_hat.sqrt()?.affine(1.0, self.eps)?;
            let delta = m_hat.div(&denom)?.affine(-self.alpha, 0.0)?;
            param.add_value(&delta)?;

            *m = new_m;
            *v = new_v;
        }
        Ok(())
    }
}
