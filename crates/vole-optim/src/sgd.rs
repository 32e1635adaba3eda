use vole_core::backend::Backend;
use vole_core::error::Result;
use vole_core::parameter::SharedParameter;

use crate::Optimizer;

/// Plain stochastic gradient descent: `value += -eta * grad`.
pub struct SGD<B: Backend> {
    params: Vec<SharedParameter<B>>,
    eta: f32,
}

impl<B: Backend> SGD<B> {
    /// Create an SGD optimizer with learning rate `eta`.
    pub fn new(params: Vec<SharedParameter<B>>, eta: f32) -> Self {
        SGD { params, eta }
    }

    /// The learning rate.
    pub fn eta(&self) -> f32 {
        self.eta
    }
}

impl<B: Backend> Optimizer<B> for SGD<B> {
    fn parameters(&self) -> &[SharedParameter<B>] {
        &self.params
    }

    fn step(&mut self) -> Result<()> {
        for param in &self.params {
            let mut param = param.write().unwrap();
            let delta = param.gradient().affine(-self.eta, 0.0)?;
            param.add_value(&delta)?;
        }
        Ok(())
    }
}
