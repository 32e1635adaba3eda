use std::sync::{Arc, RwLock};

use crate::backend::Backend;
use crate::bail;
use crate::error::Result;
use crate::init::Initializer;
use crate::shape::Shape;
use crate::tensor::Tensor;

// Parameter — a trainable value/gradient pair outside the graph
//
// Parameters live independently of any graph. A graph reads a parameter
// through a leaf operation (zero operands) that exposes the stored value
// and, during backward, adds the leaf node's gradient back into the
// parameter. Optimizers then read the accumulated gradient and update the
// value. Parameters always hold a single sample (batch size 1); gradients
// arriving from a batched graph are summed down to one sample on the way in.

/// A trainable tensor: a value and its accumulated gradient.
pub struct Parameter<B: Backend> {
    shape: Shape,
    device: B::Device,
    value: Tensor<B>,
    grad: Tensor<B>,
}

/// Shared handle to a parameter, used to hand the same parameter to graphs
/// and optimizers.
pub type SharedParameter<B> = Arc<RwLock<Parameter<B>>>;

impl<B: Backend> Parameter<B> {
    /// Create a parameter with zeroed value and gradient. The shape must
    /// have batch size 1.
    pub fn new(shape: impl Into<Shape>, device: &B::Device) -> Result<Self> {
        let shape = shape.into();
        if shape.batch_size() != 1 {
            bail!(
                "parameter shape must have batch size 1, got {}",
                shape
            );
        }
        Ok(Parameter {
            value: Tensor::zeros(&shape, device)?,
            grad: Tensor::zeros(&shape, device)?,
            device: device.clone(),
            shape,
        })
    }

    /// Replace the value using an initializer.
    pub fn reset_value(&mut self, init: &dyn Initializer<B>) -> Result<()> {
        self.value = init.initialize(&self.shape, &self.device)?;
        Ok(())
    }

    /// Set the gradient back to all zeros.
    pub fn reset_gradient(&mut self) -> Result<()> {
        self.grad = Tensor::zeros(&self.shape, &self.device)?;
        Ok(())
    }

    /// Add `diff` into the value: `value += diff`.
    pub fn add_value(&mut self, diff: &Tensor<B>) -> Result<()> {
        if diff.batch_size() != 1 {
            bail!(
                "parameter value update must have batch size 1, got {}",
                diff.shape()
            );
        }
        self.value = self.value.add(diff)?;
        Ok(())
    }

    /// Add `diff` into the gradient: `grad += diff`. A batched `diff` (from
    /// a graph evaluated over a mini-batch) is summed down to one sample
    /// first.
    pub fn add_gradient(&mut self, diff: &Tensor<B>) -> Result<()> {
        let diff = if diff.batch_size() > 1 {
            diff.batch_sum()?
        } else {
            diff.clone()
        };
        self.grad = self.grad.add(&diff)?;
        Ok(())
    }

    /// The parameter's shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// The device holding the parameter's buffers.
    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// The current value.
    pub fn value(&self) -> &Tensor<B> {
        &self.value
    }

    /// The accumulated gradient.
    pub fn gradient(&self) -> &Tensor<B> {
        &self.grad
    }

    /// Wrap this parameter for sharing between a graph and an optimizer.
    pub fn into_shared(self) -> SharedParameter<B> {
        Arc::new(RwLock::new(self))
    }
}
