use vole_core::backend::Backend;
use vole_core::error::Result;
use vole_core::op::{check_arity, Op};
use vole_core::shape::Shape;
use vole_core::tensor::Tensor;

use crate::reduce_to;

// Axis-varying operations — vary one axis, require all others to match
// (the leave-one-out dimension rule)

/// Concatenate any number of operands along one axis.
pub struct Concat {
    axis: usize,
}

impl Concat {
    pub fn new(axis: usize) -> Self {
        Concat { axis }
    }
}

impl<B: Backend> Op<B> for Concat {
    fn name(&self) -> String {
        format!("Concat(axis={})", self.axis)
    }

    fn infer_shape(&self, args: &[&Shape]) -> Result<Shape> {
        Shape::concat(args, self.axis)
    }

    fn forward(&self, args: &[&Tensor<B>]) -> Result<Tensor<B>> {
        Tensor::concat(args, self.axis)
    }

    fn backward(
        &self,
        _value: &Tensor<B>,
        grad: &Tensor<B>,
        args: &[&Tensor<B>],
    ) -> Result<Vec<Tensor<B>>> {
        // Split the gradient back into the windows the operands occupied.
        let mut grads = Vec::with_capacity(args.len());
        let mut offset = 0;
        for arg in args {
            let extent = arg.shape().dim(self.axis);
            let g = grad.slice(self.axis, offset, offset + extent)?;
            grads.push(reduce_to(g, arg.shape())?);
            offset += extent;
        }
        Ok(grads)
    }
}

/// Copy the half-open window `[lower, upper)` out of one axis.
pub struct Slice {
    axis: usize,
    lower: usize,
    upper: usize,
}

impl Slice {
    pub fn new(axis: usize, lower: usize, upper: usize) -> Self {
        Slice { axis, lower, upper }
    }
}

impl<B: Backend> Op<B> for Slice {
    fn name(&self) -> String {
        format!("Slice(axis={}, [{},{}))", self.axis, self.lower, self.upper)
    }

    fn infer_shape(&self, args: &[&Shape]) -> Result<Shape> {
        check_arity("Slice", 1, args.len())?;
        args[0].sliced(self.axis, self.lower, self.upper)
    }

    fn forward(&self, args: &[&Tensor<B>]) -> Result<Tensor<B>> {
        args[0].slice(self.axis, self.lower, self.upper)
    }

    fn backward(
        &self,
        _value: &Tensor<B>,
        grad: &Tensor<B>,
        args: &[&Tensor<B>],
    ) -> Result<Vec<Tensor<B>>> {
        // The operand's gradient is zero outside the window.
        Ok(vec![grad.embed(self.axis, self.lower, args[0].shape())?])
    }
}
