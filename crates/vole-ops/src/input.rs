use std::sync::Arc;

use vole_core::backend::Backend;
use vole_core::error::Result;
use vole_core::op::{check_arity, Op};
use vole_core::parameter::SharedParameter;
use vole_core::shape::Shape;
use vole_core::tensor::Tensor;

// Leaf operations — zero operands, values from outside the graph

/// Exposes a caller-supplied tensor as a graph leaf.
pub struct Input<B: Backend> {
    value: Tensor<B>,
}

impl<B: Backend> Input<B> {
    pub fn new(value: Tensor<B>) -> Self {
        Input { value }
    }
}

impl<B: Backend> Op<B> for Input<B> {
    fn name(&self) -> String {
        "Input".to_string()
    }

    fn infer_shape(&self, args: &[&Shape]) -> Result<Shape> {
        check_arity("Input", 0, args.len())?;
        Ok(self.value.shape().clone())
    }

    fn forward(&self, _args: &[&Tensor<B>]) -> Result<Tensor<B>> {
        Ok(self.value.clone())
    }

    fn backward(
        &self,
        _value: &Tensor<B>,
        _grad: &Tensor<B>,
        _args: &[&Tensor<B>],
    ) -> Result<Vec<Tensor<B>>> {
        Ok(Vec::new())
    }
}

/// Reads a shared [`Parameter`](vole_core::Parameter) as a graph leaf.
///
/// Forward exposes the parameter's current value; backward exports the leaf
/// node's accumulated gradient into the parameter, where an optimizer can
/// pick it up. Batched gradients are summed down to the parameter's single
/// sample by `Parameter::add_gradient`.
pub struct ParameterInput<B: Backend> {
    param: SharedParameter<B>,
}

impl<B: Backend> ParameterInput<B> {
    pub fn new(param: &SharedParameter<B>) -> Self {
        ParameterInput {
            param: Arc::clone(param),
        }
    }
}

impl<B: Backend> Op<B> for ParameterInput<B> {
    fn name(&self) -> String {
        "Parameter".to_string()
    }

    fn infer_shape(&self, args: &[&Shape]) -> Result<Shape> {
        check_arity("Parameter", 0, args.len())?;
        Ok(self.param.read().unwrap().shape().clone())
    }

    fn forward(&self, _args: &[&Tensor<B>]) -> Result<Tensor<B>> {
        Ok(self.param.read().unwrap().value().clone())
    }

    fn backward(
        &self,
        _value: &Tensor<B>,
        grad: &Tensor<B>,
        _args: &[&Tensor<B>],
    ) -> Result<Vec<Tensor<B>>> {
        self.param.write().unwrap().add_gradient(grad)?;
        Ok(Vec::new())
    }
}
