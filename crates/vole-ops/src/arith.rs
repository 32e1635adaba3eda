use vole_core::backend::Backend;
use vole_core::error::Result;
use vole_core::op::{check_arity, Op};
use vole_core::shape::Shape;
use vole_core::tensor::Tensor;

use crate::reduce_to;

// Elementwise arithmetic — binary operations and their scalar-constant
// variants
//
// Binary operands must have identical dims and compatible batch sizes; the
// result takes the larger batch. Each backward reduces its contributions to
// the operands' own batch sizes (an operand with batch 1 receives the sum of
// the per-sample gradients).

fn binary_shape(op: &str, args: &[&Shape]) -> Result<Shape> {
    check_arity(op, 2, args.len())?;
    Shape::elementwise(args[0], args[1])
}

fn unary_shape(op: &str, args: &[&Shape]) -> Result<Shape> {
    check_arity(op, 1, args.len())?;
    Ok(args[0].clone())
}

/// Elementwise `a + b`.
pub struct Add;

impl<B: Backend> Op<B> for Add {
    fn name(&self) -> String {
        "Add".to_string()
    }

    fn infer_shape(&self, args: &[&Shape]) -> Result<Shape> {
        binary_shape("Add", args)
    }

    fn forward(&self, args: &[&Tensor<B>]) -> Result<Tensor<B>> {
        args[0].add(args[1])
    }

    fn backward(
        &self,
        _value: &Tensor<B>,
        grad: &Tensor<B>,
        args: &[&Tensor<B>],
    ) -> Result<Vec<Tensor<B>>> {
        Ok(vec![
            reduce_to(grad.clone(), args[0].shape())?,
            reduce_to(grad.clone(), args[1].shape())?,
        ])
    }
}

/// Elementwise `a - b`.
pub struct Subtract;

impl<B: Backend> Op<B> for Subtract {
    fn name(&self) -> String {
        "Subtract".to_string()
    }

    fn infer_shape(&self, args: &[&Shape]) -> Result<Shape> {
        binary_shape("Subtract", args)
    }

    fn forward(&self, args: &[&Tensor<B>]) -> Result<Tensor<B>> {
        args[0].sub(args[1])
    }

    fn backward(
        &self,
        _value: &Tensor<B>,
        grad: &Tensor<B>,
        args: &[&Tensor<B>],
    ) -> Result<Vec<Tensor<B>>> {
        Ok(vec![
            reduce_to(grad.clone(), args[0].shape())?,
            reduce_to(grad.neg()?, args[1].shape())?,
        ])
    }
}

/// Elementwise `a * b`.
pub struct Multiply;

impl<B: Backend> Op<B> for Multiply {
    fn name(&self) -> String {
        "Multiply".to_string()
    }

    fn infer_shape(&self, args: &[&Shape]) -> Result<Shape> {
        binary_shape("Multiply", args)
    }

    fn forward(&self, args: &[&Tensor<B>]) -> Result<Tensor<B>> {
        args[0].mul(args[1])
    }

    fn backward(
        &self,
        _value: &Tensor<B>,
        grad: &Tensor<B>,
        args: &[&Tensor<B>],
    ) -> Result<Vec<Tensor<B>>> {
        Ok(vec![
            reduce_to(grad.mul(args[1])?, args[0].shape())?,
            reduce_to(grad.mul(args[0])?, args[1].shape())?,
        ])
    }
}

/// Elementwise `a / b`.
pub struct Divide;

impl<B: Backend> Op<B> for Divide {
    fn name(&self) -> String {
        "Divide".to_string()
    }

    fn infer_shape(&self, args: &[&Shape]) -> Result<Shape> {
        binary_shape("Divide", args)
    }

    fn forward(&self, args: &[&Tensor<B>]) -> Result<Tensor<B>> {
        args[0].div(args[1])
    }

    fn backward(
        &self,
        value: &Tensor<B>,
        grad: &Tensor<B>,
        args: &[&Tensor<B>],
    ) -> Result<Vec<Tensor<B>>> {
        // d(a/b)/da = 1/b; d(a/b)/db = -a/b^2 = -(a/b)/b.
        let ga = grad.div(args[1])?;
        let gb = grad.mul(value)?.div(args[1])?.neg()?;
        Ok(vec![
            reduce_to(ga, args[0].shape())?,
            reduce_to(gb, args[1].shape())?,
        ])
    }
}

/// Elementwise `x + k` for a fixed constant `k`.
pub struct AddConst {
    value: f32,
}

impl AddConst {
    pub fn new(value: f32) -> Self {
        AddConst { value }
    }
}

impl<B: Backend> Op<B> for AddConst {
    fn name(&self) -> String {
        format!("AddConst({})", self.value)
    }

    fn infer_shape(&self, args: &[&Shape]) -> Result<Shape> {
        unary_shape("AddConst", args)
    }

    fn forward(&self, args: &[&Tensor<B>]) -> Result<Tensor<B>> {
        args[0].affine(1.0, self.value)
    }

    fn backward(
        &self,
        _value: &Tensor<B>,
        grad: &Tensor<B>,
        _args: &[&Tensor<B>],
    ) -> Result<Vec<Tensor<B>>> {
        Ok(vec![grad.clone()])
    }
}

/// Elementwise `x * k` for a fixed constant `k`.
pub struct MultiplyConst {
    value: f32,
}

impl MultiplyConst {
    pub fn new(value: f32) -> Self {
        MultiplyConst { value }
    }
}

impl<B: Backend> Op<B> for MultiplyConst {
    fn name(&self) -> String {
        format!("MultiplyConst({})", self.value)
    }

    fn infer_shape(&self, args: &[&Shape]) -> Result<Shape> {
        unary_shape("MultiplyConst", args)
    }

    fn forward(&self, args: &[&Tensor<B>]) -> Result<Tensor<B>> {
        args[0].affine(self.value, 0.0)
    }

    fn backward(
        &self,
        _value: &Tensor<B>,
        grad: &Tensor<B>,
        _args: &[&Tensor<B>],
    ) -> Result<Vec<Tensor<B>>> {
        Ok(vec![grad.affine(self.value, 0.0)?])
    }
}
