use vole_core::backend::Backend;
use vole_core::error::Result;
use vole_core::op::{check_arity, Op};
use vole_core::shape::Shape;
use vole_core::tensor::Tensor;

use crate::reduce_to;

// Matrix operations

/// Per-sample matrix product `[m,k] @ [k,n] -> [m,n]` with batch broadcast
/// between the operands.
pub struct Matmul;

impl<B: Backend> Op<B> for Matmul {
    fn name(&self) -> String {
        "Matmul".to_string()
    }

    fn infer_shape(&self, args: &[&Shape]) -> Result<Shape> {
        check_arity("Matmul", 2, args.len())?;
        Shape::matmul(args[0], args[1])
    }

    fn forward(&self, args: &[&Tensor<B>]) -> Result<Tensor<B>> {
        args[0].matmul(args[1])
    }

    fn backward(
        &self,
        _value: &Tensor<B>,
        grad: &Tensor<B>,
        args: &[&Tensor<B>],
    ) -> Result<Vec<Tensor<B>>> {
        // C = A @ B: dA = G @ B^T, dB = A^T @ G.
        let ga = grad.matmul(&args[1].transpose()?)?;
        let gb = args[0].transpose()?.matmul(grad)?;
        Ok(vec![
            reduce_to(ga, args[0].shape())?,
            reduce_to(gb, args[1].shape())?,
        ])
    }
}

/// Per-sample 2-D transpose.
pub struct Transpose;

impl<B: Backend> Op<B> for Transpose {
    fn name(&self) -> String {
        "Transpose".to_string()
    }

    fn infer_shape(&self, args: &[&Shape]) -> Result<Shape> {
        check_arity("Transpose", 1, args.len())?;
        args[0].transposed()
    }

    fn forward(&self, args: &[&Tensor<B>]) -> Result<Tensor<B>> {
        args[0].transpose()
    }

    fn backward(
        &self,
        _value: &Tensor<B>,
        grad: &Tensor<B>,
        _args: &[&Tensor<B>],
    ) -> Result<Vec<Tensor<B>>> {
        // Transpose is its own inverse.
        Ok(vec![grad.transpose()?])
    }
}
