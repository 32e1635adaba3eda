use vole_core::backend::Backend;
use vole_core::error::Result;
use vole_core::op::{check_arity, Op};
use vole_core::shape::Shape;
use vole_core::tensor::Tensor;

// Batch operations

/// Sum the batch samples down to a single sample (batch size 1).
pub struct BatchSum;

impl<B: Backend> Op<B> for BatchSum {
    fn name(&self) -> String {
        "BatchSum".to_string()
    }

    fn infer_shape(&self, args: &[&Shape]) -> Result<Shape> {
        check_arity("BatchSum", 1, args.len())?;
        args[0].resize_batch(1)
    }

    fn forward(&self, args: &[&Tensor<B>]) -> Result<Tensor<B>> {
        args[0].batch_sum()
    }

    fn backward(
        &self,
        _value: &Tensor<B>,
        grad: &Tensor<B>,
        args: &[&Tensor<B>],
    ) -> Result<Vec<Tensor<B>>> {
        // Every sample contributed with weight 1, so the gradient repeats
        // across the operand's batch.
        Ok(vec![grad.broadcast_batch(args[0].batch_size())?])
    }
}
