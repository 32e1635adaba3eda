use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::shape::Shape;
use crate::tensor::Tensor;

// Op — the contract every graph operation implements
//
// An operation has two separable phases:
//
//   1. Shape inference, which runs eagerly when the node is recorded. It
//      sees operand shapes only (no values, no allocation), so an entire
//      chain of operations can be validated before any numeric work runs.
//   2. Numeric evaluation: `forward` when a value is first requested,
//      `backward` when gradients flow through the node.
//
// `backward` is invoked once per node with the complete operand value list
// and returns one gradient contribution per operand, each already reduced to
// that operand's shape. In particular, when an operand's batch size is 1 but
// the node's is larger, the operation must sum the per-sample contributions
// down to the operand's single sample (`Tensor::batch_sum`) before returning;
// the graph adds contributions into gradient buffers but never reduces them.
// Returning contributions instead of writing through operand buffers keeps
// duplicate operands sound: `mul(x, x)` yields two contributions that the
// graph adds into `x`'s gradient one after the other.

/// A single kind of computation: shape inference plus forward/backward
/// numeric evaluation. Implementations are stored in the graph as boxed
/// trait objects, one per node, owned by the graph.
pub trait Op<B: Backend> {
    /// Diagnostic name, used in graph dumps and error messages.
    fn name(&self) -> String;

    /// Compute the result shape from the operand shapes, or fail with a
    /// shape mismatch. Must not access tensor values and must be free of
    /// side effects.
    fn infer_shape(&self, args: &[&Shape]) -> Result<Shape>;

    /// Compute the result value from the operand values. A pure function:
    /// same operands, same result.
    fn forward(&self, args: &[&Tensor<B>]) -> Result<Tensor<B>>;

    /// Given the node's value and accumulated gradient plus the operand
    /// values, return the gradient contribution for each operand (in operand
    /// order, one entry per operand, shaped like the operand).
    ///
    /// Operations with no operands may use this call to export the node's
    /// gradient elsewhere (e.g. into a parameter) and return an empty list.
    fn backward(
        &self,
        value: &Tensor<B>,
        grad: &Tensor<B>,
        args: &[&Tensor<B>],
    ) -> Result<Vec<Tensor<B>>>;
}

/// Fail with [`Error::ArityMismatch`] unless exactly `expected` operands
/// were supplied. Shared by the `infer_shape` implementations.
pub fn check_arity(op: &str, expected: usize, got: usize) -> Result<()> {
    if got != expected {
        return Err(Error::ArityMismatch {
            op: op.to_string(),
            expected,
            got,
        });
    }
    Ok(())
}
