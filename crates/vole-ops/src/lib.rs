//! # vole-ops
//!
//! Concrete operations for vole computation graphs, plus free helper
//! functions that record them:
//!
//! ```ignore
//! use vole_cpu::{CpuBackend, CpuDevice};
//! use vole_core::{Graph, Shape, Tensor};
//!
//! let mut graph: Graph<CpuBackend> = Graph::new();
//! let x = vole_ops::input(&mut graph, Tensor::full(&Shape::scalar(), 3.0, &CpuDevice)?)?;
//! let y = vole_ops::square(&mut graph, x)?;
//! let value = graph.forward(y)?.to_scalar()?; // 9.0
//! graph.backward(y)?;                         // dy/dx = 6.0 at x
//! ```
//!
//! Every operation validates its operand shapes eagerly when recorded, so a
//! dimension mistake fails at `apply` time, before any numeric work.

pub mod arith;
pub mod axis;
pub mod batch;
pub mod input;
pub mod matmul;
pub mod unary;

pub use arith::{Add, AddConst, Divide, Multiply, MultiplyConst, Subtract};
pub use axis::{Concat, Slice};
pub use batch::BatchSum;
pub use input::{Input, ParameterInput};
pub use matmul::{Matmul, Transpose};
pub use unary::{Exp, Negate, Relu, Sigmoid, Sqrt, Square, Tanh};

use vole_core::backend::Backend;
use vole_core::error::Result;
use vole_core::graph::{Graph, Node};
use vole_core::parameter::SharedParameter;
use vole_core::shape::Shape;
use vole_core::tensor::Tensor;

/// Reduce a gradient contribution to an operand's batch size: an operand
/// with batch 1 feeding a batched node receives the sum of the per-sample
/// gradients. Used by every backward whose operand batch can be smaller
/// than the node's.
pub(crate) fn reduce_to<B: Backend>(grad: Tensor<B>, shape: &Shape) -> Result<Tensor<B>> {
    if grad.batch_size() > shape.batch_size() {
        grad.batch_sum()
    } else {
        Ok(grad)
    }
}

// Graph-building helpers — record one operation and return its node

/// Record a leaf exposing `value`.
pub fn input<B: Backend>(graph: &mut Graph<B>, value: Tensor<B>) -> Result<Node> {
    graph.apply(Input::new(value), &[])
}

/// Record a leaf reading `param`.
pub fn parameter<B: Backend>(graph: &mut Graph<B>, param: &SharedParameter<B>) -> Result<Node> {
    graph.apply(ParameterInput::new(param), &[])
}

/// Record `a + b`.
pub fn add<B: Backend>(graph: &mut Graph<B>, a: Node, b: Node) -> Result<Node> {
    graph.apply(Add, &[a, b])
}

/// Record `a - b`.
pub fn subtract<B: Backend>(graph: &mut Graph<B>, a: Node, b: Node) -> Result<Node> {
    graph.apply(Subtract, &[a, b])
}

/// Record `a * b`.
pub fn multiply<B: Backend>(graph: &mut Graph<B>, a: Node, b: Node) -> Result<Node> {
    graph.apply(Multiply, &[a, b])
}

/// Record `a / b`.
pub fn divide<B: Backend>(graph: &mut Graph<B>, a: Node, b: Node) -> Result<Node> {
    graph.apply(Divide, &[a, b])
}

/// Record `x + k`.
pub fn add_const<B: Backend>(graph: &mut Graph<B>, x: Node, k: f32) -> Result<Node> {
    graph.apply(AddConst::new(k), &[x])
}

/// Record `x * k`.
pub fn multiply_const<B: Backend>(graph: &mut Graph<B>, x: Node, k: f32) -> Result<Node> {
    graph.apply(MultiplyConst::new(k), &[x])
}

/// Record `-x`.
pub fn negate<B: Backend>(graph: &mut Graph<B>, x: Node) -> Result<Node> {
    graph.apply(Negate, &[x])
}

/// Record `e^x`.
pub fn exp<B: Backend>(graph: &mut Graph<B>, x: Node) -> Result<Node> {
    graph.apply(Exp, &[x])
}

/// Record `sqrt(x)`.
pub fn sqrt<B: Backend>(graph: &mut Graph<B>, x: Node) -> Result<Node> {
    graph.apply(Sqrt, &[x])
}

/// Record `x^2`.
pub fn square<B: Backend>(graph: &mut Graph<B>, x: Node) -> Result<Node> {
    graph.apply(Square, &[x])
}

/// Record `tanh(x)`.
pub fn tanh<B: Backend>(graph: &mut Graph<B>, x: Node) -> Result<Node> {
    graph.apply(Tanh, &[x])
}

/// Record `sigmoid(x)`.
pub fn sigmoid<B: Backend>(graph: &mut Graph<B>, x: Node) -> Result<Node> {
    graph.apply(Sigmoid, &[x])
}

/// Record `max(x, 0)`.
pub fn relu<B: Backend>(graph: &mut Graph<B>, x: Node) -> Result<Node> {
    graph.apply(Relu, &[x])
}

/// Record `a @ b`.
pub fn matmul<B: Backend>(graph: &mut Graph<B>, a: Node, b: Node) -> Result<Node> {
    graph.apply(Matmul, &[a, b])
}

/// Record the 2-D transpose of `x`.
pub fn transpose<B: Backend>(graph: &mut Graph<B>, x: Node) -> Result<Node> {
    graph.apply(Transpose, &[x])
}

/// Record the concatenation of `parts` along `axis`.
pub fn concat<B: Backend>(graph: &mut Graph<B>, parts: &[Node], axis: usize) -> Result<Node> {
    graph.apply(Concat::new(axis), parts)
}

/// Record the window `[lower, upper)` of `axis` of `x`.
pub fn slice<B: Backend>(
    graph: &mut Graph<B>,
    x: Node,
    axis: usize,
    lower: usize,
    upper: usize,
) -> Result<Node> {
    graph.apply(Slice::new(axis, lower, upper), &[x])
}

/// Record the batch sum of `x`.
pub fn batch_sum<B: Backend>(graph: &mut Graph<B>, x: Node) -> Result<Node> {
    graph.apply(BatchSum, &[x])
}
