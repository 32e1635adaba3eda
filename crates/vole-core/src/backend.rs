use std::fmt;

use crate::error::Result;
use crate::shape::Shape;

// Backend — abstraction over compute devices
//
// The graph engine never touches raw memory: every kernel it needs goes
// through this trait, so backends (CPU, GPU, ...) can be added as separate
// crates without modifying vole-core. The engine itself only ever asks for
// constant tensors (gradient seeds) and elementwise addition (gradient
// accumulation); the rest of the surface exists for the operation library.
//
// All kernels take storage plus the shape describing it and return new
// storage. Storage is immutable once created; accumulation builds a new
// buffer rather than writing through shared references.

/// Identifies a compute device (e.g. "cpu", "cuda:0").
pub trait BackendDevice: Clone + fmt::Debug + Send + Sync + 'static {
    /// A human-readable name for this device.
    fn name(&self) -> String;
}

/// Elementwise binary operations.
///
/// These parameterize [`Backend::binary_op`] so there is one kernel entry
/// point per category rather than one trait method per operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Elementwise unary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Exp,
    Sqrt,
    Square,
    Tanh,
    Sigmoid,
    Relu,
}

/// The main backend trait. Implementing this for a struct (e.g. CpuBackend)
/// makes that struct a complete compute backend for Vole.
///
/// Shapes passed to kernels are trusted: operand compatibility is validated
/// by the callers (eagerly at graph construction, again at the tensor layer),
/// so kernels only deal with well-formed inputs.
pub trait Backend: Clone + fmt::Debug + Send + Sync + 'static {
    /// The device type for this backend.
    type Device: BackendDevice;
    /// The storage type holding one tensor's elements (all batch samples).
    type Storage: Clone + Send + Sync + 'static;

    // Creation

    /// Allocate storage for `shape` filled with a constant value.
    fn constant(shape: &Shape, value: f32, device: &Self::Device) -> Result<Self::Storage>;

    /// Allocate storage holding a copy of `data`.
    fn from_slice(data: &[f32], device: &Self::Device) -> Result<Self::Storage>;

    /// Allocate storage for `shape` with uniform random values in
    /// `[lower, upper)`.
    fn rand_uniform(
        shape: &Shape,
        lower: f32,
        upper: f32,
        device: &Self::Device,
    ) -> Result<Self::Storage>;

    // Host transfer

    /// Copy the elements back to the host for inspection.
    fn to_vec(storage: &Self::Storage) -> Result<Vec<f32>>;

    // Elementwise

    /// Apply a binary op elementwise. Dims of both operands are identical;
    /// batch sizes are compatible (equal or either 1), and an operand with
    /// batch 1 repeats across the other's batch.
    fn binary_op(
        op: BinaryOp,
        lhs: &Self::Storage,
        lhs_shape: &Shape,
        rhs: &Self::Storage,
        rhs_shape: &Shape,
    ) -> Result<Self::Storage>;

    /// Apply a unary op elementwise.
    fn unary_op(op: UnaryOp, input: &Self::Storage, shape: &Shape) -> Result<Self::Storage>;

    /// Fused scale-and-shift: `result[i] = input[i] * mul + add`.
    fn affine(input: &Self::Storage, shape: &Shape, mul: f32, add: f32) -> Result<Self::Storage>;

    // Matrix

    /// Per-sample matrix product `[m,k] @ [k,n] -> [m,n]` with batch
    /// broadcast between the operands.
    fn matmul(
        lhs: &Self::Storage,
        lhs_shape: &Shape,
        rhs: &Self::Storage,
        rhs_shape: &Shape,
    ) -> Result<Self::Storage>;

    /// Per-sample 2-D transpose.
    fn transpose(input: &Self::Storage, shape: &Shape) -> Result<Self::Storage>;

    // Batch

    /// Sum the batch samples down to a single sample.
    fn batch_sum(input: &Self::Storage, shape: &Shape) -> Result<Self::Storage>;

    /// Repeat a single-sample input `batch` times.
    fn broadcast_batch(
        input: &Self::Storage,
        shape: &Shape,
        batch: usize,
    ) -> Result<Self::Storage>;

    // Axis-varying

    /// Concatenate the inputs along `axis` into `out_shape`.
    fn concat(
        inputs: &[(&Self::Storage, &Shape)],
        axis: usize,
        out_shape: &Shape,
    ) -> Result<Self::Storage>;

    /// Copy the window starting at `lower` along `axis` into `out_shape`.
    fn slice(
        input: &Self::Storage,
        shape: &Shape,
        axis: usize,
        lower: usize,
        out_shape: &Shape,
    ) -> Result<Self::Storage>;

    /// Place `input` into an otherwise-zero tensor of `out_shape`, at offset
    /// `lower` along `axis`. The inverse of [`Backend::slice`]; used to route
    /// a slice's gradient back to the sliced operand.
    fn embed(
        input: &Self::Storage,
        shape: &Shape,
        axis: usize,
        lower: usize,
        out_shape: &Shape,
    ) -> Result<Self::Storage>;
}
