use std::sync::Arc;

use crate::backend::{Backend, BinaryOp, UnaryOp};
use crate::error::{Error, Result};
use crate::shape::Shape;

// Tensor — an immutable batch of samples on a device
//
// A Tensor couples backend storage with the Shape describing it and the
// device that allocated it. The inner data is wrapped in Arc, so cloning a
// Tensor is cheap (a refcount bump) and the graph can hand out value clones
// freely while remaining the owner of record.
//
// Tensors are immutable: every operation allocates fresh storage. Gradient
// accumulation therefore replaces a buffer with `old.add(&contribution)`
// rather than writing through shared references.

struct TensorInner<B: Backend> {
    storage: B::Storage,
    shape: Shape,
    device: B::Device,
}

/// A batch of same-shaped samples stored on a backend device.
pub struct Tensor<B: Backend> {
    inner: Arc<TensorInner<B>>,
}

// Manual Clone: Arc::clone is cheap regardless of B.
impl<B: Backend> Clone for Tensor<B> {
    fn clone(&self) -> Self {
        Tensor {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: Backend> std::fmt::Debug for Tensor<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Tensor(shape={}, device={:?})",
            self.inner.shape, self.inner.device
        )
    }
}

impl<B: Backend> Tensor<B> {
    fn from_storage(storage: B::Storage, shape: Shape, device: B::Device) -> Self {
        Tensor {
            inner: Arc::new(TensorInner {
                storage,
                shape,
                device,
            }),
        }
    }

    // Constructors

    /// A tensor of `shape` filled with zeros.
    pub fn zeros(shape: &Shape, device: &B::Device) -> Result<Self> {
        Self::full(shape, 0.0, device)
    }

    /// A tensor of `shape` filled with ones.
    pub fn ones(shape: &Shape, device: &B::Device) -> Result<Self> {
        Self::full(shape, 1.0, device)
    }

    /// A tensor of `shape` filled with `value`.
    pub fn full(shape: &Shape, value: f32, device: &B::Device) -> Result<Self> {
        let storage = B::constant(shape, value, device)?;
        Ok(Self::from_storage(storage, shape.clone(), device.clone()))
    }

    /// A tensor of `shape` holding a copy of `data` (all batch samples,
    /// sample-major). The element count must match the shape exactly.
    pub fn from_vec(data: &[f32], shape: impl Into<Shape>, device: &B::Device) -> Result<Self> {
        let shape = shape.into();
        if data.len() != shape.num_elements() {
            return Err(Error::ElementCountMismatch {
                expected: shape.num_elements(),
                got: data.len(),
                shape,
            });
        }
        let storage = B::from_slice(data, device)?;
        Ok(Self::from_storage(storage, shape, device.clone()))
    }

    /// A tensor of `shape` with uniform random values in `[lower, upper)`.
    pub fn rand_uniform(
        shape: &Shape,
        lower: f32,
        upper: f32,
        device: &B::Device,
    ) -> Result<Self> {
        let storage = B::rand_uniform(shape, lower, upper, device)?;
        Ok(Self::from_storage(storage, shape.clone(), device.clone()))
    }

    // Accessors

    /// The shape of this tensor.
    pub fn shape(&self) -> &Shape {
        &self.inner.shape
    }

    /// The device holding this tensor's storage.
    pub fn device(&self) -> &B::Device {
        &self.inner.device
    }

    /// Shorthand for `shape().batch_size()`.
    pub fn batch_size(&self) -> usize {
        self.inner.shape.batch_size()
    }

    /// Shorthand for `shape().num_elements()`.
    pub fn num_elements(&self) -> usize {
        self.inner.shape.num_elements()
    }

    /// Copy all elements to the host, sample-major.
    pub fn to_vec(&self) -> Result<Vec<f32>> {
        B::to_vec(&self.inner.storage)
    }

    /// Read the single element of a one-element tensor.
    pub fn to_scalar(&self) -> Result<f32> {
        if self.num_elements() != 1 {
            return Err(Error::NotAScalar {
                shape: self.inner.shape.clone(),
            });
        }
        let data = self.to_vec()?;
        Ok(data[0])
    }

    // Elementwise binary operations. Operands must have identical dims and
    // compatible batch sizes; the result takes the larger batch.

    fn binary(&self, rhs: &Self, op: BinaryOp) -> Result<Self> {
        let shape = Shape::elementwise(self.shape(), rhs.shape())?;
        let storage = B::binary_op(
            op,
            &self.inner.storage,
            self.shape(),
            &rhs.inner.storage,
            rhs.shape(),
        )?;
        Ok(Self::from_storage(storage, shape, self.inner.device.clone()))
    }

    /// Elementwise sum.
    pub fn add(&self, rhs: &Self) -> Result<Self> {
        self.binary(rhs, BinaryOp::Add)
    }

    /// Elementwise difference.
    pub fn sub(&self, rhs: &Self) -> Result<Self> {
        self.binary(rhs, BinaryOp::Sub)
    }

    /// Elementwise product.
    pub fn mul(&self, rhs: &Self) -> Result<Self> {
        self.binary(rhs, BinaryOp::Mul)
    }

    /// Elementwise quotient.
    pub fn div(&self, rhs: &Self) -> Result<Self> {
        self.binary(rhs, BinaryOp::Div)
    }

    // Elementwise unary operations

    fn unary(&self, op: UnaryOp) -> Result<Self> {
        let storage = B::unary_op(op, &self.inner.storage, self.shape())?;
        Ok(Self::from_storage(
            storage,
            self.inner.shape.clone(),
            self.inner.device.clone(),
        ))
    }

    /// Elementwise negation.
    pub fn neg(&self) -> Result<Self> {
        self.unary(UnaryOp::Neg)
    }

    /// Elementwise `e^x`.
    pub fn exp(&self) -> Result<Self> {
        self.unary(UnaryOp::Exp)
    }

    /// Elementwise square root.
    pub fn sqrt(&self) -> Result<Self> {
        self.unary(UnaryOp::Sqrt)
    }

    /// Elementwise `x^2`.
    pub fn square(&self) -> Result<Self> {
        self.unary(UnaryOp::Square)
    }

    /// Elementwise hyperbolic tangent.
    pub fn tanh(&self) -> Result<Self> {
        self.unary(UnaryOp::Tanh)
    }

    /// Elementwise logistic sigmoid.
    pub fn sigmoid(&self) -> Result<Self> {
        self.unary(UnaryOp::Sigmoid)
    }

    /// Elementwise `max(x, 0)`.
    pub fn relu(&self) -> Result<Self> {
        self.unary(UnaryOp::Relu)
    }

    /// Fused scale-and-shift: `x * mul + add`.
    pub fn affine(&self, mul: f32, add: f32) -> Result<Self> {
        let storage = B::affine(&self.inner.storage, self.shape(), mul, add)?;
        Ok(Self::from_storage(
            storage,
            self.inner.shape.clone(),
            self.inner.device.clone(),
        ))
    }

    // Matrix operations

    /// Per-sample matrix product with batch broadcast.
    pub fn matmul(&self, rhs: &Self) -> Result<Self> {
        let shape = Shape::matmul(self.shape(), rhs.shape())?;
        let storage = B::matmul(
            &self.inner.storage,
            self.shape(),
            &rhs.inner.storage,
            rhs.shape(),
        )?;
        Ok(Self::from_storage(storage, shape, self.inner.device.clone()))
    }

    /// Per-sample 2-D transpose.
    pub fn transpose(&self) -> Result<Self> {
        let shape = self.shape().transposed()?;
        let storage = B::transpose(&self.inner.storage, self.shape())?;
        Ok(Self::from_storage(storage, shape, self.inner.device.clone()))
    }

    // Batch operations

    /// Sum the batch samples down to batch size 1.
    pub fn batch_sum(&self) -> Result<Self> {
        let shape = self.shape().resize_batch(1)?;
        let storage = B::batch_sum(&self.inner.storage, self.shape())?;
        Ok(Self::from_storage(storage, shape, self.inner.device.clone()))
    }

    /// Repeat a single-sample tensor across a batch of `batch` samples.
    pub fn broadcast_batch(&self, batch: usize) -> Result<Self> {
        if self.batch_size() == batch {
            return Ok(self.clone());
        }
        if self.batch_size() != 1 {
            return Err(Error::BatchMismatch {
                lhs: self.inner.shape.clone(),
                rhs: self.inner.shape.resize_batch(batch)?,
            });
        }
        let shape = self.shape().resize_batch(batch)?;
        let storage = B::broadcast_batch(&self.inner.storage, self.shape(), batch)?;
        Ok(Self::from_storage(storage, shape, self.inner.device.clone()))
    }

    // Axis-varying operations

    /// Concatenate `parts` along `axis`. All parts must agree on every other
    /// axis and have compatible batch sizes.
    pub fn concat(parts: &[&Self], axis: usize) -> Result<Self> {
        let shapes: Vec<&Shape> = parts.iter().map(|t| t.shape()).collect();
        let shape = Shape::concat(&shapes, axis)?;
        let inputs: Vec<(&B::Storage, &Shape)> = parts
            .iter()
            .map(|t| (&t.inner.storage, t.shape()))
            .collect();
        let storage = B::concat(&inputs, axis, &shape)?;
        Ok(Self::from_storage(
            storage,
            shape,
            parts[0].inner.device.clone(),
        ))
    }

    /// Copy the half-open window `[lower, upper)` out of `axis`.
    pub fn slice(&self, axis: usize, lower: usize, upper: usize) -> Result<Self> {
        let shape = self.shape().sliced(axis, lower, upper)?;
        let storage = B::slice(&self.inner.storage, self.shape(), axis, lower, &shape)?;
        Ok(Self::from_storage(storage, shape, self.inner.device.clone()))
    }

    /// Place this tensor into an otherwise-zero tensor of shape `into`, at
    /// offset `lower` along `axis`. The inverse of [`Tensor::slice`].
    pub fn embed(&self, axis: usize, lower: usize, into: &Shape) -> Result<Self> {
        let storage = B::embed(&self.inner.storage, self.shape(), axis, lower, into)?;
        Ok(Self::from_storage(
            storage,
            into.clone(),
            self.inner.device.clone(),
        ))
    }
}
