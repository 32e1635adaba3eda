use std::fmt;

use crate::bail;
use crate::error::{Error, Result};

// Shape — per-sample dims plus a batch multiplicity
//
// A Shape describes the size of each dimension of one sample, together with
// how many parallel samples (the mini-batch) a tensor carries:
//   - Scalar:        Shape::scalar()              — 0 dims, 1 element
//   - Vector:        Shape::new([5])              — 1 dim, 5 elements
//   - Matrix:        Shape::new([3, 4])           — 2 dims, 12 elements
//   - Batched:       Shape::with_batch([3, 4], 8) — 12 elements x 8 samples
//
// Trailing dims of size 1 are never stored: [3, 4, 1] normalizes to [3, 4],
// and any axis beyond the stored depth reads as 1. A batch size of 1 is the
// broadcast case: it stands for "repeat this sample across the batch" when
// combined with a batched operand.

/// Per-sample dims of a tensor plus its batch multiplicity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: Vec<usize>,
    batch: usize,
}

fn normalized(mut dims: Vec<usize>) -> Vec<usize> {
    while dims.last() == Some(&1) {
        dims.pop();
    }
    dims
}

impl Shape {
    /// The scalar shape: no dims, batch size 1.
    pub fn scalar() -> Self {
        Shape {
            dims: Vec::new(),
            batch: 1,
        }
    }

    /// Create a shape with batch size 1. Trailing dims of size 1 are dropped.
    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        Shape {
            dims: normalized(dims.into()),
            batch: 1,
        }
    }

    /// Create a shape with an explicit batch size.
    /// A batch size of 0 is rejected.
    pub fn with_batch(dims: impl Into<Vec<usize>>, batch: usize) -> Result<Self> {
        if batch == 0 {
            return Err(Error::ZeroBatch);
        }
        Ok(Shape {
            dims: normalized(dims.into()),
            batch,
        })
    }

    /// Size of axis `axis`. Axes beyond the stored depth read as 1.
    pub fn dim(&self, axis: usize) -> usize {
        self.dims.get(axis).copied().unwrap_or(1)
    }

    /// Number of stored axes.
    pub fn depth(&self) -> usize {
        self.dims.len()
    }

    /// The stored dims as a slice (no trailing 1s).
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// The batch multiplicity (always at least 1).
    pub fn batch_size(&self) -> usize {
        self.batch
    }

    /// Number of elements in one sample (product of the stored dims).
    pub fn elems_per_sample(&self) -> usize {
        self.dims.iter().product()
    }

    /// Number of elements across all samples of the batch.
    pub fn num_elements(&self) -> usize {
        self.batch * self.elems_per_sample()
    }

    // Comparison predicates

    /// True if both shapes store exactly the same dims (batch ignored).
    pub fn has_same_dims(&self, rhs: &Shape) -> bool {
        self.dims == rhs.dims
    }

    /// True if the batch sizes are equal or either one is 1 (the broadcast
    /// rule: a single sample repeats across the other operand's batch).
    pub fn has_compatible_batch(&self, rhs: &Shape) -> bool {
        self.batch == rhs.batch || self.batch == 1 || rhs.batch == 1
    }

    /// True if both shapes have the same dims ignoring the axis `loo`
    /// (leave-one-out). Used by operations that vary a single axis, such as
    /// concatenation and slicing, while requiring all other axes to match.
    pub fn has_same_loo_dims(&self, rhs: &Shape, loo: usize) -> bool {
        let depth = self.depth().max(rhs.depth());
        (0..depth).all(|axis| axis == loo || self.dim(axis) == rhs.dim(axis))
    }

    // Derivations — produce a new shape, never mutate the source

    /// A copy of this shape with axis `axis` resized to `size`.
    pub fn resize_dim(&self, axis: usize, size: usize) -> Shape {
        let mut dims = self.dims.clone();
        if axis >= dims.len() {
            dims.resize(axis + 1, 1);
        }
        dims[axis] = size;
        Shape {
            dims: normalized(dims),
            batch: self.batch,
        }
    }

    /// A copy of this shape with the batch size replaced.
    pub fn resize_batch(&self, batch: usize) -> Result<Shape> {
        if batch == 0 {
            return Err(Error::ZeroBatch);
        }
        Ok(Shape {
            dims: self.dims.clone(),
            batch,
        })
    }

    // In-place updates. Only for shapes with a single exclusive owner
    // (standalone parameter tensors); shapes stored in graph nodes are
    // never updated.

    /// Resize axis `axis` in place.
    pub fn update_dim(&mut self, axis: usize, size: usize) {
        *self = self.resize_dim(axis, size);
    }

    /// Replace the batch size in place.
    pub fn update_batch(&mut self, batch: usize) -> Result<()> {
        if batch == 0 {
            return Err(Error::ZeroBatch);
        }
        self.batch = batch;
        Ok(())
    }

    // Shape algebra shared by eager shape inference and the kernels

    /// Result shape of an elementwise binary operation: dims must match
    /// exactly, batch sizes must be compatible, and the result takes the
    /// larger batch.
    pub fn elementwise(lhs: &Shape, rhs: &Shape) -> Result<Shape> {
        if !lhs.has_same_dims(rhs) {
            return Err(Error::DimsMismatch {
                lhs: lhs.clone(),
                rhs: rhs.clone(),
            });
        }
        if !lhs.has_compatible_batch(rhs) {
            return Err(Error::BatchMismatch {
                lhs: lhs.clone(),
                rhs: rhs.clone(),
            });
        }
        lhs.resize_batch(lhs.batch.max(rhs.batch))
    }

    /// Result shape of a matrix product `[m,k] @ [k,n] -> [m,n]`.
    /// Operands must be at most 2-D; vectors read as single-column matrices.
    pub fn matmul(lhs: &Shape, rhs: &Shape) -> Result<Shape> {
        if lhs.depth() > 2 || rhs.depth() > 2 {
            bail!(
                "matmul operands must be at most 2-D, got {} and {}",
                lhs,
                rhs
            );
        }
        if lhs.dim(1) != rhs.dim(0) {
            return Err(Error::MatmulMismatch {
                m: lhs.dim(0),
                k1: lhs.dim(1),
                k2: rhs.dim(0),
                n: rhs.dim(1),
            });
        }
        if !lhs.has_compatible_batch(rhs) {
            return Err(Error::BatchMismatch {
                lhs: lhs.clone(),
                rhs: rhs.clone(),
            });
        }
        Shape::with_batch(vec![lhs.dim(0), rhs.dim(1)], lhs.batch.max(rhs.batch))
    }

    /// Result shape of a 2-D transpose: `[m,n] -> [n,m]`.
    pub fn transposed(&self) -> Result<Shape> {
        if self.depth() > 2 {
            bail!("transpose operand must be at most 2-D, got {}", self);
        }
        Shape::with_batch(vec![self.dim(1), self.dim(0)], self.batch)
    }

    /// Result shape of concatenating `shapes` along `axis`: all shapes must
    /// agree on every other axis (leave-one-out) and have compatible batch
    /// sizes; the result sums the extents along `axis` and takes the largest
    /// batch.
    pub fn concat(shapes: &[&Shape], axis: usize) -> Result<Shape> {
        let first = match shapes.first() {
            Some(s) => *s,
            None => bail!("concat requires at least one operand"),
        };
        let mut extent = first.dim(axis);
        let mut batch = first.batch;
        for shape in &shapes[1..] {
            if !first.has_same_loo_dims(shape, axis) {
                return Err(Error::DimsMismatch {
                    lhs: first.clone(),
                    rhs: (*shape).clone(),
                });
            }
            if !first.has_compatible_batch(shape) {
                return Err(Error::BatchMismatch {
                    lhs: first.clone(),
                    rhs: (*shape).clone(),
                });
            }
            extent += shape.dim(axis);
            batch = batch.max(shape.batch);
        }
        first.resize_dim(axis, extent).resize_batch(batch)
    }

    /// Result shape of slicing the half-open window `[lower, upper)` out of
    /// `axis`. The window must be non-empty and lie inside the axis.
    pub fn sliced(&self, axis: usize, lower: usize, upper: usize) -> Result<Shape> {
        if lower >= upper || upper > self.dim(axis) {
            bail!(
                "invalid slice [{}, {}) of axis {} with size {}",
                lower,
                upper,
                axis,
                self.dim(axis)
            );
        }
        Ok(self.resize_dim(axis, upper - lower))
    }
}

impl fmt::Display for Shape {
    /// Renders as `[d0,d1,...]xK`, e.g. `[3,4]x8`, `[]x1` for a scalar.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]x{}", self.batch)
    }
}

// Convenient From implementations
// These let you write Shape::from((3, 4)) instead of Shape::new(vec![3, 4]).
// All of them produce shapes with batch size 1.

impl From<()> for Shape {
    /// Scalar shape (0 dims).
    fn from(_: ()) -> Self {
        Shape::scalar()
    }
}

impl From<usize> for Shape {
    /// 1-D shape.
    fn from(d: usize) -> Self {
        Shape::new(vec![d])
    }
}

impl From<(usize,)> for Shape {
    fn from((d0,): (usize,)) -> Self {
        Shape::new(vec![d0])
    }
}

impl From<(usize, usize)> for Shape {
    fn from((d0, d1): (usize, usize)) -> Self {
        Shape::new(vec![d0, d1])
    }
}

impl From<(usize, usize, usize)> for Shape {
    fn from((d0, d1, d2): (usize, usize, usize)) -> Self {
        Shape::new(vec![d0, d1, d2])
    }
}

impl From<Vec<usize>> for Shape {
    fn from(v: Vec<usize>) -> Self {
        Shape::new(v)
    }
}

impl From<&[usize]> for Shape {
    fn from(s: &[usize]) -> Self {
        Shape::new(s.to_vec())
    }
}
