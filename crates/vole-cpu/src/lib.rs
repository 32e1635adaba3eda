//! # vole-cpu
//!
//! Reference CPU backend for vole: plain `Vec<f32>` storage and naive
//! kernels. Correctness first; the only concession to speed is a
//! rayon-parallel matmul over batch samples.

use rand::Rng;
use rayon::prelude::*;

use vole_core::backend::{Backend, BackendDevice, BinaryOp, UnaryOp};
use vole_core::error::Result;
use vole_core::shape::Shape;

/// The (only) CPU device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuDevice;

impl BackendDevice for CpuDevice {
    fn name(&self) -> String {
        "cpu".to_string()
    }
}

/// Contiguous sample-major element storage: all elements of sample 0, then
/// sample 1, and so on; row-major within a sample.
#[derive(Debug, Clone)]
pub struct CpuStorage {
    data: Vec<f32>,
}

/// CPU backend marker type.
#[derive(Debug, Clone, Copy)]
pub struct CpuBackend;

/// Start of sample `s` in a storage of `batch` samples of `n` elements.
/// A single-sample storage repeats across any batch.
fn sample_base(batch: usize, n: usize, s: usize) -> usize {
    if batch == 1 {
        0
    } else {
        s * n
    }
}

/// Element counts before and after `axis`, taken from `shape`.
/// Row-major: the sample index of coords `(p, a, q)` is
/// `(p * shape.dim(axis) + a) * post + q`.
fn pre_post(shape: &Shape, axis: usize) -> (usize, usize) {
    let pre = (0..axis).map(|i| shape.dim(i)).product();
    let post = (axis + 1..shape.depth()).map(|i| shape.dim(i)).product();
    (pre, post)
}

impl Backend for CpuBackend {
    type Device = CpuDevice;
    type Storage = CpuStorage;

    fn constant(shape: &Shape, value: f32, _device: &CpuDevice) -> Result<CpuStorage> {
        Ok(CpuStorage {
            data: vec![value; shape.num_elements()],
        })
    }

    fn from_slice(data: &[f32], _device: &CpuDevice) -> Result<CpuStorage> {
        Ok(CpuStorage {
            data: data.to_vec(),
        })
    }

    fn rand_uniform(
        shape: &Shape,
        lower: f32,
        upper: f32,
        _device: &CpuDevice,
    ) -> Result<CpuStorage> {
        let mut rng = rand::thread_rng();
        let data = (0..shape.num_elements())
            .map(|_| rng.gen::<f32>() * (upper - lower) + lower)
            .collect();
        Ok(CpuStorage { data })
    }

    fn to_vec(storage: &CpuStorage) -> Result<Vec<f32>> {
        Ok(storage.data.clone())
    }

    fn binary_op(
        op: BinaryOp,
        lhs: &CpuStorage,
        lhs_shape: &Shape,
        rhs: &CpuStorage,
        rhs_shape: &Shape,
    ) -> Result<CpuStorage> {
        let n = lhs_shape.elems_per_sample();
        let lk = lhs_shape.batch_size();
        let rk = rhs_shape.batch_size();
        let batch = lk.max(rk);
        let f: fn(f32, f32) -> f32 = match op {
            BinaryOp::Add => |a, b| a + b,
            BinaryOp::Sub => |a, b| a - b,
            BinaryOp::Mul => |a, b| a * b,
            BinaryOp::Div => |a, b| a / b,
        };
        let mut data = Vec::with_capacity(batch * n);
        for s in 0..batch {
            let lb = sample_base(lk, n, s);
            let rb = sample_base(rk, n, s);
            for i in 0..n {
                data.push(f(lhs.data[lb + i], rhs.data[rb + i]));
            }
        }
        Ok(CpuStorage { data })
    }

    fn unary_op(op: UnaryOp, input: &CpuStorage, _shape: &Shape) -> Result<CpuStorage> {
        let f: fn(f32) -> f32 = match op {
            UnaryOp::Neg => |x| -x,
            UnaryOp::Exp => f32::exp,
            UnaryOp::Sqrt => f32::sqrt,
            UnaryOp::Square => |x| x * x,
            UnaryOp::Tanh => f32::tanh,
            UnaryOp::Sigmoid => |x| 1.0 / (1.0 + (-x).exp()),
            UnaryOp::Relu => |x| x.max(0.0),
        };
        Ok(CpuStorage {
            data: input.data.iter().map(|&x| f(x)).collect(),
        })
    }

    fn affine(input: &CpuStorage, _shape: &Shape, mul: f32, add: f32) -> Result<CpuStorage> {
        Ok(CpuStorage {
            data: input.data.iter().map(|&x| x * mul + add).collect(),
        })
    }

    fn matmul(
        lhs: &CpuStorage,
        lhs_shape: &Shape,
        rhs: &CpuStorage,
        rhs_shape: &Shape,
    ) -> Result<CpuStorage> {
        let m = lhs_shape.dim(0);
        let k = lhs_shape.dim(1);
        let n = rhs_shape.dim(1);
        let lk = lhs_shape.batch_size();
        let rk = rhs_shape.batch_size();
        let batch = lk.max(rk);
        let ln = lhs_shape.elems_per_sample();
        let rn = rhs_shape.elems_per_sample();

        let mut data = vec![0.0f32; batch * m * n];
        data.par_chunks_mut(m * n).enumerate().for_each(|(s, out)| {
            let l = &lhs.data[sample_base(lk, ln, s)..][..ln];
            let r = &rhs.data[sample_base(rk, rn, s)..][..rn];
            for i in 0..m {
                for j in 0..n {
                    let mut acc = 0.0f32;
                    for t in 0..k {
                        acc += l[i * k + t] * r[t * n + j];
                    }
                    out[i * n + j] = acc;
                }
            }
        });
        Ok(CpuStorage { data })
    }

    fn transpose(input: &CpuStorage, shape: &Shape) -> Result<CpuStorage> {
        let rows = shape.dim(0);
        let cols = shape.dim(1);
        let n = shape.elems_per_sample();
        let mut data = Vec::with_capacity(input.data.len());
        for s in 0..shape.batch_size() {
            let sample = &input.data[s * n..][..n];
            for j in 0..cols {
                for i in 0..rows {
                    data.push(sample[i * cols + j]);
                }
            }
        }
        Ok(CpuStorage { data })
    }

    fn batch_sum(input: &CpuStorage, shape: &Shape) -> Result<CpuStorage> {
        let n = shape.elems_per_sample();
        let mut data = vec![0.0f32; n];
        for s in 0..shape.batch_size() {
            for i in 0..n {
                data[i] += input.data[s * n + i];
            }
        }
        Ok(CpuStorage { data })
    }

    fn broadcast_batch(input: &CpuStorage, shape: &Shape, batch: usize) -> Result<CpuStorage> {
        debug_assert_eq!(shape.batch_size(), 1);
        let mut data = Vec::with_capacity(input.data.len() * batch);
        for _ in 0..batch {
            data.extend_from_slice(&input.data);
        }
        Ok(CpuStorage { data })
    }

    fn concat(
        inputs: &[(&CpuStorage, &Shape)],
        axis: usize,
        out_shape: &Shape,
    ) -> Result<CpuStorage> {
        let (pre, post) = pre_post(out_shape, axis);
        let mut data = Vec::with_capacity(out_shape.num_elements());
        for s in 0..out_shape.batch_size() {
            for p in 0..pre {
                for (storage, shape) in inputs {
                    let n = shape.elems_per_sample();
                    let chunk = shape.dim(axis) * post;
                    let base = sample_base(shape.batch_size(), n, s) + p * chunk;
                    data.extend_from_slice(&storage.data[base..base + chunk]);
                }
            }
        }
        Ok(CpuStorage { data })
    }

    fn slice(
        input: &CpuStorage,
        shape: &Shape,
        axis: usize,
        lower: usize,
        out_shape: &Shape,
    ) -> Result<CpuStorage> {
        let (pre, post) = pre_post(shape, axis);
        let in_axis = shape.dim(axis);
        let out_axis = out_shape.dim(axis);
        let n = shape.elems_per_sample();
        let mut data = Vec::with_capacity(out_shape.num_elements());
        for s in 0..shape.batch_size() {
            for p in 0..pre {
                let start = s * n + (p * in_axis + lower) * post;
                data.extend_from_slice(&input.data[start..start + out_axis * post]);
            }
        }
        Ok(CpuStorage { data })
    }

    fn embed(
        input: &CpuStorage,
        shape: &Shape,
        axis: usize,
        lower: usize,
        out_shape: &Shape,
    ) -> Result<CpuStorage> {
        let (pre, post) = pre_post(out_shape, axis);
        let in_axis = shape.dim(axis);
        let out_axis = out_shape.dim(axis);
        let n_in = shape.elems_per_sample();
        let n_out = out_shape.elems_per_sample();
        let mut data = vec![0.0f32; out_shape.num_elements()];
        for s in 0..shape.batch_size() {
            for p in 0..pre {
                let src = s * n_in + p * in_axis * post;
                let dst = s * n_out + (p * out_axis + lower) * post;
                data[dst..dst + in_axis * post]
                    .copy_from_slice(&input.data[src..src + in_axis * post]);
            }
        }
        Ok(CpuStorage { data })
    }
}
