use crate::backend::Backend;
use crate::error::Result;
use crate::shape::Shape;
use crate::tensor::Tensor;

// Initializers — strategies for filling a parameter's value
//
// Passed to `Parameter::reset_value`. Randomness goes through the backend's
// uniform kernel, so initializers stay generic over the device.

/// A strategy producing a freshly initialized value tensor for a shape.
pub trait Initializer<B: Backend> {
    /// Produce the initial value tensor.
    fn initialize(&self, shape: &Shape, device: &B::Device) -> Result<Tensor<B>>;
}

/// Fill every element with the same value.
pub struct Constant {
    value: f32,
}

impl Constant {
    pub fn new(value: f32) -> Self {
        Constant { value }
    }
}

impl<B: Backend> Initializer<B> for Constant {
    fn initialize(&self, shape: &Shape, device: &B::Device) -> Result<Tensor<B>> {
        Tensor::full(shape, self.value, device)
    }
}

/// Draw every element from `U(lower, upper)`.
pub struct Uniform {
    lower: f32,
    upper: f32,
}

impl Uniform {
    pub fn new(lower: f32, upper: f32) -> Self {
        Uniform { lower, upper }
    }
}

impl<B: Backend> Initializer<B> for Uniform {
    fn initialize(&self, shape: &Shape, device: &B::Device) -> Result<Tensor<B>> {
        Tensor::rand_uniform(shape, self.lower, self.upper, device)
    }
}

/// Glorot/Xavier uniform initialization:
/// `U(-b, b)` with `b = scale * sqrt(6 / (fan_in + fan_out))`.
pub struct XavierUniform {
    scale: f32,
}

impl XavierUniform {
    pub fn new(scale: f32) -> Self {
        XavierUniform { scale }
    }
}

impl Default for XavierUniform {
    fn default() -> Self {
        XavierUniform::new(1.0)
    }
}

/// Compute `(fan_in, fan_out)` from a shape.
///
/// For a weight matrix `[out, in]` acting on column vectors, fan_in is the
/// column count and fan_out the row count; 1-D and scalar shapes use the
/// same extent for both.
fn fans(shape: &Shape) -> (f32, f32) {
    match shape.depth() {
        0 => (1.0, 1.0),
        1 => (shape.dim(0) as f32, shape.dim(0) as f32),
        _ => {
            let receptive: usize = (2..shape.depth()).map(|axis| shape.dim(axis)).product();
            let fan_in = (shape.dim(1) * receptive) as f32;
            let fan_out = (shape.dim(0) * receptive) as f32;
            (fan_in, fan_out)
        }
    }
}

impl<B: Backend> Initializer<B> for XavierUniform {
    fn initialize(&self, shape: &Shape, device: &B::Device) -> Result<Tensor<B>> {
        let (fan_in, fan_out) = fans(shape);
        let bound = self.scale * (6.0 / (fan_in + fan_out)).sqrt();
        Tensor::rand_uniform(shape, -bound, bound, device)
    }
}
