use vole_core::backend::Backend;
use vole_core::error::Result;
use vole_core::op::{check_arity, Op};
use vole_core::shape::Shape;
use vole_core::tensor::Tensor;

// Elementwise unary operations
//
// All of these preserve the operand's shape (batch included), so their
// backward contributions never need batch reduction. Where the derivative
// can be written in terms of the node's own value (Exp, Tanh, Sigmoid,
// Sqrt), backward uses the memoized value instead of recomputing from the
// operand.

fn unary_shape(op: &str, args: &[&Shape]) -> Result<Shape> {
    check_arity(op, 1, args.len())?;
    Ok(args[0].clone())
}

/// Elementwise `-x`.
pub struct Negate;

impl<B: Backend> Op<B> for Negate {
    fn name(&self) -> String {
        "Negate".to_string()
    }

    fn infer_shape(&self, args: &[&Shape]) -> Result<Shape> {
        unary_shape("Negate", args)
    }

    fn forward(&self, args: &[&Tensor<B>]) -> Result<Tensor<B>> {
        args[0].neg()
    }

    fn backward(
        &self,
        _value: &Tensor<B>,
        grad: &Tensor<B>,
        _args: &[&Tensor<B>],
    ) -> Result<Vec<Tensor<B>>> {
        Ok(vec![grad.neg()?])
    }
}

/// Elementwise `e^x`.
pub struct Exp;

impl<B: Backend> Op<B> for Exp {
    fn name(&self) -> String {
        "Exp".to_string()
    }

    fn infer_shape(&self, args: &[&Shape]) -> Result<Shape> {
        unary_shape("Exp", args)
    }

    fn forward(&self, args: &[&Tensor<B>]) -> Result<Tensor<B>> {
        args[0].exp()
    }

    fn backward(
        &self,
        value: &Tensor<B>,
        grad: &Tensor<B>,
        _args: &[&Tensor<B>],
    ) -> Result<Vec<Tensor<B>>> {
        // d(e^x)/dx = e^x = the node's own value.
        Ok(vec![grad.mul(value)?])
    }
}

/// Elementwise square root.
pub struct Sqrt;

impl<B: Backend> Op<B> for Sqrt {
    fn name(&self) -> String {
        "Sqrt".to_string()
    }

    fn infer_shape(&self, args: &[&Shape]) -> Result<Shape> {
        unary_shape("Sqrt", args)
    }

    fn forward(&self, args: &[&Tensor<B>]) -> Result<Tensor<B>> {
        args[0].sqrt()
    }

    fn backward(
        &self,
        value: &Tensor<B>,
        grad: &Tensor<B>,
        _args: &[&Tensor<B>],
    ) -> Result<Vec<Tensor<B>>> {
        // d(sqrt(x))/dx = 1 / (2 sqrt(x)).
        Ok(vec![grad.div(value)?.affine(0.5, 0.0)?])
    }
}

/// Elementwise `x^2`.
pub struct Square;

impl<B: Backend> Op<B> for Square {
    fn name(&self) -> String {
        "Square".to_string()
    }

    fn infer_shape(&self, args: &[&Shape]) -> Result<Shape> {
        unary_shape("Square", args)
    }

    fn forward(&self, args: &[&Tensor<B>]) -> Result<Tensor<B>> {
        args[0].square()
    }

    fn backward(
        &self,
        _value: &Tensor<B>,
        grad: &Tensor<B>,
        args: &[&Tensor<B>],
    ) -> Result<Vec<Tensor<B>>> {
        // d(x^2)/dx = 2x.
        Ok(vec![grad.mul(args[0])?.affine(2.0, 0.0)?])
    }
}

/// Elementwise hyperbolic tangent.
pub struct Tanh;

impl<B: Backend> Op<B> for Tanh {
    fn name(&self) -> String {
        "Tanh".to_string()
    }

    fn infer_shape(&self, args: &[&Shape]) -> Result<Shape> {
        unary_shape("Tanh", args)
    }

    fn forward(&self, args: &[&Tensor<B>]) -> Result<Tensor<B>> {
        args[0].tanh()
    }

    fn backward(
        &self,
        value: &Tensor<B>,
        grad: &Tensor<B>,
        _args: &[&Tensor<B>],
    ) -> Result<Vec<Tensor<B>>> {
        // d(tanh x)/dx = 1 - tanh^2 x.
        let one_minus_y2 = value.square()?.affine(-1.0, 1.0)?;
        Ok(vec![grad.mul(&one_minus_y2)?])
    }
}

/// Elementwise logistic sigmoid.
pub struct Sigmoid;

impl<B: Backend> Op<B> for Sigmoid {
    fn name(&self) -> String {
        "Sigmoid".to_string()
    }

    fn infer_shape(&self, args: &[&Shape]) -> Result<Shape> {
        unary_shape("Sigmoid", args)
    }

    fn forward(&self, args: &[&Tensor<B>]) -> Result<Tensor<B>> {
        args[0].sigmoid()
    }

    fn backward(
        &self,
        value: &Tensor<B>,
        grad: &Tensor<B>,
        _args: &[&Tensor<B>],
    ) -> Result<Vec<Tensor<B>>> {
        // d(sigma x)/dx = sigma(x) (1 - sigma(x)).
        let one_minus_y = value.affine(-1.0, 1.0)?;
        Ok(vec![grad.mul(value)?.mul(&one_minus_y)?])
    }
}

/// Elementwise `max(x, 0)`.
pub struct Relu;

impl<B: Backend> Op<B> for Relu {
    fn name(&self) -> String {
        "Relu".to_string()
    }

    fn infer_shape(&self, args: &[&Shape]) -> Result<Shape> {
        unary_shape("Relu", args)
    }

    fn forward(&self, args: &[&Tensor<B>]) -> Result<Tensor<B>> {
        args[0].relu()
    }

    fn backward(
        &self,
        _value: &Tensor<B>,
        grad: &Tensor<B>,
        args: &[&Tensor<B>],
    ) -> Result<Vec<Tensor<B>>> {
        // Gradient passes where the input was positive, 0 elsewhere.
        let xs = args[0].to_vec()?;
        let gs = grad.to_vec()?;
        let data: Vec<f32> = xs
            .iter()
            .zip(&gs)
            .map(|(&x, &g)| if x > 0.0 { g } else { 0.0 })
            .collect();
        Ok(vec![Tensor::from_vec(
            &data,
            grad.shape().clone(),
            grad.device(),
        )?])
    }
}
