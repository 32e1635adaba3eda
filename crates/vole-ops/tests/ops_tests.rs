// Operation tests — forward values and backward gradients against closed
// forms

use approx::assert_relative_eq;
use vole_core::{Constant, Graph, Node, Parameter, Shape, Tensor};
use vole_cpu::{CpuBackend, CpuDevice};

type G = Graph<CpuBackend>;
type T = Tensor<CpuBackend>;

fn input_vec(graph: &mut G, data: &[f32], shape: impl Into<Shape>) -> Node {
    let tensor = T::from_vec(data, shape, &CpuDevice).unwrap();
    vole_ops::input(graph, tensor).unwrap()
}

fn grad_of(graph: &G, node: Node) -> Vec<f32> {
    graph.gradient(node).unwrap().unwrap().to_vec().unwrap()
}

// Elementwise binaries

#[test]
fn test_add_sub_forward_backward() {
    let mut graph = G::new();
    let a = input_vec(&mut graph, &[1.0, 2.0], 2usize);
    let b = input_vec(&mut graph, &[10.0, 20.0], 2usize);
    let s = vole_ops::add(&mut graph, a, b).unwrap();
    let d = vole_ops::subtract(&mut graph, s, b).unwrap();

    assert_eq!(graph.forward(d).unwrap().to_vec().unwrap(), vec![1.0, 2.0]);
    graph.backward(d).unwrap();
    assert_eq!(grad_of(&graph, a), vec![1.0, 1.0]);
    // b contributes +1 through s and -1 directly: net zero.
    assert_eq!(grad_of(&graph, b), vec![0.0, 0.0]);
}

#[test]
fn test_multiply_backward_swaps_operands() {
    let mut graph = G::new();
    let a = input_vec(&mut graph, &[2.0, 3.0], 2usize);
    let b = input_vec(&mut graph, &[5.0, 7.0], 2usize);
    let p = vole_ops::multiply(&mut graph, a, b).unwrap();

    assert_eq!(graph.forward(p).unwrap().to_vec().unwrap(), vec![10.0, 21.0]);
    graph.backward(p).unwrap();
    assert_eq!(grad_of(&graph, a), vec![5.0, 7.0]);
    assert_eq!(grad_of(&graph, b), vec![2.0, 3.0]);
}

#[test]
fn test_multiply_with_duplicate_operand() {
    // y = x * x: both contributions land in the same operand.
    let mut graph = G::new();
    let x = input_vec(&mut graph, &[3.0], ());
    let y = vole_ops::multiply(&mut graph, x, x).unwrap();

    assert_relative_eq!(graph.forward(y).unwrap().to_scalar().unwrap(), 9.0);
    graph.backward(y).unwrap();
    assert_relative_eq!(grad_of(&graph, x)[0], 6.0);
}

#[test]
fn test_divide_backward() {
    let mut graph = G::new();
    let a = input_vec(&mut graph, &[4.0], ());
    let b = input_vec(&mut graph, &[2.0], ());
    let q = vole_ops::divide(&mut graph, a, b).unwrap();

    assert_relative_eq!(graph.forward(q).unwrap().to_scalar().unwrap(), 2.0);
    graph.backward(q).unwrap();
    // d(a/b)/da = 1/b; d(a/b)/db = -a/b^2.
    assert_relative_eq!(grad_of(&graph, a)[0], 0.5);
    assert_relative_eq!(grad_of(&graph, b)[0], -1.0);
}

#[test]
fn test_const_variants() {
    let mut graph = G::new();
    let x = input_vec(&mut graph, &[1.5], ());
    let y = vole_ops::add_const(&mut graph, x, 2.0).unwrap();
    let z = vole_ops::multiply_const(&mut graph, y, 3.0).unwrap();

    assert_relative_eq!(graph.forward(z).unwrap().to_scalar().unwrap(), 10.5);
    graph.backward(z).unwrap();
    assert_relative_eq!(grad_of(&graph, y)[0], 3.0);
    assert_relative_eq!(grad_of(&graph, x)[0], 3.0);
}

// Elementwise unaries

#[test]
fn test_negate_backward() {
    let mut graph = G::new();
    let x = input_vec(&mut graph, &[2.0, -3.0], 2usize);
    let y = vole_ops::negate(&mut graph, x).unwrap();

    assert_eq!(graph.forward(y).unwrap().to_vec().unwrap(), vec![-2.0, 3.0]);
    graph.backward(y).unwrap();
    assert_eq!(grad_of(&graph, x), vec![-1.0, -1.0]);
}

#[test]
fn test_exp_backward_uses_value() {
    let mut graph = G::new();
    let x = input_vec(&mut graph, &[0.5], ());
    let y = vole_ops::exp(&mut graph, x).unwrap();

    let value = graph.forward(y).unwrap().to_scalar().unwrap();
    assert_relative_eq!(value, 0.5f32.exp(), epsilon = 1e-6);
    graph.backward(y).unwrap();
    assert_relative_eq!(grad_of(&graph, x)[0], value, epsilon = 1e-6);
}

#[test]
fn test_sqrt_backward() {
    let mut graph = G::new();
    let x = input_vec(&mut graph, &[9.0], ());
    let y = vole_ops::sqrt(&mut graph, x).unwrap();

    assert_relative_eq!(graph.forward(y).unwrap().to_scalar().unwrap(), 3.0);
    graph.backward(y).unwrap();
    // d(sqrt x)/dx = 1/(2 sqrt x) = 1/6.
    assert_relative_eq!(grad_of(&graph, x)[0], 1.0 / 6.0, epsilon = 1e-6);
}

#[test]
fn test_tanh_backward() {
    let mut graph = G::new();
    let x = input_vec(&mut graph, &[0.7], ());
    let y = vole_ops::tanh(&mut graph, x).unwrap();

    let t = graph.forward(y).unwrap().to_scalar().unwrap();
    assert_relative_eq!(t, 0.7f32.tanh(), epsilon = 1e-6);
    graph.backward(y).unwrap();
    assert_relative_eq!(grad_of(&graph, x)[0], 1.0 - t * t, epsilon = 1e-6);
}

#[test]
fn test_sigmoid_backward() {
    let mut graph = G::new();
    let x = input_vec(&mut graph, &[-0.3], ());
    let y = vole_ops::sigmoid(&mut graph, x).unwrap();

    let s = graph.forward(y).unwrap().to_scalar().unwrap();
    assert_relative_eq!(s, 1.0 / (1.0 + 0.3f32.exp()), epsilon = 1e-6);
    graph.backward(y).unwrap();
    assert_relative_eq!(grad_of(&graph, x)[0], s * (1.0 - s), epsilon = 1e-6);
}

#[test]
fn test_relu_backward_masks_negative_inputs() {
    let mut graph = G::new();
    let x = input_vec(&mut graph, &[-1.0, 0.0, 2.0], 3usize);
    let y = vole_ops::relu(&mut graph, x).unwrap();

    assert_eq!(
        graph.forward(y).unwrap().to_vec().unwrap(),
        vec![0.0, 0.0, 2.0]
    );
    graph.backward(y).unwrap();
    assert_eq!(grad_of(&graph, x), vec![0.0, 0.0, 1.0]);
}

// Matrix operations

#[test]
fn test_matmul_forward_backward() {
    let mut graph = G::new();
    let a = input_vec(&mut graph, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], (2, 3));
    let b = input_vec(&mut graph, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], (3, 2));
    let c = vole_ops::matmul(&mut graph, a, b).unwrap();

    assert_eq!(
        graph.forward(c).unwrap().to_vec().unwrap(),
        vec![22.0, 28.0, 49.0, 64.0]
    );
    graph.backward(c).unwrap();
    // With G = ones(2x2): dA = G @ B^T (row sums of B per column),
    // dB = A^T @ G (column sums of A per row).
    assert_eq!(grad_of(&graph, a), vec![3.0, 7.0, 11.0, 3.0, 7.0, 11.0]);
    assert_eq!(grad_of(&graph, b), vec![5.0, 5.0, 7.0, 7.0, 9.0, 9.0]);
}

#[test]
fn test_matmul_batched_weight_gradient_is_reduced() {
    // Single-sample weight applied to a batch of two vectors: the weight's
    // gradient sums over the batch.
    let mut graph = G::new();
    let w = input_vec(&mut graph, &[1.0, 0.0, 0.0, 1.0], (2, 2));
    let x = vole_ops::input(
        &mut graph,
        T::from_vec(
            &[1.0, 2.0, 3.0, 4.0],
            Shape::with_batch(vec![2], 2).unwrap(),
            &CpuDevice,
        )
        .unwrap(),
    )
    .unwrap();
    let y = vole_ops::matmul(&mut graph, w, x).unwrap();

    graph.forward(y).unwrap();
    graph.backward(y).unwrap();

    let dw = graph.gradient(w).unwrap().unwrap();
    assert_eq!(dw.shape().batch_size(), 1);
    // dW = sum over samples of ones(2x1) @ x_s^T = [[x0+x0', x1+x1'] twice].
    assert_eq!(dw.to_vec().unwrap(), vec![4.0, 6.0, 4.0, 6.0]);
    let dx = grad_of(&graph, x);
    // dX_s = W^T @ ones = [1, 1] for each sample.
    assert_eq!(dx, vec![1.0, 1.0, 1.0, 1.0]);
}

#[test]
fn test_transpose_backward() {
    let mut graph = G::new();
    let x = input_vec(&mut graph, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], (2, 3));
    let y = vole_ops::transpose(&mut graph, x).unwrap();

    assert_eq!(
        graph.forward(y).unwrap().to_vec().unwrap(),
        vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]
    );
    assert_eq!(graph.shape(y).unwrap().dims(), &[3, 2]);
    graph.backward(y).unwrap();
    assert_eq!(grad_of(&graph, x), vec![1.0; 6]);
}

// Axis-varying operations

#[test]
fn test_concat_forward_backward() {
    let mut graph = G::new();
    let a = input_vec(&mut graph, &[1.0, 2.0], 2usize);
    let b = input_vec(&mut graph, &[3.0, 4.0, 5.0], 3usize);
    let c = vole_ops::concat(&mut graph, &[a, b], 0).unwrap();

    assert_eq!(graph.shape(c).unwrap().dims(), &[5]);
    assert_eq!(
        graph.forward(c).unwrap().to_vec().unwrap(),
        vec![1.0, 2.0, 3.0, 4.0, 5.0]
    );
    // Scale so each operand's window receives a recognizable gradient.
    let mut graph = G::new();
    let a = input_vec(&mut graph, &[1.0, 2.0], 2usize);
    let b = input_vec(&mut graph, &[3.0, 4.0, 5.0], 3usize);
    let c = vole_ops::concat(&mut graph, &[a, b], 0).unwrap();
    let d = vole_ops::multiply_const(&mut graph, c, 2.0).unwrap();
    graph.forward(d).unwrap();
    graph.backward(d).unwrap();
    assert_eq!(grad_of(&graph, a), vec![2.0, 2.0]);
    assert_eq!(grad_of(&graph, b), vec![2.0, 2.0, 2.0]);
}

#[test]
fn test_slice_backward_embeds_gradient() {
    let mut graph = G::new();
    let x = input_vec(&mut graph, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 6usize);
    let y = vole_ops::slice(&mut graph, x, 0, 1, 4).unwrap();

    assert_eq!(
        graph.forward(y).unwrap().to_vec().unwrap(),
        vec![2.0, 3.0, 4.0]
    );
    graph.backward(y).unwrap();
    assert_eq!(grad_of(&graph, x), vec![0.0, 1.0, 1.0, 1.0, 0.0, 0.0]);
}

#[test]
fn test_slice_out_of_bounds_is_rejected() {
    let mut graph = G::new();
    let x = input_vec(&mut graph, &[1.0, 2.0, 3.0], 3usize);
    assert!(vole_ops::slice(&mut graph, x, 0, 2, 5).is_err());
    assert!(vole_ops::slice(&mut graph, x, 0, 2, 2).is_err());
    assert_eq!(graph.len(), 1);
}

// Batch operations

#[test]
fn test_batch_sum_forward_backward() {
    let mut graph = G::new();
    let x = vole_ops::input(
        &mut graph,
        T::from_vec(
            &[1.0, 2.0, 3.0, 4.0],
            Shape::with_batch(vec![2], 2).unwrap(),
            &CpuDevice,
        )
        .unwrap(),
    )
    .unwrap();
    let y = vole_ops::batch_sum(&mut graph, x).unwrap();

    assert_eq!(graph.shape(y).unwrap().batch_size(), 1);
    assert_eq!(graph.forward(y).unwrap().to_vec().unwrap(), vec![4.0, 6.0]);
    graph.backward(y).unwrap();
    let dx = graph.gradient(x).unwrap().unwrap();
    assert_eq!(dx.shape().batch_size(), 2);
    assert_eq!(dx.to_vec().unwrap(), vec![1.0; 4]);
}

// Parameters

#[test]
fn test_parameter_input_exports_gradient() {
    let mut param = Parameter::<CpuBackend>::new(2usize, &CpuDevice).unwrap();
    param.reset_value(&Constant::new(3.0)).unwrap();
    let shared = param.into_shared();

    let mut graph = G::new();
    let p = vole_ops::parameter(&mut graph, &shared).unwrap();
    let y = vole_ops::square(&mut graph, p).unwrap();

    assert_eq!(graph.forward(y).unwrap().to_vec().unwrap(), vec![9.0, 9.0]);
    graph.backward(y).unwrap();

    // The leaf exported d(y)/dp = 2p into the parameter.
    let guard = shared.read().unwrap();
    assert_eq!(guard.gradient().to_vec().unwrap(), vec![6.0, 6.0]);
}

#[test]
fn test_parameter_gradient_accumulates_across_graphs() {
    let shared = {
        let mut param = Parameter::<CpuBackend>::new((), &CpuDevice).unwrap();
        param.reset_value(&Constant::new(2.0)).unwrap();
        param.into_shared()
    };

    for _ in 0..2 {
        let mut graph = G::new();
        let p = vole_ops::parameter(&mut graph, &shared).unwrap();
        let y = vole_ops::square(&mut graph, p).unwrap();
        graph.forward(y).unwrap();
        graph.backward(y).unwrap();
    }

    // Two backward passes, each contributing 2p = 4.
    let guard = shared.read().unwrap();
    assert_relative_eq!(guard.gradient().to_scalar().unwrap(), 8.0);
}

#[test]
fn test_parameter_receives_batch_reduced_gradient() {
    let shared = {
        let mut param = Parameter::<CpuBackend>::new((), &CpuDevice).unwrap();
        param.reset_value(&Constant::new(1.0)).unwrap();
        param.into_shared()
    };

    let mut graph = G::new();
    let p = vole_ops::parameter(&mut graph, &shared).unwrap();
    let x = vole_ops::input(
        &mut graph,
        T::from_vec(
            &[1.0, 2.0, 3.0],
            Shape::with_batch(vec![], 3).unwrap(),
            &CpuDevice,
        )
        .unwrap(),
    )
    .unwrap();
    let y = vole_ops::multiply(&mut graph, x, p).unwrap();

    graph.forward(y).unwrap();
    graph.backward(y).unwrap();

    // dp = sum over the batch of x = 6, reduced to the parameter's sample.
    let guard = shared.read().unwrap();
    assert_relative_eq!(guard.gradient().to_scalar().unwrap(), 6.0);
}
