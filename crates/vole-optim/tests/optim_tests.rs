// Optimizer tests — parameter updates driven by graph gradients

use approx::assert_relative_eq;
use vole_core::{Constant, Graph, Parameter, Shape, Tensor};
use vole_cpu::{CpuBackend, CpuDevice};
use vole_optim::{Adam, Optimizer, SGD};

type G = Graph<CpuBackend>;
type T = Tensor<CpuBackend>;

fn scalar_param(value: f32) -> vole_core::SharedParameter<CpuBackend> {
    let mut param = Parameter::<CpuBackend>::new((), &CpuDevice).unwrap();
    param.reset_value(&Constant::new(value)).unwrap();
    param.into_shared()
}

/// One define-by-run iteration of y = w^2: forward, backward, return the
/// loss value.
fn square_loss(shared: &vole_core::SharedParameter<CpuBackend>) -> f32 {
    let mut graph = G::new();
    let w = vole_ops::parameter(&mut graph, shared).unwrap();
    let y = vole_ops::square(&mut graph, w).unwrap();
    let loss = graph.forward(y).unwrap().to_scalar().unwrap();
    graph.backward(y).unwrap();
    loss
}

#[test]
fn test_sgd_single_step() {
    let shared = scalar_param(3.0);
    let mut sgd = SGD::new(vec![shared.clone()], 0.1);

    let loss = square_loss(&shared);
    assert_relative_eq!(loss, 9.0);
    sgd.step().unwrap();

    // w' = w - eta * dw = 3 - 0.1 * 6 = 2.4.
    let guard = shared.read().unwrap();
    assert_relative_eq!(guard.value().to_scalar().unwrap(), 2.4, epsilon = 1e-6);
}

#[test]
fn test_reset_gradients_clears_the_slate() {
    let shared = scalar_param(3.0);
    let mut sgd = SGD::new(vec![shared.clone()], 0.1);

    square_loss(&shared);
    assert_relative_eq!(
        shared.read().unwrap().gradient().to_scalar().unwrap(),
        6.0
    );
    sgd.reset_gradients().unwrap();
    assert_relative_eq!(
        shared.read().unwrap().gradient().to_scalar().unwrap(),
        0.0
    );
}

#[test]
fn test_sgd_descends_a_quadratic() {
    let shared = scalar_param(3.0);
    let mut sgd = SGD::new(vec![shared.clone()], 0.1);

    let mut last = f32::INFINITY;
    for _ in 0..10 {
        sgd.reset_gradients().unwrap();
        let loss = square_loss(&shared);
        assert!(loss < last);
        last = loss;
        sgd.step().unwrap();
    }
    // w shrinks by a factor 0.8 per step: 3 * 0.8^10.
    let w = shared.read().unwrap().value().to_scalar().unwrap();
    assert_relative_eq!(w, 3.0 * 0.8f32.powi(10), epsilon = 1e-4);
}

#[test]
fn test_adam_single_step_moves_by_alpha() {
    let shared = scalar_param(3.0);
    let mut adam = Adam::new(vec![shared.clone()], 0.001, 0.9, 0.999, 1e-8).unwrap();

    square_loss(&shared);
    adam.step().unwrap();
    assert_eq!(adam.epoch(), 1);

    // With bias correction, the first step moves by almost exactly alpha.
    let w = shared.read().unwrap().value().to_scalar().unwrap();
    assert_relative_eq!(w, 3.0 - 0.001, epsilon = 1e-5);
}

#[test]
fn test_adam_descends_a_quadratic() {
    let shared = scalar_param(1.0);
    let mut adam = Adam::with_defaults(vec![shared.clone()]).unwrap();

    let first = square_loss(&shared);
    adam.step().unwrap();
    for _ in 0..50 {
        adam.reset_gradients().unwrap();
        square_loss(&shared);
        adam.step().unwrap();
    }
    adam.reset_gradients().unwrap();
    let last = square_loss(&shared);
    assert!(last < first);
}

#[test]
fn test_sgd_fits_a_line_through_batched_data() {
    // Fit y = 2x with a single scalar weight over a batch of four samples:
    // loss = sum_s (w x_s - 2 x_s)^2.
    let shared = scalar_param(0.0);
    let mut sgd = SGD::new(vec![shared.clone()], 0.01);
    let xs = [1.0f32, 2.0, 3.0, 4.0];
    let ts: Vec<f32> = xs.iter().map(|x| 2.0 * x).collect();

    let mut last = f32::INFINITY;
    for _ in 0..10 {
        sgd.reset_gradients().unwrap();
        let mut graph = G::new();
        let x = vole_ops::input(
            &mut graph,
            T::from_vec(&xs, Shape::with_batch(vec![], 4).unwrap(), &CpuDevice).unwrap(),
        )
        .unwrap();
        let t = vole_ops::input(
            &mut graph,
            T::from_vec(&ts, Shape::with_batch(vec![], 4).unwrap(), &CpuDevice).unwrap(),
        )
        .unwrap();
        let w = vole_ops::parameter(&mut graph, &shared).unwrap();
        let pred = vole_ops::multiply(&mut graph, x, w).unwrap();
        let err = vole_ops::subtract(&mut graph, pred, t).unwrap();
        let sq = vole_ops::square(&mut graph, err).unwrap();
        let loss = vole_ops::batch_sum(&mut graph, sq).unwrap();

        let value = graph.forward(loss).unwrap().to_scalar().unwrap();
        assert!(value <= last);
        last = value;
        graph.backward(loss).unwrap();
        sgd.step().unwrap();
    }

    let w = shared.read().unwrap().value().to_scalar().unwrap();
    assert_relative_eq!(w, 2.0, epsilon = 1e-2);
}
