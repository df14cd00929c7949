use ndarray::{array, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::activations::Activation;
use crate::layers::{DenseLayer, Parameterized};
use crate::optimizer::{GradientClipper, Optimizer, OptimizerKind, OptimizerWrapper};

/// Fit y = 2x0 - x1 + 0.5 with one linear unit and report the loss before and after.
fn fit(kind: OptimizerKind, learning_rate: f32, steps: usize) -> (f32, f32) {
    let mut rng = StdRng::seed_from_u64(13);
    let mut layer = DenseLayer::new(2, 1, Activation::Linear, &mut rng).unwrap();
    let mut optimizer = OptimizerWrapper::from_kind(kind);

    let x = array![[0.0f32, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [0.5, -0.5]];
    let y = x.map_axis(ndarray::Axis(1), |r| 2.0 * r[0] - r[1] + 0.5).insert_axis(ndarray::Axis(1));
    let n = x.nrows() as f32;

    let loss = |layer: &mut DenseLayer| {
        let pred = layer.forward_batch(x.view()).unwrap();
        (&pred - &y).mapv(|d| d * d).mean().unwrap()
    };
    let initial = loss(&mut layer);

    for _ in 0..steps {
        let pred = layer.forward_batch(x.view()).unwrap();
        let grad: Array2<f32> = (&pred - &y).mapv(|d| 2.0 * d / n);
        let g = layer.backward_batch(grad.view()).unwrap();
        let grads = vec![g.weights.into_dyn(), g.biases.into_dyn()];
        optimizer.step(layer.parameters_mut(), &grads, learning_rate).unwrap();
    }
    (initial, loss(&mut layer))
}

#[test]
fn test_sgd_fits_linear_target() {
    let (initial, trained) = fit(OptimizerKind::Sgd, 0.1, 500);
    assert!(trained < initial * 0.01, "loss {} -> {}", initial, trained);
}

#[test]
fn test_adam_fits_linear_target() {
    let (initial, trained) = fit(OptimizerKind::Adam, 0.02, 1000);
    assert!(trained < initial * 0.01, "loss {} -> {}", initial, trained);
}

#[test]
fn test_clipped_step_is_bounded() {
    let mut w = array![0.0f32, 0.0].into_dyn();
    let mut grads = vec![array![300.0f32, 400.0].into_dyn()];
    GradientClipper::from(Some(5.0)).clip(&mut grads);
    OptimizerWrapper::from_kind(OptimizerKind::Sgd)
        .step(vec![w.view_mut()], &grads, 1.0)
        .unwrap();
    assert!((w[[0]] + 3.0).abs() < 1e-5);
    assert!((w[[1]] + 4.0).abs() < 1e-5);
}

#[test]
fn test_no_clipping_by_default() {
    let mut grads = vec![array![300.0f32].into_dyn()];
    GradientClipper::from(None).clip(&mut grads);
    assert_eq!(grads[0][[0]], 300.0);
}
