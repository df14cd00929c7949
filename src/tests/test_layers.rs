use ndarray::{array, Array2, Array4};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::activations::Activation;
use crate::layers::{AvgPool2DLayer, Conv2DLayer, DenseLayer, MaxPool2DLayer, Parameterized, WeightInit};

#[test]
fn test_conv_pool_chain_shapes() {
    let mut rng = StdRng::seed_from_u64(0);
    let mut conv = Conv2DLayer::new(1, 4, (3, 3), (1, 1), false, Activation::Relu, &mut rng).unwrap();
    let mut max_pool = MaxPool2DLayer::new((2, 2), None);
    let mut avg_pool = AvgPool2DLayer::new((2, 2), None);

    let input = Array4::from_shape_fn((2, 1, 10, 10), |(b, _, i, j)| (b + i + j) as f32 * 0.1);
    let x = conv.forward_batch(input.view()).unwrap();
    assert_eq!(x.dim(), (2, 4, 8, 8));
    let x = max_pool.forward_batch(x.view()).unwrap();
    assert_eq!(x.dim(), (2, 4, 4, 4));
    let x = avg_pool.forward_batch(x.view()).unwrap();
    assert_eq!(x.dim(), (2, 4, 2, 2));

    let grad = avg_pool.backward_batch(Array4::ones(x.raw_dim()).view()).unwrap();
    let grad = max_pool.backward_batch(grad.view()).unwrap();
    let grads = conv.backward_batch(grad.view()).unwrap();
    assert_eq!(grads.input.dim(), (2, 1, 10, 10));
    assert_eq!(grads.kernels.dim(), (4, 1, 3, 3));
    assert!(grads.biases.is_none());
}

#[test]
fn test_backward_before_forward_fails() {
    let mut rng = StdRng::seed_from_u64(0);
    let dense = DenseLayer::new(2, 2, Activation::Linear, &mut rng).unwrap();
    assert!(dense.backward_batch(Array2::ones((1, 2)).view()).is_err());

    let conv = Conv2DLayer::new(1, 1, (3, 3), (1, 1), true, Activation::Linear, &mut rng).unwrap();
    assert!(conv.backward_batch(Array4::ones((1, 1, 2, 2)).view()).is_err());

    let pool = MaxPool2DLayer::new((2, 2), None);
    assert!(pool.backward_batch(Array4::ones((1, 1, 1, 1)).view()).is_err());
}

#[test]
fn test_sigmoid_dense_gradient_check() {
    let mut rng = StdRng::seed_from_u64(21);
    let mut dense = DenseLayer::new(3, 2, Activation::Sigmoid, &mut rng).unwrap();
    let x = array![[0.2f32, -0.4, 0.9]];

    dense.forward_batch(x.view()).unwrap();
    let grads = dense.backward_batch(array![[1.0f32, 1.0]].view()).unwrap();

    let eps = 1e-3;
    for i in 0..3 {
        for j in 0..2 {
            let original = dense.weights[[i, j]];
            dense.weights[[i, j]] = original + eps;
            let plus = dense.forward_batch(x.view()).unwrap().sum();
            dense.weights[[i, j]] = original - eps;
            let minus = dense.forward_batch(x.view()).unwrap().sum();
            dense.weights[[i, j]] = original;
            let numeric = (plus - minus) / (2.0 * eps);
            assert!((numeric - grads.weights[[i, j]]).abs() < 1e-3);
        }
    }
}

#[test]
fn test_soft_update_on_layer() {
    let mut rng = StdRng::seed_from_u64(2);
    let source = DenseLayer::with_init(2, 2, Activation::Linear, WeightInit::Uniform { min: 1.0, max: 1.0001 }, &mut rng).unwrap();
    let mut target = DenseLayer::with_init(2, 2, Activation::Linear, WeightInit::Zeros, &mut rng).unwrap();

    target.soft_update_from(&source, 0.5).unwrap();
    assert!(target.weights.iter().all(|&w| (w - 0.5).abs() < 1e-3));

    target.soft_update_from(&source, 1.0).unwrap();
    assert_eq!(target.get_weights(), source.get_weights());
}

#[test]
fn test_set_weights_rejects_wrong_layout() {
    let mut rng = StdRng::seed_from_u64(2);
    let mut dense = DenseLayer::new(2, 3, Activation::Relu, &mut rng).unwrap();
    let wrong = vec![Array2::<f32>::zeros((3, 2)).into_dyn(), array![0.0f32, 0.0, 0.0].into_dyn()];
    assert!(dense.set_weights(&wrong).is_err());
    assert!(dense.set_weights(&wrong[..1]).is_err());
}
