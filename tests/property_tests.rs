#[cfg(test)]
mod property_tests {
    use ndarray::{Array1, Array3};
    use proptest::prelude::*;
    use vision_ddpg::preprocess::preprocess;
    use vision_ddpg::replay_buffer::{ReplayBuffer, Transition};
    use vision_ddpg::types::{ActionDecoder, ActionSpace, IdentityDecoder};

    // Strategy for small non-negative images with at least one lit pixel
    fn image_strategy() -> impl Strategy<Value = Array3<f32>> {
        (1usize..6, 1usize..6, 1usize..4).prop_flat_map(|(h, w, c)| {
            prop::collection::vec(0.0f32..1000.0, h * w * c).prop_map(move |mut v| {
                v[0] += 1.0;
                Array3::from_shape_vec((h, w, c), v).unwrap()
            })
        })
    }

    // Strategy for ordered bounds plus an arbitrary finite action of the same length
    fn bounds_and_action() -> impl Strategy<Value = (Vec<f32>, Vec<f32>, Vec<f32>)> {
        (1usize..6).prop_flat_map(|n| {
            (
                prop::collection::vec((-10.0f32..10.0, 0.0f32..5.0), n),
                prop::collection::vec(-1e6f32..1e6, n),
            )
                .prop_map(|(bounds, action)| {
                    let low: Vec<f32> = bounds.iter().map(|(l, _)| *l).collect();
                    let high: Vec<f32> = bounds.iter().map(|(l, w)| l + w).collect();
                    (low, high, action)
                })
        })
    }

    proptest! {
        #[test]
        fn test_preprocess_range(image in image_strategy(), greyscale in any::<bool>()) {
            let out = preprocess(image.view(), greyscale).unwrap();
            prop_assert!(out.iter().all(|&p| (-1.0..=1.0).contains(&p)));
            let max = out.fold(f32::NEG_INFINITY, |m, &p| m.max(p));
            prop_assert!((max - 1.0).abs() < 1e-6);
            if greyscale {
                prop_assert_eq!(out.shape()[2], 1);
            } else {
                prop_assert_eq!(out.shape(), image.shape());
            }
        }

        #[test]
        fn test_clip_respects_bounds((low, high, action) in bounds_and_action()) {
            let space = ActionSpace::from_vecs(low, high).unwrap();
            let action = Array1::from_vec(action);
            let clipped = space.clip(action.view()).unwrap();
            prop_assert!(space.contains(clipped.view()));
            if space.contains(action.view()) {
                prop_assert_eq!(clipped, action);
            }
        }

        #[test]
        fn test_identity_decoder_passthrough(values in prop::collection::vec(0.0f32..1.0, 1..8)) {
            let decoder = IdentityDecoder::new(values.len());
            let raw = Array1::from_vec(values);
            prop_assert_eq!(decoder.decode(raw.view()).unwrap(), raw);
        }

        #[test]
        fn test_buffer_len_saturates(capacity in 1usize..20, writes in 0usize..60) {
            let mut buffer = ReplayBuffer::new(capacity).unwrap();
            for i in 0..writes {
                buffer.add(Transition {
                    state: Array3::zeros((1, 1, 1)),
                    action: Array1::from_elem(1, i as f32),
                    reward: i as f32,
                    next_state: Array3::zeros((1, 1, 1)),
                    done: false,
                });
            }
            prop_assert_eq!(buffer.len(), writes.min(capacity));
            let oldest_kept = writes.saturating_sub(capacity) as f32;
            prop_assert!(buffer.iter().all(|t| t.reward >= oldest_kept));
        }
    }
}
