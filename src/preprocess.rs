//! Observation preprocessing.
//!
//! Images are optionally collapsed to one channel by averaging, then rescaled per image
//! so that its brightest pixel maps to `1` and black maps to `-1`. The scale therefore
//! depends on each image's own maximum, not on a fixed pixel range.

use ndarray::{Array3, ArrayView3, Axis};

use crate::error::{DdpgError, Result};

/// `[H, W, C]` pixels to a `[H, W, 1]` (greyscale) or `[H, W, C]` array in `[-1, 1]`
pub fn preprocess(image: ArrayView3<f32>, greyscale: bool) -> Result<Array3<f32>> {
    let (h, w, c) = image.dim();
    if h == 0 || w == 0 || c == 0 {
        return Err(DdpgError::dimension_mismatch(
            "non-empty [H, W, C] image".to_string(),
            format!("{:?}", image.shape()),
        ));
    }

    if let Some(&p) = image.iter().find(|p| !p.is_finite() || **p < 0.0) {
        return Err(DdpgError::NumericalError(format!(
            "pixel values must be finite and non-negative, found {}",
            p
        )));
    }

    let mut out = if greyscale {
        image
            .mean_axis(Axis(2))
            .map(|m| m.insert_axis(Axis(2)))
            .ok_or_else(|| DdpgError::NumericalError("empty channel axis".to_string()))?
    } else {
        image.to_owned()
    };

    let scale = out.fold(0.0f32, |m, &p| m.max(p));
    if scale <= 0.0 {
        return Err(DdpgError::NumericalError(
            "cannot normalise an all-black image".to_string(),
        ));
    }
    out.mapv_inplace(|p| (p / scale) * 2.0 - 1.0);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_extremes_map_to_unit_bounds() {
        let image = Array3::from_shape_vec((1, 3, 1), vec![0.0, 127.5, 255.0]).unwrap();
        let out = preprocess(image.view(), false).unwrap();
        assert_eq!(out, Array3::from_shape_vec((1, 3, 1), vec![-1.0, 0.0, 1.0]).unwrap());
    }

    #[test]
    fn test_greyscale_averages_channels() {
        let image = array![[[30.0, 60.0, 90.0], [0.0, 0.0, 0.0]]];
        let out = preprocess(image.view(), true).unwrap();
        assert_eq!(out.dim(), (1, 2, 1));
        assert_eq!(out[[0, 0, 0]], 1.0);
        assert_eq!(out[[0, 1, 0]], -1.0);
    }

    #[test]
    fn test_colour_kept_without_greyscale() {
        let image = Array3::from_elem((4, 4, 3), 2.0);
        let out = preprocess(image.view(), false).unwrap();
        assert_eq!(out.dim(), (4, 4, 3));
        assert!(out.iter().all(|&p| p == 1.0));
    }

    #[test]
    fn test_brightness_offset_changes_normalisation() {
        let dim = preprocess(array![[[10.0], [20.0]]].view(), false).unwrap();
        let bright = preprocess(array![[[60.0], [70.0]]].view(), false).unwrap();
        assert!(dim[[0, 0, 0]].abs() < 1e-6);
        assert!((bright[[0, 0, 0]] - 5.0 / 7.0).abs() < 1e-6);
        assert_eq!(dim[[1, 0, 0]], 1.0);
        assert_eq!(bright[[1, 0, 0]], 1.0);
        assert_ne!(dim, bright);
    }

    #[test]
    fn test_uniform_scaling_is_invariant() {
        let image = array![[[10.0, 40.0], [20.0, 5.0]]];
        let out = preprocess(image.view(), false).unwrap();
        let scaled = preprocess(image.mapv(|p| p * 3.0).view(), false).unwrap();
        for (a, b) in out.iter().zip(scaled.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_invalid_pixels() {
        let black = Array3::<f32>::zeros((2, 2, 1));
        assert!(matches!(preprocess(black.view(), true), Err(DdpgError::NumericalError(_))));

        let negative = array![[[1.0], [-1.0]]];
        assert!(preprocess(negative.view(), false).is_err());

        let nan = array![[[1.0], [f32::NAN]]];
        assert!(preprocess(nan.view(), false).is_err());
    }
}
