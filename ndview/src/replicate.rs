/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Replicating a tensor's elements.
//!
//! Both operations are built from views: a size-1 axis is inserted
//! next to each replicated axis and broadcast to the repeat count, so
//! the replicas are stride-0 aliases. The final reshape merges each
//! replica axis with its neighbor, which the broadcast layout cannot
//! express, so it materializes a fresh buffer.

use itertools::Itertools;

use crate::axis;
use crate::layout::LayoutError;
use crate::storage::Element;
use crate::strides;
use crate::tensor::Tensor;

/// Repeat each element `repeats` times along `axis`. With no axis the
/// tensor is flattened first and the result is one-dimensional.
///
/// ```
/// use ndview::Tensor;
/// use ndview::repeat;
///
/// let t = Tensor::from_vec(vec![1, 2, 3, 4], vec![2, 2]).unwrap();
/// assert_eq!(repeat(&t, 2, Some(1)).unwrap().to_vec(), vec![1, 1, 2, 2, 3, 3, 4, 4]);
/// assert_eq!(repeat(&t, 2, None).unwrap().to_vec(), vec![1, 1, 2, 2, 3, 3, 4, 4]);
/// ```
pub fn repeat<T: Element>(
    tensor: &Tensor<T>,
    repeats: usize,
    axis: Option<isize>,
) -> Result<Tensor<T>, LayoutError> {
    let (source, axis) = match axis {
        Some(axis) => (
            tensor.clone(),
            axis::resolve_axis(axis, tensor.layout().num_dim())?,
        ),
        None => (tensor.flatten()?, 0),
    };

    let mut target = source.layout().sizes().to_vec();
    target.insert(axis + 1, repeats);
    let mut sizes = source.layout().sizes().to_vec();
    sizes[axis] = sizes[axis].saturating_mul(repeats);
    let request = as_request(sizes)?;

    tracing::debug!(repeats, axis, sizes = ?request, "repeating");
    source
        .expand_dims(axis as isize + 1)?
        .broadcast_to(&target)?
        .reshape(&request)
}

/// Construct a tensor by repeating `tensor` `reps[i]` times along
/// axis `i`. The shorter of `reps` and the tensor's shape is padded
/// on the left with 1s.
///
/// ```
/// use ndview::Tensor;
/// use ndview::tile;
///
/// let t = Tensor::from_vec(vec![1, 2], vec![2]).unwrap();
/// let tiled = tile(&t, &[2, 2]).unwrap();
/// assert_eq!(tiled.layout().sizes(), &[2, 4]);
/// assert_eq!(tiled.to_vec(), vec![1, 2, 1, 2, 1, 2, 1, 2]);
/// ```
pub fn tile<T: Element>(tensor: &Tensor<T>, reps: &[usize]) -> Result<Tensor<T>, LayoutError> {
    let rank = tensor.layout().num_dim().max(reps.len());
    let reps = pad_left(reps, rank);

    let mut source = tensor.clone();
    while source.layout().num_dim() < rank {
        source = source.expand_dims(0)?;
    }
    let sizes = source.layout().sizes().to_vec();

    // [s0, s1, ..] → [1, s0, 1, s1, ..]
    for i in 0..rank {
        source = source.expand_dims((2 * i) as isize)?;
    }
    let target: Vec<usize> = reps
        .iter()
        .interleave(sizes.iter())
        .copied()
        .collect();
    let tiled: Vec<usize> = reps
        .iter()
        .zip(&sizes)
        .map(|(r, s)| r.saturating_mul(*s))
        .collect();
    let request = as_request(tiled)?;

    tracing::debug!(reps = ?reps, sizes = ?request, "tiling");
    source.broadcast_to(&target)?.reshape(&request)
}

fn pad_left(dims: &[usize], rank: usize) -> Vec<usize> {
    let mut padded = vec![1; rank - dims.len()];
    padded.extend_from_slice(dims);
    padded
}

// Every dimension and the element count must fit an `isize`.
fn as_request(sizes: Vec<usize>) -> Result<Vec<isize>, LayoutError> {
    let request: Option<Vec<isize>> = sizes.iter().map(|&d| isize::try_from(d).ok()).collect();
    match (request, strides::checked_element_count(&sizes)) {
        (Some(request), Some(count)) if isize::try_from(count).is_ok() => Ok(request),
        _ => Err(LayoutError::Overflow { sizes }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use crate::config::Config;
    use crate::layout::ErrorKind;
    use crate::strided::Strided;

    fn arange(sizes: &[usize]) -> Tensor<i32> {
        let n: usize = sizes.iter().product();
        Tensor::from_vec((0..n as i32).collect(), sizes.to_vec()).unwrap()
    }

    #[test]
    fn test_repeat_axis() {
        let t = arange(&[2, 3]);
        let r = repeat(&t, 2, Some(0)).unwrap();
        assert_eq!(r.shape(), &[4, 3]);
        assert_eq!(r.to_vec(), vec![0, 1, 2, 0, 1, 2, 3, 4, 5, 3, 4, 5]);

        let r = repeat(&t, 3, Some(-1)).unwrap();
        assert_eq!(r.shape(), &[2, 9]);
        assert_eq!(&r.to_vec()[..9], &[0, 0, 0, 1, 1, 1, 2, 2, 2]);
        assert!(!r.shares_storage(&t));
    }

    #[test]
    fn test_repeat_flattened() {
        let t = arange(&[2, 2]).transpose(&[]).unwrap();
        let r = repeat(&t, 2, None).unwrap();
        assert_eq!(r.shape(), &[8]);
        assert_eq!(r.to_vec(), vec![0, 0, 2, 2, 1, 1, 3, 3]);
    }

    #[test]
    fn test_repeat_zero() {
        let r = repeat(&arange(&[2, 3]), 0, Some(1)).unwrap();
        assert_eq!(r.shape(), &[2, 0]);
        assert!(r.to_vec().is_empty());
    }

    #[test]
    fn test_repeat_errors() {
        let t = arange(&[2, 3]);
        assert_eq!(
            repeat(&t, 2, Some(2)).unwrap_err().kind(),
            ErrorKind::OutOfRange
        );

        let _guard = config::global::override_config(Config {
            allow_copy: false,
            max_copy_elements: None,
        });
        assert!(matches!(
            repeat(&t, 2, Some(0)),
            Err(LayoutError::CopyDisallowed { elements: 12 })
        ));
    }

    #[test]
    fn test_replicate_overflow() {
        let t = arange(&[2, 3]);
        let err = repeat(&t, usize::MAX, Some(0)).unwrap_err();
        assert!(matches!(err, LayoutError::Overflow { .. }));
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
        // Each dimension fits but the element count does not.
        assert!(matches!(
            repeat(&t, 1 << 62, Some(1)),
            Err(LayoutError::Overflow { .. })
        ));
        assert!(matches!(
            tile(&t, &[usize::MAX / 2, 3]),
            Err(LayoutError::Overflow { .. })
        ));
        assert!(matches!(
            tile(&t, &[1 << 62]),
            Err(LayoutError::Overflow { .. })
        ));
    }

    #[test]
    fn test_tile() {
        let t = arange(&[2, 2]);
        let tiled = tile(&t, &[2, 3]).unwrap();
        assert_eq!(tiled.shape(), &[4, 6]);
        for i in 0..4 {
            for j in 0..6 {
                assert_eq!(tiled.get(&[i, j]).unwrap(), t.get(&[i % 2, j % 2]).unwrap());
            }
        }
    }

    #[test]
    fn test_tile_pads_reps() {
        let t = arange(&[2, 3]);
        let tiled = tile(&t, &[2]).unwrap();
        assert_eq!(tiled.shape(), &[2, 6]);
        assert_eq!(tiled.to_vec(), vec![0, 1, 2, 0, 1, 2, 3, 4, 5, 3, 4, 5]);
    }

    #[test]
    fn test_tile_pads_shape() {
        let t = arange(&[3]);
        let tiled = tile(&t, &[2, 1, 2]).unwrap();
        assert_eq!(tiled.shape(), &[2, 1, 6]);
        assert_eq!(tiled.to_vec(), vec![0, 1, 2, 0, 1, 2, 0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_tile_identity_and_empty() {
        let t = arange(&[2, 3]);
        assert_eq!(tile(&t, &[]).unwrap().to_vec(), t.to_vec());
        assert_eq!(tile(&t, &[1, 1]).unwrap().to_vec(), t.to_vec());
        assert_eq!(tile(&t, &[0, 2]).unwrap().shape(), &[0, 6]);

        let s = tile(&Tensor::scalar(7), &[3]).unwrap();
        assert_eq!(s.to_vec(), vec![7, 7, 7]);
    }
}
