/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Broadcasting.
//!
//! Two shapes are broadcast by right-aligning them, conceptually
//! padding the shorter one on the left with 1s, and combining each
//! aligned pair of dimensions:
//!
//! ```text
//!   (d, d) → d
//!   (1, d) → d
//!   (d, 1) → d
//!   otherwise incompatible
//! ```
//!
//! A layout is broadcast to a larger shape without copying by giving
//! every stretched axis (and every new leading axis) a stride of 0,
//! so that all logical indices along it read the same element.

use crate::layout::LayoutError;

/// Compute the broadcast of two shapes.
///
/// ```
/// use ndview::broadcast::broadcast_shapes;
/// assert_eq!(broadcast_shapes(&[3, 1], &[2, 1, 4]).unwrap(), vec![2, 3, 4]);
/// assert!(broadcast_shapes(&[2, 3], &[2, 4]).is_err());
/// ```
pub fn broadcast_shapes(lhs: &[usize], rhs: &[usize]) -> Result<Vec<usize>, LayoutError> {
    let rank = lhs.len().max(rhs.len());
    let mut result = vec![0usize; rank];

    for i in 0..rank {
        let lhs_dim = aligned(lhs, rank, i);
        let rhs_dim = aligned(rhs, rank, i);
        result[i] = if lhs_dim == rhs_dim || rhs_dim == 1 {
            lhs_dim
        } else if lhs_dim == 1 {
            rhs_dim
        } else {
            return Err(LayoutError::Broadcast {
                lhs: lhs.to_vec(),
                rhs: rhs.to_vec(),
                axis: i,
                lhs_dim,
                rhs_dim,
            });
        };
    }

    Ok(result)
}

/// Compute the broadcast of any number of shapes by pairwise
/// reduction. The broadcast of no shapes is the scalar shape.
pub fn broadcast_shapes_all<'a, I>(shapes: I) -> Result<Vec<usize>, LayoutError>
where
    I: IntoIterator<Item = &'a [usize]>,
{
    shapes
        .into_iter()
        .try_fold(Vec::new(), |acc, shape| broadcast_shapes(&acc, shape))
}

/// Strides that present a layout of `sizes`/`strides` as `target`.
///
/// Right-aligns `sizes` against `target`. Each original axis either
/// matches its target dimension (stride copied), or has size 1
/// (stride 0). Leading axes present only in `target` get stride 0.
pub fn broadcast_strides(
    sizes: &[usize],
    strides: &[isize],
    target: &[usize],
) -> Result<Vec<isize>, LayoutError> {
    if sizes.len() != strides.len() {
        return Err(LayoutError::InvalidDims {
            expected: sizes.len(),
            got: strides.len(),
        });
    }
    if target.len() < sizes.len() {
        return Err(LayoutError::BroadcastRank {
            from: sizes.to_vec(),
            to: target.to_vec(),
        });
    }

    let lead = target.len() - sizes.len();
    let mut result = vec![0isize; target.len()];
    for (i, (&size, &stride)) in sizes.iter().zip(strides).enumerate() {
        let want = target[lead + i];
        result[lead + i] = if size == want {
            stride
        } else if size == 1 {
            0
        } else {
            return Err(LayoutError::Broadcast {
                lhs: sizes.to_vec(),
                rhs: target.to_vec(),
                axis: lead + i,
                lhs_dim: size,
                rhs_dim: want,
            });
        };
    }
    Ok(result)
}

// The dimension of `shape` at position `i` of a right-aligned frame
// of `rank` dimensions.
fn aligned(shape: &[usize], rank: usize, i: usize) -> usize {
    let pad = rank - shape.len();
    if i < pad { 1 } else { shape[i - pad] }
}
