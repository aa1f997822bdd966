/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Normalization of axis specifiers and requested shapes.
//!
//! Axes are signed: `-1` names the last axis, `-rank` the first.
//! Requested shapes are signed too, so that a single `-1` can stand
//! for "whatever dimension makes the element count work out".

use crate::layout::LayoutError;
use crate::strides;

/// The dimension value in a requested shape that asks for inference.
pub const INFER: isize = -1;

/// Resolve a possibly-negative `axis` against `rank`.
///
/// ```
/// use ndview::axis::resolve_axis;
/// assert_eq!(resolve_axis(-1, 3).unwrap(), 2);
/// assert!(resolve_axis(3, 3).is_err());
/// ```
pub fn resolve_axis(axis: isize, rank: usize) -> Result<usize, LayoutError> {
    let resolved = if axis < 0 { axis + rank as isize } else { axis };
    if resolved < 0 || resolved >= rank as isize {
        return Err(LayoutError::AxisOutOfRange { axis, rank });
    }
    Ok(resolved as usize)
}

/// Resolve a requested shape against the sizes of an existing
/// layout. At most one entry may be [`INFER`]; it becomes
/// `count / ∏(other entries)`. Without a placeholder the requested
/// element count must equal the existing one.
pub fn resolve_reshape(sizes: &[usize], requested: &[isize]) -> Result<Vec<usize>, LayoutError> {
    let count = strides::element_count(sizes);
    let mismatch = || LayoutError::ElementCountMismatch {
        count,
        requested: requested.to_vec(),
    };
    let mut placeholder = None;
    let mut known: Option<usize> = Some(1);
    for (i, &dim) in requested.iter().enumerate() {
        match dim {
            INFER if placeholder.is_some() => {
                return Err(LayoutError::MultiplePlaceholders {
                    requested: requested.to_vec(),
                });
            }
            INFER => placeholder = Some(i),
            dim if dim < 0 => {
                return Err(LayoutError::InvalidDimension {
                    dim,
                    requested: requested.to_vec(),
                });
            }
            0 => known = Some(0),
            dim => known = known.and_then(|k| k.checked_mul(dim as usize)),
        }
    }
    // A product too large for a `usize` cannot match `count`. Zeros
    // seen later still pin it to 0.
    let known = if requested.contains(&0) {
        0
    } else {
        known.ok_or_else(mismatch)?
    };

    let mut resolved: Vec<usize> = requested.iter().map(|&d| d.max(0) as usize).collect();
    match placeholder {
        Some(i) => {
            if known == 0 {
                // `0 * x == 0` for every x; nothing to infer from.
                return Err(LayoutError::AmbiguousPlaceholder {
                    count,
                    requested: requested.to_vec(),
                });
            }
            if count % known != 0 {
                return Err(mismatch());
            }
            resolved[i] = count / known;
        }
        None if known != count => return Err(mismatch()),
        None => (),
    }
    Ok(resolved)
}

/// Resolve `axes` into a permutation of `0..rank`. Fails if there
/// are too few or too many axes, an axis is out of range, or an axis
/// repeats.
pub fn resolve_permutation(axes: &[isize], rank: usize) -> Result<Vec<usize>, LayoutError> {
    let invalid = || LayoutError::InvalidPermutation {
        axes: axes.to_vec(),
        rank,
    };
    if axes.len() != rank {
        return Err(invalid());
    }
    let mut seen = vec![false; rank];
    let mut order = Vec::with_capacity(rank);
    for &axis in axes {
        let axis = resolve_axis(axis, rank).map_err(|_| invalid())?;
        if std::mem::replace(&mut seen[axis], true) {
            return Err(invalid());
        }
        order.push(axis);
    }
    Ok(order)
}

/// Compute the permutation that moves each axis in `from` to the
/// position at the same index in `to`, leaving the other axes in
/// their original relative order.
pub fn resolve_move(from: &[isize], to: &[isize], rank: usize) -> Result<Vec<usize>, LayoutError> {
    let invalid = || LayoutError::InvalidMove {
        from: from.to_vec(),
        to: to.to_vec(),
        rank,
    };
    if from.len() != to.len() {
        return Err(invalid());
    }
    let unique = |axes: &[isize]| -> Result<Vec<usize>, LayoutError> {
        let mut seen = vec![false; rank];
        axes.iter()
            .map(|&axis| {
                let axis = resolve_axis(axis, rank).map_err(|_| invalid())?;
                if std::mem::replace(&mut seen[axis], true) {
                    return Err(invalid());
                }
                Ok(axis)
            })
            .collect()
    };
    let from = unique(from)?;
    let to = unique(to)?;

    let mut order: Vec<usize> = (0..rank).filter(|axis| !from.contains(axis)).collect();
    let mut moves: Vec<(usize, usize)> = to.into_iter().zip(from).collect();
    moves.sort();
    for (dst, src) in moves {
        order.insert(dst, src);
    }
    Ok(order)
}
