/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Joining tensors along an axis.
//!
//! Joins always allocate: the inputs generally live in unrelated
//! buffers, so no single strided layout can address all of them.
//! Every input is validated before the output buffer is allocated.

use crate::axis;
use crate::config;
use crate::layout::Layout;
use crate::layout::LayoutError;
use crate::storage::Element;
use crate::strides;
use crate::tensor::Tensor;

// Check that all inputs have the same rank, and return the first.
fn check_ranks<T: Element>(tensors: &[Tensor<T>]) -> Result<&Tensor<T>, LayoutError> {
    let first = tensors.first().ok_or(LayoutError::EmptyInput)?;
    let rank = first.layout().num_dim();
    for tensor in &tensors[1..] {
        let got = tensor.layout().num_dim();
        if got != rank {
            return Err(LayoutError::RankMismatch {
                expected: rank,
                got,
            });
        }
    }
    Ok(first)
}

// Check that all inputs agree with `first` on every dimension except
// `skip`.
fn check_dims<T: Element>(
    first: &Tensor<T>,
    tensors: &[Tensor<T>],
    skip: Option<usize>,
) -> Result<(), LayoutError> {
    let sizes = first.layout().sizes();
    for tensor in tensors {
        let other = tensor.layout().sizes();
        for (axis, (&expected, &got)) in sizes.iter().zip(other).enumerate() {
            if Some(axis) != skip && expected != got {
                return Err(LayoutError::ShapeMismatch {
                    axis,
                    expected,
                    got,
                });
            }
        }
    }
    Ok(())
}

/// Join `tensors` along an existing `axis`, which may be negative.
///
/// All inputs must have the same rank and agree on every dimension
/// other than `axis`. The result is a fresh row-major tensor whose
/// `axis` dimension is the sum of the inputs'.
///
/// ```
/// use ndview::Tensor;
/// use ndview::concatenate;
///
/// let a = Tensor::from_vec(vec![1, 2, 3], vec![3]).unwrap();
/// let b = Tensor::from_vec(vec![4, 5, 6], vec![3]).unwrap();
/// assert_eq!(concatenate(&[a, b], 0).unwrap().to_vec(), vec![1, 2, 3, 4, 5, 6]);
/// ```
pub fn concatenate<T: Element>(tensors: &[Tensor<T>], axis: isize) -> Result<Tensor<T>, LayoutError> {
    let first = check_ranks(tensors)?;
    let axis = axis::resolve_axis(axis, first.layout().num_dim())?;
    check_dims(first, tensors, Some(axis))?;

    let mut sizes = first.layout().sizes().to_vec();
    let extent = tensors
        .iter()
        .try_fold(0usize, |acc, t| acc.checked_add(t.layout().sizes()[axis]));
    sizes[axis] = extent.unwrap_or(usize::MAX);
    if extent.is_none() || strides::checked_element_count(&sizes).is_none() {
        return Err(LayoutError::Overflow { sizes });
    }
    let out = Layout::new_row_major(sizes.clone());

    config::global::get().check_copy(out.len())?;
    tracing::debug!(
        inputs = tensors.len(),
        axis,
        sizes = ?sizes,
        "concatenating into new buffer"
    );

    let mut data = vec![T::default(); out.len()];
    let mut begin = 0;
    for tensor in tensors {
        let extent = tensor.layout().sizes()[axis];
        if extent == 0 {
            continue;
        }
        // The block of the output this input occupies has the same
        // shape as the input, so both iterate in lockstep.
        let block = out.select(axis as isize, begin, begin + extent, 1)?;
        let src = tensor.storage().lock();
        for (dst, loc) in block.iter().zip(tensor.layout().iter()) {
            data[dst] = src[loc];
        }
        begin += extent;
    }

    Tensor::from_vec(data, sizes)
}

/// Join identically shaped `tensors` along a new axis inserted at
/// `axis`, which is resolved against `rank + 1`.
pub fn stack<T: Element>(tensors: &[Tensor<T>], axis: isize) -> Result<Tensor<T>, LayoutError> {
    let first = check_ranks(tensors)?;
    check_dims(first, tensors, None)?;
    let expanded = tensors
        .iter()
        .map(|t| t.expand_dims(axis))
        .collect::<Result<Vec<_>, _>>()?;
    concatenate(&expanded, axis)
}

/// Concatenate along the first axis.
pub fn vstack<T: Element>(tensors: &[Tensor<T>]) -> Result<Tensor<T>, LayoutError> {
    concatenate(tensors, 0)
}

/// Concatenate along the second axis, or the first if the inputs are
/// one-dimensional.
pub fn hstack<T: Element>(tensors: &[Tensor<T>]) -> Result<Tensor<T>, LayoutError> {
    let first = check_ranks(tensors)?;
    let axis = if first.layout().num_dim() == 1 { 0 } else { 1 };
    concatenate(tensors, axis)
}
