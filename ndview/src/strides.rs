/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Stride arithmetic.
//!
//! Strides are measured in elements, not bytes. A row-major (C-order)
//! layout of sizes `[d₀, d₁, ..., dₖ₋₁]` has strides
//!
//! ```text
//! stride[k-1] = 1
//! stride[i]   = stride[i+1] × max(d[i+1], 1)
//! ```
//!
//! Empty axes contribute a factor of 1 so that every stride stays
//! nonzero and well-defined; no element of a zero-length axis is ever
//! addressed, so the choice is unobservable through `location`.

/// Row-major strides for `sizes`.
///
/// ```
/// assert_eq!(ndview::strides::row_major(&[2, 3, 4]), vec![12, 4, 1]);
/// assert_eq!(ndview::strides::row_major(&[]), Vec::<isize>::new());
/// ```
pub fn row_major(sizes: &[usize]) -> Vec<isize> {
    // "flip it and reverse it" --Missy Elliott
    let mut strides = vec![0isize; sizes.len()];
    let _ = strides
        .iter_mut()
        .zip(sizes)
        .rev()
        .fold(1isize, |acc, (stride, &size)| {
            *stride = acc;
            let size = isize::try_from(size.max(1)).unwrap_or(isize::MAX);
            acc.saturating_mul(size)
        });
    strides
}

/// Whether `strides` are exactly the row-major strides of `sizes`.
pub fn is_row_major(sizes: &[usize], strides: &[isize]) -> bool {
    sizes.len() == strides.len() && row_major(sizes) == strides
}

/// The number of elements addressed by `sizes`, or `None` if it does
/// not fit in a `usize`. The empty shape is a scalar and has one
/// element. Any zero-length axis makes the count zero, however large
/// the other axes are.
///
/// ```
/// use ndview::strides::checked_element_count;
/// assert_eq!(checked_element_count(&[2, 3]), Some(6));
/// assert_eq!(checked_element_count(&[usize::MAX, 2]), None);
/// assert_eq!(checked_element_count(&[usize::MAX, 2, 0]), Some(0));
/// ```
pub fn checked_element_count(sizes: &[usize]) -> Option<usize> {
    if sizes.contains(&0) {
        return Some(0);
    }
    sizes.iter().try_fold(1usize, |acc, &size| acc.checked_mul(size))
}

/// The number of elements addressed by `sizes`, saturating at
/// `usize::MAX`. No buffer holds that many elements, so a saturated
/// count never matches a real one.
pub fn element_count(sizes: &[usize]) -> usize {
    checked_element_count(sizes).unwrap_or(usize::MAX)
}

/// Iterates over all coordinate tuples in an N-dimensional space.
///
/// Yields each point in row-major order for the shape defined by
/// `dims`, where each coordinate lies in `[0..dims[i])`. A
/// zero-dimensional space has exactly one point, the empty
/// coordinate.
///
/// ```ignore
/// let coords: Vec<_> = CartesianIterator::new(vec![2, 3]).collect();
/// assert_eq!(coords, vec![
///     vec![0, 0], vec![0, 1], vec![0, 2],
///     vec![1, 0], vec![1, 1], vec![1, 2],
/// ]);
/// ```
pub(crate) struct CartesianIterator {
    dims: Vec<usize>,
    index: usize,
    total: usize,
}

impl CartesianIterator {
    pub(crate) fn new(dims: Vec<usize>) -> Self {
        let total = element_count(&dims);
        CartesianIterator {
            dims,
            index: 0,
            total,
        }
    }
}

impl Iterator for CartesianIterator {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.total {
            return None;
        }

        let mut result: Vec<usize> = vec![0; self.dims.len()];
        let mut rest = self.index;
        for (i, dim) in self.dims.iter().enumerate().rev() {
            result[i] = rest % dim;
            rest /= dim;
        }
        self.index += 1;
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CartesianIterator {}
