/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use crate::layout::Layout;
use crate::layout::LayoutError;
use crate::storage::Element;
use crate::tensor::Tensor;

mod sealed {
    // Only types in this crate can implement `Strided`.
    pub trait Sealed {}
}

/// The read-only view of a strided layout that higher layers
/// (elementwise kernels, reductions, printers) consume.
///
/// A strided layout is an affine map `ℕⁿ → ℤ`:
///
/// ```text
/// location(x) = offset + dot(strides, x)
/// ```
///
/// where `x` ranges over the coordinates permitted by `shape`.
pub trait Strided: sealed::Sealed {
    /// The layout describing this value.
    fn layout(&self) -> &Layout;

    /// The size of each dimension.
    fn shape(&self) -> &[usize] {
        self.layout().sizes()
    }

    /// The signed stride, in elements, of each dimension.
    fn strides(&self) -> &[isize] {
        self.layout().strides()
    }

    /// The number of dimensions.
    fn rank(&self) -> usize {
        self.layout().num_dim()
    }

    /// The buffer location of the first logical element.
    fn offset(&self) -> usize {
        self.layout().offset()
    }

    /// Whether the strides are exactly row-major.
    fn is_contiguous(&self) -> bool {
        self.layout().is_contiguous()
    }

    /// The number of logical elements.
    fn numel(&self) -> usize {
        self.layout().len()
    }

    /// Maps a coordinate to its buffer location.
    fn location_of(&self, coord: &[usize]) -> Result<usize, LayoutError> {
        self.layout().location(coord)
    }
}

impl sealed::Sealed for Layout {}

impl Strided for Layout {
    fn layout(&self) -> &Layout {
        self
    }
}

impl<T: Element> sealed::Sealed for Tensor<T> {}

impl<T: Element> Strided for Tensor<T> {
    fn layout(&self) -> &Layout {
        Tensor::layout(self)
    }
}
