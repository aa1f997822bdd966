/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use itertools::izip;
use serde::Deserialize;
use serde::Serialize;

use crate::axis;
use crate::broadcast;
use crate::strides;
use crate::strides::CartesianIterator;

/// The type of error for layout operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum LayoutError {
    #[error("invalid dims: expected {expected}, got {got}")]
    InvalidDims { expected: usize, got: usize },

    #[error("cannot reshape {count} elements into shape {requested:?}")]
    ElementCountMismatch { count: usize, requested: Vec<isize> },

    #[error("shape {requested:?} infers more than one dimension")]
    MultiplePlaceholders { requested: Vec<isize> },

    #[error("invalid dimension {dim} in shape {requested:?}")]
    InvalidDimension { dim: isize, requested: Vec<isize> },

    #[error("cannot infer a dimension of shape {requested:?} from {count} elements")]
    AmbiguousPlaceholder { count: usize, requested: Vec<isize> },

    #[error("axes {axes:?} are not a permutation of {rank} dimensions")]
    InvalidPermutation { axes: Vec<isize>, rank: usize },

    #[error("cannot move axes {from:?} to {to:?} in {rank}-dimensional layout")]
    InvalidMove {
        from: Vec<isize>,
        to: Vec<isize>,
        rank: usize,
    },

    #[error("rank mismatch: expected {expected}, got {got}")]
    RankMismatch { expected: usize, got: usize },

    #[error("size mismatch on axis {axis}: expected {expected}, got {got}")]
    ShapeMismatch {
        axis: usize,
        expected: usize,
        got: usize,
    },

    #[error("noncontiguous layout")]
    NonContiguous,

    #[error(
        "shapes {lhs:?} and {rhs:?} cannot be broadcast: axis {axis} has sizes {lhs_dim} and {rhs_dim}"
    )]
    Broadcast {
        lhs: Vec<usize>,
        rhs: Vec<usize>,
        axis: usize,
        lhs_dim: usize,
        rhs_dim: usize,
    },

    #[error("cannot broadcast {from:?} to lower-rank shape {to:?}")]
    BroadcastRank { from: Vec<usize>, to: Vec<usize> },

    #[error("axis {axis} out of range for {rank}-dimensional layout")]
    AxisOutOfRange { axis: isize, rank: usize },

    #[error("index {index} out of range {total}")]
    IndexOutOfRange { index: usize, total: usize },

    #[error("layout addresses negative location {location}")]
    NegativeLocation { location: isize },

    #[error("shape {sizes:?} overflows the address space")]
    Overflow { sizes: Vec<usize> },

    #[error("layout addresses [{low}, {high}] outside buffer of length {len}")]
    OutOfBounds { low: usize, high: usize, len: usize },

    #[error("empty input")]
    EmptyInput,

    #[error("empty range: {begin}..{end} (step {step})")]
    EmptyRange {
        begin: usize,
        end: usize,
        step: usize,
    },

    #[error("copy of {elements} elements exceeds limit {limit}")]
    CopyTooLarge { elements: usize, limit: usize },

    #[error("copy of {elements} elements required but copying is disabled")]
    CopyDisallowed { elements: usize },
}

/// Coarse classification of [`LayoutError`]s. Every error is a local,
/// deterministic validation failure; none is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A shape has the wrong element count, a reshape placeholder is
    /// misused, or an axis permutation is malformed.
    Shape,
    /// Two shapes cannot be aligned under broadcasting rules.
    Broadcast,
    /// An axis, index, or address falls outside its valid range.
    OutOfRange,
    /// Structurally invalid input.
    Value,
}

impl LayoutError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LayoutError::InvalidDims { .. }
            | LayoutError::ElementCountMismatch { .. }
            | LayoutError::MultiplePlaceholders { .. }
            | LayoutError::InvalidDimension { .. }
            | LayoutError::AmbiguousPlaceholder { .. }
            | LayoutError::InvalidPermutation { .. }
            | LayoutError::InvalidMove { .. }
            | LayoutError::RankMismatch { .. }
            | LayoutError::ShapeMismatch { .. }
            | LayoutError::NonContiguous => ErrorKind::Shape,
            LayoutError::Broadcast { .. } | LayoutError::BroadcastRank { .. } => {
                ErrorKind::Broadcast
            }
            LayoutError::AxisOutOfRange { .. }
            | LayoutError::IndexOutOfRange { .. }
            | LayoutError::NegativeLocation { .. }
            | LayoutError::Overflow { .. }
            | LayoutError::OutOfBounds { .. } => ErrorKind::OutOfRange,
            LayoutError::EmptyInput
            | LayoutError::EmptyRange { .. }
            | LayoutError::CopyTooLarge { .. }
            | LayoutError::CopyDisallowed { .. } => ErrorKind::Value,
        }
    }
}

/// Layout describes how the logical coordinates of an n-dimensional
/// tensor map onto a flat buffer. Given an offset, sizes of each
/// dimension, and (signed) strides for each dimension, a layout
/// computes buffer locations:
///
/// ```text
/// location = offset + ∑ iₖ × strides[k]
/// ```
///
/// For example, the following describes a dense 4x4x4 tensor in
/// row-major order:
/// ```
/// # use ndview::Layout;
/// let l = Layout::new(0, vec![4, 4, 4], vec![16, 4, 1]).unwrap();
/// assert!(l.iter().eq(0..(4 * 4 * 4)));
/// ```
///
/// Unlike a dense slice, a layout may alias: a zero stride maps every
/// index along its axis onto the same location (broadcasting), and a
/// negative stride walks its axis backwards (flipping). Layouts are
/// immutable values; every transform returns a new layout and leaves
/// the original untouched.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Hash, Debug)]
#[serde(try_from = "RawLayout")]
pub struct Layout {
    offset: usize,
    sizes: Vec<usize>,
    strides: Vec<isize>,
}

/// The unvalidated wire form of a [`Layout`]. Deserialized layouts
/// pass through [`Layout::new`].
#[derive(Deserialize)]
struct RawLayout {
    offset: usize,
    sizes: Vec<usize>,
    strides: Vec<isize>,
}

impl TryFrom<RawLayout> for Layout {
    type Error = LayoutError;

    fn try_from(raw: RawLayout) -> Result<Self, Self::Error> {
        Layout::new(raw.offset, raw.sizes, raw.strides)
    }
}

impl Layout {
    /// Create a new layout with the provided offset, sizes, and
    /// strides. Sizes and strides must have the same length, no
    /// addressed location may be negative, and both the element count
    /// and every addressed location must fit the address space.
    pub fn new(offset: usize, sizes: Vec<usize>, strides: Vec<isize>) -> Result<Self, LayoutError> {
        if sizes.len() != strides.len() {
            return Err(LayoutError::InvalidDims {
                expected: sizes.len(),
                got: strides.len(),
            });
        }
        if strides::checked_element_count(&sizes).is_none() {
            return Err(LayoutError::Overflow { sizes });
        }
        let layout = Layout {
            offset,
            sizes,
            strides,
        };
        if let Some((low, _)) = layout.signed_span()? {
            if low < 0 {
                return Err(LayoutError::NegativeLocation { location: low });
            }
        }
        Ok(layout)
    }

    /// Deconstruct the layout into its offset, sizes, and strides.
    pub fn into_inner(self) -> (usize, Vec<usize>, Vec<isize>) {
        let Layout {
            offset,
            sizes,
            strides,
        } = self;
        (offset, sizes, strides)
    }

    /// Create a new layout of the given sizes in row-major order.
    pub fn new_row_major(sizes: impl Into<Vec<usize>>) -> Self {
        let sizes = sizes.into();
        let strides = strides::row_major(&sizes);
        Self {
            offset: 0,
            sizes,
            strides,
        }
    }

    /// A zero-dimensional layout addressing the single location
    /// `offset`.
    pub fn scalar(offset: usize) -> Self {
        Self {
            offset,
            sizes: vec![],
            strides: vec![],
        }
    }

    /// The number of dimensions in this layout.
    pub fn num_dim(&self) -> usize {
        self.sizes.len()
    }

    /// This is the buffer location of the first logical element.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The shape of the layout; that is, the size of each dimension.
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// The strides of the layout; that is, the distance (in elements)
    /// between neighbors along each dimension.
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    /// Whether the strides are exactly the row-major strides of the
    /// sizes. The offset does not participate. Always recomputed.
    pub fn is_contiguous(&self) -> bool {
        strides::is_row_major(&self.sizes, &self.strides)
    }

    /// The number of logical elements.
    pub fn len(&self) -> usize {
        strides::element_count(&self.sizes)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the buffer location of the provided coordinates.
    pub fn location(&self, coord: &[usize]) -> Result<usize, LayoutError> {
        if coord.len() != self.sizes.len() {
            return Err(LayoutError::InvalidDims {
                expected: self.sizes.len(),
                got: coord.len(),
            });
        }
        for (&index, &total) in coord.iter().zip(&self.sizes) {
            if index >= total {
                return Err(LayoutError::IndexOutOfRange { index, total });
            }
        }
        Ok(self.location_unchecked(coord))
    }

    // Coordinates must be in bounds; in-bounds locations are
    // nonnegative by construction.
    fn location_unchecked(&self, coord: &[usize]) -> usize {
        let delta = coord
            .iter()
            .zip(&self.strides)
            .map(|(&pos, &stride)| pos as isize * stride)
            .sum::<isize>();
        (self.offset as isize + delta) as usize
    }

    /// Given a logical index (in row-major order), return the buffer
    /// location of that element according to this layout.
    ///
    /// For example, with shape `[3, 4]` and column-major strides
    /// `[1, 3]`, logical index 1 is coordinate `[0, 1]`, which lives
    /// at location `0*1 + 1*3 = 3`.
    pub fn get(&self, index: usize) -> Result<usize, LayoutError> {
        let total = self.len();
        if index >= total {
            return Err(LayoutError::IndexOutOfRange { index, total });
        }
        let mut val = self.offset as isize;
        let mut rest = index;
        for (size, stride) in self.sizes.iter().zip(self.strides.iter()).rev() {
            val += (rest % size) as isize * stride;
            rest /= size;
        }
        Ok(val as usize)
    }

    /// The inclusive range `[low, high]` of buffer locations this
    /// layout addresses, or `None` if it addresses nothing.
    pub fn span(&self) -> Option<(usize, usize)> {
        self.signed_span()
            .ok()
            .flatten()
            .map(|(low, high)| (low as usize, high as usize))
    }

    // Fails if some addressed location does not fit an `isize`.
    fn signed_span(&self) -> Result<Option<(isize, isize)>, LayoutError> {
        if self.is_empty() {
            return Ok(None);
        }
        let overflow = || LayoutError::Overflow {
            sizes: self.sizes.clone(),
        };
        let start = isize::try_from(self.offset).map_err(|_| overflow())?;
        let (mut low, mut high) = (start, start);
        for (&size, &stride) in self.sizes.iter().zip(&self.strides) {
            let reach = isize::try_from(size - 1)
                .ok()
                .and_then(|steps| steps.checked_mul(stride))
                .ok_or_else(overflow)?;
            if reach < 0 {
                low = low.checked_add(reach).ok_or_else(overflow)?;
            } else {
                high = high.checked_add(reach).ok_or_else(overflow)?;
            }
        }
        Ok(Some((low, high)))
    }

    /// Iterator over the layout's buffer locations, in logical
    /// row-major order. Aliased locations are yielded once per
    /// logical element that maps onto them.
    pub fn iter(&self) -> LayoutIterator {
        LayoutIterator {
            layout: self.clone(),
            pos: CartesianIterator::new(self.sizes.clone()),
        }
    }

    /// Iterator over all coordinates of the layout, in row-major
    /// order.
    pub fn coords(&self) -> impl ExactSizeIterator<Item = Vec<usize>> {
        CartesianIterator::new(self.sizes.clone())
    }

    /// Reinterpret this layout with new sizes without copying.
    ///
    /// The layout must be contiguous and the element counts must
    /// agree. The result has row-major strides over `new_sizes` and
    /// keeps this layout's offset.
    ///
    /// ```
    /// use ndview::Layout;
    /// let base = Layout::new_row_major([2, 3, 4]);
    /// let reshaped = base.view(&[6, 4]).unwrap();
    /// assert_eq!(reshaped.strides(), &[4, 1]);
    /// ```
    pub fn view(&self, new_sizes: &[usize]) -> Result<Layout, LayoutError> {
        let count = self.len();
        if strides::checked_element_count(new_sizes) != Some(count) {
            return Err(LayoutError::ElementCountMismatch {
                count,
                requested: new_sizes.iter().map(|&d| d as isize).collect(),
            });
        }
        if !self.is_contiguous() {
            return Err(LayoutError::NonContiguous);
        }
        Layout::new(self.offset, new_sizes.to_vec(), strides::row_major(new_sizes))
    }

    /// Permute the axes of this layout.
    ///
    /// `axes` is either empty, meaning reverse all axes, or a
    /// permutation of `0..rank` (negative entries count from the
    /// end). Axis `i` of the result is axis `axes[i]` of `self`:
    ///
    /// ```text
    /// sizes'[i]   = sizes[axes[i]]
    /// strides'[i] = strides[axes[i]]
    /// ```
    ///
    /// Permuting never touches data, so this always succeeds as a
    /// view for a valid permutation.
    pub fn transpose(&self, axes: &[isize]) -> Result<Layout, LayoutError> {
        let order: Vec<usize> = if axes.is_empty() {
            (0..self.num_dim()).rev().collect()
        } else {
            axis::resolve_permutation(axes, self.num_dim())?
        };
        Ok(self.permuted(&order))
    }

    // `order` must be a permutation of `0..rank`.
    fn permuted(&self, order: &[usize]) -> Layout {
        Layout {
            offset: self.offset,
            sizes: order.iter().map(|&i| self.sizes[i]).collect(),
            strides: order.iter().map(|&i| self.strides[i]).collect(),
        }
    }

    /// Exchange axes `a` and `b`.
    pub fn swap_axes(&self, a: isize, b: isize) -> Result<Layout, LayoutError> {
        let rank = self.num_dim();
        let a = axis::resolve_axis(a, rank)?;
        let b = axis::resolve_axis(b, rank)?;
        let mut order: Vec<usize> = (0..rank).collect();
        order.swap(a, b);
        Ok(self.permuted(&order))
    }

    /// Move each axis in `from` to the matching position in `to`,
    /// keeping the remaining axes in their original relative order.
    ///
    /// ```
    /// use ndview::Layout;
    /// let l = Layout::new_row_major([2, 3, 4]);
    /// assert_eq!(l.move_axis(&[0], &[-1]).unwrap().sizes(), &[3, 4, 2]);
    /// ```
    pub fn move_axis(&self, from: &[isize], to: &[isize]) -> Result<Layout, LayoutError> {
        let order = axis::resolve_move(from, to, self.num_dim())?;
        Ok(self.permuted(&order))
    }

    /// Reverse the traversal direction of `axis`, or of every axis if
    /// `axis` is `None`.
    ///
    /// For each flipped axis of size `d`:
    ///
    /// ```text
    /// offset' = offset + stride × (d - 1)
    /// stride' = -stride
    /// ```
    ///
    /// so the first logical element reads what used to be the last.
    /// Empty axes are left unchanged.
    pub fn flip(&self, axis: Option<isize>) -> Result<Layout, LayoutError> {
        let axes: Vec<usize> = match axis {
            Some(axis) => vec![axis::resolve_axis(axis, self.num_dim())?],
            None => (0..self.num_dim()).collect(),
        };
        let mut offset = self.offset as isize;
        let mut strides = self.strides.clone();
        for axis in axes {
            let size = self.sizes[axis];
            if size == 0 {
                continue;
            }
            offset += strides[axis] * (size as isize - 1);
            strides[axis] = -strides[axis];
        }
        Layout::new(
            usize::try_from(offset).map_err(|_| LayoutError::NegativeLocation { location: offset })?,
            self.sizes.clone(),
            strides,
        )
    }

    /// Broadcast this layout to `target` without copying. Axes of
    /// size 1 that are stretched, and new leading axes, get stride 0.
    /// See [`broadcast::broadcast_strides`].
    pub fn broadcast_to(&self, target: &[usize]) -> Result<Layout, LayoutError> {
        let strides = broadcast::broadcast_strides(&self.sizes, &self.strides, target)?;
        Layout::new(self.offset, target.to_vec(), strides)
    }

    /// Restrict the layout to a strided subrange along `axis`:
    ///
    /// ```text
    /// offset        += begin × strides[axis]
    /// sizes[axis]    = ⌈(end - begin) / step⌉
    /// strides[axis] ×= step
    /// ```
    ///
    /// `end` is clamped to the axis size. The result is a view that
    /// behaves as if indexing starts at zero along the axis.
    pub fn select(
        &self,
        axis: isize,
        begin: usize,
        end: usize,
        step: usize,
    ) -> Result<Layout, LayoutError> {
        let axis = axis::resolve_axis(axis, self.num_dim())?;
        let end = end.min(self.sizes[axis]);
        if step == 0 || end <= begin {
            return Err(LayoutError::EmptyRange { begin, end, step });
        }

        let mut sizes = self.sizes.clone();
        let mut strides = self.strides.clone();
        let offset = self.offset as isize + begin as isize * strides[axis];
        // The # of elems in `begin..end` with step `step`.
        sizes[axis] = (end - begin).div_ceil(step);
        strides[axis] *= step as isize;

        Layout::new(offset as usize, sizes, strides)
    }

    /// Select a single index along `axis`, removing that axis. The
    /// fixed coordinate's contribution is absorbed into the offset;
    /// the remaining strides are unchanged.
    pub fn at(&self, axis: isize, index: usize) -> Result<Layout, LayoutError> {
        let axis = axis::resolve_axis(axis, self.num_dim())?;
        if index >= self.sizes[axis] {
            return Err(LayoutError::IndexOutOfRange {
                index,
                total: self.sizes[axis],
            });
        }
        let offset = self.offset as isize + index as isize * self.strides[axis];
        let mut sizes = self.sizes.clone();
        let mut strides = self.strides.clone();
        sizes.remove(axis);
        strides.remove(axis);
        Layout::new(offset as usize, sizes, strides)
    }

    /// Insert a new axis of size 1 at position `axis`, which is
    /// resolved against `rank + 1`. The inserted stride is the one a
    /// row-major layout would have there, so contiguity is preserved.
    pub fn insert_axis(&self, axis: isize) -> Result<Layout, LayoutError> {
        let axis = axis::resolve_axis(axis, self.num_dim() + 1)?;
        let stride = match (self.sizes.get(axis), self.strides.get(axis)) {
            (Some(&size), Some(&stride)) => isize::try_from(size.max(1))
                .ok()
                .and_then(|size| stride.checked_mul(size))
                .ok_or_else(|| LayoutError::Overflow {
                    sizes: self.sizes.clone(),
                })?,
            _ => 1,
        };
        let mut sizes = self.sizes.clone();
        let mut strides = self.strides.clone();
        sizes.insert(axis, 1);
        strides.insert(axis, stride);
        Ok(Layout {
            offset: self.offset,
            sizes,
            strides,
        })
    }

    /// Ensures that every location addressed by `self` lies within a
    /// buffer of length `len`. Returns `self` on success.
    pub fn enforce_bounds(&self, len: usize) -> Result<&Layout, LayoutError> {
        match self.span() {
            Some((low, high)) if high >= len => Err(LayoutError::OutOfBounds { low, high, len }),
            _ => Ok(self),
        }
    }

    /// Whether any two distinct coordinates share a location along
    /// some axis, i.e. some axis of size > 1 has stride 0.
    pub fn has_broadcast_axes(&self) -> bool {
        izip!(&self.sizes, &self.strides).any(|(&size, &stride)| size > 1 && stride == 0)
    }
}

impl std::fmt::Display for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[off={} sz={:?} st={:?}]",
            self.offset, self.sizes, self.strides
        )
    }
}

impl IntoIterator for &Layout {
    type Item = usize;
    type IntoIter = LayoutIterator;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct LayoutIterator {
    layout: Layout,
    pos: CartesianIterator,
}

impl Iterator for LayoutIterator {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let pos = self.pos.next()?;
        Some(self.layout.location_unchecked(&pos))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.pos.size_hint()
    }
}

impl ExactSizeIterator for LayoutIterator {}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::strategy::gen_layout;
    use crate::strategy::gen_permutation;

    #[test]
    fn test_layout() {
        let l = Layout::new(0, vec![2, 3], vec![3, 1]).unwrap();
        for i in 0..6 {
            assert_eq!(l.get(i).unwrap(), i);
        }

        let l = Layout::new(0, vec![2, 2, 2], vec![4, 32, 1]).unwrap();
        assert_eq!(l.get(2).unwrap(), 32);
        assert_eq!(l.get(3).unwrap(), 33);
        assert_eq!(l.get(6).unwrap(), 36);
        assert!(matches!(
            l.get(8),
            Err(LayoutError::IndexOutOfRange { index: 8, total: 8 })
        ));
    }

    #[test]
    fn test_layout_new_validates() {
        assert!(matches!(
            Layout::new(0, vec![2, 3], vec![1]),
            Err(LayoutError::InvalidDims {
                expected: 2,
                got: 1
            })
        ));
        // Walking backwards from offset 1 over 3 elements goes negative.
        assert!(matches!(
            Layout::new(1, vec![3], vec![-1]),
            Err(LayoutError::NegativeLocation { location: -1 })
        ));
        assert!(Layout::new(2, vec![3], vec![-1]).is_ok());
        // Zero elements never address anything.
        assert!(Layout::new(0, vec![0], vec![-5]).is_ok());
    }

    #[test]
    fn test_layout_new_overflow() {
        // The element count wraps to 4 in 64-bit arithmetic.
        let err = Layout::new(0, vec![(1 << 62) + 1, 4], vec![4, 1]).unwrap_err();
        assert!(matches!(err, LayoutError::Overflow { .. }));
        assert_eq!(err.kind(), ErrorKind::OutOfRange);

        // Reaches past `isize::MAX`, forwards and backwards.
        assert!(matches!(
            Layout::new(0, vec![3], vec![isize::MAX]),
            Err(LayoutError::Overflow { .. })
        ));
        assert!(matches!(
            Layout::new(usize::MAX, vec![2], vec![-1]),
            Err(LayoutError::Overflow { .. })
        ));
        assert!(matches!(
            Layout::new(1, vec![2], vec![isize::MAX]),
            Err(LayoutError::Overflow { .. })
        ));
        assert!(Layout::new(0, vec![2], vec![isize::MAX]).is_ok());

        // Stretching a broadcast axis past the address space fails too.
        assert!(matches!(
            Layout::new_row_major([1, 1]).broadcast_to(&[usize::MAX, 2]),
            Err(LayoutError::Overflow { .. })
        ));
    }

    #[test]
    fn test_layout_iter() {
        let l = Layout::new(10, vec![10, 2], vec![10, 5]).unwrap();
        assert!(l.iter().eq((10..=105).step_by(5)));
        assert!(l.iter().eq((0..l.len()).map(|i| l.get(i).unwrap())));

        let mut count = 0;
        for loc in &Layout::new_row_major([2, 3]) {
            assert_eq!(loc, count);
            count += 1;
        }
        assert_eq!(count, 6);
    }

    #[test]
    fn test_location_bounds() {
        let l = Layout::new_row_major([2, 3]);
        assert_eq!(l.location(&[1, 2]).unwrap(), 5);
        assert!(matches!(
            l.location(&[2, 0]),
            Err(LayoutError::IndexOutOfRange { index: 2, total: 2 })
        ));
        assert!(matches!(
            l.location(&[0]),
            Err(LayoutError::InvalidDims { .. })
        ));
    }

    #[test]
    fn test_scalar() {
        let s = Layout::scalar(7);
        assert_eq!(s.num_dim(), 0);
        assert_eq!(s.len(), 1);
        assert!(s.is_contiguous());
        assert_eq!(s.location(&[]).unwrap(), 7);
        assert_eq!(s.iter().collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn test_contiguity() {
        assert!(Layout::new_row_major([2, 3, 4]).is_contiguous());
        assert!(Layout::new(5, vec![2, 3], vec![3, 1]).unwrap().is_contiguous());
        assert!(!Layout::new(0, vec![2, 3], vec![1, 2]).unwrap().is_contiguous());
        assert!(!Layout::new(0, vec![2, 3], vec![0, 1]).unwrap().is_contiguous());
    }

    #[test]
    fn test_span_and_bounds() {
        let l = Layout::new_row_major([2, 3]);
        assert_eq!(l.span(), Some((0, 5)));
        assert!(l.enforce_bounds(6).is_ok());
        assert!(matches!(
            l.enforce_bounds(5),
            Err(LayoutError::OutOfBounds {
                low: 0,
                high: 5,
                len: 5
            })
        ));

        let flipped = l.flip(None).unwrap();
        assert_eq!(flipped.span(), Some((0, 5)));
        assert_eq!(Layout::new_row_major([0, 3]).span(), None);
    }

    #[test]
    fn test_view_smoke() {
        let base = Layout::new_row_major([2, 3, 4]);

        let view = base.view(&[6, 4]).unwrap();
        assert_eq!(view.sizes(), &[6, 4]);
        assert_eq!(view.offset(), 0);
        assert_eq!(view.strides(), &[4, 1]);
        assert_eq!(
            view.location(&[5, 3]).unwrap(),
            base.location(&[1, 2, 3]).unwrap()
        );

        let view = base.view(&[2, 3, 4]).unwrap();
        assert_eq!(view, base);

        assert!(matches!(
            base.view(&[5, 4]),
            Err(LayoutError::ElementCountMismatch { count: 24, .. })
        ));

        let transposed = base.transpose(&[]).unwrap();
        assert!(matches!(
            transposed.view(&[24]),
            Err(LayoutError::NonContiguous)
        ));
    }

    #[test]
    fn test_view_keeps_offset() {
        let base = Layout::new_row_major([4, 6]);
        let row = base.at(0, 2).unwrap();
        assert_eq!(row.offset(), 12);
        let view = row.view(&[2, 3]).unwrap();
        assert_eq!(view.offset(), 12);
        assert_eq!(view.location(&[1, 2]).unwrap(), 17);
    }

    #[test]
    fn test_transpose() {
        let l = Layout::new_row_major([2, 3, 4]);
        let t = l.transpose(&[]).unwrap();
        assert_eq!(t.sizes(), &[4, 3, 2]);
        assert_eq!(t.strides(), &[1, 4, 12]);
        assert_eq!(t.offset(), 0);

        let t = l.transpose(&[1, -1, 0]).unwrap();
        assert_eq!(t.sizes(), &[3, 4, 2]);
        assert_eq!(t.strides(), &[4, 1, 12]);
        assert_eq!(
            t.location(&[2, 1, 1]).unwrap(),
            l.location(&[1, 2, 1]).unwrap()
        );
    }

    #[test]
    fn test_transpose_invalid() {
        let l = Layout::new_row_major([2, 3, 4]);
        for axes in [&[0, 1][..], &[0, 0, 1], &[0, 1, 3], &[0, 1, 2, 3]] {
            let err = l.transpose(axes).unwrap_err();
            assert!(matches!(err, LayoutError::InvalidPermutation { .. }));
            assert_eq!(err.kind(), ErrorKind::Shape);
        }
    }

    #[test]
    fn test_swap_axes() {
        let l = Layout::new_row_major([2, 3, 4]);
        let s = l.swap_axes(0, -1).unwrap();
        assert_eq!(s.sizes(), &[4, 3, 2]);
        assert_eq!(s.strides(), &[1, 4, 12]);
        assert_eq!(
            l.swap_axes(0, 3).unwrap_err().kind(),
            ErrorKind::OutOfRange
        );
    }

    #[test]
    fn test_move_axis() {
        let l = Layout::new_row_major([3, 4, 5]);
        assert_eq!(l.move_axis(&[0], &[-1]).unwrap().sizes(), &[4, 5, 3]);
        assert_eq!(l.move_axis(&[-1], &[0]).unwrap().sizes(), &[5, 3, 4]);
        let m = l.move_axis(&[0, 1], &[-1, -2]).unwrap();
        assert_eq!(m.sizes(), &[5, 4, 3]);
        assert_eq!(m.strides(), &[1, 5, 20]);

        assert!(matches!(
            l.move_axis(&[0], &[1, 2]),
            Err(LayoutError::InvalidMove { .. })
        ));
        assert!(matches!(
            l.move_axis(&[3], &[0]),
            Err(LayoutError::InvalidMove { .. })
        ));
    }

    #[test]
    fn test_flip() {
        let l = Layout::new_row_major([2, 3]);
        let f = l.flip(Some(1)).unwrap();
        assert_eq!(f.offset(), 2);
        assert_eq!(f.strides(), &[3, -1]);
        assert_eq!(f.iter().collect::<Vec<_>>(), vec![2, 1, 0, 5, 4, 3]);

        let f = l.flip(None).unwrap();
        assert_eq!(f.offset(), 5);
        assert_eq!(f.iter().collect::<Vec<_>>(), vec![5, 4, 3, 2, 1, 0]);

        assert_eq!(f.flip(None).unwrap(), l);
        assert_eq!(l.flip(Some(2)).unwrap_err().kind(), ErrorKind::OutOfRange);
    }

    #[test]
    fn test_flip_empty_axis() {
        let l = Layout::new_row_major([0, 3]);
        let f = l.flip(Some(0)).unwrap();
        assert_eq!(f.offset(), 0);
        assert_eq!(f.strides(), l.strides());
    }

    #[test]
    fn test_select() {
        // Middle column of a 3x3 matrix.
        let m = Layout::new_row_major([3, 3]);
        let c = m.select(1, 1, 2, 1).unwrap();
        assert_eq!(c.sizes(), &[3, 1]);
        assert_eq!(c.iter().collect::<Vec<_>>(), vec![1, 4, 7]);

        // Every other row, end clamped to the axis size.
        let r = m.select(0, 0, 100, 2).unwrap();
        assert_eq!(r.sizes(), &[2, 3]);
        assert_eq!(r.strides(), &[6, 1]);
        assert_eq!(r.iter().collect::<Vec<_>>(), vec![0, 1, 2, 6, 7, 8]);

        assert!(matches!(
            m.select(0, 2, 2, 1),
            Err(LayoutError::EmptyRange { .. })
        ));
        assert!(matches!(
            m.select(0, 0, 2, 0),
            Err(LayoutError::EmptyRange { .. })
        ));
    }

    #[test]
    fn test_at() {
        let l = Layout::new_row_major(vec![2, 3, 4]);
        let r = l.at(0, 1).unwrap();
        assert_eq!(r.sizes(), &[3, 4]);
        assert_eq!(r.strides(), &[4, 1]);
        assert_eq!(r.offset(), 12);

        let v = Layout::new_row_major(vec![5]).at(0, 3).unwrap();
        assert_eq!(v.num_dim(), 0);
        assert_eq!(v.location(&[]).unwrap(), 3);

        assert!(matches!(
            l.at(1, 3),
            Err(LayoutError::IndexOutOfRange { index: 3, total: 3 })
        ));
    }

    #[test]
    fn test_insert_axis() {
        let l = Layout::new_row_major([2, 3]);
        for axis in [0, 1, 2, -1, -3] {
            let e = l.insert_axis(axis).unwrap();
            assert_eq!(e.num_dim(), 3);
            assert!(e.is_contiguous(), "axis {} broke contiguity: {}", axis, e);
            assert!(e.iter().eq(l.iter()));
        }
        assert_eq!(l.insert_axis(-1).unwrap().sizes(), &[2, 3, 1]);
        assert_eq!(l.insert_axis(0).unwrap().sizes(), &[1, 2, 3]);
        assert!(l.insert_axis(3).is_err());
    }

    #[test]
    fn test_broadcast_to() {
        let l = Layout::new_row_major([3, 1]);
        let b = l.broadcast_to(&[2, 3, 4]).unwrap();
        assert_eq!(b.strides(), &[0, 1, 0]);
        assert!(b.has_broadcast_axes());
        assert_eq!(b.len(), 24);
        assert_eq!(b.span(), Some((0, 2)));
    }

    #[test]
    fn test_serde_roundtrip() {
        let l = Layout::new_row_major([2, 3]).flip(Some(0)).unwrap();
        let json = serde_json::to_string(&l).unwrap();
        let back: Layout = serde_json::from_str(&json).unwrap();
        assert_eq!(back, l);
    }

    #[test]
    fn test_deserialize_validates() {
        let err = serde_json::from_str::<Layout>(r#"{"offset":0,"sizes":[2,3],"strides":[1]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("invalid dims: expected 2, got 1"));

        let err = serde_json::from_str::<Layout>(r#"{"offset":0,"sizes":[3],"strides":[-1]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("negative location -2"));

        let back: Layout =
            serde_json::from_str(r#"{"offset":2,"sizes":[3],"strides":[-1]}"#).unwrap();
        assert_eq!(back, Layout::new(2, vec![3], vec![-1]).unwrap());
    }

    #[test]
    fn test_display_and_parts() {
        let l = Layout::new_row_major([2, 3]).flip(Some(1)).unwrap();
        assert_eq!(l.to_string(), "[off=2 sz=[2, 3] st=[3, -1]]");
        assert_eq!(
            l.coords().map(|c| l.location(&c).unwrap()).collect::<Vec<_>>(),
            l.iter().collect::<Vec<_>>()
        );
        assert_eq!(l.into_inner(), (2, vec![2, 3], vec![3, -1]));
    }

    proptest! {
        #[test]
        fn transpose_inverse_is_identity((layout, axes) in gen_layout(4, 4).prop_flat_map(|l| {
            let rank = l.num_dim();
            (Just(l), gen_permutation(rank))
        })) {
            let axes: Vec<isize> = axes.iter().map(|&a| a as isize).collect();
            let mut inverse = vec![0isize; axes.len()];
            for (i, &a) in axes.iter().enumerate() {
                inverse[a as usize] = i as isize;
            }
            let t = layout.transpose(&axes).unwrap();
            let back = t.transpose(&inverse).unwrap();
            prop_assert_eq!(back, layout);
        }

        #[test]
        fn flip_is_an_involution(layout in gen_layout(4, 4)) {
            prop_assert_eq!(layout.flip(None).unwrap().flip(None).unwrap(), layout.clone());
            for axis in 0..layout.num_dim() as isize {
                let f = layout.flip(Some(axis)).unwrap();
                prop_assert_eq!(f.span(), layout.span());
                prop_assert_eq!(f.flip(Some(axis)).unwrap(), layout.clone());
            }
        }

        #[test]
        fn broadcast_to_own_shape_is_identity(layout in gen_layout(4, 4)) {
            let b = layout.broadcast_to(layout.sizes()).unwrap();
            prop_assert_eq!(b, layout);
        }
    }
}
