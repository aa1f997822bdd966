/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Tensor handles.
//!
//! A [`Tensor`] pairs a shared [`Storage`] with a [`Layout`]. Every
//! transform returns a new handle; none mutates an existing one.
//! Whether the new handle shares the old buffer depends on the
//! transform:
//!
//! | operation                                   | result |
//! |---------------------------------------------|--------|
//! | `transpose`, `swap_axes`, `move_axis`       | view   |
//! | `flip`, `broadcast_to`, `select`, `at`      | view   |
//! | `expand_dims`, `view`                       | view   |
//! | `reshape`, `flatten` on a contiguous tensor | view   |
//! | `reshape`, `flatten` otherwise              | copy   |
//! | `contiguous` on a non-contiguous tensor     | copy   |
//!
//! A non-contiguous layout cannot in general be re-expressed with
//! strides for an arbitrary new shape, so `reshape` first
//! materializes a row-major copy and then views that.

use crate::axis;
use crate::broadcast;
use crate::config;
use crate::layout::Layout;
use crate::layout::LayoutError;
use crate::storage::Element;
use crate::storage::Storage;

/// A strided view over a shared buffer of `T`.
#[derive(Clone, Debug)]
pub struct Tensor<T: Element> {
    storage: Storage<T>,
    layout: Layout,
}

impl<T: Element> Tensor<T> {
    /// Take ownership of `data` as a row-major tensor of shape
    /// `sizes`.
    pub fn from_vec(data: Vec<T>, sizes: impl Into<Vec<usize>>) -> Result<Self, LayoutError> {
        let layout = Layout::new_row_major(sizes);
        if layout.len() != data.len() {
            return Err(LayoutError::ElementCountMismatch {
                count: data.len(),
                requested: layout.sizes().iter().map(|&d| d as isize).collect(),
            });
        }
        Ok(Self {
            storage: Storage::from_vec(data),
            layout,
        })
    }

    /// Construct a tensor over an existing buffer. The layout is
    /// revalidated as by [`Layout::new`], and fails if it addresses
    /// any location outside the buffer.
    pub fn from_parts(storage: Storage<T>, layout: Layout) -> Result<Self, LayoutError> {
        let (offset, sizes, strides) = layout.into_inner();
        let layout = Layout::new(offset, sizes, strides)?;
        layout.enforce_bounds(storage.len())?;
        Ok(Self { storage, layout })
    }

    /// Construct a tensor over an existing buffer from its raw
    /// shape, strides and offset.
    pub fn from_raw_parts(
        storage: Storage<T>,
        sizes: Vec<usize>,
        strides: Vec<isize>,
        offset: usize,
    ) -> Result<Self, LayoutError> {
        Self::from_parts(storage, Layout::new(offset, sizes, strides)?)
    }

    /// A row-major tensor of default-valued elements.
    pub fn zeros(sizes: impl Into<Vec<usize>>) -> Self {
        let layout = Layout::new_row_major(sizes);
        Self {
            storage: Storage::allocate(layout.len()),
            layout,
        }
    }

    /// A row-major tensor with every element set to `value`.
    pub fn full(sizes: impl Into<Vec<usize>>, value: T) -> Self {
        let layout = Layout::new_row_major(sizes);
        Self {
            storage: Storage::from_vec(vec![value; layout.len()]),
            layout,
        }
    }

    /// A zero-dimensional tensor holding `value`.
    pub fn scalar(value: T) -> Self {
        Self {
            storage: Storage::from_vec(vec![value]),
            layout: Layout::scalar(0),
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn storage(&self) -> &Storage<T> {
        &self.storage
    }

    /// Whether `self` and `other` are views over the same buffer.
    pub fn shares_storage(&self, other: &Tensor<T>) -> bool {
        self.storage.ptr_eq(&other.storage)
    }

    /// Read the element at `coord`.
    pub fn get(&self, coord: &[usize]) -> Result<T, LayoutError> {
        self.storage.read(self.layout.location(coord)?)
    }

    /// Write the element at `coord`. The write lands in the shared
    /// buffer and is visible through every view that maps to the same
    /// location, including every logical index of a broadcast axis.
    pub fn set(&self, coord: &[usize], value: T) -> Result<(), LayoutError> {
        self.storage.write(self.layout.location(coord)?, value)
    }

    /// The elements in logical row-major order.
    pub fn to_vec(&self) -> Vec<T> {
        let data = self.storage.lock();
        self.layout.iter().map(|loc| data[loc]).collect()
    }

    // A new handle over the same buffer.
    fn with_layout(&self, layout: Layout) -> Self {
        Self {
            storage: self.storage.clone(),
            layout,
        }
    }

    /// Return a contiguous tensor with the same elements. A tensor
    /// that is already contiguous is returned as a view of itself;
    /// otherwise the elements are copied into a fresh row-major
    /// buffer with offset 0.
    pub fn contiguous(&self) -> Result<Self, LayoutError> {
        if self.layout.is_contiguous() {
            return Ok(self.clone());
        }
        self.materialize()
    }

    fn materialize(&self) -> Result<Self, LayoutError> {
        let elements = self.layout.len();
        config::global::get().check_copy(elements)?;
        tracing::debug!(
            sizes = ?self.layout.sizes(),
            strides = ?self.layout.strides(),
            elements,
            "materializing non-contiguous layout"
        );
        Self::from_vec(self.to_vec(), self.layout.sizes().to_vec())
    }

    /// Reshape to `shape`, which may contain one [`axis::INFER`]
    /// placeholder. Contiguous tensors are reshaped as views;
    /// others are first copied into row-major order.
    pub fn reshape(&self, shape: &[isize]) -> Result<Self, LayoutError> {
        let sizes = axis::resolve_reshape(self.layout.sizes(), shape)?;
        if self.layout.is_contiguous() {
            tracing::trace!(from = ?self.layout.sizes(), to = ?sizes, "reshaping as view");
            return Ok(self.with_layout(self.layout.view(&sizes)?));
        }
        let copy = self.materialize()?;
        let layout = copy.layout.view(&sizes)?;
        Ok(copy.with_layout(layout))
    }

    /// Reshape to `shape` without copying. Fails with
    /// [`LayoutError::NonContiguous`] if that is not possible.
    pub fn view(&self, shape: &[isize]) -> Result<Self, LayoutError> {
        let sizes = axis::resolve_reshape(self.layout.sizes(), shape)?;
        Ok(self.with_layout(self.layout.view(&sizes)?))
    }

    /// Reshape to a single dimension.
    pub fn flatten(&self) -> Result<Self, LayoutError> {
        self.reshape(&[axis::INFER])
    }

    /// See [`Layout::transpose`].
    pub fn transpose(&self, axes: &[isize]) -> Result<Self, LayoutError> {
        Ok(self.with_layout(self.layout.transpose(axes)?))
    }

    /// See [`Layout::swap_axes`].
    pub fn swap_axes(&self, a: isize, b: isize) -> Result<Self, LayoutError> {
        Ok(self.with_layout(self.layout.swap_axes(a, b)?))
    }

    /// See [`Layout::move_axis`].
    pub fn move_axis(&self, from: &[isize], to: &[isize]) -> Result<Self, LayoutError> {
        Ok(self.with_layout(self.layout.move_axis(from, to)?))
    }

    /// See [`Layout::flip`].
    pub fn flip(&self, axis: Option<isize>) -> Result<Self, LayoutError> {
        Ok(self.with_layout(self.layout.flip(axis)?))
    }

    /// Broadcast to `target` as a view. Writing through the result
    /// writes every logical index of a broadcast axis at once.
    pub fn broadcast_to(&self, target: &[usize]) -> Result<Self, LayoutError> {
        let layout = self.layout.broadcast_to(target)?;
        tracing::trace!(from = ?self.layout.sizes(), to = ?target, "broadcasting as view");
        Ok(self.with_layout(layout))
    }

    /// See [`Layout::select`].
    pub fn select(&self, axis: isize, begin: usize, end: usize, step: usize) -> Result<Self, LayoutError> {
        Ok(self.with_layout(self.layout.select(axis, begin, end, step)?))
    }

    /// See [`Layout::at`].
    pub fn at(&self, axis: isize, index: usize) -> Result<Self, LayoutError> {
        Ok(self.with_layout(self.layout.at(axis, index)?))
    }

    /// Insert a size-1 axis at `axis`, resolved against `rank + 1`.
    pub fn expand_dims(&self, axis: isize) -> Result<Self, LayoutError> {
        Ok(self.with_layout(self.layout.insert_axis(axis)?))
    }
}

/// Broadcast every tensor to the broadcast of all their shapes. The
/// results are views.
pub fn broadcast_tensors<T: Element>(tensors: &[Tensor<T>]) -> Result<Vec<Tensor<T>>, LayoutError> {
    let target = broadcast::broadcast_shapes_all(tensors.iter().map(|t| t.layout.sizes()))?;
    tensors.iter().map(|t| t.broadcast_to(&target)).collect()
}
