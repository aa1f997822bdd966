/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Shared element buffers.
//!
//! A [`Storage`] is a fixed-length, reference-counted buffer. Every
//! [`crate::Tensor`] view over the same storage holds a clone of the
//! same `Arc`, so the buffer lives as long as its longest-lived view
//! and writes through one view are visible through all others.
//!
//! Writes are serialized per buffer by the lock, but nothing orders
//! writes across aliasing views: two views that map distinct logical
//! indices to the same location race, and the last write wins.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use parking_lot::RwLockReadGuard;

use crate::layout::LayoutError;

/// Types that can be stored in a tensor.
pub trait Element: Copy + Default + fmt::Debug + Send + Sync + 'static {}

impl<T> Element for T where T: Copy + Default + fmt::Debug + Send + Sync + 'static {}

/// A reference-counted buffer of `T`. Cloning a `Storage` shares the
/// buffer; it never copies elements.
pub struct Storage<T> {
    inner: Arc<RwLock<Vec<T>>>,
}

impl<T> Clone for Storage<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Element> Storage<T> {
    /// Allocate a buffer of `len` default-valued elements.
    pub fn allocate(len: usize) -> Self {
        Self::from_vec(vec![T::default(); len])
    }

    /// Take ownership of `data` as a new buffer.
    pub fn from_vec(data: Vec<T>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(data)),
        }
    }

    /// The number of elements in the buffer. Buffers never resize.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the element at `index`.
    pub fn read(&self, index: usize) -> Result<T, LayoutError> {
        let data = self.inner.read();
        data.get(index)
            .copied()
            .ok_or(LayoutError::IndexOutOfRange {
                index,
                total: data.len(),
            })
    }

    /// Overwrite the element at `index`.
    pub fn write(&self, index: usize, value: T) -> Result<(), LayoutError> {
        let mut data = self.inner.write();
        let total = data.len();
        match data.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(LayoutError::IndexOutOfRange { index, total }),
        }
    }

    /// Lock the buffer for reading. Holding the guard blocks writers.
    pub(crate) fn lock(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.inner.read()
    }

    /// The number of handles currently sharing this buffer.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Whether `self` and `other` share the same buffer.
    pub fn ptr_eq(&self, other: &Storage<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Element> fmt::Debug for Storage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("len", &self.len())
            .field("refs", &self.ref_count())
            .finish()
    }
}
