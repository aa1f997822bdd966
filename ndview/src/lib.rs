/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Strided views over shared n-dimensional buffers.
//!
//! A [`Layout`] maps logical coordinates to buffer locations through
//! an offset and one signed stride per dimension. Transposition,
//! flipping, broadcasting and slicing are pure rewrites of that map,
//! so a [`Tensor`] produced by them shares its [`Storage`] with the
//! tensor it came from. Operations that cannot be expressed as a
//! stride rewrite (reshaping a non-contiguous tensor, joining and
//! replicating) allocate, subject to the copy policy in [`config`].
//!
//! ```
//! use ndview::Strided;
//! use ndview::Tensor;
//!
//! let t = Tensor::from_vec((0..6).collect::<Vec<i32>>(), vec![2, 3]).unwrap();
//! let tt = t.transpose(&[]).unwrap();
//! assert_eq!(tt.shape(), &[3, 2]);
//! assert_eq!(tt.strides(), &[1, 3]);
//! assert!(tt.shares_storage(&t));
//! assert_eq!(tt.to_vec(), vec![0, 3, 1, 4, 2, 5]);
//! ```

/// Axis normalization and reshape resolution.
pub mod axis;

/// Broadcasting of shapes and strides.
pub mod broadcast;

/// The copy policy and its layered configuration.
pub mod config;

mod join;
pub use join::concatenate;
pub use join::hstack;
pub use join::stack;
pub use join::vstack;

mod layout;
pub use layout::ErrorKind;
pub use layout::Layout;
pub use layout::LayoutError;
pub use layout::LayoutIterator;

mod replicate;
pub use replicate::repeat;
pub use replicate::tile;

/// Shared element buffers.
pub mod storage;
pub use storage::Element;
pub use storage::Storage;

mod strided;
pub use strided::Strided;

/// Row-major stride arithmetic.
pub mod strides;

mod tensor;
pub use tensor::Tensor;
pub use tensor::broadcast_tensors;

/// Property-based generators for randomized test input.
#[cfg(test)]
pub mod strategy;
