/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Property-based generators for shapes, layouts and tensors.
//!
//! Generated layouts start row-major and are then permuted and
//! flipped, so they cover non-contiguous and negative-stride cases
//! while always addressing a valid, nonnegative range of locations.
//!
//! This module is only included in test builds (`#[cfg(test)]`).

use proptest::prelude::*;

use crate::layout::Layout;
use crate::tensor::Tensor;

/// Generates shapes with up to `max_dims` dimensions, each of size
/// at most `max_len` (inclusive). Zero-dimensional shapes are
/// included, and about one shape in five may contain empty axes.
pub fn gen_sizes(max_dims: usize, max_len: usize) -> impl Strategy<Value = Vec<usize>> {
    prop_oneof![
        4 => prop::collection::vec(1..=max_len, 0..=max_dims),
        1 => prop::collection::vec(0..=max_len, 0..=max_dims),
    ]
}

/// Generates a permutation of `0..rank`.
pub fn gen_permutation(rank: usize) -> impl Strategy<Value = Vec<usize>> {
    Just((0..rank).collect::<Vec<_>>()).prop_shuffle()
}

// A shape together with the permutation and flips applied to it.
fn gen_transforms(
    max_dims: usize,
    max_len: usize,
) -> impl Strategy<Value = (Vec<usize>, Vec<usize>, Vec<bool>)> {
    gen_sizes(max_dims, max_len).prop_flat_map(|sizes| {
        let rank = sizes.len();
        (
            Just(sizes),
            gen_permutation(rank),
            prop::collection::vec(any::<bool>(), rank),
        )
    })
}

fn as_axes(order: &[usize]) -> Vec<isize> {
    order.iter().map(|&a| a as isize).collect()
}

/// Generates a layout over a row-major buffer of up to `max_dims`
/// dimensions, with its axes randomly permuted and flipped.
pub fn gen_layout(max_dims: usize, max_len: usize) -> impl Strategy<Value = Layout> {
    gen_transforms(max_dims, max_len).prop_map(|(sizes, order, flips)| {
        let mut layout = Layout::new_row_major(sizes)
            .transpose(&as_axes(&order))
            .unwrap();
        for (axis, flip) in flips.into_iter().enumerate() {
            if flip {
                layout = layout.flip(Some(axis as isize)).unwrap();
            }
        }
        layout
    })
}

/// Generates a tensor whose buffer holds `0..n`, viewed through a
/// layout drawn like [`gen_layout`].
pub fn gen_tensor(max_dims: usize, max_len: usize) -> impl Strategy<Value = Tensor<i64>> {
    gen_transforms(max_dims, max_len).prop_map(|(sizes, order, flips)| {
        let n: usize = sizes.iter().product();
        let mut tensor = Tensor::from_vec((0..n as i64).collect(), sizes)
            .unwrap()
            .transpose(&as_axes(&order))
            .unwrap();
        for (axis, flip) in flips.into_iter().enumerate() {
            if flip {
                tensor = tensor.flip(Some(axis as isize)).unwrap();
            }
        }
        tensor
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;

    use super::*;

    #[test]
    fn test_gen_sizes_includes_empty_axes() {
        let mut runner = TestRunner::deterministic();
        let strategy = gen_sizes(3, 2);
        let empty = (0..500)
            .map(|_| strategy.new_tree(&mut runner).unwrap().current())
            .filter(|sizes| sizes.contains(&0))
            .count();
        assert!(empty > 0);
    }

    proptest! {
        #[test]
        fn gen_layout_stays_in_bounds(layout in gen_layout(4, 4)) {
            prop_assert!(layout.enforce_bounds(layout.len()).is_ok());
            let locations: BTreeSet<usize> = layout.iter().collect();
            prop_assert_eq!(locations.len(), layout.len());
        }

        #[test]
        fn gen_sizes_respects_bounds(sizes in gen_sizes(3, 2)) {
            prop_assert!(sizes.len() <= 3);
            prop_assert!(sizes.iter().all(|&d| d <= 2));
        }

        #[test]
        fn gen_permutation_is_a_permutation(perm in gen_permutation(5)) {
            let seen: BTreeSet<usize> = perm.iter().copied().collect();
            prop_assert_eq!(seen, (0..5).collect::<BTreeSet<_>>());
        }
    }
}
