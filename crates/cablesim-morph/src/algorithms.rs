// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Algorithms over flat parent-index trees.

A parent-index tree stores, for every node `i`, the index of its parent.
The root is node 0 and is its own parent; in a minimal-degree tree every
other node's parent has a smaller index.
*/

use crate::error::{MorphError, MorphResult};
use std::ops::Add;

/// Number of children of every node (the root's self reference is not counted)
pub fn child_count(parent_index: &[usize]) -> Vec<usize> {
    let mut count = vec![0; parent_index.len()];
    for &p in parent_index.iter().skip(1) {
        if let Some(c) = count.get_mut(p) {
            *c += 1;
        }
    }
    count
}

/// Exclusive prefix sum with the total appended, so `index.len() == v.len() + 1`
pub fn make_index<T>(v: &[T]) -> Vec<T>
where
    T: Copy + Default + Add<Output = T>,
{
    let mut index = Vec::with_capacity(v.len() + 1);
    let mut acc = T::default();
    index.push(acc);
    for &x in v {
        acc = acc + x;
        index.push(acc);
    }
    index
}

/// The root is node 0 and every other node's parent precedes it
pub fn is_minimal_degree(parent_index: &[usize]) -> bool {
    match parent_index.first() {
        None => true,
        Some(&root) if root != 0 => false,
        Some(_) => parent_index
            .iter()
            .enumerate()
            .skip(1)
            .all(|(i, &p)| p < i),
    }
}

pub fn is_strictly_monotonic_increasing<T: PartialOrd>(v: &[T]) -> bool {
    v.windows(2).all(|w| w[0] < w[1])
}

pub fn is_strictly_monotonic_decreasing<T: PartialOrd>(v: &[T]) -> bool {
    v.windows(2).all(|w| w[0] > w[1])
}

pub fn is_positive<T: PartialOrd + Default>(v: &[T]) -> bool {
    let zero = T::default();
    v.iter().all(|x| *x > zero)
}

/// True if every unbranched chain occupies consecutive indices
pub fn has_contiguous_segments(parent_index: &[usize]) -> bool {
    if !is_minimal_degree(parent_index) {
        return false;
    }
    let count = child_count(parent_index);
    parent_index
        .iter()
        .enumerate()
        .skip(1)
        .all(|(i, &p)| count[p] != 1 || p == i - 1)
}

/// Assign a branch id to every node.
///
/// A node starts a new branch when its parent is the root or a fork point;
/// otherwise it continues its parent's branch. Branch ids are handed out in
/// node order, with the root alone on branch 0.
///
/// Fails with [`MorphError::InvalidSegmentParent`] on the first node whose
/// parent does not precede it, or when node 0 is not its own parent.
pub fn branches(parent_index: &[usize]) -> MorphResult<Vec<usize>> {
    if let Some((i, &p)) = parent_index
        .iter()
        .enumerate()
        .find(|&(i, &p)| if i == 0 { p != 0 } else { p >= i })
    {
        return Err(MorphError::InvalidSegmentParent {
            segment: i as u32,
            parent: p as u32,
        });
    }
    let count = child_count(parent_index);
    let mut branch = vec![0; parent_index.len()];
    let mut next = 1;
    for i in 1..parent_index.len() {
        let p = parent_index[i];
        if count[p] > 1 || parent_index[p] == p {
            branch[i] = next;
            next += 1;
        } else {
            branch[i] = branch[p];
        }
    }
    Ok(branch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_index() {
        let ones = vec![1; 10];
        let index = make_index(&ones);
        assert_eq!(index.len(), 11);
        assert_eq!(index[0], 0);
        assert_eq!(*index.last().unwrap(), 10);

        let v: Vec<i64> = (1..=10).collect();
        let index = make_index(&v);
        assert_eq!(index.len(), 11);
        assert_eq!(*index.last().unwrap(), 55);
    }

    #[test]
    fn test_minimal_degree() {
        assert!(is_minimal_degree(&[0]));
        assert!(is_minimal_degree(&[0, 0, 1, 2, 3, 4]));
        assert!(is_minimal_degree(&[0, 0, 1, 2, 0, 4]));
        assert!(is_minimal_degree(&[0, 0, 1, 2, 0, 4, 5, 4]));
        assert!(!is_minimal_degree(&[1]));
        assert!(!is_minimal_degree(&[0, 2]));
        assert!(!is_minimal_degree(&[0, 1, 2]));
    }

    #[test]
    fn test_monotonic() {
        assert!(is_strictly_monotonic_increasing(&[0]));
        assert!(is_strictly_monotonic_increasing(&[8, 20, 42, 89]));
        assert!(!is_strictly_monotonic_increasing(&[0, 0]));
        assert!(!is_strictly_monotonic_increasing(&[8, 20, 20, 89]));
        assert!(!is_strictly_monotonic_increasing(&[3, 2, 1, 0]));

        assert!(is_strictly_monotonic_decreasing(&[0]));
        assert!(is_strictly_monotonic_decreasing(&[3, 2, 1, 0]));
        assert!(!is_strictly_monotonic_decreasing(&[0, 1, 2, 3]));
        assert!(!is_strictly_monotonic_decreasing(&[0, 0]));
    }

    #[test]
    fn test_positive() {
        assert!(is_positive::<i32>(&[]));
        assert!(is_positive(&[3, 2, 1]));
        assert!(!is_positive(&[3, 2, 1, 0]));
        assert!(!is_positive(&[-1]));
    }

    #[test]
    fn test_contiguous_segments() {
        assert!(!has_contiguous_segments(&[0, 0, 1, 2, 2, 3, 4, 2]));
        assert!(!has_contiguous_segments(&[0, 0, 1, 2, 3, 2, 2, 5]));
        assert!(has_contiguous_segments(&[0, 0, 1, 2, 3, 2, 5, 2]));
        assert!(has_contiguous_segments(&[0, 0, 1, 2, 3, 2, 5, 1]));
        assert!(has_contiguous_segments(&[0]));
        assert!(has_contiguous_segments(&[]));
    }

    #[test]
    fn test_child_count() {
        let parent_index = [0, 0, 1, 2, 0, 4, 0, 6, 7, 8, 9, 8, 11, 12];
        assert_eq!(
            child_count(&parent_index),
            vec![3, 1, 1, 0, 1, 0, 1, 1, 2, 1, 0, 1, 1, 0]
        );
    }

    #[test]
    fn test_branches() {
        let parent_index = [0, 0, 1, 2, 0, 4, 0, 6, 7, 8, 9, 8, 11, 12];
        assert_eq!(
            branches(&parent_index).unwrap(),
            vec![0, 1, 1, 1, 2, 2, 3, 3, 3, 4, 4, 5, 5, 5]
        );

        assert_eq!(branches(&[0, 0, 1, 2]).unwrap(), vec![0, 1, 1, 1]);
        assert_eq!(branches(&[0, 0, 1, 2, 2, 4]).unwrap(), vec![0, 1, 1, 2, 3, 3]);
        assert_eq!(branches(&[0]).unwrap(), vec![0]);
        assert_eq!(branches(&[]).unwrap(), Vec::<usize>::new());
    }

    #[test]
    fn test_branches_rejects_bad_parents() {
        // Parent past the end of the array
        assert_eq!(
            branches(&[0, 0, 7]),
            Err(MorphError::InvalidSegmentParent { segment: 2, parent: 7 })
        );
        // Forward reference
        assert_eq!(
            branches(&[0, 2, 0]),
            Err(MorphError::InvalidSegmentParent { segment: 1, parent: 2 })
        );
        // Root that is not its own parent
        assert_eq!(
            branches(&[1, 0]),
            Err(MorphError::InvalidSegmentParent { segment: 0, parent: 1 })
        );
    }
}
