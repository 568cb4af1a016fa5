// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Segment tree: the raw description a morphology is built from.

Each segment is a truncated cone between two sample points with a user
tag (soma, axon, dendrite, ...). Segments are appended in an order where
every parent precedes its children.
*/

use crate::error::{MorphError, MorphResult};
use crate::primitives::{Point, NPOS};
use serde::{Deserialize, Serialize};

/// One frustum of the tree
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: u32,
    pub prox: Point,
    pub dist: Point,
    pub tag: i32,
}

impl Segment {
    pub fn length(&self) -> f64 {
        self.prox.distance(&self.dist)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentTree {
    segments: Vec<Segment>,
    parents: Vec<u32>,
}

impl SegmentTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a segment; `parent` is `NPOS` for a root segment.
    ///
    /// Returns the new segment id.
    pub fn append(&mut self, parent: u32, prox: Point, dist: Point, tag: i32) -> MorphResult<u32> {
        let id = self.segments.len() as u32;
        if parent != NPOS && parent >= id {
            return Err(MorphError::InvalidSegmentParent {
                segment: id,
                parent,
            });
        }
        self.segments.push(Segment {
            id,
            prox,
            dist,
            tag,
        });
        self.parents.push(parent);
        Ok(id)
    }

    /// Append a segment whose proximal point is the distal point of `parent`
    pub fn append_from_parent(&mut self, parent: u32, dist: Point, tag: i32) -> MorphResult<u32> {
        let prox = self
            .segments
            .get(parent as usize)
            .map(|s| s.dist)
            .ok_or(MorphError::InvalidSegmentParent {
                segment: self.segments.len() as u32,
                parent,
            })?;
        self.append(parent, prox, dist, tag)
    }

    pub fn size(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn parents(&self) -> &[u32] {
        &self.parents
    }

    /// Child count of every segment
    pub fn child_counts(&self) -> Vec<usize> {
        let mut count = vec![0; self.segments.len()];
        for &p in &self.parents {
            if p != NPOS {
                count[p as usize] += 1;
            }
        }
        count
    }

    pub fn is_root(&self, seg: u32) -> bool {
        self.parents.get(seg as usize) == Some(&NPOS)
    }
}
