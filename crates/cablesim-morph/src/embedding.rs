// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Piecewise-linear embedding of a morphology in space.

Positions along a branch are proportional to path length. Each segment
occupies a sub-interval of its branch; radius varies linearly inside a
segment. All lengths are in µm and areas in µm².
*/

use crate::morphology::Morphology;
use crate::primitives::{Cable, Location, LocationList};
use std::f64::consts::PI;
use std::sync::Arc;

/// Comparison used by radius-bounded regions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RadiusCmp {
    Lt,
    Le,
    Gt,
    Ge,
}

impl RadiusCmp {
    pub fn test(self, r: f64, value: f64) -> bool {
        match self {
            RadiusCmp::Lt => r < value,
            RadiusCmp::Le => r <= value,
            RadiusCmp::Gt => r > value,
            RadiusCmp::Ge => r >= value,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RadiusCmp::Lt => "radius-lt",
            RadiusCmp::Le => "radius-le",
            RadiusCmp::Gt => "radius-gt",
            RadiusCmp::Ge => "radius-ge",
        }
    }
}

#[derive(Debug)]
struct EmbeddingInner {
    /// Per branch: proportional position of every segment boundary, head first
    seg_pos: Vec<Vec<f64>>,
    /// Per branch: (proximal, distal) radius of every segment
    seg_radius: Vec<Vec<(f64, f64)>>,
    branch_length: Vec<f64>,
    /// Path length from the root to the head of each branch
    head_distance: Vec<f64>,
    segment_cables: Vec<Cable>,
    segment_ends: LocationList,
}

/// Metric data for a morphology, cheap to clone
#[derive(Debug, Clone)]
pub struct Embedding {
    inner: Arc<EmbeddingInner>,
}

/// One segment's overlap with a cable: proportional range plus end radii
struct Piece {
    prox: f64,
    dist: f64,
    r_prox: f64,
    r_dist: f64,
}

impl Embedding {
    pub fn new(m: &Morphology) -> Self {
        let nb = m.num_branches();
        let segments = m.segments();

        let mut seg_pos = Vec::with_capacity(nb);
        let mut seg_radius = Vec::with_capacity(nb);
        let mut branch_length = Vec::with_capacity(nb);
        let mut head_distance = vec![0.0; nb];
        let mut segment_cables = vec![Cable::new_unchecked(0, 0.0, 0.0); m.num_segments()];
        let mut segment_ends = Vec::new();

        for b in 0..nb as u32 {
            let segs = m.branch_segments(b);
            let lengths: Vec<f64> = segs
                .iter()
                .map(|&s| segments[s as usize].length())
                .collect();
            let total: f64 = lengths.iter().sum();

            let mut pos = Vec::with_capacity(segs.len() + 1);
            pos.push(0.0);
            let mut acc = 0.0;
            for (i, len) in lengths.iter().enumerate() {
                let p = if i + 1 == segs.len() {
                    1.0
                } else if total > 0.0 {
                    acc += len;
                    acc / total
                } else {
                    (i + 1) as f64 / segs.len() as f64
                };
                pos.push(p);
            }

            segment_ends.push(Location::new_unchecked(b, 0.0));
            for (i, &s) in segs.iter().enumerate() {
                segment_cables[s as usize] = Cable::new_unchecked(b, pos[i], pos[i + 1]);
                segment_ends.push(Location::new_unchecked(b, pos[i + 1]));
            }

            seg_radius.push(
                segs.iter()
                    .map(|&s| {
                        let seg = &segments[s as usize];
                        (seg.prox.radius, seg.dist.radius)
                    })
                    .collect(),
            );
            seg_pos.push(pos);
            branch_length.push(total);

            let parent = m.branch_parent(b);
            if let Some(&ph) = head_distance.get(parent as usize) {
                head_distance[b as usize] = ph + branch_length[parent as usize];
            }
        }

        Self {
            inner: Arc::new(EmbeddingInner {
                seg_pos,
                seg_radius,
                branch_length,
                head_distance,
                segment_cables,
                segment_ends,
            }),
        }
    }

    /// Branch heads and the distal end of every segment
    pub fn segment_ends(&self) -> &[Location] {
        &self.inner.segment_ends
    }

    pub fn segment_cable(&self, seg: u32) -> Option<Cable> {
        self.inner.segment_cables.get(seg as usize).copied()
    }

    pub fn branch_length(&self, b: u32) -> f64 {
        self.inner
            .branch_length
            .get(b as usize)
            .copied()
            .unwrap_or(0.0)
    }

    /// Path length from the root to a location
    pub fn distance_from_root(&self, loc: &Location) -> f64 {
        let b = loc.branch as usize;
        self.inner.head_distance.get(b).copied().unwrap_or(0.0) + loc.pos * self.branch_length(loc.branch)
    }

    pub fn radius(&self, loc: &Location) -> f64 {
        let b = loc.branch as usize;
        let (Some(pos), Some(radii)) = (self.inner.seg_pos.get(b), self.inner.seg_radius.get(b)) else {
            return 0.0;
        };
        if radii.is_empty() {
            return 0.0;
        }
        // first segment whose distal boundary reaches loc.pos
        let i = pos[1..]
            .partition_point(|&p| p < loc.pos)
            .min(radii.len() - 1);
        let (r0, r1) = radii[i];
        let width = pos[i + 1] - pos[i];
        if width > 0.0 {
            lerp(r0, r1, (loc.pos - pos[i]) / width)
        } else {
            r1
        }
    }

    pub fn integrate_length(&self, c: &Cable) -> f64 {
        c.extent() * self.branch_length(c.branch)
    }

    /// Path length between `prox` and a location `dist` distal to it
    pub fn integrate_length_between(&self, prox: &Location, dist: &Location) -> f64 {
        self.distance_from_root(dist) - self.distance_from_root(prox)
    }

    /// Lateral surface area of a cable
    pub fn integrate_area(&self, c: &Cable) -> f64 {
        self.pieces(c)
            .map(|pc| {
                let h = (pc.dist - pc.prox) * self.branch_length(c.branch);
                let dr = pc.r_dist - pc.r_prox;
                PI * (pc.r_prox + pc.r_dist) * (h * h + dr * dr).sqrt()
            })
            .sum()
    }

    pub fn integrate_volume(&self, c: &Cable) -> f64 {
        self.pieces(c)
            .map(|pc| {
                let h = (pc.dist - pc.prox) * self.branch_length(c.branch);
                let (ra, rb) = (pc.r_prox, pc.r_dist);
                PI * h * (ra * ra + ra * rb + rb * rb) / 3.0
            })
            .sum()
    }

    /// Integral of 1/(πr²) along a cable, in 1/µm
    pub fn integrate_ixa(&self, c: &Cable) -> f64 {
        self.pieces(c)
            .map(|pc| {
                let h = (pc.dist - pc.prox) * self.branch_length(c.branch);
                if h == 0.0 {
                    0.0
                } else {
                    h / (PI * pc.r_prox * pc.r_dist)
                }
            })
            .sum()
    }

    /// Sub-cables of `c` whose radius satisfies `op` against `value`
    pub fn radius_cmp(&self, c: &Cable, op: RadiusCmp, value: f64) -> Vec<Cable> {
        let mut out = Vec::new();
        let mut keep = |a: f64, b: f64, r_mid: f64| {
            if op.test(r_mid, value) {
                out.push(Cable::new_unchecked(c.branch, a, b));
            }
        };
        for pc in self.pieces(c) {
            if pc.r_prox == pc.r_dist || pc.dist == pc.prox {
                keep(pc.prox, pc.dist, pc.r_prox);
                continue;
            }
            let t = (value - pc.r_prox) / (pc.r_dist - pc.r_prox);
            if t > 0.0 && t < 1.0 {
                let x = lerp(pc.prox, pc.dist, t);
                keep(pc.prox, x, lerp(pc.r_prox, pc.r_dist, t / 2.0));
                keep(x, pc.dist, lerp(pc.r_prox, pc.r_dist, (1.0 + t) / 2.0));
            } else {
                keep(pc.prox, pc.dist, lerp(pc.r_prox, pc.r_dist, 0.5));
            }
        }
        out
    }

    fn pieces<'a>(&'a self, c: &'a Cable) -> impl Iterator<Item = Piece> + 'a {
        let b = c.branch as usize;
        let pos = self.inner.seg_pos.get(b).map(Vec::as_slice).unwrap_or(&[]);
        let radii = self.inner.seg_radius.get(b).map(Vec::as_slice).unwrap_or(&[]);
        radii.iter().enumerate().filter_map(move |(i, &(r0, r1))| {
            let (s0, s1) = (pos[i], pos[i + 1]);
            let a = c.prox_pos.max(s0);
            let z = c.dist_pos.min(s1);
            // a positive-length cable that only touches the segment at one end
            if a > z || (a == z && s0 < s1 && c.prox_pos < c.dist_pos) {
                return None;
            }
            let at = |x: f64| {
                if s1 > s0 {
                    lerp(r0, r1, (x - s0) / (s1 - s0))
                } else {
                    r1
                }
            };
            Some(Piece {
                prox: a,
                dist: z,
                r_prox: at(a),
                r_dist: at(z),
            })
        })
    }
}

#[inline]
pub(crate) fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}
