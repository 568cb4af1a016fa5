// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Resolution of label expressions against a concrete morphology.

[`Provider`] is the only portal through which expressions see a morphology,
its embedding and named labels. [`MProvider`] resolves every label of a
[`LabelDict`] once, at construction, and is read-only afterwards, so it can
be shared between threads resolving different expressions.
*/

use crate::embedding::Embedding;
use crate::error::{LabelKind, MorphError, MorphResult};
use crate::extent::Extent;
use crate::label_dict::LabelDict;
use crate::morphology::Morphology;
use crate::primitives::LocationList;
use ahash::AHashMap;
use std::cell::RefCell;
use tracing::{debug, trace};

/// Nesting depth of named references allowed while resolving a label
pub const DEFAULT_RECURSION_LIMIT: usize = 64;

pub trait Provider {
    fn morphology(&self) -> &Morphology;
    fn embedding(&self) -> &Embedding;
    fn region(&self, name: &str) -> MorphResult<Extent>;
    fn locset(&self, name: &str) -> MorphResult<LocationList>;
}

/// Expressions that resolve to a concrete value
pub trait Thingify {
    type Output;

    fn thingify<P: Provider + ?Sized>(&self, p: &P) -> MorphResult<Self::Output>;
}

/// Resolve an expression
pub fn thingify<T, P>(expr: &T, p: &P) -> MorphResult<T::Output>
where
    T: Thingify + ?Sized,
    P: Provider + ?Sized,
{
    expr.thingify(p)
}

#[derive(Debug, Clone)]
pub struct MProvider {
    morphology: Morphology,
    embedding: Embedding,
    regions: AHashMap<String, Extent>,
    locsets: AHashMap<String, LocationList>,
}

impl MProvider {
    pub fn new(morphology: Morphology, labels: &LabelDict) -> MorphResult<Self> {
        Self::with_recursion_limit(morphology, labels, DEFAULT_RECURSION_LIMIT)
    }

    pub fn with_recursion_limit(
        morphology: Morphology,
        labels: &LabelDict,
        limit: usize,
    ) -> MorphResult<Self> {
        let embedding = Embedding::new(&morphology);
        let resolver = LabelResolver {
            morphology: &morphology,
            embedding: &embedding,
            labels,
            limit,
            regions: RefCell::new(AHashMap::new()),
            locsets: RefCell::new(AHashMap::new()),
            in_progress: RefCell::new(Vec::new()),
        };

        // BTreeMap iteration keeps the resolution order stable
        for name in labels.regions().keys() {
            resolver.region(name)?;
        }
        for name in labels.locsets().keys() {
            resolver.locset(name)?;
        }

        let regions = resolver.regions.into_inner();
        let locsets = resolver.locsets.into_inner();
        debug!(
            target: "cablesim-morph",
            regions = regions.len(),
            locsets = locsets.len(),
            branches = morphology.num_branches(),
            "resolved label dictionary"
        );

        Ok(Self {
            morphology,
            embedding,
            regions,
            locsets,
        })
    }

    /// Provider without any labels
    pub fn unlabelled(morphology: Morphology) -> Self {
        let embedding = Embedding::new(&morphology);
        Self {
            morphology,
            embedding,
            regions: AHashMap::new(),
            locsets: AHashMap::new(),
        }
    }

    pub fn resolved_region(&self, name: &str) -> Option<&Extent> {
        self.regions.get(name)
    }

    pub fn resolved_locset(&self, name: &str) -> Option<&LocationList> {
        self.locsets.get(name)
    }
}

impl Provider for MProvider {
    fn morphology(&self) -> &Morphology {
        &self.morphology
    }

    fn embedding(&self) -> &Embedding {
        &self.embedding
    }

    fn region(&self, name: &str) -> MorphResult<Extent> {
        self.regions
            .get(name)
            .cloned()
            .ok_or_else(|| MorphError::UnknownLabel {
                kind: LabelKind::Region,
                name: name.to_string(),
            })
    }

    fn locset(&self, name: &str) -> MorphResult<LocationList> {
        self.locsets
            .get(name)
            .cloned()
            .ok_or_else(|| MorphError::UnknownLabel {
                kind: LabelKind::Locset,
                name: name.to_string(),
            })
    }
}

/// Memoizing resolver used while an `MProvider` is being built
struct LabelResolver<'a> {
    morphology: &'a Morphology,
    embedding: &'a Embedding,
    labels: &'a LabelDict,
    limit: usize,
    regions: RefCell<AHashMap<String, Extent>>,
    locsets: RefCell<AHashMap<String, LocationList>>,
    in_progress: RefCell<Vec<String>>,
}

impl LabelResolver<'_> {
    fn enter(&self, name: &str) -> MorphResult<()> {
        let mut stack = self.in_progress.borrow_mut();
        if let Some(i) = stack.iter().position(|n| n == name) {
            let mut chain = stack[i..].to_vec();
            chain.push(name.to_string());
            return Err(MorphError::CircularDefinition { chain });
        }
        if stack.len() >= self.limit {
            return Err(MorphError::RecursionLimit {
                name: name.to_string(),
                limit: self.limit,
            });
        }
        stack.push(name.to_string());
        Ok(())
    }

    fn leave(&self) {
        self.in_progress.borrow_mut().pop();
    }
}

impl Provider for LabelResolver<'_> {
    fn morphology(&self) -> &Morphology {
        self.morphology
    }

    fn embedding(&self) -> &Embedding {
        self.embedding
    }

    fn region(&self, name: &str) -> MorphResult<Extent> {
        if let Some(e) = self.regions.borrow().get(name) {
            return Ok(e.clone());
        }
        let expr = self
            .labels
            .region(name)
            .ok_or_else(|| MorphError::UnknownLabel {
                kind: LabelKind::Region,
                name: name.to_string(),
            })?;

        self.enter(name)?;
        trace!(target: "cablesim-morph", label = name, "resolving region");
        let result = crate::provider::thingify(expr, self);
        self.leave();

        let extent = result?;
        self.regions
            .borrow_mut()
            .insert(name.to_string(), extent.clone());
        Ok(extent)
    }

    fn locset(&self, name: &str) -> MorphResult<LocationList> {
        if let Some(l) = self.locsets.borrow().get(name) {
            return Ok(l.clone());
        }
        let expr = self
            .labels
            .locset(name)
            .ok_or_else(|| MorphError::UnknownLabel {
                kind: LabelKind::Locset,
                name: name.to_string(),
            })?;

        self.enter(name)?;
        trace!(target: "cablesim-morph", label = name, "resolving locset");
        let result = crate::provider::thingify(expr, self);
        self.leave();

        let locs = result?;
        self.locsets
            .borrow_mut()
            .insert(name.to_string(), locs.clone());
        Ok(locs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locset::Locset;
    use crate::primitives::{Location, Point, NPOS};
    use crate::region::Region;
    use crate::segment_tree::SegmentTree;

    fn morph() -> Morphology {
        let mut t = SegmentTree::new();
        let s0 = t
            .append(NPOS, Point::new(0.0, 0.0, 0.0, 1.0), Point::new(10.0, 0.0, 0.0, 1.0), 1)
            .unwrap();
        t.append_from_parent(s0, Point::new(20.0, 0.0, 0.0, 1.0), 3).unwrap();
        t.append_from_parent(s0, Point::new(10.0, 10.0, 0.0, 1.0), 3).unwrap();
        Morphology::new(t)
    }

    #[test]
    fn test_forward_references() {
        let mut d = LabelDict::new();
        d.set("tips", "(distal (region \"dend\"))").unwrap();
        d.set("dend", "(tag 3)").unwrap();

        let p = MProvider::new(morph(), &d).unwrap();
        assert_eq!(
            p.locset("tips").unwrap(),
            vec![Location::new_unchecked(1, 1.0), Location::new_unchecked(2, 1.0)]
        );
        assert_eq!(p.region("dend").unwrap().len(), 2);
    }

    #[test]
    fn test_unknown_label() {
        let mut d = LabelDict::new();
        d.set("x", "(join (tag 1) (region \"missing\"))").unwrap();
        assert_eq!(
            MProvider::new(morph(), &d).unwrap_err(),
            MorphError::UnknownLabel {
                kind: LabelKind::Region,
                name: "missing".into()
            }
        );

        let p = MProvider::unlabelled(morph());
        assert!(p.locset("anything").is_err());
    }

    #[test]
    fn test_cycle_detection() {
        let mut d = LabelDict::new();
        d.set_region("a", Region::join(Region::named("b"), Region::tagged(1)))
            .unwrap();
        d.set_region("b", Region::complete(Region::named("a"))).unwrap();

        match MProvider::new(morph(), &d) {
            Err(MorphError::CircularDefinition { chain }) => {
                assert_eq!(chain, vec!["a", "b", "a"]);
            }
            other => panic!("expected a cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_recursion_limit() {
        let mut d = LabelDict::new();
        // l0 -> l1 -> ... -> l9, resolved from l0 so the chain is walked in full
        for i in 0..9 {
            d.set_locset(format!("l{}", i), Locset::named(format!("l{}", i + 1)))
                .unwrap();
        }
        d.set_locset("l9", Locset::root()).unwrap();
        assert!(MProvider::with_recursion_limit(morph(), &d, 16).is_ok());
        assert!(matches!(
            MProvider::with_recursion_limit(morph(), &d, 4),
            Err(MorphError::RecursionLimit { limit: 4, .. })
        ));
    }

    #[test]
    fn test_provider_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MProvider>();
    }
}
