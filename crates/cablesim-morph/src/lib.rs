// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
# cablesim morphology

Branching cable morphologies and the label algebra used to address them:
- Geometry primitives (locations, cables) and sorted location-list operations
- Segment trees, branch-level morphologies and their metric embedding
- Extents and their decomposition into connected components
- Region and locset expression trees, their textual form and a parser
- Resolution of expressions against a morphology through a provider

## Resolving a label

```rust
use cablesim_morph::{
    LabelDict, Locset, MProvider, Morphology, Point, Region, SegmentTree, Thingify, NPOS,
};

let mut tree = SegmentTree::new();
let soma = tree
    .append(NPOS, Point::new(0.0, 0.0, 0.0, 5.0), Point::new(10.0, 0.0, 0.0, 5.0), 1)
    .unwrap();
tree.append_from_parent(soma, Point::new(110.0, 0.0, 0.0, 1.0), 3).unwrap();

let mut labels = LabelDict::new();
labels.set("dend", "(tag 3)").unwrap();

let provider = MProvider::new(Morphology::new(tree), &labels).unwrap();
let mid = Locset::on_components(0.5, Region::named("dend"))
    .thingify(&provider)
    .unwrap();
assert_eq!(mid.len(), 1);
```

Copyright 2025 Neuraville Inc.
Licensed under the Apache License, Version 2.0
*/

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod algorithms;
pub mod embedding;
pub mod error;
pub mod extent;
pub mod label_dict;
pub mod locset;
pub mod morphology;
pub mod parse;
pub mod primitives;
pub mod provider;
pub mod region;
pub mod sampling;
pub mod segment_tree;

pub use embedding::{Embedding, RadiusCmp};
pub use error::{LabelKind, MorphError, MorphResult};
pub use extent::{components, Extent};
pub use label_dict::LabelDict;
pub use locset::Locset;
pub use morphology::{location_precedes, maxset, minset, Morphology};
pub use parse::{
    parse_label_expression, parse_locset_expression, parse_region_expression, LabelExpression,
};
pub use primitives::{Cable, CableList, Location, LocationList, Point, NPOS};
pub use provider::{thingify, MProvider, Provider, Thingify, DEFAULT_RECURSION_LIMIT};
pub use region::Region;
pub use segment_tree::{Segment, SegmentTree};
