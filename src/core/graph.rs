//! Lazy execution graph.
//!
//! Stages never touch pixels: they return new `CollectionExpr` values that
//! describe what an engine should compute. Per-element transforms are
//! `ImageExpr` trees whose only input is the element being mapped
//! (`ImageExpr::Element`); any configuration they need (band lists, rename
//! pairs, filter keys) is stored inside the node as an immutable value.
//!
//! Every type serializes to JSON tagged by `op`, which is the form handed to
//! remote engines and printed by `geoharmonize plan`.
use serde::{Deserialize, Serialize};

use crate::types::Value;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CollectionExpr {
    /// Archive query or precomputed product, resolved by the engine.
    Source { id: String },
    /// Apply `body` to every element independently.
    Map {
        input: Box<CollectionExpr>,
        body: Box<ImageExpr>,
    },
    /// Keep elements matching `filter`.
    Filter {
        input: Box<CollectionExpr>,
        filter: Filter,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ImageExpr {
    /// The element of the innermost enclosing `Map`.
    Element,
    /// Keep only the selected bands; properties are preserved.
    Select {
        image: Box<ImageExpr>,
        bands: BandSelection,
    },
    /// Rename bands that are present; absent `from` names are skipped.
    Rename {
        image: Box<ImageExpr>,
        pairs: Vec<RenamePair>,
    },
    /// Append band `output` computed from `formula` over the image's bands.
    Expression {
        image: Box<ImageExpr>,
        output: String,
        formula: String,
    },
    /// Brand-new image concatenating the bands of `parts`, with no properties.
    Compose { parts: Vec<ImageExpr> },
    /// Single constant band without properties.
    Constant { band: String, value: f64 },
    /// Copy the listed properties of `source` onto `image`.
    CopyProperties {
        image: Box<ImageExpr>,
        source: Box<ImageExpr>,
        properties: Vec<String>,
    },
    /// First element of a collection, in engine iteration order.
    First { collection: Box<CollectionExpr> },
    Conditional {
        test: Predicate,
        then: Box<ImageExpr>,
        otherwise: Box<ImageExpr>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenamePair {
    pub from: String,
    pub to: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BandSelection {
    /// Every listed band must exist on the image.
    Exact { bands: Vec<String> },
    /// Listed bands the image actually has, in list order. Never fails.
    Intersect { desired: BandList },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BandList {
    Literal { names: Vec<String> },
    /// Band names of the first element of `collection`.
    FirstImageBands { collection: Box<CollectionExpr> },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Filter {
    /// Candidate's `property` equals `value`.
    PropertyEquals { property: String, value: ValueExpr },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueExpr {
    Literal { value: Value },
    /// Property of the element of the innermost enclosing `Map`.
    ElementProperty { name: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    NonEmpty { collection: Box<CollectionExpr> },
    /// The image carries a band with this exact name.
    HasBand { image: Box<ImageExpr>, band: String },
}

impl Predicate {
    pub fn non_empty(collection: CollectionExpr) -> Self {
        Predicate::NonEmpty {
            collection: Box::new(collection),
        }
    }

    pub fn has_band(image: ImageExpr, band: impl Into<String>) -> Self {
        Predicate::HasBand {
            image: Box::new(image),
            band: band.into(),
        }
    }
}

impl CollectionExpr {
    pub fn source(id: impl Into<String>) -> Self {
        CollectionExpr::Source { id: id.into() }
    }

    pub fn map(self, body: ImageExpr) -> Self {
        CollectionExpr::Map {
            input: Box::new(self),
            body: Box::new(body),
        }
    }

    pub fn filter(self, filter: Filter) -> Self {
        CollectionExpr::Filter {
            input: Box::new(self),
            filter,
        }
    }

    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats::default();
        stats.depth = visit_collection(self, &mut stats);
        stats
    }
}

impl ImageExpr {
    pub fn element() -> Self {
        ImageExpr::Element
    }

    pub fn constant(band: impl Into<String>, value: f64) -> Self {
        ImageExpr::Constant {
            band: band.into(),
            value,
        }
    }

    pub fn compose(parts: Vec<ImageExpr>) -> Self {
        ImageExpr::Compose { parts }
    }

    pub fn first(collection: CollectionExpr) -> Self {
        ImageExpr::First {
            collection: Box::new(collection),
        }
    }

    pub fn conditional(test: Predicate, then: ImageExpr, otherwise: ImageExpr) -> Self {
        ImageExpr::Conditional {
            test,
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    pub fn select(self, bands: BandSelection) -> Self {
        ImageExpr::Select {
            image: Box::new(self),
            bands,
        }
    }

    pub fn select_exact<S: AsRef<str>>(self, bands: &[S]) -> Self {
        self.select(BandSelection::Exact {
            bands: bands.iter().map(|b| b.as_ref().to_string()).collect(),
        })
    }

    pub fn rename(self, pairs: Vec<RenamePair>) -> Self {
        ImageExpr::Rename {
            image: Box::new(self),
            pairs,
        }
    }

    pub fn expression(self, output: impl Into<String>, formula: impl Into<String>) -> Self {
        ImageExpr::Expression {
            image: Box::new(self),
            output: output.into(),
            formula: formula.into(),
        }
    }

    pub fn copy_properties<S: AsRef<str>>(self, source: ImageExpr, properties: &[S]) -> Self {
        ImageExpr::CopyProperties {
            image: Box::new(self),
            source: Box::new(source),
            properties: properties.iter().map(|p| p.as_ref().to_string()).collect(),
        }
    }
}

impl Filter {
    /// Candidate property equals the same property of the mapped element.
    pub fn matches_element(property: impl Into<String>) -> Self {
        let property = property.into();
        Filter::PropertyEquals {
            value: ValueExpr::ElementProperty {
                name: property.clone(),
            },
            property,
        }
    }
}

/// Size summary of a graph, used to compare plans and to watch the
/// engine-side complexity limits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub depth: usize,
    pub maps: usize,
    pub filters: usize,
    pub renames: usize,
    pub selects: usize,
    pub expressions: usize,
}

impl std::fmt::Display for GraphStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "nodes={} depth={} maps={} filters={} renames={} selects={} expressions={}",
            self.nodes,
            self.depth,
            self.maps,
            self.filters,
            self.renames,
            self.selects,
            self.expressions
        )
    }
}

// Each visitor returns the depth of the subtree rooted at the node.
fn visit_collection(expr: &CollectionExpr, stats: &mut GraphStats) -> usize {
    stats.nodes += 1;
    match expr {
        CollectionExpr::Source { .. } => 1,
        CollectionExpr::Map { input, body } => {
            stats.maps += 1;
            1 + visit_collection(input, stats).max(visit_image(body, stats))
        }
        CollectionExpr::Filter { input, .. } => {
            stats.filters += 1;
            let inner = visit_collection(input, stats);
            // the compared value is a leaf of its own
            stats.nodes += 1;
            1 + inner.max(1)
        }
    }
}

fn visit_image(expr: &ImageExpr, stats: &mut GraphStats) -> usize {
    stats.nodes += 1;
    match expr {
        ImageExpr::Element | ImageExpr::Constant { .. } => 1,
        ImageExpr::Select { image, bands } => {
            stats.selects += 1;
            let list_depth = match bands {
                BandSelection::Exact { .. } => 0,
                BandSelection::Intersect { desired } => visit_band_list(desired, stats),
            };
            1 + visit_image(image, stats).max(list_depth)
        }
        ImageExpr::Rename { image, .. } => {
            stats.renames += 1;
            1 + visit_image(image, stats)
        }
        ImageExpr::Expression { image, .. } => {
            stats.expressions += 1;
            1 + visit_image(image, stats)
        }
        ImageExpr::Compose { parts } => {
            1 + parts
                .iter()
                .map(|p| visit_image(p, stats))
                .max()
                .unwrap_or(0)
        }
        ImageExpr::CopyProperties { image, source, .. } => {
            1 + visit_image(image, stats).max(visit_image(source, stats))
        }
        ImageExpr::First { collection } => 1 + visit_collection(collection, stats),
        ImageExpr::Conditional {
            test,
            then,
            otherwise,
        } => {
            let test_depth = match test {
                Predicate::NonEmpty { collection } => visit_collection(collection, stats),
                Predicate::HasBand { image, .. } => visit_image(image, stats),
            };
            let then_depth = visit_image(then, stats);
            let else_depth = visit_image(otherwise, stats);
            1 + test_depth.max(then_depth).max(else_depth)
        }
    }
}

fn visit_band_list(list: &BandList, stats: &mut GraphStats) -> usize {
    match list {
        BandList::Literal { .. } => 0,
        BandList::FirstImageBands { collection } => visit_collection(collection, stats),
    }
}
