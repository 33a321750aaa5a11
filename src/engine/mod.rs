//! Engine boundary: turning a graph into concrete images.
//!
//! Graph construction never calls into an engine; materializing is the
//! caller's job and may be slow, retried or evaluated out of order. The
//! `LocalEngine` evaluates graphs over in-memory collections and is what the
//! CLI `run` command and the integration tests use.
pub mod expression;
pub mod image;
pub mod local;

pub use expression::Formula;
pub use image::{Band, Fixtures, Image, Raster};
pub use local::LocalEngine;

use serde::Serialize;

use crate::core::graph::CollectionExpr;
use crate::error::Result;

/// Remote or local executor of collection graphs.
pub trait Engine {
    fn materialize(&self, collection: &CollectionExpr) -> Result<Materialized>;
}

/// Non-fatal report: an image lacked some bands it was asked to keep.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MissingBandWarning {
    pub image: String,
    pub missing: Vec<String>,
}

impl std::fmt::Display for MissingBandWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "image {} lacks bands [{}]",
            self.image,
            self.missing.join(", ")
        )
    }
}

#[derive(Clone, Debug, Default)]
pub struct Materialized {
    pub images: Vec<Image>,
    pub warnings: Vec<MissingBandWarning>,
}
