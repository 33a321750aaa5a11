//! High-level library API: build a harmonized plan from parameters and,
//! optionally, materialize it with an engine. Prefer these entrypoints over
//! calling the individual processing stages when integrating the pipeline.
use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::core::params::PipelineParams;
use crate::core::processing::indices::{ExpressionIndexLibrary, IndexLibrary};
use crate::core::processing::pipeline::{HarmonizedPlan, harmonize};
use crate::engine::{Engine, Image, Materialized};
use crate::error::Result;
use crate::types::Value;

/// Plan and its materialized output.
#[derive(Debug, Clone)]
pub struct HarmonizedRun {
    pub plan: HarmonizedPlan,
    pub output: Materialized,
}

/// Band and property schema of one materialized image, without pixels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageSummary {
    pub image: String,
    pub bands: Vec<String>,
    /// Constant band values; grid bands are omitted
    pub constants: BTreeMap<String, f64>,
    pub properties: BTreeMap<String, Value>,
}

impl From<&Image> for ImageSummary {
    fn from(img: &Image) -> Self {
        Self {
            image: img.label(),
            bands: img.band_names().into_iter().map(String::from).collect(),
            constants: img
                .bands
                .iter()
                .filter_map(|b| b.data.as_constant().map(|v| (b.name.clone(), v)))
                .collect(),
            properties: img.properties.clone(),
        }
    }
}

/// Build the plan with the bundled expression index library.
pub fn plan(params: &PipelineParams) -> Result<HarmonizedPlan> {
    plan_with_library(params, &ExpressionIndexLibrary)
}

pub fn plan_with_library(
    params: &PipelineParams,
    library: &dyn IndexLibrary,
) -> Result<HarmonizedPlan> {
    let request = params.to_request()?;
    harmonize(request, library)
}

pub fn plan_from_path<P: AsRef<Path>>(config: P) -> Result<HarmonizedPlan> {
    let params = PipelineParams::from_path(config)?;
    plan(&params)
}

/// Build the plan and materialize it. Missing-band reports are logged and
/// returned, never raised.
pub fn run<E: Engine + ?Sized>(params: &PipelineParams, engine: &E) -> Result<HarmonizedRun> {
    let plan = plan(params)?;
    let output = engine.materialize(&plan.collection)?;
    for warning in &output.warnings {
        warn!("{}", warning);
    }
    info!(
        "materialized {} images ({} missing-band reports)",
        output.images.len(),
        output.warnings.len()
    );
    Ok(HarmonizedRun { plan, output })
}

pub fn summarize(images: &[Image]) -> Vec<ImageSummary> {
    images.iter().map(ImageSummary::from).collect()
}
