//! End-to-end harmonization: band map → indices → cleaning → merge.
use serde::Serialize;
use tracing::{debug, info};

use crate::core::graph::{CollectionExpr, GraphStats};
use crate::core::processing::band_map::BandMap;
use crate::core::processing::clean::{CleanOptions, clean_collection};
use crate::core::processing::indices::{IndexLibrary, check_coverage, compute_indices};
use crate::core::processing::merge::{MergeSpec, merge_collections};
use crate::error::{Error, Result};
use crate::types::SpectralIndex;

/// Validated inputs of one pipeline invocation.
#[derive(Debug, Clone)]
pub struct HarmonizeRequest {
    pub source: CollectionExpr,
    pub band_map: Option<BandMap>,
    pub indices: Vec<SpectralIndex>,
    pub clean: CleanOptions,
    pub merge: Option<MergeRequest>,
}

#[derive(Debug, Clone)]
pub struct MergeRequest {
    pub auxiliary: CollectionExpr,
    pub spec: MergeSpec,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Rename,
    Indices,
    Clean,
    Merge,
}

/// Output graph handed to the downstream consumer.
#[derive(Debug, Clone, Serialize)]
pub struct HarmonizedPlan {
    pub stages: Vec<Stage>,
    pub stats: GraphStats,
    /// Band schema every element ends with, when statically known.
    pub output_bands: Option<Vec<String>>,
    pub collection: CollectionExpr,
}

pub fn harmonize(request: HarmonizeRequest, library: &dyn IndexLibrary) -> Result<HarmonizedPlan> {
    let HarmonizeRequest {
        source,
        band_map,
        indices,
        clean,
        merge,
    } = request;
    let mut stages = Vec::new();
    let mut collection = source;

    match (&band_map, indices.is_empty()) {
        (None, false) => {
            return Err(Error::configuration(
                "band_map",
                "indices were requested without a band map",
            ));
        }
        (Some(map), false) => {
            check_coverage(map, &indices, library)?;
            let mapping = map.resolve();
            if !mapping.is_identity() {
                stages.push(Stage::Rename);
            }
            collection = compute_indices(collection, &mapping, &indices, library)?;
            stages.push(Stage::Indices);
        }
        (Some(map), true) if !map.is_identity() => {
            collection = map.resolve().apply(collection);
            stages.push(Stage::Rename);
        }
        _ => debug!("no index or rename stage requested"),
    }

    collection = clean_collection(collection, &clean);
    stages.push(Stage::Clean);

    let output_bands = match merge {
        Some(MergeRequest { auxiliary, spec }) => {
            collection = merge_collections(collection, auxiliary, &spec);
            stages.push(Stage::Merge);
            Some(spec.output_bands())
        }
        None => None,
    };

    let stats = collection.stats();
    info!("harmonized plan built: {}", stats);

    Ok(HarmonizedPlan {
        stages,
        stats,
        output_bands,
        collection,
    })
}
