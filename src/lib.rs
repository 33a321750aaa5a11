#![doc = r#"
GEOHARMONIZE: band harmonization and temporal merge for multi-sensor raster
collections evaluated on lazy remote engines.

Image archives disagree on band names (`SR_B4` vs `B4` vs `red`) and on band
sets (one scene carries `swir2`, the next does not). This crate builds the
execution graph that reconciles them before indices are computed and before
an auxiliary product is joined on a shared key such as `year`. It never
fetches pixels: every stage returns a new `CollectionExpr`, and a separate
`Engine` decides when, where and how often to evaluate it.

Pipeline
--------
raw collection → band map resolution → index computation (optional) →
cleaning → derived-product merge (optional) → consumer.

- Identity band maps add no graph nodes at all.
- Cleaning keeps `desired ∩ image bands`, in desired order, and never rejects
  an image; an image sharing no band becomes an empty-band image.
- Merging always produces the enrichment band: a real auxiliary value when a
  match exists, otherwise a `0` placeholder with the same name.

Quick start: build a plan
-------------------------
```rust
use geoharmonize::{plan, MergeParams, PipelineParams};

fn main() -> geoharmonize::Result<()> {
    let mut params = PipelineParams::default();
    params.merge = Some(MergeParams {
        auxiliary: "projects/landcover/annual".to_string(),
        enrichment_band: "lulc".to_string(),
        primary_bands: vec!["EVI".to_string(), "NDVI".to_string()],
        key: "year".to_string(),
        time_property: "system:time_start".to_string(),
    });

    let plan = plan(&params)?;
    println!("{}", serde_json::to_string_pretty(&plan.collection)?);
    Ok(())
}
```

Building stages by hand
-----------------------
```rust
use geoharmonize::{
    clean_collection, merge_collections, BandMap, CleanOptions, CollectionExpr,
    DesiredBandSet, MergeSpec,
};

fn main() -> geoharmonize::Result<()> {
    let mapping = BandMap::new([("red", "B4"), ("nir", "B8")])?.resolve();
    let renamed = mapping.apply(CollectionExpr::source("COPERNICUS/S2_SR"));

    let desired = DesiredBandSet::new(["red", "nir"])?;
    let cleaned = clean_collection(renamed, &CleanOptions::with_desired(desired));

    let spec = MergeSpec::new("lulc", ["red", "nir"])?;
    let merged = merge_collections(cleaned, CollectionExpr::source("landcover"), &spec);
    println!("{}", merged.stats());
    Ok(())
}
```

Error handling
--------------
All public functions return `geoharmonize::Result<T>`. Configuration and
schema problems are reported while the graph is built, before any engine is
involved; per-image gaps are never errors.

```rust
use geoharmonize::{BandMap, Error};

match BandMap::new([("red", "B4"), ("nir", "B4")]) {
    Err(Error::Configuration { field, reason }) => eprintln!("{field}: {reason}"),
    other => panic!("unexpected: {other:?}"),
}
```

Useful modules
--------------
- [`api`]: high-level entry points.
- [`core`]: graph model, params and processing stages.
- [`engine`]: `Engine` trait and the in-process `LocalEngine`.
- [`types`]: property values, well-known property names, `SpectralIndex`.
- [`error`]: crate-level `Error` and `Result`.
"#]

pub mod api;
pub mod core;
pub mod engine;
pub mod error;
pub mod types;

// Types
pub use crate::core::graph::{
    BandList, BandSelection, CollectionExpr, Filter, GraphStats, ImageExpr, Predicate,
    RenamePair, ValueExpr,
};
pub use crate::core::params::{MergeParams, PipelineParams};
pub use error::{Error, Result};
pub use types::{SpectralIndex, TIME_START, Value, YEAR};

// Stages
pub use crate::core::processing::band_map::{BandMap, BandMapping};
pub use crate::core::processing::clean::{CleanOptions, DesiredBandSet, clean_collection};
pub use crate::core::processing::indices::{
    ExpressionIndexLibrary, IndexLibrary, check_coverage, compute_indices,
};
pub use crate::core::processing::merge::{MergeSpec, PLACEHOLDER_VALUE, merge_collections};
pub use crate::core::processing::pipeline::{
    HarmonizeRequest, HarmonizedPlan, MergeRequest, Stage, harmonize,
};

// Engines
pub use engine::{Engine, Fixtures, Image, LocalEngine, Materialized, MissingBandWarning, Raster};

// High-level API re-exports
pub use api::{HarmonizedRun, ImageSummary, plan, plan_from_path, plan_with_library, run, summarize};
