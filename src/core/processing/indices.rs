//! Index computation adapter.
//!
//! Index math belongs to an external library reached through `IndexLibrary`.
//! The adapter only guarantees the library sees canonical band names: a
//! non-identity band map gets a rename stage first, the identity map is
//! handed over untouched.
use tracing::debug;

use crate::core::graph::{CollectionExpr, ImageExpr};
use crate::core::processing::band_map::{BandMap, BandMapping};
use crate::error::{Error, Result};
use crate::types::SpectralIndex;

/// External index-computation collaborator.
pub trait IndexLibrary {
    fn name(&self) -> &str;

    /// Canonical bands `index` reads.
    fn required_bands(&self, index: SpectralIndex) -> &'static [&'static str];

    /// Append one band per requested index to every image of `collection`.
    fn compute(&self, collection: CollectionExpr, indices: &[SpectralIndex])
    -> Result<CollectionExpr>;
}

/// Library that ships each index to the engine as a formula over canonical
/// band names (`blue`, `green`, `red`, `nir`, `swir1`, `swir2`).
#[derive(Clone, Copy, Debug, Default)]
pub struct ExpressionIndexLibrary;

impl ExpressionIndexLibrary {
    pub fn formula(index: SpectralIndex) -> &'static str {
        match index {
            SpectralIndex::Ndvi => "(nir - red) / (nir + red)",
            SpectralIndex::Evi => "2.5 * (nir - red) / (nir + 6 * red - 7.5 * blue + 1)",
            SpectralIndex::Savi => "1.5 * (nir - red) / (nir + red + 0.5)",
            SpectralIndex::Ndwi => "(green - nir) / (green + nir)",
            SpectralIndex::Mndwi => "(green - swir1) / (green + swir1)",
            SpectralIndex::Nbr => "(nir - swir2) / (nir + swir2)",
        }
    }
}

impl IndexLibrary for ExpressionIndexLibrary {
    fn name(&self) -> &str {
        "expression"
    }

    fn required_bands(&self, index: SpectralIndex) -> &'static [&'static str] {
        match index {
            SpectralIndex::Ndvi | SpectralIndex::Savi => &["nir", "red"],
            SpectralIndex::Evi => &["nir", "red", "blue"],
            SpectralIndex::Ndwi => &["green", "nir"],
            SpectralIndex::Mndwi => &["green", "swir1"],
            SpectralIndex::Nbr => &["nir", "swir2"],
        }
    }

    fn compute(
        &self,
        collection: CollectionExpr,
        indices: &[SpectralIndex],
    ) -> Result<CollectionExpr> {
        if indices.is_empty() {
            return Err(Error::configuration("indices", "no index requested"));
        }
        let body = indices.iter().fold(ImageExpr::element(), |image, index| {
            image.expression(index.band_name(), Self::formula(*index))
        });
        Ok(collection.map(body))
    }
}

/// Fail when `map` lacks a canonical band one of `indices` reads, before any
/// graph exists.
pub fn check_coverage(
    map: &BandMap,
    indices: &[SpectralIndex],
    library: &dyn IndexLibrary,
) -> Result<()> {
    for index in indices {
        if let Some(band) = library
            .required_bands(*index)
            .iter()
            .find(|band| map.sensor_name(band).is_none())
        {
            return Err(Error::configuration(
                "band_map",
                format!("{} reads '{}', which the band map does not cover", index, band),
            ));
        }
    }
    Ok(())
}

/// Compute `indices` on `collection`, renaming sensor bands to canonical
/// names first unless `mapping` is the identity.
pub fn compute_indices(
    collection: CollectionExpr,
    mapping: &BandMapping,
    indices: &[SpectralIndex],
    library: &dyn IndexLibrary,
) -> Result<CollectionExpr> {
    match mapping {
        BandMapping::Identity => {
            debug!("identity band map, delegating to '{}' directly", library.name());
            library.compute(collection, indices)
        }
        BandMapping::Rename(pairs) => {
            debug!(
                "renaming {} sensor bands before '{}'",
                pairs.len(),
                library.name()
            );
            library.compute(mapping.apply(collection), indices)
        }
    }
}
