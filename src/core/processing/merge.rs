//! Derived-product merge: attach one auxiliary enrichment band to every
//! primary image, paired by a shared property such as `year`.
//!
//! Each merged image is built fresh from an explicit subset of the primary
//! image's bands plus the enrichment band, and receives exactly two
//! properties: the merge key and the start-time marker. Copying the whole
//! primary image would carry along properties that may reference bands the
//! new image no longer has.
//!
//! A primary band the element lacks (the cleaner keeps such images) is
//! filled with the same zero placeholder as an unmatched enrichment band,
//! so every merged image ends up with the identical band list.
//!
//! When several auxiliary images share a key, the first one in engine
//! iteration order wins. That order is arbitrary; deduplicate the auxiliary
//! collection by key beforehand when the choice matters.
use tracing::debug;

use crate::core::graph::{CollectionExpr, Filter, ImageExpr, Predicate};
use crate::error::{Error, Result};
use crate::types::{TIME_START, YEAR};

/// Value of the synthesized enrichment band when no auxiliary image matches.
pub const PLACEHOLDER_VALUE: f64 = 0.0;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeSpec {
    key: String,
    time_property: String,
    enrichment_band: String,
    primary_bands: Vec<String>,
}

impl MergeSpec {
    /// Merge on `year`, carrying `system:time_start`.
    pub fn new<S: Into<String>>(
        enrichment_band: impl Into<String>,
        primary_bands: impl IntoIterator<Item = S>,
    ) -> Result<Self> {
        let spec = Self {
            key: YEAR.to_string(),
            time_property: TIME_START.to_string(),
            enrichment_band: enrichment_band.into(),
            primary_bands: primary_bands.into_iter().map(Into::into).collect(),
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Result<Self> {
        self.key = key.into();
        self.validate()?;
        Ok(self)
    }

    pub fn with_time_property(mut self, property: impl Into<String>) -> Result<Self> {
        self.time_property = property.into();
        self.validate()?;
        Ok(self)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn enrichment_band(&self) -> &str {
        &self.enrichment_band
    }

    pub fn primary_bands(&self) -> &[String] {
        &self.primary_bands
    }

    /// The only properties a merged image carries.
    pub fn carried_properties(&self) -> [&str; 2] {
        [&self.key, &self.time_property]
    }

    /// Band schema shared by every merged image.
    pub fn output_bands(&self) -> Vec<String> {
        let mut bands = self.primary_bands.clone();
        bands.push(self.enrichment_band.clone());
        bands
    }

    fn validate(&self) -> Result<()> {
        if self.key.trim().is_empty() {
            return Err(Error::configuration("merge.key", "merge key is blank"));
        }
        if self.time_property.trim().is_empty() {
            return Err(Error::configuration(
                "merge.time_property",
                "time property is blank",
            ));
        }
        if self.key == self.time_property {
            return Err(Error::configuration(
                "merge.time_property",
                format!("'{}' is already the merge key", self.key),
            ));
        }
        if self.enrichment_band.trim().is_empty() {
            return Err(Error::configuration(
                "merge.enrichment_band",
                "enrichment band is blank",
            ));
        }
        if self.primary_bands.is_empty() {
            return Err(Error::configuration(
                "merge.primary_bands",
                "at least one primary band must be kept",
            ));
        }
        for (i, band) in self.primary_bands.iter().enumerate() {
            if self.primary_bands[..i].contains(band) {
                return Err(Error::configuration(
                    "merge.primary_bands",
                    format!("band '{}' listed twice", band),
                ));
            }
        }
        if self.primary_bands.contains(&self.enrichment_band) {
            return Err(Error::schema(
                self.enrichment_band.clone(),
                "enrichment band collides with a primary band",
            ));
        }
        Ok(())
    }
}

/// Pair every primary image with its auxiliary match and attach the
/// enrichment band, or a zero-valued placeholder of the same name.
/// Missing primary bands are padded the same way.
pub fn merge_collections(
    primary: CollectionExpr,
    auxiliary: CollectionExpr,
    spec: &MergeSpec,
) -> CollectionExpr {
    debug!(
        "merging '{}' on '{}' into bands {:?}",
        spec.enrichment_band, spec.key, spec.primary_bands
    );

    let matches = auxiliary.filter(Filter::matches_element(spec.key.as_str()));
    let enrichment = ImageExpr::conditional(
        Predicate::non_empty(matches.clone()),
        ImageExpr::first(matches).select_exact(&[spec.enrichment_band.as_str()]),
        ImageExpr::constant(spec.enrichment_band.as_str(), PLACEHOLDER_VALUE),
    );

    let mut parts: Vec<ImageExpr> = spec
        .primary_bands
        .iter()
        .map(|band| {
            ImageExpr::conditional(
                Predicate::has_band(ImageExpr::element(), band.as_str()),
                ImageExpr::element().select_exact(&[band.as_str()]),
                ImageExpr::constant(band.as_str(), PLACEHOLDER_VALUE),
            )
        })
        .collect();
    parts.push(enrichment);

    let body = ImageExpr::compose(parts)
        .copy_properties(ImageExpr::element(), &spec.carried_properties());

    primary.map(body)
}
