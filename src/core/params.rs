use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::graph::CollectionExpr;
use crate::core::processing::band_map::BandMap;
use crate::core::processing::clean::{CleanOptions, DesiredBandSet};
use crate::core::processing::merge::MergeSpec;
use crate::core::processing::pipeline::{HarmonizeRequest, MergeRequest};
use crate::error::{Error, Result};
use crate::types::{SpectralIndex, TIME_START, YEAR};

/// Pipeline parameters suitable for config files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineParams {
    /// Archive collection id the engine resolves
    pub source: String,
    /// Canonical band name -> sensor band name, in file order. Written as
    /// a JSON object; repeated keys are kept so validation can reject them.
    #[serde(default, with = "band_pairs")]
    pub band_map: Option<Vec<(String, String)>>,
    #[serde(default)]
    pub indices: Vec<SpectralIndex>,
    /// None keeps the bands of the collection's first image
    #[serde(default)]
    pub desired_bands: Option<Vec<String>>,
    #[serde(default)]
    pub merge: Option<MergeParams>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeParams {
    /// Collection id of the auxiliary product
    pub auxiliary: String,
    pub enrichment_band: String,
    pub primary_bands: Vec<String>,
    #[serde(default = "default_key")]
    pub key: String,
    #[serde(default = "default_time_property")]
    pub time_property: String,
}

mod band_pairs {
    use std::fmt;

    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};

    type Pairs = Option<Vec<(String, String)>>;

    pub fn serialize<S: Serializer>(pairs: &Pairs, s: S) -> Result<S::Ok, S::Error> {
        match pairs {
            None => s.serialize_none(),
            Some(pairs) => {
                let mut map = s.serialize_map(Some(pairs.len()))?;
                for (canonical, sensor) in pairs {
                    map.serialize_entry(canonical, sensor)?;
                }
                map.end()
            }
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Pairs, D::Error> {
        d.deserialize_option(OptionalPairs)
    }

    struct OptionalPairs;

    impl<'de> Visitor<'de> for OptionalPairs {
        type Value = Pairs;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an object of canonical -> sensor band names, or null")
        }

        fn visit_none<E: serde::de::Error>(self) -> Result<Pairs, E> {
            Ok(None)
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<Pairs, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Pairs, D::Error> {
            d.deserialize_map(OptionalPairs)
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Pairs, A::Error> {
            let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(pair) = map.next_entry::<String, String>()? {
                pairs.push(pair);
            }
            Ok(Some(pairs))
        }
    }
}

fn default_key() -> String {
    YEAR.to_string()
}

fn default_time_property() -> String {
    TIME_START.to_string()
}

impl Default for PipelineParams {
    fn default() -> Self {
        let band_map = [
            ("blue", "SR_B2"),
            ("green", "SR_B3"),
            ("red", "SR_B4"),
            ("nir", "SR_B5"),
            ("swir1", "SR_B6"),
            ("swir2", "SR_B7"),
        ]
        .into_iter()
        .map(|(c, s)| (c.to_string(), s.to_string()))
        .collect();

        Self {
            source: "LANDSAT/LC08/C02/T1_L2".to_string(),
            band_map: Some(band_map),
            indices: vec![SpectralIndex::Evi, SpectralIndex::Ndvi],
            desired_bands: Some(vec!["EVI".into(), "NDVI".into(), "swir2".into()]),
            merge: None,
        }
    }
}

impl PipelineParams {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Validate everything and turn the params into typed stage inputs.
    /// Nothing is built when any part is malformed.
    pub fn to_request(&self) -> Result<HarmonizeRequest> {
        if self.source.trim().is_empty() {
            return Err(Error::configuration("source", "collection id is blank"));
        }

        let band_map = self
            .band_map
            .as_ref()
            .map(|m| BandMap::new(m.iter().map(|(c, s)| (c.as_str(), s.as_str()))))
            .transpose()?;

        if !self.indices.is_empty() && band_map.is_none() {
            return Err(Error::configuration(
                "band_map",
                "indices were requested without a band map",
            ));
        }
        for (i, index) in self.indices.iter().enumerate() {
            if self.indices[..i].contains(index) {
                return Err(Error::configuration(
                    "indices",
                    format!("{} requested twice", index),
                ));
            }
        }

        let desired = self
            .desired_bands
            .as_ref()
            .map(|names| DesiredBandSet::new(names.iter().map(String::as_str)))
            .transpose()?;

        let merge = match &self.merge {
            Some(m) => Some(m.to_request(desired.as_ref())?),
            None => None,
        };

        Ok(HarmonizeRequest {
            source: CollectionExpr::source(self.source.as_str()),
            band_map,
            indices: self.indices.clone(),
            clean: CleanOptions { desired },
            merge,
        })
    }
}

impl MergeParams {
    fn to_request(&self, desired: Option<&DesiredBandSet>) -> Result<MergeRequest> {
        if self.auxiliary.trim().is_empty() {
            return Err(Error::configuration(
                "merge.auxiliary",
                "collection id is blank",
            ));
        }
        let spec = MergeSpec::new(self.enrichment_band.as_str(), self.primary_bands.iter().cloned())?
            .with_key(self.key.as_str())?
            .with_time_property(self.time_property.as_str())?;

        // cleaned images can only offer what the desired set keeps
        if let Some(desired) = desired {
            if let Some(band) = spec
                .primary_bands()
                .iter()
                .find(|b| !desired.names().contains(*b))
            {
                return Err(Error::configuration(
                    "merge.primary_bands",
                    format!("'{}' is not in the desired band set", band),
                ));
            }
        }

        Ok(MergeRequest {
            auxiliary: CollectionExpr::source(self.auxiliary.as_str()),
            spec,
        })
    }
}
