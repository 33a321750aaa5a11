//! Band map resolution: decides whether a sensor's band names already match
//! the canonical names the index library expects.
use tracing::debug;

use crate::core::graph::{CollectionExpr, ImageExpr, RenamePair};
use crate::error::{Error, Result};

/// Canonical band name → sensor-specific band name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BandMap {
    pairs: Vec<(String, String)>,
}

/// Outcome of resolving a `BandMap`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BandMapping {
    /// Sensor names already are canonical; no graph node may be added.
    Identity,
    /// Sensor → canonical renames, excluding names that map to themselves.
    Rename(Vec<RenamePair>),
}

impl BandMap {
    pub fn new<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let pairs: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        if pairs.is_empty() {
            return Err(Error::configuration("band_map", "mapping is empty"));
        }

        for (i, (canonical, sensor)) in pairs.iter().enumerate() {
            if canonical.trim().is_empty() || sensor.trim().is_empty() {
                return Err(Error::configuration(
                    "band_map",
                    format!("blank band name in pair '{}' -> '{}'", canonical, sensor),
                ));
            }
            let earlier = &pairs[..i];
            if earlier.iter().any(|(c, _)| c == canonical) {
                return Err(Error::configuration(
                    "band_map",
                    format!("canonical band '{}' is mapped twice", canonical),
                ));
            }
            if earlier.iter().any(|(_, s)| s == sensor) {
                return Err(Error::configuration(
                    "band_map",
                    format!("duplicate target band '{}'", sensor),
                ));
            }
        }

        Ok(Self { pairs })
    }

    /// Map where every name stands for itself.
    pub fn identity<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        Self::new(names.iter().map(|n| (n.as_ref(), n.as_ref())))
    }

    pub fn is_identity(&self) -> bool {
        self.pairs.iter().all(|(canonical, sensor)| canonical == sensor)
    }

    pub fn sensor_name(&self, canonical: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(c, _)| c == canonical)
            .map(|(_, s)| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn resolve(&self) -> BandMapping {
        if self.is_identity() {
            debug!("band map of {} bands is the identity", self.pairs.len());
            return BandMapping::Identity;
        }
        let renames: Vec<RenamePair> = self
            .pairs
            .iter()
            .filter(|(canonical, sensor)| canonical != sensor)
            .map(|(canonical, sensor)| RenamePair {
                from: sensor.clone(),
                to: canonical.clone(),
            })
            .collect();
        debug!(
            "band map renames {} of {} bands",
            renames.len(),
            self.pairs.len()
        );
        BandMapping::Rename(renames)
    }
}

impl BandMapping {
    pub fn is_identity(&self) -> bool {
        matches!(self, BandMapping::Identity)
    }

    /// Rename stage for `collection`; the identity returns it untouched.
    pub fn apply(&self, collection: CollectionExpr) -> CollectionExpr {
        match self {
            BandMapping::Identity => collection,
            BandMapping::Rename(pairs) => {
                collection.map(ImageExpr::element().rename(pairs.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_mapped_names_resolve_to_identity() {
        let map = BandMap::new([("B2", "B2"), ("B3", "B3")]).unwrap();
        assert!(map.is_identity());
        assert_eq!(map.resolve(), BandMapping::Identity);
    }

    #[test]
    fn one_differing_pair_makes_it_a_rename() {
        let map = BandMap::new([("blue", "blue"), ("green", "SR_B3")]).unwrap();
        match map.resolve() {
            BandMapping::Rename(pairs) => {
                assert_eq!(
                    pairs,
                    vec![RenamePair {
                        from: "SR_B3".into(),
                        to: "green".into()
                    }]
                );
            }
            BandMapping::Identity => panic!("expected a rename"),
        }
    }

    #[test]
    fn empty_map_is_rejected() {
        let err = BandMap::new(Vec::<(String, String)>::new()).unwrap_err();
        assert!(matches!(err, Error::Configuration { field: "band_map", .. }));
    }

    #[test]
    fn duplicate_targets_are_rejected() {
        let err = BandMap::new([("red", "B4"), ("nir", "B4")]).unwrap_err();
        assert!(err.to_string().contains("duplicate target band 'B4'"));
    }

    #[test]
    fn identity_apply_adds_no_nodes() {
        let source = CollectionExpr::source("S2");
        let out = BandMapping::Identity.apply(source.clone());
        assert_eq!(out, source);
    }

    #[test]
    fn sensor_lookup() {
        let map = BandMap::new([("red", "B4"), ("nir", "B8")]).unwrap();
        assert_eq!(map.sensor_name("nir"), Some("B8"));
        assert_eq!(map.sensor_name("swir1"), None);
    }
}
