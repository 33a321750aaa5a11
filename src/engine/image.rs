//! Materialized images, as returned by an engine or loaded from fixtures.
use std::collections::BTreeMap;
use std::path::Path;

use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{SYSTEM_INDEX, Value};

/// Band payload. Constant bands stand for an image of unbounded extent,
/// so they combine with grids of any shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Raster {
    Constant(f64),
    Grid(Array2<f64>),
}

impl Raster {
    pub fn as_constant(&self) -> Option<f64> {
        match self {
            Raster::Constant(v) => Some(*v),
            Raster::Grid(_) => None,
        }
    }

    /// Element-wise combination, broadcasting constants.
    pub fn zip_with(&self, other: &Raster, f: fn(f64, f64) -> f64) -> Result<Raster> {
        Ok(match (self, other) {
            (Raster::Constant(a), Raster::Constant(b)) => Raster::Constant(f(*a, *b)),
            (Raster::Grid(a), Raster::Constant(b)) => {
                let b = *b;
                Raster::Grid(a.mapv(|x| f(x, b)))
            }
            (Raster::Constant(a), Raster::Grid(b)) => {
                let a = *a;
                Raster::Grid(b.mapv(|y| f(a, y)))
            }
            (Raster::Grid(a), Raster::Grid(b)) => {
                if a.dim() != b.dim() {
                    return Err(Error::Evaluation(format!(
                        "raster size mismatch: {:?} vs {:?}",
                        a.dim(),
                        b.dim()
                    )));
                }
                Raster::Grid(Zip::from(a).and(b).par_map_collect(|&x, &y| f(x, y)))
            }
        })
    }

    pub fn map(&self, f: fn(f64) -> f64) -> Raster {
        match self {
            Raster::Constant(v) => Raster::Constant(f(*v)),
            Raster::Grid(a) => Raster::Grid(a.mapv(f)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub name: String,
    pub data: Raster,
}

/// Ordered bands plus scalar properties. Band names are unique.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    #[serde(default)]
    pub bands: Vec<Band>,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

impl Image {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form; a band with the same name is replaced in place.
    pub fn with_band(mut self, name: impl Into<String>, data: Raster) -> Self {
        let name = name.into();
        match self.bands.iter_mut().find(|b| b.name == name) {
            Some(band) => band.data = data,
            None => self.bands.push(Band { name, data }),
        }
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Append a band, refusing duplicates.
    pub fn add_band(&mut self, band: Band) -> Result<()> {
        if self.band(&band.name).is_some() {
            return Err(Error::Evaluation(format!(
                "band '{}' already exists on image {}",
                band.name,
                self.label()
            )));
        }
        self.bands.push(band);
        Ok(())
    }

    pub fn band(&self, name: &str) -> Option<&Raster> {
        self.bands.iter().find(|b| b.name == name).map(|b| &b.data)
    }

    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(|b| b.name.as_str()).collect()
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn property_names(&self) -> Vec<&str> {
        self.properties.keys().map(String::as_str).collect()
    }

    pub fn label(&self) -> String {
        match self.property(SYSTEM_INDEX) {
            Some(v) => v.to_string(),
            None => "<unindexed>".to_string(),
        }
    }
}

/// In-memory collections keyed by id, as read from a JSON fixture file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Fixtures {
    pub collections: BTreeMap<String, Vec<Image>>,
}

impl Fixtures {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn constants_broadcast_over_grids() {
        let grid = Raster::Grid(array![[1.0, 2.0], [3.0, 4.0]]);
        let out = grid.zip_with(&Raster::Constant(1.0), |a, b| a + b).unwrap();
        assert_eq!(out, Raster::Grid(array![[2.0, 3.0], [4.0, 5.0]]));
    }

    #[test]
    fn mismatched_grids_fail() {
        let a = Raster::Grid(Array2::zeros((2, 2)));
        let b = Raster::Grid(Array2::zeros((3, 2)));
        assert!(matches!(a.zip_with(&b, |x, y| x + y), Err(Error::Evaluation(_))));
    }

    #[test]
    fn band_names_stay_unique() {
        let mut img = Image::new()
            .with_band("NDVI", Raster::Constant(0.1))
            .with_band("NDVI", Raster::Constant(0.2));
        assert_eq!(img.band_names(), vec!["NDVI"]);
        assert_eq!(img.band("NDVI"), Some(&Raster::Constant(0.2)));

        let dup = Band {
            name: "NDVI".into(),
            data: Raster::Constant(0.0),
        };
        assert!(img.add_band(dup).is_err());
    }

    #[test]
    fn fixture_json_shape() {
        let json = r#"{
            "collections": {
                "S2": [
                    {
                        "bands": [
                            {"name": "B4", "data": 0.2},
                            {"name": "B8", "data": {"v": 1, "dim": [1, 2], "data": [0.5, 0.6]}}
                        ],
                        "properties": {"year": 2020}
                    }
                ]
            }
        }"#;
        let fixtures: Fixtures = serde_json::from_str(json).unwrap();
        let img = &fixtures.collections["S2"][0];
        assert_eq!(img.band("B4"), Some(&Raster::Constant(0.2)));
        assert_eq!(img.band("B8"), Some(&Raster::Grid(array![[0.5, 0.6]])));
        assert_eq!(img.property("year"), Some(&Value::Int(2020)));
    }
}
