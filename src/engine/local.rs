use std::collections::HashMap;

use ndarray::parallel::prelude::*;
use tracing::{debug, warn};

use crate::core::graph::{
    BandList, BandSelection, CollectionExpr, Filter, ImageExpr, Predicate, ValueExpr,
};
use crate::engine::expression::Formula;
use crate::engine::image::{Band, Fixtures, Image, Raster};
use crate::engine::{Engine, Materialized, MissingBandWarning};
use crate::error::{Error, Result};
use crate::types::{SYSTEM_INDEX, Value};

/// In-process engine over collections registered by id.
///
/// `Map` bodies run in parallel over elements; each body sees nothing but
/// its own element, the same contract a remote engine imposes.
#[derive(Clone, Debug, Default)]
pub struct LocalEngine {
    sources: HashMap<String, Vec<Image>>,
}

impl LocalEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `images` under `id`. Images without `system:index` get their
    /// position as index.
    pub fn with_collection(mut self, id: impl Into<String>, images: Vec<Image>) -> Self {
        let images = images
            .into_iter()
            .enumerate()
            .map(|(i, img)| {
                if img.property(SYSTEM_INDEX).is_some() {
                    img
                } else {
                    img.with_property(SYSTEM_INDEX, Value::Text(i.to_string()))
                }
            })
            .collect();
        self.sources.insert(id.into(), images);
        self
    }

    pub fn from_fixtures(fixtures: Fixtures) -> Self {
        fixtures
            .collections
            .into_iter()
            .fold(Self::new(), |engine, (id, images)| {
                engine.with_collection(id, images)
            })
    }

    fn collection(&self, expr: &CollectionExpr, element: Option<&Image>) -> Result<Materialized> {
        match expr {
            CollectionExpr::Source { id } => {
                let images = self
                    .sources
                    .get(id)
                    .ok_or_else(|| Error::Evaluation(format!("unknown collection '{}'", id)))?;
                Ok(Materialized {
                    images: images.clone(),
                    warnings: Vec::new(),
                })
            }
            CollectionExpr::Map { input, body } => {
                let input = self.collection(input, element)?;
                let mapped = input
                    .images
                    .par_iter()
                    .map(|img| -> Result<(Image, Vec<MissingBandWarning>)> {
                        let mut warnings = Vec::new();
                        let out = self.image(body, img, &mut warnings)?;
                        Ok((out, warnings))
                    })
                    .collect::<Result<Vec<_>>>()?;

                let mut out = Materialized {
                    images: Vec::with_capacity(mapped.len()),
                    warnings: input.warnings,
                };
                for (img, warnings) in mapped {
                    out.images.push(img);
                    out.warnings.extend(warnings);
                }
                Ok(out)
            }
            CollectionExpr::Filter { input, filter } => {
                let mut input = self.collection(input, element)?;
                let Filter::PropertyEquals { property, value } = filter;
                let wanted = match value {
                    ValueExpr::Literal { value } => Some(value.clone()),
                    ValueExpr::ElementProperty { name } => element
                        .ok_or_else(|| {
                            Error::Evaluation(format!(
                                "property '{}' of the mapped element used outside a map",
                                name
                            ))
                        })?
                        .property(name)
                        .cloned(),
                };
                // an element without the key matches nothing
                input.images.retain(|candidate| match (&wanted, candidate.property(property)) {
                    (Some(w), Some(v)) => v.matches(w),
                    _ => false,
                });
                Ok(input)
            }
        }
    }

    fn image(
        &self,
        expr: &ImageExpr,
        element: &Image,
        warnings: &mut Vec<MissingBandWarning>,
    ) -> Result<Image> {
        match expr {
            ImageExpr::Element => Ok(element.clone()),
            ImageExpr::Select { image, bands } => {
                let img = self.image(image, element, warnings)?;
                self.select(img, bands, element, warnings)
            }
            ImageExpr::Rename { image, pairs } => {
                let mut img = self.image(image, element, warnings)?;
                for band in img.bands.iter_mut() {
                    if let Some(pair) = pairs.iter().find(|p| p.from == band.name) {
                        band.name = pair.to.clone();
                    }
                }
                let names = img.band_names();
                if let Some(dup) = names
                    .iter()
                    .enumerate()
                    .find(|&(i, n)| names[..i].contains(n))
                    .map(|(_, n)| n.to_string())
                {
                    return Err(Error::Evaluation(format!(
                        "rename produced duplicate band '{}' on image {}",
                        dup,
                        img.label()
                    )));
                }
                Ok(img)
            }
            ImageExpr::Expression {
                image,
                output,
                formula,
            } => {
                let mut img = self.image(image, element, warnings)?;
                let formula = Formula::parse(formula)?;
                let absent: Vec<String> = formula
                    .bands()
                    .into_iter()
                    .filter(|name| img.band(name).is_none())
                    .collect();
                if !absent.is_empty() {
                    return Err(Error::Evaluation(format!(
                        "'{}' reads {:?}, missing on image {}",
                        output,
                        absent,
                        img.label()
                    )));
                }
                let data = formula.evaluate(|name| img.band(name))?;
                img.add_band(Band {
                    name: output.clone(),
                    data,
                })?;
                Ok(img)
            }
            ImageExpr::Compose { parts } => {
                let mut img = Image::new();
                for part in parts {
                    for band in self.image(part, element, warnings)?.bands {
                        img.add_band(band)?;
                    }
                }
                Ok(img)
            }
            ImageExpr::Constant { band, value } => {
                Ok(Image::new().with_band(band.as_str(), Raster::Constant(*value)))
            }
            ImageExpr::CopyProperties {
                image,
                source,
                properties,
            } => {
                let mut img = self.image(image, element, warnings)?;
                let src = self.image(source, element, warnings)?;
                for name in properties {
                    if let Some(value) = src.property(name) {
                        img.properties.insert(name.clone(), value.clone());
                    }
                }
                Ok(img)
            }
            ImageExpr::First { collection } => {
                let found = self.collection(collection, Some(element))?;
                warnings.extend(found.warnings);
                found.images.into_iter().next().ok_or_else(|| {
                    Error::Evaluation(format!(
                        "first() of an empty collection for image {}",
                        element.label()
                    ))
                })
            }
            ImageExpr::Conditional {
                test,
                then,
                otherwise,
            } => {
                let holds = match test {
                    Predicate::NonEmpty { collection } => {
                        !self.collection(collection, Some(element))?.images.is_empty()
                    }
                    Predicate::HasBand { image, band } => {
                        self.image(image, element, warnings)?.band(band).is_some()
                    }
                };
                if holds {
                    self.image(then, element, warnings)
                } else {
                    self.image(otherwise, element, warnings)
                }
            }
        }
    }

    fn select(
        &self,
        img: Image,
        selection: &BandSelection,
        element: &Image,
        warnings: &mut Vec<MissingBandWarning>,
    ) -> Result<Image> {
        let Image { bands, properties } = img;
        let names: Vec<String> = match selection {
            BandSelection::Exact { bands: wanted } => {
                if let Some(missing) = wanted
                    .iter()
                    .find(|w| !bands.iter().any(|b| &b.name == *w))
                {
                    return Err(Error::Evaluation(format!(
                        "band '{}' not found on image {}",
                        missing,
                        element.label()
                    )));
                }
                wanted.clone()
            }
            BandSelection::Intersect { desired } => {
                let desired = self.band_list(desired, element)?;
                let (present, missing): (Vec<String>, Vec<String>) = desired
                    .into_iter()
                    .partition(|d| bands.iter().any(|b| &b.name == d));
                if !missing.is_empty() {
                    debug!("image {} lacks {:?}", element.label(), missing);
                    warnings.push(MissingBandWarning {
                        image: element.label(),
                        missing,
                    });
                }
                if present.is_empty() {
                    warn!("image {} kept no bands", element.label());
                }
                present
            }
        };

        let mut bands = bands;
        let kept = names
            .iter()
            .filter_map(|name| {
                let pos = bands.iter().position(|b| &b.name == name)?;
                Some(bands.swap_remove(pos))
            })
            .collect();
        Ok(Image {
            bands: kept,
            properties,
        })
    }

    fn band_list(&self, list: &BandList, element: &Image) -> Result<Vec<String>> {
        match list {
            BandList::Literal { names } => Ok(names.clone()),
            BandList::FirstImageBands { collection } => {
                let reference = self.collection(collection, Some(element))?;
                Ok(reference
                    .images
                    .first()
                    .map(|img| img.band_names().into_iter().map(String::from).collect())
                    .unwrap_or_default())
            }
        }
    }
}

impl Engine for LocalEngine {
    fn materialize(&self, collection: &CollectionExpr) -> Result<Materialized> {
        let out = self.collection(collection, None)?;
        debug!(
            "materialized {} images with {} warnings",
            out.images.len(),
            out.warnings.len()
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::RenamePair;

    fn engine() -> LocalEngine {
        LocalEngine::new().with_collection(
            "S2",
            vec![
                Image::new()
                    .with_band("B4", Raster::Constant(0.2))
                    .with_band("B8", Raster::Constant(0.6))
                    .with_property("year", 2020i64),
                Image::new()
                    .with_band("B4", Raster::Constant(0.1))
                    .with_property("year", 2021i64),
            ],
        )
    }

    #[test]
    fn unknown_source_is_an_evaluation_error() {
        let err = engine()
            .materialize(&CollectionExpr::source("missing"))
            .unwrap_err();
        assert!(matches!(err, Error::Evaluation(_)));
    }

    #[test]
    fn sources_get_positional_indices() {
        let out = engine().materialize(&CollectionExpr::source("S2")).unwrap();
        assert_eq!(out.images[1].label(), "1");
    }

    #[test]
    fn rename_skips_absent_bands() {
        let graph = CollectionExpr::source("S2").map(ImageExpr::element().rename(vec![
            RenamePair {
                from: "B4".into(),
                to: "red".into(),
            },
            RenamePair {
                from: "B8".into(),
                to: "nir".into(),
            },
        ]));
        let out = engine().materialize(&graph).unwrap();
        assert_eq!(out.images[0].band_names(), vec!["red", "nir"]);
        assert_eq!(out.images[1].band_names(), vec!["red"]);
    }

    #[test]
    fn exact_select_fails_on_missing_band() {
        let graph = CollectionExpr::source("S2").map(ImageExpr::element().select_exact(&["B8"]));
        assert!(matches!(engine().materialize(&graph), Err(Error::Evaluation(_))));
    }

    #[test]
    fn literal_filter() {
        let graph = CollectionExpr::source("S2").filter(Filter::PropertyEquals {
            property: "year".into(),
            value: ValueExpr::Literal {
                value: Value::Int(2021),
            },
        });
        let out = engine().materialize(&graph).unwrap();
        assert_eq!(out.images.len(), 1);
        assert_eq!(out.images[0].band("B4"), Some(&Raster::Constant(0.1)));
    }

    #[test]
    fn element_property_outside_map_fails() {
        let graph = CollectionExpr::source("S2").filter(Filter::matches_element("year"));
        assert!(engine().materialize(&graph).is_err());
    }

    #[test]
    fn expression_reads_existing_bands() {
        let graph = CollectionExpr::source("S2")
            .filter(Filter::PropertyEquals {
                property: "year".into(),
                value: ValueExpr::Literal {
                    value: Value::Int(2020),
                },
            })
            .map(ImageExpr::element().expression("sum", "B4 + B8"));
        let out = engine().materialize(&graph).unwrap();
        let sum = out.images[0].band("sum").unwrap().as_constant().unwrap();
        assert!((sum - 0.8).abs() < 1e-9);
    }

    #[test]
    fn expression_names_every_absent_band() {
        let graph =
            CollectionExpr::source("S2").map(ImageExpr::element().expression("x", "B2 + B4 + B11"));
        let err = engine().materialize(&graph).unwrap_err();
        assert!(err.to_string().contains(r#"["B2", "B11"]"#), "{}", err);
    }
}
