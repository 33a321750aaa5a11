//! Collection cleaning: every image keeps the desired bands it actually has,
//! in desired order, and nothing else.
use tracing::debug;

use crate::core::graph::{BandList, BandSelection, CollectionExpr, ImageExpr};
use crate::error::{Error, Result};

/// Ordered, duplicate-free list of canonical band names to retain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DesiredBandSet {
    names: Vec<String>,
}

impl DesiredBandSet {
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(Error::configuration("desired_bands", "band set is empty"));
        }
        for (i, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(Error::configuration("desired_bands", "blank band name"));
            }
            if names[..i].contains(name) {
                return Err(Error::configuration(
                    "desired_bands",
                    format!("band '{}' listed twice", name),
                ));
            }
        }
        Ok(Self { names })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Names of this set present in `bands`, in set order.
    pub fn intersect<S: AsRef<str>>(&self, bands: &[S]) -> Vec<String> {
        self.names
            .iter()
            .filter(|n| bands.iter().any(|b| b.as_ref() == n.as_str()))
            .cloned()
            .collect()
    }
}

/// What the cleaner retains when no explicit band set is configured.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanOptions {
    pub desired: Option<DesiredBandSet>,
}

impl CleanOptions {
    pub fn with_desired(desired: DesiredBandSet) -> Self {
        Self {
            desired: Some(desired),
        }
    }

    fn selection(&self, collection: &CollectionExpr) -> BandSelection {
        let desired = match &self.desired {
            Some(set) => BandList::Literal {
                names: set.names.clone(),
            },
            // informative default only: images missing some of the reference
            // bands still pass through with whatever they have
            None => BandList::FirstImageBands {
                collection: Box::new(collection.clone()),
            },
        };
        BandSelection::Intersect { desired }
    }
}

/// Normalize every image of `collection` to the desired band set.
///
/// The result is one fresh `Map` over the input whose body is a single
/// `Select`, so upstream image expressions do not keep nesting. Images that
/// share no band with the set come out as empty-band images; they are never
/// dropped. Cleaning twice with the same options returns the first result.
pub fn clean_collection(collection: CollectionExpr, options: &CleanOptions) -> CollectionExpr {
    if is_cleaned_with(&collection, options) {
        debug!("collection already cleaned with the same band set");
        return collection;
    }
    let selection = options.selection(&collection);
    debug!("cleaning collection to {:?}", options.desired.as_ref().map(|d| d.names()));
    collection.map(ImageExpr::element().select(selection))
}

fn is_cleaned_with(collection: &CollectionExpr, options: &CleanOptions) -> bool {
    let CollectionExpr::Map { input, body } = collection else {
        return false;
    };
    let ImageExpr::Select { image, bands } = body.as_ref() else {
        return false;
    };
    if **image != ImageExpr::Element {
        return false;
    }
    // a reference-band default compares against the pre-clean input
    *bands == options.selection(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desired(names: &[&str]) -> DesiredBandSet {
        DesiredBandSet::new(names.iter().copied()).unwrap()
    }

    #[test]
    fn intersection_keeps_desired_order() {
        let set = desired(&["EVI", "NDVI", "swir2"]);
        assert_eq!(set.intersect(&["NDVI", "blue", "EVI"]), vec!["EVI", "NDVI"]);
        assert_eq!(set.intersect(&["swir2", "EVI"]), vec!["EVI", "swir2"]);
        assert!(set.intersect(&["blue"]).is_empty());
    }

    #[test]
    fn rejects_empty_and_duplicate_sets() {
        assert!(DesiredBandSet::new(Vec::<String>::new()).is_err());
        let err = DesiredBandSet::new(["NDVI", "NDVI"]).unwrap_err();
        assert!(matches!(err, Error::Configuration { field: "desired_bands", .. }));
    }

    #[test]
    fn cleaning_is_a_single_select_map() {
        let options = CleanOptions::with_desired(desired(&["NDVI"]));
        let out = clean_collection(CollectionExpr::source("S2"), &options);
        let stats = out.stats();
        assert_eq!(stats.maps, 1);
        assert_eq!(stats.selects, 1);
    }

    #[test]
    fn cleaning_twice_is_a_no_op() {
        let options = CleanOptions::with_desired(desired(&["EVI", "NDVI"]));
        let once = clean_collection(CollectionExpr::source("S2"), &options);
        let twice = clean_collection(once.clone(), &options);
        assert_eq!(once, twice);

        let other = CleanOptions::with_desired(desired(&["NDVI"]));
        assert_ne!(clean_collection(once.clone(), &other), once);
    }

    #[test]
    fn reference_default_is_idempotent_too() {
        let options = CleanOptions::default();
        let once = clean_collection(CollectionExpr::source("S2"), &options);
        assert_eq!(clean_collection(once.clone(), &options), once);
    }
}
