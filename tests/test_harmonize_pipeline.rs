use chrono::{TimeZone, Utc};
use ndarray::array;

use geoharmonize::{
    BandMap, CleanOptions, CollectionExpr, DesiredBandSet, Engine, ExpressionIndexLibrary,
    Image, ImageExpr, LocalEngine, MergeParams, MergeSpec, PLACEHOLDER_VALUE, PipelineParams,
    Raster, SpectralIndex, TIME_START, Value, clean_collection, compute_indices,
    merge_collections,
};

fn scene(bands: &[(&str, f64)], year: i64) -> Image {
    bands
        .iter()
        .fold(Image::new(), |img, (name, v)| {
            img.with_band(*name, Raster::Constant(*v))
        })
        .with_property("year", year)
        .with_property(
            TIME_START,
            Utc.with_ymd_and_hms(year as i32, 1, 1, 0, 0, 0).unwrap(),
        )
        .with_property("CLOUD_COVER", 12.5)
}

fn desired(names: &[&str]) -> CleanOptions {
    CleanOptions::with_desired(DesiredBandSet::new(names.iter().copied()).unwrap())
}

#[test]
fn cleaning_keeps_present_desired_bands_in_order() {
    let engine = LocalEngine::new().with_collection(
        "indices",
        vec![
            scene(&[("NDVI", 0.5), ("blue", 0.1), ("EVI", 0.4)], 2020),
            scene(&[("swir2", 0.3), ("EVI", 0.2)], 2021),
        ],
    );
    let cleaned = clean_collection(
        CollectionExpr::source("indices"),
        &desired(&["EVI", "NDVI", "swir2"]),
    );

    let out = engine.materialize(&cleaned).unwrap();
    assert_eq!(out.images[0].band_names(), vec!["EVI", "NDVI"]);
    assert_eq!(out.images[1].band_names(), vec!["EVI", "swir2"]);

    // gaps are reported, not raised
    assert_eq!(out.warnings.len(), 2);
    assert_eq!(out.warnings[0].missing, vec!["swir2"]);
    assert_eq!(out.warnings[1].missing, vec!["NDVI"]);

    // properties survive cleaning so the merge key is still there
    assert_eq!(out.images[1].property("year"), Some(&Value::Int(2021)));
}

#[test]
fn image_without_desired_bands_becomes_empty_not_dropped() {
    let engine = LocalEngine::new().with_collection(
        "indices",
        vec![scene(&[("blue", 0.1)], 2020), scene(&[("NDVI", 0.3)], 2021)],
    );
    let cleaned = clean_collection(CollectionExpr::source("indices"), &desired(&["NDVI"]));
    let out = engine.materialize(&cleaned).unwrap();
    assert_eq!(out.images.len(), 2);
    assert!(out.images[0].bands.is_empty());
    assert_eq!(out.images[1].band_names(), vec!["NDVI"]);
}

#[test]
fn cleaning_a_cleaned_collection_changes_nothing() {
    let engine = LocalEngine::new().with_collection(
        "indices",
        vec![
            scene(&[("NDVI", 0.5), ("blue", 0.1), ("EVI", 0.4)], 2020),
            scene(&[("swir2", 0.3)], 2021),
        ],
    );
    let options = desired(&["EVI", "NDVI", "swir2"]);
    let once = clean_collection(CollectionExpr::source("indices"), &options);
    // an extra pass-through map hides the structural shortcut
    let again = clean_collection(once.clone().map(ImageExpr::element()), &options);

    let a = engine.materialize(&once).unwrap();
    let b = engine.materialize(&again).unwrap();
    assert_eq!(a.images, b.images);
}

#[test]
fn reference_default_uses_first_image_bands() {
    let engine = LocalEngine::new().with_collection(
        "raw",
        vec![
            scene(&[("red", 0.1), ("nir", 0.5)], 2020),
            scene(&[("nir", 0.4), ("green", 0.2), ("red", 0.3)], 2021),
        ],
    );
    let cleaned = clean_collection(CollectionExpr::source("raw"), &CleanOptions::default());
    let out = engine.materialize(&cleaned).unwrap();
    assert_eq!(out.images[1].band_names(), vec!["red", "nir"]);
    assert!(out.warnings.is_empty());
}

#[test]
fn unmatched_year_gets_zero_placeholder() {
    let engine = LocalEngine::new()
        .with_collection("indices", vec![scene(&[("NDVI", 0.6), ("EVI", 0.5)], 2020)])
        .with_collection(
            "landcover",
            vec![scene(&[("lulc", 3.0)], 2019), scene(&[("lulc", 4.0)], 2021)],
        );
    let spec = MergeSpec::new("lulc", ["NDVI"]).unwrap();
    let merged = merge_collections(
        CollectionExpr::source("indices"),
        CollectionExpr::source("landcover"),
        &spec,
    );

    let out = engine.materialize(&merged).unwrap();
    let img = &out.images[0];
    assert_eq!(img.band_names(), vec!["NDVI", "lulc"]);
    assert_eq!(img.band("lulc"), Some(&Raster::Constant(PLACEHOLDER_VALUE)));
    assert_eq!(img.band("NDVI"), Some(&Raster::Constant(0.6)));
    assert_eq!(img.property_names(), vec!["system:time_start", "year"]);
    assert_eq!(img.property("year"), Some(&Value::Int(2020)));
}

#[test]
fn matched_year_carries_auxiliary_values() {
    let landcover = Image::new()
        .with_band("lulc", Raster::Grid(array![[1.0, 2.0], [3.0, 4.0]]))
        .with_band("confidence", Raster::Constant(0.9))
        .with_property("year", 2020.0);
    let engine = LocalEngine::new()
        .with_collection("indices", vec![scene(&[("NDVI", 0.6)], 2020)])
        .with_collection("landcover", vec![scene(&[("lulc", 9.0)], 2019), landcover]);
    let spec = MergeSpec::new("lulc", ["NDVI"]).unwrap();
    let merged = merge_collections(
        CollectionExpr::source("indices"),
        CollectionExpr::source("landcover"),
        &spec,
    );

    let out = engine.materialize(&merged).unwrap();
    let img = &out.images[0];
    assert_eq!(img.band_names(), vec!["NDVI", "lulc"]);
    assert_eq!(
        img.band("lulc"),
        Some(&Raster::Grid(array![[1.0, 2.0], [3.0, 4.0]]))
    );
}

#[test]
fn merged_schema_is_identical_across_elements() {
    let engine = LocalEngine::new()
        .with_collection(
            "indices",
            (2018..=2022)
                .map(|y| scene(&[("NDVI", 0.1), ("EVI", 0.2), ("blue", 0.05)], y))
                .collect(),
        )
        .with_collection(
            "landcover",
            vec![scene(&[("lulc", 5.0)], 2019), scene(&[("lulc", 6.0)], 2021)],
        );
    let spec = MergeSpec::new("lulc", ["EVI", "NDVI"]).unwrap();
    let merged = merge_collections(
        CollectionExpr::source("indices"),
        CollectionExpr::source("landcover"),
        &spec,
    );

    let out = engine.materialize(&merged).unwrap();
    assert_eq!(out.images.len(), 5);
    let bands = out.images[0].band_names();
    let props = out.images[0].property_names();
    for img in &out.images {
        assert_eq!(img.band_names(), bands);
        assert_eq!(img.property_names(), props);
    }
    assert_eq!(bands, vec!["EVI", "NDVI", "lulc"]);

    let lulc: Vec<f64> = out
        .images
        .iter()
        .map(|img| img.band("lulc").and_then(Raster::as_constant).unwrap())
        .collect();
    assert_eq!(lulc, vec![0.0, 5.0, 0.0, 6.0, 0.0]);
}

#[test]
fn merging_cleaned_images_with_band_gaps_keeps_every_image() {
    let engine = LocalEngine::new()
        .with_collection(
            "indices",
            vec![
                scene(&[("EVI", 0.4), ("NDVI", 0.5), ("blue", 0.1)], 2020),
                scene(&[("EVI", 0.2), ("swir2", 0.3)], 2021),
            ],
        )
        .with_collection("landcover", vec![scene(&[("lulc", 7.0)], 2021)]);
    let cleaned = clean_collection(
        CollectionExpr::source("indices"),
        &desired(&["EVI", "NDVI", "swir2"]),
    );
    let spec = MergeSpec::new("lulc", ["EVI", "NDVI"]).unwrap();
    let merged = merge_collections(cleaned, CollectionExpr::source("landcover"), &spec);

    let out = engine.materialize(&merged).unwrap();
    assert_eq!(out.images.len(), 2);
    for img in &out.images {
        assert_eq!(img.band_names(), vec!["EVI", "NDVI", "lulc"]);
        assert_eq!(img.property_names(), vec!["system:time_start", "year"]);
    }

    let first = &out.images[0];
    assert_eq!(first.band("NDVI"), Some(&Raster::Constant(0.5)));
    assert_eq!(first.band("lulc"), Some(&Raster::Constant(PLACEHOLDER_VALUE)));

    // NDVI never existed on the 2021 scene
    let second = &out.images[1];
    assert_eq!(second.band("EVI"), Some(&Raster::Constant(0.2)));
    assert_eq!(second.band("NDVI"), Some(&Raster::Constant(PLACEHOLDER_VALUE)));
    assert_eq!(second.band("lulc"), Some(&Raster::Constant(7.0)));

    assert_eq!(out.warnings.len(), 2);
}

#[test]
fn identity_map_computes_indices_without_renaming() {
    let engine = LocalEngine::new().with_collection(
        "S2",
        vec![scene(&[("red", 0.2), ("nir", 0.6), ("blue", 0.1)], 2020)],
    );
    let mapping = BandMap::identity(&["red", "nir", "blue"]).unwrap().resolve();
    let graph = compute_indices(
        CollectionExpr::source("S2"),
        &mapping,
        &[SpectralIndex::Ndvi],
        &ExpressionIndexLibrary,
    )
    .unwrap();
    assert_eq!(graph.stats().renames, 0);

    let out = engine.materialize(&graph).unwrap();
    let ndvi = out.images[0].band("NDVI").and_then(Raster::as_constant).unwrap();
    assert!((ndvi - 0.5).abs() < 1e-9, "got {}", ndvi);
}

#[test]
fn sensor_names_are_renamed_before_indices() {
    let engine = LocalEngine::new().with_collection(
        "LC08",
        vec![scene(&[("SR_B4", 0.2), ("SR_B5", 0.6), ("SR_B7", 0.1)], 2020)],
    );
    let mapping = BandMap::new([("red", "SR_B4"), ("nir", "SR_B5"), ("swir2", "SR_B7")])
        .unwrap()
        .resolve();
    let graph = compute_indices(
        CollectionExpr::source("LC08"),
        &mapping,
        &[SpectralIndex::Ndvi, SpectralIndex::Nbr],
        &ExpressionIndexLibrary,
    )
    .unwrap();

    let out = engine.materialize(&graph).unwrap();
    assert_eq!(
        out.images[0].band_names(),
        vec!["red", "nir", "swir2", "NDVI", "NBR"]
    );
}

#[test]
fn full_pipeline_from_params() {
    let engine = LocalEngine::new()
        .with_collection(
            "LANDSAT/LC08/C02/T1_L2",
            vec![
                scene(
                    &[("SR_B2", 0.05), ("SR_B4", 0.1), ("SR_B5", 0.5), ("SR_B7", 0.2)],
                    2020,
                ),
                // no SWIR on this one
                scene(&[("SR_B2", 0.05), ("SR_B4", 0.2), ("SR_B5", 0.6)], 2021),
            ],
        )
        .with_collection("landcover", vec![scene(&[("lulc", 2.0)], 2021)]);

    let params = PipelineParams {
        indices: vec![SpectralIndex::Ndvi],
        desired_bands: Some(vec!["NDVI".into(), "swir2".into()]),
        merge: Some(MergeParams {
            auxiliary: "landcover".into(),
            enrichment_band: "lulc".into(),
            primary_bands: vec!["NDVI".into()],
            key: "year".into(),
            time_property: TIME_START.into(),
        }),
        ..PipelineParams::default()
    };

    let run = geoharmonize::run(&params, &engine).unwrap();
    let images = &run.output.images;
    assert_eq!(images.len(), 2);
    for img in images {
        assert_eq!(img.band_names(), vec!["NDVI", "lulc"]);
    }
    let ndvi = images[0].band("NDVI").and_then(Raster::as_constant).unwrap();
    assert!((ndvi - 0.4 / 0.6).abs() < 1e-9);
    assert_eq!(images[0].band("lulc"), Some(&Raster::Constant(0.0)));
    assert_eq!(images[1].band("lulc"), Some(&Raster::Constant(2.0)));

    // the 2021 scene lacked swir2 during cleaning
    assert_eq!(run.output.warnings.len(), 1);
    assert_eq!(run.output.warnings[0].missing, vec!["swir2"]);
}

#[test]
fn many_elements_evaluate_independently() {
    let images: Vec<Image> = (0..200)
        .map(|i| scene(&[("NDVI", i as f64), ("noise", -1.0)], 2000 + (i % 20)))
        .collect();
    let engine = LocalEngine::new().with_collection("indices", images);
    let cleaned = clean_collection(CollectionExpr::source("indices"), &desired(&["NDVI"]));

    let out = engine.materialize(&cleaned).unwrap();
    assert_eq!(out.images.len(), 200);
    for (i, img) in out.images.iter().enumerate() {
        assert_eq!(img.band_names(), vec!["NDVI"]);
        assert_eq!(img.band("NDVI"), Some(&Raster::Constant(i as f64)));
    }
}
