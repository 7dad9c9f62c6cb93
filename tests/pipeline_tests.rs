#![allow(missing_docs)]

use std::fs;
use std::path::Path;

use featpipe::api::{PARAMETERS_FILE, output_path};
use featpipe::descriptors::IMAGE_FIELD;
use featpipe::source::FILENAME_FIELD;
use featpipe::{
    ColorHistogram, Configuration, ContainerReader, DataSource, FeatError, GeneratorRegistry,
    ImageListSource, Pipeline, Raster, Record, Result, RunOptions, RunState, TinyImage, Value,
    VecSource,
};
use image::{Rgb, RgbImage};

fn solid(width: usize, height: usize, rgb: [u8; 3]) -> Raster {
    let data = (0..width * height).flat_map(|_| rgb).collect();
    Raster::new(width, height, 3, data).expect("valid raster")
}

fn raster_source(colors: &[[u8; 3]]) -> Box<VecSource> {
    let records = colors
        .iter()
        .enumerate()
        .map(|(i, c)| Record::new(i).with(IMAGE_FIELD, Value::Raster(solid(8, 4, *c))))
        .collect();
    Box::new(VecSource::new(records))
}

fn write_png(path: &Path, rgb: [u8; 3]) {
    RgbImage::from_pixel(6, 6, Rgb(rgb))
        .save(path)
        .expect("write test image");
}

fn options(workers: usize) -> RunOptions {
    RunOptions {
        workers,
        progress_interval: None,
    }
}

fn assert_close(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-5, "{actual:?} != {expected:?}");
    }
}

// --- PIPELINE ---

#[test]
fn tiny_image_run_writes_features_and_parameters() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let prefix = dir.path().join("out").join("tiny_");
    let registry = GeneratorRegistry::with_builtin();

    let config = Configuration::parse_assignments([
        "params.width=4",
        "params.height=2",
        "params.colorspace=rgb",
    ])?;
    let generator = registry.create(TinyImage::NAME, config)?;
    let colors = [[255, 0, 0], [0, 255, 0], [0, 0, 255]];

    let report = Pipeline::run(generator, raster_source(&colors), &prefix, &options(2))?;
    assert_eq!(report.state, RunState::Finished);
    assert_eq!(report.completed, 3);

    let reader = ContainerReader::open(output_path(&prefix, TinyImage::OUTPUT))?;
    assert_eq!(reader.size(), 3);
    assert_eq!(
        reader.metadata().get("generator").map(String::as_str),
        Some(TinyImage::NAME)
    );
    for (i, c) in colors.iter().enumerate() {
        let pixel: Vec<f32> = c.iter().map(|v| f32::from(*v) / 255.0).collect();
        let expected: Vec<f32> = pixel.iter().copied().cycle().take(4 * 2 * 3).collect();
        let value = reader.get(i)?;
        assert_close(value.as_f32s().expect("f32s"), &expected);
    }

    // The saved parameters reproduce the generator.
    let saved = Configuration::load(output_path(&prefix, PARAMETERS_FILE))?;
    assert_eq!(saved.name(), Some(TinyImage::NAME));
    let reproduced = registry.create_from_configuration(saved.clone())?;
    assert_eq!(reproduced.parameters(), &saved);
    assert_eq!(saved.require::<usize>("params.width")?, 4);
    assert_eq!(saved.require::<String>("params.colorspace")?, "rgb");
    Ok(())
}

#[test]
fn color_histogram_fills_both_outputs() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let prefix = dir.path().join("hist_");
    let registry = GeneratorRegistry::with_builtin();
    let generator = registry.create(
        ColorHistogram::NAME,
        Configuration::parse_assignments(["params.bins=2"])?,
    )?;

    let report = Pipeline::run(
        generator,
        raster_source(&[[255, 0, 0], [0, 0, 0]]),
        &prefix,
        &options(2),
    )?;
    assert!(report.is_success());

    let histogram = ContainerReader::open(output_path(&prefix, ColorHistogram::HISTOGRAM))?;
    let mean = ContainerReader::open(output_path(&prefix, ColorHistogram::MEAN_COLOR))?;
    assert_eq!(histogram.size(), 2);
    assert_eq!(mean.size(), 2);

    // Red lands in bin (1, 0, 0); black in (0, 0, 0).
    let mut red = vec![0.0; 8];
    red[4] = 1.0;
    let mut black = vec![0.0; 8];
    black[0] = 1.0;
    assert_close(histogram.get(0)?.as_f32s().expect("f32s"), &red);
    assert_close(histogram.get(1)?.as_f32s().expect("f32s"), &black);

    assert_close(mean.get(0)?.as_f32s().expect("f32s"), &[1.0, 0.0, 0.0]);
    assert_close(mean.get(1)?.as_f32s().expect("f32s"), &[0.0, 0.0, 0.0]);
    Ok(())
}

#[test]
fn record_without_image_aborts_with_identity() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let prefix = dir.path().join("tiny_");
    let generator = GeneratorRegistry::with_builtin().create_default(TinyImage::NAME)?;

    let records = vec![
        Record::new(0).with(IMAGE_FIELD, Value::Raster(solid(2, 2, [9, 9, 9]))),
        Record::new(1).with_identity("blank.png"),
    ];
    let report = Pipeline::run(
        generator,
        Box::new(VecSource::new(records)),
        &prefix,
        &options(1),
    )?;

    assert_eq!(report.state, RunState::Aborted);
    match report.first_error {
        Some(FeatError::ComputeFailure { index, item, .. }) => {
            assert_eq!(index, 1);
            assert_eq!(item.as_deref(), Some("blank.png"));
        }
        other => panic!("expected ComputeFailure, got {other:?}"),
    }
    assert_eq!(
        ContainerReader::open(output_path(&prefix, TinyImage::OUTPUT))?.size(),
        1
    );
    Ok(())
}

#[test]
fn zero_workers_is_rejected_before_creating_files() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let prefix = dir.path().join("tiny_");
    let generator = GeneratorRegistry::with_builtin().create_default(TinyImage::NAME)?;

    let result = Pipeline::run(generator, raster_source(&[]), &prefix, &options(0));
    assert!(matches!(result, Err(FeatError::InvalidConfiguration(_))));
    assert!(!output_path(&prefix, TinyImage::OUTPUT).exists());
    Ok(())
}

// --- IMAGE FILES ---

#[test]
fn image_list_source_decodes_listed_files() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path().join("images");
    fs::create_dir_all(root.join("sub"))?;
    write_png(&root.join("a.png"), [10, 20, 30]);
    write_png(&root.join("sub").join("b.png"), [200, 100, 0]);

    let list = dir.path().join("list.txt");
    fs::write(&list, "a.png\n\nsub/b.png\n")?;

    let source = ImageListSource::from_filelist(&root, &list)?;
    assert_eq!(source.len(), 2);

    let record = source.get(1)?;
    assert_eq!(record.index(), 1);
    let raster = record.require_raster(IMAGE_FIELD)?;
    assert_eq!((raster.width, raster.height, raster.channels), (6, 6, 3));
    assert_eq!(raster.pixel(5, 5), Some(&[200u8, 100, 0][..]));
    assert_eq!(raster.pixel(6, 0), None);
    assert!(
        record
            .get(FILENAME_FIELD)
            .and_then(Value::as_text)
            .is_some_and(|f| f.ends_with("b.png"))
    );
    Ok(())
}

#[test]
fn missing_image_file_aborts_the_run() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_png(&dir.path().join("ok.png"), [1, 2, 3]);
    let source = ImageListSource::new(dir.path(), vec!["ok.png".into(), "gone.png".into()]);

    let generator = GeneratorRegistry::with_builtin().create_default(TinyImage::NAME)?;
    let prefix = dir.path().join("out_");
    let report = Pipeline::run(generator, Box::new(source), &prefix, &options(1))?;

    assert_eq!(report.state, RunState::Aborted);
    match report.first_error {
        Some(FeatError::ComputeFailure { index, item, .. }) => {
            assert_eq!(index, 1);
            assert!(item.is_some_and(|i| i.ends_with("gone.png")));
        }
        other => panic!("expected ComputeFailure, got {other:?}"),
    }
    Ok(())
}

// --- REGISTRY ---

#[test]
fn registry_lists_builtins_sorted() {
    let registry = GeneratorRegistry::with_builtin();
    assert_eq!(registry.list(), vec!["color_histogram", "tiny_image"]);
    assert!(registry.contains("tiny_image"));
    assert!(!registry.contains("gist"));
}

#[test]
fn unknown_generator_is_reported_by_name() {
    let registry = GeneratorRegistry::with_builtin();
    match registry.create_default("gist") {
        Err(FeatError::UnknownGenerator(name)) => assert_eq!(name, "gist"),
        other => panic!("expected UnknownGenerator, got {other:?}"),
    }
}

#[test]
fn configuration_without_name_is_rejected() {
    let registry = GeneratorRegistry::with_builtin();
    let result = registry.create_from_configuration(Configuration::new());
    assert!(matches!(result, Err(FeatError::InvalidConfiguration(_))));
}

#[test]
fn registered_factory_overrides_builtin() -> Result<()> {
    let mut registry = GeneratorRegistry::with_builtin();
    registry.register(TinyImage::NAME, || Box::new(ColorHistogram::default()));

    let generator = registry.create_default(TinyImage::NAME)?;
    assert_eq!(generator.outputs().len(), 2);
    Ok(())
}

#[test]
fn out_of_range_parameters_are_rejected() {
    let registry = GeneratorRegistry::with_builtin();
    for (name, assignment) in [
        (TinyImage::NAME, "params.width=0"),
        (TinyImage::NAME, "params.height=5000"),
        (TinyImage::NAME, "params.colorspace=hsv"),
        (ColorHistogram::NAME, "params.bins=65"),
        (ColorHistogram::NAME, "params.bins=many"),
    ] {
        let config = Configuration::parse_assignments([assignment]).expect("parses");
        let result = registry.create(name, config);
        assert!(
            matches!(result, Err(FeatError::InvalidConfiguration(_))),
            "{name} accepted {assignment}"
        );
    }
}

// --- CONFIGURATION ---

#[test]
fn defaults_are_recorded_and_survive_a_round_trip() -> Result<()> {
    let registry = GeneratorRegistry::with_builtin();
    let generator = registry.create_default(TinyImage::NAME)?;
    let params = generator.parameters();

    assert_eq!(params.require::<usize>("params.width")?, 16);
    assert_eq!(params.require::<usize>("params.height")?, 16);
    assert_eq!(params.require::<String>("params.colorspace")?, "lab");

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("parameters");
    params.save(&path)?;
    let loaded = Configuration::load(&path)?;
    assert_eq!(&loaded, params);

    // Configuring from the normalized tree is a fixed point.
    let again = registry.create_from_configuration(loaded)?;
    assert_eq!(again.parameters(), params);
    Ok(())
}
