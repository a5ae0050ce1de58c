use std::fs;
use std::sync::Arc;

use burn::backend::NdArray;
use burn::data::dataloader::DataLoaderBuilder;
use burn::data::dataset::Dataset;
use image::{ImageBuffer, Rgba};
use naip_core::{manifest_path, AugmentationPolicy, DatasetConfig, Products, Split};
use naip_dataset::{
    ClassificationDataset, DatasetStatistics, FailurePolicy, NaipBatcher, NaipBurnDataset,
};
use rayon::prelude::*;
use tempfile::TempDir;

const CATEGORIES: [&str; 5] = ["grassland-wetland", "forest", "water", "shrubland", "developed"];

fn vocab() -> Vec<String> {
    ["grassland", "wetland", "forest", "water"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Dataset folder with `n` tiles of varying size and a `train.csv`.
fn write_dataset(n: usize) -> TempDir {
    let dir = TempDir::new().unwrap();
    let mut csv = String::from("Latitude,Longitude,Image_Folder,Type\n");
    for i in 0..n {
        let size = 12 + 4 * i as u32;
        let folder = dir.path().join("tiles").join(format!("{i:04}"));
        fs::create_dir_all(&folder).unwrap();
        ImageBuffer::from_fn(size, size, |x, y| {
            Rgba([(x * 3) as u8, (y * 5) as u8, (i * 11) as u8, 255u8])
        })
        .save(folder.join("naip.png"))
        .unwrap();
        csv.push_str(&format!(
            "{},{},tiles/{i:04},{}\n",
            35.0 + i as f64 * 0.1,
            -110.0 - i as f64 * 0.1,
            CATEGORIES[i % CATEGORIES.len()]
        ));
    }
    fs::write(manifest_path(dir.path(), Split::Train), csv).unwrap();
    dir
}

fn config(dir: &TempDir) -> DatasetConfig {
    DatasetConfig::new(manifest_path(dir.path(), Split::Train), Split::Train)
        .with_image_root(dir.path())
        .with_image_size(24)
        .with_crop_size(Some(16))
        .with_tile_size(8)
        .with_products(Products::NaipRgbNir)
        .with_augmentation(AugmentationPolicy::FlipRotate)
}

#[test]
fn concurrent_access_matches_sequential() {
    let dir = write_dataset(10);
    let dataset = ClassificationDataset::multilabel(config(&dir), vocab()).unwrap();
    assert_eq!(dataset.len(), 10);

    let sequential: Vec<_> = (0..dataset.len())
        .map(|i| dataset.get_item(i).unwrap())
        .collect();
    let parallel: Vec<_> = (0..dataset.len())
        .into_par_iter()
        .map(|i| dataset.get_item(i).unwrap())
        .collect();

    assert_eq!(sequential, parallel);
    for sample in &sequential {
        assert_eq!(sample.image.dim(), (4, 8, 8));
        assert_eq!(sample.label.len(), 4);
    }
}

/// Runs a full epoch through Burn's data loader, returning the latitudes seen.
fn load_epoch(dataset: NaipBurnDataset) -> Vec<f32> {
    let loader = DataLoaderBuilder::new(NaipBatcher::<NdArray<f32>>::new(Default::default()))
        .batch_size(4)
        .build(dataset);

    let mut latitudes = Vec::new();
    for batch in loader.iter() {
        let [n, c, h, w] = batch.images.dims();
        assert_eq!([c, h, w], [4, 8, 8]);
        assert_eq!(batch.targets.dims(), [n, 4]);
        let coords: Vec<f32> = batch.coordinates.into_data().to_vec().unwrap();
        latitudes.extend(coords.chunks(2).map(|pair| pair[0]));
    }
    latitudes
}

fn dataset_with_missing_tile(dir: &TempDir) -> Arc<ClassificationDataset> {
    fs::remove_file(dir.path().join("tiles").join("0002").join("naip.png")).unwrap();
    Arc::new(ClassificationDataset::multilabel(config(dir), vocab()).unwrap())
}

#[test]
fn data_loader_skips_broken_tile_and_keeps_the_rest() {
    let dir = write_dataset(10);
    let dataset = dataset_with_missing_tile(&dir);

    let burn_dataset = NaipBurnDataset::skipping_failures(Arc::clone(&dataset));
    assert_eq!(burn_dataset.policy(), FailurePolicy::Skip);
    assert_eq!(burn_dataset.skipped(), &[2]);
    assert_eq!(burn_dataset.len(), 9);
    assert_eq!(burn_dataset.get(2).map(|item| item.index), Some(3));
    assert!(burn_dataset.get(9).is_none());

    let latitudes = load_epoch(burn_dataset);
    assert_eq!(latitudes.len(), 9);
    assert!(latitudes.iter().all(|&lat| (lat - 35.2).abs() > 1e-3));
    assert!(latitudes.iter().any(|&lat| (lat - 35.9).abs() < 1e-3));
}

#[test]
#[should_panic(expected = "Failed to assemble sample 2")]
fn data_loader_aborts_on_broken_tile_by_default() {
    let dir = write_dataset(10);
    let dataset = dataset_with_missing_tile(&dir);

    let burn_dataset = NaipBurnDataset::new(dataset);
    assert_eq!(burn_dataset.policy(), FailurePolicy::Abort);
    assert_eq!(burn_dataset.len(), 10);

    load_epoch(burn_dataset);
}

#[test]
fn data_loader_delivers_every_sample_of_a_clean_split() {
    let dir = write_dataset(10);
    let dataset = Arc::new(ClassificationDataset::multilabel(config(&dir), vocab()).unwrap());

    let burn_dataset = NaipBurnDataset::with_policy(dataset, FailurePolicy::Skip);
    assert!(burn_dataset.skipped().is_empty());
    assert_eq!(load_epoch(burn_dataset).len(), 10);
}

#[test]
fn statistics_over_single_task_dataset() {
    let dir = write_dataset(5);
    let dataset = ClassificationDataset::single_task(config(&dir).with_pretrained(false), "forest").unwrap();

    let mut stats = DatasetStatistics::new(vec!["forest".to_string()]);
    for i in 0..dataset.len() {
        stats.update(&dataset.get_item(i).unwrap());
    }

    assert_eq!(stats.num_samples, 5);
    assert_eq!(stats.class_positives, vec![1]);
    assert_eq!(stats.channels.len(), 3);
    assert!(stats.channels.iter().all(|c| c.min >= 0.0 && c.max <= 1.0));
}
