//! Manifest-backed classification dataset.
//!
//! The manifest, resolved raster paths, labels and the transform pipeline are
//! fixed at construction. Every access re-reads its raster from disk and
//! touches no shared mutable state, so one dataset can serve any number of
//! concurrent readers.

use std::path::{Path, PathBuf};

use naip_core::{BandGroup, DatasetConfig, Error, Products, Result, TaskKind};
use ndarray::{concatenate, Array, Array3, ArrayView, Axis, Dimension};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::array_transforms::{center_crop, resize_as_image, scale_values};
use crate::labels::{Label, LabelStrategy};
use crate::loader::load_raster_with_channels;
use crate::manifest::{Manifest, ManifestRow};
use crate::transforms::TransformPipeline;

/// One assembled sample
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Manifest row the sample came from
    pub index: usize,
    pub latitude: f64,
    pub longitude: f64,
    pub label: Label,
    /// Channels-first `(C, H, W)` tile
    pub image: Array3<f32>,
}

impl Sample {
    /// `(latitude, longitude, label, image)`
    pub fn into_parts(self) -> (f64, f64, Label, Array3<f32>) {
        (self.latitude, self.longitude, self.label, self.image)
    }
}

/// Classification dataset over a CSV manifest of NAIP tiles
#[derive(Debug)]
pub struct ClassificationDataset {
    config: DatasetConfig,
    rows: Vec<ManifestRow>,
    raster_paths: Vec<PathBuf>,
    labels: Vec<Label>,
    label_width: usize,
    transforms: TransformPipeline,
}

impl ClassificationDataset {
    /// Loads the manifest and derives every label with `strategy`.
    ///
    /// No raster is read here.
    pub fn new(config: DatasetConfig, strategy: LabelStrategy) -> Result<Self> {
        config.validate()?;

        let manifest = Manifest::load(&config.manifest_path)?;
        let rows = manifest.into_rows();

        let raster_paths = rows
            .iter()
            .map(|row| config.raster_path(&row.image_folder))
            .collect();

        let labels: Vec<Label> = rows.iter().map(|row| strategy.label(row)).collect();
        if let Some((i, bad)) = labels
            .iter()
            .enumerate()
            .find(|(_, label)| label.len() != strategy.width())
        {
            return Err(Error::InvalidArgument(format!(
                "label strategy '{}' produced {} value(s) for row {}, expected {}",
                strategy.name(),
                bad.len(),
                i,
                strategy.width()
            )));
        }

        let transforms =
            TransformPipeline::build(config.split, config.augmentation, config.pretrained);

        info!(
            "Loaded {} manifest: {} rows from {}",
            config.split,
            rows.len(),
            config.manifest_path.display()
        );
        debug!(
            "products={} image_size={} crop={:?} tile={} labels={} transforms=[{}]",
            config.products,
            config.image_size,
            config.crop_size,
            config.tile_size,
            strategy.name(),
            transforms
        );

        Ok(Self {
            config,
            rows,
            raster_paths,
            labels,
            label_width: strategy.width(),
            transforms,
        })
    }

    /// Multi-label dataset over `vocabulary`
    pub fn multilabel(config: DatasetConfig, vocabulary: Vec<String>) -> Result<Self> {
        Self::new(config, LabelStrategy::multilabel(vocabulary))
    }

    /// Single-task binary dataset.
    ///
    /// Always RGB-only and never cropped, whatever `config` asks for.
    pub fn single_task(config: DatasetConfig, task: impl Into<String>) -> Result<Self> {
        let config = config.with_products(Products::NaipRgb).with_crop_size(None);
        Self::new(config, LabelStrategy::binary(task))
    }

    /// Picks the variant for `task` after checking it against `vocabulary`
    pub fn for_task(task: &TaskKind, config: DatasetConfig, vocabulary: Vec<String>) -> Result<Self> {
        task.validate(&vocabulary)?;
        match task {
            TaskKind::All => Self::multilabel(config, vocabulary),
            TaskKind::Single(name) => Self::single_task(config, name.clone()),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// Length of every label in this dataset
    pub fn label_width(&self) -> usize {
        self.label_width
    }

    /// Channels of every assembled tile
    pub fn num_channels(&self) -> usize {
        self.config.products.num_channels()
    }

    /// `(C, H, W)` of every assembled tile
    pub fn image_shape(&self) -> [usize; 3] {
        [self.num_channels(), self.config.tile_size, self.config.tile_size]
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn row(&self, index: usize) -> Option<&ManifestRow> {
        self.rows.get(index)
    }

    pub fn raster_path(&self, index: usize) -> Option<&Path> {
        self.raster_paths.get(index).map(PathBuf::as_path)
    }

    pub fn transforms(&self) -> &TransformPipeline {
        &self.transforms
    }

    /// Assembles sample `index` with the configured seed.
    pub fn get_item(&self, index: usize) -> Result<Sample> {
        self.get_item_with_seed(index, self.config.seed)
    }

    /// Like [`get_item`](Self::get_item) for callers holding signed indices;
    /// negative values are rejected rather than wrapped.
    pub fn get_item_signed(&self, index: i64) -> Result<Sample> {
        let index = usize::try_from(index).map_err(|_| Error::IndexOutOfRange {
            index,
            len: self.len(),
        })?;
        self.get_item(index)
    }

    /// Assembles sample `index`, seeding augmentation from `(seed, index)`.
    ///
    /// Varying `seed` per epoch gives fresh augmentation while keeping every
    /// access reproducible.
    pub fn get_item_with_seed(&self, index: usize, seed: u64) -> Result<Sample> {
        if index >= self.len() {
            return Err(Error::IndexOutOfRange {
                index: index as i64,
                len: self.len(),
            });
        }

        let row = &self.rows[index];
        let path = &self.raster_paths[index];
        let products = self.config.products;

        let raster = load_raster_with_channels(path, products.required_raster_channels())?;

        let mut segments: Vec<Array3<f32>> = Vec::with_capacity(products.band_groups().len());
        for group in products.band_groups() {
            segments.push(self.assemble_group(&raster, *group)?);
        }

        let assembled = if segments.len() == 1 {
            segments.swap_remove(0)
        } else {
            let views: Vec<_> = segments.iter().map(|s| s.view()).collect();
            concatenate(Axis(2), &views)?
        };

        let image = assembled
            .permuted_axes([2, 0, 1])
            .as_standard_layout()
            .into_owned();

        let mut rng = ChaCha8Rng::seed_from_u64(sample_seed(seed, index));
        let image = self.transforms.apply(image, &mut rng);

        Ok(Sample {
            index,
            latitude: row.latitude,
            longitude: row.longitude,
            label: self.labels[index].clone(),
            image,
        })
    }

    /// Runs one band group through resize, optional crop, resize and scale,
    /// returning channels-last `(tile, tile, channels)`.
    fn assemble_group(&self, raster: &Array3<f32>, group: BandGroup) -> Result<Array3<f32>> {
        match group.channels() {
            [single] => {
                let band = self.prepare(raster.index_axis(Axis(2), *single))?;
                Ok(band.insert_axis(Axis(2)))
            }
            channels => self.prepare(raster.select(Axis(2), channels).view()),
        }
    }

    fn prepare<D: Dimension>(&self, bands: ArrayView<'_, f32, D>) -> Result<Array<f32, D>> {
        let config = &self.config;
        let mut out = resize_as_image(bands, config.image_size)?;
        if let Some(crop) = config.crop_size {
            out = center_crop(out.view(), crop)?;
        }
        let out = resize_as_image(out.view(), config.tile_size)?;
        scale_values(out.view(), config.value_range.min, config.value_range.max)
    }
}

/// Per-access RNG seed
fn sample_seed(seed: u64, index: usize) -> u64 {
    seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ index as u64
}
