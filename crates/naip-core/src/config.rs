//! Configuration structures for dataset construction.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_IMAGE_SIZE, NAIP_MAX, NAIP_MIN, RASTER_FILENAME, TILE_SIZE};
use crate::error::{Error, Result};
use crate::types::{AugmentationPolicy, Products, Split};

/// Sensor value range mapped onto `[0, 1]`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ValueRange {
    pub min: f32,
    pub max: f32,
}

impl ValueRange {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn naip() -> Self {
        Self::new(NAIP_MIN, NAIP_MAX)
    }
}

impl Default for ValueRange {
    fn default() -> Self {
        Self::naip()
    }
}

/// Everything a classification dataset needs at construction.
///
/// Immutable once handed to a dataset; nothing in the pipeline reads global
/// configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatasetConfig {
    /// CSV manifest with `Latitude`, `Longitude`, `Image_Folder`, `Type`
    pub manifest_path: PathBuf,
    /// Prefix joined onto relative `Image_Folder` entries
    pub image_root: Option<PathBuf>,
    /// Raster filename inside each image folder
    pub raster_filename: String,
    /// Split the manifest belongs to
    pub split: Split,
    /// Pre-crop resize target
    pub image_size: usize,
    /// Optional center-crop window, `None` disables cropping
    pub crop_size: Option<usize>,
    /// Final side length of the assembled tile
    pub tile_size: usize,
    /// Band groups to assemble
    pub products: Products,
    /// Augmentation policy, only honoured on the train split
    pub augmentation: AugmentationPolicy,
    /// Normalise RGB with ImageNet statistics
    pub pretrained: bool,
    /// Raw pixel range rescaled onto `[0, 1]`
    pub value_range: ValueRange,
    /// Base seed for per-access augmentation randomness
    pub seed: u64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            manifest_path: PathBuf::new(),
            image_root: None,
            raster_filename: RASTER_FILENAME.to_string(),
            split: Split::Train,
            image_size: DEFAULT_IMAGE_SIZE,
            crop_size: None,
            tile_size: TILE_SIZE,
            products: Products::NaipRgb,
            augmentation: AugmentationPolicy::None,
            pretrained: true,
            value_range: ValueRange::naip(),
            seed: 42,
        }
    }
}

impl DatasetConfig {
    /// Creates a configuration with default imagery settings
    pub fn new(manifest_path: impl Into<PathBuf>, split: Split) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            split,
            ..Self::default()
        }
    }

    pub fn with_image_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.image_root = Some(root.into());
        self
    }

    pub fn with_image_size(mut self, image_size: usize) -> Self {
        self.image_size = image_size;
        self
    }

    pub fn with_crop_size(mut self, crop_size: Option<usize>) -> Self {
        self.crop_size = crop_size;
        self
    }

    pub fn with_tile_size(mut self, tile_size: usize) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_products(mut self, products: Products) -> Self {
        self.products = products;
        self
    }

    pub fn with_augmentation(mut self, augmentation: AugmentationPolicy) -> Self {
        self.augmentation = augmentation;
        self
    }

    pub fn with_pretrained(mut self, pretrained: bool) -> Self {
        self.pretrained = pretrained;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Rejects parameters the transform pipeline would fail on at access time
    pub fn validate(&self) -> Result<()> {
        if self.image_size == 0 {
            return Err(Error::InvalidArgument("image_size must be positive".to_string()));
        }
        if self.tile_size == 0 {
            return Err(Error::InvalidArgument("tile_size must be positive".to_string()));
        }
        match self.crop_size {
            Some(0) => {
                return Err(Error::InvalidArgument("crop_size must be positive".to_string()));
            }
            Some(crop) if crop > self.image_size => {
                return Err(Error::InvalidArgument(format!(
                    "crop_size {} exceeds image_size {}",
                    crop, self.image_size
                )));
            }
            _ => {}
        }
        if !(self.value_range.min < self.value_range.max) {
            return Err(Error::InvalidArgument(format!(
                "value range requires min < max, got [{}, {}]",
                self.value_range.min, self.value_range.max
            )));
        }
        if self.raster_filename.is_empty() {
            return Err(Error::InvalidArgument("raster_filename is empty".to_string()));
        }
        Ok(())
    }

    /// Resolves the raster path for one manifest `Image_Folder` entry
    pub fn raster_path(&self, image_folder: &str) -> PathBuf {
        let folder = Path::new(image_folder);
        let folder = match &self.image_root {
            Some(root) if folder.is_relative() => root.join(folder),
            _ => folder.to_path_buf(),
        };
        folder.join(&self.raster_filename)
    }
}

/// Per-split manifest location inside a dataset folder: `<folder>/<split>.csv`
pub fn manifest_path(dataset_folder: &Path, split: Split) -> PathBuf {
    dataset_folder.join(format!("{split}.csv"))
}
