//! Burn Dataset Integration
//!
//! Adapts [`ClassificationDataset`] to Burn's `Dataset` trait and stacks
//! samples into `[N, C, H, W]` image, `[N, K]` target and `[N, 2]` coordinate
//! tensors for the data loader.

use std::sync::Arc;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::dataset::{ClassificationDataset, Sample};

/// A single sample flattened for Burn
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NaipItem {
    /// Manifest row index
    pub index: usize,
    pub latitude: f64,
    pub longitude: f64,
    /// Label as `f32`, length K
    pub label: Vec<f32>,
    /// Image data as flattened CHW array
    pub image: Vec<f32>,
    /// `[C, H, W]` of `image`
    pub shape: [usize; 3],
}

impl From<Sample> for NaipItem {
    fn from(sample: Sample) -> Self {
        let (c, h, w) = sample.image.dim();
        let label = sample.label.to_f32_vec();
        let image = if sample.image.is_standard_layout() {
            sample.image.into_raw_vec_and_offset().0
        } else {
            sample.image.iter().copied().collect()
        };
        Self {
            index: sample.index,
            latitude: sample.latitude,
            longitude: sample.longitude,
            label,
            image,
            shape: [c, h, w],
        }
    }
}

/// What [`NaipBurnDataset`] does with a sample that fails to assemble
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Panic with the error, aborting the batch being loaded
    #[default]
    Abort,
    /// Assemble every sample once at construction and expose only those
    /// that succeeded
    Skip,
}

/// Burn view over a shared [`ClassificationDataset`].
///
/// `Dataset::get` returns `None` only past the end; Burn's iterators treat
/// `None` as end of data.
///
/// # Panics
///
/// `get` panics when an exposed sample fails to assemble. Under
/// [`FailurePolicy::Skip`] that only happens if a tile breaks after the scan.
#[derive(Debug, Clone)]
pub struct NaipBurnDataset {
    inner: Arc<ClassificationDataset>,
    indices: Vec<usize>,
    skipped: Vec<usize>,
    policy: FailurePolicy,
    seed: Option<u64>,
}

impl NaipBurnDataset {
    /// Exposes every row, aborting on the first failure
    pub fn new(inner: Arc<ClassificationDataset>) -> Self {
        let indices = (0..inner.len()).collect();
        Self {
            inner,
            indices,
            skipped: Vec::new(),
            policy: FailurePolicy::Abort,
            seed: None,
        }
    }

    /// Scans the split in parallel and exposes only rows that assemble
    pub fn skipping_failures(inner: Arc<ClassificationDataset>) -> Self {
        let failed: Vec<bool> = (0..inner.len())
            .into_par_iter()
            .map(|index| match inner.get_item(index) {
                Ok(_) => false,
                Err(e) => {
                    warn!("Skipping sample {}: {}", index, e);
                    true
                }
            })
            .collect();

        let (skipped, indices): (Vec<usize>, Vec<usize>) =
            (0..inner.len()).partition(|&index| failed[index]);

        if !skipped.is_empty() {
            info!(
                "Skipped {} of {} samples that failed to assemble",
                skipped.len(),
                inner.len()
            );
        }

        Self {
            inner,
            indices,
            skipped,
            policy: FailurePolicy::Skip,
            seed: None,
        }
    }

    /// Builds the adapter for `policy`
    pub fn with_policy(inner: Arc<ClassificationDataset>, policy: FailurePolicy) -> Self {
        match policy {
            FailurePolicy::Abort => Self::new(inner),
            FailurePolicy::Skip => Self::skipping_failures(inner),
        }
    }

    /// Overrides the augmentation seed, e.g. once per epoch
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn inner(&self) -> &ClassificationDataset {
        &self.inner
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Manifest rows left out by the construction scan
    pub fn skipped(&self) -> &[usize] {
        &self.skipped
    }
}

impl Dataset<NaipItem> for NaipBurnDataset {
    fn get(&self, index: usize) -> Option<NaipItem> {
        let row = *self.indices.get(index)?;

        let sample = match self.seed {
            Some(seed) => self.inner.get_item_with_seed(row, seed),
            None => self.inner.get_item(row),
        };

        match sample {
            Ok(sample) => Some(sample.into()),
            Err(e) => {
                error!("Failed to assemble sample {}: {}", row, e);
                panic!("Failed to assemble sample {row}: {e}");
            }
        }
    }

    fn len(&self) -> usize {
        self.indices.len()
    }
}

/// A batch of NAIP tiles
#[derive(Clone, Debug)]
pub struct NaipBatch<B: Backend> {
    /// Images with shape `[batch_size, C, H, W]`
    pub images: Tensor<B, 4>,
    /// Labels with shape `[batch_size, K]`
    pub targets: Tensor<B, 2>,
    /// `(latitude, longitude)` with shape `[batch_size, 2]`
    pub coordinates: Tensor<B, 2>,
}

/// Batcher stacking [`NaipItem`]s on a device
#[derive(Clone, Debug)]
pub struct NaipBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> NaipBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<NaipItem, NaipBatch<B>> for NaipBatcher<B> {
    fn batch(&self, items: Vec<NaipItem>) -> NaipBatch<B> {
        let batch_size = items.len();
        let [channels, height, width] = items.first().map(|item| item.shape).unwrap_or_default();
        let num_labels = items.first().map(|item| item.label.len()).unwrap_or(0);

        let images_data: Vec<f32> = items.iter().flat_map(|item| item.image.iter().copied()).collect();
        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(images_data, [batch_size, channels, height, width]),
            &self.device,
        );

        let targets_data: Vec<f32> = items.iter().flat_map(|item| item.label.iter().copied()).collect();
        let targets = Tensor::<B, 2>::from_floats(
            TensorData::new(targets_data, [batch_size, num_labels]),
            &self.device,
        );

        let coordinates_data: Vec<f32> = items
            .iter()
            .flat_map(|item| [item.latitude as f32, item.longitude as f32])
            .collect();
        let coordinates = Tensor::<B, 2>::from_floats(
            TensorData::new(coordinates_data, [batch_size, 2]),
            &self.device,
        );

        NaipBatch {
            images,
            targets,
            coordinates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::Label;
    use burn::backend::NdArray;
    use ndarray::Array3;

    type TestBackend = NdArray<f32>;

    fn create_test_item(index: usize) -> NaipItem {
        let sample = Sample {
            index,
            latitude: 40.0 + index as f64,
            longitude: -90.0,
            label: Label::MultiHot(vec![1.0, 0.0, index as f64 % 2.0]),
            image: Array3::from_shape_fn((4, 2, 2), |(c, y, x)| (c * 4 + y * 2 + x) as f32),
        };
        sample.into()
    }

    #[test]
    fn test_item_from_sample_is_chw() {
        let item = create_test_item(1);
        assert_eq!(item.shape, [4, 2, 2]);
        assert_eq!(item.image.len(), 16);
        assert_eq!(item.image[5], 5.0);
        assert_eq!(item.label, vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_batcher_shapes() {
        let device = Default::default();
        let batcher = NaipBatcher::<TestBackend>::new(device);

        let items: Vec<NaipItem> = (0..3).map(create_test_item).collect();
        let batch = batcher.batch(items);

        assert_eq!(batch.images.dims(), [3, 4, 2, 2]);
        assert_eq!(batch.targets.dims(), [3, 3]);
        assert_eq!(batch.coordinates.dims(), [3, 2]);

        let coords: Vec<f32> = batch.coordinates.into_data().to_vec().unwrap();
        assert_eq!(&coords[..2], &[40.0, -90.0]);
        assert_eq!(coords[4], 42.0);
    }
}
