//! NAIP tile dataset library.
//!
//! This crate reads a sample manifest, assembles channels-first tiles from
//! NAIP rasters, encodes land-cover labels and exposes the result to Burn's
//! data loader.

pub mod array_transforms;
pub mod burn_dataset;
pub mod dataset;
pub mod labels;
pub mod loader;
pub mod manifest;
pub mod statistics;
pub mod transforms;

pub use burn_dataset::{FailurePolicy, NaipBatch, NaipBatcher, NaipBurnDataset, NaipItem};
pub use dataset::{ClassificationDataset, Sample};
pub use labels::{encode_binary, encode_multilabel, Label, LabelStrategy};
pub use manifest::{Manifest, ManifestRow};
pub use statistics::DatasetStatistics;
pub use transforms::{TransformOp, TransformPipeline};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::array_transforms::*;
    pub use crate::dataset::*;
    pub use crate::labels::*;
    pub use crate::manifest::*;
    pub use crate::statistics::*;
    pub use crate::transforms::*;
}
