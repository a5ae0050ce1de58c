//! Core type definitions for the NAIP land-cover pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Data split type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    /// Training data
    #[default]
    Train,
    /// Validation data
    #[serde(alias = "valid", alias = "validation")]
    Val,
    /// Test data
    Test,
}

impl Split {
    /// All splits, in manifest discovery order
    pub const ALL: [Split; 3] = [Split::Train, Split::Val, Split::Test];

    /// Whether random augmentation may be applied on this split
    pub fn is_train(&self) -> bool {
        matches!(self, Split::Train)
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Split::Train => write!(f, "train"),
            Split::Val => write!(f, "val"),
            Split::Test => write!(f, "test"),
        }
    }
}

impl FromStr for Split {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "train" => Ok(Split::Train),
            "val" | "valid" | "validation" => Ok(Split::Val),
            "test" => Ok(Split::Test),
            other => Err(Error::InvalidArgument(format!("unknown split '{other}'"))),
        }
    }
}

/// A named subset of raster channels processed together
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BandGroup {
    /// Red, green and blue, raster channels 0..3
    Rgb,
    /// Near-infrared, raster channel 3
    Nir,
}

impl BandGroup {
    /// Raster channel indices making up the group
    pub fn channels(&self) -> &'static [usize] {
        match self {
            BandGroup::Rgb => &[0, 1, 2],
            BandGroup::Nir => &[3],
        }
    }
}

/// Imagery product selection; decides which band groups are assembled
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Products {
    /// RGB only, 3 output channels
    #[default]
    #[serde(rename = "naip-rgb")]
    NaipRgb,
    /// RGB followed by NIR, 4 output channels
    #[serde(rename = "naip-rgb-nir", alias = "naip-rgbn", alias = "naip")]
    NaipRgbNir,
}

impl Products {
    /// Band groups in concatenation order
    pub fn band_groups(&self) -> &'static [BandGroup] {
        match self {
            Products::NaipRgb => &[BandGroup::Rgb],
            Products::NaipRgbNir => &[BandGroup::Rgb, BandGroup::Nir],
        }
    }

    pub fn uses_nir(&self) -> bool {
        self.band_groups().contains(&BandGroup::Nir)
    }

    /// Number of channels in an assembled tile
    pub fn num_channels(&self) -> usize {
        self.band_groups().iter().map(|g| g.channels().len()).sum()
    }

    /// Minimum raster channel count needed to assemble this product
    pub fn required_raster_channels(&self) -> usize {
        self.band_groups()
            .iter()
            .flat_map(|g| g.channels())
            .max()
            .map(|c| c + 1)
            .unwrap_or(0)
    }
}

impl fmt::Display for Products {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Products::NaipRgb => write!(f, "naip-rgb"),
            Products::NaipRgbNir => write!(f, "naip-rgb-nir"),
        }
    }
}

impl FromStr for Products {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "naip-rgb" => Ok(Products::NaipRgb),
            "naip-rgb-nir" | "naip-rgbn" | "naip" => Ok(Products::NaipRgbNir),
            other => Err(Error::InvalidArgument(format!(
                "invalid product type '{other}', expected one of: naip-rgb, naip-rgb-nir"
            ))),
        }
    }
}

/// Augmentation policy forwarded to the transform builder
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AugmentationPolicy {
    /// Identity transform
    #[default]
    None,
    /// Random horizontal and vertical flips
    Flip,
    /// Flips plus random quarter-turn rotations
    #[serde(alias = "flip_rotate")]
    FlipRotate,
}

impl fmt::Display for AugmentationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AugmentationPolicy::None => write!(f, "none"),
            AugmentationPolicy::Flip => write!(f, "flip"),
            AugmentationPolicy::FlipRotate => write!(f, "flip-rotate"),
        }
    }
}

impl FromStr for AugmentationPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(AugmentationPolicy::None),
            "flip" => Ok(AugmentationPolicy::Flip),
            "flip-rotate" | "flip_rotate" => Ok(AugmentationPolicy::FlipRotate),
            other => Err(Error::InvalidArgument(format!(
                "unknown augmentation policy '{other}'"
            ))),
        }
    }
}

/// Which labels a run trains against
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum TaskKind {
    /// Multi-label over the whole vocabulary
    #[default]
    All,
    /// Binary presence of one class
    Single(String),
}

impl TaskKind {
    /// Checks a single task against the vocabulary
    pub fn validate(&self, vocabulary: &[String]) -> Result<()> {
        match self {
            TaskKind::All => Ok(()),
            TaskKind::Single(task) if vocabulary.iter().any(|c| c == task) => Ok(()),
            TaskKind::Single(task) => Err(Error::InvalidArgument(format!(
                "invalid task type '{task}', not in the class vocabulary"
            ))),
        }
    }

    /// Width of the model head for this task
    pub fn num_classes(&self, vocabulary: &[String]) -> usize {
        match self {
            TaskKind::All => vocabulary.len(),
            TaskKind::Single(_) => 1,
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::All => write!(f, "all"),
            TaskKind::Single(task) => write!(f, "{task}"),
        }
    }
}

impl FromStr for TaskKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" => Err(Error::InvalidArgument("empty task type".to_string())),
            "all" => Ok(TaskKind::All),
            task => Ok(TaskKind::Single(task.to_string())),
        }
    }
}

impl Serialize for TaskKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TaskKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
