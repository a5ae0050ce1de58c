//! Imagery constants and the default class vocabulary.

/// Lower bound of NAIP pixel values as stored in the PNG tiles
pub const NAIP_MIN: f32 = 0.0;

/// Upper bound of NAIP pixel values as stored in the PNG tiles
pub const NAIP_MAX: f32 = 255.0;

/// Side length of the tile handed to the model
pub const TILE_SIZE: usize = 224;

/// Raster file expected inside every manifest image folder
pub const RASTER_FILENAME: &str = "naip.png";

/// Default pre-crop resize target
pub const DEFAULT_IMAGE_SIZE: usize = 720;

/// Default land-cover vocabulary.
///
/// Position `i` of every label vector refers to `CLASS_LABELS[i]`, so the
/// order must not change between training runs that share checkpoints.
pub const CLASS_LABELS: [&str; 8] = [
    "agriculture",
    "barren",
    "developed",
    "forest",
    "grassland",
    "shrubland",
    "water",
    "wetland",
];

/// Owned copy of [`CLASS_LABELS`], the form dataset constructors take
pub fn default_vocabulary() -> Vec<String> {
    CLASS_LABELS.iter().map(|s| s.to_string()).collect()
}

/// ImageNet channel means, applied to RGB when a pretrained backbone is used
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet channel standard deviations
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_vocabulary_order() {
        let vocab = default_vocabulary();
        assert_eq!(vocab.len(), CLASS_LABELS.len());
        assert_eq!(vocab[0], "agriculture");
        assert_eq!(vocab[7], "wetland");
    }

    #[test]
    fn test_value_range_is_ordered() {
        assert!(NAIP_MIN < NAIP_MAX);
    }
}
