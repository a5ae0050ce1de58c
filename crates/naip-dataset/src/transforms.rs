//! Per-sample transform pipeline.
//!
//! Built once per dataset from the split, the augmentation policy and the
//! pretrained flag, then applied to every assembled channels-first tile.
//! Random operations draw from a caller-provided RNG so the dataset can
//! make every access reproducible.

use std::fmt;

use naip_core::{AugmentationPolicy, Split, IMAGENET_MEAN, IMAGENET_STD};
use ndarray::{Array3, Axis};
use rand::Rng;

/// A single step of the pipeline, acting on `(C, H, W)` tiles
#[derive(Debug, Clone, PartialEq)]
pub enum TransformOp {
    /// Mirror left-right with probability `p`
    HorizontalFlip { p: f64 },
    /// Mirror top-bottom with probability `p`
    VerticalFlip { p: f64 },
    /// Rotate by a uniformly drawn multiple of 90 degrees
    RandomRot90,
    /// `(x - mean) / std` on the leading channels; trailing channels untouched
    Normalize { mean: Vec<f32>, std: Vec<f32> },
}

impl TransformOp {
    fn apply<R: Rng + ?Sized>(&self, mut image: Array3<f32>, rng: &mut R) -> Array3<f32> {
        match self {
            TransformOp::HorizontalFlip { p } => {
                if rng.gen_bool(*p) {
                    image.invert_axis(Axis(2));
                }
                image
            }
            TransformOp::VerticalFlip { p } => {
                if rng.gen_bool(*p) {
                    image.invert_axis(Axis(1));
                }
                image
            }
            TransformOp::RandomRot90 => {
                let turns = rng.gen_range(0..4);
                for _ in 0..turns {
                    image = rot90(image);
                }
                image
            }
            TransformOp::Normalize { mean, std } => {
                for (c, mut channel) in image.axis_iter_mut(Axis(0)).enumerate() {
                    if let (Some(m), Some(s)) = (mean.get(c), std.get(c)) {
                        channel.mapv_inplace(|v| (v - m) / s);
                    }
                }
                image
            }
        }
    }
}

impl fmt::Display for TransformOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformOp::HorizontalFlip { p } => write!(f, "hflip(p={p})"),
            TransformOp::VerticalFlip { p } => write!(f, "vflip(p={p})"),
            TransformOp::RandomRot90 => write!(f, "rot90"),
            TransformOp::Normalize { mean, .. } => write!(f, "normalize({} ch)", mean.len()),
        }
    }
}

/// Counter-clockwise quarter turn of a `(C, H, W)` tile.
fn rot90(mut image: Array3<f32>) -> Array3<f32> {
    image.swap_axes(1, 2);
    image.invert_axis(Axis(1));
    image
}

/// Ordered, immutable list of transform steps
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformPipeline {
    ops: Vec<TransformOp>,
}

impl TransformPipeline {
    pub fn new(ops: Vec<TransformOp>) -> Self {
        Self { ops }
    }

    /// Identity pipeline
    pub fn identity() -> Self {
        Self::default()
    }

    /// Builds the pipeline for a dataset.
    ///
    /// Augmentation only runs on the train split. Normalisation runs after
    /// augmentation on every split when `pretrained` is set.
    pub fn build(split: Split, augmentation: AugmentationPolicy, pretrained: bool) -> Self {
        let mut ops = Vec::new();

        if split.is_train() {
            match augmentation {
                AugmentationPolicy::None => {}
                AugmentationPolicy::Flip => {
                    ops.push(TransformOp::HorizontalFlip { p: 0.5 });
                    ops.push(TransformOp::VerticalFlip { p: 0.5 });
                }
                AugmentationPolicy::FlipRotate => {
                    ops.push(TransformOp::HorizontalFlip { p: 0.5 });
                    ops.push(TransformOp::VerticalFlip { p: 0.5 });
                    ops.push(TransformOp::RandomRot90);
                }
            }
        }

        if pretrained {
            ops.push(TransformOp::Normalize {
                mean: IMAGENET_MEAN.to_vec(),
                std: IMAGENET_STD.to_vec(),
            });
        }

        Self { ops }
    }

    pub fn ops(&self) -> &[TransformOp] {
        &self.ops
    }

    pub fn is_identity(&self) -> bool {
        self.ops.is_empty()
    }

    /// Applies every step in order; the result is in standard layout.
    pub fn apply<R: Rng + ?Sized>(&self, image: Array3<f32>, rng: &mut R) -> Array3<f32> {
        if self.is_identity() {
            return image;
        }
        let out = self.ops.iter().fold(image, |img, op| op.apply(img, rng));
        out.as_standard_layout().into_owned()
    }
}

impl fmt::Display for TransformPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ops.is_empty() {
            return write!(f, "identity");
        }
        let names: Vec<String> = self.ops.iter().map(|op| op.to_string()).collect();
        write!(f, "{}", names.join(" -> "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn create_test_tile() -> Array3<f32> {
        Array3::from_shape_fn((4, 3, 3), |(c, y, x)| (c * 100 + y * 10 + x) as f32)
    }

    #[test]
    fn test_eval_split_never_augments() {
        for policy in [AugmentationPolicy::Flip, AugmentationPolicy::FlipRotate] {
            let pipeline = TransformPipeline::build(Split::Val, policy, false);
            assert!(pipeline.is_identity());
            let pipeline = TransformPipeline::build(Split::Test, policy, true);
            assert_eq!(pipeline.ops().len(), 1);
        }
    }

    #[test]
    fn test_train_policies() {
        let flip = TransformPipeline::build(Split::Train, AugmentationPolicy::Flip, false);
        assert_eq!(flip.ops().len(), 2);

        let rotate = TransformPipeline::build(Split::Train, AugmentationPolicy::FlipRotate, true);
        assert_eq!(rotate.ops().len(), 4);
        assert!(matches!(rotate.ops()[3], TransformOp::Normalize { .. }));
        assert_eq!(rotate.to_string(), "hflip(p=0.5) -> vflip(p=0.5) -> rot90 -> normalize(3 ch)");
    }

    #[test]
    fn test_identity_passthrough() {
        let pipeline = TransformPipeline::build(Split::Train, AugmentationPolicy::None, false);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let tile = create_test_tile();
        assert_eq!(pipeline.apply(tile.clone(), &mut rng), tile);
        assert_eq!(pipeline.to_string(), "identity");
    }

    #[test]
    fn test_forced_flips() {
        let tile = create_test_tile();
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let hflip = TransformPipeline::new(vec![TransformOp::HorizontalFlip { p: 1.0 }]);
        let out = hflip.apply(tile.clone(), &mut rng);
        assert_eq!(out[[1, 0, 0]], tile[[1, 0, 2]]);

        let vflip = TransformPipeline::new(vec![TransformOp::VerticalFlip { p: 1.0 }]);
        let out = vflip.apply(tile.clone(), &mut rng);
        assert_eq!(out[[2, 0, 1]], tile[[2, 2, 1]]);
    }

    #[test]
    fn test_rot90_counter_clockwise() {
        let tile = create_test_tile();
        let rotated = rot90(tile.clone());
        // top-right corner moves to top-left
        assert_eq!(rotated[[0, 0, 0]], tile[[0, 0, 2]]);
        assert_eq!(rotated[[3, 2, 0]], tile[[3, 0, 0]]);

        let full_turn = (0..4).fold(tile.clone(), |img, _| rot90(img));
        assert_eq!(full_turn, tile);
    }

    #[test]
    fn test_normalize_leaves_nir_untouched() {
        let tile = Array3::from_elem((4, 2, 2), 0.5f32);
        let pipeline = TransformPipeline::build(Split::Val, AugmentationPolicy::None, true);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let out = pipeline.apply(tile, &mut rng);

        let expected_red = (0.5 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        assert!((out[[0, 1, 1]] - expected_red).abs() < 1e-6);
        assert_eq!(out[[3, 1, 1]], 0.5);
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let pipeline = TransformPipeline::build(Split::Train, AugmentationPolicy::FlipRotate, false);
        let tile = create_test_tile();

        let a = pipeline.apply(tile.clone(), &mut ChaCha8Rng::seed_from_u64(17));
        let b = pipeline.apply(tile, &mut ChaCha8Rng::seed_from_u64(17));
        assert_eq!(a, b);
        assert_eq!(a.dim(), (4, 3, 3));
    }
}
