//! Dataset statistics computation.

use std::path::Path;

use naip_core::Result;
use serde::{Deserialize, Serialize};

use crate::dataset::Sample;

/// Running min/max/mean of one channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub min: f32,
    pub max: f32,
    pub sum: f64,
    pub count: u64,
}

impl ChannelStats {
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    fn merge(&mut self, other: &ChannelStats) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.count += other.count;
    }
}

impl Default for ChannelStats {
    fn default() -> Self {
        Self {
            min: f32::INFINITY,
            max: f32::NEG_INFINITY,
            sum: 0.0,
            count: 0,
        }
    }
}

/// Dataset statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetStatistics {
    /// Class names, one per label position
    pub class_names: Vec<String>,
    pub num_samples: usize,
    pub num_failed: usize,
    /// Samples with a positive at each label position
    pub class_positives: Vec<usize>,
    pub channels: Vec<ChannelStats>,
}

impl DatasetStatistics {
    pub fn new(class_names: Vec<String>) -> Self {
        let num_classes = class_names.len();
        Self {
            class_names,
            num_samples: 0,
            num_failed: 0,
            class_positives: vec![0; num_classes],
            channels: Vec::new(),
        }
    }

    /// Adds one assembled sample
    pub fn update(&mut self, sample: &Sample) {
        self.num_samples += 1;

        if self.class_positives.len() < sample.label.len() {
            self.class_positives.resize(sample.label.len(), 0);
        }
        for i in sample.label.positives() {
            self.class_positives[i] += 1;
        }

        let num_channels = sample.image.dim().0;
        if self.channels.len() < num_channels {
            self.channels.resize(num_channels, ChannelStats::default());
        }
        for (stats, channel) in self.channels.iter_mut().zip(sample.image.outer_iter()) {
            for &v in channel.iter() {
                stats.min = stats.min.min(v);
                stats.max = stats.max.max(v);
                stats.sum += v as f64;
            }
            stats.count += channel.len() as u64;
        }
    }

    pub fn record_failure(&mut self) {
        self.num_failed += 1;
    }

    /// Combines two partial accumulations
    pub fn merge(mut self, other: DatasetStatistics) -> Self {
        self.num_samples += other.num_samples;
        self.num_failed += other.num_failed;

        if self.class_positives.len() < other.class_positives.len() {
            self.class_positives.resize(other.class_positives.len(), 0);
        }
        for (acc, n) in self.class_positives.iter_mut().zip(&other.class_positives) {
            *acc += n;
        }

        if self.channels.len() < other.channels.len() {
            self.channels.resize(other.channels.len(), ChannelStats::default());
        }
        for (acc, stats) in self.channels.iter_mut().zip(&other.channels) {
            acc.merge(stats);
        }

        if self.class_names.is_empty() {
            self.class_names = other.class_names;
        }
        self
    }

    /// Fraction of samples positive for each label position
    pub fn prevalence(&self) -> Vec<f64> {
        if self.num_samples == 0 {
            return vec![0.0; self.class_positives.len()];
        }
        self.class_positives
            .iter()
            .map(|&n| n as f64 / self.num_samples as f64)
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

impl Default for DatasetStatistics {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
