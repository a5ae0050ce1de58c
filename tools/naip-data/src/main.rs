//! NAIP Dataset CLI Tool
//!
//! Validates pipeline configurations, assembles individual samples, scans
//! whole splits for unreadable tiles and drives the Burn data loader over a
//! split to check batch shapes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use burn::backend::NdArray;
use burn::data::dataloader::DataLoaderBuilder;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use naip_core::{
    default_vocabulary, load_toml_config, manifest_path, setup_cli_logging, DatasetConfig, Split,
    TaskKind,
};
use naip_dataset::{
    ClassificationDataset, DatasetStatistics, FailurePolicy, NaipBatcher, NaipBurnDataset,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

type CpuBackend = NdArray<f32>;

/// Pipeline configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Folder holding `train.csv`, `val.csv` and `test.csv`; overrides
    /// `data.manifest_path` when set
    pub dataset_folder: Option<PathBuf>,
    pub data: DatasetConfig,
    pub loader: LoaderConfig,
    pub task: TaskConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub batch_size: usize,
    pub num_workers: usize,
    pub shuffle: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 16,
            num_workers: 4,
            shuffle: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// `all` or a single class name
    pub kind: TaskKind,
    /// Class vocabulary; the built-in land-cover classes when absent
    pub vocabulary: Option<Vec<String>>,
}

impl PipelineConfig {
    pub fn vocabulary(&self) -> Vec<String> {
        self.task.vocabulary.clone().unwrap_or_else(default_vocabulary)
    }

    /// Label names in label order
    pub fn class_names(&self) -> Vec<String> {
        match &self.task.kind {
            TaskKind::All => self.vocabulary(),
            TaskKind::Single(name) => vec![name.clone()],
        }
    }

    /// Dataset configuration for `split`, falling back to `data.split`
    pub fn dataset_config(&self, split: Option<Split>) -> DatasetConfig {
        let mut config = self.data.clone();
        if let Some(split) = split {
            config.split = split;
        }
        if let Some(folder) = &self.dataset_folder {
            config.manifest_path = manifest_path(folder, config.split);
            if config.image_root.is_none() {
                config.image_root = Some(folder.clone());
            }
        }
        config
    }
}

/// NAIP land-cover dataset inspection tool
#[derive(Parser, Debug)]
#[command(
    name = "naip-data",
    about = "Inspect and validate NAIP land-cover datasets",
    long_about = "Load a pipeline configuration, build the classification dataset for a split \
                  and check that its tiles assemble into the expected tensors."
)]
struct Cli {
    /// Path to pipeline configuration file (TOML)
    #[arg(short, long, value_name = "FILE", global = true, default_value = "configs/example.toml")]
    config: PathBuf,

    /// Override the split from the configuration
    #[arg(short, long, value_name = "SPLIT", global = true)]
    split: Option<Split>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the configuration and load the manifest (dry run)
    Check,

    /// Assemble a single sample and print its summary
    Sample {
        /// Sample index; negative values are rejected by the dataset
        #[arg(allow_negative_numbers = true)]
        index: i64,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Assemble every sample of the split in parallel
    Scan {
        /// Write dataset statistics to this JSON file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Exit with an error when any sample fails
        #[arg(long)]
        strict: bool,
    },

    /// Run the Burn data loader on the CPU backend
    Batches {
        /// Stop after this many batches
        #[arg(short, long, value_name = "N")]
        limit: Option<usize>,

        /// Scan the split first and leave out samples that fail to assemble,
        /// instead of aborting on the first one
        #[arg(long)]
        skip_failures: bool,
    },
}

/// Printable summary of one sample
#[derive(Debug, Serialize)]
struct SampleSummary {
    index: usize,
    latitude: f64,
    longitude: f64,
    label: Vec<f64>,
    positives: Vec<String>,
    shape: [usize; 3],
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_cli_logging(cli.verbose)?;

    let config: PipelineConfig = load_toml_config(&cli.config)
        .with_context(|| format!("Failed to load configuration: {}", cli.config.display()))?;
    validate_config(&config)?;

    let dataset = build_dataset(&config, cli.split)?;

    match cli.command {
        Command::Check => run_check(&config, &dataset),
        Command::Sample { index, json } => run_sample(&config, &dataset, index, json),
        Command::Scan { output, strict } => run_scan(&config, &dataset, output.as_deref(), strict),
        Command::Batches {
            limit,
            skip_failures,
        } => {
            let policy = if skip_failures {
                FailurePolicy::Skip
            } else {
                FailurePolicy::Abort
            };
            run_batches(&config, dataset, limit, policy)
        }
    }
}

fn validate_config(config: &PipelineConfig) -> Result<()> {
    if config.loader.batch_size == 0 {
        anyhow::bail!("Batch size must be greater than 0");
    }
    let vocabulary = config.vocabulary();
    if vocabulary.is_empty() {
        anyhow::bail!("Class vocabulary is empty");
    }
    config.task.kind.validate(&vocabulary)?;
    config.data.validate()?;
    Ok(())
}

fn build_dataset(config: &PipelineConfig, split: Option<Split>) -> Result<Arc<ClassificationDataset>> {
    let data = config.dataset_config(split);
    let manifest = data.manifest_path.clone();
    let dataset = ClassificationDataset::for_task(&config.task.kind, data, config.vocabulary())
        .with_context(|| format!("Failed to build dataset from {}", manifest.display()))?;
    Ok(Arc::new(dataset))
}

fn run_check(config: &PipelineConfig, dataset: &ClassificationDataset) -> Result<()> {
    let data = dataset.config();
    debug!("Effective configuration:\n{}", toml::to_string_pretty(data)?);

    info!("");
    info!("Dataset Summary:");
    info!("  Manifest: {}", data.manifest_path.display());
    info!("  Split: {}", data.split);
    info!("  Samples: {}", dataset.len());
    info!("  Task: {}", config.task.kind);
    info!("  Classes: {}", config.task.kind.num_classes(&config.vocabulary()));
    info!("  Products: {}", data.products);
    info!("  Tile shape: {:?}", dataset.image_shape());
    info!("  Transforms: {}", dataset.transforms());
    info!("");
    info!("Configuration validated successfully (dry run)");
    Ok(())
}

fn run_sample(config: &PipelineConfig, dataset: &ClassificationDataset, index: i64, json: bool) -> Result<()> {
    let sample = dataset
        .get_item_signed(index)
        .with_context(|| format!("Failed to assemble sample {index}"))?;

    let class_names = config.class_names();
    let (c, h, w) = sample.image.dim();
    let summary = SampleSummary {
        index: sample.index,
        latitude: sample.latitude,
        longitude: sample.longitude,
        label: sample.label.as_slice().to_vec(),
        positives: sample
            .label
            .positives()
            .filter_map(|i| class_names.get(i).cloned())
            .collect(),
        shape: [c, h, w],
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        info!("Sample {}", summary.index);
        info!("  Coordinates: ({:.6}, {:.6})", summary.latitude, summary.longitude);
        info!("  Label: {:?} {:?}", summary.label, summary.positives);
        info!("  Shape: {:?}", summary.shape);
    }
    Ok(())
}

fn run_scan(
    config: &PipelineConfig,
    dataset: &ClassificationDataset,
    output: Option<&Path>,
    strict: bool,
) -> Result<()> {
    info!("Scanning {} samples...", dataset.len());

    let progress = ProgressBar::new(dataset.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} tiles ({eta})")?
            .progress_chars("=>-"),
    );

    let class_names = config.class_names();
    let stats = (0..dataset.len())
        .into_par_iter()
        .fold(
            || DatasetStatistics::new(class_names.clone()),
            |mut stats, index| {
                match dataset.get_item(index) {
                    Ok(sample) => stats.update(&sample),
                    Err(e) => {
                        warn!("Sample {} failed: {}", index, e);
                        stats.record_failure();
                    }
                }
                progress.inc(1);
                stats
            },
        )
        .reduce(|| DatasetStatistics::new(class_names.clone()), DatasetStatistics::merge);

    progress.finish_with_message("Scan completed");

    info!("");
    info!("Scan Summary:");
    info!("  Assembled: {}", stats.num_samples);
    info!("  Failed: {}", stats.num_failed);
    for ((name, positives), prevalence) in stats
        .class_names
        .iter()
        .zip(&stats.class_positives)
        .zip(stats.prevalence())
    {
        info!("  {:<12} {:>6} ({:.1}%)", name, positives, prevalence * 100.0);
    }
    for (c, channel) in stats.channels.iter().enumerate() {
        info!(
            "  channel {}: min={:.4} max={:.4} mean={:.4}",
            c,
            channel.min,
            channel.max,
            channel.mean().unwrap_or(0.0)
        );
    }

    if let Some(path) = output {
        stats
            .save_json(path)
            .with_context(|| format!("Failed to write statistics: {}", path.display()))?;
        info!("Statistics saved to: {}", path.display());
    }

    if strict && stats.num_failed > 0 {
        anyhow::bail!("{} of {} samples failed", stats.num_failed, dataset.len());
    }
    Ok(())
}

fn run_batches(
    config: &PipelineConfig,
    dataset: Arc<ClassificationDataset>,
    limit: Option<usize>,
    policy: FailurePolicy,
) -> Result<()> {
    let device = Default::default();
    let batcher = NaipBatcher::<CpuBackend>::new(device);

    let mut builder = DataLoaderBuilder::new(batcher)
        .batch_size(config.loader.batch_size)
        .num_workers(config.loader.num_workers);
    if config.loader.shuffle {
        builder = builder.shuffle(dataset.config().seed);
    }
    let burn_dataset = NaipBurnDataset::with_policy(dataset, policy);
    if !burn_dataset.skipped().is_empty() {
        warn!("Leaving out samples {:?}", burn_dataset.skipped());
    }
    let loader = builder.build(burn_dataset);
    let expected = loader.num_items();

    info!(
        "Iterating {} items in batches of {}",
        expected,
        config.loader.batch_size
    );

    let mut num_batches = 0;
    let mut num_items = 0;
    for batch in loader.iter().take(limit.unwrap_or(usize::MAX)) {
        let [n, c, h, w] = batch.images.dims();
        debug!(
            "Batch {}: images [{}, {}, {}, {}], targets {:?}, coordinates {:?}",
            num_batches,
            n,
            c,
            h,
            w,
            batch.targets.dims(),
            batch.coordinates.dims()
        );
        num_batches += 1;
        num_items += n;
    }

    info!("Loaded {} batches ({} items)", num_batches, num_items);
    check_epoch_complete(limit, num_items, expected)
}

/// A worker that aborts on a broken tile can end a multi-threaded epoch early
fn check_epoch_complete(limit: Option<usize>, delivered: usize, expected: usize) -> Result<()> {
    if limit.is_none() && delivered != expected {
        anyhow::bail!(
            "Data loader delivered {} of {} items; rerun with --skip-failures or `scan` the split",
            delivered,
            expected
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use naip_core::Products;

    const CONFIG: &str = r#"
dataset_folder = "/data/naip"

[data]
split = "val"
image_size = 360
tile_size = 224
products = "naip-rgb-nir"

[loader]
batch_size = 8

[task]
kind = "all"
"#;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
        let cli = Cli::parse_from(["naip-data", "sample", "-1"]);
        assert!(matches!(cli.command, Command::Sample { index: -1, .. }));

        let cli = Cli::parse_from(["naip-data", "batches", "--skip-failures"]);
        assert!(matches!(
            cli.command,
            Command::Batches {
                skip_failures: true,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_pipeline_config() {
        let config: PipelineConfig = toml::from_str(CONFIG).unwrap();
        assert_eq!(config.loader.batch_size, 8);
        assert_eq!(config.loader.num_workers, 4);
        assert_eq!(config.task.kind, TaskKind::All);
        assert_eq!(config.data.products, Products::NaipRgbNir);
        assert!(validate_config(&config).is_ok());

        let data = config.dataset_config(None);
        assert_eq!(data.manifest_path, PathBuf::from("/data/naip/val.csv"));
        assert_eq!(data.image_root, Some(PathBuf::from("/data/naip")));

        let data = config.dataset_config(Some(Split::Test));
        assert_eq!(data.manifest_path, PathBuf::from("/data/naip/test.csv"));
    }

    #[test]
    fn test_config_validation() {
        let mut config: PipelineConfig = toml::from_str(CONFIG).unwrap();

        config.task.kind = TaskKind::Single("tundra".to_string());
        assert!(validate_config(&config).is_err());

        config.task.kind = TaskKind::Single("forest".to_string());
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.class_names(), vec!["forest".to_string()]);

        config.loader.batch_size = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_incomplete_epoch_is_an_error() {
        assert!(check_epoch_complete(None, 10, 10).is_ok());
        assert!(check_epoch_complete(Some(2), 8, 10).is_ok());
        let err = check_epoch_complete(None, 2, 10).unwrap_err();
        assert!(err.to_string().contains("2 of 10"));
    }

    #[test]
    fn test_example_config_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../configs/example.toml");
        let config: PipelineConfig = load_toml_config(&path).unwrap();
        assert!(validate_config(&config).is_ok());
    }
}
