use std::path::{Path, PathBuf};
use std::process::Command;
use anyhow::{bail, Context, Result};
use crate::common::SegConfig;
use crate::data::{DatasetCatalog, DatasetRecord};

/// Checkpoint pointer file the training backend keeps in `OUTPUT_DIR`.
const LAST_CHECKPOINT_FILE: &str = "last_checkpoint";
const CONFIG_FILE: &str = "config.yaml";

/// Hands the merged config and the registered training records to an external training
/// command, which owns the actual optimisation loop.
#[derive(Debug)]
pub struct DefaultTrainer {
    cfg: SegConfig,
    datasets: Vec<(String, Vec<DatasetRecord>)>,
    start_weights: String,
    command: Vec<String>,
}

impl DefaultTrainer {
    /// Resolves every `DATASETS.TRAIN` entry through the [`DatasetCatalog`] and creates `OUTPUT_DIR`.
    pub fn new(cfg: &SegConfig) -> Result<Self> {
        if cfg.datasets.train.is_empty() {
            bail!("DATASETS.TRAIN is empty");
        }

        let mut datasets = Vec::with_capacity(cfg.datasets.train.len());
        for name in cfg.datasets.train.iter() {
            let records = DatasetCatalog::get(name)?;
            if records.is_empty() {
                bail!("Dataset '{}' is empty!", name);
            }
            let num_objects: usize = records.iter().map(|r| r.annotations.len()).sum();
            log::info!("Dataset '{}': {} images, {} instances", name, records.len(), num_objects);
            datasets.push((name.clone(), records));
        }

        std::fs::create_dir_all(&cfg.output_dir)
            .with_context(|| format!("Failed to create output directory {}", cfg.output_dir))?;

        Ok(Self {
            cfg: cfg.clone(),
            datasets,
            start_weights: cfg.model.weights.clone(),
            command: vec![],
        })
    }

    /// Sets the external training command, e.g. `["python", "train_net.py"]`.
    pub fn with_command(mut self, command: &[String]) -> Self {
        self.command = command.to_vec();
        self
    }

    /// Picks the weights training starts from: `MODEL.WEIGHTS`, or with `resume` the checkpoint
    /// named in `OUTPUT_DIR/last_checkpoint` when one exists.
    pub fn resume_or_load(&mut self, resume: bool) -> Result<&str> {
        self.start_weights = self.cfg.model.weights.clone();

        let pointer = Path::new(&self.cfg.output_dir).join(LAST_CHECKPOINT_FILE);
        if resume && pointer.is_file() {
            let name = std::fs::read_to_string(&pointer)
                .with_context(|| format!("Failed to read {}", pointer.display()))?;
            let checkpoint = Path::new(&self.cfg.output_dir).join(name.trim());
            self.start_weights = checkpoint.to_string_lossy().into_owned();
        }

        log::info!("Training starts from weights: {}", self.start_weights);
        Ok(&self.start_weights)
    }

    /// Writes `config.yaml` and one `<dataset>.json` per training dataset to `OUTPUT_DIR`, runs the
    /// training command and returns the path of the final weights it produced.
    pub fn train(&self) -> Result<PathBuf> {
        let Some((program, args)) = self.command.split_first() else {
            bail!("No training command configured");
        };

        let output_dir = Path::new(&self.cfg.output_dir);
        let config_path = self.write_inputs(output_dir)?;

        log::info!("Starting training: {} {:?} for {} iterations", program, args, self.cfg.solver.max_iter);
        let status = Command::new(program)
            .args(args)
            .arg("--config-file")
            .arg(&config_path)
            .status()
            .with_context(|| format!("Failed to launch training command {}", program))?;

        if !status.success() {
            bail!("Training command exited with {}", status);
        }

        let weights = self.cfg.final_weights_path();
        if !weights.is_file() {
            bail!("Training finished but {} was not written", weights.display());
        }
        log::info!("Training finished, weights at {}", weights.display());
        Ok(weights)
    }

    pub fn datasets(&self) -> &[(String, Vec<DatasetRecord>)] {
        &self.datasets
    }

    pub fn start_weights(&self) -> &str {
        &self.start_weights
    }

    /// Writes the training inputs and returns the config path.
    pub(crate) fn write_inputs(&self, output_dir: &Path) -> Result<PathBuf> {
        let mut cfg = self.cfg.clone();
        cfg.model.weights = self.start_weights.clone();

        let config_path = output_dir.join(CONFIG_FILE);
        std::fs::write(&config_path, cfg.to_yaml()?)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;

        for (name, records) in self.datasets.iter() {
            let path = output_dir.join(format!("{}.json", name));
            let text = serde_json::to_string_pretty(records)?;
            std::fs::write(&path, text).with_context(|| format!("Failed to write {}", path.display()))?;
        }
        Ok(config_path)
    }
}
