use std::path::{Path, PathBuf};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// File name the trainer writes its final weights to, relative to `OUTPUT_DIR`.
pub const FINAL_WEIGHTS_FILE: &str = "model_final.pth";

/// Keys that may appear in a config file but carry no settings.
const IGNORED_FILE_KEYS: [&str; 2] = ["_BASE_", "VERSION"];

/// Flat-ish parameter tree for the segmentation model, mirroring the key layout of the
/// detection framework's config files (`SOLVER.BASE_LR`, `MODEL.ROI_HEADS.NUM_CLASSES`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SegConfig {
    pub model: ModelSection,
    pub input: InputSection,
    pub datasets: DatasetsSection,
    pub dataloader: DataLoaderSection,
    pub solver: SolverSection,
    pub test: TestSection,
    pub output_dir: String,
    pub seed: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ModelSection {
    pub weights: String,
    pub device: String,
    pub mask_on: bool,
    pub pixel_mean: Vec<f64>,
    pub pixel_std: Vec<f64>,
    pub resnets: ResNetsSection,
    pub roi_heads: RoiHeadsSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ResNetsSection {
    pub depth: u32,
    pub num_groups: u32,
    pub width_per_group: u32,
    pub stride_in_1x1: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct RoiHeadsSection {
    pub num_classes: usize,
    pub score_thresh_test: f64,
    pub nms_thresh_test: f64,
    pub batch_size_per_image: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct InputSection {
    pub format: String,
    pub mask_format: String,
    pub min_size_train: Vec<u32>,
    pub max_size_train: u32,
    pub min_size_test: u32,
    pub max_size_test: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct DatasetsSection {
    pub train: Vec<String>,
    pub test: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct DataLoaderSection {
    pub num_workers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SolverSection {
    pub ims_per_batch: usize,
    pub base_lr: f64,
    pub momentum: f64,
    pub weight_decay: f64,
    pub max_iter: u64,
    pub steps: Vec<u64>,
    pub checkpoint_period: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct TestSection {
    pub detections_per_image: usize,
}

impl Default for SegConfig {
    /// The framework-wide defaults, before any model zoo baseline is applied.
    fn default() -> Self {
        Self {
            model: ModelSection {
                weights: String::new(),
                device: "cuda".to_string(),
                mask_on: false,
                pixel_mean: vec![103.530, 116.280, 123.675],
                pixel_std: vec![1.0, 1.0, 1.0],
                resnets: ResNetsSection {
                    depth: 50,
                    num_groups: 1,
                    width_per_group: 64,
                    stride_in_1x1: true,
                },
                roi_heads: RoiHeadsSection {
                    num_classes: 80,
                    score_thresh_test: 0.05,
                    nms_thresh_test: 0.5,
                    batch_size_per_image: 512,
                },
            },
            input: InputSection {
                format: "BGR".to_string(),
                mask_format: "polygon".to_string(),
                min_size_train: vec![800],
                max_size_train: 1333,
                min_size_test: 800,
                max_size_test: 1333,
            },
            datasets: DatasetsSection {
                train: vec![],
                test: vec![],
            },
            dataloader: DataLoaderSection { num_workers: 4 },
            solver: SolverSection {
                ims_per_batch: 16,
                base_lr: 0.001,
                momentum: 0.9,
                weight_decay: 0.0001,
                max_iter: 40000,
                steps: vec![30000],
                checkpoint_period: 5000,
            },
            test: TestSection { detections_per_image: 100 },
            output_dir: "./output".to_string(),
            seed: -1,
        }
    }
}

impl SegConfig {
    pub fn new() -> Self {
        Default::default()
    }

    /// Merges the settings of a YAML (`.yaml`/`.yml`) or JSON file into this config.
    ///
    /// A `_BASE_` entry is resolved relative to the file and merged first. Keys that do not
    /// exist in the config are rejected.
    pub fn merge_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let overrides = Self::read_config_file(path)?;

        if let Some(base) = overrides.get("_BASE_").and_then(Value::as_str) {
            let base_path = path.parent().unwrap_or(Path::new(".")).join(base);
            self.merge_from_file(&base_path)
                .with_context(|| format!("Failed to merge base config of {}", path.display()))?;
        }

        self.merge_value(overrides)
            .with_context(|| format!("Failed to merge config file {}", path.display()))
    }

    /// Applies dotted-key overrides such as `("SOLVER.BASE_LR", "0.00025")`.
    ///
    /// Values are parsed as YAML scalars, so numbers, booleans and `[a, b]` lists
    /// keep their types; anything unparsable is taken as a plain string.
    pub fn merge_from_list(&mut self, pairs: &[(&str, &str)]) -> Result<()> {
        for (key, raw) in pairs {
            let value = serde_yaml::from_str::<Value>(raw)
                .unwrap_or_else(|_| Value::String(raw.to_string()));
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Sets a single dotted key, e.g. `cfg.set("MODEL.ROI_HEADS.NUM_CLASSES", 1)`.
    pub fn set<V: Into<Value>>(&mut self, key: &str, value: V) -> Result<()> {
        let mut tree = serde_json::to_value(&*self)?;
        let mut node = &mut tree;
        let parts: Vec<&str> = key.split('.').collect();

        for (i, part) in parts.iter().enumerate() {
            node = match node.get_mut(*part) {
                Some(child) => child,
                None => bail!("Non-existent config key: {}", parts[..=i].join(".")),
            };
        }
        *node = value.into();

        *self = serde_json::from_value(tree)
            .with_context(|| format!("Invalid value for config key {}", key))?;
        Ok(())
    }

    /// Path the trainer leaves its final weights at.
    pub fn final_weights_path(&self) -> PathBuf {
        Path::new(&self.output_dir).join(FINAL_WEIGHTS_FILE)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    fn read_config_file(path: &Path) -> Result<Value> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let value: Value = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&text)?,
            Some("json") => serde_json::from_str(&text)?,
            _ => bail!("Unsupported config file extension: {}", path.display()),
        };

        match value {
            Value::Object(_) => Ok(value),
            Value::Null => Ok(Value::Object(Default::default())),
            _ => bail!("Config file {} must contain a mapping at the top level", path.display()),
        }
    }

    fn merge_value(&mut self, overrides: Value) -> Result<()> {
        let mut tree = serde_json::to_value(&*self)?;
        merge_tree(&mut tree, overrides, "")?;
        *self = serde_json::from_value(tree).context("Config value has the wrong type")?;
        Ok(())
    }
}

fn merge_tree(target: &mut Value, overrides: Value, prefix: &str) -> Result<()> {
    let Value::Object(entries) = overrides else {
        *target = overrides;
        return Ok(());
    };

    for (key, value) in entries {
        if prefix.is_empty() && IGNORED_FILE_KEYS.contains(&key.as_str()) {
            continue;
        }
        let full_key = if prefix.is_empty() { key.clone() } else { format!("{}.{}", prefix, key) };

        let slot = match target.get_mut(&key) {
            Some(slot) => slot,
            None => bail!("Non-existent config key: {}", full_key),
        };

        if slot.is_object() && value.is_object() {
            merge_tree(slot, value, &full_key)?;
        } else {
            *slot = value;
        }
    }
    Ok(())
}
