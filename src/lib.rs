mod utils;
pub mod common;
pub mod data;
pub mod detection_runners;
pub mod detectors;
pub mod mask_processing;

use std::path::Path;
use std::time::Instant;
use image::RgbImage;
use crate::common::{ModelConfig, SegConfig, ZooModel};
use crate::data::{load_dataset_dicts, DatasetCatalog, MetadataCatalog};
use crate::detectors::SignDetector;
use crate::mask_processing::SignDetection;

/// Dataset splits registered by [`register_datasets`], as `<prefix>_<split>`.
pub const DATASET_SPLITS: [&str; 2] = ["train", "test"];
pub const DATASET_PREFIX: &str = "category";

/// Registers `category_train` and `category_test`, loading `<data_path>/train` and
/// `<data_path>/test` on demand, and attaches `classes` as their metadata.
pub fn register_datasets<P: AsRef<Path>>(data_path: P, classes: &[String]) -> anyhow::Result<Vec<String>> {
    let mut names = Vec::with_capacity(DATASET_SPLITS.len());
    for split in DATASET_SPLITS {
        let name = format!("{}_{}", DATASET_PREFIX, split);
        let directory = data_path.as_ref().join(split);
        let split_classes = classes.to_vec();

        DatasetCatalog::register(&name, move || load_dataset_dicts(&directory, &split_classes))?;
        MetadataCatalog::set_thing_classes(&name, classes);
        names.push(name);
    }
    Ok(names)
}

/// The training config: the zoo baseline with the fine-tuning overrides for a small dataset.
pub fn build_train_config(zoo: ZooModel, num_classes: usize) -> anyhow::Result<SegConfig> {
    let mut cfg = zoo.get_config();
    cfg.set("DATASETS.TRAIN", vec![format!("{}_train", DATASET_PREFIX)])?;
    cfg.set("DATASETS.TEST", Vec::<String>::new())?;
    cfg.set("DATALOADER.NUM_WORKERS", 2)?;
    cfg.set("MODEL.WEIGHTS", zoo.checkpoint_url())?;
    cfg.set("SOLVER.IMS_PER_BATCH", 4)?;
    cfg.set("SOLVER.BASE_LR", 0.00025)?;
    cfg.set("SOLVER.MAX_ITER", 1000)?;
    cfg.set("MODEL.ROI_HEADS.NUM_CLASSES", num_classes)?;
    Ok(cfg)
}

/// Points `cfg` at the fine-tuned weights in `output_dir` for inference.
pub fn build_inference_config(cfg: &SegConfig, output_dir: &str) -> anyhow::Result<SegConfig> {
    let mut cfg = cfg.clone();
    cfg.set("OUTPUT_DIR", output_dir)?;
    let weights = cfg.final_weights_path().to_string_lossy().into_owned();
    cfg.set("MODEL.WEIGHTS", weights)?;
    cfg.set("MODEL.ROI_HEADS.SCORE_THRESH_TEST", 0.9)?;
    cfg.set("DATASETS.TEST", vec![format!("{}_test", DATASET_PREFIX)])?;
    Ok(cfg)
}

pub fn init_detector(cfg: &SegConfig, model_details: &ModelConfig) -> anyhow::Result<SignDetector> {
    println!("===========\ninit_detector\n===========");
    log::info!("Initializing ORT session with ({}) execution provider", model_details.inference_device);
    log::debug!("{}", model_details.to_string());

    let mut detector = SignDetector::new(cfg, model_details)?;
    log::info!("Classes {:?} on {}", detector.predictor().names(), detector.predictor().device());
    detector.detect(&RgbImage::new(640, 480))?;
    Ok(detector)
}

pub fn detect_signs(detector: &mut SignDetector, frame: &RgbImage) -> anyhow::Result<SignDetection> {
    let now = Instant::now();

    let detection = detector.detect(frame)?;

    log::info!("Processing time: {:?}", now.elapsed());

    Ok(detection)
}
