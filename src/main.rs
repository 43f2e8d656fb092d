use std::path::PathBuf;
use anyhow::{anyhow, Context};
use clap::Parser;
use bvr_segment::common::{InferenceDevice, ModelConfig, ZooModel};
use bvr_segment::detection_runners::DefaultTrainer;
use bvr_segment::mask_processing::OverlayStyle;

/// Register a LabelMe dataset, optionally fine-tune Mask R-CNN on it, and segment a frame.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Directory holding the `train` and `test` annotation folders
    #[arg(long, default_value = "./data/")]
    data_path: PathBuf,

    /// Class names, comma separated
    #[arg(long, value_delimiter = ',', default_value = "stop_sign")]
    classes: Vec<String>,

    /// Model zoo baseline
    #[arg(long, default_value = "COCO-InstanceSegmentation/mask_rcnn_R_50_FPN_3x.yaml")]
    zoo_config: String,

    /// Extra YAML/JSON config merged over the built-in settings
    #[arg(long)]
    config_file: Option<PathBuf>,

    /// Where training writes its weights
    #[arg(long, default_value = "./output/")]
    output_dir: String,

    /// Run the training command before inference
    #[arg(long)]
    train: bool,

    /// Training command, space separated; receives `--config-file <OUTPUT_DIR>/config.yaml`
    #[arg(long, value_delimiter = ' ', default_value = "python train_net.py")]
    train_command: Vec<String>,

    /// Exported ONNX model; defaults to `<OUTPUT_DIR>/model_final.onnx`
    #[arg(long)]
    onnx_path: Option<String>,

    /// ONNX Runtime shared library to load
    #[arg(long, default_value = "")]
    ort_lib_path: String,

    /// Execution provider: cpu, cuda or tensorrt
    #[arg(long, default_value = "cpu")]
    device: String,

    #[arg(long, default_value_t = 0)]
    device_id: usize,

    /// Frame to segment
    #[arg(long)]
    image: Option<PathBuf>,

    /// Where the overlay image is written
    #[arg(long, default_value = "detection.jpg")]
    save: PathBuf,

    /// Colour painted over detected regions, as `r,g,b`
    #[arg(long, value_delimiter = ',', default_value = "200,200,200")]
    overlay_color: Vec<u8>,

    /// Log per-stage timings
    #[arg(long)]
    profile: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    bvr_segment::register_datasets(&args.data_path, &args.classes)?;

    let zoo = ZooModel::from(&args.zoo_config)
        .ok_or_else(|| anyhow!("Unknown model zoo config: {}", args.zoo_config))?;
    let mut cfg = bvr_segment::build_train_config(zoo, args.classes.len())?;
    if let Some(path) = &args.config_file {
        cfg.merge_from_file(path)?;
    }

    let mut trainer = DefaultTrainer::new(&cfg)?.with_command(&args.train_command);
    trainer.resume_or_load(false)?;
    if args.train {
        trainer.train()?;
    }

    let cfg = bvr_segment::build_inference_config(&cfg, &args.output_dir)?;

    let Some(image_path) = &args.image else {
        log::info!("No --image given, nothing to detect");
        return Ok(());
    };

    let device = InferenceDevice::from_str(&args.device, args.device_id).ok_or_else(|| anyhow!(
        "Unknown device '{}', expected one of {:?}", args.device, InferenceDevice::all_inference_devices()
    ))?;
    let onnx_path = args.onnx_path.clone().unwrap_or_else(|| {
        cfg.final_weights_path().with_extension("onnx").to_string_lossy().into_owned()
    });
    let model_details = ModelConfig::new(onnx_path, args.ort_lib_path.clone(), device)
        .with_profile(args.profile);

    let style = match args.overlay_color.as_slice() {
        &[r, g, b] => OverlayStyle::default().with_color(image::Rgb([r, g, b])),
        other => return Err(anyhow!("--overlay-color needs three values, got {:?}", other)),
    };
    let mut detector = bvr_segment::init_detector(&cfg, &model_details)?.with_style(style);

    let frame = image::open(image_path)
        .with_context(|| format!("Failed to open image {}", image_path.display()))?
        .to_rgb8();
    let detection = bvr_segment::detect_signs(&mut detector, &frame)?;

    let summary = detector.last_instances().iter()
        .zip(detection.scores.iter())
        .zip(detection.white_coords.iter());
    for ((instance, score), whites) in summary {
        println!("{}: {}% at {:?} ({} pixels)",
                 instance.get_label(), score, instance.bbox.xyxy(), whites.len());
    }

    if args.profile {
        detector.predictor().print_time();
    }

    detection.overlay.save(&args.save)
        .with_context(|| format!("Failed to save overlay to {}", args.save.display()))?;
    log::info!("Overlay written to {}", args.save.display());

    Ok(())
}
