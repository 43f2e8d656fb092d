use image::RgbImage;
use crate::common::{BvrImage, BvrInstance, ModelConfig, SegConfig};
use crate::detection_runners::inference_process::InferenceProcess;
use crate::detection_runners::OrtMaskRcnn;
use crate::mask_processing::{self, OverlayStyle, SignDetection};

/// Predictor plus overlay compositing: frame in, overlay, scores, masks and coordinates out.
#[derive(Debug)]
pub struct SignDetector {
    predictor: OrtMaskRcnn,
    style: OverlayStyle,
    last_instances: Vec<BvrInstance>,
}

impl SignDetector {
    pub fn new(cfg: &SegConfig, model_config: &ModelConfig) -> anyhow::Result<Self> {
        let predictor = OrtMaskRcnn::new(cfg, model_config)?;
        Ok(Self::from_predictor(predictor))
    }

    pub fn from_predictor(predictor: OrtMaskRcnn) -> Self {
        Self {
            predictor,
            style: OverlayStyle::default(),
            last_instances: vec![],
        }
    }

    pub fn with_style(mut self, style: OverlayStyle) -> Self {
        self.style = style;
        self
    }

    pub fn detect(&mut self, frame: &RgbImage) -> anyhow::Result<SignDetection> {
        let bvr_image = BvrImage::from(frame.clone());
        let y = self.predictor.predict(&bvr_image)?;

        let scores = y.scores();
        let (instances, masks) = y.into_parts();
        let detection = mask_processing::composite_instances(frame, masks, &scores, &self.style)?;

        log::info!("Detected {} instances | Scores: {:?}", detection.num_instances(), detection.scores);
        self.last_instances = instances;
        Ok(detection)
    }

    /// Boxes, classes and labels of the instances found by the last [`SignDetector::detect`] call.
    pub fn last_instances(&self) -> &[BvrInstance] {
        &self.last_instances
    }

    pub fn predictor(&self) -> &OrtMaskRcnn {
        &self.predictor
    }
}
