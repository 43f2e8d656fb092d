pub mod inference_process;
pub mod ort_detector;
pub mod trainer;

pub use ort_detector::*;

/// The predictor used for single-frame inference.
pub type DefaultPredictor = OrtMaskRcnn;
pub use trainer::DefaultTrainer;
