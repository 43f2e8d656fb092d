use std::time::Instant;
use ndarray::ArrayD;
use crate::common::{ModelConfig, SegConfig};
use crate::data::{X, Y};
use crate::utils;

pub trait InferenceProcess: Sized {
    type Input; // BvrImage

    /// Creates a new instance of the model from the model parameters and runtime details.
    fn new(cfg: &SegConfig, model_config: &ModelConfig) -> anyhow::Result<Self>;

    /// Pre-process the input frame.
    fn preprocess(&self, x: &Self::Input) -> anyhow::Result<X>;

    /// Executes the model on the preprocessed data.
    fn inference(&mut self, x: X) -> anyhow::Result<Vec<ArrayD<f32>>>;

    /// Post-process the model's output back into the frame's coordinates.
    fn postprocess(&self, ys: Vec<ArrayD<f32>>, x0: &Self::Input) -> anyhow::Result<Y>;

    /// Executes the full pipeline, tracing the time spent in each stage.
    fn forward(&mut self, x: &Self::Input, profile: bool) -> anyhow::Result<Y> {
        let detect_time = Instant::now();
        let mut _detect_elapsed = detect_time.elapsed();

        let ys = self.preprocess(x)?;
        _detect_elapsed = utils::trace(profile, "TIME", "Preprocessing input", detect_time, _detect_elapsed);

        let ys = self.inference(ys)?;
        _detect_elapsed = utils::trace(profile, "TIME", "Detection run", detect_time, _detect_elapsed);

        let ys = self.postprocess(ys, x)?;
        _detect_elapsed = utils::trace(profile, "TIME", "Postprocessing", detect_time, _detect_elapsed);

        Ok(ys)
    }
}
