use crate::common::inference_device::InferenceDevice;

/// Runtime details for loading the exported model, as opposed to the [`SegConfig`](crate::common::SegConfig)
/// parameter tree which describes the model itself.
#[derive(Default, Debug, Clone)]
pub struct ModelConfig {
    pub onnx_path: String,
    pub ort_lib_path: String,
    pub inference_device: InferenceDevice,
    pub intra_threads: usize,
    pub profile: bool,
}

impl ModelConfig {
    pub fn new(onnx_path: String, ort_lib_path: String, inference_device: InferenceDevice) -> Self {
        Self {
            onnx_path,
            ort_lib_path,
            inference_device,
            intra_threads: 4,
            profile: false,
        }
    }

    pub fn with_intra_threads(mut self, n: usize) -> Self {
        self.intra_threads = n;
        self
    }

    pub fn with_profile(mut self, profile: bool) -> Self {
        self.profile = profile;
        self
    }

    pub fn to_string(&self) -> String {
        format!("ONNX Model Path: {}\n\
        OnnxRuntime Lib Path: {}\n\
        Inference Device: {}\n\
        Intra-op Threads: {}",
                self.onnx_path, self.ort_lib_path, self.inference_device, self.intra_threads)
    }
}
