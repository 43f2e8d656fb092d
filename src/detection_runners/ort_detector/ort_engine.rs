use std::time::Instant;
use anyhow::{anyhow, Context, Result};
use ndarray::ArrayD;
use ort::{
    CUDAExecutionProvider, ExecutionProvider, GraphOptimizationLevel, Session, SessionBuilder,
    SessionOutputs, TensorRTExecutionProvider, ValueType,
};
use crate::common::{InferenceDevice, ModelConfig};
use crate::data::TimeCalc;
use crate::detection_runners::input_wrapper::X;

/// Name and static dimensions of one model input or output. Dynamic axes are `-1`.
#[derive(Debug, Clone, Default)]
pub struct OrtTensorAttr {
    pub name: String,
    pub dims: Vec<i64>,
}

/// ONNXRuntime Backend
#[derive(Debug)]
pub struct OrtEngine {
    session: Session,
    device: InferenceDevice,
    inputs_attrs: Vec<OrtTensorAttr>,
    outputs_attrs: Vec<OrtTensorAttr>,
    profile: bool,
    pub infer_time: TimeCalc,
}

impl OrtEngine {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        if !config.ort_lib_path.is_empty() {
            if let Err(e) = ort::init_from(&config.ort_lib_path).commit() {
                log::error!("ORT commit failed! Error: {:?}", e);
                return Err(anyhow!("Failed to commit ORT from {}: {:?}", config.ort_lib_path, e));
            }
        }

        let builder = Session::builder()?;

        let mut device = config.inference_device;
        match device {
            InferenceDevice::CUDA(device_id) => {
                Self::build_cuda(&builder, device_id).unwrap_or_else(|err| {
                    log::warn!("{err}, Using cpu");
                    device = InferenceDevice::CPU;
                })
            }
            InferenceDevice::TensorRT(device_id) => {
                Self::build_trt(&builder, device_id).unwrap_or_else(|err| {
                    log::warn!("{err}, Using cpu");
                    device = InferenceDevice::CPU;
                })
            }
            InferenceDevice::CPU => {}
        }

        let session = builder
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(config.intra_threads.max(1))?
            .commit_from_file(&config.onnx_path)
            .with_context(|| format!("Failed to load model from {}", config.onnx_path))?;

        let inputs_attrs = session.inputs
            .iter()
            .map(|input| Self::tensor_attr(&input.name, &input.input_type))
            .collect::<Vec<_>>();
        let outputs_attrs = session.outputs
            .iter()
            .map(|output| Self::tensor_attr(&output.name, &output.output_type))
            .collect::<Vec<_>>();

        if inputs_attrs.is_empty() {
            anyhow::bail!("Model {} declares no inputs", config.onnx_path);
        }

        log::info!(
            "Backend: ONNXRuntime | Device: {} | Inputs: {:?} | Outputs: {:?}",
            device,
            inputs_attrs.iter().map(|x| &x.name).collect::<Vec<_>>(),
            outputs_attrs.iter().map(|x| &x.name).collect::<Vec<_>>(),
        );

        Ok(Self {
            session,
            device,
            inputs_attrs,
            outputs_attrs,
            profile: config.profile,
            infer_time: TimeCalc::default(),
        })
    }

    fn build_cuda(builder: &SessionBuilder, device_id: usize) -> Result<()> {
        let cuda = CUDAExecutionProvider::default().with_device_id(device_id as i32);
        if !cuda.is_available()? {
            anyhow::bail!("CUDA execution provider is not available");
        }
        cuda.register(builder)?;
        log::info!("CUDA device {} successfully registered", device_id);
        Ok(())
    }

    fn build_trt(builder: &SessionBuilder, device_id: usize) -> Result<()> {
        let trt = TensorRTExecutionProvider::default().with_device_id(device_id as i32);
        if !trt.is_available()? {
            anyhow::bail!("TensorRT execution provider is not available");
        }
        trt.register(builder)?;
        log::info!("TensorRT device {} successfully registered", device_id);
        Ok(())
    }

    fn tensor_attr(name: &str, value_type: &ValueType) -> OrtTensorAttr {
        let dims = match value_type {
            ValueType::Tensor { dimensions, .. } => dimensions.clone(),
            _ => vec![],
        };
        OrtTensorAttr { name: name.to_string(), dims }
    }

    /// Runs the model on a single input tensor and returns every output as `f32`, in the
    /// order the model declares them. Integer outputs (e.g. class ids) are converted.
    pub fn run(&mut self, x: X) -> Result<Vec<ArrayD<f32>>> {
        let t = Instant::now();
        let input_name = self.inputs_attrs[0].name.as_str();
        let outputs: SessionOutputs = self.session.run(ort::inputs![input_name => x.0.view()]?)?;

        let mut ys = Vec::with_capacity(self.outputs_attrs.len());
        for attr in self.outputs_attrs.iter() {
            let value = &outputs[attr.name.as_str()];
            let y = match value.try_extract_tensor::<f32>() {
                Ok(tensor) => tensor.into_owned(),
                Err(_) => value.try_extract_tensor::<i64>()
                    .with_context(|| format!("Output '{}' is neither f32 nor i64", attr.name))?
                    .mapv(|v| v as f32),
            };
            ys.push(y);
        }

        let elapsed = t.elapsed();
        self.infer_time.add_or_push(0, elapsed);
        if self.profile {
            log::info!("> Inference: {:?}", elapsed);
        }
        Ok(ys)
    }

    /// Fetches a custom metadata entry stored in the ONNX file, e.g. `names`.
    pub fn try_fetch(&self, key: &str) -> Option<String> {
        let metadata = self.session.metadata().ok()?;
        metadata.custom(key).ok().flatten()
    }

    pub fn device(&self) -> InferenceDevice {
        self.device
    }

    pub fn inputs_attrs(&self) -> &[OrtTensorAttr] {
        &self.inputs_attrs
    }

    pub fn outputs_attrs(&self) -> &[OrtTensorAttr] {
        &self.outputs_attrs
    }

    /// Whether the first input carries a batch axis, i.e. is `(N, C, H, W)` rather than `(C, H, W)`.
    pub fn is_batched(&self) -> bool {
        self.inputs_attrs[0].dims.len() == 4
    }
}
