use anyhow::{bail, Context, Result};
use ndarray::{ArrayD, Axis, Ix1, Ix2, Ix3};
use crate::common::{BvrBox, BvrImage, BvrInstance, InferenceDevice, ModelConfig, SegConfig};
use crate::data::{MetadataCatalog, X, Y};
use crate::detection_runners::image_ops::{self, ChannelOrder};
use crate::detection_runners::inference_process::InferenceProcess;
use crate::detection_runners::mask_paste::{self, MASK_THRESHOLD};
use crate::detection_runners::ort_detector::OrtEngine;
use crate::utils;

/// Positions of the Mask R-CNN results among the model outputs.
///
/// The default matches a traced export: boxes, classes, masks, scores (an optional trailing
/// image-size output is ignored).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputLayout {
    pub boxes: usize,
    pub classes: Option<usize>,
    pub masks: usize,
    pub scores: usize,
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self {
            boxes: 0,
            classes: Some(1),
            masks: 2,
            scores: 3,
        }
    }
}

impl OutputLayout {
    /// Locates the outputs by name, for exports that name them (`boxes`/`pred_boxes`,
    /// `classes`/`pred_classes`/`labels`, `masks`/`pred_masks`, `scores`).
    ///
    /// Returns `None` unless boxes, masks and scores are all found.
    pub fn from_output_names(names: &[&str]) -> Option<Self> {
        let find = |candidates: &[&str]| {
            names.iter().position(|name| candidates.contains(&name.to_lowercase().as_str()))
        };
        Some(Self {
            boxes: find(&["boxes", "pred_boxes"])?,
            classes: find(&["classes", "pred_classes", "labels"]),
            masks: find(&["masks", "pred_masks"])?,
            scores: find(&["scores"])?,
        })
    }
}

/// Thresholds and sizes needed to turn raw model outputs into frame-space instances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeParams {
    /// Instances must score strictly above this.
    pub score_thresh: f32,
    pub detections_per_image: usize,
    /// `(width, height)` of the original frame.
    pub frame_size: (u32, u32),
    /// `(width, height)` the frame was resized to before inference.
    pub input_size: (u32, u32),
}

/// Mask R-CNN instance segmentation on ONNX Runtime.
#[derive(Debug)]
pub struct OrtMaskRcnn {
    engine: OrtEngine,
    names: Vec<String>,
    layout: OutputLayout,
    channel_order: ChannelOrder,
    min_size_test: u32,
    max_size_test: u32,
    score_thresh: f32,
    detections_per_image: usize,
    profile: bool,
}

impl InferenceProcess for OrtMaskRcnn {
    type Input = BvrImage;

    fn new(cfg: &SegConfig, model_config: &ModelConfig) -> Result<Self> {
        let channel_order = match ChannelOrder::from_str(&cfg.input.format) {
            Some(order) => order,
            None => bail!("Unsupported INPUT.FORMAT '{}', expected BGR or RGB", cfg.input.format),
        };

        let engine = OrtEngine::new(model_config)?;

        let output_names: Vec<&str> = engine.outputs_attrs().iter().map(|x| x.name.as_str()).collect();
        let layout = OutputLayout::from_output_names(&output_names).unwrap_or_default();
        log::debug!("Output layout: {:?}", layout);

        // Class names: registered metadata, then ONNX metadata, then placeholders
        let nc = cfg.model.roi_heads.num_classes;
        let names = match cfg.datasets.test.first() {
            Some(name) => MetadataCatalog::get(name).thing_classes,
            None => vec![],
        };
        let names = if !names.is_empty() {
            names
        } else {
            match engine.try_fetch("names").map(|x| utils::parse_names(&x)) {
                Some(parsed) if !parsed.is_empty() => parsed,
                _ => utils::n2s(nc),
            }
        };
        if names.len() != nc {
            log::warn!("{} class names for MODEL.ROI_HEADS.NUM_CLASSES={}", names.len(), nc);
        }

        log::info!(
            "Mask R-CNN ready | Device: {} | Classes: {:?} | Score threshold: {}",
            engine.device(), names, cfg.model.roi_heads.score_thresh_test
        );

        Ok(Self {
            engine,
            names,
            layout,
            channel_order,
            min_size_test: cfg.input.min_size_test,
            max_size_test: cfg.input.max_size_test,
            score_thresh: cfg.model.roi_heads.score_thresh_test as f32,
            detections_per_image: cfg.test.detections_per_image,
            profile: model_config.profile,
        })
    }

    fn preprocess(&self, x: &Self::Input) -> Result<X> {
        let (width, height) = self.input_size(x);
        let resized = image_ops::resize_image(x, width, height)?;
        let input = image_ops::chw_unnormalized(&resized, self.channel_order)?;

        if self.engine.is_batched() {
            Ok(input.insert_batch_axis())
        } else {
            Ok(input)
        }
    }

    fn inference(&mut self, x: X) -> Result<Vec<ArrayD<f32>>> {
        self.engine.run(x)
    }

    fn postprocess(&self, ys: Vec<ArrayD<f32>>, x0: &Self::Input) -> Result<Y> {
        let params = DecodeParams {
            score_thresh: self.score_thresh,
            detections_per_image: self.detections_per_image,
            frame_size: x0.dimensions(),
            input_size: self.input_size(x0),
        };
        decode_outputs(&ys, &self.layout, &self.names, &params)
    }
}

impl OrtMaskRcnn {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn device(&self) -> InferenceDevice {
        self.engine.device()
    }

    /// Runs the pipeline, tracing stage timings when profiling is enabled.
    pub fn predict(&mut self, x: &BvrImage) -> Result<Y> {
        let profile = self.profile;
        self.forward(x, profile)
    }

    pub fn print_time(&self) {
        log::info!("Avg inference: {:?}", self.engine.infer_time.avg());
    }

    fn input_size(&self, x: &BvrImage) -> (u32, u32) {
        let (w, h) = x.dimensions();
        image_ops::shortest_edge_size(w, h, self.min_size_test, self.max_size_test)
    }
}

/// Filters, orders and rescales the raw Mask R-CNN outputs and builds full-frame boolean masks.
///
/// Instances scoring above `score_thresh` are kept best first, up to `detections_per_image`.
/// Boxes are mapped from input to frame coordinates and clipped. Masks may come as per-box
/// `(N, 1, M, M)` / `(N, M, M)` probabilities, which are pasted into their boxes, or as whole
/// images `(N, H, W)` at frame or input resolution.
pub fn decode_outputs(ys: &[ArrayD<f32>], layout: &OutputLayout, names: &[String],
                      params: &DecodeParams) -> Result<Y> {
    let (img_w, img_h) = params.frame_size;
    let (input_w, input_h) = params.input_size;
    if input_w == 0 || input_h == 0 {
        bail!("Invalid input size {}x{}", input_w, input_h);
    }
    let (sx, sy) = (img_w as f32 / input_w as f32, img_h as f32 / input_h as f32);

    let boxes = output(ys, layout.boxes, "boxes")?
        .view()
        .into_dimensionality::<Ix2>()
        .context("Boxes output must be (N, 4)")?;
    let scores = output(ys, layout.scores, "scores")?
        .view()
        .into_dimensionality::<Ix1>()
        .context("Scores output must be (N,)")?;
    let classes = match layout.classes {
        Some(i) => Some(output(ys, i, "classes")?
            .view()
            .into_dimensionality::<Ix1>()
            .context("Classes output must be (N,)")?),
        None => None,
    };
    let masks = output(ys, layout.masks, "masks")?;
    let masks = match masks.ndim() {
        4 => masks.index_axis(Axis(1), 0),
        3 => masks.view(),
        n => bail!("Masks output must be (N, 1, M, M) or (N, H, W), got {} dims", n),
    }.into_dimensionality::<Ix3>()?;

    let n = scores.len();
    if boxes.nrows() != n || boxes.ncols() != 4 || masks.len_of(Axis(0)) != n
        || classes.as_ref().is_some_and(|c| c.len() != n) {
        bail!(
            "Inconsistent model outputs: boxes {:?}, scores {:?}, masks {:?}",
            boxes.shape(), scores.shape(), masks.shape()
        );
    }

    // Keep confident instances, best first
    let mut kept: Vec<usize> = (0..n).filter(|&i| scores[i] > params.score_thresh).collect();
    kept.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    kept.truncate(params.detections_per_image);

    let mut instances = Vec::with_capacity(kept.len());
    let mut bboxes = Vec::with_capacity(kept.len());
    for &i in kept.iter() {
        let bbox = BvrBox::new(boxes[[i, 0]], boxes[[i, 1]], boxes[[i, 2]], boxes[[i, 3]])
            .scale_xy(sx, sy)
            .clip(img_w as f32, img_h as f32);
        let class_id = classes.as_ref().map_or(0, |c| c[i].round() as isize);

        let mut instance = BvrInstance::default()
            .with_bbox(bbox)
            .with_confidence(scores[i])
            .with_class_id(class_id);
        if let Some(name) = usize::try_from(class_id).ok().and_then(|id| names.get(id)) {
            instance = instance.with_label(name);
        }
        instances.push(instance);
        bboxes.push(bbox);
    }

    let selected = masks.select(Axis(0), &kept);
    let (width, height) = (img_w as usize, img_h as usize);
    let mask_size = (selected.len_of(Axis(2)), selected.len_of(Axis(1)));
    let mask_array = if mask_size == (width, height) {
        mask_paste::threshold_full_masks(selected.view(), MASK_THRESHOLD)
    } else if mask_size == (input_w as usize, input_h as usize) {
        mask_paste::resize_full_masks(selected.view(), width, height, MASK_THRESHOLD)
    } else {
        mask_paste::paste_masks(selected.view(), &bboxes, width, height, MASK_THRESHOLD)
    };

    log::debug!("{} of {} instances kept", instances.len(), n);
    Y::empty(img_w, img_h).with_instances(instances, mask_array)
}

fn output<'a>(ys: &'a [ArrayD<f32>], i: usize, what: &str) -> Result<&'a ArrayD<f32>> {
    match ys.get(i) {
        Some(y) => Ok(y),
        None => bail!("Model has {} outputs, no {} at index {}", ys.len(), what, i),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2, Array, IxDyn};

    // Frame 20x10 fed to the model at 40x20
    const PARAMS: DecodeParams = DecodeParams {
        score_thresh: 0.9,
        detections_per_image: 100,
        frame_size: (20, 10),
        input_size: (40, 20),
    };

    fn outputs(boxes: &[[f32; 4]], classes: &[f32], masks: ArrayD<f32>, scores: &[f32]) -> Vec<ArrayD<f32>> {
        vec![
            arr2(boxes).into_dyn(),
            arr1(classes).into_dyn(),
            masks,
            arr1(scores).into_dyn(),
        ]
    }

    fn box_masks(n: usize) -> ArrayD<f32> {
        Array::from_elem(IxDyn(&[n, 1, 28, 28]), 1.0f32)
    }

    fn names() -> Vec<String> {
        vec!["stop_sign".to_string(), "yield".to_string()]
    }

    #[test]
    fn keeps_confident_instances_best_first() {
        let boxes = [[0., 0., 8., 8.]; 4];
        let ys = outputs(&boxes, &[0., 1., 1., 0.], box_masks(4), &[0.95, 0.5, 0.99, 0.9]);
        let y = decode_outputs(&ys, &OutputLayout::default(), &names(), &PARAMS).unwrap();

        // 0.9 is not above the threshold
        assert_eq!(y.scores(), vec![0.99, 0.95]);
        assert_eq!(y.instances()[0].class_id, 1);
        assert_eq!(y.instances()[0].get_label(), "yield");
        assert_eq!(y.instances()[1].get_label(), "stop_sign");
        assert_eq!(y.masks().dim(), (10, 20, 2));
    }

    #[test]
    fn caps_detections_per_image() {
        let boxes = [[0., 0., 8., 8.]; 3];
        let ys = outputs(&boxes, &[0., 0., 0.], box_masks(3), &[0.91, 0.97, 0.93]);
        let params = DecodeParams { detections_per_image: 2, ..PARAMS };
        let y = decode_outputs(&ys, &OutputLayout::default(), &names(), &params).unwrap();

        assert_eq!(y.scores(), vec![0.97, 0.93]);
    }

    #[test]
    fn boxes_are_rescaled_and_clipped_to_frame() {
        let boxes = [[4., 2., 20., 10.], [30., 0., 50., 20.]];
        let ys = outputs(&boxes, &[0., 0.], box_masks(2), &[0.99, 0.98]);
        let y = decode_outputs(&ys, &OutputLayout::default(), &names(), &PARAMS).unwrap();

        assert_eq!(y.instances()[0].bbox.xyxy(), [2., 1., 10., 5.]);
        assert_eq!(y.instances()[1].bbox.xyxy(), [15., 0., 20., 10.]);

        // Per-box masks are pasted into the rescaled boxes
        let masks = y.masks();
        assert!(masks[[3, 5, 0]]);
        assert!(!masks[[8, 15, 0]]);
        assert!(masks[[8, 17, 1]]);
        assert!(!masks[[3, 5, 1]]);
    }

    #[test]
    fn frame_sized_masks_are_thresholded() {
        let mut masks = Array::from_elem(IxDyn(&[1, 10, 20]), 0.0f32);
        masks[[0, 4, 7]] = 0.8;
        let ys = outputs(&[[0., 0., 40., 20.]], &[0.], masks, &[0.99]);
        let y = decode_outputs(&ys, &OutputLayout::default(), &names(), &PARAMS).unwrap();

        assert_eq!(y.masks().dim(), (10, 20, 1));
        assert!(y.masks()[[4, 7, 0]]);
        assert_eq!(y.masks().iter().filter(|&&v| v).count(), 1);
    }

    #[test]
    fn input_sized_masks_are_resized_to_frame() {
        // Left half of the 40x20 input
        let mut full = Array::from_elem(IxDyn(&[1, 20, 40]), 0.0f32);
        full.slice_mut(ndarray::s![.., .., ..20]).fill(1.0);
        let ys = outputs(&[[0., 0., 40., 20.]], &[0.], full, &[0.99]);
        let y = decode_outputs(&ys, &OutputLayout::default(), &names(), &PARAMS).unwrap();

        let masks = y.masks();
        assert_eq!(masks.dim(), (10, 20, 1));
        assert!(masks[[5, 0, 0]] && masks[[5, 9, 0]]);
        assert!(!masks[[5, 10, 0]] && !masks[[5, 19, 0]]);
    }

    #[test]
    fn nothing_above_threshold_gives_empty_masks() {
        let ys = outputs(&[[0., 0., 8., 8.]], &[0.], box_masks(1), &[0.3]);
        let y = decode_outputs(&ys, &OutputLayout::default(), &names(), &PARAMS).unwrap();

        assert!(y.is_empty());
        assert_eq!(y.masks().dim(), (10, 20, 0));
    }

    #[test]
    fn inconsistent_outputs_fail() {
        let boxes = [[0., 0., 8., 8.]; 3];
        let ys = outputs(&boxes, &[0., 0., 0.], box_masks(3), &[0.99, 0.98]);
        assert!(decode_outputs(&ys, &OutputLayout::default(), &names(), &PARAMS).is_err());

        let ys = outputs(&[[0., 0., 8., 8.]], &[0.], box_masks(1), &[0.99]);
        assert!(decode_outputs(&ys[..3], &OutputLayout::default(), &names(), &PARAMS).is_err());

        let flat = Array::from_elem(IxDyn(&[1, 28]), 1.0f32);
        let ys = outputs(&[[0., 0., 8., 8.]], &[0.], flat, &[0.99]);
        assert!(decode_outputs(&ys, &OutputLayout::default(), &names(), &PARAMS).is_err());
    }

    #[test]
    fn missing_classes_default_to_zero() {
        let ys = outputs(&[[0., 0., 8., 8.]], &[5.], box_masks(1), &[0.99]);
        let layout = OutputLayout { classes: None, ..Default::default() };
        let y = decode_outputs(&ys, &layout, &names(), &PARAMS).unwrap();

        assert_eq!(y.instances()[0].class_id, 0);
        assert_eq!(y.instances()[0].get_label(), "stop_sign");
    }

    #[test]
    fn layout_from_named_outputs() {
        let layout = OutputLayout::from_output_names(&["scores", "pred_masks", "pred_boxes", "labels"]).unwrap();
        assert_eq!(layout, OutputLayout { boxes: 2, classes: Some(3), masks: 1, scores: 0 });

        let layout = OutputLayout::from_output_names(&["Boxes", "Masks", "Scores"]).unwrap();
        assert_eq!(layout.classes, None);

        assert_eq!(OutputLayout::from_output_names(&["output0", "output1", "output2", "output3"]), None);
    }
}
