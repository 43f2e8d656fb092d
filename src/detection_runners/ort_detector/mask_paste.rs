//! Pasting of per-box mask predictions into full-frame boolean masks.

use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};
use rayon::prelude::*;
use crate::common::BvrBox;

/// Probability at or above which a pixel belongs to the instance.
pub const MASK_THRESHOLD: f32 = 0.5;

/// Samples `mask` (M x M, covering `bbox`) at every frame pixel whose centre falls near the box,
/// bilinearly with zero padding, and thresholds the result.
pub fn paste_mask(mask: ArrayView2<f32>, bbox: &BvrBox, width: usize, height: usize, threshold: f32) -> Array2<bool> {
    let mut out = Array2::from_elem((height, width), false);
    let (mask_h, mask_w) = mask.dim();
    let box_w = bbox.x2 - bbox.x1;
    let box_h = bbox.y2 - bbox.y1;
    if mask_h == 0 || mask_w == 0 || box_w <= 0. || box_h <= 0. {
        return out;
    }

    // Pixels one past the box edge can still pick up weight from the border cells.
    let x_start = (bbox.x1.floor() as i64 - 1).max(0) as usize;
    let y_start = (bbox.y1.floor() as i64 - 1).max(0) as usize;
    let x_end = ((bbox.x2.ceil() as i64 + 1).max(0) as usize).min(width);
    let y_end = ((bbox.y2.ceil() as i64 + 1).max(0) as usize).min(height);

    for y in y_start..y_end {
        let sy = (y as f32 + 0.5 - bbox.y1) / box_h * mask_h as f32 - 0.5;
        for x in x_start..x_end {
            let sx = (x as f32 + 0.5 - bbox.x1) / box_w * mask_w as f32 - 0.5;
            if bilinear_zero_padded(&mask, sx, sy) >= threshold {
                out[[y, x]] = true;
            }
        }
    }
    out
}

/// Pastes one mask per box and stacks the results as `(height, width, instance)`.
pub fn paste_masks(masks: ArrayView3<f32>, boxes: &[BvrBox], width: usize, height: usize, threshold: f32) -> Array3<bool> {
    let planes: Vec<Array2<bool>> = boxes
        .par_iter()
        .enumerate()
        .map(|(i, bbox)| paste_mask(masks.index_axis(Axis(0), i), bbox, width, height, threshold))
        .collect();

    stack_planes(&planes, width, height)
}

/// Thresholds full-frame `(instance, height, width)` probabilities into `(height, width, instance)`.
pub fn threshold_full_masks(masks: ArrayView3<f32>, threshold: f32) -> Array3<bool> {
    let mut out = masks.mapv(|p| p >= threshold);
    // (N, H, W) -> (H, W, N), then make the layout standard again
    out.swap_axes(0, 1);
    out.swap_axes(1, 2);
    out.as_standard_layout().into_owned()
}

/// Resizes whole-image `(instance, h, w)` probabilities to `width` x `height` and thresholds them
/// into `(height, width, instance)`.
pub fn resize_full_masks(masks: ArrayView3<f32>, width: usize, height: usize, threshold: f32) -> Array3<bool> {
    let frame = BvrBox::new(0., 0., width as f32, height as f32);
    let boxes = vec![frame; masks.len_of(Axis(0))];
    paste_masks(masks, &boxes, width, height, threshold)
}

fn stack_planes(planes: &[Array2<bool>], width: usize, height: usize) -> Array3<bool> {
    let mut out = Array3::from_elem((height, width, planes.len()), false);
    for (i, plane) in planes.iter().enumerate() {
        out.index_axis_mut(Axis(2), i).assign(plane);
    }
    out
}

fn bilinear_zero_padded(mask: &ArrayView2<f32>, sx: f32, sy: f32) -> f32 {
    let (mask_h, mask_w) = mask.dim();
    let x0 = sx.floor();
    let y0 = sy.floor();
    let fx = sx - x0;
    let fy = sy - y0;

    let at = |x: f32, y: f32| -> f32 {
        if x < 0. || y < 0. || x >= mask_w as f32 || y >= mask_h as f32 {
            0.
        } else {
            mask[[y as usize, x as usize]]
        }
    };

    at(x0, y0) * (1. - fx) * (1. - fy)
        + at(x0 + 1., y0) * fx * (1. - fy)
        + at(x0, y0 + 1.) * (1. - fx) * fy
        + at(x0 + 1., y0 + 1.) * fx * fy
}
