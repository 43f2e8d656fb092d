use anyhow::{bail, Result};
use image::{Rgb, RgbImage};
use ndarray::{Array3, Axis};

/// How detected regions are painted onto the frame.
///
/// The overlay is `alpha * mask_image + beta * frame + gamma`, saturated to 8 bits, where
/// `mask_image` is black except for masked pixels which carry `color`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    pub color: Rgb<u8>,
    pub alpha: f32,
    pub beta: f32,
    pub gamma: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            color: Rgb([200, 200, 200]),
            alpha: 1.0,
            beta: 1.0,
            gamma: 0.0,
        }
    }
}

impl OverlayStyle {
    pub fn with_color(mut self, color: Rgb<u8>) -> Self {
        self.color = color;
        self
    }

    pub fn with_weights(mut self, alpha: f32, beta: f32, gamma: f32) -> Self {
        self.alpha = alpha;
        self.beta = beta;
        self.gamma = gamma;
        self
    }
}

/// Result of running detection on one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SignDetection {
    pub overlay: RgbImage,
    /// Confidence per instance as a whole percentage.
    pub scores: Vec<u8>,
    /// `(height, width, instance)`
    pub mask_array: Array3<bool>,
    /// `(row, col)` of every masked pixel, per instance, in row-major order.
    pub white_coords: Vec<Vec<(usize, usize)>>,
}

impl SignDetection {
    pub fn num_instances(&self) -> usize {
        self.scores.len()
    }
}

/// Rounds a `[0, 1]` confidence to a percentage, halves to even.
pub fn score_percent(score: f32) -> u8 {
    (score * 100.0).round_ties_even().clamp(0.0, 100.0) as u8
}

/// Paints every instance mask into a single overlay, collects the masked pixel coordinates and
/// rounds the scores. Later instances overwrite earlier ones where masks overlap.
pub fn composite_instances(frame: &RgbImage, mask_array: Array3<bool>, scores: &[f32],
                           style: &OverlayStyle) -> Result<SignDetection> {
    let (width, height) = frame.dimensions();
    let (mask_h, mask_w, num_instances) = mask_array.dim();

    if num_instances != scores.len() {
        bail!("Mask array holds {} instances but {} scores were given", num_instances, scores.len());
    }
    if num_instances > 0 && (mask_w, mask_h) != (width as usize, height as usize) {
        bail!("Masks are {}x{} but the frame is {}x{}", mask_w, mask_h, width, height);
    }

    let mut img_mask = RgbImage::new(width, height);
    let mut white_coords = Vec::with_capacity(num_instances);

    for plane in mask_array.axis_iter(Axis(2)) {
        let mut whites = Vec::new();
        for ((row, col), &masked) in plane.indexed_iter() {
            if masked {
                whites.push((row, col));
                img_mask.put_pixel(col as u32, row as u32, style.color);
            }
        }
        white_coords.push(whites);
    }

    let overlay = add_weighted(&img_mask, style.alpha, frame, style.beta, style.gamma)?;
    let scores = scores.iter().map(|&s| score_percent(s)).collect();

    Ok(SignDetection {
        overlay,
        scores,
        mask_array,
        white_coords,
    })
}

/// `src1 * alpha + src2 * beta + gamma` per channel, rounded half to even and saturated to `u8`.
///
/// Both images must have the same dimensions.
pub fn add_weighted(src1: &RgbImage, alpha: f32, src2: &RgbImage, beta: f32, gamma: f32) -> Result<RgbImage> {
    let (width, height) = src2.dimensions();
    if src1.dimensions() != (width, height) {
        bail!("Cannot blend a {:?} image with a {:?} image", src1.dimensions(), (width, height));
    }
    let mut out = RgbImage::new(width, height);

    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let a = src1.get_pixel(x, y);
        let b = src2.get_pixel(x, y);
        for c in 0..3 {
            let v = a[c] as f32 * alpha + b[c] as f32 * beta + gamma;
            pixel[c] = v.round_ties_even().clamp(0.0, 255.0) as u8;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| Rgb([(x * 10) as u8, (y * 10) as u8, 100]))
    }

    #[test]
    fn empty_detection_leaves_frame_unchanged() {
        let frame = frame(5, 4);
        let masks = Array3::from_elem((4, 5, 0), false);
        let det = composite_instances(&frame, masks, &[], &OverlayStyle::default()).unwrap();

        assert_eq!(det.overlay, frame);
        assert!(det.scores.is_empty());
        assert!(det.white_coords.is_empty());
        assert_eq!(det.num_instances(), 0);
    }

    #[test]
    fn masked_pixels_are_brightened_and_saturate() {
        let frame = frame(5, 4);
        let mut masks = Array3::from_elem((4, 5, 1), false);
        masks[[1, 2, 0]] = true;
        masks[[3, 4, 0]] = true;
        let det = composite_instances(&frame, masks, &[0.97], &OverlayStyle::default()).unwrap();

        assert_eq!(det.overlay.get_pixel(2, 1), &Rgb([220, 210, 255]));
        assert_eq!(det.overlay.get_pixel(4, 3), &Rgb([240, 230, 255]));
        assert_eq!(det.overlay.get_pixel(0, 0), frame.get_pixel(0, 0));
        assert_eq!(det.white_coords, vec![vec![(1, 2), (3, 4)]]);
        assert_eq!(det.scores, vec![97]);
    }

    #[test]
    fn coordinates_are_collected_per_instance() {
        let frame = frame(3, 3);
        let mut masks = Array3::from_elem((3, 3, 2), false);
        masks[[0, 0, 0]] = true;
        masks[[2, 1, 1]] = true;
        masks[[0, 2, 1]] = true;
        let det = composite_instances(&frame, masks, &[0.5, 0.9], &OverlayStyle::default()).unwrap();

        assert_eq!(det.white_coords[0], vec![(0, 0)]);
        assert_eq!(det.white_coords[1], vec![(0, 2), (2, 1)]);
        assert_eq!(det.mask_array.dim(), (3, 3, 2));
    }

    #[test]
    fn score_count_must_match_masks() {
        let frame = frame(3, 3);
        let masks = Array3::from_elem((3, 3, 2), false);
        assert!(composite_instances(&frame, masks, &[0.9], &OverlayStyle::default()).is_err());
    }

    #[test]
    fn scores_round_half_to_even() {
        assert_eq!(score_percent(0.999), 100);
        assert_eq!(score_percent(0.125), 12);
        assert_eq!(score_percent(0.0), 0);
        assert_eq!(score_percent(1.5), 100);
    }

    #[test]
    fn add_weighted_with_custom_weights() {
        let a = RgbImage::from_pixel(1, 1, Rgb([100, 0, 255]));
        let b = RgbImage::from_pixel(1, 1, Rgb([50, 50, 50]));
        let out = add_weighted(&a, 0.5, &b, 0.5, 10.0).unwrap();
        assert_eq!(out.get_pixel(0, 0), &Rgb([85, 35, 162]));
    }

    #[test]
    fn add_weighted_rejects_mismatched_sizes() {
        let small = RgbImage::new(2, 2);
        let large = RgbImage::new(3, 2);
        assert!(add_weighted(&small, 1.0, &large, 1.0, 0.0).is_err());
        assert!(add_weighted(&large, 1.0, &small, 1.0, 0.0).is_err());
    }

    #[test]
    fn custom_style_colour_and_weights() {
        let frame = RgbImage::from_pixel(2, 1, Rgb([100, 100, 100]));
        let mut masks = Array3::from_elem((1, 2, 1), false);
        masks[[0, 1, 0]] = true;
        let style = OverlayStyle::default()
            .with_color(Rgb([255, 0, 0]))
            .with_weights(0.4, 0.6, 0.0);
        let det = composite_instances(&frame, masks, &[0.95], &style).unwrap();

        assert_eq!(det.overlay.get_pixel(0, 0), &Rgb([60, 60, 60]));
        assert_eq!(det.overlay.get_pixel(1, 0), &Rgb([162, 60, 60]));
    }
}
