//! Functions to preprocess frames for the segmentation model.

use anyhow::{bail, Result};
use fast_image_resize::{images::Image as FirImage, pixels::PixelType, ResizeAlg, ResizeOptions, Resizer};
use fast_image_resize::FilterType;
use crate::common::BvrImage;
use crate::detection_runners::input_wrapper::X;

/// Channel order the model expects its input in.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    #[default] Bgr,
    Rgb,
}

impl ChannelOrder {
    pub fn from_str(format: &str) -> Option<Self> {
        match format.to_uppercase().as_str() {
            "BGR" => Some(ChannelOrder::Bgr),
            "RGB" => Some(ChannelOrder::Rgb),
            _ => None,
        }
    }
}

/// Output size for resizing the shortest edge to `short_edge` while keeping the longest edge
/// within `max_size`, rounded to the nearest pixel.
pub fn shortest_edge_size(width: u32, height: u32, short_edge: u32, max_size: u32) -> (u32, u32) {
    let (w, h) = (width as f64, height as f64);
    let size = short_edge as f64;
    let mut scale = size / w.min(h);
    let (mut new_w, mut new_h) = if h < w { (scale * w, size) } else { (size, scale * h) };

    if new_w.max(new_h) > max_size as f64 {
        scale = max_size as f64 / new_w.max(new_h);
        new_w *= scale;
        new_h *= scale;
    }

    ((new_w + 0.5) as u32, (new_h + 0.5) as u32)
}

/// Resizes `image` to `target_w` x `target_h` with bilinear filtering.
pub fn resize_image(image: &BvrImage, target_w: u32, target_h: u32) -> Result<FirImage<'static>> {
    let src = image.as_fir_image()?;
    if src.width() == target_w && src.height() == target_h {
        return Ok(src);
    }

    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));
    let mut dst = FirImage::new(target_w, target_h, PixelType::U8x3);
    Resizer::new().resize(&src, &mut dst, &options)?;
    Ok(dst)
}

/// Lays an interleaved RGB buffer out as a float `(3, H, W)` tensor in `order`,
/// keeping the 0..255 value range.
pub fn chw_unnormalized(img: &FirImage, order: ChannelOrder) -> Result<X> {
    let buf = img.buffer();
    let w = img.width() as usize;
    let h = img.height() as usize;

    if buf.len() != w * h * 3 {
        bail!("Unexpected buffer size: got {}, expected {}", buf.len(), w * h * 3);
    }

    let hw = w * h;
    let mut out = vec![0.0f32; buf.len()];
    let channels = match order {
        ChannelOrder::Bgr => [2, 1, 0],
        ChannelOrder::Rgb => [0, 1, 2],
    };

    for i in 0..hw {
        for (c, &src) in channels.iter().enumerate() {
            out[i + c * hw] = buf[3 * i + src] as f32;
        }
    }

    X::from_shape_vec(&[3, h, w], out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn shortest_edge_without_cap() {
        assert_eq!(shortest_edge_size(640, 480, 800, 1333), (1067, 800));
        assert_eq!(shortest_edge_size(480, 640, 800, 1333), (800, 1067));
    }

    #[test]
    fn shortest_edge_capped_by_max_size() {
        // 2000x500 -> 3200x800 exceeds 1333 on the long side
        assert_eq!(shortest_edge_size(2000, 500, 800, 1333), (1333, 333));
    }

    #[test]
    fn chw_swaps_to_bgr() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([1, 2, 3]));
        img.put_pixel(1, 0, Rgb([4, 5, 6]));
        let fir = BvrImage::from(img).as_fir_image().unwrap();

        let x = chw_unnormalized(&fir, ChannelOrder::Bgr).unwrap();
        assert_eq!(x.shape(), &[3, 1, 2]);
        assert_eq!(x.iter().copied().collect::<Vec<f32>>(), vec![3., 6., 2., 5., 1., 4.]);

        let x = chw_unnormalized(&fir, ChannelOrder::Rgb).unwrap();
        assert_eq!(x.iter().copied().collect::<Vec<f32>>(), vec![1., 4., 2., 5., 3., 6.]);
    }
}
