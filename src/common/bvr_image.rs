use fast_image_resize::images::Image as FirImage;
use fast_image_resize::PixelType;
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};

/// A single RGB frame handed to the predictor.
#[derive(Debug, Clone, Default)]
pub struct BvrImage {
    pub image: RgbImage,
}

impl std::ops::Deref for BvrImage {
    type Target = RgbImage;

    fn deref(&self) -> &Self::Target {
        &self.image
    }
}

impl From<DynamicImage> for BvrImage {
    fn from(image: DynamicImage) -> Self {
        Self::new(image.to_rgb8())
    }
}

impl From<GrayImage> for BvrImage {
    fn from(image: GrayImage) -> Self {
        Self::new(DynamicImage::from(image).to_rgb8())
    }
}

impl From<RgbImage> for BvrImage {
    fn from(image: RgbImage) -> Self {
        Self::new(image)
    }
}

impl From<RgbaImage> for BvrImage {
    fn from(image: RgbaImage) -> Self {
        Self::new(DynamicImage::from(image).to_rgb8())
    }
}

impl From<BvrImage> for RgbImage {
    fn from(image: BvrImage) -> Self {
        image.into_rgb8()
    }
}

impl BvrImage {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    pub fn open<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let image = image::open(path)
            .map_err(|e| anyhow::anyhow!("Failed to open image {}: {}", path.display(), e))?;
        Ok(Self::from(image))
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn as_fir_image(&self) -> anyhow::Result<FirImage<'static>> {
        let (width, height) = self.image.dimensions();
        let buffer = self.image.as_raw().clone();

        Ok(FirImage::from_vec_u8(width, height, buffer, PixelType::U8x3)?)
    }

    pub fn into_rgb8(self) -> RgbImage {
        self.image
    }
}
