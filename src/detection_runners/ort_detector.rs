mod ort_engine;
mod ort_mask_rcnn;
pub mod image_ops;
pub mod input_wrapper;
pub mod mask_paste;
pub mod y;

pub use ort_engine::*;
pub use ort_mask_rcnn::*;
