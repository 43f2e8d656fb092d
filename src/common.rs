mod bvr_box;
mod bvr_image;
mod bvr_instance;
mod inference_device;
mod model_config;
mod model_zoo;
mod seg_config;

pub use bvr_box::*;
pub use bvr_image::*;
pub use bvr_instance::*;
pub use inference_device::*;
pub use model_config::*;
pub use model_zoo::*;
pub use seg_config::*;
